// src/code_table.rs
// Static Morse code table, shared by the decoder and the playback scheduler

use std::fmt;

/// Character reported when a keyed sequence has no table entry.
pub const UNKNOWN_CHAR: char = '?';

/// A single keyed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Dot,
    Dash,
}

impl Symbol {
    pub fn as_char(self) -> char {
        match self {
            Symbol::Dot => '.',
            Symbol::Dash => '-',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(Symbol::Dot),
            '-' => Some(Symbol::Dash),
            _ => None,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

// A-Z then 0-9.
const TABLE: [(char, &str); 36] = [
    ('A', ".-"),
    ('B', "-..."),
    ('C', "-.-."),
    ('D', "-.."),
    ('E', "."),
    ('F', "..-."),
    ('G', "--."),
    ('H', "...."),
    ('I', ".."),
    ('J', ".---"),
    ('K', "-.-"),
    ('L', ".-.."),
    ('M', "--"),
    ('N', "-."),
    ('O', "---"),
    ('P', ".--."),
    ('Q', "--.-"),
    ('R', ".-."),
    ('S', "..."),
    ('T', "-"),
    ('U', "..-"),
    ('V', "...-"),
    ('W', ".--"),
    ('X', "-..-"),
    ('Y', "-.--"),
    ('Z', "--.."),
    ('0', "-----"),
    ('1', ".----"),
    ('2', "..---"),
    ('3', "...--"),
    ('4', "....-"),
    ('5', "....."),
    ('6', "-...."),
    ('7', "--..."),
    ('8', "---.."),
    ('9', "----."),
];

/// Looks up the character for a dotted code string such as `".-"`.
pub fn morse_to_char(code: &str) -> Option<char> {
    TABLE.iter().find(|(_, c)| *c == code).map(|(ch, _)| *ch)
}

/// Looks up the dotted code for a character. Lowercase letters are accepted.
pub fn char_to_morse(ch: char) -> Option<&'static str> {
    let ch = ch.to_ascii_uppercase();
    TABLE.iter().find(|(c, _)| *c == ch).map(|(_, code)| *code)
}

/// Resolves a keyed sequence, falling back to [`UNKNOWN_CHAR`].
pub fn resolve(sequence: &[Symbol]) -> char {
    morse_to_char(&sequence_to_string(sequence)).unwrap_or(UNKNOWN_CHAR)
}

pub fn sequence_to_string(sequence: &[Symbol]) -> String {
    sequence.iter().map(|s| s.as_char()).collect()
}

/// Symbols for a character, or `None` when it has no table entry.
pub fn symbols_for(ch: char) -> Option<Vec<Symbol>> {
    char_to_morse(ch).map(|code| code.chars().filter_map(Symbol::from_char).collect())
}

/// Every character the table knows, in table order.
pub fn alphabet() -> impl Iterator<Item = char> {
    TABLE.iter().map(|(ch, _)| *ch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_both_directions() {
        assert_eq!(morse_to_char(".-"), Some('A'));
        assert_eq!(morse_to_char("-----"), Some('0'));
        assert_eq!(char_to_morse('s'), Some("..."));
        assert_eq!(char_to_morse('?'), None);
        assert_eq!(morse_to_char("......."), None);
    }

    #[test]
    fn test_resolve_unknown_is_sentinel() {
        let seq = [Symbol::Dot; 7];
        assert_eq!(resolve(&seq), UNKNOWN_CHAR);
        assert_eq!(resolve(&[]), UNKNOWN_CHAR);
    }

    #[test]
    fn test_round_trip_every_character() {
        for ch in alphabet() {
            let symbols = symbols_for(ch).expect("table character has symbols");
            assert_eq!(resolve(&symbols), ch, "round trip failed for {ch}");
        }
        assert_eq!(alphabet().count(), 36);
    }

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<&str> = TABLE.iter().map(|(_, c)| *c).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), TABLE.len());
    }
}
