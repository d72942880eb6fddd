// src/config.rs
// Timing and tone settings for the keyer

use anyhow::{Result, bail};
use std::time::Duration;

use crate::code_table::Symbol;
use crate::tone::ToneRequest;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_FREQUENCY_HZ: f32 = 600.0;

// Letter timeouts outside this window still work but feel wrong to most operators.
const RECOMMENDED_TIMEOUT_MIN: Duration = Duration::from_millis(500);
const RECOMMENDED_TIMEOUT_MAX: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq)]
pub struct KeyerConfig {
    /// Idle time after which the keyed sequence is resolved into a letter.
    pub letter_timeout: Duration,
    /// How often the idle monitor checks the timeout.
    pub monitor_tick: Duration,
    pub dot_tone: ToneRequest,
    pub dash_tone: ToneRequest,
    /// Pause before every dispatched playback item.
    pub symbol_gap: Duration,
    /// Extra pause at a letter boundary during playback.
    pub letter_gap: Duration,
    pub sample_rate: u32,
}

impl Default for KeyerConfig {
    fn default() -> Self {
        Self {
            letter_timeout: Duration::from_millis(500),
            monitor_tick: Duration::from_millis(100),
            dot_tone: ToneRequest::new(DEFAULT_FREQUENCY_HZ, Duration::from_millis(100)),
            dash_tone: ToneRequest::new(DEFAULT_FREQUENCY_HZ, Duration::from_millis(200)),
            symbol_gap: Duration::from_millis(100),
            letter_gap: Duration::from_millis(500),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl KeyerConfig {
    pub fn tone_for(&self, symbol: Symbol) -> ToneRequest {
        match symbol {
            Symbol::Dot => self.dot_tone,
            Symbol::Dash => self.dash_tone,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            bail!("Sample rate must be positive");
        }
        if self.letter_timeout.is_zero() {
            bail!("Letter timeout must be positive");
        }
        if self.monitor_tick.is_zero() {
            bail!("Monitor tick must be positive");
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        for (name, tone) in [("dot", &self.dot_tone), ("dash", &self.dash_tone)] {
            if tone.duration.is_zero() {
                bail!("The {name} tone duration must be positive");
            }
            if !(tone.frequency > 0.0 && tone.frequency < nyquist) {
                bail!(
                    "The {name} tone frequency {:.1} Hz must lie between 0 and {:.1} Hz",
                    tone.frequency,
                    nyquist
                );
            }
        }
        if self.letter_timeout < RECOMMENDED_TIMEOUT_MIN
            || self.letter_timeout > RECOMMENDED_TIMEOUT_MAX
        {
            log::warn!(
                "Letter timeout of {:?} is outside the recommended {:?}..={:?} range",
                self.letter_timeout,
                RECOMMENDED_TIMEOUT_MIN,
                RECOMMENDED_TIMEOUT_MAX
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = KeyerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tone_for(Symbol::Dot).duration, Duration::from_millis(100));
        assert_eq!(config.tone_for(Symbol::Dash).duration, Duration::from_millis(200));
    }

    #[test]
    fn test_rejects_tone_above_nyquist() {
        let config = KeyerConfig {
            sample_rate: 1000,
            ..KeyerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_durations() {
        let mut config = KeyerConfig::default();
        config.dash_tone.duration = Duration::ZERO;
        assert!(config.validate().is_err());

        let config = KeyerConfig {
            letter_timeout: Duration::ZERO,
            ..KeyerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_short_timeout_only_warns() {
        let config = KeyerConfig {
            letter_timeout: Duration::from_millis(50),
            ..KeyerConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
