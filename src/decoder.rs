// src/decoder.rs
// Turns hand-keyed dots and dashes into letters once the key goes idle

use anyhow::{Context, Result};
use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::code_table::{self, Symbol};
use crate::config::KeyerConfig;
use crate::events::{EventSink, Notification};
use crate::sound_queue::ToneSender;

struct DecoderState {
    sequence: Vec<Symbol>,
    last_input: Instant,
    message: String,
}

pub struct MorseDecoder {
    // One lock for sequence, timestamp and message so a resolution is atomic
    // with respect to incoming signals.
    state: Mutex<DecoderState>,
    config: KeyerConfig,
    sounds: ToneSender,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl MorseDecoder {
    pub fn new(
        config: KeyerConfig,
        sounds: ToneSender,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        Self {
            state: Mutex::new(DecoderState {
                sequence: Vec::new(),
                last_input: now,
                message: String::new(),
            }),
            config,
            sounds,
            events,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, DecoderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a keyed symbol, sounds it, and returns the sequence so far.
    pub fn register_signal(&self, symbol: Symbol) -> String {
        let mut state = self.lock();
        state.sequence.push(symbol);
        state.last_input = self.clock.now();
        self.sounds.enqueue(self.config.tone_for(symbol));

        let current = code_table::sequence_to_string(&state.sequence);
        self.events
            .notify(Notification::SequenceChanged(current.clone()));
        current
    }

    /// Resolves the pending sequence if the key has been idle for longer than the
    /// letter timeout. Returns the decoded character, `'?'` for an unknown code.
    pub fn poll_timeout(&self) -> Option<char> {
        let mut state = self.lock();
        if state.sequence.is_empty() {
            return None;
        }
        let idle = self.clock.now().saturating_duration_since(state.last_input);
        if idle <= self.config.letter_timeout {
            return None;
        }

        let sequence = std::mem::take(&mut state.sequence);
        let letter = code_table::resolve(&sequence);
        log::info!("{} -> {}", code_table::sequence_to_string(&sequence), letter);
        state.message.push(letter);
        self.events.notify(Notification::LetterDecoded {
            character: letter,
            message: state.message.clone(),
        });
        Some(letter)
    }

    /// Empties the decoded message. A sequence being keyed is left alone.
    pub fn clear_message(&self) {
        let mut state = self.lock();
        state.message.clear();
        self.events.notify(Notification::MessageCleared);
    }

    pub fn message(&self) -> String {
        self.lock().message.clone()
    }

    pub fn sequence(&self) -> String {
        code_table::sequence_to_string(&self.lock().sequence)
    }

    /// Starts the background thread that checks the idle timeout every `tick`.
    pub fn spawn_monitor(self: &Arc<Self>, tick: Duration) -> Result<IdleMonitor> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let decoder = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("idle-monitor".into())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(tick) {
                        Err(RecvTimeoutError::Timeout) => {
                            decoder.poll_timeout();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::debug!("Idle monitor stopped");
            })
            .context("Failed to spawn the idle monitor")?;
        Ok(IdleMonitor {
            stop_tx,
            handle: Some(handle),
        })
    }
}

/// Handle to the idle-timeout thread; stops it when dropped.
pub struct IdleMonitor {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl IdleMonitor {
    pub fn stop(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.stop_tx.try_send(());
            if handle.join().is_err() {
                log::error!("Idle monitor panicked");
            }
        }
    }
}

impl Drop for IdleMonitor {
    fn drop(&mut self) {
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sound_queue::SoundQueue;
    use crate::tone::AudioBackend;
    use crossbeam_channel::{Receiver, unbounded};

    struct Muted;

    impl AudioBackend for Muted {
        fn play_samples(&mut self, _pcm: &[i16], _channels: u16, _sample_rate: u32) -> Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        decoder: Arc<MorseDecoder>,
        clock: Arc<ManualClock>,
        events: Receiver<Notification>,
        _sounds: SoundQueue,
    }

    fn fixture() -> Fixture {
        let config = KeyerConfig::default();
        let sounds = SoundQueue::spawn(|| Ok(Box::new(Muted) as Box<dyn AudioBackend>), 1000)
            .expect("muted backend always opens");
        let (tx, rx) = unbounded();
        let clock = Arc::new(ManualClock::new());
        let decoder = Arc::new(MorseDecoder::new(
            config,
            sounds.sender(),
            Arc::new(tx),
            clock.clone(),
        ));
        Fixture {
            decoder,
            clock,
            events: rx,
            _sounds: sounds,
        }
    }

    const PAST_TIMEOUT: Duration = Duration::from_millis(501);

    #[test]
    fn test_dot_dash_then_idle_decodes_a() {
        let f = fixture();
        assert_eq!(f.decoder.register_signal(Symbol::Dot), ".");
        assert_eq!(f.decoder.register_signal(Symbol::Dash), ".-");
        assert_eq!(f.decoder.poll_timeout(), None);

        f.clock.advance(PAST_TIMEOUT);
        assert_eq!(f.decoder.poll_timeout(), Some('A'));
        assert_eq!(f.decoder.message(), "A");
        assert_eq!(f.decoder.sequence(), "");
        // nothing pending, nothing more to resolve
        assert_eq!(f.decoder.poll_timeout(), None);
    }

    #[test]
    fn test_timeout_must_be_exceeded() {
        let f = fixture();
        f.decoder.register_signal(Symbol::Dot);
        f.clock.advance(Duration::from_millis(500));
        assert_eq!(f.decoder.poll_timeout(), None);
        f.clock.advance(Duration::from_millis(1));
        assert_eq!(f.decoder.poll_timeout(), Some('E'));
    }

    #[test]
    fn test_new_signal_restarts_the_timeout() {
        let f = fixture();
        f.decoder.register_signal(Symbol::Dot);
        f.clock.advance(Duration::from_millis(400));
        f.decoder.register_signal(Symbol::Dot);
        f.clock.advance(Duration::from_millis(400));
        assert_eq!(f.decoder.poll_timeout(), None);
        f.clock.advance(Duration::from_millis(200));
        assert_eq!(f.decoder.poll_timeout(), Some('I'));
    }

    #[test]
    fn test_unknown_sequence_resolves_to_sentinel() {
        let f = fixture();
        for _ in 0..6 {
            f.decoder.register_signal(Symbol::Dash);
        }
        f.clock.advance(PAST_TIMEOUT);
        assert_eq!(f.decoder.poll_timeout(), Some(code_table::UNKNOWN_CHAR));
        assert_eq!(f.decoder.message(), "?");
    }

    #[test]
    fn test_notifications_in_order() {
        let f = fixture();
        f.decoder.register_signal(Symbol::Dash);
        f.clock.advance(PAST_TIMEOUT);
        f.decoder.poll_timeout();
        f.decoder.clear_message();

        let events: Vec<Notification> = f.events.try_iter().collect();
        assert_eq!(
            events,
            vec![
                Notification::SequenceChanged("-".into()),
                Notification::LetterDecoded {
                    character: 'T',
                    message: "T".into()
                },
                Notification::MessageCleared,
            ]
        );
    }

    #[test]
    fn test_clear_message_keeps_pending_sequence_and_later_letters_append() {
        let f = fixture();
        f.decoder.register_signal(Symbol::Dot);
        f.clock.advance(PAST_TIMEOUT);
        f.decoder.poll_timeout();

        f.decoder.register_signal(Symbol::Dash);
        f.decoder.clear_message();
        assert_eq!(f.decoder.message(), "");
        assert_eq!(f.decoder.sequence(), "-");

        f.clock.advance(PAST_TIMEOUT);
        assert_eq!(f.decoder.poll_timeout(), Some('T'));
        assert_eq!(f.decoder.message(), "T");
    }

    #[test]
    fn test_round_trip_through_decoder() {
        let f = fixture();
        for ch in code_table::alphabet() {
            for symbol in code_table::symbols_for(ch).unwrap() {
                f.decoder.register_signal(symbol);
            }
            f.clock.advance(PAST_TIMEOUT);
            assert_eq!(f.decoder.poll_timeout(), Some(ch));
        }
        assert_eq!(f.decoder.message(), "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789");
    }

    #[test]
    fn test_concurrent_signals_are_never_lost() {
        let f = fixture();
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let decoder = f.decoder.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        decoder.register_signal(Symbol::Dot);
                        decoder.poll_timeout();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        // The clock never moved, so nothing may have been resolved.
        assert_eq!(f.decoder.sequence().len(), 200);
        assert_eq!(f.decoder.message(), "");
    }

    #[test]
    fn test_monitor_resolves_with_real_clock() -> Result<()> {
        let config = KeyerConfig {
            letter_timeout: Duration::from_millis(30),
            ..KeyerConfig::default()
        };
        let sounds = SoundQueue::spawn(|| Ok(Box::new(Muted) as Box<dyn AudioBackend>), 1000)?;
        let (tx, rx) = unbounded();
        let decoder = Arc::new(MorseDecoder::new(
            config,
            sounds.sender(),
            Arc::new(tx),
            Arc::new(crate::clock::SystemClock),
        ));
        let monitor = decoder.spawn_monitor(Duration::from_millis(5))?;
        decoder.register_signal(Symbol::Dot);
        decoder.register_signal(Symbol::Dot);
        decoder.register_signal(Symbol::Dot);

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut decoded = None;
        while decoded.is_none() {
            match rx.recv_deadline(deadline) {
                Ok(Notification::LetterDecoded { character, .. }) => decoded = Some(character),
                Ok(_) => {}
                Err(_) => break,
            }
        }
        assert_eq!(decoded, Some('S'));
        monitor.stop();
        Ok(())
    }
}
