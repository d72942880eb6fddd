// src/events.rs
// Notifications the core sends to whatever is rendering it

use crossbeam_channel::Sender;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Running => "running",
            PlaybackState::Paused => "paused",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The in-progress keyed sequence, e.g. `".-"`.
    SequenceChanged(String),
    LetterDecoded { character: char, message: String },
    MessageCleared,
    PlaybackStateChanged(PlaybackState),
}

/// Receiver of core notifications. Implementations must not block: they are
/// called with the decoder and scheduler locks held.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: Notification);
}

impl EventSink for Sender<Notification> {
    fn notify(&self, event: Notification) {
        if self.send(event).is_err() {
            log::debug!("Notification dropped, receiver is gone");
        }
    }
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn notify(&self, _event: Notification) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_channel_sink_delivers_and_tolerates_hangup() {
        let (tx, rx) = unbounded();
        tx.notify(Notification::MessageCleared);
        assert_eq!(rx.try_recv(), Ok(Notification::MessageCleared));
        drop(rx);
        tx.notify(Notification::PlaybackStateChanged(PlaybackState::Idle));
        NullSink.notify(Notification::SequenceChanged(".".into()));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PlaybackState::Paused.to_string(), "paused");
    }
}
