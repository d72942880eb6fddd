// src/lib.rs
// Library interface for ditdah-keyer

pub mod clock;
pub mod code_table;
pub mod config;
pub mod decoder;
pub mod events;
pub mod keyer;
pub mod playback;
pub mod render;
pub mod sound_queue;
pub mod tone;

pub use code_table::Symbol;
pub use config::KeyerConfig;
pub use decoder::MorseDecoder;
pub use events::{EventSink, Notification, PlaybackState};
pub use keyer::Keyer;
pub use playback::{PlaybackItem, PlaybackScheduler};
pub use sound_queue::SoundQueue;
pub use tone::{AudioBackend, ToneRequest};
