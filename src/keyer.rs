// src/keyer.rs
// The keyer as seen by a user interface: input events in, notifications out

use anyhow::Result;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::code_table::Symbol;
use crate::config::KeyerConfig;
use crate::decoder::{IdleMonitor, MorseDecoder};
use crate::events::{EventSink, PlaybackState};
use crate::playback::PlaybackScheduler;
use crate::sound_queue::SoundQueue;
use crate::tone::AudioBackend;

/// Owns every worker thread: the sound worker, the idle monitor and the playback
/// scheduler. Dropping it (or calling [`Keyer::shutdown`]) stops them all.
pub struct Keyer {
    decoder: Arc<MorseDecoder>,
    monitor: Option<IdleMonitor>,
    playback: Option<PlaybackScheduler>,
    sounds: Option<SoundQueue>,
}

impl Keyer {
    pub fn start<F>(config: KeyerConfig, make_backend: F, events: Arc<dyn EventSink>) -> Result<Self>
    where
        F: FnOnce() -> Result<Box<dyn AudioBackend>> + Send + 'static,
    {
        Self::start_with_clock(config, make_backend, events, Arc::new(SystemClock))
    }

    pub fn start_with_clock<F>(
        config: KeyerConfig,
        make_backend: F,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self>
    where
        F: FnOnce() -> Result<Box<dyn AudioBackend>> + Send + 'static,
    {
        config.validate()?;

        let sounds = SoundQueue::spawn(make_backend, config.sample_rate)?;
        let decoder = Arc::new(MorseDecoder::new(
            config.clone(),
            sounds.sender(),
            Arc::clone(&events),
            clock,
        ));
        let monitor = decoder.spawn_monitor(config.monitor_tick)?;
        let playback = PlaybackScheduler::spawn(config, sounds.sender(), events)?;
        log::debug!("Keyer started");

        Ok(Self {
            decoder,
            monitor: Some(monitor),
            playback: Some(playback),
            sounds: Some(sounds),
        })
    }

    /// Keys a dot or dash. Returns the sequence keyed so far for the current letter.
    pub fn on_signal(&self, symbol: Symbol) -> String {
        self.decoder.register_signal(symbol)
    }

    pub fn on_clear_message(&self) {
        self.decoder.clear_message();
    }

    pub fn on_play_text(&self, text: &str) -> bool {
        self.with_playback(|p| p.start(text))
    }

    pub fn on_pause(&self) -> bool {
        self.with_playback(PlaybackScheduler::pause)
    }

    pub fn on_resume(&self) -> bool {
        self.with_playback(PlaybackScheduler::resume)
    }

    pub fn on_stop(&self) -> bool {
        self.with_playback(PlaybackScheduler::stop)
    }

    pub fn message(&self) -> String {
        self.decoder.message()
    }

    pub fn sequence(&self) -> String {
        self.decoder.sequence()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback
            .as_ref()
            .map_or(PlaybackState::Idle, PlaybackScheduler::state)
    }

    /// Playback items not yet dispatched.
    pub fn pending_playback(&self) -> usize {
        self.playback.as_ref().map_or(0, PlaybackScheduler::pending)
    }

    pub fn decoder(&self) -> &Arc<MorseDecoder> {
        &self.decoder
    }

    fn with_playback(&self, f: impl FnOnce(&PlaybackScheduler) -> bool) -> bool {
        self.playback.as_ref().is_some_and(f)
    }

    /// Stops the playback thread and the idle monitor, lets the sound worker play
    /// what it already has, then joins it.
    pub fn shutdown(mut self) {
        self.stop_workers();
    }

    fn stop_workers(&mut self) {
        if let Some(playback) = self.playback.take() {
            playback.shutdown();
        }
        if let Some(monitor) = self.monitor.take() {
            monitor.stop();
        }
        if let Some(sounds) = self.sounds.take() {
            sounds.shutdown();
            log::debug!("Keyer stopped");
        }
    }
}

impl Drop for Keyer {
    fn drop(&mut self) {
        self.stop_workers();
    }
}
