// src/playback.rs
// Paced text-to-Morse playback with pause, resume and stop

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::code_table::{self, Symbol};
use crate::config::KeyerConfig;
use crate::events::{EventSink, Notification, PlaybackState};
use crate::sound_queue::ToneSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackItem {
    Symbol(Symbol),
    LetterGap,
}

/// Flattens text into playback items with a [`PlaybackItem::LetterGap`] between
/// letters. Characters without a Morse code are skipped.
pub fn flatten(text: &str) -> Vec<PlaybackItem> {
    let mut items = Vec::new();
    for ch in text.chars() {
        let Some(symbols) = code_table::symbols_for(ch) else {
            if !ch.is_whitespace() {
                log::debug!("Skipping character without a Morse code: {:?}", ch);
            }
            continue;
        };
        if !items.is_empty() {
            items.push(PlaybackItem::LetterGap);
        }
        items.extend(symbols.into_iter().map(PlaybackItem::Symbol));
    }
    items
}

/// The dotted form of a text, letters separated by spaces: `"SOS"` -> `"... --- ..."`.
pub fn encode(text: &str) -> String {
    flatten(text)
        .into_iter()
        .map(|item| match item {
            PlaybackItem::Symbol(symbol) => symbol.as_char(),
            PlaybackItem::LetterGap => ' ',
        })
        .collect()
}

/// What the drain loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Dispatch(PlaybackItem),
    /// The queue ran dry and the state went back to idle.
    Finished,
    /// Nothing to do until the state changes.
    Wait,
}

/// Playback state and pending items. All transitions live here so they can be
/// exercised without any threads.
#[derive(Debug)]
pub struct PlaybackQueue {
    state: PlaybackState,
    items: VecDeque<PlaybackItem>,
    // Bumped by every start/stop so an in-flight pause can tell it is stale.
    generation: u64,
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            items: VecDeque::new(),
            generation: 0,
        }
    }
}

impl PlaybackQueue {
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn pending(&self) -> usize {
        self.items.len()
    }

    pub fn start(&mut self, items: Vec<PlaybackItem>) -> bool {
        if items.is_empty() {
            return false;
        }
        self.items = items.into();
        self.state = PlaybackState::Running;
        self.generation += 1;
        true
    }

    pub fn pause(&mut self) -> bool {
        self.transition(PlaybackState::Running, PlaybackState::Paused)
    }

    pub fn resume(&mut self) -> bool {
        self.transition(PlaybackState::Paused, PlaybackState::Running)
    }

    /// Returns whether the state changed. Pending items are discarded either way.
    pub fn stop(&mut self) -> bool {
        self.items.clear();
        self.generation += 1;
        let changed = self.state != PlaybackState::Idle;
        self.state = PlaybackState::Idle;
        changed
    }

    pub fn next_step(&mut self) -> Step {
        if self.state != PlaybackState::Running {
            return Step::Wait;
        }
        match self.items.pop_front() {
            Some(item) => Step::Dispatch(item),
            None => {
                self.state = PlaybackState::Idle;
                Step::Finished
            }
        }
    }

    fn transition(&mut self, from: PlaybackState, to: PlaybackState) -> bool {
        if self.state != from {
            log::debug!("Ignoring {} -> {} while {}", from, to, self.state);
            return false;
        }
        self.state = to;
        true
    }
}

struct Shared {
    queue: Mutex<Inner>,
    changed: Condvar,
}

struct Inner {
    playback: PlaybackQueue,
    shutdown: bool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Dispatches text as tones at a fixed cadence on its own thread. It only ever
/// enqueues to the sound queue; the sound worker does the playing.
pub struct PlaybackScheduler {
    shared: Arc<Shared>,
    events: Arc<dyn EventSink>,
    worker: Option<JoinHandle<()>>,
}

impl PlaybackScheduler {
    pub fn spawn(
        config: KeyerConfig,
        sounds: ToneSender,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Inner {
                playback: PlaybackQueue::default(),
                shutdown: false,
            }),
            changed: Condvar::new(),
        });
        let drain = Drain {
            shared: Arc::clone(&shared),
            config,
            sounds,
            events: Arc::clone(&events),
        };
        let worker = std::thread::Builder::new()
            .name("playback".into())
            .spawn(move || drain.run())
            .context("Failed to spawn the playback thread")?;
        Ok(Self {
            shared,
            events,
            worker: Some(worker),
        })
    }

    /// Replaces whatever is pending with `text` and starts playing it. Text with
    /// nothing playable is ignored.
    pub fn start(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let items = flatten(text);
        let mut inner = self.shared.lock();
        if !inner.playback.start(items) {
            log::debug!("Nothing playable in {:?}", text);
            return false;
        }
        log::info!("Playing: {}", encode(text));
        self.events
            .notify(Notification::PlaybackStateChanged(PlaybackState::Running));
        self.shared.changed.notify_all();
        true
    }

    pub fn pause(&self) -> bool {
        self.apply(PlaybackQueue::pause)
    }

    pub fn resume(&self) -> bool {
        self.apply(PlaybackQueue::resume)
    }

    pub fn stop(&self) -> bool {
        self.apply(PlaybackQueue::stop)
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.lock().playback.state()
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().playback.pending()
    }

    fn apply(&self, op: fn(&mut PlaybackQueue) -> bool) -> bool {
        let mut inner = self.shared.lock();
        let changed = op(&mut inner.playback);
        if changed {
            self.events
                .notify(Notification::PlaybackStateChanged(inner.playback.state()));
            self.shared.changed.notify_all();
        }
        changed
    }

    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.shared.lock().shutdown = true;
            self.shared.changed.notify_all();
            if worker.join().is_err() {
                log::error!("Playback thread panicked");
            }
        }
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.join();
    }
}

struct Drain {
    shared: Arc<Shared>,
    config: KeyerConfig,
    sounds: ToneSender,
    events: Arc<dyn EventSink>,
}

impl Drain {
    fn run(self) {
        let mut inner = self.shared.lock();
        loop {
            if inner.shutdown {
                break;
            }
            if inner.playback.state() != PlaybackState::Running {
                inner = self
                    .shared
                    .changed
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner);
                continue;
            }

            let (guard, still_running) = self.pace(inner, self.config.symbol_gap);
            inner = guard;
            if !still_running {
                continue;
            }

            match inner.playback.next_step() {
                Step::Dispatch(PlaybackItem::Symbol(symbol)) => {
                    self.sounds.enqueue(self.config.tone_for(symbol));
                }
                Step::Dispatch(PlaybackItem::LetterGap) => {
                    inner = self.pace(inner, self.config.letter_gap).0;
                }
                Step::Finished => {
                    log::debug!("Playback finished");
                    self.events
                        .notify(Notification::PlaybackStateChanged(PlaybackState::Idle));
                }
                Step::Wait => {}
            }
        }
        log::debug!("Playback thread stopped");
    }

    /// Waits for `pause` unless playback is paused, stopped or restarted first.
    /// Returns whether the same playback is still running afterwards.
    fn pace<'a>(
        &self,
        inner: MutexGuard<'a, Inner>,
        pause: Duration,
    ) -> (MutexGuard<'a, Inner>, bool) {
        let generation = inner.playback.generation;
        let deadline = Instant::now() + pause;
        let undisturbed = |inner: &Inner| {
            !inner.shutdown
                && inner.playback.state() == PlaybackState::Running
                && inner.playback.generation == generation
        };

        let mut inner = inner;
        while undisturbed(&*inner) {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                break;
            };
            if remaining.is_zero() {
                break;
            }
            inner = self
                .shared
                .changed
                .wait_timeout(inner, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        let still_running = undisturbed(&*inner);
        (inner, still_running)
    }
}
