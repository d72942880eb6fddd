// src/sound_queue.rs
// FIFO of tone requests drained by a single audio worker thread

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::thread::JoinHandle;

use crate::tone::{AudioBackend, ToneEmitter, ToneRequest};

enum Job {
    Play(ToneRequest),
    Shutdown,
}

/// Cloneable producer side of the sound queue. Never blocks.
#[derive(Clone)]
pub struct ToneSender {
    tx: Sender<Job>,
}

impl ToneSender {
    pub fn enqueue(&self, request: ToneRequest) {
        if self.tx.send(Job::Play(request)).is_err() {
            log::warn!("Sound worker has stopped, dropping {:?}", request);
        }
    }
}

/// Owns the sound worker. Tones play strictly in submission order and never overlap.
pub struct SoundQueue {
    sender: ToneSender,
    worker: Option<JoinHandle<()>>,
}

impl SoundQueue {
    /// Starts the worker. The backend is built on the worker thread itself, so it
    /// is the only thread that ever touches the audio device.
    pub fn spawn<F>(make_backend: F, sample_rate: u32) -> Result<Self>
    where
        F: FnOnce() -> Result<Box<dyn AudioBackend>> + Send + 'static,
    {
        let (tx, rx) = unbounded();
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let worker = std::thread::Builder::new()
            .name("sound-worker".into())
            .spawn(move || match make_backend() {
                Ok(backend) => {
                    let _ = ready_tx.send(Ok(()));
                    run_worker(ToneEmitter::new(backend, sample_rate), rx);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .context("Failed to spawn the sound worker")?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = worker.join();
                return Err(err.context("Failed to open the audio backend"));
            }
            Err(_) => {
                let _ = worker.join();
                return Err(anyhow!("Sound worker exited during start-up"));
            }
        }

        Ok(Self {
            sender: ToneSender { tx },
            worker: Some(worker),
        })
    }

    pub fn sender(&self) -> ToneSender {
        self.sender.clone()
    }

    pub fn enqueue(&self, request: ToneRequest) {
        self.sender.enqueue(request);
    }

    /// Plays everything already queued, then stops the worker.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.sender.tx.send(Job::Shutdown);
            if worker.join().is_err() {
                log::error!("Sound worker panicked");
            }
        }
    }
}

impl Drop for SoundQueue {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

fn run_worker(mut emitter: ToneEmitter, rx: Receiver<Job>) {
    log::debug!("Sound worker started");
    for job in rx.iter() {
        match job {
            Job::Play(request) => {
                if let Err(err) = emitter.emit(request) {
                    log::warn!("Dropping tone {:?}: {:#}", request, err);
                }
            }
            Job::Shutdown => break,
        }
    }
    log::debug!("Sound worker stopped");
}
