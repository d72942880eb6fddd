// src/render.rs
// Offline rendering of text playback to a WAV file

use anyhow::{Result, bail};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;
use std::time::Duration;

use crate::config::KeyerConfig;
use crate::playback::{PlaybackItem, flatten};
use crate::tone::{ToneRequest, sample_count, synthesize};

/// A tone and the moment, relative to the start of playback, it begins sounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledTone {
    pub start: Duration,
    pub tone: ToneRequest,
}

/// When each tone of a text would sound if played live.
///
/// Mirrors the live pipeline: the scheduler dispatches an item every symbol gap
/// (plus the letter gap at letter boundaries), while the sound queue starts a tone
/// at its dispatch time or when the previous tone ends, whichever is later.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    tones: Vec<ScheduledTone>,
    end: Duration,
}

impl Timeline {
    pub fn for_text(text: &str, config: &KeyerConfig) -> Self {
        Self::for_items(&flatten(text), config)
    }

    pub fn for_items(items: &[PlaybackItem], config: &KeyerConfig) -> Self {
        let mut dispatch = Duration::ZERO;
        let mut sound_free_at = Duration::ZERO;
        let mut tones = Vec::new();

        for item in items {
            dispatch += config.symbol_gap;
            match *item {
                PlaybackItem::Symbol(symbol) => {
                    let tone = config.tone_for(symbol);
                    let start = dispatch.max(sound_free_at);
                    sound_free_at = start + tone.duration;
                    tones.push(ScheduledTone { start, tone });
                }
                PlaybackItem::LetterGap => dispatch += config.letter_gap,
            }
        }

        Self {
            tones,
            end: dispatch.max(sound_free_at),
        }
    }

    pub fn tones(&self) -> &[ScheduledTone] {
        &self.tones
    }

    /// Time at which both dispatching and sounding are done.
    pub fn duration(&self) -> Duration {
        self.end
    }

    /// Mono PCM for the whole timeline, silence included.
    pub fn render(&self, sample_rate: u32) -> Vec<i16> {
        let mut pcm = vec![0i16; sample_count(self.end, sample_rate)];
        for scheduled in &self.tones {
            let offset = sample_count(scheduled.start, sample_rate);
            let tone = synthesize(scheduled.tone, sample_rate);
            let end = (offset + tone.len()).min(pcm.len());
            if offset < end {
                pcm[offset..end].copy_from_slice(&tone[..end - offset]);
            }
        }
        pcm
    }
}

/// Writes `text` as it would sound when played, to a 16-bit mono WAV file.
pub fn render_wav<P: AsRef<Path>>(text: &str, config: &KeyerConfig, path: P) -> Result<Timeline> {
    let timeline = Timeline::for_text(text, config);
    if timeline.tones().is_empty() {
        bail!("Nothing to render: {:?} has no characters with a Morse code", text);
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for sample in timeline.render(config.sample_rate) {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(timeline)
}
