// src/tone.rs
// Sine tone synthesis and the audio backends that play it

use anyhow::{Result, bail};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::f32::consts::PI;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::{Duration, Instant};

// 50% amplitude to avoid clipping
const TONE_AMPLITUDE: f32 = 0.5;

/// One sound to be played: a frequency held for a duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneRequest {
    pub frequency: f32,
    pub duration: Duration,
}

impl ToneRequest {
    pub const fn new(frequency: f32, duration: Duration) -> Self {
        Self {
            frequency,
            duration,
        }
    }
}

/// Number of samples a tone of `duration` occupies at `sample_rate`.
pub fn sample_count(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * sample_rate as f64) as usize
}

/// Synthesizes a mono 16-bit sine buffer for the request.
pub fn synthesize(request: ToneRequest, sample_rate: u32) -> Vec<i16> {
    let samples = sample_count(request.duration, sample_rate);
    (0..samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let sample = (2.0 * PI * request.frequency * t).sin();
            (sample * TONE_AMPLITUDE * i16::MAX as f32) as i16
        })
        .collect()
}

/// Something that can play PCM. Calls block until playback has finished.
pub trait AudioBackend {
    fn play_samples(&mut self, pcm: &[i16], channels: u16, sample_rate: u32) -> Result<()>;
}

fn buffer_duration(pcm: &[i16], channels: u16, sample_rate: u32) -> Duration {
    let frames = pcm.len() / channels.max(1) as usize;
    Duration::from_secs_f64(frames as f64 / sample_rate.max(1) as f64)
}

/// Turns tone requests into sample buffers and hands them to a backend.
pub struct ToneEmitter {
    backend: Box<dyn AudioBackend>,
    sample_rate: u32,
}

impl ToneEmitter {
    pub fn new(backend: Box<dyn AudioBackend>, sample_rate: u32) -> Self {
        Self {
            backend,
            sample_rate,
        }
    }

    pub fn emit(&mut self, request: ToneRequest) -> Result<()> {
        let pcm = synthesize(request, self.sample_rate);
        if pcm.is_empty() {
            log::debug!("Skipping zero-length tone {:?}", request);
            return Ok(());
        }
        self.backend.play_samples(&pcm, 1, self.sample_rate)
    }
}

/// Keeps real-time pacing without producing any sound.
#[derive(Debug, Default)]
pub struct SilentBackend;

impl AudioBackend for SilentBackend {
    fn play_samples(&mut self, pcm: &[i16], channels: u16, sample_rate: u32) -> Result<()> {
        std::thread::sleep(buffer_duration(pcm, channels, sample_rate));
        Ok(())
    }
}

/// Records a session to a mono WAV file, keeping the silence between tones.
pub struct WavRecorder {
    writer: WavWriter<BufWriter<File>>,
    sample_rate: u32,
    last_end: Option<Instant>,
}

impl WavRecorder {
    pub fn create<P: AsRef<Path>>(path: P, sample_rate: u32) -> Result<Self> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        Ok(Self {
            writer: WavWriter::create(path, spec)?,
            sample_rate,
            last_end: None,
        })
    }

    pub fn finalize(self) -> Result<()> {
        self.writer.finalize()?;
        Ok(())
    }
}

impl AudioBackend for WavRecorder {
    fn play_samples(&mut self, pcm: &[i16], channels: u16, sample_rate: u32) -> Result<()> {
        if channels != 1 || sample_rate != self.sample_rate {
            bail!(
                "Recorder expects mono audio at {} Hz, got {} channel(s) at {} Hz",
                self.sample_rate,
                channels,
                sample_rate
            );
        }
        if let Some(last_end) = self.last_end {
            for _ in 0..sample_count(last_end.elapsed(), self.sample_rate) {
                self.writer.write_sample(0i16)?;
            }
        }
        let started = Instant::now();
        for &sample in pcm {
            self.writer.write_sample(sample)?;
        }
        // Keep the header valid even if the process is killed mid-session.
        self.writer.flush()?;

        let duration = buffer_duration(pcm, channels, sample_rate);
        if let Some(remaining) = duration.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
        self.last_end = Some(Instant::now());
        Ok(())
    }
}

#[cfg(feature = "speaker")]
pub use speaker::SpeakerBackend;

#[cfg(feature = "speaker")]
mod speaker {
    use super::AudioBackend;
    use anyhow::Result;
    use rodio::buffer::SamplesBuffer;
    use rodio::{OutputStream, Sink};

    /// Plays tones on the default output device.
    pub struct SpeakerBackend {
        _stream: OutputStream,
        sink: Sink,
    }

    impl SpeakerBackend {
        pub fn open() -> Result<Self> {
            let (stream, handle) = OutputStream::try_default()?;
            let sink = Sink::try_new(&handle)?;
            Ok(Self {
                _stream: stream,
                sink,
            })
        }
    }

    impl AudioBackend for SpeakerBackend {
        fn play_samples(&mut self, pcm: &[i16], channels: u16, sample_rate: u32) -> Result<()> {
            self.sink
                .append(SamplesBuffer::new(channels, sample_rate, pcm.to_vec()));
            self.sink.sleep_until_end();
            Ok(())
        }
    }
}
