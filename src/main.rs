use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::{Receiver, unbounded};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ditdah_keyer::tone::{SilentBackend, WavRecorder};
use ditdah_keyer::{AudioBackend, Keyer, KeyerConfig, Notification, Symbol, ToneRequest};
use ditdah_keyer::{playback, render};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    timing: TimingArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Key letters and play text from the terminal (the default)
    Interactive(InteractiveArgs),
    /// Print the Morse code for a text
    Encode {
        #[arg(value_name = "TEXT")]
        text: String,
    },
    /// Render a text's playback to a WAV file
    Render {
        #[arg(value_name = "TEXT")]
        text: String,
        /// Path of the WAV file to write
        #[arg(short, long, value_name = "WAV_FILE")]
        output: PathBuf,
    },
}

#[derive(Args, Default)]
struct InteractiveArgs {
    /// Record everything played to this WAV file
    #[arg(long, value_name = "WAV_FILE")]
    wav: Option<PathBuf>,
    /// Play through the default audio device
    #[arg(long, conflicts_with = "wav")]
    speaker: bool,
}

#[derive(Args)]
struct TimingArgs {
    /// Idle time in milliseconds after which keyed symbols become a letter
    #[arg(long, global = true, default_value_t = 500)]
    letter_timeout_ms: u64,
    /// Tone frequency in Hz
    #[arg(long, global = true, default_value_t = 600.0)]
    frequency: f32,
    #[arg(long, global = true, default_value_t = 100)]
    dot_ms: u64,
    #[arg(long, global = true, default_value_t = 200)]
    dash_ms: u64,
    /// Pause before each symbol during text playback
    #[arg(long, global = true, default_value_t = 100)]
    symbol_gap_ms: u64,
    /// Extra pause between letters during text playback
    #[arg(long, global = true, default_value_t = 500)]
    letter_gap_ms: u64,
    #[arg(long, global = true, default_value_t = 44100)]
    sample_rate: u32,
}

impl TimingArgs {
    fn to_config(&self) -> KeyerConfig {
        KeyerConfig {
            letter_timeout: Duration::from_millis(self.letter_timeout_ms),
            dot_tone: ToneRequest::new(self.frequency, Duration::from_millis(self.dot_ms)),
            dash_tone: ToneRequest::new(self.frequency, Duration::from_millis(self.dash_ms)),
            symbol_gap: Duration::from_millis(self.symbol_gap_ms),
            letter_gap: Duration::from_millis(self.letter_gap_ms),
            sample_rate: self.sample_rate,
            ..KeyerConfig::default()
        }
    }
}

fn main() -> Result<()> {
    // Set up logging. Use `RUST_LOG=info` or `RUST_LOG=debug` to see output.
    env_logger::init();
    let cli = Cli::parse();
    let config = cli.timing.to_config();

    match cli.command.unwrap_or(Command::Interactive(InteractiveArgs::default())) {
        Command::Encode { text } => {
            println!("{}", playback::encode(&text));
        }
        Command::Render { text, output } => {
            config.validate()?;
            let timeline = render::render_wav(&text, &config, &output)?;
            log::info!(
                "Wrote {} tones ({:.2} s) to {:?}",
                timeline.tones().len(),
                timeline.duration().as_secs_f32(),
                output
            );
        }
        Command::Interactive(args) => run_interactive(config, args)?,
    }
    Ok(())
}

fn make_backend(
    args: &InteractiveArgs,
    sample_rate: u32,
) -> Result<Box<dyn FnOnce() -> Result<Box<dyn AudioBackend>> + Send>> {
    if args.speaker {
        #[cfg(feature = "speaker")]
        {
            return Ok(Box::new(|| {
                Ok(Box::new(ditdah_keyer::tone::SpeakerBackend::open()?) as Box<dyn AudioBackend>)
            }));
        }
        #[cfg(not(feature = "speaker"))]
        bail!("Built without speaker support; rebuild with `--features speaker`");
    }
    if let Some(path) = args.wav.clone() {
        log::info!("Recording to {:?}", path);
        return Ok(Box::new(move || {
            Ok(Box::new(WavRecorder::create(path, sample_rate)?) as Box<dyn AudioBackend>)
        }));
    }
    Ok(Box::new(|| Ok(Box::new(SilentBackend) as Box<dyn AudioBackend>)))
}

fn run_interactive(config: KeyerConfig, args: InteractiveArgs) -> Result<()> {
    let backend = make_backend(&args, config.sample_rate)?;
    let (tx, rx) = unbounded();
    let keyer = Keyer::start(config, backend, Arc::new(tx))?;
    let printer = std::thread::spawn(move || print_notifications(rx));

    println!("Key with '.' and '-', or: play <text> | pause | resume | stop | clear | quit");
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "" => {}
            "quit" | "exit" => break,
            "clear" => keyer.on_clear_message(),
            "play" => {
                if !keyer.on_play_text(rest) {
                    println!("Nothing to play");
                }
            }
            "pause" => {
                keyer.on_pause();
            }
            "resume" => {
                keyer.on_resume();
            }
            "stop" => {
                keyer.on_stop();
            }
            keys if keys.chars().all(|c| Symbol::from_char(c).is_some()) => {
                for symbol in keys.chars().filter_map(Symbol::from_char) {
                    keyer.on_signal(symbol);
                }
            }
            other => println!("Unknown command: {other}"),
        }
    }

    // Dropping the keyer drops the last notification sender, ending the printer.
    keyer.shutdown();
    if printer.join().is_err() {
        bail!("Notification printer panicked");
    }
    Ok(())
}

fn print_notifications(rx: Receiver<Notification>) {
    for event in rx.iter() {
        match event {
            Notification::SequenceChanged(sequence) => println!("Sequence: {sequence}"),
            Notification::LetterDecoded { character, message } => {
                println!("Last letter: {character}");
                println!("Message: {message}");
            }
            Notification::MessageCleared => println!("Message: "),
            Notification::PlaybackStateChanged(state) => println!("Playback: {state}"),
        }
    }
}
