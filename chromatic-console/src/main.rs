//! # Chromatic Tuner - Terminal Front End
//!
//! Runs the pitch detection worker and renders one status line per analysed
//! frame.
//!
//! ## Architecture
//! - **Worker Thread**: owns the audio backend and the analysis (see
//!   `chromatic_core::worker`)
//! - **Stdin Thread**: forwards command lines over a channel
//! - **Main Thread**: multiplexes worker events, commands and the run timer
//!   with `select!`
//!
//! ## Commands
//! `rate <44100|22050>`, `frame <4096|8192>`, `fundamental <Hz>`,
//! `notation <us|french|german>`, `alternative`, `quit`

mod commands;
mod display;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use chromatic_core::audio::ReferenceToneBackend;
use chromatic_core::profiler::FpsProfiler;
use chromatic_core::visualization::DEFAULT_PLOT_LEN;
use chromatic_core::{
    ConfigError, PitchDetectionWorker, Settings, TuningNotation, WorkerEvent, WorkerOptions,
};
use clap::Parser;
use crossbeam_channel::{Receiver, select};
use log::{debug, error, info, warn};

use commands::Command;

#[derive(Parser, Debug)]
#[command(name = "chromatic-tuner")]
#[command(about = "Real-time chromatic tuner for the terminal")]
struct Args {
    /// Settings file (JSON). Missing files fall back to defaults.
    #[arg(long, default_value = "chromatic_settings.json")]
    settings: PathBuf,

    /// Capture sample rate (44100 or 22050)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Analysis frame size (4096 or 8192)
    #[arg(long)]
    frame_size: Option<usize>,

    /// Frequency of A in Hz, in (400, 480]
    #[arg(long)]
    fundamental: Option<f64>,

    /// Note naming: us, french or german
    #[arg(long)]
    notation: Option<TuningNotation>,

    /// Use flat spellings for accidentals
    #[arg(long)]
    alternative: bool,

    /// Analyse a synthetic square wave at this frequency instead of a capture device
    #[arg(long, value_name = "HZ")]
    reference_tone: Option<f64>,

    /// Length of the visualization preview arrays
    #[arg(long, default_value_t = DEFAULT_PLOT_LEN)]
    plot_len: usize,

    /// Exit after this many seconds
    #[arg(long, value_name = "N")]
    seconds: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut settings = load_settings(&args.settings)?;
    apply_overrides(&mut settings, &args);
    let options = settings.worker_options().context("invalid settings")?;

    let mut worker = spawn_worker(&args, options)?;
    let commands = spawn_stdin_reader()?;
    run(&worker, commands, settings, &args)?;

    worker.stop();
    let stats = worker.stats();
    info!(
        "Audio callbacks: {} ({} coalesced while the analysis was busy)",
        stats.callbacks, stats.coalesced_callbacks
    );
    Ok(())
}

fn load_settings(path: &Path) -> Result<Settings> {
    match Settings::load(path) {
        Ok(settings) => {
            info!("Loaded settings from {}", path.display());
            Ok(settings)
        }
        Err(ConfigError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No settings file at {}, using defaults", path.display());
            Ok(Settings::default())
        }
        Err(e) => Err(e).with_context(|| format!("failed to load settings from {}", path.display())),
    }
}

fn apply_overrides(settings: &mut Settings, args: &Args) {
    if let Some(rate) = args.sample_rate {
        settings.sample_frequency = rate;
    }
    if let Some(size) = args.frame_size {
        settings.fft_frame_size = size;
    }
    if let Some(hz) = args.fundamental {
        settings.fundamental_frequency = hz;
    }
    if let Some(notation) = args.notation {
        settings.notation = notation;
    }
}

fn spawn_worker(args: &Args, options: WorkerOptions) -> Result<PitchDetectionWorker> {
    if let Some(frequency) = args.reference_tone {
        if !(frequency.is_finite() && frequency > 0.0) {
            bail!("reference tone must be a positive frequency, got {}", frequency);
        }
        let worker = PitchDetectionWorker::spawn(options, args.plot_len, move || {
            Ok(ReferenceToneBackend::new(frequency))
        })?;
        return Ok(worker);
    }
    spawn_live_worker(options, args.plot_len)
}

#[cfg(feature = "cpal")]
fn spawn_live_worker(options: WorkerOptions, plot_len: usize) -> Result<PitchDetectionWorker> {
    use chromatic_core::audio::CpalBackend;

    Ok(PitchDetectionWorker::spawn(options, plot_len, || Ok(CpalBackend::new()))?)
}

#[cfg(not(feature = "cpal"))]
fn spawn_live_worker(options: WorkerOptions, plot_len: usize) -> Result<PitchDetectionWorker> {
    warn!("Built without live capture (feature `cpal`), analysing the reference tone instead");
    Ok(PitchDetectionWorker::spawn(options, plot_len, || Ok(ReferenceToneBackend::default()))?)
}

/// Forwards stdin lines until EOF; the channel disconnects when stdin closes.
fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Could not read stdin: {}", e);
                        break;
                    }
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(rx)
}

/// One thing the main loop woke up for.
enum Input {
    Worker(Option<WorkerEvent>),
    Line(Option<String>),
    Timeout,
}

fn run(worker: &PitchDetectionWorker, mut commands: Receiver<String>, mut settings: Settings, args: &Args) -> Result<()> {
    let deadline = args.seconds.map(|s| Instant::now() + Duration::from_secs(s));
    let timer = match deadline {
        Some(deadline) => crossbeam_channel::at(deadline),
        None => crossbeam_channel::never(),
    };

    let mut tuning = settings.tuning_parameters();
    let mut alternative = args.alternative;
    let mut render_fps = FpsProfiler::new("render", false);
    let snapshot = worker.snapshot();
    let mut stdout = io::stdout();

    loop {
        let input = select! {
            recv(worker.events()) -> event => Input::Worker(event.ok()),
            recv(commands) -> line => Input::Line(line.ok()),
            recv(timer) -> _ => Input::Timeout,
        };

        match input {
            Input::Worker(Some(WorkerEvent::SnapshotUpdated { .. })) => {
                let note = snapshot.lock().estimated_note;
                render_fps.tick();
                let line = display::status_line(note.as_ref(), &tuning, alternative, render_fps.fps());
                write!(stdout, "\r{line}  ").context("failed to write status line")?;
                stdout.flush().context("failed to flush stdout")?;
            }
            Input::Worker(Some(WorkerEvent::StreamStarted { device, sample_frequency, fft_frame_size })) => {
                info!("Listening on {} at {} Hz, {} sample frames", device, sample_frequency, fft_frame_size);
            }
            Input::Worker(Some(WorkerEvent::SignalPresence(present))) => {
                info!("{}", if present { "Signal detected" } else { "Signal lost" });
            }
            Input::Worker(Some(WorkerEvent::StreamError(e))) => error!("Audio stream error: {}", e),
            Input::Worker(Some(WorkerEvent::Stopped) | None) => {
                info!("Pitch worker stopped");
                break;
            }
            Input::Line(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(Command::ToggleAlternative) => alternative = !alternative,
                    Ok(command) => {
                        let mut candidate = settings.clone();
                        command.apply(&mut candidate);
                        match candidate.worker_options() {
                            Ok(options) => {
                                info!("Applying '{}'", line);
                                tuning = options.tuning.clone();
                                settings = candidate;
                                worker.set_options(options);
                            }
                            Err(e) => warn!("Ignoring '{}': {}", line, e),
                        }
                    }
                    Err(e) => warn!("Ignoring '{}': {:#}", line, e),
                }
            }
            Input::Line(None) if deadline.is_some() => {
                debug!("stdin closed, running until the timer expires");
                commands = crossbeam_channel::never();
            }
            Input::Line(None) => {
                info!("stdin closed");
                break;
            }
            Input::Timeout => {
                info!("Run time elapsed");
                break;
            }
        }
    }

    writeln!(stdout).context("failed to write status line")?;
    Ok(())
}
