//! # Pitch Detection Worker
//!
//! Orchestrates the pipeline between the audio callback and the analysis:
//!
//! ```text
//! backend callback ──append──▶ CyclicBuffer ──wake──▶ worker thread
//!                                                   │ copy last frame
//!                                                   ▼
//!                          PitchEstimator ─▶ TuningParameters::estimate_note
//!                                                   │
//!                                                   ▼
//!                         VisualizationSnapshot ─▶ WorkerEvent::SnapshotUpdated
//! ```
//!
//! ## Locking
//! - The ring buffer has its own mutex, held only for one append or one copy.
//!   The audio callback never waits behind analysis work.
//! - Worker control flags (`buffer_updated`, `stop_requested`,
//!   `pending_options`) live under a second mutex paired with the condition
//!   variable. It is released before any stream start/stop, since backends
//!   may still invoke the callback while tearing down.
//! - The snapshot mutex is held only while copying finished results in.
//!
//! ## Backpressure
//! The producer never blocks. Audio arriving while the worker is busy is
//! absorbed by the ring buffer and only the most recent frame is analysed.

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, error, info, trace, warn};
use parking_lot::{Condvar, Mutex};

use crate::audio::{AudioBackend, CaptureInfo, StreamParams};
use crate::config::WorkerOptions;
use crate::cyclic_buffer::CyclicBuffer;
use crate::error::{AudioError, Error, Result};
use crate::pitch::PitchEstimator;
use crate::presence::SignalPresence;
use crate::profiler::FpsProfiler;
use crate::visualization::{VisualizationSnapshot, autocorr_stride};

/// Capacity of the worker's event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

type Sample = f32;

/// Lifecycle of the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Building the ring buffer and estimator for the current options.
    Configuring,
    /// Stream running, waiting for audio, options or a stop request.
    Streaming,
    /// Tearing down the stream to apply new options.
    Reconfiguring,
    /// The stream failed to start; waiting for new options or a stop request.
    Faulted,
    /// Terminal.
    Stopped,
}

/// Notifications for the visualization consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    StreamStarted {
        device: String,
        sample_frequency: u32,
        fft_frame_size: usize,
    },
    /// A new snapshot is ready to be read.
    SnapshotUpdated { cycle: u64 },
    SignalPresence(bool),
    StreamError(AudioError),
    Stopped,
}

/// Producer-side counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub callbacks: u64,
    /// Callbacks that arrived before the worker consumed the previous one.
    pub coalesced_callbacks: u64,
}

/// What woke the worker, in priority order.
#[derive(Debug)]
enum Wake {
    Stop,
    Reconfigure(WorkerOptions),
    BufferUpdated,
}

struct Control {
    buffer_updated: bool,
    stop_requested: bool,
    /// Last write wins.
    pending_options: Option<WorkerOptions>,
    state: WorkerState,
}

impl Control {
    fn new() -> Self {
        Self {
            buffer_updated: false,
            stop_requested: false,
            pending_options: None,
            state: WorkerState::Configuring,
        }
    }

    fn next_wake(&mut self) -> Option<Wake> {
        if self.stop_requested {
            Some(Wake::Stop)
        } else if let Some(options) = self.pending_options.take() {
            Some(Wake::Reconfigure(options))
        } else if self.buffer_updated {
            Some(Wake::BufferUpdated)
        } else {
            None
        }
    }
}

/// State shared between the audio callback, the worker thread and the
/// worker handle.
struct Shared {
    buffer: Mutex<CyclicBuffer>,
    control: Mutex<Control>,
    wake: Condvar,
    callbacks: AtomicU64,
    coalesced: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            buffer: Mutex::new(CyclicBuffer::new(0)),
            control: Mutex::new(Control::new()),
            wake: Condvar::new(),
            callbacks: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Producer side, called from the audio callback.
    fn push_samples(&self, samples: &[Sample]) {
        self.buffer.lock().append(bytemuck::cast_slice(samples));
        self.callbacks.fetch_add(1, Ordering::Relaxed);

        let mut control = self.control.lock();
        if control.buffer_updated {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            trace!("Worker still busy, coalescing {} samples", samples.len());
        }
        control.buffer_updated = true;
        self.wake.notify_one();
    }

    fn set_state(&self, state: WorkerState) {
        self.control.lock().state = state;
    }

    fn wait_for_wake(&self) -> Wake {
        let mut control = self.control.lock();
        loop {
            if let Some(wake) = control.next_wake() {
                return wake;
            }
            self.wake.wait(&mut control);
        }
    }
}

/// Per-configuration analysis resources.
struct Analysis {
    options: WorkerOptions,
    estimator: PitchEstimator,
    /// Samples copied out of the ring buffer.
    frame: Vec<Sample>,
    presence: SignalPresence,
    profiler: FpsProfiler,
}

impl Analysis {
    fn new(options: WorkerOptions) -> Self {
        Self {
            estimator: PitchEstimator::new(options.sample_frequency, options.fft_frame_size),
            frame: vec![0.0; options.fft_frame_size],
            presence: SignalPresence::new(),
            profiler: FpsProfiler::new("analysis", true),
            options,
        }
    }

    /// Analyses the most recent frame and publishes it into `snapshot`.
    ///
    /// # Returns
    /// * The new signal presence if it changed
    fn run_cycle(&mut self, shared: &Shared, snapshot: &Mutex<VisualizationSnapshot>, cycle: u64) -> Option<bool> {
        let copied_bytes = shared
            .buffer
            .lock()
            .copy_last_bytes(bytemuck::cast_slice_mut(&mut self.frame[..]));
        let frame = &self.frame[..copied_bytes / mem::size_of::<Sample>()];

        self.estimator.load_samples(frame);
        let estimated_frequency = self.estimator.estimate_frequency();
        let estimated_note = self.options.tuning.estimate_note(estimated_frequency);
        let presence_change = self.presence.update(frame);
        self.profiler.tick();

        let sample_frequency = self.options.sample_frequency;
        let mut snapshot = snapshot.lock();
        snapshot.populate_samples(frame, sample_frequency);
        snapshot.populate_spectrum(
            self.estimator.power_spectrum(),
            sample_frequency,
            self.options.fft_frame_size,
        );
        snapshot.populate_autocorr(
            self.estimator.autocorrelation(),
            sample_frequency,
            autocorr_stride(sample_frequency),
        );
        snapshot.estimated_frequency = estimated_frequency;
        snapshot.estimated_note = estimated_note;
        snapshot.cycle = cycle;
        snapshot.sample_frequency = sample_frequency;
        snapshot.fft_frame_size = self.options.fft_frame_size;
        snapshot.signal_present = self.presence.is_present();
        snapshot.analysis_fps = self.profiler.fps();

        presence_change
    }
}

/// Everything owned by the worker thread.
struct WorkerThread<B: AudioBackend> {
    shared: Arc<Shared>,
    snapshot: Arc<Mutex<VisualizationSnapshot>>,
    events: Sender<WorkerEvent>,
    backend: B,
    streaming: bool,
    cycle: u64,
}

impl<B: AudioBackend> WorkerThread<B> {
    fn run(mut self, options: WorkerOptions) {
        let mut analysis = self.configure(options);
        self.start_stream(&analysis.options);

        loop {
            match self.shared.wait_for_wake() {
                Wake::Stop => {
                    self.stop_stream();
                    drop(analysis);
                    self.shared.set_state(WorkerState::Stopped);
                    info!("Pitch worker stopped after {} cycles", self.cycle);
                    self.emit(WorkerEvent::Stopped);
                    return;
                }
                Wake::Reconfigure(options) => {
                    self.shared.set_state(WorkerState::Reconfiguring);
                    info!(
                        "Reconfiguring: {} Hz / {} samples -> {} Hz / {} samples",
                        analysis.options.sample_frequency,
                        analysis.options.fft_frame_size,
                        options.sample_frequency,
                        options.fft_frame_size
                    );
                    self.stop_stream();
                    analysis = self.configure(options);
                    self.start_stream(&analysis.options);
                }
                Wake::BufferUpdated => {
                    self.cycle += 1;
                    let presence_change = analysis.run_cycle(&self.shared, &self.snapshot, self.cycle);
                    // Cleared only once the frame is published, so the
                    // producer can tell whether we kept up.
                    self.shared.control.lock().buffer_updated = false;

                    self.emit(WorkerEvent::SnapshotUpdated { cycle: self.cycle });
                    if let Some(present) = presence_change {
                        debug!("Signal presence: {}", present);
                        self.emit(WorkerEvent::SignalPresence(present));
                    }
                }
            }
        }
    }

    /// Rebuilds the ring buffer and estimator. The stream must be stopped.
    fn configure(&mut self, options: WorkerOptions) -> Analysis {
        debug_assert!(!self.streaming);
        self.shared.set_state(WorkerState::Configuring);

        *self.shared.buffer.lock() = CyclicBuffer::new(options.fft_frame_size * mem::size_of::<Sample>());
        // Drop any wake-up left over from the previous stream.
        self.shared.control.lock().buffer_updated = false;

        Analysis::new(options)
    }

    fn start_stream(&mut self, options: &WorkerOptions) {
        let params = StreamParams::new(options.sample_frequency);
        let shared = Arc::clone(&self.shared);
        let callback = Box::new(move |samples: &[Sample], _: &CaptureInfo| {
            shared.push_samples(samples)
        });

        match self.backend.start(params, callback) {
            Ok(()) => {
                self.streaming = true;
                self.shared.set_state(WorkerState::Streaming);
                let device = self.backend.description();
                info!("Pitch worker streaming from {}", device);
                info!(" - sample frequency  = {} Hz", options.sample_frequency);
                info!(" - frames per buffer = {}", params.frames_per_buffer);
                info!(" - fft frame size    = {}", options.fft_frame_size);
                self.emit(WorkerEvent::StreamStarted {
                    device,
                    sample_frequency: options.sample_frequency,
                    fft_frame_size: options.fft_frame_size,
                });
            }
            Err(e) => {
                error!("Could not start audio stream: {}", e);
                self.shared.set_state(WorkerState::Faulted);
                self.emit(WorkerEvent::StreamError(e));
            }
        }
    }

    fn stop_stream(&mut self) {
        if !self.streaming {
            return;
        }
        self.streaming = false;
        if let Err(e) = self.backend.stop() {
            error!("Could not stop audio stream cleanly: {}", e);
            self.emit(WorkerEvent::StreamError(e));
        }
    }

    fn emit(&self, event: WorkerEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(WorkerEvent::SnapshotUpdated { cycle })) => {
                trace!("Consumer behind, dropping notification for cycle {}", cycle);
            }
            Err(TrySendError::Full(event)) => warn!("Event channel full, dropping {:?}", event),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Handle to a running pitch detection worker.
///
/// Dropping the handle stops the worker and joins its thread. A stopped
/// worker cannot be restarted; spawn a new one.
pub struct PitchDetectionWorker {
    shared: Arc<Shared>,
    snapshot: Arc<Mutex<VisualizationSnapshot>>,
    events: Receiver<WorkerEvent>,
    handle: Option<JoinHandle<()>>,
}

impl PitchDetectionWorker {
    /// Spawns the worker thread and starts streaming with `options`.
    ///
    /// The backend is created on the worker thread by `make_backend`, and
    /// lives there until the worker stops.
    ///
    /// # Arguments
    /// * `options` - Validated initial configuration
    /// * `plot_len` - Length of the snapshot preview arrays
    /// * `make_backend` - Factory for the audio backend
    ///
    /// # Returns
    /// * `Err(Error::Spawn)` if the thread could not be created. Backend
    ///   failures are reported as [`WorkerEvent::StreamError`].
    pub fn spawn<B, F>(options: WorkerOptions, plot_len: usize, make_backend: F) -> Result<Self>
    where
        B: AudioBackend + 'static,
        F: FnOnce() -> std::result::Result<B, AudioError> + Send + 'static,
    {
        let shared = Arc::new(Shared::new());
        let snapshot = Arc::new(Mutex::new(VisualizationSnapshot::new(plot_len)));
        let (events_tx, events_rx) = bounded(EVENT_CHANNEL_CAPACITY);

        let thread_shared = Arc::clone(&shared);
        let thread_snapshot = Arc::clone(&snapshot);
        let handle = thread::Builder::new()
            .name("pitch-worker".to_string())
            .spawn(move || {
                let backend = match make_backend() {
                    Ok(backend) => backend,
                    Err(e) => {
                        error!("Could not create audio backend: {}", e);
                        thread_shared.set_state(WorkerState::Stopped);
                        let _ = events_tx.try_send(WorkerEvent::StreamError(e));
                        let _ = events_tx.try_send(WorkerEvent::Stopped);
                        return;
                    }
                };
                WorkerThread {
                    shared: thread_shared,
                    snapshot: thread_snapshot,
                    events: events_tx,
                    backend,
                    streaming: false,
                    cycle: 0,
                }
                .run(options);
            })
            .map_err(Error::Spawn)?;

        Ok(Self {
            shared,
            snapshot,
            events: events_rx,
            handle: Some(handle),
        })
    }

    /// Queues new options. The worker stops the stream, rebuilds its buffers
    /// and restarts; if several updates arrive before it wakes, only the
    /// latest is applied.
    pub fn set_options(&self, options: WorkerOptions) {
        let mut control = self.shared.control.lock();
        control.pending_options = Some(options);
        self.shared.wake.notify_one();
    }

    /// Asks the worker to stop at its next wait point without joining.
    pub fn request_stop(&self) {
        let mut control = self.shared.control.lock();
        control.stop_requested = true;
        self.shared.wake.notify_one();
    }

    /// Stops the worker and waits for its thread to exit.
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Pitch worker thread panicked");
            }
        }
    }

    pub fn state(&self) -> WorkerState {
        self.shared.control.lock().state
    }

    /// The snapshot the worker publishes into. Lock it only to copy out.
    pub fn snapshot(&self) -> Arc<Mutex<VisualizationSnapshot>> {
        Arc::clone(&self.snapshot)
    }

    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            callbacks: self.shared.callbacks.load(Ordering::Relaxed),
            coalesced_callbacks: self.shared.coalesced.load(Ordering::Relaxed),
        }
    }
}

impl Drop for PitchDetectionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
