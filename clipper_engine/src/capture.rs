use crate::backend::{AudioBackend, AudioStream, StreamFormat};
use clipper_shared::config::CaptureConfig;
use clipper_shared::SampleBuffer;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{error, info, warn};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub type CompletionCallback = Box<dyn FnMut(SampleBuffer) + Send + 'static>;

const DRAIN_INTERVAL: Duration = Duration::from_millis(5);
const DRAIN_CHUNK: usize = 4096;

/// Moves samples from the callback ring into the accumulation buffer.
/// The accumulation lock is held only for each append.
fn drain_into(consumer: &mut HeapCons<f32>, scratch: &mut [f32], accumulated: &Mutex<Vec<f32>>) {
    loop {
        let n = consumer.pop_slice(scratch);
        if n == 0 {
            break;
        }
        accumulated.lock().extend_from_slice(&scratch[..n]);
    }
}

struct DrainWorker {
    shutdown_tx: Sender<()>,
    handle: JoinHandle<HeapCons<f32>>,
}

impl DrainWorker {
    fn spawn(mut consumer: HeapCons<f32>, accumulated: Arc<Mutex<Vec<f32>>>) -> Self {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let handle = thread::spawn(move || {
            let mut scratch = vec![0.0f32; DRAIN_CHUNK];
            loop {
                match shutdown_rx.recv_timeout(DRAIN_INTERVAL) {
                    Err(RecvTimeoutError::Timeout) => drain_into(&mut consumer, &mut scratch, &accumulated),
                    _ => break,
                }
            }
            // Hand the consumer back so the caller can take whatever is left
            consumer
        });
        Self { shutdown_tx, handle }
    }
}

/// Records from the default input device into a growing buffer.
///
/// The hardware callback only copies into a pre-allocated lock-free ring; a
/// drain thread moves ring contents into the accumulation buffer. On stop the
/// finished buffer is handed to the completion callback on the caller's thread.
pub struct CaptureEngine {
    backend: Arc<dyn AudioBackend>,
    ring_seconds: f32,
    recording: Arc<AtomicBool>,
    overflowed: Arc<AtomicU64>,
    accumulated: Arc<Mutex<Vec<f32>>>,
    stream: Option<Box<dyn AudioStream>>,
    drain: Option<DrainWorker>,
    format: StreamFormat,
    on_complete: Option<CompletionCallback>,
}

impl CaptureEngine {
    pub fn new(backend: Arc<dyn AudioBackend>, config: &CaptureConfig) -> Self {
        Self {
            backend,
            ring_seconds: config.ring_seconds,
            recording: Arc::new(AtomicBool::new(false)),
            overflowed: Arc::new(AtomicU64::new(0)),
            accumulated: Arc::new(Mutex::new(Vec::new())),
            stream: None,
            drain: None,
            format: StreamFormat {
                sample_rate: config.sample_rate,
                channels: config.channels,
            },
            on_complete: None,
        }
    }

    pub fn set_completion_callback<F>(&mut self, callback: F)
    where
        F: FnMut(SampleBuffer) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
    }

    /// Opens the input stream and starts accumulating. Returns false with no
    /// state change if already recording or the device cannot be started.
    pub fn start_recording(&mut self, sample_rate: u32, channels: u16) -> bool {
        if self.recording.load(Ordering::Acquire) {
            warn!("[Capture] Already recording");
            return false;
        }

        let format = StreamFormat { sample_rate, channels };
        let capacity = CaptureConfig {
            sample_rate,
            channels,
            ring_seconds: self.ring_seconds,
        }
        .ring_capacity();
        let (mut producer, consumer) = HeapRb::<f32>::new(capacity).split();

        self.accumulated.lock().clear();
        self.overflowed.store(0, Ordering::Relaxed);
        self.recording.store(true, Ordering::Release);

        let recording = self.recording.clone();
        let overflowed = self.overflowed.clone();
        let frame_len = channels.max(1) as usize;
        let callback = move |data: &[f32]| {
            if !recording.load(Ordering::Acquire) {
                return;
            }
            // Whole frames only, so a full ring never splits a frame
            let fit = data.len().min(producer.vacant_len()) / frame_len * frame_len;
            producer.push_slice(&data[..fit]);
            if fit < data.len() {
                overflowed.fetch_add((data.len() - fit) as u64, Ordering::Relaxed);
            }
        };

        match self.backend.open_input(format, Box::new(callback)) {
            Ok(stream) => self.stream = Some(stream),
            Err(e) => {
                error!("[Capture] Failed to start input: {}", e);
                self.recording.store(false, Ordering::Release);
                return false;
            }
        }

        self.drain = Some(DrainWorker::spawn(consumer, self.accumulated.clone()));
        self.format = format;
        info!("[Capture] Recording started: {}Hz, {} channels", sample_rate, channels);
        true
    }

    /// Closes the stream and delivers what was captured. No-op when idle; the
    /// completion callback is skipped if nothing arrived.
    pub fn stop_recording(&mut self) {
        if !self.recording.swap(false, Ordering::AcqRel) {
            return;
        }

        // Close the stream first so no block lands after the final drain
        drop(self.stream.take());

        if let Some(worker) = self.drain.take() {
            drop(worker.shutdown_tx);
            match worker.handle.join() {
                Ok(mut consumer) => {
                    let mut scratch = vec![0.0f32; DRAIN_CHUNK];
                    drain_into(&mut consumer, &mut scratch, &self.accumulated);
                }
                Err(_) => error!("[Capture] Drain thread panicked"),
            }
        }

        let dropped = self.overflowed.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            warn!("[Capture] {} samples dropped: drain thread fell behind", dropped);
        }

        let mut samples = std::mem::take(&mut *self.accumulated.lock());
        let channels = self.format.channels.max(1) as usize;
        samples.truncate(samples.len() / channels * channels);

        if samples.is_empty() {
            info!("[Capture] Recording stopped, nothing captured");
            return;
        }

        let buffer = SampleBuffer::from_parts(samples, self.format.sample_rate, self.format.channels);
        info!(
            "[Capture] Recording stopped: {} frames ({:.2}s)",
            buffer.frames(),
            buffer.duration_seconds()
        );
        if let Some(cb) = self.on_complete.as_mut() {
            cb(buffer);
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    /// Seconds moved out of the ring so far. Lags the device by up to one drain interval.
    pub fn recorded_seconds(&self) -> f64 {
        if self.format.sample_rate == 0 || self.format.channels == 0 {
            return 0.0;
        }
        let samples = self.accumulated.lock().len();
        samples as f64 / (self.format.sample_rate as f64 * self.format.channels as f64)
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        self.stop_recording();
    }
}
