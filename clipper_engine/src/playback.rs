use crate::backend::{AudioBackend, AudioStream, StreamFormat};
use crate::transport::PlaybackTransport;
use clipper_shared::SampleBuffer;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub type PositionCallback = Arc<dyn Fn(f64) + Send + Sync + 'static>;
pub type FinishedCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Background loop that reports the playback position.
/// Dropping `shutdown_tx` wakes it immediately.
struct PositionReporter {
    shutdown_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl PositionReporter {
    fn spawn(
        transport: Arc<PlaybackTransport>,
        interval: Duration,
        on_position: Option<PositionCallback>,
        on_finished: Option<FinishedCallback>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let handle = thread::spawn(move || {
            loop {
                if !transport.is_playing() {
                    // Ran off the end on its own; the caller still gets exactly one notification
                    if transport.is_exhausted() && transport.finish() {
                        if let Some(cb) = &on_finished {
                            cb();
                        }
                    }
                    break;
                }
                if !transport.is_paused() {
                    if let Some(cb) = &on_position {
                        cb(transport.position_seconds());
                    }
                }
                match shutdown_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
            }
        });
        Self { shutdown_tx, handle }
    }

    fn shutdown(self) {
        drop(self.shutdown_tx);
        if self.handle.join().is_err() {
            error!("[Playback] Position reporter panicked");
        }
    }
}

/// Plays a `SampleBuffer` through an output stream.
///
/// `Stopped --play--> Playing --pause--> Paused`; resuming from `Paused` means
/// calling `play` again at the last reported position. `stop` (or running off
/// the end) returns to `Stopped` and fires the finished callback once per
/// started session.
///
/// `stop` joins the reporter thread, so it must not be called from inside the
/// position or finished callbacks.
pub struct PlaybackEngine {
    backend: Arc<dyn AudioBackend>,
    transport: Arc<PlaybackTransport>,
    stream: Option<Box<dyn AudioStream>>,
    reporter: Option<PositionReporter>,
    position_interval: Duration,
    on_position: Option<PositionCallback>,
    on_finished: Option<FinishedCallback>,
}

impl PlaybackEngine {
    pub fn new(backend: Arc<dyn AudioBackend>, position_interval: Duration) -> Self {
        Self {
            backend,
            transport: Arc::new(PlaybackTransport::new()),
            stream: None,
            reporter: None,
            position_interval,
            on_position: None,
            on_finished: None,
        }
    }

    pub fn set_position_callback<F>(&mut self, callback: F)
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.on_position = Some(Arc::new(callback));
    }

    pub fn set_finished_callback<F>(&mut self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_finished = Some(Arc::new(callback));
    }

    /// Starts playing `buffer` from `start_position` seconds. Any running
    /// session is stopped first. Returns false (and stays stopped) if the
    /// buffer is empty or the output stream cannot be opened.
    pub fn play(&mut self, buffer: &SampleBuffer, start_position: f64) -> bool {
        self.stop();

        if buffer.is_empty() || !buffer.has_valid_format() {
            warn!("[Playback] Nothing to play");
            return false;
        }

        let first_frame = start_frame(buffer, start_position);
        self.transport.load(
            buffer.shared_samples(),
            buffer.sample_rate(),
            buffer.channels(),
            first_frame as u64,
        );
        self.transport.begin();

        let format = StreamFormat {
            sample_rate: buffer.sample_rate(),
            channels: buffer.channels(),
        };
        let transport = self.transport.clone();
        let opened = self.backend.open_output(
            format,
            Box::new(move |out: &mut [f32]| {
                transport.render(out);
            }),
        );

        match opened {
            Ok(stream) => self.stream = Some(stream),
            Err(e) => {
                error!("[Playback] Failed to start output: {}", e);
                self.transport.halt();
                self.transport.disarm();
                self.transport.reset();
                return false;
            }
        }

        self.reporter = Some(PositionReporter::spawn(
            self.transport.clone(),
            self.position_interval,
            self.on_position.clone(),
            self.on_finished.clone(),
        ));

        info!(
            "[Playback] Playing {} frames from frame {} ({:.3}s)",
            buffer.frames(),
            first_frame,
            self.transport.position_seconds()
        );
        true
    }

    /// Pauses the output stream, keeping the cursor. No-op unless playing.
    pub fn pause(&mut self) {
        if !self.transport.is_playing() || self.transport.is_paused() {
            return;
        }
        self.transport.pause();
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                warn!("[Playback] Failed to pause stream: {}", e);
            }
        }
        debug!("[Playback] Paused at {:.3}s", self.transport.position_seconds());
    }

    /// Tears everything down. Safe to call in any state.
    pub fn stop(&mut self) {
        self.transport.halt();

        if let Some(stream) = self.stream.take() {
            drop(stream);
            debug!("[Playback] Output stream closed");
        }
        if let Some(reporter) = self.reporter.take() {
            reporter.shutdown();
        }

        self.transport.reset();

        if self.transport.finish() {
            if let Some(cb) = &self.on_finished {
                cb();
            }
        }
    }

    /// Playing and not paused.
    pub fn is_playing(&self) -> bool {
        self.transport.is_playing() && !self.transport.is_paused()
    }

    pub fn is_paused(&self) -> bool {
        self.transport.is_playing() && self.transport.is_paused()
    }

    pub fn current_position(&self) -> f64 {
        self.transport.position_seconds()
    }

    pub fn cursor_frame(&self) -> u64 {
        self.transport.cursor_frame()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// `floor(start * rate)` with the start clamped to `[0, duration]`.
fn start_frame(buffer: &SampleBuffer, start_position: f64) -> usize {
    let duration = buffer.duration_seconds();
    let start = if start_position.is_nan() {
        0.0
    } else {
        start_position.clamp(0.0, duration)
    };
    let frame = (start * buffer.sample_rate() as f64).floor() as usize;
    frame.min(buffer.frames())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ManualBackend;
    use crossbeam_channel::unbounded;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn one_second() -> SampleBuffer {
        let samples = (0..44100).map(|i| i as f32 / 44100.0).collect();
        SampleBuffer::new(samples, 44100, 1).unwrap()
    }

    fn engine_with(backend: &ManualBackend) -> (PlaybackEngine, Arc<AtomicUsize>) {
        let mut engine = PlaybackEngine::new(Arc::new(backend.clone()), Duration::from_millis(5));
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();
        engine.set_finished_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (engine, finished)
    }

    #[test]
    fn test_start_position_sets_cursor_and_first_block() {
        let backend = ManualBackend::new();
        let (mut engine, _) = engine_with(&backend);
        let buffer = one_second();

        assert!(engine.play(&buffer, 0.5));
        assert_eq!(engine.cursor_frame(), 22050);

        let out = backend.pull_output(1024).unwrap();
        assert_eq!(out.as_slice(), &buffer.samples()[22050..23074]);
        assert_eq!(engine.cursor_frame(), 23074);
    }

    #[test]
    fn test_start_position_is_clamped() {
        let backend = ManualBackend::new();
        let (mut engine, _) = engine_with(&backend);
        let buffer = one_second();

        assert!(engine.play(&buffer, -3.0));
        assert_eq!(engine.cursor_frame(), 0);
        assert!(engine.play(&buffer, 99.0));
        assert_eq!(engine.cursor_frame(), 44100);
    }

    #[test]
    fn test_play_empty_buffer_fails() {
        let backend = ManualBackend::new();
        let (mut engine, finished) = engine_with(&backend);

        assert!(!engine.play(&SampleBuffer::empty(44100, 1), 0.0));
        assert!(!engine.is_playing());
        assert!(!backend.has_output_stream());
        assert_eq!(engine.current_position(), 0.0);
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_play_without_device_reverts_to_stopped() {
        let backend = ManualBackend::without_devices();
        let (mut engine, finished) = engine_with(&backend);

        assert!(!engine.play(&one_second(), 0.25));
        assert!(!engine.is_playing());
        assert_eq!(engine.cursor_frame(), 0);

        engine.stop();
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stop_fires_finished_once_per_session() {
        let backend = ManualBackend::new();
        let (mut engine, finished) = engine_with(&backend);

        engine.stop();
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        assert!(engine.play(&one_second(), 0.0));
        engine.stop();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(engine.cursor_frame(), 0);
        assert!(!backend.has_output_stream());

        engine.stop();
        assert_eq!(finished.load(Ordering::SeqCst), 1);

        // Restarting implicitly stops the running session
        assert!(engine.play(&one_second(), 0.0));
        assert!(engine.play(&one_second(), 0.0));
        assert_eq!(finished.load(Ordering::SeqCst), 2);
        engine.stop();
        assert_eq!(finished.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_natural_end_fires_finished() {
        let backend = ManualBackend::new();
        let mut engine = PlaybackEngine::new(Arc::new(backend.clone()), Duration::from_millis(5));
        let (done_tx, done_rx) = unbounded();
        engine.set_finished_callback(move || {
            let _ = done_tx.send(());
        });

        let short = SampleBuffer::new(vec![0.25; 100], 1000, 1).unwrap();
        assert!(engine.play(&short, 0.0));

        let first = backend.pull_output(64).unwrap();
        assert_eq!(first, vec![0.25; 64]);
        let last = backend.pull_output(64).unwrap();
        assert_eq!(&last[..36], &[0.25; 36]);
        assert_eq!(&last[36..], &[0.0; 28]);
        let silent = backend.pull_output(64).unwrap();
        assert_eq!(silent, vec![0.0; 64]);

        assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok());
        assert!(!engine.is_playing());

        // The session already reported; stop tears down quietly
        engine.stop();
        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_position_reports_follow_cursor() {
        let backend = ManualBackend::new();
        let mut engine = PlaybackEngine::new(Arc::new(backend.clone()), Duration::from_millis(5));
        let (pos_tx, pos_rx) = unbounded();
        engine.set_position_callback(move |p| {
            let _ = pos_tx.send(p);
        });

        assert!(engine.play(&one_second(), 0.5));
        let first = pos_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first, 0.5);

        backend.pull_output(4410).unwrap();
        let later = loop {
            let p = pos_rx.recv_timeout(Duration::from_secs(2)).unwrap();
            if p > 0.5 {
                break p;
            }
        };
        assert!((later - 0.6).abs() < 1e-9);

        engine.stop();
        // Reporter is joined: nothing arrives after stop returns
        while pos_rx.try_recv().is_ok() {}
        thread::sleep(Duration::from_millis(20));
        assert!(pos_rx.try_recv().is_err());
    }

    #[test]
    fn test_pause_keeps_cursor() {
        let backend = ManualBackend::new();
        let (mut engine, finished) = engine_with(&backend);

        assert!(engine.play(&one_second(), 0.0));
        backend.pull_output(2205).unwrap();
        engine.pause();

        assert!(engine.is_paused());
        assert!(!engine.is_playing());
        assert!(backend.output_paused());
        assert!(backend.pull_output(512).is_none());
        assert!((engine.current_position() - 0.05).abs() < 1e-9);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        // Resume is a fresh play at the reported position
        let resume_at = engine.current_position();
        assert!(engine.play(&one_second(), resume_at));
        assert_eq!(engine.cursor_frame(), 2205);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
