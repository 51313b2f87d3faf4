//! Playback state shared between the output callback, the position reporter
//! and the control thread.
//!
//! Field ownership:
//! - `cursor` is written only by `render` (the hardware thread) and by the
//!   control thread while no stream is running.
//! - `playing`, `paused`, `exhausted`, `armed` are plain flags; any thread may read them.
//! - `samples` is swapped only by the control thread (`load` / `reset`); the
//!   callback takes a lock-free snapshot per block.
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Real samples were written; keep the stream going.
    Continue,
    /// Nothing left to play (or playback halted). The block is silence.
    Complete,
}

pub struct PlaybackTransport {
    samples: ArcSwapOption<Vec<f32>>,
    sample_rate: AtomicU32,
    channels: AtomicUsize,
    cursor: AtomicU64,
    playing: AtomicBool,
    paused: AtomicBool,
    exhausted: AtomicBool,
    // Set while a session owes the caller a "finished" notification
    armed: AtomicBool,
}

impl Default for PlaybackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackTransport {
    pub fn new() -> Self {
        Self {
            samples: ArcSwapOption::empty(),
            sample_rate: AtomicU32::new(0),
            channels: AtomicUsize::new(0),
            cursor: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            exhausted: AtomicBool::new(false),
            armed: AtomicBool::new(false),
        }
    }

    /// Installs the buffer for a new session. Call only while no stream is running.
    pub fn load(&self, samples: Arc<Vec<f32>>, sample_rate: u32, channels: u16, start_frame: u64) {
        self.sample_rate.store(sample_rate, Ordering::Relaxed);
        self.channels.store(channels as usize, Ordering::Relaxed);
        self.cursor.store(start_frame, Ordering::Release);
        self.exhausted.store(false, Ordering::Relaxed);
        self.samples.store(Some(samples));
    }

    /// Marks the loaded session as playing and arms the finished latch.
    pub fn begin(&self) {
        self.paused.store(false, Ordering::Release);
        self.exhausted.store(false, Ordering::Release);
        self.armed.store(true, Ordering::Release);
        self.playing.store(true, Ordering::Release);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Stops rendering. The callback writes silence from now on.
    pub fn halt(&self) {
        self.playing.store(false, Ordering::Release);
        self.paused.store(false, Ordering::Release);
    }

    /// Drops the buffer and rewinds. Call only after the stream is closed.
    pub fn reset(&self) {
        self.samples.store(None);
        self.cursor.store(0, Ordering::Release);
        self.exhausted.store(false, Ordering::Relaxed);
    }

    /// Session ends without owing a notification (failed start).
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    /// Exactly-once latch for the "finished" notification. Returns true for the
    /// single caller that should fire it.
    pub fn finish(&self) -> bool {
        self.armed.swap(false, Ordering::AcqRel)
    }

    /// Output callback body. Never allocates or blocks.
    pub fn render(&self, out: &mut [f32]) -> RenderStatus {
        if !self.playing.load(Ordering::Acquire) || self.paused.load(Ordering::Acquire) {
            out.fill(0.0);
            return RenderStatus::Complete;
        }

        let channels = self.channels.load(Ordering::Relaxed);
        let guard = self.samples.load();
        let samples = match &*guard {
            Some(samples) if channels > 0 => samples,
            _ => {
                out.fill(0.0);
                self.mark_exhausted();
                return RenderStatus::Complete;
            }
        };

        let requested = out.len() / channels;
        let total = samples.len() / channels;
        let cursor = (self.cursor.load(Ordering::Acquire) as usize).min(total);
        let frames = requested.min(total - cursor);

        if frames == 0 {
            out.fill(0.0);
            self.mark_exhausted();
            return RenderStatus::Complete;
        }

        let start = cursor * channels;
        let count = frames * channels;
        out[..count].copy_from_slice(&samples[start..start + count]);
        // Short final block: pad with silence
        out[count..].fill(0.0);

        self.cursor.store((cursor + frames) as u64, Ordering::Release);
        RenderStatus::Continue
    }

    fn mark_exhausted(&self) {
        // Order matters: a reader that sees `playing == false` must also see `exhausted`
        self.exhausted.store(true, Ordering::Release);
        self.playing.store(false, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// True once the callback ran off the end of the buffer.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }

    pub fn cursor_frame(&self) -> u64 {
        self.cursor.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    pub fn position_seconds(&self) -> f64 {
        let rate = self.sample_rate();
        if rate == 0 {
            return 0.0;
        }
        self.cursor_frame() as f64 / rate as f64
    }
}
