//! Caller-side controller: the working buffer plus everything a front end
//! shows about it. Engine callbacks arrive on their own threads; they are
//! queued as `SessionEvent`s and applied on the control thread by
//! `pump_events`.

use crate::backend::AudioBackend;
use crate::capture::CaptureEngine;
use crate::codec::{AudioCodec, ExportFormat};
use crate::editor::{self, EditOutcome};
use crate::playback::PlaybackEngine;
use crate::waveform::{Grab, MarkerState, WaveformView};
use clipper_shared::{ClipperConfig, ClipperResult, SampleBuffer};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    RecordingComplete(SampleBuffer),
    Position(f64),
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Idle,
    Active,
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub kind: StatusKind,
}

impl Status {
    fn new(text: impl Into<String>, kind: StatusKind) -> Self {
        Self { text: text.into(), kind }
    }
}

pub struct ClipperSession {
    capture: CaptureEngine,
    playback: PlaybackEngine,
    codec: Box<dyn AudioCodec>,
    config: ClipperConfig,
    view: WaveformView,
    events: Receiver<SessionEvent>,

    buffer: SampleBuffer,
    waveform: Vec<f32>,
    markers: MarkerState,
    grab: Option<Grab>,
    playback_position: f64,
    volume_db: f64,
    status: Status,
}

impl ClipperSession {
    pub fn new(backend: Arc<dyn AudioBackend>, codec: Box<dyn AudioCodec>, config: ClipperConfig) -> Self {
        let (tx, events) = unbounded();

        let mut capture = CaptureEngine::new(backend.clone(), &config.capture);
        let complete_tx = tx.clone();
        capture.set_completion_callback(move |buffer| {
            let _ = complete_tx.send(SessionEvent::RecordingComplete(buffer));
        });

        let interval = Duration::from_millis(config.playback.position_interval_ms);
        let mut playback = PlaybackEngine::new(backend, interval);
        let position_tx = tx.clone();
        playback.set_position_callback(move |seconds| {
            let _ = position_tx.send(SessionEvent::Position(seconds));
        });
        playback.set_finished_callback(move || {
            let _ = tx.send(SessionEvent::Finished);
        });

        let buffer = SampleBuffer::empty(config.capture.sample_rate, config.capture.channels);
        Self {
            capture,
            playback,
            codec,
            view: WaveformView::from(&config.waveform),
            config,
            events,
            buffer,
            waveform: Vec::new(),
            markers: MarkerState::default(),
            grab: None,
            playback_position: 0.0,
            volume_db: 0.0,
            status: Status::new("Ready to record", StatusKind::Idle),
        }
    }

    // --- Events ---

    /// Applies every queued engine event. Returns how many were applied.
    pub fn pump_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Like `pump_events`, but waits up to `timeout` for the first event.
    pub fn wait_for_events(&mut self, timeout: Duration) -> usize {
        match self.events.recv_timeout(timeout) {
            Ok(event) => {
                self.apply(event);
                1 + self.pump_events()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::RecordingComplete(buffer) => {
                let duration = buffer.duration_seconds();
                self.replace_buffer(buffer);
                self.status = Status::new(format!("Recording complete ({:.2}s)", duration), StatusKind::Success);
            }
            SessionEvent::Position(seconds) => {
                // Reports queued before a pause or stop are stale
                if self.playback.is_playing() {
                    self.playback_position = seconds;
                }
            }
            SessionEvent::Finished => {
                // The implicit stop inside a restart also reports; ignore it
                if !self.playback.is_playing() && !self.playback.is_paused() {
                    self.playback_position = 0.0;
                    debug!("[Session] Playback finished");
                }
            }
        }
    }

    fn replace_buffer(&mut self, buffer: SampleBuffer) {
        self.buffer = buffer;
        self.waveform = self.view.project(&self.buffer);
        self.markers.clear();
        self.grab = None;
        self.playback_position = 0.0;
    }

    // --- Recording ---

    /// Starts recording, or stops and takes the result as the working buffer.
    pub fn toggle_recording(&mut self) -> bool {
        if self.capture.is_recording() {
            self.status = Status::new("No audio recorded", StatusKind::Error);
            self.capture.stop_recording();
            self.pump_events();
            return true;
        }

        self.stop_playback();
        let capture = &self.config.capture;
        if self.capture.start_recording(capture.sample_rate, capture.channels) {
            self.status = Status::new("Recording...", StatusKind::Active);
            true
        } else {
            self.status = Status::new("Could not start recording", StatusKind::Error);
            false
        }
    }

    // --- Files ---

    pub fn load(&mut self, path: &Path) -> ClipperResult<()> {
        self.stop_playback();
        match self.codec.load(path) {
            Ok(buffer) => {
                let duration = buffer.duration_seconds();
                self.replace_buffer(buffer);
                self.status = Status::new(
                    format!("Loaded: {} ({:.2}s)", display_name(path), duration),
                    StatusKind::Success,
                );
                Ok(())
            }
            Err(e) => {
                self.status = Status::new(format!("Error loading file: {}", e), StatusKind::Error);
                Err(e)
            }
        }
    }

    pub fn save(&mut self, path: &Path, format: ExportFormat) -> ClipperResult<()> {
        match self.codec.save(path, &self.buffer, format) {
            Ok(()) => {
                self.status = Status::new(format!("Saved: {}", display_name(path)), StatusKind::Success);
                Ok(())
            }
            Err(e) => {
                self.status = Status::new(format!("Error saving file: {}", e), StatusKind::Error);
                Err(e)
            }
        }
    }

    // --- Playback ---

    /// Pauses if playing; otherwise plays from the current position. A
    /// position at the very end restarts from the top.
    pub fn toggle_playback(&mut self) -> bool {
        if self.buffer.is_empty() {
            self.status = Status::new("No audio to play", StatusKind::Error);
            return false;
        }

        if self.playback.is_playing() {
            self.playback.pause();
            self.playback_position = self.playback.current_position();
            self.status = Status::new(format!("Paused at {:.2}s", self.playback_position), StatusKind::Info);
            return true;
        }

        let duration = self.buffer.duration_seconds();
        if self.playback_position >= duration {
            self.playback_position = 0.0;
        }
        self.start_playback(self.playback_position)
    }

    fn start_playback(&mut self, start: f64) -> bool {
        if self.capture.is_recording() {
            warn!("[Session] Cannot play while recording");
            return false;
        }
        // Retire the previous session and its queued reports first
        self.playback.stop();
        self.pump_events();

        if !self.playback.play(&self.buffer, start) {
            self.status = Status::new("Playback failed", StatusKind::Error);
            return false;
        }
        self.playback_position = self.playback.current_position();
        self.status = Status::new("Playing...", StatusKind::Active);
        true
    }

    pub fn stop_playback(&mut self) {
        let was_active = self.playback.is_playing() || self.playback.is_paused();
        self.playback.stop();
        self.pump_events();
        self.playback_position = 0.0;
        if was_active {
            self.status = Status::new("Stopped", StatusKind::Idle);
        }
    }

    /// Moves the playhead. A running playback restarts at the new position; a
    /// paused one will resume from it.
    pub fn seek(&mut self, seconds: f64) {
        let duration = self.buffer.duration_seconds();
        let target = if seconds.is_nan() { 0.0 } else { seconds.clamp(0.0, duration) };
        if self.playback.is_playing() {
            self.start_playback(target);
        }
        self.playback_position = target;
    }

    // --- Edits ---

    pub fn set_volume_db(&mut self, gain_db: f64) {
        self.volume_db = gain_db;
    }

    /// Applies the pending gain to the working buffer.
    pub fn apply_volume(&mut self) -> bool {
        if self.buffer.is_empty() {
            self.status = Status::new("No audio to adjust", StatusKind::Error);
            return false;
        }
        self.stop_playback();
        let gain_db = self.volume_db;
        let applied = self.commit(editor::adjust_volume(&self.buffer, gain_db), false);
        if applied {
            self.status = Status::new(format!("Volume adjusted by {:.1} dB", gain_db), StatusKind::Info);
            info!("[Session] Gain {:+.1} dB applied", gain_db);
        }
        applied
    }

    pub fn trim_to_selection(&mut self) -> bool {
        let Some((start, end)) = self.checked_selection() else {
            return false;
        };
        self.stop_playback();
        let applied = self.commit(editor::trim_to_region(&self.buffer, start, end), true);
        if applied {
            self.status = Status::new(format!("Trimmed to: {:.2}s to {:.2}s", start, end), StatusKind::Info);
            info!("[Session] Trimmed to {:.3}s..{:.3}s, {} frames left", start, end, self.buffer.frames());
        }
        applied
    }

    pub fn remove_selection(&mut self) -> bool {
        let Some((start, end)) = self.checked_selection() else {
            return false;
        };
        self.stop_playback();
        let applied = self.commit(editor::remove_region(&self.buffer, start, end), true);
        if applied {
            self.status = Status::new(format!("Removed region: {:.2}s to {:.2}s", start, end), StatusKind::Error);
            info!("[Session] Removed {:.3}s..{:.3}s, {} frames left", start, end, self.buffer.frames());
        }
        applied
    }

    fn checked_selection(&mut self) -> Option<(f64, f64)> {
        if self.buffer.is_empty() {
            self.status = Status::new("No audio to edit", StatusKind::Error);
            return None;
        }
        let selection = self.selection();
        if selection.is_none() {
            self.status = Status::new("Place start and end markers to select a region", StatusKind::Error);
        }
        selection
    }

    /// Takes an edit result as the new working buffer.
    fn commit(&mut self, outcome: EditOutcome, clear_markers: bool) -> bool {
        if !outcome.is_changed() {
            return false;
        }
        let markers = self.markers;
        self.replace_buffer(outcome.into_buffer());
        if !clear_markers {
            self.markers = markers;
        }
        true
    }

    // --- Markers ---

    pub fn clear_markers(&mut self) {
        self.markers.clear();
        self.grab = None;
    }

    /// A press on the waveform at pixel `x`.
    pub fn press(&mut self, x: i32) -> Grab {
        let playhead = self.playhead_pixel();
        let grab = self.markers.press(x, playhead, self.view.tolerance);
        self.grab = Some(grab);
        grab
    }

    /// Drags whatever the last press grabbed. Dragging the playhead seeks.
    pub fn drag(&mut self, x: i32) {
        match self.grab {
            Some(Grab::Playhead) => {
                let x = x.clamp(0, self.view.width.max(0));
                let seconds = self.view.pixel_to_time(x, self.buffer.duration_seconds());
                self.seek(seconds);
            }
            Some(grab) => self.markers.drag(grab, x, self.view.width),
            None => {}
        }
    }

    pub fn release(&mut self) {
        self.grab = None;
    }

    /// The playhead is grabbable whenever there is audio, stopped or not.
    fn playhead_pixel(&self) -> Option<i32> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(self.view.time_to_pixel(self.playback_position, self.buffer.duration_seconds()))
    }

    // --- Accessors ---

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn waveform(&self) -> &[f32] {
        &self.waveform
    }

    pub fn markers(&self) -> MarkerState {
        self.markers
    }

    /// Ordered selection in seconds, if both markers enclose a non-empty span.
    pub fn selection(&self) -> Option<(f64, f64)> {
        self.markers.region(self.view.width, self.buffer.duration_seconds())
    }

    pub fn view(&self) -> WaveformView {
        self.view
    }

    pub fn playback_position(&self) -> f64 {
        self.playback_position
    }

    pub fn duration(&self) -> f64 {
        self.buffer.duration_seconds()
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_recording()
    }

    pub fn recorded_seconds(&self) -> f64 {
        self.capture.recorded_seconds()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn is_paused(&self) -> bool {
        self.playback.is_paused()
    }

    pub fn volume_db(&self) -> f64 {
        self.volume_db
    }

    pub fn status(&self) -> &Status {
        &self.status
    }
}

impl Drop for ClipperSession {
    fn drop(&mut self) {
        self.capture.stop_recording();
        self.playback.stop();
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
