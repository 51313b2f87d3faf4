//! Platform audio seam.
//!
//! The capture and playback engines only ever see `AudioBackend`: they hand it a
//! format and a real-time callback and get back a stream handle. Dropping the
//! handle closes the stream. `CpalBackend` talks to the OS through cpal;
//! `ManualBackend` lets the caller invoke the registered callbacks directly,
//! which is how the engines are exercised without sound hardware.

use clipper_shared::{ClipperError, ClipperResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error, info};
use parking_lot::Mutex;
use std::sync::Arc;

/// Called on the hardware thread with one block of interleaved input samples.
pub type InputCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;
/// Called on the hardware thread to fill one block of interleaved output samples.
pub type OutputCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// A running hardware stream. Dropping it stops and closes the stream.
pub trait AudioStream {
    fn pause(&self) -> ClipperResult<()>;
}

pub trait AudioBackend {
    /// Opens and starts an input stream on the default input device.
    fn open_input(&self, format: StreamFormat, callback: InputCallback) -> ClipperResult<Box<dyn AudioStream>>;

    /// Opens and starts an output stream on the default output device.
    fn open_output(&self, format: StreamFormat, callback: OutputCallback) -> ClipperResult<Box<dyn AudioStream>>;

    fn input_device_names(&self) -> ClipperResult<Vec<String>>;
    fn output_device_names(&self) -> ClipperResult<Vec<String>>;
}

// --- cpal ---

pub struct CpalBackend {
    host: cpal::Host,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self { host: cpal::default_host() }
    }

    fn stream_config(format: StreamFormat) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels: format.channels,
            sample_rate: format.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

struct CpalStream(cpal::Stream);

impl AudioStream for CpalStream {
    fn pause(&self) -> ClipperResult<()> {
        self.0.pause().map_err(|e| ClipperError::StreamStart(e.to_string()))
    }
}

fn report_stream_error(kind: &'static str) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err: cpal::StreamError| {
        let s = err.to_string();
        // Under/overruns are routine on busy machines
        if !s.contains("underrun") && !s.contains("overrun") {
            error!("{} stream error: {}", kind, s);
        }
    }
}

impl AudioBackend for CpalBackend {
    fn open_input(&self, format: StreamFormat, mut callback: InputCallback) -> ClipperResult<Box<dyn AudioStream>> {
        let device = self.host.default_input_device().ok_or(ClipperError::NoInputDevice)?;
        let config = Self::stream_config(format);
        debug!("Opening input stream: {:?}", config);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| callback(data),
                report_stream_error("input"),
                None,
            )
            .map_err(|e| ClipperError::StreamBuild(e.to_string()))?;
        stream.play().map_err(|e| ClipperError::StreamStart(e.to_string()))?;

        info!("Input stream started: {}Hz, {} channels", format.sample_rate, format.channels);
        Ok(Box::new(CpalStream(stream)))
    }

    fn open_output(&self, format: StreamFormat, mut callback: OutputCallback) -> ClipperResult<Box<dyn AudioStream>> {
        let device = self.host.default_output_device().ok_or(ClipperError::NoOutputDevice)?;
        let config = Self::stream_config(format);
        debug!("Opening output stream: {:?}", config);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| callback(data),
                report_stream_error("output"),
                None,
            )
            .map_err(|e| ClipperError::StreamBuild(e.to_string()))?;
        stream.play().map_err(|e| ClipperError::StreamStart(e.to_string()))?;

        info!("Output stream started: {}Hz, {} channels", format.sample_rate, format.channels);
        Ok(Box::new(CpalStream(stream)))
    }

    #[allow(deprecated)]
    fn input_device_names(&self) -> ClipperResult<Vec<String>> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| ClipperError::StreamBuild(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|d| d.name().ok())
            .collect();
        Ok(devices)
    }

    #[allow(deprecated)]
    fn output_device_names(&self) -> ClipperResult<Vec<String>> {
        let devices = self
            .host
            .output_devices()
            .map_err(|e| ClipperError::StreamBuild(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|d| d.name().ok())
            .collect();
        Ok(devices)
    }
}

// --- manual ---

#[derive(Default)]
struct ManualState {
    next_id: u64,
    input: Option<(u64, InputCallback)>,
    output: Option<(u64, OutputCallback)>,
    input_paused: bool,
    output_paused: bool,
    last_output_format: Option<StreamFormat>,
    no_input: bool,
    no_output: bool,
    fail_start: bool,
}

/// Backend whose "hardware thread" is whoever calls `feed_input` or
/// `render_output`. Cloning shares the same device state.
#[derive(Clone, Default)]
pub struct ManualBackend {
    state: Arc<Mutex<ManualState>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Input,
    Output,
}

struct ManualStream {
    state: Arc<Mutex<ManualState>>,
    direction: Direction,
    id: u64,
}

impl AudioStream for ManualStream {
    fn pause(&self) -> ClipperResult<()> {
        let mut state = self.state.lock();
        match self.direction {
            Direction::Input => state.input_paused = true,
            Direction::Output => state.output_paused = true,
        }
        Ok(())
    }
}

impl Drop for ManualStream {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        match self.direction {
            Direction::Input => {
                if state.input.as_ref().map(|(id, _)| *id) == Some(self.id) {
                    state.input = None;
                }
            }
            Direction::Output => {
                if state.output.as_ref().map(|(id, _)| *id) == Some(self.id) {
                    state.output = None;
                }
            }
        }
    }
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A machine with no audio devices at all.
    pub fn without_devices() -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state.lock();
            state.no_input = true;
            state.no_output = true;
        }
        backend
    }

    /// Devices exist but the driver refuses to start streams.
    pub fn failing_start() -> Self {
        let backend = Self::default();
        backend.state.lock().fail_start = true;
        backend
    }

    /// Delivers one input block. Returns false if no running input stream took it.
    pub fn feed_input(&self, block: &[f32]) -> bool {
        let mut state = self.state.lock();
        if state.input_paused {
            return false;
        }
        match state.input.as_mut() {
            Some((_, callback)) => {
                callback(block);
                true
            }
            None => false,
        }
    }

    /// Asks the running output stream to fill `out`. Returns false if there is none.
    pub fn render_output(&self, out: &mut [f32]) -> bool {
        let mut state = self.state.lock();
        if state.output_paused {
            return false;
        }
        match state.output.as_mut() {
            Some((_, callback)) => {
                callback(out);
                true
            }
            None => false,
        }
    }

    /// Convenience wrapper: pulls `frames` frames in the last opened output format.
    pub fn pull_output(&self, frames: usize) -> Option<Vec<f32>> {
        let channels = self.state.lock().last_output_format?.channels as usize;
        let mut out = vec![0.0; frames * channels];
        self.render_output(&mut out).then_some(out)
    }

    pub fn has_input_stream(&self) -> bool {
        self.state.lock().input.is_some()
    }

    pub fn has_output_stream(&self) -> bool {
        self.state.lock().output.is_some()
    }

    pub fn output_paused(&self) -> bool {
        self.state.lock().output_paused
    }

    pub fn last_output_format(&self) -> Option<StreamFormat> {
        self.state.lock().last_output_format
    }

    fn check_start(state: &ManualState) -> ClipperResult<()> {
        if state.fail_start {
            return Err(ClipperError::StreamStart("device refused to start".into()));
        }
        Ok(())
    }
}

impl AudioBackend for ManualBackend {
    fn open_input(&self, format: StreamFormat, callback: InputCallback) -> ClipperResult<Box<dyn AudioStream>> {
        let mut state = self.state.lock();
        if state.no_input {
            return Err(ClipperError::NoInputDevice);
        }
        if format.sample_rate == 0 || format.channels == 0 {
            return Err(ClipperError::StreamBuild(format!("unsupported format {:?}", format)));
        }
        Self::check_start(&state)?;

        state.next_id += 1;
        let id = state.next_id;
        state.input = Some((id, callback));
        state.input_paused = false;
        Ok(Box::new(ManualStream { state: self.state.clone(), direction: Direction::Input, id }))
    }

    fn open_output(&self, format: StreamFormat, callback: OutputCallback) -> ClipperResult<Box<dyn AudioStream>> {
        let mut state = self.state.lock();
        if state.no_output {
            return Err(ClipperError::NoOutputDevice);
        }
        if format.sample_rate == 0 || format.channels == 0 {
            return Err(ClipperError::StreamBuild(format!("unsupported format {:?}", format)));
        }
        Self::check_start(&state)?;

        state.next_id += 1;
        let id = state.next_id;
        state.output = Some((id, callback));
        state.output_paused = false;
        state.last_output_format = Some(format);
        Ok(Box::new(ManualStream { state: self.state.clone(), direction: Direction::Output, id }))
    }

    fn input_device_names(&self) -> ClipperResult<Vec<String>> {
        let state = self.state.lock();
        Ok(if state.no_input { Vec::new() } else { vec!["manual input".to_string()] })
    }

    fn output_device_names(&self) -> ClipperResult<Vec<String>> {
        let state = self.state.lock();
        Ok(if state.no_output { Vec::new() } else { vec!["manual output".to_string()] })
    }
}
