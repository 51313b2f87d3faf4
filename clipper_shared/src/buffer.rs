use std::sync::Arc;

use crate::error::{ClipperError, ClipperResult};

/// Interleaved f32 audio plus its format.
///
/// Samples sit behind an `Arc` so handing a buffer to playback, or keeping the
/// pre-edit version around, is a reference-count bump rather than a copy.
/// Edits never mutate a buffer in place; they build a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    channels: u16,
}

impl SampleBuffer {
    /// Validating constructor: rate and channel count must be non-zero and the
    /// sample count must be a whole number of frames.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> ClipperResult<Self> {
        if sample_rate == 0 {
            return Err(ClipperError::InvalidBuffer("sample rate must be positive".into()));
        }
        if channels == 0 {
            return Err(ClipperError::InvalidBuffer("channel count must be positive".into()));
        }
        if samples.len() % channels as usize != 0 {
            return Err(ClipperError::InvalidBuffer(format!(
                "{} samples is not a multiple of {} channels",
                samples.len(),
                channels
            )));
        }
        Ok(Self::from_parts(samples, sample_rate, channels))
    }

    /// Builds a buffer without validation. Used by code that derives its
    /// samples from an already valid buffer (frame-aligned slices).
    pub fn from_parts(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate,
            channels,
        }
    }

    pub fn empty(sample_rate: u32, channels: u16) -> Self {
        Self::from_parts(Vec::new(), sample_rate, channels)
    }

    /// Same format, different samples.
    pub fn with_samples(&self, samples: Vec<f32>) -> Self {
        Self::from_parts(samples, self.sample_rate, self.channels)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn shared_samples(&self) -> Arc<Vec<f32>> {
        self.samples.clone()
    }

    /// Takes the sample vector out, copying only if it is still shared.
    pub fn into_samples(self) -> Vec<f32> {
        Arc::try_unwrap(self.samples).unwrap_or_else(|shared| (*shared).clone())
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// True when both rate and channel count are usable for time arithmetic.
    pub fn has_valid_format(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::empty(crate::DEFAULT_SAMPLE_RATE, crate::DEFAULT_CHANNELS)
    }
}
