use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{ClipperError, ClipperResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Capacity of the callback-to-drain ring, in seconds of audio.
    pub ring_seconds: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::DEFAULT_SAMPLE_RATE,
            channels: crate::DEFAULT_CHANNELS,
            ring_seconds: 2.0,
        }
    }
}

impl CaptureConfig {
    /// Ring capacity in samples, never less than one second's worth of one channel.
    pub fn ring_capacity(&self) -> usize {
        let per_second = self.sample_rate as usize * self.channels.max(1) as usize;
        ((per_second as f32 * self.ring_seconds) as usize).max(per_second).max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    pub position_interval_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            position_interval_ms: crate::POSITION_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WaveformConfig {
    pub width: i32,
    pub max_points: usize,
    pub marker_tolerance_px: i32,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            width: crate::WAVEFORM_WIDTH_PX,
            max_points: crate::WAVEFORM_MAX_POINTS,
            marker_tolerance_px: crate::MARKER_TOLERANCE_PX,
        }
    }
}

/// Sample encoding used when writing WAV files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum WavBitDepth {
    Int16,
    Int24,
    #[default]
    Float32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ExportConfig {
    pub bit_depth: WavBitDepth,
}

/// Top-level settings, stored as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ClipperConfig {
    pub capture: CaptureConfig,
    pub playback: PlaybackConfig,
    pub waveform: WaveformConfig,
    pub export: ExportConfig,
}

impl ClipperConfig {
    pub fn load(path: &Path) -> ClipperResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| ClipperError::Config(e.to_string()))
    }

    /// Falls back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> ClipperResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> ClipperResult<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| ClipperError::Config(e.to_string()))?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
