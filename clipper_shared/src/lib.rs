pub mod buffer;
pub mod config;
pub mod error;

pub use buffer::SampleBuffer;
pub use config::ClipperConfig;
pub use error::{ClipperError, ClipperResult};

// Defaults used when no config file is present
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_CHANNELS: u16 = 1;

/// Cadence of the playback position reporter.
pub const POSITION_INTERVAL_MS: u64 = 50;

/// Upper bound on the number of points handed to the waveform display.
pub const WAVEFORM_MAX_POINTS: usize = 2000;
pub const WAVEFORM_WIDTH_PX: i32 = 960;
pub const MARKER_TOLERANCE_PX: i32 = 10;
