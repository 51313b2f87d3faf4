pub mod backend;
pub mod capture;
pub mod codec;
pub mod editor;
pub mod playback;
pub mod session;
pub mod transport;
pub mod waveform;

// Re-exports
pub use backend::{AudioBackend, CpalBackend, ManualBackend};
pub use capture::CaptureEngine;
pub use codec::{AudioCodec, ExportFormat, WavCodec};
pub use editor::EditOutcome;
pub use playback::PlaybackEngine;
pub use session::{ClipperSession, SessionEvent};
