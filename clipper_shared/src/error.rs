use thiserror::Error;

/// Errors surfaced by the device, codec and config layers.
///
/// Engine entry points that have a boolean contract (`start_recording`, `play`)
/// log these and roll back instead of returning them.
#[derive(Debug, Error)]
pub enum ClipperError {
    #[error("no input device available")]
    NoInputDevice,

    #[error("no output device available")]
    NoOutputDevice,

    #[error("failed to build stream: {0}")]
    StreamBuild(String),

    #[error("failed to start stream: {0}")]
    StreamStart(String),

    #[error("invalid sample buffer: {0}")]
    InvalidBuffer(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("wav codec error: {0}")]
    Wav(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ClipperResult<T> = Result<T, ClipperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(ClipperError::NoInputDevice.to_string(), "no input device available");
        assert_eq!(
            ClipperError::StreamBuild("rate not supported".into()).to_string(),
            "failed to build stream: rate not supported"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.wav");
        let err: ClipperError = io.into();
        assert!(matches!(err, ClipperError::Io(_)));
        assert_eq!(err.to_string(), "missing.wav");
    }
}
