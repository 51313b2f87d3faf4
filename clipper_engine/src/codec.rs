//! File I/O for sample buffers.
//! Only WAV is handled in-process; compressed formats need an external
//! transcoder and are reported as unsupported.

use clipper_shared::config::WavBitDepth;
use clipper_shared::{ClipperError, ClipperResult, SampleBuffer};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::info;
use std::path::Path;

/// Container requested by a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Wav,
    Mp3,
}

impl ExportFormat {
    /// Guess from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "wav" => Some(ExportFormat::Wav),
            "mp3" => Some(ExportFormat::Mp3),
            _ => None,
        }
    }
}

pub trait AudioCodec {
    fn load(&self, path: &Path) -> ClipperResult<SampleBuffer>;
    fn save(&self, path: &Path, buffer: &SampleBuffer, format: ExportFormat) -> ClipperResult<()>;
}

fn wav_error(err: hound::Error) -> ClipperError {
    match err {
        hound::Error::IoError(e) => ClipperError::Io(e),
        other => ClipperError::Wav(other.to_string()),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WavCodec {
    pub bit_depth: WavBitDepth,
}

impl WavCodec {
    pub fn new(bit_depth: WavBitDepth) -> Self {
        Self { bit_depth }
    }

    fn read(path: &Path) -> ClipperResult<SampleBuffer> {
        let reader = WavReader::open(path).map_err(wav_error)?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(wav_error)?,
            SampleFormat::Int => {
                let max_val = 2.0_f32.powi(spec.bits_per_sample as i32 - 1);
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max_val))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(wav_error)?
            }
        };

        if samples.is_empty() {
            return Err(ClipperError::Wav("file contains no audio data".into()));
        }

        // A truncated file can end mid-frame
        let channels = spec.channels.max(1) as usize;
        let mut samples = samples;
        samples.truncate(samples.len() / channels * channels);

        SampleBuffer::new(samples, spec.sample_rate, spec.channels)
    }

    fn write(&self, path: &Path, buffer: &SampleBuffer) -> ClipperResult<()> {
        let (bits_per_sample, sample_format) = match self.bit_depth {
            WavBitDepth::Int16 => (16, SampleFormat::Int),
            WavBitDepth::Int24 => (24, SampleFormat::Int),
            WavBitDepth::Float32 => (32, SampleFormat::Float),
        };
        let spec = WavSpec {
            channels: buffer.channels(),
            sample_rate: buffer.sample_rate(),
            bits_per_sample,
            sample_format,
        };

        let mut writer = WavWriter::create(path, spec).map_err(wav_error)?;
        match self.bit_depth {
            WavBitDepth::Float32 => {
                for &sample in buffer.samples() {
                    writer.write_sample(sample).map_err(wav_error)?;
                }
            }
            WavBitDepth::Int16 => {
                let scale = (1 << 15) as f32 - 1.0;
                for &sample in buffer.samples() {
                    let quantized = (sample * scale).round().clamp(-(scale + 1.0), scale) as i16;
                    writer.write_sample(quantized).map_err(wav_error)?;
                }
            }
            WavBitDepth::Int24 => {
                let scale = (1 << 23) as f32 - 1.0;
                for &sample in buffer.samples() {
                    let quantized = (sample * scale).round().clamp(-(scale + 1.0), scale) as i32;
                    writer.write_sample(quantized).map_err(wav_error)?;
                }
            }
        }
        writer.finalize().map_err(wav_error)?;
        Ok(())
    }
}

impl AudioCodec for WavCodec {
    fn load(&self, path: &Path) -> ClipperResult<SampleBuffer> {
        if ExportFormat::from_path(path) != Some(ExportFormat::Wav) {
            return Err(ClipperError::UnsupportedFormat(format!(
                "{} (only WAV can be read without a transcoder)",
                path.display()
            )));
        }
        let buffer = Self::read(path)?;
        info!(
            "[Codec] Loaded {}: {} frames, {}Hz, {} channels",
            path.display(),
            buffer.frames(),
            buffer.sample_rate(),
            buffer.channels()
        );
        Ok(buffer)
    }

    fn save(&self, path: &Path, buffer: &SampleBuffer, format: ExportFormat) -> ClipperResult<()> {
        if buffer.is_empty() || !buffer.has_valid_format() {
            return Err(ClipperError::InvalidBuffer("nothing to save".into()));
        }
        match format {
            ExportFormat::Wav => self.write(path, buffer)?,
            ExportFormat::Mp3 => {
                return Err(ClipperError::UnsupportedFormat(
                    "MP3 export requires an external encoder".into(),
                ));
            }
        }
        info!("[Codec] Saved {} ({:?})", path.display(), self.bit_depth);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn stereo() -> SampleBuffer {
        SampleBuffer::new(vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25], 22050, 2).unwrap()
    }

    #[test]
    fn test_float_wav_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");
        let codec = WavCodec::default();

        codec.save(&path, &stereo(), ExportFormat::Wav).unwrap();
        let loaded = codec.load(&path).unwrap();
        assert_eq!(loaded, stereo());
    }

    #[test]
    fn test_int16_wav_is_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take16.wav");
        let codec = WavCodec::new(WavBitDepth::Int16);

        codec.save(&path, &stereo(), ExportFormat::Wav).unwrap();
        let loaded = codec.load(&path).unwrap();
        assert_eq!(loaded.channels(), 2);
        assert_eq!(loaded.sample_rate(), 22050);
        for (a, b) in loaded.samples().iter().zip(stereo().samples()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_int24_wav_is_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take24.WAV");
        let codec = WavCodec::new(WavBitDepth::Int24);

        codec.save(&path, &stereo(), ExportFormat::Wav).unwrap();
        let loaded = codec.load(&path).unwrap();
        for (a, b) in loaded.samples().iter().zip(stereo().samples()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_mp3_and_foreign_containers_are_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let codec = WavCodec::default();

        let err = codec.save(&dir.path().join("a.mp3"), &stereo(), ExportFormat::Mp3).unwrap_err();
        assert!(matches!(err, ClipperError::UnsupportedFormat(_)));

        let err = codec.load(&dir.path().join("a.flac")).unwrap_err();
        assert!(matches!(err, ClipperError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = WavCodec::default().load(&dir.path().join("missing.wav")).unwrap_err();
        assert!(matches!(err, ClipperError::Io(_)));
    }

    #[test]
    fn test_empty_buffer_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        let err = WavCodec::default()
            .save(&path, &SampleBuffer::empty(44100, 1), ExportFormat::Wav)
            .unwrap_err();
        assert!(matches!(err, ClipperError::InvalidBuffer(_)));
        assert!(!path.exists());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("x.WAV")), Some(ExportFormat::Wav));
        assert_eq!(ExportFormat::from_path(Path::new("x.mp3")), Some(ExportFormat::Mp3));
        assert_eq!(ExportFormat::from_path(Path::new("x")), None);
    }
}
