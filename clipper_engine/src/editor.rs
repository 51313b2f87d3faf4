//! Offline edits on a `SampleBuffer`.
//!
//! Every operation leaves its input untouched and returns a new buffer wrapped
//! in an `EditOutcome`, so callers can tell a real edit from a no-op. Invalid
//! input (empty buffer, zero rate or channels, non-finite arguments) is a no-op,
//! never an error.

use clipper_shared::SampleBuffer;

#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// The operation changed the audio.
    Edited(SampleBuffer),
    /// The operation legitimately produced an empty buffer (trim to nothing).
    Emptied(SampleBuffer),
    /// Nothing to do; this is the input.
    Unchanged(SampleBuffer),
}

impl EditOutcome {
    pub fn buffer(&self) -> &SampleBuffer {
        match self {
            EditOutcome::Edited(b) | EditOutcome::Emptied(b) | EditOutcome::Unchanged(b) => b,
        }
    }

    pub fn into_buffer(self) -> SampleBuffer {
        match self {
            EditOutcome::Edited(b) | EditOutcome::Emptied(b) | EditOutcome::Unchanged(b) => b,
        }
    }

    pub fn is_changed(&self) -> bool {
        !matches!(self, EditOutcome::Unchanged(_))
    }

    fn from_result(buffer: SampleBuffer) -> Self {
        if buffer.is_empty() {
            EditOutcome::Emptied(buffer)
        } else {
            EditOutcome::Edited(buffer)
        }
    }
}

/// Applies `gain_db` and hard-clips to [-1, 1].
pub fn adjust_volume(buffer: &SampleBuffer, gain_db: f64) -> EditOutcome {
    if buffer.is_empty() || !buffer.has_valid_format() || !gain_db.is_finite() {
        return EditOutcome::Unchanged(buffer.clone());
    }

    let gain = 10f64.powf(gain_db / 20.0) as f32;
    let samples = buffer
        .samples()
        .iter()
        .map(|&s| (s * gain).clamp(-1.0, 1.0))
        .collect();
    EditOutcome::Edited(buffer.with_samples(samples))
}

/// Seconds to an interleaved sample offset:
/// `clamp(round(t * rate) * channels, 0, total)`.
///
/// Trim and remove both go through here so complementary edits agree on
/// their boundaries.
pub fn sample_index(seconds: f64, sample_rate: u32, channels: u16, total_samples: usize) -> usize {
    if seconds.is_nan() || seconds <= 0.0 || sample_rate == 0 || channels == 0 {
        return 0;
    }
    let channels = channels as usize;
    let total_frames = total_samples / channels;
    let frame = (seconds * sample_rate as f64).round();
    if frame >= total_frames as f64 {
        return total_samples;
    }
    (frame as usize * channels).min(total_samples)
}

fn region_bounds(buffer: &SampleBuffer, start: f64, end: f64) -> (usize, usize) {
    let total = buffer.len();
    (
        sample_index(start, buffer.sample_rate(), buffer.channels(), total),
        sample_index(end, buffer.sample_rate(), buffer.channels(), total),
    )
}

/// Keeps only `[start, end)`. A degenerate region yields an empty buffer.
pub fn trim_to_region(buffer: &SampleBuffer, start: f64, end: f64) -> EditOutcome {
    if buffer.is_empty() || !buffer.has_valid_format() {
        return EditOutcome::Unchanged(buffer.clone());
    }

    let (from, to) = region_bounds(buffer, start, end);
    if from >= to {
        return EditOutcome::Emptied(buffer.with_samples(Vec::new()));
    }
    EditOutcome::from_result(buffer.with_samples(buffer.samples()[from..to].to_vec()))
}

/// Drops `[start, end)` and joins what is left. A degenerate region leaves the
/// buffer as it is.
pub fn remove_region(buffer: &SampleBuffer, start: f64, end: f64) -> EditOutcome {
    if buffer.is_empty() || !buffer.has_valid_format() {
        return EditOutcome::Unchanged(buffer.clone());
    }

    let (from, to) = region_bounds(buffer, start, end);
    if from >= to {
        return EditOutcome::Unchanged(buffer.clone());
    }

    let samples = buffer.samples();
    let mut kept = Vec::with_capacity(samples.len() - (to - from));
    kept.extend_from_slice(&samples[..from]);
    kept.extend_from_slice(&samples[to..]);
    EditOutcome::from_result(buffer.with_samples(kept))
}
