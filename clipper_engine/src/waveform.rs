//! Waveform display helpers: decimation, pixel/time mapping and the two
//! region markers.

use clipper_shared::config::WaveformConfig;
use clipper_shared::SampleBuffer;

/// Fixed-stride decimation of a buffer to at most `max_points` values.
///
/// One value per kept frame (the first channel). The stride is
/// `max(1, floor(frames / max_points))`, truncated to `max_points` values;
/// buffers that already fit come back frame for frame.
pub fn project(buffer: &SampleBuffer, max_points: usize) -> Vec<f32> {
    project_samples(buffer.samples(), buffer.channels(), max_points)
}

pub fn project_samples(samples: &[f32], channels: u16, max_points: usize) -> Vec<f32> {
    if max_points == 0 || channels == 0 {
        return Vec::new();
    }
    let channels = channels as usize;
    let frames = samples.len() / channels;
    let stride = (frames / max_points).max(1);

    samples
        .chunks_exact(channels)
        .step_by(stride)
        .map(|frame| frame[0])
        .take(max_points)
        .collect()
}

pub fn pixel_to_time(x: i32, width: i32, duration: f64) -> f64 {
    if width <= 0 || duration <= 0.0 {
        return 0.0;
    }
    (x as f64 / width as f64) * duration
}

pub fn time_to_pixel(time: f64, width: i32, duration: f64) -> i32 {
    if duration <= 0.0 {
        return 0;
    }
    ((time / duration) * width as f64).round() as i32
}

pub fn is_near_marker(x: i32, marker: i32, tolerance: i32) -> bool {
    (x - marker).abs() < tolerance
}

/// What a press on the waveform grabbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grab {
    Playhead,
    Start,
    End,
}

/// Start/end marker positions in waveform pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerState {
    pub start: Option<i32>,
    pub end: Option<i32>,
}

impl MarkerState {
    /// Resolves a press at `x`: grab the playhead or an existing marker if the
    /// press is within `tolerance`, otherwise place a marker. Placement fills
    /// the start first, then the end, then moves whichever is nearer.
    pub fn press(&mut self, x: i32, playhead: Option<i32>, tolerance: i32) -> Grab {
        if playhead.is_some_and(|p| is_near_marker(x, p, tolerance)) {
            return Grab::Playhead;
        }
        if self.start.is_some_and(|m| is_near_marker(x, m, tolerance)) {
            return Grab::Start;
        }
        if self.end.is_some_and(|m| is_near_marker(x, m, tolerance)) {
            return Grab::End;
        }

        match (self.start, self.end) {
            (None, _) => {
                self.start = Some(x);
                Grab::Start
            }
            (Some(_), None) => {
                self.end = Some(x);
                Grab::End
            }
            (Some(s), Some(e)) => {
                if (x - s).abs() <= (x - e).abs() {
                    self.start = Some(x);
                    Grab::Start
                } else {
                    self.end = Some(x);
                    Grab::End
                }
            }
        }
    }

    /// Moves a grabbed marker, keeping it on the waveform. Dragging the
    /// playhead is a seek and is left to the caller.
    pub fn drag(&mut self, grab: Grab, x: i32, width: i32) {
        let x = x.clamp(0, width.max(0));
        match grab {
            Grab::Start => self.start = Some(x),
            Grab::End => self.end = Some(x),
            Grab::Playhead => {}
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_complete(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// Ordered `(start, end)` seconds, or `None` unless both markers are set
    /// and enclose a non-empty span.
    pub fn region(&self, width: i32, duration: f64) -> Option<(f64, f64)> {
        let (a, b) = (self.start?, self.end?);
        let start = pixel_to_time(a.min(b), width, duration);
        let end = pixel_to_time(a.max(b), width, duration);
        (start < end).then_some((start, end))
    }
}

/// Display geometry for one waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveformView {
    pub width: i32,
    pub max_points: usize,
    pub tolerance: i32,
}

impl From<&WaveformConfig> for WaveformView {
    fn from(config: &WaveformConfig) -> Self {
        Self {
            width: config.width,
            max_points: config.max_points,
            tolerance: config.marker_tolerance_px,
        }
    }
}

impl Default for WaveformView {
    fn default() -> Self {
        Self::from(&WaveformConfig::default())
    }
}

impl WaveformView {
    pub fn project(&self, buffer: &SampleBuffer) -> Vec<f32> {
        project(buffer, self.max_points)
    }

    pub fn pixel_to_time(&self, x: i32, duration: f64) -> f64 {
        pixel_to_time(x, self.width, duration)
    }

    pub fn time_to_pixel(&self, time: f64, duration: f64) -> i32 {
        time_to_pixel(time, self.width, duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn mono(len: usize) -> SampleBuffer {
        SampleBuffer::new((0..len).map(|i| i as f32).collect(), 44100, 1).unwrap()
    }

    #[test]
    fn test_short_buffer_is_returned_whole() {
        let out = project(&mono(500), 2000);
        assert_eq!(out.len(), 500);
        assert_eq!(out[499], 499.0);
    }

    #[test]
    fn test_long_buffer_is_decimated() {
        let out = project(&mono(44100), 2000);
        // floor(44100 / 2000) = 22, cut off at the bound
        assert_eq!(out.len(), 2000);
        assert_eq!(out[1], 22.0);
        assert_eq!(out[1999], (1999 * 22) as f32);
    }

    #[test]
    fn test_stereo_uses_first_channel() {
        let samples = vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        let buf = SampleBuffer::new(samples, 44100, 2).unwrap();
        assert_eq!(project(&buf, 10), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_zero_points_and_empty() {
        assert!(project(&mono(100), 0).is_empty());
        assert!(project(&SampleBuffer::empty(44100, 1), 100).is_empty());
    }

    #[test]
    fn test_pixel_time_edges() {
        assert_eq!(pixel_to_time(10, 0, 5.0), 0.0);
        assert_eq!(pixel_to_time(10, 100, 0.0), 0.0);
        assert_abs_diff_eq!(pixel_to_time(480, 960, 2.0), 1.0);
        assert_eq!(time_to_pixel(1.0, 960, 0.0), 0);
        assert_eq!(time_to_pixel(1.0, 960, 2.0), 480);
        assert_eq!(time_to_pixel(0.0016, 960, 1.0), 2);
    }

    #[test]
    fn test_near_marker_is_strict() {
        assert!(is_near_marker(105, 100, 10));
        assert!(is_near_marker(91, 100, 10));
        assert!(!is_near_marker(110, 100, 10));
    }

    #[test]
    fn test_press_places_then_grabs() {
        let mut m = MarkerState::default();
        assert_eq!(m.press(100, None, 10), Grab::Start);
        assert_eq!(m.press(400, None, 10), Grab::End);
        assert_eq!(m, MarkerState { start: Some(100), end: Some(400) });

        // Near an existing marker: grab it, do not move it
        assert_eq!(m.press(405, None, 10), Grab::End);
        assert_eq!(m.end, Some(400));

        // Far from both: the nearer one jumps
        assert_eq!(m.press(150, None, 10), Grab::Start);
        assert_eq!(m.start, Some(150));
        assert_eq!(m.press(350, None, 10), Grab::End);
        assert_eq!(m.end, Some(350));

        // Playhead wins over markers
        assert_eq!(m.press(352, Some(355), 10), Grab::Playhead);
        assert_eq!(m.end, Some(350));
    }

    #[test]
    fn test_drag_clamps_to_width() {
        let mut m = MarkerState::default();
        m.drag(Grab::Start, -20, 960);
        m.drag(Grab::End, 5000, 960);
        assert_eq!(m, MarkerState { start: Some(0), end: Some(960) });
        m.drag(Grab::Playhead, 10, 960);
        assert_eq!(m.start, Some(0));
    }

    #[test]
    fn test_region_orders_and_rejects_empty() {
        let mut m = MarkerState { start: Some(720), end: Some(240) };
        let (s, e) = m.region(960, 4.0).unwrap();
        assert_abs_diff_eq!(s, 1.0);
        assert_abs_diff_eq!(e, 3.0);

        m.end = Some(720);
        assert!(m.region(960, 4.0).is_none());
        m.end = None;
        assert!(m.region(960, 4.0).is_none());
        m.clear();
        assert!(!m.is_complete());
    }

    proptest! {
        #[test]
        fn prop_projection_is_bounded(len in 0usize..20000, max_points in 1usize..3000) {
            let out = project(&mono(len), max_points);
            prop_assert!(out.len() <= max_points);
            if len <= max_points {
                prop_assert_eq!(out.len(), len);
            }
        }

        #[test]
        fn prop_pixel_round_trip(t in 0.0f64..=1.0, width in 1i32..4000, duration in 0.01f64..600.0) {
            let time = t * duration;
            let back = pixel_to_time(time_to_pixel(time, width, duration), width, duration);
            let resolution = duration / width as f64;
            prop_assert!((back - time).abs() <= resolution / 2.0 + 1e-9);
        }
    }
}
