use std::sync::Arc;
use std::time::{Duration, Instant};

use approx::assert_abs_diff_eq;
use clipper_engine::codec::{AudioCodec, ExportFormat, WavCodec};
use clipper_engine::session::StatusKind;
use clipper_engine::{ClipperSession, ManualBackend};
use clipper_shared::config::WavBitDepth;
use clipper_shared::{ClipperConfig, ClipperError};

fn config() -> ClipperConfig {
    let mut config = ClipperConfig::default();
    config.capture.sample_rate = 8000;
    config.capture.channels = 2;
    config.playback.position_interval_ms = 5;
    config.waveform.width = 800;
    config.waveform.max_points = 500;
    config
}

fn stereo_ramp(frames: usize) -> Vec<f32> {
    (0..frames)
        .flat_map(|i| {
            let v = i as f32 / frames as f32;
            [v, -v]
        })
        .collect()
}

#[test]
fn test_record_edit_save_reload_and_play_out() {
    let backend = ManualBackend::new();
    let mut session = ClipperSession::new(
        Arc::new(backend.clone()),
        Box::new(WavCodec::new(WavBitDepth::Float32)),
        config(),
    );

    // One second of stereo audio, delivered in device-sized blocks
    let take = stereo_ramp(8000);
    assert!(session.toggle_recording());
    for block in take.chunks(512) {
        assert!(backend.feed_input(block));
    }
    assert!(session.toggle_recording());

    assert_eq!(session.buffer().frames(), 8000);
    assert_eq!(session.buffer().channels(), 2);
    assert_abs_diff_eq!(session.duration(), 1.0);
    assert!(session.waveform().len() <= 500);
    assert_eq!(session.waveform()[0], take[0]);

    // 800 px over one second: 100 px = 0.125 s
    session.press(100);
    session.press(500);
    assert!(session.trim_to_selection());
    assert_eq!(session.buffer().frames(), 4000);
    assert_eq!(session.buffer().samples()[0], take[1000 * 2]);
    assert_eq!(session.buffer().samples()[1], take[1000 * 2 + 1]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.wav");
    session.save(&path, ExportFormat::Wav).unwrap();
    assert_eq!(session.status().kind, StatusKind::Success);

    // A second session picks the file up unchanged
    let mut reloaded = ClipperSession::new(
        Arc::new(backend.clone()),
        Box::new(WavCodec::default()),
        config(),
    );
    reloaded.load(&path).unwrap();
    assert_eq!(reloaded.buffer(), session.buffer());
    assert_eq!(reloaded.status().text, "Loaded: clip.wav (0.50s)");
    drop(session);

    // 15/32 s is exact in binary: play the last 250 frames and run off the end
    reloaded.seek(0.46875);
    assert!(reloaded.toggle_playback());
    let out = backend.pull_output(256).unwrap();
    assert_eq!(&out[..500], &reloaded.buffer().samples()[3750 * 2..]);
    assert!(out[500..].iter().all(|&s| s == 0.0));
    assert_eq!(backend.pull_output(64).unwrap(), vec![0.0; 128]);
    assert!(!reloaded.is_playing());

    let deadline = Instant::now() + Duration::from_secs(2);
    while reloaded.playback_position() != 0.0 && Instant::now() < deadline {
        reloaded.wait_for_events(Duration::from_millis(10));
    }
    assert_eq!(reloaded.playback_position(), 0.0);
}

#[test]
fn test_mp3_export_is_reported_not_fatal() {
    let backend = ManualBackend::new();
    let mut session = ClipperSession::new(Arc::new(backend.clone()), Box::new(WavCodec::default()), config());

    assert!(session.toggle_recording());
    backend.feed_input(&stereo_ramp(100));
    assert!(session.toggle_recording());

    let dir = tempfile::tempdir().unwrap();
    let err = session.save(&dir.path().join("clip.mp3"), ExportFormat::Mp3).unwrap_err();
    assert!(matches!(err, ClipperError::UnsupportedFormat(_)));
    assert_eq!(session.status().kind, StatusKind::Error);
    assert_eq!(session.buffer().frames(), 100);
}

#[test]
fn test_int16_file_loads_through_trait_object() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quiet.wav");
    let buffer = clipper_shared::SampleBuffer::new(vec![0.25; 64], 16000, 1).unwrap();
    WavCodec::new(WavBitDepth::Int16).save(&path, &buffer, ExportFormat::Wav).unwrap();

    let codec: Box<dyn AudioCodec> = Box::new(WavCodec::default());
    let loaded = codec.load(&path).unwrap();
    assert_eq!(loaded.sample_rate(), 16000);
    assert_eq!(loaded.frames(), 64);
    for s in loaded.samples() {
        assert_abs_diff_eq!(*s, 0.25, epsilon = 1e-4);
    }
}
