//! End-to-end command-surface run over the synthetic camera and a scripted
//! detector: the same path both front-ends drive.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use tempfile::TempDir;

use lookout::{
    BoundingBox, CameraSettings, Command, CommandOutcome, Detection, DetectorBackend, FrameLoop,
    NullSink, Overlay, OverlayStyle, PipelineError, RunConfig, SyntheticBackend,
    SystemCameraOpener,
};

fn det(class_name: &str, confidence: f32) -> Detection {
    Detection {
        class_id: 0,
        class_name: class_name.to_string(),
        confidence,
        bbox: BoundingBox::new(10.0, 10.0, 60.0, 40.0),
    }
}

fn build_loop(script: Vec<Vec<Detection>>, screenshot_prefix: String) -> FrameLoop {
    let opener = SystemCameraOpener::new(CameraSettings {
        width: 160,
        height: 120,
        target_fps: 0,
        synthetic: true,
    });
    let detector: Arc<Mutex<dyn DetectorBackend>> =
        Arc::new(Mutex::new(SyntheticBackend::with_script(script)));
    FrameLoop::new(
        RunConfig::default(),
        Box::new(opener),
        detector,
        Overlay::new(&OverlayStyle::default()),
        screenshot_prefix,
    )
}

#[test]
fn full_session_counts_screenshots_and_resets() -> Result<()> {
    let dir = TempDir::new()?;
    let prefix = dir.path().join("shot").to_string_lossy().into_owned();

    let script = vec![
        vec![det("person", 0.8), det("person", 0.3), det("dog", 0.6)],
        vec![],
        vec![det("cat", 0.9)],
    ];
    let mut frame_loop = build_loop(script, prefix.clone());
    let mut sink = NullSink;

    // Screenshot before any tick must be refused and reported.
    let err = frame_loop.apply(Command::TakeScreenshot).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::NoFrameAvailable)
    ));

    assert_eq!(frame_loop.apply(Command::Start)?, CommandOutcome::Started);
    assert_eq!(
        frame_loop.apply(Command::Start)?,
        CommandOutcome::AlreadyRunning
    );

    for _ in 0..3 {
        frame_loop.tick(&mut sink)?;
    }

    let snapshot = frame_loop.snapshot();
    assert_eq!(snapshot.frames_processed, 3);
    assert_eq!(snapshot.total_detections, 3);
    assert_eq!(snapshot.per_class.get("person"), Some(&1));
    assert_eq!(snapshot.per_class.get("dog"), Some(&1));
    assert_eq!(snapshot.per_class.get("cat"), Some(&1));

    // Screenshot lands next to the configured prefix.
    let outcome = frame_loop.apply(Command::TakeScreenshot)?;
    let CommandOutcome::ScreenshotSaved(path) = outcome else {
        panic!("expected a screenshot path, got {:?}", outcome);
    };
    assert!(path.exists());
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("shot_"), "unexpected name {}", name);
    assert!(name.ends_with(".jpg"));

    assert_eq!(frame_loop.apply(Command::Stop)?, CommandOutcome::Stopped);
    assert_eq!(
        frame_loop.apply(Command::Stop)?,
        CommandOutcome::AlreadyStopped
    );

    assert_eq!(
        frame_loop.apply(Command::ResetStats)?,
        CommandOutcome::StatsReset
    );
    let snapshot = frame_loop.snapshot();
    assert_eq!(snapshot.frames_processed, 0);
    assert_eq!(snapshot.total_detections, 0);
    assert!(snapshot.per_class.is_empty());
    Ok(())
}

#[test]
fn threshold_change_applies_to_the_next_tick() -> Result<()> {
    let dir = TempDir::new()?;
    let prefix = dir.path().join("shot").to_string_lossy().into_owned();

    // The same frame repeats; only the threshold changes between ticks.
    let script = vec![vec![det("person", 0.45)]];
    let mut frame_loop = build_loop(script, prefix);
    let mut sink = NullSink;

    frame_loop.apply(Command::Start)?;

    let summary = frame_loop.tick(&mut sink)?;
    assert_eq!(summary.detections_counted, 0);

    frame_loop.apply(Command::SetConfidence(0.4))?;
    let summary = frame_loop.tick(&mut sink)?;
    assert_eq!(summary.detections_counted, 1);

    let snapshot = frame_loop.snapshot();
    assert_eq!(snapshot.total_detections, 1);
    assert_eq!(snapshot.frames_processed, 2);
    Ok(())
}

#[test]
fn camera_selection_takes_effect_on_next_start() -> Result<()> {
    let dir = TempDir::new()?;
    let prefix = dir.path().join("shot").to_string_lossy().into_owned();
    let mut frame_loop = build_loop(vec![], prefix);

    assert_eq!(
        frame_loop.apply(Command::SelectCamera(2))?,
        CommandOutcome::CameraSelected(2)
    );

    frame_loop.apply(Command::Start)?;
    let err = frame_loop.apply(Command::SelectCamera(0)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::InvalidArgument(_))
    ));
    assert_eq!(frame_loop.config().camera_index, 2);
    Ok(())
}
