//! The frame-processing loop.
//!
//! `FrameLoop` owns the Stopped/Running state machine and drives the
//! per-frame cycle: read one frame, run the detector, fold the results into
//! the statistics, render the annotated copy, emit to the display sink.
//! Everything runs on one logical thread; front-end adapters translate
//! their native events into [`Command`] values that are applied between
//! ticks, never mid-frame.
//!
//! Failure policy: camera acquisition failures leave the loop Stopped;
//! frame-read and detector failures release the camera and transition to
//! Stopped. There is no retry or backoff anywhere.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::camera::{CameraOpener, CameraStream};
use crate::detect::{Detection, DetectorBackend};
use crate::frame::Frame;
use crate::overlay::{Overlay, PanelInfo};
use crate::sink::DisplaySink;
use crate::stats::{StatisticsAggregator, StatsSnapshot};
use crate::PipelineError;

const SCREENSHOT_QUALITY: u8 = 90;
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

/// Per-run configuration. Immutable within a tick; commands may change it
/// between frames.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Minimum confidence for a detection to count, in `(0, 1]`.
    pub confidence_threshold: f32,
    pub camera_index: u32,
    /// Whether the information panel is drawn. Boxes are always drawn.
    pub show_overlay: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            camera_index: 0,
            show_overlay: true,
        }
    }
}

/// Commands accepted from any front-end adapter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Start,
    Stop,
    ResetStats,
    TakeScreenshot,
    SetConfidence(f32),
    SelectCamera(u32),
}

/// What a command actually did, so adapters can report no-ops instead of
/// silently swallowing them.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome {
    Started,
    AlreadyRunning,
    Stopped,
    AlreadyStopped,
    StatsReset,
    ScreenshotSaved(PathBuf),
    ThresholdSet(f32),
    CameraSelected(u32),
}

impl std::fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandOutcome::Started => write!(f, "started"),
            CommandOutcome::AlreadyRunning => write!(f, "already running (no-op)"),
            CommandOutcome::Stopped => write!(f, "stopped"),
            CommandOutcome::AlreadyStopped => write!(f, "already stopped (no-op)"),
            CommandOutcome::StatsReset => write!(f, "statistics reset"),
            CommandOutcome::ScreenshotSaved(path) => {
                write!(f, "screenshot saved to {}", path.display())
            }
            CommandOutcome::ThresholdSet(value) => {
                write!(f, "confidence threshold set to {:.2}", value)
            }
            CommandOutcome::CameraSelected(index) => write!(f, "camera {} selected", index),
        }
    }
}

/// Per-tick report for logging front-ends.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickSummary {
    /// Everything the detector returned, including sub-threshold entries.
    pub detections_reported: usize,
    /// Detections that met the threshold and were counted.
    pub detections_counted: usize,
    pub fps: f32,
}

/// Confidence thresholds live in `(0, 1]`.
pub fn confidence_in_range(value: f32) -> bool {
    value.is_finite() && value > 0.0 && value <= 1.0
}

/// Rolling one-second FPS window.
///
/// Reads 0 until the first window closes; after that the last computed
/// value is held until the next window closes.
#[derive(Debug)]
pub struct FpsWindow {
    window_start: Instant,
    frames: u32,
    value: f32,
}

impl FpsWindow {
    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
            value: 0.0,
        }
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    fn tick_at(&mut self, now: Instant) {
        self.frames += 1;
        let elapsed = now
            .saturating_duration_since(self.window_start)
            .as_secs_f32();
        if elapsed >= 1.0 {
            self.value = self.frames as f32 / elapsed;
            self.frames = 0;
            self.window_start = now;
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    fn restart(&mut self) {
        self.window_start = Instant::now();
        self.frames = 0;
        self.value = 0.0;
    }
}

impl Default for FpsWindow {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FrameLoop {
    state: LoopState,
    config: RunConfig,
    opener: Box<dyn CameraOpener>,
    detector: Arc<Mutex<dyn DetectorBackend>>,
    overlay: Overlay,
    stats: StatisticsAggregator,
    fps: FpsWindow,
    camera: Option<Box<dyn CameraStream>>,
    last_annotated: Option<RgbImage>,
    last_health_log: Option<Instant>,
    screenshot_prefix: String,
}

impl FrameLoop {
    pub fn new(
        config: RunConfig,
        opener: Box<dyn CameraOpener>,
        detector: Arc<Mutex<dyn DetectorBackend>>,
        overlay: Overlay,
        screenshot_prefix: impl Into<String>,
    ) -> Self {
        Self {
            state: LoopState::Stopped,
            config,
            opener,
            detector,
            overlay,
            stats: StatisticsAggregator::new(),
            fps: FpsWindow::new(),
            camera: None,
            last_annotated: None,
            last_health_log: None,
            screenshot_prefix: screenshot_prefix.into(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn fps(&self) -> f32 {
        self.fps.value()
    }

    /// Acquire the camera and transition to Running. No-op when already
    /// Running (state and camera handle unchanged).
    pub fn start(&mut self) -> Result<CommandOutcome> {
        if self.is_running() {
            return Ok(CommandOutcome::AlreadyRunning);
        }

        let index = self.config.camera_index;
        let camera = self
            .opener
            .open(index)
            .map_err(|err| PipelineError::CameraUnavailable {
                index,
                reason: format!("{:#}", err),
            })?;

        {
            let mut detector = self
                .detector
                .lock()
                .map_err(|_| anyhow!("detector backend lock poisoned"))?;
            let backend = detector.name();
            detector
                .warm_up()
                .map_err(|err| PipelineError::DetectorFailure {
                    backend: backend.to_string(),
                    reason: format!("{:#}", err),
                })?;
        }

        self.camera = Some(camera);
        self.state = LoopState::Running;
        self.fps.restart();
        log::info!("frame loop started on camera {}", index);
        Ok(CommandOutcome::Started)
    }

    /// Release the camera and transition to Stopped. No-op when already
    /// Stopped.
    pub fn stop(&mut self) -> Result<CommandOutcome> {
        if !self.is_running() {
            return Ok(CommandOutcome::AlreadyStopped);
        }
        self.release_camera();
        log::info!("frame loop stopped");
        Ok(CommandOutcome::Stopped)
    }

    fn release_camera(&mut self) {
        // Dropping the stream closes the device.
        self.camera = None;
        self.state = LoopState::Stopped;
    }

    pub fn set_confidence_threshold(&mut self, value: f32) -> Result<CommandOutcome> {
        if !confidence_in_range(value) {
            return Err(PipelineError::InvalidArgument(format!(
                "confidence threshold must be in (0, 1], got {}",
                value
            ))
            .into());
        }
        self.config.confidence_threshold = value;
        Ok(CommandOutcome::ThresholdSet(value))
    }

    /// Select the camera used by the next `start()`. Rejected while Running
    /// so the switch is always explicit.
    pub fn select_camera(&mut self, index: u32) -> Result<CommandOutcome> {
        if self.is_running() {
            return Err(PipelineError::InvalidArgument(
                "stop the loop before selecting another camera".to_string(),
            )
            .into());
        }
        self.config.camera_index = index;
        Ok(CommandOutcome::CameraSelected(index))
    }

    pub fn reset_stats(&mut self) -> Result<CommandOutcome> {
        self.stats.reset();
        Ok(CommandOutcome::StatsReset)
    }

    /// Persist the most recently rendered annotated frame as
    /// `<prefix>_<YYYYMMDD_HHMMSS>.jpg`.
    pub fn take_screenshot(&self) -> Result<PathBuf> {
        let Some(image) = self.last_annotated.as_ref() else {
            return Err(PipelineError::NoFrameAvailable.into());
        };
        let path = PathBuf::from(format!(
            "{}_{}.jpg",
            self.screenshot_prefix,
            screenshot_timestamp()?
        ));
        write_jpeg(image, &path)?;
        log::info!("screenshot saved to {}", path.display());
        Ok(path)
    }

    /// Apply one command from a front-end adapter.
    pub fn apply(&mut self, command: Command) -> Result<CommandOutcome> {
        match command {
            Command::Start => self.start(),
            Command::Stop => self.stop(),
            Command::ResetStats => self.reset_stats(),
            Command::TakeScreenshot => self.take_screenshot().map(CommandOutcome::ScreenshotSaved),
            Command::SetConfidence(value) => self.set_confidence_threshold(value),
            Command::SelectCamera(index) => self.select_camera(index),
        }
    }

    /// Run one read-detect-count-render-emit cycle. Running state only.
    pub fn tick(&mut self, sink: &mut dyn DisplaySink) -> Result<TickSummary> {
        if !self.is_running() {
            return Err(
                PipelineError::InvalidArgument("tick on a stopped loop".to_string()).into(),
            );
        }
        let threshold = self.config.confidence_threshold;

        let health_log_due = self
            .last_health_log
            .map(|at| at.elapsed() >= HEALTH_LOG_INTERVAL)
            .unwrap_or(true);
        let frame = {
            let camera = self
                .camera
                .as_mut()
                .ok_or_else(|| anyhow!("running loop without a camera handle"))?;
            if health_log_due {
                let stats = camera.stats();
                log::debug!(
                    "capture health={} frames={} source={}",
                    camera.is_healthy(),
                    stats.frames_captured,
                    stats.source
                );
            }
            match camera.read_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    self.release_camera();
                    return Err(PipelineError::FrameReadError {
                        reason: format!("{:#}", err),
                    }
                    .into());
                }
            }
        };

        let detections = match self.run_detector(&frame, threshold) {
            Ok(detections) => detections,
            Err(err) => {
                self.release_camera();
                return Err(err);
            }
        };

        if health_log_due {
            self.last_health_log = Some(Instant::now());
        }

        let counted = self.stats.record_frame(&detections, threshold);
        self.fps.tick();

        let kept: Vec<&Detection> = detections.iter().filter(|d| d.passes(threshold)).collect();
        let panel = PanelInfo {
            fps: self.fps.value(),
            frame_count: self.stats.frames_processed(),
            total_detections: self.stats.total_detections(),
            confidence_threshold: threshold,
        };
        let annotated =
            self.overlay
                .render(&frame, &kept, self.config.show_overlay.then_some(&panel))?;

        if let Err(err) = sink.emit_frame(&annotated) {
            log::warn!("display sink rejected frame: {:#}", err);
        }
        if let Err(err) = sink.emit_stats(&self.stats.snapshot()) {
            log::warn!("display sink rejected stats: {:#}", err);
        }

        self.last_annotated = Some(annotated);
        Ok(TickSummary {
            detections_reported: detections.len(),
            detections_counted: counted,
            fps: self.fps.value(),
        })
    }

    fn run_detector(&mut self, frame: &Frame, threshold: f32) -> Result<Vec<Detection>> {
        let mut detector = self
            .detector
            .lock()
            .map_err(|_| anyhow!("detector backend lock poisoned"))?;
        let backend = detector.name();
        detector
            .detect(frame, threshold)
            .map_err(|err| {
                PipelineError::DetectorFailure {
                    backend: backend.to_string(),
                    reason: format!("{:#}", err),
                }
                .into()
            })
    }
}

fn screenshot_timestamp() -> Result<String> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let format = format_description!("[year][month][day]_[hour][minute][second]");
    Ok(now.format(&format)?)
}

fn write_jpeg(image: &RgbImage, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    let mut encoder = JpegEncoder::new_with_quality(&mut writer, SCREENSHOT_QUALITY);
    encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::camera::{CameraSettings, CaptureStats, SyntheticCamera};
    use crate::detect::{BoundingBox, SyntheticBackend};
    use crate::overlay::OverlayStyle;
    use crate::sink::NullSink;

    struct TestOpener {
        fail: bool,
    }

    impl CameraOpener for TestOpener {
        fn open(&self, index: u32) -> Result<Box<dyn CameraStream>> {
            if self.fail {
                return Err(anyhow!("device busy"));
            }
            Ok(Box::new(SyntheticCamera::new(
                index,
                CameraSettings {
                    width: 64,
                    height: 48,
                    target_fps: 0,
                    synthetic: true,
                },
            )))
        }
    }

    struct DyingCamera;

    impl CameraStream for DyingCamera {
        fn read_frame(&mut self) -> Result<Frame> {
            Err(anyhow!("end of stream"))
        }

        fn is_healthy(&self) -> bool {
            false
        }

        fn stats(&self) -> CaptureStats {
            CaptureStats {
                frames_captured: 0,
                source: "dying://".to_string(),
            }
        }
    }

    struct DyingOpener;

    impl CameraOpener for DyingOpener {
        fn open(&self, _index: u32) -> Result<Box<dyn CameraStream>> {
            Ok(Box::new(DyingCamera))
        }
    }

    struct FailingBackend;

    impl DetectorBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&mut self, _frame: &Frame, _threshold: f32) -> Result<Vec<Detection>> {
            Err(anyhow!("model exploded"))
        }
    }

    fn det(class_name: &str, confidence: f32) -> Detection {
        Detection {
            class_id: 0,
            class_name: class_name.to_string(),
            confidence,
            bbox: BoundingBox::new(4.0, 4.0, 16.0, 16.0),
        }
    }

    fn frame_loop_with(
        opener: Box<dyn CameraOpener>,
        detector: Arc<Mutex<dyn DetectorBackend>>,
    ) -> FrameLoop {
        FrameLoop::new(
            RunConfig::default(),
            opener,
            detector,
            Overlay::new(&OverlayStyle::default()),
            "test_shot",
        )
    }

    fn scripted(script: Vec<Vec<Detection>>) -> Arc<Mutex<dyn DetectorBackend>> {
        Arc::new(Mutex::new(SyntheticBackend::with_script(script)))
    }

    #[test]
    fn start_is_idempotent_and_stop_is_idempotent() -> Result<()> {
        let mut frame_loop = frame_loop_with(Box::new(TestOpener { fail: false }), scripted(vec![]));

        assert_eq!(frame_loop.start()?, CommandOutcome::Started);
        assert_eq!(frame_loop.start()?, CommandOutcome::AlreadyRunning);
        assert_eq!(frame_loop.state(), LoopState::Running);

        assert_eq!(frame_loop.stop()?, CommandOutcome::Stopped);
        assert_eq!(frame_loop.stop()?, CommandOutcome::AlreadyStopped);
        assert_eq!(frame_loop.state(), LoopState::Stopped);
        Ok(())
    }

    #[test]
    fn start_surfaces_camera_unavailable() {
        let mut frame_loop = frame_loop_with(Box::new(TestOpener { fail: true }), scripted(vec![]));
        let err = frame_loop.start().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::CameraUnavailable { index: 0, .. })
        ));
        assert_eq!(frame_loop.state(), LoopState::Stopped);
    }

    #[test]
    fn tick_requires_running_state() {
        let mut frame_loop = frame_loop_with(Box::new(TestOpener { fail: false }), scripted(vec![]));
        let err = frame_loop.tick(&mut NullSink).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn tick_counts_threshold_gated_detections() -> Result<()> {
        let script = vec![
            vec![det("person", 0.8), det("person", 0.3), det("dog", 0.6)],
            vec![],
            vec![det("cat", 0.9)],
        ];
        let mut frame_loop =
            frame_loop_with(Box::new(TestOpener { fail: false }), scripted(script));
        frame_loop.start()?;

        let first = frame_loop.tick(&mut NullSink)?;
        assert_eq!(first.detections_reported, 3);
        assert_eq!(first.detections_counted, 2);

        frame_loop.tick(&mut NullSink)?;
        frame_loop.tick(&mut NullSink)?;

        let snapshot = frame_loop.snapshot();
        assert_eq!(snapshot.total_detections, 3);
        assert_eq!(snapshot.frames_processed, 3);
        assert_eq!(snapshot.per_class.get("person"), Some(&1));
        assert_eq!(snapshot.per_class.get("dog"), Some(&1));
        assert_eq!(snapshot.per_class.get("cat"), Some(&1));
        Ok(())
    }

    #[test]
    fn frame_read_failure_stops_the_loop() -> Result<()> {
        let mut frame_loop = frame_loop_with(Box::new(DyingOpener), scripted(vec![]));
        frame_loop.start()?;

        let err = frame_loop.tick(&mut NullSink).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::FrameReadError { .. })
        ));
        assert_eq!(frame_loop.state(), LoopState::Stopped);
        Ok(())
    }

    #[test]
    fn detector_failure_stops_the_loop() -> Result<()> {
        let mut frame_loop = frame_loop_with(
            Box::new(TestOpener { fail: false }),
            Arc::new(Mutex::new(FailingBackend)),
        );
        frame_loop.start()?;

        let err = frame_loop.tick(&mut NullSink).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::DetectorFailure { .. })
        ));
        assert_eq!(frame_loop.state(), LoopState::Stopped);
        Ok(())
    }

    #[test]
    fn threshold_validation_rejects_out_of_range_values() -> Result<()> {
        let mut frame_loop = frame_loop_with(Box::new(TestOpener { fail: false }), scripted(vec![]));

        for bad in [0.0, -0.2, 1.01, f32::NAN, f32::INFINITY] {
            let err = frame_loop.set_confidence_threshold(bad).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<PipelineError>(),
                Some(PipelineError::InvalidArgument(_))
            ));
            assert_eq!(frame_loop.config().confidence_threshold, 0.5);
        }

        assert_eq!(
            frame_loop.set_confidence_threshold(1.0)?,
            CommandOutcome::ThresholdSet(1.0)
        );
        assert_eq!(
            frame_loop.set_confidence_threshold(0.05)?,
            CommandOutcome::ThresholdSet(0.05)
        );
        Ok(())
    }

    #[test]
    fn screenshot_before_first_tick_is_rejected() {
        let frame_loop = frame_loop_with(Box::new(TestOpener { fail: false }), scripted(vec![]));
        let err = frame_loop.take_screenshot().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NoFrameAvailable)
        ));
    }

    #[test]
    fn camera_selection_requires_stopped_state() -> Result<()> {
        let mut frame_loop = frame_loop_with(Box::new(TestOpener { fail: false }), scripted(vec![]));

        assert_eq!(
            frame_loop.select_camera(2)?,
            CommandOutcome::CameraSelected(2)
        );
        assert_eq!(frame_loop.config().camera_index, 2);

        frame_loop.start()?;
        assert!(frame_loop.select_camera(1).is_err());
        assert_eq!(frame_loop.config().camera_index, 2);
        Ok(())
    }

    #[test]
    fn fps_window_holds_zero_until_first_window_closes() {
        let mut fps = FpsWindow::new();
        let t0 = Instant::now();
        fps.window_start = t0;

        fps.tick_at(t0 + Duration::from_millis(100));
        fps.tick_at(t0 + Duration::from_millis(500));
        assert_eq!(fps.value(), 0.0);

        fps.tick_at(t0 + Duration::from_millis(1200));
        let value = fps.value();
        assert!(value > 2.0 && value < 3.0, "unexpected fps {}", value);

        // Held between window closes.
        fps.tick_at(t0 + Duration::from_millis(1300));
        assert_eq!(fps.value(), value);
    }
}
