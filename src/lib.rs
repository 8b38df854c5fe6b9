//! lookout — webcam object-detection demo pipeline.
//!
//! A single synchronous frame loop reads from a camera source, runs a
//! pluggable detector backend, folds the results into running statistics,
//! renders overlays onto a copy of the frame, and hands the annotated frame
//! to a display sink. Two front-ends drive the same loop through one command
//! surface: a keyboard-driven terminal binary (`lookout`) and a web
//! dashboard (`lookout_web`).
//!
//! # Module structure
//!
//! - `frame`: RGB24 raster type and pixel-format normalization
//! - `camera`: capture sources (synthetic scene, V4L2 behind `camera-v4l2`)
//! - `detect`: detection results, backend trait, registry, built-in backends
//! - `stats`: monotonic detection statistics with threshold gating
//! - `overlay`: bounding boxes, labels, and the information panel
//! - `pipeline`: the frame loop, its state machine, and the command surface
//! - `sink`: display-sink contract and basic sinks
//! - `config`: JSON config file plus `LOOKOUT_*` environment overrides
//! - `web`: HTTP dashboard adapter and shared panel state

pub mod camera;
pub mod config;
pub mod detect;
pub mod frame;
pub mod overlay;
pub mod pipeline;
pub mod sink;
pub mod stats;
pub mod web;

pub use camera::{
    CameraOpener, CameraSettings, CameraStream, CaptureStats, SyntheticCamera, SystemCameraOpener,
};
#[cfg(feature = "camera-v4l2")]
pub use camera::V4l2Camera;
pub use config::AppConfig;
pub use detect::{
    BackendRegistry, BoundingBox, Detection, DetectorBackend, MotionBackend, SyntheticBackend,
};
pub use frame::{Frame, PixelFormat};
pub use overlay::{Overlay, OverlayStyle, PanelInfo};
pub use pipeline::{
    Command, CommandOutcome, FrameLoop, FpsWindow, LoopState, RunConfig, TickSummary,
};
pub use sink::{DisplaySink, NullSink, TerminalSink};
pub use stats::{StatisticsAggregator, StatsSnapshot};
pub use web::{PanelState, WebConfig, WebHandle, WebServer, WebSink};

/// Typed pipeline failures.
///
/// Errors travel through `anyhow::Result` so call sites can use `?` freely;
/// adapters and tests downcast to this enum when they need to distinguish
/// failure kinds (for example to report a screenshot no-op to the user).
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineError {
    /// The camera index could not be opened. The loop stays Stopped.
    CameraUnavailable { index: u32, reason: String },
    /// An open camera stopped yielding frames. The loop transitions to
    /// Stopped and the capture handle is released.
    FrameReadError { reason: String },
    /// The detector backend failed for a frame. Treated as persistent: the
    /// current tick aborts and the loop transitions to Stopped, no retry.
    DetectorFailure { backend: String, reason: String },
    /// Malformed input rejected synchronously; state unchanged.
    InvalidArgument(String),
    /// Screenshot requested before any frame has been rendered.
    NoFrameAvailable,
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::CameraUnavailable { index, reason } => {
                write!(f, "camera {} unavailable: {}", index, reason)
            }
            PipelineError::FrameReadError { reason } => {
                write!(f, "frame read failed: {}", reason)
            }
            PipelineError::DetectorFailure { backend, reason } => {
                write!(f, "detector backend '{}' failed: {}", backend, reason)
            }
            PipelineError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            PipelineError::NoFrameAvailable => write!(f, "no frame has been rendered yet"),
        }
    }
}

impl std::error::Error for PipelineError {}
