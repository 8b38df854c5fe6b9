//! Camera capture sources.
//!
//! Sources produce [`Frame`] values already normalized to packed RGB24 (see
//! `crate::frame` for the convention). The capture layer is responsible for:
//! - opening exactly one device handle per camera index at a time
//! - negotiating a pixel format and normalizing it before handoff
//! - pacing reads to the configured target rate
//!
//! Two sources exist: a synthetic scene generator (always available, used by
//! tests and the out-of-the-box demo) and a V4L2 device source behind the
//! `camera-v4l2` feature. Acquisition is all-or-nothing: an opener either
//! returns a working stream or an error, never a half-open handle. Closing
//! a camera is dropping its stream.

mod synthetic;
#[cfg(feature = "camera-v4l2")]
mod v4l2;

pub use synthetic::SyntheticCamera;
#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Camera;

use anyhow::Result;

use crate::frame::Frame;

/// Capture settings shared by all sources.
#[derive(Clone, Debug)]
pub struct CameraSettings {
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Target frame rate; sources pace or decimate to this. 0 disables pacing.
    pub target_fps: u32,
    /// Use the synthetic scene generator instead of a real device.
    pub synthetic: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            target_fps: 30,
            synthetic: true,
        }
    }
}

/// One open capture stream. Exclusively owned by the frame loop; dropping
/// the stream releases the underlying device.
pub trait CameraStream: Send {
    /// Read the next frame, normalized to RGB24. Blocks until the source
    /// yields a frame or errors; there is no read timeout.
    fn read_frame(&mut self) -> Result<Frame>;

    /// Whether the source still looks alive.
    fn is_healthy(&self) -> bool;

    fn stats(&self) -> CaptureStats;
}

/// Capture statistics for health reporting.
#[derive(Clone, Debug)]
pub struct CaptureStats {
    pub frames_captured: u64,
    pub source: String,
}

/// Opens capture streams by camera index.
pub trait CameraOpener: Send {
    fn open(&self, index: u32) -> Result<Box<dyn CameraStream>>;
}

/// Default opener: synthetic scene when configured so (or when V4L2 support
/// is compiled out), `/dev/video<index>` otherwise.
pub struct SystemCameraOpener {
    settings: CameraSettings,
}

impl SystemCameraOpener {
    pub fn new(settings: CameraSettings) -> Self {
        Self { settings }
    }
}

impl CameraOpener for SystemCameraOpener {
    fn open(&self, index: u32) -> Result<Box<dyn CameraStream>> {
        if self.settings.synthetic {
            return Ok(Box::new(SyntheticCamera::new(index, self.settings.clone())));
        }
        #[cfg(feature = "camera-v4l2")]
        {
            let mut camera = V4l2Camera::new(index, self.settings.clone());
            camera.connect()?;
            return Ok(Box::new(camera));
        }
        #[cfg(not(feature = "camera-v4l2"))]
        {
            Err(anyhow::anyhow!(
                "camera {} requires the camera-v4l2 feature when synthetic capture is disabled",
                index
            ))
        }
    }
}
