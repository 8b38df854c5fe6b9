use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Detector backend trait.
///
/// Backends are opaque collaborators: each `detect` call is independent and
/// carries no contract about hidden state between frames. A backend may
/// return detections below the requested threshold (the hint exists so
/// model-side pruning can happen where it is cheap); the pipeline's
/// statistics gate performs the authoritative filtering.
pub trait DetectorBackend: Send {
    /// Backend identifier, used for registry lookup and error reports.
    fn name(&self) -> &'static str;

    /// Run detection on one RGB24 frame.
    fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, called once when the loop starts.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
