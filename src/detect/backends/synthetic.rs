//! Synthetic detector backend for demos and tests.
//!
//! Two modes:
//! - scripted: replays a fixed list of per-frame detection sets (cycling),
//!   which gives tests full control over what the pipeline sees;
//! - procedural (default): emits a "person" sweeping across the frame with
//!   oscillating confidence, plus an occasional low-confidence "dog", so
//!   threshold changes visibly alter what gets counted.

use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

pub struct SyntheticBackend {
    script: Option<Vec<Vec<Detection>>>,
    cursor: usize,
    frame_count: u64,
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self {
            script: None,
            cursor: 0,
            frame_count: 0,
        }
    }

    /// Replay `script` one entry per frame, cycling at the end.
    pub fn with_script(script: Vec<Vec<Detection>>) -> Self {
        Self {
            script: Some(script),
            cursor: 0,
            frame_count: 0,
        }
    }

    fn procedural(&mut self, frame: &Frame) -> Vec<Detection> {
        let w = frame.width as f32;
        let h = frame.height as f32;
        let t = self.frame_count as f32;

        // Box sweeps left to right, wrapping; confidence oscillates through
        // the default threshold so filtering is observable.
        let box_w = w / 4.0;
        let box_h = h / 3.0;
        let x = (t * 7.0) % (w - box_w).max(1.0);
        let y = h / 4.0;
        let wobble = rand::random::<f32>() * 0.05;
        let confidence = (0.62 + 0.3 * (t * 0.37).sin() + wobble).clamp(0.0, 1.0);

        let mut out = vec![Detection {
            class_id: 0,
            class_name: "person".to_string(),
            confidence,
            bbox: BoundingBox::new(x, y, box_w, box_h),
        }];

        if self.frame_count % 3 == 0 {
            out.push(Detection {
                class_id: 16,
                class_name: "dog".to_string(),
                confidence: 0.35,
                bbox: BoundingBox::new(w * 0.6, h * 0.6, box_w * 0.8, box_h * 0.7),
            });
        }
        out
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for SyntheticBackend {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn detect(&mut self, frame: &Frame, _confidence_threshold: f32) -> Result<Vec<Detection>> {
        self.frame_count += 1;
        if let Some(script) = &self.script {
            if script.is_empty() {
                return Ok(Vec::new());
            }
            let out = script[self.cursor % script.len()].clone();
            self.cursor += 1;
            return Ok(out);
        }
        Ok(self.procedural(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::from_rgb(vec![0u8; 64 * 48 * 3], 64, 48).unwrap()
    }

    fn det(class_name: &str, confidence: f32) -> Detection {
        Detection {
            class_id: 0,
            class_name: class_name.to_string(),
            confidence,
            bbox: BoundingBox::default(),
        }
    }

    #[test]
    fn scripted_backend_replays_and_cycles() -> Result<()> {
        let mut backend =
            SyntheticBackend::with_script(vec![vec![det("person", 0.8)], Vec::new()]);
        let frame = frame();

        assert_eq!(backend.detect(&frame, 0.5)?.len(), 1);
        assert!(backend.detect(&frame, 0.5)?.is_empty());
        assert_eq!(backend.detect(&frame, 0.5)?.len(), 1);
        Ok(())
    }

    #[test]
    fn procedural_backend_reports_in_bounds_boxes() -> Result<()> {
        let mut backend = SyntheticBackend::new();
        let frame = frame();
        for _ in 0..10 {
            for det in backend.detect(&frame, 0.5)? {
                assert!((0.0..=1.0).contains(&det.confidence));
                assert!(det.bbox.x >= 0.0 && det.bbox.x + det.bbox.w <= frame.width as f32 + 1.0);
            }
        }
        Ok(())
    }
}
