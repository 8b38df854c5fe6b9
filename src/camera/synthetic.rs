//! Synthetic camera source.
//!
//! Generates a deterministic test scene: a static color gradient with a
//! bright block sweeping across it, so motion-style backends have something
//! localized to find. Reads are paced to the configured target rate to
//! mimic a blocking device read.

use std::time::Duration;

use anyhow::Result;

use super::{CameraSettings, CameraStream, CaptureStats};
use crate::frame::Frame;

pub struct SyntheticCamera {
    index: u32,
    settings: CameraSettings,
    frame_count: u64,
}

impl SyntheticCamera {
    pub fn new(index: u32, settings: CameraSettings) -> Self {
        Self {
            index,
            settings,
            frame_count: 0,
        }
    }

    fn render_scene(&self) -> Vec<u8> {
        let w = self.settings.width as usize;
        let h = self.settings.height as usize;
        let mut pixels = vec![0u8; w * h * 3];

        for y in 0..h {
            for x in 0..w {
                let offset = (y * w + x) * 3;
                pixels[offset] = (x * 255 / w.max(1)) as u8;
                pixels[offset + 1] = (y * 255 / h.max(1)) as u8;
                pixels[offset + 2] = 32;
            }
        }

        // Bright block sweeping left to right, one step per frame.
        let block_w = (w / 8).max(1);
        let block_h = (h / 6).max(1);
        let span = (w - block_w).max(1);
        let bx = (self.frame_count as usize * 5) % span;
        let by = h / 3;
        for y in by..(by + block_h).min(h) {
            for x in bx..(bx + block_w).min(w) {
                let offset = (y * w + x) * 3;
                pixels[offset] = 235;
                pixels[offset + 1] = 235;
                pixels[offset + 2] = 210;
            }
        }

        pixels
    }
}

impl CameraStream for SyntheticCamera {
    fn read_frame(&mut self) -> Result<Frame> {
        if self.settings.target_fps > 0 {
            // Simulate the blocking cadence of a real device.
            std::thread::sleep(Duration::from_millis(
                (1000 / self.settings.target_fps).max(1) as u64,
            ));
        }
        self.frame_count += 1;
        let pixels = self.render_scene();
        Frame::from_rgb(pixels, self.settings.width, self.settings.height)
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frame_count,
            source: format!("synthetic://{}", self.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_settings() -> CameraSettings {
        CameraSettings {
            width: 64,
            height: 48,
            target_fps: 0,
            synthetic: true,
        }
    }

    #[test]
    fn produces_frames_with_configured_geometry() -> Result<()> {
        let mut camera = SyntheticCamera::new(0, fast_settings());
        let frame = camera.read_frame()?;
        assert_eq!((frame.width, frame.height), (64, 48));
        assert_eq!(frame.data.len(), 64 * 48 * 3);
        Ok(())
    }

    #[test]
    fn consecutive_frames_differ() -> Result<()> {
        let mut camera = SyntheticCamera::new(0, fast_settings());
        let first = camera.read_frame()?;
        let second = camera.read_frame()?;
        assert_ne!(first.data, second.data);
        assert_eq!(camera.stats().frames_captured, 2);
        Ok(())
    }
}
