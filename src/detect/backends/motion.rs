//! Block-hash motion backend.
//!
//! Splits the frame into an 8x8 grid, hashes each cell, and compares the
//! hashes against the previous frame. Changed cells are merged into one
//! bounding box reported as a single "motion" detection; confidence grows
//! with the fraction of cells that changed. Runs on any machine with no
//! model weights, which makes it the practical backend for a real webcam.

use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

const GRID: u32 = 8;

#[derive(Default)]
pub struct MotionBackend {
    last_cells: Option<Vec<[u8; 32]>>,
}

impl MotionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell_hashes(frame: &Frame) -> Vec<[u8; 32]> {
        let w = frame.width as usize;
        let h = frame.height as usize;
        let mut hashes = Vec::with_capacity((GRID * GRID) as usize);
        for gy in 0..GRID as usize {
            let y0 = gy * h / GRID as usize;
            let y1 = (gy + 1) * h / GRID as usize;
            for gx in 0..GRID as usize {
                let x0 = gx * w / GRID as usize;
                let x1 = (gx + 1) * w / GRID as usize;
                let mut hasher = Sha256::new();
                for y in y0..y1 {
                    let row = (y * w + x0) * 3..(y * w + x1) * 3;
                    hasher.update(&frame.data[row]);
                }
                hashes.push(hasher.finalize().into());
            }
        }
        hashes
    }
}

impl DetectorBackend for MotionBackend {
    fn name(&self) -> &'static str {
        "motion"
    }

    fn detect(&mut self, frame: &Frame, _confidence_threshold: f32) -> Result<Vec<Detection>> {
        let cells = Self::cell_hashes(frame);
        let Some(previous) = self.last_cells.take() else {
            // First frame has no reference; report nothing.
            self.last_cells = Some(cells);
            return Ok(Vec::new());
        };

        let mut changed = 0u32;
        let (mut min_gx, mut min_gy) = (GRID, GRID);
        let (mut max_gx, mut max_gy) = (0u32, 0u32);
        for (idx, (prev, cur)) in previous.iter().zip(cells.iter()).enumerate() {
            if prev != cur {
                changed += 1;
                let gx = idx as u32 % GRID;
                let gy = idx as u32 / GRID;
                min_gx = min_gx.min(gx);
                min_gy = min_gy.min(gy);
                max_gx = max_gx.max(gx);
                max_gy = max_gy.max(gy);
            }
        }

        self.last_cells = Some(cells);

        if changed == 0 {
            return Ok(Vec::new());
        }

        let cell_w = frame.width as f32 / GRID as f32;
        let cell_h = frame.height as f32 / GRID as f32;
        let bbox = BoundingBox::new(
            min_gx as f32 * cell_w,
            min_gy as f32 * cell_h,
            (max_gx - min_gx + 1) as f32 * cell_w,
            (max_gy - min_gy + 1) as f32 * cell_h,
        );
        let fraction = changed as f32 / (GRID * GRID) as f32;
        let confidence = fraction.sqrt().clamp(0.0, 1.0);

        Ok(vec![Detection {
            class_id: 0,
            class_name: "motion".to_string(),
            confidence,
            bbox,
        }])
    }
}
