//! Display sinks.
//!
//! A sink is the abstract consumer of rendered frames and statistics
//! snapshots: an interactive surface, a web panel, or nothing at all. The
//! frame loop emits to exactly one sink per tick and treats sink failures
//! as non-fatal (they are logged, the loop keeps running).

use std::time::{Duration, Instant};

use anyhow::Result;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};

use crate::stats::StatsSnapshot;

pub trait DisplaySink {
    fn emit_frame(&mut self, frame: &RgbImage) -> Result<()>;
    fn emit_stats(&mut self, snapshot: &StatsSnapshot) -> Result<()>;
}

/// Discards everything. Useful for tests and headless runs.
#[derive(Debug, Default)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn emit_frame(&mut self, _frame: &RgbImage) -> Result<()> {
        Ok(())
    }

    fn emit_stats(&mut self, _snapshot: &StatsSnapshot) -> Result<()> {
        Ok(())
    }
}

/// Logs a one-line statistics report at a fixed interval. Frames are not
/// displayed; screenshots are the raster output of the terminal front-end.
pub struct TerminalSink {
    interval: Duration,
    last_report: Option<Instant>,
}

impl TerminalSink {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_report: None,
        }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl DisplaySink for TerminalSink {
    fn emit_frame(&mut self, _frame: &RgbImage) -> Result<()> {
        Ok(())
    }

    fn emit_stats(&mut self, snapshot: &StatsSnapshot) -> Result<()> {
        let due = self
            .last_report
            .map(|at| at.elapsed() >= self.interval)
            .unwrap_or(true);
        if !due {
            return Ok(());
        }
        self.last_report = Some(Instant::now());

        let classes = snapshot
            .per_class
            .iter()
            .map(|(class, count)| format!("{}:{}", class, count))
            .collect::<Vec<_>>()
            .join(" ");
        log::info!(
            "frames={} detections={} {}",
            snapshot.frames_processed,
            snapshot.total_detections,
            classes
        );
        Ok(())
    }
}

/// Encode a rendered frame as JPEG.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(out)
}
