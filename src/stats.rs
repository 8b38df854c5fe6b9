//! Running detection statistics.
//!
//! The aggregator owns the only mutable statistics state in the process and
//! is the single authoritative threshold gate: it receives the raw detector
//! output for each frame and counts only detections at or above the current
//! confidence threshold. Counters are monotonic until an explicit reset.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::detect::Detection;

/// Immutable copy of the statistics state, for display surfaces.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_detections: u64,
    pub frames_processed: u64,
    pub per_class: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
pub struct StatisticsAggregator {
    total_detections: u64,
    frames_processed: u64,
    per_class: BTreeMap<String, u64>,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one frame's detections into the counters.
    ///
    /// Counts every detection with `confidence >= threshold` once into the
    /// total and into its class bucket. `frames_processed` advances exactly
    /// once per call, regardless of how many detections were counted.
    /// Returns the number of detections that met the threshold.
    pub fn record_frame(&mut self, detections: &[Detection], threshold: f32) -> usize {
        self.frames_processed += 1;
        let mut counted = 0;
        for det in detections.iter().filter(|d| d.passes(threshold)) {
            self.total_detections += 1;
            *self.per_class.entry(det.class_name.clone()).or_insert(0) += 1;
            counted += 1;
        }
        counted
    }

    /// Zero every counter and clear the per-class map.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn total_detections(&self) -> u64 {
        self.total_detections
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_detections: self.total_detections,
            frames_processed: self.frames_processed,
            per_class: self.per_class.clone(),
        }
    }
}
