//! Detection statistics and the operator status surface

use detection::DetectionClass;
use serde::Serialize;
use telemetry::MetricsSummary;

/// Running totals over valid detections.
#[derive(Debug, Clone, Default)]
pub struct DetectionStats {
    total: u64,
    per_class: [u64; DetectionClass::COUNT],
    confidence_sum: f64,
}

impl DetectionStats {
    pub fn record(&mut self, class: DetectionClass, confidence: f32) {
        self.total += 1;
        self.per_class[class.index()] += 1;
        self.confidence_sum += confidence as f64;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count_for(&self, class: DetectionClass) -> u64 {
        self.per_class[class.index()]
    }

    /// Mean confidence over every valid detection since the last reset,
    /// 0 with none recorded.
    pub fn average_confidence(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        (self.confidence_sum / self.total as f64) as f32
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Periodic snapshot for the operator surface; the values are what matter,
/// the rendering is free.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub cycles: u64,
    pub total_detections: u64,
    pub detections_per_class: Vec<ClassCount>,
    pub average_confidence: f32,
    /// Current history occupancy, per sensor.
    pub history_len: [usize; 2],
    pub history_fill: [f64; 2],
    pub alarm_active: bool,
    /// True while inference cannot run (no model resident, or the model
    /// geometry does not match the staging buffer).
    pub degraded: bool,
    pub metrics: MetricsSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassCount {
    pub class: DetectionClass,
    pub count: u64,
}
