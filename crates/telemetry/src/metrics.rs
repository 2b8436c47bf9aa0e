//! Running performance counters

use serde::Serialize;

/// Aggregated timing and reliability counters for the detection pipeline.
///
/// One instance lives for the whole process, mutated once per pipeline
/// stage and reset only on explicit request. Pure aggregation; recording
/// never blocks.
#[derive(Debug, Clone)]
pub struct PerformanceMetrics {
    total_inferences: u64,
    total_inference_time_us: u64,
    min_inference_time_us: u64,
    max_inference_time_us: u64,
    total_captures: u64,
    failed_captures: u64,
    total_preprocess_time_us: u64,
    preprocess_samples: u64,
    total_postprocess_time_us: u64,
    postprocess_samples: u64,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            total_inferences: 0,
            total_inference_time_us: 0,
            min_inference_time_us: u64::MAX,
            max_inference_time_us: 0,
            total_captures: 0,
            failed_captures: 0,
            total_preprocess_time_us: 0,
            preprocess_samples: 0,
            total_postprocess_time_us: 0,
            postprocess_samples: 0,
        }
    }

    /// Record one model invocation, one sample per call.
    pub fn record_inference(&mut self, duration_us: u64) {
        self.total_inferences += 1;
        self.total_inference_time_us += duration_us;
        self.min_inference_time_us = self.min_inference_time_us.min(duration_us);
        self.max_inference_time_us = self.max_inference_time_us.max(duration_us);
    }

    /// Record one capture attempt.
    pub fn record_capture(&mut self, success: bool) {
        self.total_captures += 1;
        if !success {
            self.failed_captures += 1;
        }
    }

    pub fn record_preprocess(&mut self, duration_us: u64) {
        self.total_preprocess_time_us += duration_us;
        self.preprocess_samples += 1;
    }

    pub fn record_postprocess(&mut self, duration_us: u64) {
        self.total_postprocess_time_us += duration_us;
        self.postprocess_samples += 1;
    }

    /// Mean invoke latency in microseconds, 0 with no samples.
    pub fn average_inference_us(&self) -> f64 {
        if self.total_inferences == 0 {
            return 0.0;
        }
        self.total_inference_time_us as f64 / self.total_inferences as f64
    }

    /// Fraction of capture attempts that succeeded, 0 with no attempts.
    pub fn capture_success_rate(&self) -> f64 {
        if self.total_captures == 0 {
            return 0.0;
        }
        (self.total_captures - self.failed_captures) as f64 / self.total_captures as f64
    }

    /// Fastest recorded invoke, 0 with no samples.
    pub fn min_inference_us(&self) -> u64 {
        if self.total_inferences == 0 {
            0
        } else {
            self.min_inference_time_us
        }
    }

    pub fn max_inference_us(&self) -> u64 {
        self.max_inference_time_us
    }

    pub fn average_preprocess_us(&self) -> f64 {
        if self.preprocess_samples == 0 {
            return 0.0;
        }
        self.total_preprocess_time_us as f64 / self.preprocess_samples as f64
    }

    pub fn average_postprocess_us(&self) -> f64 {
        if self.postprocess_samples == 0 {
            return 0.0;
        }
        self.total_postprocess_time_us as f64 / self.postprocess_samples as f64
    }

    pub fn total_inferences(&self) -> u64 {
        self.total_inferences
    }

    pub fn total_captures(&self) -> u64 {
        self.total_captures
    }

    pub fn failed_captures(&self) -> u64 {
        self.failed_captures
    }

    /// Serializable snapshot for the status surface.
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_inferences: self.total_inferences,
            average_inference_us: self.average_inference_us(),
            min_inference_us: self.min_inference_us(),
            max_inference_us: self.max_inference_us(),
            total_captures: self.total_captures,
            failed_captures: self.failed_captures,
            capture_success_rate: self.capture_success_rate(),
            average_preprocess_us: self.average_preprocess_us(),
            average_postprocess_us: self.average_postprocess_us(),
        }
    }

    /// Zero every counter.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of [`PerformanceMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_inferences: u64,
    pub average_inference_us: f64,
    pub min_inference_us: u64,
    pub max_inference_us: u64,
    pub total_captures: u64,
    pub failed_captures: u64,
    pub capture_success_rate: f64,
    pub average_preprocess_us: f64,
    pub average_postprocess_us: f64,
}
