//! Alarm State Machine
//!
//! Two states, three transitions. A detection raises the alarm when its
//! confidence clears the alarm threshold, or when the sensor's last few
//! buffered detections are all valid (burst trigger). The alarm clears
//! itself by polling once per pipeline cycle; a re-trigger while active
//! only refreshes the auto-reset window.

use detection::DetectionResult;
use detection_history::DetectionHistory;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Alarm trigger and timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    /// Single-detection confidence needed to raise the alarm.
    pub confidence_threshold: f32,
    /// How long the alarm stays up without a re-trigger, in milliseconds.
    pub duration_ms: u64,
    /// Consecutive valid detections that raise the alarm regardless of
    /// individual confidence.
    pub burst_count: usize,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            duration_ms: 5000,
            burst_count: 3,
        }
    }
}

/// Observable state changes of the alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmTransition {
    /// IDLE became ACTIVE; outputs asserted.
    Raised,
    /// Re-trigger while ACTIVE; auto-reset window refreshed, outputs
    /// untouched.
    Extended,
    /// ACTIVE became IDLE after the window elapsed; outputs deasserted.
    Cleared,
}

/// Physical alarm outputs: indicator plus audible signal.
pub trait AlarmSink: Send {
    fn raise(&mut self);
    fn silence(&mut self);
}

/// Default sink that reports through the log instead of hardware pins.
#[derive(Debug, Default)]
pub struct TracingSink;

impl AlarmSink for TracingSink {
    fn raise(&mut self) {
        warn!("alarm raised");
    }

    fn silence(&mut self) {
        info!("alarm cleared");
    }
}

/// IDLE/ACTIVE machine with a polled timeout.
///
/// Timestamps are passed in by the caller, so tests drive the machine
/// without real time passing. The confidence trigger and the burst trigger
/// are independent; either one feeds the same ACTIVE state.
pub struct AlarmController {
    config: AlarmConfig,
    sink: Box<dyn AlarmSink>,
    active: bool,
    activated_at_ms: u64,
}

impl AlarmController {
    pub fn new(config: AlarmConfig) -> Self {
        Self::with_sink(config, Box::new(TracingSink))
    }

    pub fn with_sink(config: AlarmConfig, sink: Box<dyn AlarmSink>) -> Self {
        Self {
            config,
            sink,
            active: false,
            activated_at_ms: 0,
        }
    }

    /// Evaluate one detection against both triggers.
    ///
    /// `history` is the detection's sensor buffer with the detection
    /// already recorded.
    pub fn evaluate(
        &mut self,
        detection: &DetectionResult,
        history: &DetectionHistory,
        now_ms: u64,
    ) -> Option<AlarmTransition> {
        if !self.should_trigger(detection, history) {
            return None;
        }

        if self.active {
            self.activated_at_ms = now_ms;
            return Some(AlarmTransition::Extended);
        }

        self.active = true;
        self.activated_at_ms = now_ms;
        self.sink.raise();
        Some(AlarmTransition::Raised)
    }

    /// Clear the alarm once the auto-reset window has elapsed.
    ///
    /// Called once per pipeline cycle; there is no timer callback.
    pub fn poll(&mut self, now_ms: u64) -> Option<AlarmTransition> {
        if self.active && now_ms.saturating_sub(self.activated_at_ms) >= self.config.duration_ms {
            self.active = false;
            self.sink.silence();
            return Some(AlarmTransition::Cleared);
        }
        None
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Activation timestamp while the alarm is up.
    pub fn activated_at_ms(&self) -> Option<u64> {
        self.active.then_some(self.activated_at_ms)
    }

    fn should_trigger(&self, detection: &DetectionResult, history: &DetectionHistory) -> bool {
        if detection.valid && detection.confidence >= self.config.confidence_threshold {
            return true;
        }
        history.len() >= self.config.burst_count
            && (0..self.config.burst_count)
                .all(|n| history.latest(n).is_some_and(|d| d.valid))
    }
}
