//! Typed detection records

use crate::BoundingBox;
use sensor_bus::SensorId;
use serde::{Deserialize, Serialize};

/// Closed set of object classes the bundled models are trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionClass {
    Person,
    Vehicle,
    Animal,
}

impl DetectionClass {
    pub const COUNT: usize = 3;

    pub const ALL: [DetectionClass; Self::COUNT] = [
        DetectionClass::Person,
        DetectionClass::Vehicle,
        DetectionClass::Animal,
    ];

    /// Class for a model output index, `None` when out of range.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            DetectionClass::Person => "Person",
            DetectionClass::Vehicle => "Vehicle",
            DetectionClass::Animal => "Animal",
        }
    }
}

/// One detection from one inference cycle.
///
/// Constructed invalid; becomes valid only when a class was assigned and
/// the confidence cleared the model's detection threshold. Consumers store
/// value copies, nothing holds a reference past the cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectionResult {
    pub sensor: SensorId,
    pub class: Option<DetectionClass>,
    /// Dequantized confidence in `[0, 1]`.
    pub confidence: f32,
    pub bbox: BoundingBox,
    /// Monotonic capture timestamp.
    pub timestamp_ms: u64,
    pub valid: bool,
}

impl DetectionResult {
    /// Invalid placeholder for `sensor` at `timestamp_ms`.
    pub fn empty(sensor: SensorId, timestamp_ms: u64) -> Self {
        Self {
            sensor,
            class: None,
            confidence: 0.0,
            bbox: BoundingBox::default(),
            timestamp_ms,
            valid: false,
        }
    }
}
