//! Outward-facing records
//!
//! The core reports valid detections and alarm transitions as plain
//! records; how they are serialized or transported is the downstream
//! consumer's business.

use alarm::AlarmTransition;
use detection::{BoundingBox, DetectionClass, DetectionResult};
use serde::Serialize;

/// One valid detection, shaped for downstream consumers.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionRecord {
    /// Numeric sensor id, 0 or 1.
    pub sensor: u8,
    pub class: DetectionClass,
    /// Confidence scaled to 0..=100.
    pub confidence_pct: u8,
    pub bbox: BoundingBox,
    pub timestamp_ms: u64,
}

impl DetectionRecord {
    /// Build from a detection; `None` when it is invalid or unclassified.
    pub fn from_detection(detection: &DetectionResult) -> Option<Self> {
        if !detection.valid {
            return None;
        }
        let class = detection.class?;
        Some(Self {
            sensor: detection.sensor.id(),
            class,
            confidence_pct: (detection.confidence.clamp(0.0, 1.0) * 100.0).round() as u8,
            bbox: detection.bbox,
            timestamp_ms: detection.timestamp_ms,
        })
    }
}

/// Alarm state change, stamped when it happened.
#[derive(Debug, Clone, Serialize)]
pub struct AlarmEvent {
    pub transition: AlarmTransition,
    pub timestamp_ms: u64,
}

/// Everything the pipeline reports outward.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineEvent {
    Detection(DetectionRecord),
    Alarm(AlarmEvent),
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_bus::SensorId;

    #[test]
    fn test_record_scales_confidence_to_percent() {
        let det = DetectionResult {
            class: Some(DetectionClass::Person),
            confidence: 0.854,
            valid: true,
            ..DetectionResult::empty(SensorId::Secondary, 7)
        };

        let record = DetectionRecord::from_detection(&det).unwrap();
        assert_eq!(record.sensor, 1);
        assert_eq!(record.confidence_pct, 85);
        assert_eq!(record.timestamp_ms, 7);
    }

    #[test]
    fn test_invalid_detection_yields_no_record() {
        let det = DetectionResult::empty(SensorId::Primary, 0);
        assert!(DetectionRecord::from_detection(&det).is_none());
    }

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let event = PipelineEvent::Alarm(AlarmEvent {
            transition: AlarmTransition::Raised,
            timestamp_ms: 12,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"alarm\""));
        assert!(json.contains("\"Raised\""));
    }
}
