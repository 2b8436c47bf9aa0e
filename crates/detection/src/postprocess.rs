//! Model output decoding, NMS, and confidence filtering

use crate::{BoundingBox, DetectionClass, DetectionResult};
use inference_engine::{ModelKind, ModelMetadata, OutputTensor};
use sensor_bus::SensorId;
use tracing::debug;

/// Values per candidate in detection-shaped output:
/// class, score, x, y, width, height.
const DETECTION_STRIDE: usize = 6;

/// Turns raw model output into zero or more typed detections.
///
/// Dispatches on the model's [`ModelKind`] tag, never on the tensor shape.
/// Results are ordered confidence-descending, at most `max_detections`.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    max_detections: usize,
    nms_iou_threshold: f32,
}

impl PostProcessor {
    pub fn new() -> Self {
        Self {
            max_detections: 10,
            nms_iou_threshold: 0.5,
        }
    }

    pub fn with_limits(max_detections: usize, nms_iou_threshold: f32) -> Self {
        Self {
            max_detections,
            nms_iou_threshold,
        }
    }

    pub fn extract(
        &self,
        output: &OutputTensor,
        meta: &ModelMetadata,
        sensor: SensorId,
        timestamp_ms: u64,
    ) -> Vec<DetectionResult> {
        match meta.kind {
            ModelKind::Classification => {
                vec![self.extract_classification(output, meta, sensor, timestamp_ms)]
            }
            ModelKind::Detection => self.extract_detections(output, meta, sensor, timestamp_ms),
        }
    }

    /// Argmax over the class scores; one result, localized to the full
    /// input frame. Below-threshold output yields an invalid result rather
    /// than no result.
    fn extract_classification(
        &self,
        output: &OutputTensor,
        meta: &ModelMetadata,
        sensor: SensorId,
        timestamp_ms: u64,
    ) -> DetectionResult {
        let mut best = f32::MIN;
        let mut best_index = None;

        for i in 0..meta.class_count.min(output.len()) {
            let confidence = output.value(i);
            if confidence > best {
                best = confidence;
                best_index = Some(i);
            }
        }

        let (class, confidence) = match best_index {
            Some(index) => (DetectionClass::from_index(index), best),
            None => (None, 0.0),
        };

        DetectionResult {
            sensor,
            class,
            confidence,
            bbox: BoundingBox::new(0, 0, meta.input_width as u16, meta.input_height as u16),
            timestamp_ms,
            valid: class.is_some() && confidence >= meta.threshold,
        }
    }

    /// Decode per-anchor tuples, then NMS, then the confidence filter.
    fn extract_detections(
        &self,
        output: &OutputTensor,
        meta: &ModelMetadata,
        sensor: SensorId,
        timestamp_ms: u64,
    ) -> Vec<DetectionResult> {
        let mut candidates = Vec::new();

        for group in 0..output.len() / DETECTION_STRIDE {
            let base = group * DETECTION_STRIDE;

            let class_value = output.value(base);
            if class_value < 0.0 {
                continue;
            }
            let Some(class) = DetectionClass::from_index(class_value.round() as usize) else {
                continue;
            };

            candidates.push(DetectionResult {
                sensor,
                class: Some(class),
                confidence: output.value(base + 1),
                bbox: BoundingBox::new(
                    clamp_coord(output.value(base + 2)),
                    clamp_coord(output.value(base + 3)),
                    clamp_coord(output.value(base + 4)),
                    clamp_coord(output.value(base + 5)),
                ),
                timestamp_ms,
                valid: true,
            });
        }

        let decoded = candidates.len();
        if candidates.len() > 1 {
            non_max_suppression(&mut candidates, self.nms_iou_threshold);
        }
        filter_by_confidence(&mut candidates, meta.threshold);
        candidates.truncate(self.max_detections);

        debug!(decoded, kept = candidates.len(), "detection output processed");
        candidates
    }
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_coord(value: f32) -> u16 {
    value.clamp(0.0, u16::MAX as f32) as u16
}

/// Suppress lower-confidence candidates of the same class whose IoU with a
/// kept candidate exceeds `iou_threshold`.
///
/// Candidates of different classes never suppress each other. Sorting is
/// unstable; equal-confidence candidates may reorder. Running the pass
/// again on its own output changes nothing.
pub fn non_max_suppression(detections: &mut Vec<DetectionResult>, iou_threshold: f32) {
    if detections.len() <= 1 {
        return;
    }

    detections.sort_unstable_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep = vec![true; detections.len()];
    for i in 0..detections.len() {
        if !keep[i] {
            continue;
        }
        for j in (i + 1)..detections.len() {
            if !keep[j] || detections[i].class != detections[j].class {
                continue;
            }
            if detections[i].bbox.iou(&detections[j].bbox) > iou_threshold {
                keep[j] = false;
            }
        }
    }

    let mut index = 0;
    detections.retain(|_| {
        let kept = keep[index];
        index += 1;
        kept
    });
}

/// Drop every detection below `threshold`.
pub fn filter_by_confidence(detections: &mut Vec<DetectionResult>, threshold: f32) {
    detections.retain(|d| d.confidence >= threshold);
}
