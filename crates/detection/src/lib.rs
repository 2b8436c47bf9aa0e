//! Detection Types and Post-Processing
//!
//! Bounding-box geometry, the typed detection record, and the
//! post-processor that turns raw model output into detections through
//! dequantization, decoding, non-maximum suppression, and confidence
//! filtering.

mod geometry;
mod postprocess;
mod result;

pub use geometry::BoundingBox;
pub use postprocess::{filter_by_confidence, non_max_suppression, PostProcessor};
pub use result::{DetectionClass, DetectionResult};
