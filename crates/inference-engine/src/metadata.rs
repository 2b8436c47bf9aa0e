//! Model descriptors and the blob header

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Blob schema version this engine executes.
pub const MODEL_SCHEMA_VERSION: u32 = 3;

/// Header bytes ahead of the model payload: schema version, then the arena
/// requirement, both little-endian u32.
pub const BLOB_HEADER_LEN: usize = 8;

/// Default model input geometry.
pub const MODEL_INPUT_WIDTH: u32 = 96;
pub const MODEL_INPUT_HEIGHT: u32 = 96;
pub const MODEL_INPUT_CHANNELS: u32 = 3;

/// Score threshold below which a detection is not considered valid.
const DETECTION_THRESHOLD: f32 = 0.5;

/// Classes the bundled models are trained on.
const CLASS_COUNT: usize = 3;

/// Detection domain a model covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    Person,
    Vehicle,
    Animal,
    Custom,
}

/// Output shape contract of a model, fixed at load time.
///
/// Dispatching on this tag instead of inferring the shape from tensor
/// dimensions at inference time removes the ambiguous-shape case entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    /// One score per class, no localization.
    Classification,
    /// Per-anchor class, score, and box tuples.
    Detection,
}

/// Descriptor for a loadable model blob.
///
/// Exactly one model is active at a time; the engine owns the active
/// metadata together with the execution context bound to it.
#[derive(Debug, Clone)]
pub struct ModelMetadata {
    pub name: String,
    pub version: String,
    pub model_type: ModelType,
    pub kind: ModelKind,
    /// Immutable model bytes, shared with whoever registered them.
    pub blob: Arc<[u8]>,
    pub input_width: u32,
    pub input_height: u32,
    pub input_channels: u32,
    pub class_count: usize,
    pub threshold: f32,
    pub quantized: bool,
}

impl ModelMetadata {
    /// Descriptor with the stock input geometry and thresholds.
    pub fn new(name: &str, model_type: ModelType, kind: ModelKind, blob: Arc<[u8]>) -> Self {
        Self {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            model_type,
            kind,
            blob,
            input_width: MODEL_INPUT_WIDTH,
            input_height: MODEL_INPUT_HEIGHT,
            input_channels: MODEL_INPUT_CHANNELS,
            class_count: CLASS_COUNT,
            threshold: DETECTION_THRESHOLD,
            quantized: true,
        }
    }

    pub fn person(blob: Arc<[u8]>) -> Self {
        Self::new("Person Detection", ModelType::Person, ModelKind::Classification, blob)
    }

    pub fn vehicle(blob: Arc<[u8]>) -> Self {
        Self::new("Vehicle Detection", ModelType::Vehicle, ModelKind::Classification, blob)
    }

    pub fn animal(blob: Arc<[u8]>) -> Self {
        Self::new("Animal Detection", ModelType::Animal, ModelKind::Classification, blob)
    }

    /// Externally supplied blob under a caller-chosen name.
    pub fn custom(blob: Arc<[u8]>, name: &str, kind: ModelKind) -> Self {
        Self::new(name, ModelType::Custom, kind, blob)
    }

    /// Exact byte length of one input tensor.
    pub fn input_len(&self) -> usize {
        self.input_width as usize * self.input_height as usize * self.input_channels as usize
    }

    pub fn blob_len(&self) -> usize {
        self.blob.len()
    }
}

/// Build a well-formed blob: header plus payload.
pub fn pack_blob(schema_version: u32, arena_required: u32, payload: &[u8]) -> Arc<[u8]> {
    let mut blob = Vec::with_capacity(BLOB_HEADER_LEN + payload.len());
    blob.extend_from_slice(&schema_version.to_le_bytes());
    blob.extend_from_slice(&arena_required.to_le_bytes());
    blob.extend_from_slice(payload);
    blob.into()
}

/// Schema version field of a packed blob, `None` when the blob is shorter
/// than the header.
pub fn schema_version(blob: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = blob.get(0..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Arena bytes the blob declares it needs at load time.
pub fn arena_requirement(blob: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = blob.get(4..8)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}
