//! Model Execution Engine
//!
//! Binds one quantized model at a time to a fixed working arena and runs it
//! through an opaque execution backend. Loading validates the blob's schema
//! version; any load failure leaves the engine with no model resident.

mod catalog;
mod engine;
mod metadata;

pub use catalog::ModelCatalog;
pub use engine::{InferenceBackend, InferenceEngine, InvokeResult, OutputTensor, StubBackend};
pub use metadata::{
    arena_requirement, pack_blob, schema_version, ModelKind, ModelMetadata, ModelType,
    BLOB_HEADER_LEN, MODEL_INPUT_CHANNELS, MODEL_INPUT_HEIGHT, MODEL_INPUT_WIDTH,
    MODEL_SCHEMA_VERSION,
};

use thiserror::Error;

/// Size of the execution arena, sized to the largest supported model.
pub const TENSOR_ARENA_BYTES: usize = 500 * 1024;

/// Errors at the model loading and execution boundary.
///
/// Every variant is returned to the caller; nothing crosses this boundary
/// as a panic.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model blob is malformed: {0}")]
    InvalidModel(String),

    #[error("model schema version {found} not supported (engine supports {supported})")]
    SchemaMismatch { found: u32, supported: u32 },

    #[error("tensor arena exhausted: model needs {required} bytes, arena holds {capacity}")]
    ArenaExhausted { required: usize, capacity: usize },

    #[error("no model loaded")]
    NoModelLoaded,

    #[error("input buffer is {actual} bytes, model expects {expected}")]
    InputSize { expected: usize, actual: usize },

    #[error("model execution failed: {0}")]
    ExecutionFailed(String),

    #[error("no blob registered for model type {0:?}")]
    ModelUnavailable(ModelType),
}
