//! Closed-registry model switching

use crate::{InferenceEngine, InferenceError, ModelKind, ModelMetadata, ModelType};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Registry of model blobs keyed by detection domain.
///
/// Switching dispatches through the closed [`ModelType`] set to the matching
/// metadata constructor; there is no open-ended dynamic loading.
#[derive(Default)]
pub struct ModelCatalog {
    blobs: HashMap<ModelType, Arc<[u8]>>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model_type: ModelType, blob: Arc<[u8]>) {
        info!(?model_type, bytes = blob.len(), "model blob registered");
        self.blobs.insert(model_type, blob);
    }

    pub fn contains(&self, model_type: ModelType) -> bool {
        self.blobs.contains_key(&model_type)
    }

    /// Load the blob registered for `model_type` into `engine`.
    ///
    /// On any failure the engine retains no model; detections cannot run
    /// until a later successful switch.
    pub fn switch_model(
        &self,
        engine: &mut InferenceEngine,
        model_type: ModelType,
    ) -> Result<(), InferenceError> {
        info!(?model_type, "switching model");

        let Some(blob) = self.blobs.get(&model_type).cloned() else {
            engine.unload();
            warn!(?model_type, "model switch failed, no blob registered");
            return Err(InferenceError::ModelUnavailable(model_type));
        };

        let meta = match model_type {
            ModelType::Person => ModelMetadata::person(blob),
            ModelType::Vehicle => ModelMetadata::vehicle(blob),
            ModelType::Animal => ModelMetadata::animal(blob),
            ModelType::Custom => {
                engine.unload();
                return Err(InferenceError::InvalidModel(
                    "custom models load through load_custom".into(),
                ));
            }
        };

        engine.load(meta)
    }

    /// Load an externally supplied blob under a caller-chosen name.
    pub fn load_custom(
        engine: &mut InferenceEngine,
        blob: Arc<[u8]>,
        name: &str,
        kind: ModelKind,
    ) -> Result<(), InferenceError> {
        info!(name, ?kind, "loading custom model");
        engine.load(ModelMetadata::custom(blob, name, kind))
    }
}
