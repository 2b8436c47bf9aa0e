//! Arena-backed model execution

use crate::metadata::{arena_requirement, schema_version, MODEL_SCHEMA_VERSION};
use crate::{InferenceError, ModelMetadata, TENSOR_ARENA_BYTES};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Raw model output plus the parameters needed to read it.
#[derive(Debug, Clone)]
pub enum OutputTensor {
    /// 8-bit scores with scale and zero point from the output tensor
    /// metadata.
    Quantized {
        data: Vec<u8>,
        scale: f32,
        zero_point: i32,
    },
    Float(Vec<f32>),
}

impl OutputTensor {
    pub fn len(&self) -> usize {
        match self {
            OutputTensor::Quantized { data, .. } => data.len(),
            OutputTensor::Float(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `i`, dequantized as `(raw - zero_point) * scale` for
    /// quantized outputs. Callers compare thresholds against this value
    /// only, never against raw bytes.
    pub fn value(&self, i: usize) -> f32 {
        match self {
            OutputTensor::Quantized {
                data,
                scale,
                zero_point,
            } => (data[i] as i32 - zero_point) as f32 * scale,
            OutputTensor::Float(values) => values[i],
        }
    }
}

/// Opaque execution backend: binds a model into the arena, accepts an input
/// tensor, returns an output tensor.
pub trait InferenceBackend: Send {
    /// Construct an execution context for `meta` within `arena_capacity`
    /// bytes. Failure to fit is fatal for that model.
    fn bind(&mut self, meta: &ModelMetadata, arena_capacity: usize) -> Result<(), InferenceError>;

    /// Tear down the current execution context.
    fn unbind(&mut self);

    fn invoke(&mut self, input: &[u8]) -> Result<OutputTensor, InferenceError>;
}

/// One invocation's output and its measured latency.
#[derive(Debug)]
pub struct InvokeResult {
    pub output: OutputTensor,
    pub latency_us: u64,
}

/// Owns the active model and the fixed working arena.
///
/// The arena is allocated once at construction and never resized; input
/// bytes are copied into it verbatim before each invoke.
pub struct InferenceEngine {
    backend: Box<dyn InferenceBackend>,
    arena: Vec<u8>,
    meta: Option<ModelMetadata>,
}

impl InferenceEngine {
    pub fn new(backend: Box<dyn InferenceBackend>) -> Self {
        Self::with_arena_capacity(backend, TENSOR_ARENA_BYTES)
    }

    pub fn with_arena_capacity(backend: Box<dyn InferenceBackend>, capacity: usize) -> Self {
        Self {
            backend,
            arena: vec![0u8; capacity],
            meta: None,
        }
    }

    /// Make `meta` the active model.
    ///
    /// Any previously loaded model is torn down first; on any validation or
    /// bind failure the engine is left with no model resident.
    pub fn load(&mut self, meta: ModelMetadata) -> Result<(), InferenceError> {
        if self.meta.is_some() {
            debug!("tearing down previous execution context");
            self.backend.unbind();
            self.meta = None;
        }

        if meta.blob.is_empty() {
            return Err(InferenceError::InvalidModel("empty model blob".into()));
        }
        let found = schema_version(&meta.blob)
            .ok_or_else(|| InferenceError::InvalidModel("blob shorter than header".into()))?;
        if found != MODEL_SCHEMA_VERSION {
            warn!(found, supported = MODEL_SCHEMA_VERSION, "model schema version mismatch");
            return Err(InferenceError::SchemaMismatch {
                found,
                supported: MODEL_SCHEMA_VERSION,
            });
        }
        let input_len = meta.input_len();
        if input_len > self.arena.len() {
            return Err(InferenceError::ArenaExhausted {
                required: input_len,
                capacity: self.arena.len(),
            });
        }

        self.backend.bind(&meta, self.arena.len())?;
        info!(
            model = %meta.name,
            version = %meta.version,
            blob_bytes = meta.blob_len(),
            "model loaded"
        );
        self.meta = Some(meta);
        Ok(())
    }

    /// Copy `input` into the arena and execute the active model.
    pub fn invoke(&mut self, input: &[u8]) -> Result<InvokeResult, InferenceError> {
        let meta = self.meta.as_ref().ok_or(InferenceError::NoModelLoaded)?;
        let expected = meta.input_len();
        if input.len() != expected {
            return Err(InferenceError::InputSize {
                expected,
                actual: input.len(),
            });
        }

        self.arena[..expected].copy_from_slice(input);

        let started = Instant::now();
        let output = self.backend.invoke(&self.arena[..expected])?;
        let latency_us = started.elapsed().as_micros() as u64;

        Ok(InvokeResult { output, latency_us })
    }

    pub fn unload(&mut self) {
        if self.meta.take().is_some() {
            self.backend.unbind();
            info!("model unloaded");
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.meta.is_some()
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.meta.as_ref()
    }

    pub fn arena_capacity(&self) -> usize {
        self.arena.len()
    }
}

/// Scriptable backend for tests and the demo binary.
///
/// Scripted outputs are replayed in order, cycling once exhausted, so a
/// two-entry script serves one dual-sensor cycle per wrap.
pub struct StubBackend {
    outputs: Vec<OutputTensor>,
    cursor: usize,
    fail_invokes: u32,
    bound: Option<String>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::with_outputs(Vec::new())
    }

    pub fn with_outputs(outputs: Vec<OutputTensor>) -> Self {
        Self {
            outputs,
            cursor: 0,
            fail_invokes: 0,
            bound: None,
        }
    }

    /// Make the next `n` invokes fail.
    pub fn fail_next_invokes(mut self, n: u32) -> Self {
        self.fail_invokes = n;
        self
    }

    pub fn bound_model(&self) -> Option<&str> {
        self.bound.as_deref()
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for StubBackend {
    fn bind(&mut self, meta: &ModelMetadata, arena_capacity: usize) -> Result<(), InferenceError> {
        let required = arena_requirement(&meta.blob).unwrap_or(0) as usize;
        if required > arena_capacity {
            return Err(InferenceError::ArenaExhausted {
                required,
                capacity: arena_capacity,
            });
        }
        self.bound = Some(meta.name.clone());
        Ok(())
    }

    fn unbind(&mut self) {
        self.bound = None;
    }

    fn invoke(&mut self, _input: &[u8]) -> Result<OutputTensor, InferenceError> {
        if self.bound.is_none() {
            return Err(InferenceError::ExecutionFailed("no execution context".into()));
        }
        if self.fail_invokes > 0 {
            self.fail_invokes -= 1;
            return Err(InferenceError::ExecutionFailed("injected invoke fault".into()));
        }
        if self.outputs.is_empty() {
            return Err(InferenceError::ExecutionFailed("no scripted output".into()));
        }
        let output = self.outputs[self.cursor % self.outputs.len()].clone();
        self.cursor += 1;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack_blob;

    fn valid_blob() -> std::sync::Arc<[u8]> {
        pack_blob(MODEL_SCHEMA_VERSION, 64 * 1024, b"weights")
    }

    fn scored_backend(scores: Vec<f32>) -> Box<StubBackend> {
        Box::new(StubBackend::with_outputs(vec![OutputTensor::Float(scores)]))
    }

    #[test]
    fn test_load_and_invoke() {
        let mut engine = InferenceEngine::new(scored_backend(vec![0.9, 0.05, 0.05]));
        engine.load(ModelMetadata::person(valid_blob())).unwrap();
        assert!(engine.is_loaded());

        let input = vec![0u8; 96 * 96 * 3];
        let result = engine.invoke(&input).unwrap();
        assert_eq!(result.output.len(), 3);
        assert!((result.output.value(0) - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_schema_mismatch_leaves_engine_unloaded() {
        let mut engine = InferenceEngine::new(Box::new(StubBackend::new()));
        engine.load(ModelMetadata::person(valid_blob())).unwrap();

        let stale = pack_blob(MODEL_SCHEMA_VERSION + 1, 0, b"old");
        let err = engine.load(ModelMetadata::vehicle(stale)).unwrap_err();

        assert!(matches!(
            err,
            InferenceError::SchemaMismatch { found, supported }
                if found == MODEL_SCHEMA_VERSION + 1 && supported == MODEL_SCHEMA_VERSION
        ));
        assert!(!engine.is_loaded());
        assert!(matches!(engine.invoke(&[]), Err(InferenceError::NoModelLoaded)));
    }

    #[test]
    fn test_arena_exhaustion_fails_load() {
        let greedy = pack_blob(MODEL_SCHEMA_VERSION, 2 * 1024 * 1024, b"big");
        let mut engine =
            InferenceEngine::with_arena_capacity(Box::new(StubBackend::new()), 64 * 1024);

        let err = engine.load(ModelMetadata::person(greedy)).unwrap_err();
        assert!(matches!(err, InferenceError::ArenaExhausted { .. }));
        assert!(!engine.is_loaded());
    }

    #[test]
    fn test_input_too_large_for_arena_fails_load() {
        let mut engine = InferenceEngine::with_arena_capacity(Box::new(StubBackend::new()), 16);
        let err = engine.load(ModelMetadata::person(valid_blob())).unwrap_err();
        assert!(matches!(err, InferenceError::ArenaExhausted { .. }));
    }

    #[test]
    fn test_invoke_validates_input_length() {
        let mut engine = InferenceEngine::new(scored_backend(vec![0.5]));
        engine.load(ModelMetadata::person(valid_blob())).unwrap();

        let err = engine.invoke(&[0u8; 10]).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::InputSize { expected, actual: 10 } if expected == 96 * 96 * 3
        ));
    }

    #[test]
    fn test_quantized_dequantization() {
        let output = OutputTensor::Quantized {
            data: vec![128, 228, 28],
            scale: 0.01,
            zero_point: 128,
        };

        assert!((output.value(0) - 0.0).abs() < 1e-6);
        assert!((output.value(1) - 1.0).abs() < 1e-6);
        assert!((output.value(2) - -1.0).abs() < 1e-6);
    }

    #[test]
    fn test_unload_tears_down_context() {
        let mut engine = InferenceEngine::new(scored_backend(vec![0.5]));
        engine.load(ModelMetadata::person(valid_blob())).unwrap();

        engine.unload();
        assert!(!engine.is_loaded());
        assert!(engine.metadata().is_none());
    }

    #[test]
    fn test_injected_invoke_fault() {
        let backend = StubBackend::with_outputs(vec![OutputTensor::Float(vec![0.5])])
            .fail_next_invokes(1);
        let mut engine = InferenceEngine::new(Box::new(backend));
        engine.load(ModelMetadata::person(valid_blob())).unwrap();

        let input = vec![0u8; 96 * 96 * 3];
        assert!(engine.invoke(&input).is_err());
        assert!(engine.invoke(&input).is_ok());
        assert!(engine.is_loaded());
    }
}
