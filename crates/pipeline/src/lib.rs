//! Pipeline Orchestration
//!
//! Ties channel selection, capture, preprocessing, inference,
//! post-processing, history, alarming, and telemetry together: one full
//! detection cycle per sensor per loop iteration, driven by a single
//! poll-driven task.

mod config;
mod orchestrator;
mod record;
mod status;

pub use config::PipelineConfig;
pub use orchestrator::DetectionPipeline;
pub use record::{AlarmEvent, DetectionRecord, PipelineEvent};
pub use status::{ClassCount, DetectionStats, StatusReport};

use inference_engine::InferenceError;
use sensor_bus::BusError;
use thiserror::Error;

/// Fatal pipeline errors.
///
/// Per-cycle faults (a failed capture, a failed invoke) are counted and
/// skipped, never raised through this type.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("no sensor initialized")]
    NoSensors,

    #[error("pipeline not initialized")]
    NotInitialized,
}

/// Install the process-wide log subscriber.
pub fn init_logging() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}
