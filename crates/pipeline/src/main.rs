//! Dual-sensor detection pipeline demo.
//!
//! Wires mock bus hardware and a scripted execution backend into the full
//! orchestrated loop and prints downstream records as JSON lines.

use inference_engine::{
    pack_blob, ModelCatalog, ModelType, OutputTensor, StubBackend, MODEL_SCHEMA_VERSION,
};
use pipeline::{init_logging, DetectionPipeline, PipelineConfig, PipelineEvent};
use sensor_bus::{FrameFormat, MockMultiplexer, MockSensor, SensorDriver};
use std::sync::Arc;
use telemetry::MonotonicClock;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    info!("=== Dual-Sensor Detection Pipeline v{} ===", env!("CARGO_PKG_VERSION"));

    let format = FrameFormat::qvga_rgb565();

    // One confident person hit on the primary sensor each cycle, a
    // sub-threshold vehicle reading on the secondary.
    let backend = StubBackend::with_outputs(vec![
        OutputTensor::Float(vec![0.85, 0.10, 0.05]),
        OutputTensor::Float(vec![0.10, 0.30, 0.20]),
    ]);

    let mut catalog = ModelCatalog::new();
    catalog.register(
        ModelType::Person,
        pack_blob(MODEL_SCHEMA_VERSION, 64 * 1024, b"person-demo-weights"),
    );

    let config = PipelineConfig {
        cycle_interval_ms: 250,
        status_interval_cycles: 5,
        max_cycles: Some(20),
        ..Default::default()
    };

    let sensors: [Box<dyn SensorDriver>; 2] = [
        Box::new(MockSensor::with_pattern(format, 1)),
        Box::new(MockSensor::with_pattern(format, 128)),
    ];

    let mut pipeline = DetectionPipeline::new(
        config,
        Box::new(MockMultiplexer::new()),
        sensors,
        Box::new(backend),
        Arc::new(MonotonicClock::new()),
    );

    let (event_tx, mut event_rx) = mpsc::channel::<PipelineEvent>(64);
    let consumer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "failed to serialize event"),
            }
        }
    });

    pipeline.initialize(&catalog, ModelType::Person).await?;
    pipeline.run(event_tx).await?;

    let status = serde_json::to_string(&pipeline.status())?;
    info!(%status, "pipeline finished");

    consumer.await?;
    Ok(())
}
