//! Full-pipeline cycle tests over mock hardware and a scripted backend.

use alarm::AlarmTransition;
use detection::DetectionClass;
use inference_engine::{
    pack_blob, InferenceError, ModelCatalog, ModelType, OutputTensor, StubBackend,
    MODEL_SCHEMA_VERSION,
};
use pipeline::{DetectionPipeline, PipelineConfig, PipelineError, PipelineEvent};
use sensor_bus::{BusError, FrameFormat, MockMultiplexer, MockSensor, PixelFormat, SensorDriver, SensorId};
use std::sync::Arc;
use telemetry::ManualClock;
use tokio::sync::mpsc;

fn small_format() -> FrameFormat {
    FrameFormat::new(8, 6, PixelFormat::Rgb565)
}

fn test_config() -> PipelineConfig {
    PipelineConfig {
        capture: small_format(),
        cycle_interval_ms: 10,
        status_interval_cycles: 0,
        max_cycles: None,
        ..Default::default()
    }
}

fn person_catalog() -> ModelCatalog {
    let mut catalog = ModelCatalog::new();
    catalog.register(
        ModelType::Person,
        pack_blob(MODEL_SCHEMA_VERSION, 16 * 1024, b"person"),
    );
    catalog
}

fn default_sensors() -> [Box<dyn SensorDriver>; 2] {
    [
        Box::new(MockSensor::with_pattern(small_format(), 1)),
        Box::new(MockSensor::with_pattern(small_format(), 99)),
    ]
}

fn build_pipeline(
    backend: StubBackend,
    sensors: [Box<dyn SensorDriver>; 2],
    clock: Arc<ManualClock>,
) -> DetectionPipeline {
    DetectionPipeline::new(
        test_config(),
        Box::new(MockMultiplexer::new()),
        sensors,
        Box::new(backend),
        clock,
    )
}

fn drain(rx: &mut mpsc::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn high_person() -> OutputTensor {
    OutputTensor::Float(vec![0.85, 0.10, 0.05])
}

fn low_vehicle() -> OutputTensor {
    OutputTensor::Float(vec![0.10, 0.30, 0.20])
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_dual_sensor_cycle() {
    let clock = Arc::new(ManualClock::new());
    let backend = StubBackend::with_outputs(vec![high_person(), low_vehicle()]);
    let mut pipeline = build_pipeline(backend, default_sensors(), Arc::clone(&clock));
    let (tx, mut rx) = mpsc::channel(64);

    pipeline
        .initialize(&person_catalog(), ModelType::Person)
        .await
        .unwrap();
    pipeline.tick(&tx).await;

    // Sensor 0 detected a person and fired the alarm; sensor 1's reading
    // stayed below threshold and left no trace.
    assert_eq!(pipeline.history(SensorId::Primary).len(), 1);
    assert_eq!(pipeline.history(SensorId::Secondary).len(), 0);
    assert!(pipeline.alarm_active());

    let recorded = pipeline.history(SensorId::Primary).latest(0).unwrap();
    assert_eq!(recorded.class, Some(DetectionClass::Person));
    assert!(recorded.valid);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[0],
        PipelineEvent::Detection(r)
            if r.sensor == 0 && r.class == DetectionClass::Person && r.confidence_pct == 85
    ));
    assert!(matches!(
        &events[1],
        PipelineEvent::Alarm(a) if a.transition == AlarmTransition::Raised
    ));

    let metrics = pipeline.metrics();
    assert_eq!(metrics.total_captures(), 2);
    assert_eq!(metrics.failed_captures(), 0);
    assert_eq!(metrics.total_inferences(), 2);
    assert!(!pipeline.is_degraded());
}

#[tokio::test(start_paused = true)]
async fn test_alarm_clears_after_duration() {
    let clock = Arc::new(ManualClock::new());
    let backend = StubBackend::with_outputs(vec![
        high_person(),
        low_vehicle(),
        low_vehicle(),
        low_vehicle(),
    ]);
    let mut pipeline = build_pipeline(backend, default_sensors(), Arc::clone(&clock));
    let (tx, mut rx) = mpsc::channel(64);

    pipeline
        .initialize(&person_catalog(), ModelType::Person)
        .await
        .unwrap();

    pipeline.tick(&tx).await;
    assert!(pipeline.alarm_active());

    clock.advance_ms(5000);
    pipeline.tick(&tx).await;
    assert!(!pipeline.alarm_active());

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::Alarm(a) if a.transition == AlarmTransition::Cleared && a.timestamp_ms == 5000
    )));
}

#[tokio::test(start_paused = true)]
async fn test_retrigger_extends_alarm_window() {
    let clock = Arc::new(ManualClock::new());
    let backend = StubBackend::with_outputs(vec![
        high_person(),
        low_vehicle(),
        high_person(),
        low_vehicle(),
        low_vehicle(),
        low_vehicle(),
        low_vehicle(),
        low_vehicle(),
    ]);
    let mut pipeline = build_pipeline(backend, default_sensors(), Arc::clone(&clock));
    let (tx, mut rx) = mpsc::channel(64);

    pipeline
        .initialize(&person_catalog(), ModelType::Person)
        .await
        .unwrap();

    pipeline.tick(&tx).await; // raised at t=0

    clock.advance_ms(3000);
    pipeline.tick(&tx).await; // re-trigger at t=3000 extends the window

    clock.advance_ms(2000);
    pipeline.tick(&tx).await; // t=5000, original window end: still active
    assert!(pipeline.alarm_active());

    clock.advance_ms(3000);
    pipeline.tick(&tx).await; // t=8000: extended window elapsed
    assert!(!pipeline.alarm_active());

    let transitions: Vec<AlarmTransition> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::Alarm(a) => Some(a.transition),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            AlarmTransition::Raised,
            AlarmTransition::Extended,
            AlarmTransition::Cleared
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_weak_detections_raises_alarm() {
    let clock = Arc::new(ManualClock::new());
    // Valid detections each cycle on sensor 0, all below the alarm's
    // confidence threshold.
    let backend = StubBackend::with_outputs(vec![
        OutputTensor::Float(vec![0.55, 0.10, 0.10]),
        low_vehicle(),
    ]);
    let mut pipeline = build_pipeline(backend, default_sensors(), Arc::clone(&clock));
    let (tx, _rx) = mpsc::channel(64);

    pipeline
        .initialize(&person_catalog(), ModelType::Person)
        .await
        .unwrap();

    pipeline.tick(&tx).await;
    pipeline.tick(&tx).await;
    assert!(!pipeline.alarm_active());

    pipeline.tick(&tx).await;
    assert!(pipeline.alarm_active());
    assert_eq!(pipeline.history(SensorId::Primary).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_capture_failure_is_counted_and_cycle_skipped() {
    let clock = Arc::new(ManualClock::new());
    let backend = StubBackend::with_outputs(vec![low_vehicle()]);
    let sensors: [Box<dyn SensorDriver>; 2] = [
        Box::new(MockSensor::new(small_format()).fail_next_captures(1)),
        Box::new(MockSensor::new(small_format())),
    ];
    let mut pipeline = build_pipeline(backend, sensors, Arc::clone(&clock));
    let (tx, _rx) = mpsc::channel(64);

    pipeline
        .initialize(&person_catalog(), ModelType::Person)
        .await
        .unwrap();

    pipeline.tick(&tx).await;
    assert_eq!(pipeline.metrics().total_captures(), 2);
    assert_eq!(pipeline.metrics().failed_captures(), 1);
    assert_eq!(pipeline.metrics().total_inferences(), 1);

    pipeline.tick(&tx).await;
    assert_eq!(pipeline.metrics().total_captures(), 4);
    assert_eq!(pipeline.metrics().failed_captures(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_model_switch_degrades_without_crashing() {
    let clock = Arc::new(ManualClock::new());
    let backend = StubBackend::with_outputs(vec![high_person()]);
    let mut pipeline = build_pipeline(backend, default_sensors(), Arc::clone(&clock));
    let (tx, mut rx) = mpsc::channel(64);
    let catalog = person_catalog();

    pipeline.initialize(&catalog, ModelType::Person).await.unwrap();

    let err = pipeline.switch_model(&catalog, ModelType::Vehicle).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Inference(InferenceError::ModelUnavailable(ModelType::Vehicle))
    ));
    assert!(pipeline.is_degraded());

    // Cycles keep running: captures are still attempted, inference is
    // skipped, nothing is recorded.
    pipeline.tick(&tx).await;
    assert_eq!(pipeline.metrics().total_captures(), 2);
    assert_eq!(pipeline.metrics().total_inferences(), 0);
    assert_eq!(pipeline.history(SensorId::Primary).len(), 0);
    assert!(drain(&mut rx).is_empty());

    // A later successful switch restores the pipeline.
    pipeline.switch_model(&catalog, ModelType::Person).unwrap();
    assert!(!pipeline.is_degraded());
    pipeline.tick(&tx).await;
    assert_eq!(pipeline.history(SensorId::Primary).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_schema_mismatch_is_fatal_at_init() {
    let clock = Arc::new(ManualClock::new());
    let mut catalog = ModelCatalog::new();
    catalog.register(
        ModelType::Person,
        pack_blob(MODEL_SCHEMA_VERSION + 1, 16 * 1024, b"stale"),
    );
    let mut pipeline = build_pipeline(StubBackend::new(), default_sensors(), clock);

    let err = pipeline.initialize(&catalog, ModelType::Person).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Inference(InferenceError::SchemaMismatch { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unresponsive_multiplexer_is_fatal() {
    let clock = Arc::new(ManualClock::new());
    let mut pipeline = DetectionPipeline::new(
        test_config(),
        Box::new(MockMultiplexer::unresponsive()),
        default_sensors(),
        Box::new(StubBackend::new()),
        clock,
    );

    let err = pipeline
        .initialize(&person_catalog(), ModelType::Person)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Bus(BusError::MultiplexerNotResponding)));
}

#[tokio::test(start_paused = true)]
async fn test_all_sensors_broken_is_fatal() {
    let clock = Arc::new(ManualClock::new());
    let sensors: [Box<dyn SensorDriver>; 2] = [
        Box::new(MockSensor::new(small_format()).broken()),
        Box::new(MockSensor::new(small_format()).broken()),
    ];
    let mut pipeline = build_pipeline(StubBackend::new(), sensors, clock);

    let err = pipeline
        .initialize(&person_catalog(), ModelType::Person)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoSensors));
}

#[tokio::test(start_paused = true)]
async fn test_single_broken_sensor_is_tolerated() {
    let clock = Arc::new(ManualClock::new());
    let backend = StubBackend::with_outputs(vec![high_person()]);
    let sensors: [Box<dyn SensorDriver>; 2] = [
        Box::new(MockSensor::new(small_format()).broken()),
        Box::new(MockSensor::new(small_format())),
    ];
    let mut pipeline = build_pipeline(backend, sensors, clock);
    let (tx, _rx) = mpsc::channel(64);

    pipeline
        .initialize(&person_catalog(), ModelType::Person)
        .await
        .unwrap();

    pipeline.tick(&tx).await;
    // Only the healthy sensor ran a cycle.
    assert_eq!(pipeline.metrics().total_captures(), 1);
    assert_eq!(pipeline.history(SensorId::Primary).len(), 0);
    assert_eq!(pipeline.history(SensorId::Secondary).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reset_statistics_clears_everything() {
    let clock = Arc::new(ManualClock::new());
    let backend = StubBackend::with_outputs(vec![high_person(), low_vehicle()]);
    let mut pipeline = build_pipeline(backend, default_sensors(), clock);
    let (tx, _rx) = mpsc::channel(64);

    pipeline
        .initialize(&person_catalog(), ModelType::Person)
        .await
        .unwrap();
    pipeline.tick(&tx).await;
    assert_eq!(pipeline.status().total_detections, 1);

    pipeline.reset_statistics();

    let status = pipeline.status();
    assert_eq!(status.total_detections, 0);
    assert_eq!(status.average_confidence, 0.0);
    assert_eq!(status.history_len, [0, 0]);
    assert_eq!(status.metrics.total_captures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_honors_cycle_budget() {
    let clock = Arc::new(ManualClock::new());
    let backend = StubBackend::with_outputs(vec![low_vehicle()]);
    let mut config = test_config();
    config.max_cycles = Some(3);

    let mut pipeline = DetectionPipeline::new(
        config,
        Box::new(MockMultiplexer::new()),
        default_sensors(),
        Box::new(backend),
        clock,
    );
    let (tx, _rx) = mpsc::channel(64);

    pipeline
        .initialize(&person_catalog(), ModelType::Person)
        .await
        .unwrap();
    pipeline.run(tx).await.unwrap();

    assert_eq!(pipeline.cycles(), 3);
    assert!(!pipeline.is_running());
    assert_eq!(pipeline.metrics().total_captures(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_run_refuses_uninitialized_pipeline() {
    let clock = Arc::new(ManualClock::new());
    let mut pipeline = build_pipeline(StubBackend::new(), default_sensors(), clock);
    let (tx, _rx) = mpsc::channel(8);

    assert!(matches!(
        pipeline.run(tx).await.unwrap_err(),
        PipelineError::NotInitialized
    ));
}

#[tokio::test(start_paused = true)]
async fn test_status_reports_per_class_counts() {
    let clock = Arc::new(ManualClock::new());
    let backend = StubBackend::with_outputs(vec![
        high_person(),
        OutputTensor::Float(vec![0.1, 0.9, 0.0]),
    ]);
    let mut pipeline = build_pipeline(backend, default_sensors(), clock);
    let (tx, _rx) = mpsc::channel(64);

    pipeline
        .initialize(&person_catalog(), ModelType::Person)
        .await
        .unwrap();
    pipeline.tick(&tx).await;

    let status = pipeline.status();
    assert_eq!(status.total_detections, 2);
    let person = status
        .detections_per_class
        .iter()
        .find(|c| c.class == DetectionClass::Person)
        .unwrap();
    let vehicle = status
        .detections_per_class
        .iter()
        .find(|c| c.class == DetectionClass::Vehicle)
        .unwrap();
    assert_eq!(person.count, 1);
    assert_eq!(vehicle.count, 1);
    assert!((status.average_confidence - 0.875).abs() < 1e-3);
}
