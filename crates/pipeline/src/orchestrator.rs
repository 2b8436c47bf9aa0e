//! The detection pipeline orchestrator

use crate::status::{ClassCount, DetectionStats, StatusReport};
use crate::{AlarmEvent, DetectionRecord, PipelineConfig, PipelineError, PipelineEvent};
use alarm::AlarmController;
use detection::{DetectionClass, PostProcessor};
use detection_history::DetectionHistory;
use frame_prep::Preprocessor;
use inference_engine::{InferenceBackend, InferenceEngine, ModelCatalog, ModelType};
use sensor_bus::{BusMultiplexer, ChannelSelector, SensorDriver, SensorId};
use std::sync::Arc;
use std::time::Duration;
use telemetry::{Clock, PerformanceMetrics};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Owns every mutable piece of the dual-sensor pipeline.
///
/// All frame and staging buffers are sized once during construction and
/// initialization; the loop itself never grows the heap. Everything is
/// touched from the single loop task, so channel selection and the capture
/// that follows it are serialized by construction.
pub struct DetectionPipeline {
    config: PipelineConfig,
    selector: ChannelSelector,
    sensors: [Box<dyn SensorDriver>; 2],
    sensor_ready: [bool; 2],
    engine: InferenceEngine,
    post: PostProcessor,
    preprocessor: Preprocessor,
    /// One raw RGB565 frame per sensor.
    frame_buffers: [Vec<u8>; 2],
    /// Model input staging, sized to the active model's tensor.
    staging: Vec<u8>,
    histories: [DetectionHistory; 2],
    alarm: AlarmController,
    metrics: PerformanceMetrics,
    stats: DetectionStats,
    clock: Arc<dyn Clock + Sync>,
    cycles: u64,
    running: bool,
    initialized: bool,
}

impl DetectionPipeline {
    pub fn new(
        config: PipelineConfig,
        mux: Box<dyn BusMultiplexer>,
        sensors: [Box<dyn SensorDriver>; 2],
        backend: Box<dyn InferenceBackend>,
        clock: Arc<dyn Clock + Sync>,
    ) -> Self {
        let frame_len = config.capture.buffer_len();
        let history_capacity = config.history_capacity;
        let alarm = AlarmController::new(config.alarm.clone());

        Self {
            preprocessor: Preprocessor::new(config.capture.width, config.capture.height, 0, 0),
            config,
            selector: ChannelSelector::new(mux),
            sensors,
            sensor_ready: [false; 2],
            engine: InferenceEngine::new(backend),
            post: PostProcessor::new(),
            frame_buffers: [vec![0u8; frame_len], vec![0u8; frame_len]],
            staging: Vec::new(),
            histories: [
                DetectionHistory::with_capacity(history_capacity),
                DetectionHistory::with_capacity(history_capacity),
            ],
            alarm,
            metrics: PerformanceMetrics::new(),
            stats: DetectionStats::default(),
            clock,
            cycles: 0,
            running: false,
            initialized: false,
        }
    }

    /// Bring up the multiplexer, the sensors, and the initial model.
    ///
    /// Any of the three failing outright is fatal; a half-initialized
    /// pipeline never runs. A single dead sensor is tolerated and skipped
    /// each cycle, both dead is fatal.
    pub async fn initialize(
        &mut self,
        catalog: &ModelCatalog,
        initial_model: ModelType,
    ) -> Result<(), PipelineError> {
        info!("initializing detection pipeline");

        self.selector.initialize()?;

        let mut ready = 0;
        for sensor in SensorId::ALL {
            let index = sensor.index();
            if let Err(e) = self.selector.select(sensor).await {
                warn!(sensor = sensor.id(), error = %e, "channel select failed during init");
                continue;
            }
            match self.sensors[index].initialize() {
                Ok(()) => {
                    self.sensor_ready[index] = true;
                    ready += 1;
                    info!(sensor = sensor.id(), "sensor initialized");
                }
                Err(e) => {
                    warn!(sensor = sensor.id(), error = %e, "sensor initialization failed");
                }
            }
        }
        if ready == 0 {
            return Err(PipelineError::NoSensors);
        }

        catalog.switch_model(&mut self.engine, initial_model)?;
        self.rebind_model_buffers();

        self.initialized = true;
        info!(sensors = ready, "pipeline ready");
        Ok(())
    }

    /// Swap the active model at runtime.
    ///
    /// On failure the engine holds no model and the pipeline reports a
    /// degraded status until a later successful switch; it does not stop.
    pub fn switch_model(
        &mut self,
        catalog: &ModelCatalog,
        model_type: ModelType,
    ) -> Result<(), PipelineError> {
        catalog.switch_model(&mut self.engine, model_type)?;
        self.rebind_model_buffers();
        Ok(())
    }

    fn rebind_model_buffers(&mut self) {
        if let Some(meta) = self.engine.metadata() {
            let (dst_w, dst_h) = (meta.input_width, meta.input_height);
            self.staging = vec![0u8; meta.input_len()];
            self.preprocessor = Preprocessor::new(
                self.config.capture.width,
                self.config.capture.height,
                dst_w,
                dst_h,
            );
        }
    }

    /// One loop iteration: poll the alarm timeout, then run a full
    /// capture-to-alarm cycle for each ready sensor.
    pub async fn tick(&mut self, events: &mpsc::Sender<PipelineEvent>) {
        let now_ms = self.clock.now_ms();
        if let Some(transition) = self.alarm.poll(now_ms) {
            Self::emit(
                events,
                PipelineEvent::Alarm(AlarmEvent {
                    transition,
                    timestamp_ms: now_ms,
                }),
            );
        }

        for sensor in SensorId::ALL {
            if self.sensor_ready[sensor.index()] {
                self.run_sensor_cycle(sensor, events).await;
            }
        }

        self.cycles += 1;
        if self.config.status_interval_cycles > 0
            && self.cycles % self.config.status_interval_cycles == 0
        {
            self.log_status();
        }
    }

    /// Poll-driven loop: one [`tick`](Self::tick) then a fixed sleep.
    ///
    /// Captures and invokes are synchronous and bounded by the hardware,
    /// not by timeouts; a stuck driver stalls the whole loop.
    pub async fn run(
        &mut self,
        events: mpsc::Sender<PipelineEvent>,
    ) -> Result<(), PipelineError> {
        if !self.initialized {
            return Err(PipelineError::NotInitialized);
        }

        self.running = true;
        info!(interval_ms = self.config.cycle_interval_ms, "pipeline loop started");

        while self.running {
            self.tick(&events).await;

            if let Some(max) = self.config.max_cycles {
                if self.cycles >= max {
                    info!(cycles = self.cycles, "cycle budget reached");
                    break;
                }
            }

            tokio::time::sleep(Duration::from_millis(self.config.cycle_interval_ms)).await;
        }

        self.running = false;
        info!("pipeline loop stopped");
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    async fn run_sensor_cycle(&mut self, sensor: SensorId, events: &mpsc::Sender<PipelineEvent>) {
        let index = sensor.index();

        if let Err(e) = self.selector.select(sensor).await {
            warn!(sensor = sensor.id(), error = %e, "channel select failed");
            self.metrics.record_capture(false);
            return;
        }

        let captured = self.sensors[index].capture(&mut self.frame_buffers[index]);
        self.metrics.record_capture(captured.is_ok());
        if let Err(e) = captured {
            warn!(sensor = sensor.id(), error = %e, "capture failed");
            return;
        }

        let Some(meta) = self.engine.metadata().cloned() else {
            debug!(sensor = sensor.id(), "no model loaded, skipping inference");
            return;
        };
        if meta.input_len() != self.staging.len() {
            warn!(
                sensor = sensor.id(),
                "model geometry does not match staging buffer, skipping inference"
            );
            return;
        }

        let pre_started = self.clock.now_us();
        if let Err(e) = self
            .preprocessor
            .preprocess(&self.frame_buffers[index], &mut self.staging)
        {
            warn!(sensor = sensor.id(), error = %e, "preprocessing failed");
            return;
        }
        self.metrics
            .record_preprocess(self.clock.now_us().saturating_sub(pre_started));

        let invoked = match self.engine.invoke(&self.staging) {
            Ok(result) => result,
            Err(e) => {
                warn!(sensor = sensor.id(), error = %e, "inference failed");
                return;
            }
        };
        self.metrics.record_inference(invoked.latency_us);

        let timestamp_ms = self.clock.now_ms();
        let post_started = self.clock.now_us();
        let detections = self
            .post
            .extract(&invoked.output, &meta, sensor, timestamp_ms);
        self.metrics
            .record_postprocess(self.clock.now_us().saturating_sub(post_started));

        for det in detections.into_iter().filter(|d| d.valid) {
            let Some(class) = det.class else { continue };

            self.histories[index].push(det);
            self.stats.record(class, det.confidence);
            debug!(
                sensor = sensor.id(),
                class = class.label(),
                confidence = det.confidence,
                "detection"
            );

            if let Some(record) = DetectionRecord::from_detection(&det) {
                Self::emit(events, PipelineEvent::Detection(record));
            }
            if let Some(transition) =
                self.alarm.evaluate(&det, &self.histories[index], timestamp_ms)
            {
                Self::emit(
                    events,
                    PipelineEvent::Alarm(AlarmEvent {
                        transition,
                        timestamp_ms,
                    }),
                );
            }
        }
    }

    fn emit(events: &mpsc::Sender<PipelineEvent>, event: PipelineEvent) {
        if let Err(e) = events.try_send(event) {
            debug!(error = %e, "event channel unavailable, dropping event");
        }
    }

    /// True while inference cannot run.
    pub fn is_degraded(&self) -> bool {
        match self.engine.metadata() {
            Some(meta) => meta.input_len() != self.staging.len(),
            None => true,
        }
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            cycles: self.cycles,
            total_detections: self.stats.total(),
            detections_per_class: DetectionClass::ALL
                .iter()
                .map(|&class| ClassCount {
                    class,
                    count: self.stats.count_for(class),
                })
                .collect(),
            average_confidence: self.stats.average_confidence(),
            history_len: [self.histories[0].len(), self.histories[1].len()],
            history_fill: [self.histories[0].fill_ratio(), self.histories[1].fill_ratio()],
            alarm_active: self.alarm.is_active(),
            degraded: self.is_degraded(),
            metrics: self.metrics.summary(),
        }
    }

    /// Zero the detection statistics, clear both histories, and reset the
    /// performance counters.
    pub fn reset_statistics(&mut self) {
        self.stats.reset();
        for history in &mut self.histories {
            history.clear();
        }
        self.metrics.reset();
        info!("statistics reset");
    }

    pub fn history(&self, sensor: SensorId) -> &DetectionHistory {
        &self.histories[sensor.index()]
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn alarm_active(&self) -> bool {
        self.alarm.is_active()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn log_status(&self) {
        let status = self.status();
        info!(
            cycles = status.cycles,
            detections = status.total_detections,
            average_confidence = status.average_confidence,
            capture_success_rate = status.metrics.capture_success_rate,
            average_inference_us = status.metrics.average_inference_us,
            alarm_active = status.alarm_active,
            degraded = status.degraded,
            "pipeline status"
        );
    }
}
