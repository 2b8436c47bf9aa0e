//! Pipeline configuration

use alarm::AlarmConfig;
use sensor_bus::FrameFormat;
use serde::{Deserialize, Serialize};

/// Tunables for the orchestrated loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Raw capture geometry shared by both sensors.
    pub capture: FrameFormat,
    /// Delay between loop iterations, in milliseconds.
    pub cycle_interval_ms: u64,
    /// Cycles between periodic status log lines; 0 disables them.
    pub status_interval_cycles: u64,
    /// Stop after this many cycles; `None` runs until stopped.
    pub max_cycles: Option<u64>,
    /// Detections retained per sensor.
    pub history_capacity: usize,
    pub alarm: AlarmConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture: FrameFormat::qvga_rgb565(),
            cycle_interval_ms: 1000,
            status_interval_cycles: 10,
            max_cycles: None,
            history_capacity: detection_history::DEFAULT_CAPACITY,
            alarm: AlarmConfig::default(),
        }
    }
}
