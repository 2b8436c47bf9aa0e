//! Shared-Bus Sensor Access
//!
//! Two image sensors share one bus behind a channel multiplexer. This crate
//! owns the channel-select logic (register write + settle delay), the sensor
//! driver boundary, and the raw frame geometry.

mod format;
mod mux;
mod sensor;

pub use format::{FrameFormat, PixelFormat};
pub use mux::{BusMultiplexer, ChannelSelector, MockMultiplexer};
pub use sensor::{MockSensor, SensorDriver};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors at the bus multiplexer boundary.
#[derive(Debug, Error)]
pub enum BusError {
    /// The multiplexer did not acknowledge on the bus. Fatal at startup;
    /// never retried here.
    #[error("bus multiplexer not responding")]
    MultiplexerNotResponding,

    /// The channel-select register write failed.
    #[error("channel select failed: {0}")]
    SelectFailed(String),
}

/// Errors at the sensor driver boundary.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor initialization failed: {0}")]
    InitFailed(String),

    #[error("frame capture failed: {0}")]
    CaptureFailed(String),

    /// The caller-provided buffer does not match the capture geometry.
    #[error("capture buffer is {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

/// Identifies one of the two sensors on the shared bus.
///
/// The closed set makes an out-of-range sensor id unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorId {
    Primary,
    Secondary,
}

impl SensorId {
    /// Cycle order the orchestrator walks each iteration.
    pub const ALL: [SensorId; 2] = [SensorId::Primary, SensorId::Secondary];

    /// Numeric id (0 or 1) used in outward-facing records.
    pub fn id(self) -> u8 {
        match self {
            SensorId::Primary => 0,
            SensorId::Secondary => 1,
        }
    }

    pub fn index(self) -> usize {
        self.id() as usize
    }
}
