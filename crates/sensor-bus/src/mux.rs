//! Channel multiplexer control

use crate::{BusError, SensorId};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Settle delay after a channel switch before the sensor is addressed.
const SETTLE_DELAY_MS: u64 = 10;

/// Register-level access to the bus multiplexer.
///
/// `select_channel` is a fire-and-forget register write; the only
/// acknowledgment the hardware offers is the probe at init time.
pub trait BusMultiplexer: Send {
    /// Check that the multiplexer acknowledges on the bus.
    fn probe(&mut self) -> Result<(), BusError>;

    /// Route all subsequent bus traffic to `channel`.
    fn select_channel(&mut self, channel: u8) -> Result<(), BusError>;

    /// Probe for a device behind the currently selected channel.
    fn probe_device(&mut self) -> bool;
}

/// Routes bus traffic to one of the two sensors.
///
/// Owns the sensor-to-channel mapping and the settle delay. Switching
/// channels mid-capture would corrupt both reads, so callers must finish a
/// capture before selecting the other sensor; the single pipeline loop
/// serializes this by construction.
pub struct ChannelSelector {
    mux: Box<dyn BusMultiplexer>,
    channels: [u8; 2],
    settle: Duration,
    active: Option<SensorId>,
}

impl ChannelSelector {
    pub fn new(mux: Box<dyn BusMultiplexer>) -> Self {
        Self::with_channels(mux, [0, 1])
    }

    pub fn with_channels(mux: Box<dyn BusMultiplexer>, channels: [u8; 2]) -> Self {
        Self {
            mux,
            channels,
            settle: Duration::from_millis(SETTLE_DELAY_MS),
            active: None,
        }
    }

    /// Probe the multiplexer and report which channels answer.
    ///
    /// A silent multiplexer is fatal for the caller; it is not retried
    /// here. Missing sensors are only warned about at this stage, the
    /// drivers report their own init failures.
    pub fn initialize(&mut self) -> Result<(), BusError> {
        self.mux.probe()?;
        info!("bus multiplexer acknowledged");

        for sensor in SensorId::ALL {
            let channel = self.channels[sensor.index()];
            self.mux.select_channel(channel)?;
            if self.mux.probe_device() {
                debug!(sensor = sensor.id(), channel, "sensor detected");
            } else {
                warn!(sensor = sensor.id(), channel, "no device answering on channel");
            }
        }
        Ok(())
    }

    /// Switch the bus to `sensor` and wait out the settle delay.
    pub async fn select(&mut self, sensor: SensorId) -> Result<(), BusError> {
        self.mux.select_channel(self.channels[sensor.index()])?;
        self.active = Some(sensor);
        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    /// Sensor the bus currently routes to, if any switch happened yet.
    pub fn active(&self) -> Option<SensorId> {
        self.active
    }
}

/// In-memory multiplexer for tests and the demo binary.
pub struct MockMultiplexer {
    selections: Vec<u8>,
    fail_probe: bool,
    devices_present: bool,
}

impl MockMultiplexer {
    pub fn new() -> Self {
        Self {
            selections: Vec::new(),
            fail_probe: false,
            devices_present: true,
        }
    }

    /// A multiplexer that never acknowledges.
    pub fn unresponsive() -> Self {
        Self {
            fail_probe: true,
            ..Self::new()
        }
    }

    /// History of channel-select register writes.
    pub fn selections(&self) -> &[u8] {
        &self.selections
    }

    pub fn last_selected(&self) -> Option<u8> {
        self.selections.last().copied()
    }
}

impl Default for MockMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl BusMultiplexer for MockMultiplexer {
    fn probe(&mut self) -> Result<(), BusError> {
        if self.fail_probe {
            return Err(BusError::MultiplexerNotResponding);
        }
        Ok(())
    }

    fn select_channel(&mut self, channel: u8) -> Result<(), BusError> {
        self.selections.push(channel);
        Ok(())
    }

    fn probe_device(&mut self) -> bool {
        self.devices_present
    }
}
