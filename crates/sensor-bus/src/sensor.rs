//! Sensor driver boundary

use crate::{FrameFormat, SensorError};

/// Driver for a single image sensor behind the multiplexer.
///
/// `capture` fills the caller-owned buffer completely or fails; after a
/// failure the buffer contents are undefined and must be discarded. Capture
/// is synchronous and bounded only by the hardware, not by a timeout.
pub trait SensorDriver: Send {
    fn initialize(&mut self) -> Result<(), SensorError>;

    fn capture(&mut self, buffer: &mut [u8]) -> Result<(), SensorError>;

    /// Geometry of the frames this driver produces.
    fn format(&self) -> FrameFormat;
}

/// Deterministic in-memory sensor for tests and the demo binary.
pub struct MockSensor {
    format: FrameFormat,
    seed: u8,
    fail_captures: u32,
    fail_init: bool,
    captures: u64,
}

impl MockSensor {
    pub fn new(format: FrameFormat) -> Self {
        Self::with_pattern(format, 0)
    }

    /// Frames are filled with a byte ramp starting at `seed`, so two mock
    /// sensors with different seeds produce distinguishable frames.
    pub fn with_pattern(format: FrameFormat, seed: u8) -> Self {
        Self {
            format,
            seed,
            fail_captures: 0,
            fail_init: false,
            captures: 0,
        }
    }

    /// Make the next `n` captures fail.
    pub fn fail_next_captures(mut self, n: u32) -> Self {
        self.fail_captures = n;
        self
    }

    /// Make initialization fail.
    pub fn broken(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn captures(&self) -> u64 {
        self.captures
    }
}

impl SensorDriver for MockSensor {
    fn initialize(&mut self) -> Result<(), SensorError> {
        if self.fail_init {
            return Err(SensorError::InitFailed("mock sensor marked broken".into()));
        }
        Ok(())
    }

    fn capture(&mut self, buffer: &mut [u8]) -> Result<(), SensorError> {
        let expected = self.format.buffer_len();
        if buffer.len() != expected {
            return Err(SensorError::BufferSize {
                expected,
                actual: buffer.len(),
            });
        }
        if self.fail_captures > 0 {
            self.fail_captures -= 1;
            return Err(SensorError::CaptureFailed("injected capture fault".into()));
        }
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = self.seed.wrapping_add(i as u8);
        }
        self.captures += 1;
        Ok(())
    }

    fn format(&self) -> FrameFormat {
        self.format
    }
}
