//! Raw frame geometry

use serde::{Deserialize, Serialize};

/// Pixel encodings at the sensor boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 16-bit packed color, 5/6/5 bits per channel.
    Rgb565,
    /// 8 bits per channel, 3 channels.
    Rgb888,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb565 => 2,
            PixelFormat::Rgb888 => 3,
        }
    }
}

/// Capture geometry for one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameFormat {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl FrameFormat {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    /// Default capture geometry: QVGA RGB565.
    pub fn qvga_rgb565() -> Self {
        Self::new(320, 240, PixelFormat::Rgb565)
    }

    /// Exact byte length of one raw frame.
    pub fn buffer_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self::qvga_rgb565()
    }
}
