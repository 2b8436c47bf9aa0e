//! Frame Preprocessing
//!
//! Resizes raw RGB565 sensor frames down to the model input geometry and
//! unpacks them to RGB888 in a single pass. The resampler writes into a
//! caller-owned buffer and never allocates.

use thiserror::Error;

/// Bytes per packed RGB565 pixel.
const SRC_BYTES_PER_PIXEL: usize = 2;

/// Bytes per unpacked RGB888 pixel.
const DST_BYTES_PER_PIXEL: usize = 3;

#[derive(Debug, Error)]
pub enum PrepError {
    #[error("source buffer is {actual} bytes, expected {expected}")]
    SrcBufferSize { expected: usize, actual: usize },

    #[error("destination buffer is {actual} bytes, expected {expected}")]
    DstBufferSize { expected: usize, actual: usize },
}

/// Nearest-neighbor resampler fused with RGB565 to RGB888 unpacking.
///
/// The unpack shifts each 5/6/5-bit channel back up to 8 bits. That is a
/// deterministic width correction of the packed layout, not a color-correct
/// transform. Quantized models consume the output bytes as-is; float models
/// remap through [`unit_remap`] afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
}

impl Preprocessor {
    pub fn new(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Self {
        Self {
            src_w,
            src_h,
            dst_w,
            dst_h,
        }
    }

    /// Byte length `src` must have.
    pub fn src_len(&self) -> usize {
        self.src_w as usize * self.src_h as usize * SRC_BYTES_PER_PIXEL
    }

    /// Byte length `dst` must have.
    pub fn dst_len(&self) -> usize {
        self.dst_w as usize * self.dst_h as usize * DST_BYTES_PER_PIXEL
    }

    /// Resample `src` into `dst`.
    ///
    /// Source coordinates are `floor(x * src_w / dst_w)` per axis, clamped
    /// to the source bounds. Output is byte-identical across runs for a
    /// fixed source frame.
    pub fn preprocess(&self, src: &[u8], dst: &mut [u8]) -> Result<(), PrepError> {
        if src.len() != self.src_len() {
            return Err(PrepError::SrcBufferSize {
                expected: self.src_len(),
                actual: src.len(),
            });
        }
        if dst.len() != self.dst_len() {
            return Err(PrepError::DstBufferSize {
                expected: self.dst_len(),
                actual: dst.len(),
            });
        }
        if src.is_empty() || dst.is_empty() {
            return Ok(());
        }

        let (src_w, src_h) = (self.src_w as usize, self.src_h as usize);
        let (dst_w, dst_h) = (self.dst_w as usize, self.dst_h as usize);

        for y in 0..dst_h {
            let src_y = (y * src_h / dst_h).min(src_h - 1);
            for x in 0..dst_w {
                let src_x = (x * src_w / dst_w).min(src_w - 1);

                let src_idx = (src_y * src_w + src_x) * SRC_BYTES_PER_PIXEL;
                let dst_idx = (y * dst_w + x) * DST_BYTES_PER_PIXEL;

                let pixel = u16::from_le_bytes([src[src_idx], src[src_idx + 1]]);
                dst[dst_idx] = (((pixel >> 11) & 0x1f) << 3) as u8;
                dst[dst_idx + 1] = (((pixel >> 5) & 0x3f) << 2) as u8;
                dst[dst_idx + 2] = ((pixel & 0x1f) << 3) as u8;
            }
        }

        Ok(())
    }
}

/// Linear remap of 8-bit channel values into `[0, 1]` floats.
///
/// Only float models need this step; quantized models bake the input
/// scaling into their weights.
pub fn unit_remap(src: &[u8], dst: &mut [f32]) -> Result<(), PrepError> {
    if dst.len() != src.len() {
        return Err(PrepError::DstBufferSize {
            expected: src.len(),
            actual: dst.len(),
        });
    }
    for (out, &byte) in dst.iter_mut().zip(src) {
        *out = byte as f32 / 255.0;
    }
    Ok(())
}
