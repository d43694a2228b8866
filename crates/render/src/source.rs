//! The region-decode service boundary.
//!
//! The engine never touches a codec directly: anything that can decode
//! an arbitrary axis-aligned sub-rectangle of the source at an integer
//! downsample factor can back the viewer. Implementations are expected
//! to be open and ready before they are attached.

use crate::pixels::{rgba_to_rgb565, PixelBuffer, PixelFormat};
use thiserror::Error;

/// Axis-aligned rectangle in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SourceRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Why a region decode failed.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(
        "region {x},{y} {width}x{height} outside image bounds {image_width}x{image_height}"
    )]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("invalid sample size {0}: expected a power of two >= 1")]
    InvalidSampleSize(u32),

    #[error("pixel data length {actual} does not match {width}x{height}")]
    BadBufferLength {
        width: u32,
        height: u32,
        actual: usize,
    },

    #[error("codec failure: {0}")]
    Codec(String),
}

/// A service that decodes sub-rectangles of one source image.
///
/// `decode_region` must not require the whole image in memory; the
/// returned buffer's dimensions are the region's divided by the sample
/// size (rounded up).
pub trait RegionSource: Send + Sync {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn decode_region(
        &self,
        region: SourceRect,
        sample_size: u32,
    ) -> Result<PixelBuffer, DecodeError>;
}

/// Region source backed by a fully decoded RGBA image in memory.
///
/// Covers the direct-bitmap attach path: hosts that already hold the
/// pixels (or tests) get cropping and stride subsampling without a
/// codec. Large sources should come through a real region decoder
/// instead; this one holds everything resident.
#[derive(Debug)]
pub struct MemorySource {
    width: u32,
    height: u32,
    format: PixelFormat,
    rgba: Vec<u8>,
}

impl MemorySource {
    /// Wrap an RGBA buffer of `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, DecodeError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(DecodeError::BadBufferLength {
                width,
                height,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format: PixelFormat::Rgba8888,
            rgba,
        })
    }

    /// Change the output format of decoded buffers.
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Uniform test/placeholder image of one RGBA color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..width as usize * height as usize {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            format: PixelFormat::Rgba8888,
            rgba: data,
        }
    }
}

impl RegionSource for MemorySource {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn decode_region(
        &self,
        region: SourceRect,
        sample_size: u32,
    ) -> Result<PixelBuffer, DecodeError> {
        if sample_size == 0 || !sample_size.is_power_of_two() {
            return Err(DecodeError::InvalidSampleSize(sample_size));
        }
        if region.is_empty() || region.right() > self.width || region.bottom() > self.height {
            return Err(DecodeError::RegionOutOfBounds {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                image_width: self.width,
                image_height: self.height,
            });
        }

        let step = sample_size as usize;
        let out_width = region.width.div_ceil(sample_size);
        let out_height = region.height.div_ceil(sample_size);

        let mut rgba = Vec::with_capacity(out_width as usize * out_height as usize * 4);
        for y in (0..region.height as usize).step_by(step) {
            let row_start =
                ((region.y as usize + y) * self.width as usize + region.x as usize) * 4;
            for x in (0..region.width as usize).step_by(step) {
                let px = row_start + x * 4;
                rgba.extend_from_slice(&self.rgba[px..px + 4]);
            }
        }

        let (format, data) = match self.format {
            PixelFormat::Rgba8888 => (PixelFormat::Rgba8888, rgba),
            PixelFormat::Rgb565 => (PixelFormat::Rgb565, rgba_to_rgb565(&rgba)),
        };

        Ok(PixelBuffer {
            width: out_width,
            height: out_height,
            format,
            data,
        })
    }
}
