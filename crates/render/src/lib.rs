//! Pixel plumbing for the tiled region-image viewer.
//!
//! This crate holds everything between the decode service and the host
//! surface: pixel buffers and formats, the [`RegionSource`] boundary an
//! actual codec plugs into (with [`MemorySource`] as the in-memory
//! implementation), the [`Canvas`] blit boundary, and the [`TileGrid`]
//! cache that decides which bitmap each cell can offer right now.

mod canvas;
mod grid;
mod pixels;
mod source;

pub use canvas::{Blit, Canvas, RecordingCanvas};
pub use grid::{GridRange, TileGrid, TileSnapshot};
pub use pixels::{rgba_to_rgb565, PixelBuffer, PixelFormat};
pub use source::{DecodeError, MemorySource, RegionSource, SourceRect};
