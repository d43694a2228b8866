//! Tiled region-image viewer engine.
//!
//! Renders raster images far larger than the viewport (or any texture
//! limit) by splitting the source into viewport-sized tiles, keeping a
//! low-res bitmap per tile always resident and upgrading visible tiles
//! to the current power-of-two sample size on a single background
//! decode worker. The UI thread never blocks on decoding: draws fall
//! back to low-res until an upgrade lands and a redraw is requested.
//!
//! The engine consumes already-classified gestures and an opaque
//! region-decode service; widget lifecycle, gesture recognition,
//! codecs and animation curves are the host's business.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tileview_core::{RegionViewer, ViewerEvent, ViewerHost};
//! use tileview_render::{MemorySource, RecordingCanvas};
//!
//! struct Host;
//! impl ViewerHost for Host {
//!     fn request_redraw(&self) { /* invalidate the widget */ }
//! }
//!
//! let mut viewer = RegionViewer::new(Arc::new(Host));
//! viewer.on_viewport_resized(1000, 1000);
//! viewer.set_image(Arc::new(MemorySource::solid(4000, 8000, [40, 40, 40, 255])));
//!
//! // ... once the low-res grid is primed the host's redraws start
//! // succeeding:
//! let mut canvas = RecordingCanvas::new();
//! let _drew = viewer.draw(&mut canvas);
//!
//! viewer.handle_event(ViewerEvent::ZoomStep {
//!     focal_x: 500.0,
//!     focal_y: 500.0,
//!     factor: 2.0,
//! });
//! viewer.handle_event(ViewerEvent::ZoomEnd);
//!
//! viewer.destroy();
//! ```

mod event;
mod viewer;

pub use event::ViewerEvent;
pub use viewer::{RegionViewer, ViewerConfig, ViewerHost};

// The interface types hosts need are re-exported so most integrations
// depend on this crate alone.
pub use tileview_render::{
    Blit, Canvas, DecodeError, MemorySource, PixelBuffer, PixelFormat, RecordingCanvas,
    RegionSource, SourceRect, TileSnapshot,
};
pub use tileview_scheduler::QueueStats;
pub use viewer_core::{EdgeFlags, RectF, ScaleOutcome};
