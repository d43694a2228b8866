//! Viewing-state math for the tiled region-image viewer.
//!
//! Pure data structures and transforms: float rectangle geometry, the
//! coordinate model tying source image, show rect, viewport and offset
//! together, the power-of-two sample-size selector, and the pan/zoom
//! operations with their clamping and re-centering rules. No threads,
//! no I/O; everything here is synchronous and deterministic.

mod geometry;
mod sample;
mod view_state;

pub use geometry::RectF;
pub use sample::sample_size_for;
pub use view_state::{
    EdgeFlags, GeometryError, ScaleOutcome, ViewState, DEFAULT_MAX_SCALE,
};
