//! Host-facing gesture events.
//!
//! The host's gesture recognizer classifies raw input and forwards
//! plain data here; the viewer never sees touch points. A pinch
//! animation or a programmatic zoom-to-target is just a sequence of
//! `ZoomStep`s whose factors multiply out to the desired scale,
//! followed by one `ZoomEnd`.

/// One already-classified input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerEvent {
    /// Pan by a delta in viewport pixels.
    Pan { dx: f32, dy: f32 },

    /// One incremental zoom step anchored at a viewport-space focal
    /// point. `factor` multiplies the current show rect.
    ZoomStep {
        focal_x: f32,
        focal_y: f32,
        factor: f32,
    },

    /// The zoom gesture ended; the viewer may commit a new sample size.
    ZoomEnd,

    /// The host viewport changed size.
    Resize { width: u32, height: u32 },
}
