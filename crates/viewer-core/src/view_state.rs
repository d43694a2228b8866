//! The viewing state: one source of truth for every ratio.
//!
//! `ViewState` owns the four rectangles that define what is on screen
//! (source image size, show rect, viewport, viewport offset) and all
//! operations that mutate them. Other components query it instead of
//! re-deriving ratios themselves.
//!
//! Coordinate spaces:
//! - *source*: pixels of the original image
//! - *show*: the zoomed logical size of the whole image, origin (0,0)
//! - *view*: viewport pixels; show and view differ by the offset only

use crate::geometry::RectF;
use crate::sample::sample_size_for;
use bitflags::bitflags;
use thiserror::Error;

/// Default absolute zoom ceiling relative to source size.
pub const DEFAULT_MAX_SCALE: f32 = 4.0;

/// Sizes for which no meaningful viewing state can be built.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("degenerate image dimensions: {width}x{height}")]
    DegenerateImage { width: u32, height: u32 },

    #[error("degenerate viewport dimensions: {width}x{height}")]
    DegenerateViewport { width: u32, height: u32 },
}

bitflags! {
    /// Which image edges are flush with the viewport after a pan.
    ///
    /// Hosts use this to decide when to hand a horizontal swipe back
    /// to a parent container (e.g. a pager).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EdgeFlags: u8 {
        const LEFT = 0x01;
        const RIGHT = 0x02;
        const TOP = 0x04;
        const BOTTOM = 0x08;
    }
}

/// Result of an incremental scale step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleOutcome {
    /// The show rect was scaled and re-clamped.
    Applied,
    /// The step would have shrunk below the thumbnail size; the state
    /// snapped back to the thumbnail rect instead.
    SnappedToFloor,
    /// The step would have exceeded the absolute scale bounds; nothing
    /// changed.
    Rejected,
}

/// Current viewing state of one source image inside one viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    image_width: u32,
    image_height: u32,
    /// Viewport rect, origin (0,0), in view pixels.
    viewport: RectF,
    /// Whole-image rect at the current zoom, origin (0,0), show space.
    show_rect: RectF,
    /// The viewport's rect expressed in show space; pan moves this.
    view_offset: RectF,
    /// Show rect computed at initialization; the floor for zoom-out.
    thumb_show_rect: RectF,
    sample_size: u32,
    thumb_sample_size: u32,
    min_scale: f32,
    max_scale: f32,
}

impl ViewState {
    /// Build the initial state for an image inside a viewport.
    ///
    /// The image is scaled down (never up) by
    /// `min(imageW/viewW, imageH/viewH)` clamped to >= 1, so its less
    /// constrained axis exactly fills the viewport while the other may
    /// overflow and pan. The result is centered, and recorded as the
    /// thumbnail rect that zoom-out can never shrink past.
    pub fn new(
        image_width: u32,
        image_height: u32,
        viewport_width: u32,
        viewport_height: u32,
    ) -> Result<Self, GeometryError> {
        Self::with_max_scale(
            image_width,
            image_height,
            viewport_width,
            viewport_height,
            DEFAULT_MAX_SCALE,
        )
    }

    /// Like [`ViewState::new`] with an explicit zoom ceiling.
    ///
    /// The effective ceiling is relaxed to the max-fit factor when the
    /// image is small enough that fitting the viewport already needs
    /// more than `max_scale`.
    pub fn with_max_scale(
        image_width: u32,
        image_height: u32,
        viewport_width: u32,
        viewport_height: u32,
        max_scale: f32,
    ) -> Result<Self, GeometryError> {
        if image_width == 0 || image_height == 0 {
            return Err(GeometryError::DegenerateImage {
                width: image_width,
                height: image_height,
            });
        }
        if viewport_width == 0 || viewport_height == 0 {
            return Err(GeometryError::DegenerateViewport {
                width: viewport_width,
                height: viewport_height,
            });
        }

        let iw = image_width as f32;
        let ih = image_height as f32;
        let vw = viewport_width as f32;
        let vh = viewport_height as f32;

        let ratio = (iw / vw).min(ih / vh).max(1.0);
        let show_rect = RectF::from_size(iw / ratio, ih / ratio);

        let sample_size = sample_size_for(
            image_width,
            image_height,
            show_rect.width(),
            show_rect.height(),
        );

        let mut state = Self {
            image_width,
            image_height,
            viewport: RectF::from_size(vw, vh),
            show_rect,
            view_offset: RectF::default(),
            thumb_show_rect: show_rect,
            sample_size,
            thumb_sample_size: sample_size,
            min_scale: 1.0_f32.min((vw / iw).min(vh / ih)),
            max_scale: max_scale.max((vw / iw).max(vh / ih)),
        };
        state.center_view_offset();
        Ok(state)
    }

    pub fn image_size(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    pub fn viewport(&self) -> RectF {
        self.viewport
    }

    pub fn show_rect(&self) -> RectF {
        self.show_rect
    }

    pub fn thumb_show_rect(&self) -> RectF {
        self.thumb_show_rect
    }

    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    pub fn thumb_sample_size(&self) -> u32 {
        self.thumb_sample_size
    }

    /// Current zoom relative to source size (1.0 = source pixels).
    pub fn current_scale_factor(&self) -> f32 {
        self.show_rect.height() / self.image_height as f32
    }

    /// Map a show-space rect into view space.
    pub fn to_view_coords(&self, rect: RectF) -> RectF {
        rect.offset(-self.view_offset.left, -self.view_offset.top)
    }

    /// Map a view-space rect back into show space.
    ///
    /// Exact inverse of [`ViewState::to_view_coords`] for any rect.
    pub fn to_show_coords(&self, rect: RectF) -> RectF {
        rect.offset(self.view_offset.left, self.view_offset.top)
    }

    /// Portion of the show rect currently inside the viewport, in show
    /// space. Empty while the state is degenerate mid-gesture.
    pub fn visible_show_rect(&self) -> RectF {
        self.show_rect.intersection(&self.view_offset)
    }

    /// True when the given view-space point lies over the image.
    pub fn is_tap_on_image(&self, x: f32, y: f32) -> bool {
        self.to_view_coords(self.show_rect).contains_point(x, y)
    }

    /// Factor that would shrink the current show rect to fit entirely
    /// inside the viewport.
    pub fn min_fit_scale_factor(&self) -> f32 {
        let ws = self.viewport.width() / self.show_rect.width();
        let hs = self.viewport.height() / self.show_rect.height();
        ws.min(hs)
    }

    /// Factor that would grow the current show rect until it covers the
    /// viewport on both axes.
    pub fn max_fit_scale_factor(&self) -> f32 {
        let ws = self.viewport.width() / self.show_rect.width();
        let hs = self.viewport.height() / self.show_rect.height();
        ws.max(hs)
    }

    /// Target factor for a fit toggle (double-tap): grow to cover when
    /// the image currently sits within the viewport, otherwise shrink
    /// back to fit. Hosts reach the target through a sequence of
    /// incremental [`ViewState::scale`] steps.
    pub fn toggle_fit_factor(&self) -> f32 {
        // Small slack absorbs rounding from previous gestures.
        let slack = 5.0;
        if self.show_rect.width() < self.viewport.width() + slack
            && self.show_rect.height() < self.viewport.height() + slack
        {
            self.max_fit_scale_factor()
        } else {
            self.min_fit_scale_factor()
        }
    }

    /// Apply a pan delta in view pixels.
    ///
    /// An axis on which the image is already fully visible is pinned:
    /// the delta on that axis is ignored. Otherwise the pan is clamped
    /// so the image edge never crosses the matching viewport edge, and
    /// snaps to centered if both edges would. Returns the edges flush
    /// with the viewport after the move.
    pub fn pan(&mut self, dx: f32, dy: f32) -> EdgeFlags {
        let vp = self.viewport;
        let o = self.to_view_coords(self.show_rect);

        let mut rx = if o.left >= 0.0 && o.right <= vp.right {
            None
        } else {
            Some(dx)
        };
        let mut ry = if o.top >= 0.0 && o.bottom <= vp.bottom {
            None
        } else {
            Some(dy)
        };

        if let Some(r) = rx.as_mut() {
            if o.left + dx > 0.0 {
                *r = -o.left;
            }
            if o.right + dx < vp.right {
                *r = vp.right - o.right;
            }
            if o.left + dx > 0.0 && o.right + dx < vp.right {
                *r = vp.center_x() - o.center_x();
            }
        }
        if let Some(r) = ry.as_mut() {
            if o.top + dy > 0.0 {
                *r = -o.top;
            }
            if o.bottom + dy < vp.bottom {
                *r = vp.bottom - o.bottom;
            }
            if o.top + dy > 0.0 && o.bottom + dy < vp.bottom {
                *r = vp.center_y() - o.center_y();
            }
        }

        self.view_offset = self
            .view_offset
            .offset(-rx.unwrap_or(0.0), -ry.unwrap_or(0.0));

        let mut flags = EdgeFlags::empty();
        if self.view_offset.left <= 0.0 {
            flags |= EdgeFlags::LEFT;
        }
        if self.view_offset.right >= self.show_rect.right {
            flags |= EdgeFlags::RIGHT;
        }
        if self.view_offset.top <= 0.0 {
            flags |= EdgeFlags::TOP;
        }
        if self.view_offset.bottom >= self.show_rect.bottom {
            flags |= EdgeFlags::BOTTOM;
        }
        flags
    }

    /// Apply one incremental zoom step anchored at a view-space focal
    /// point.
    ///
    /// A focal coordinate over a fully visible axis is re-anchored to
    /// the viewport center so zooming cannot walk the image off-center.
    /// Shrinking below the thumbnail rect snaps back to it; stepping
    /// outside the absolute scale bounds is rejected. After applying,
    /// any axis smaller than the viewport is re-centered and any gap at
    /// a viewport edge is closed.
    pub fn scale(&mut self, focal_x: f32, focal_y: f32, factor: f32) -> ScaleOutcome {
        let vp = self.viewport;
        let o = self.to_view_coords(self.show_rect);

        let fx = if o.left > 0.0 && o.right < vp.right {
            vp.center_x()
        } else {
            focal_x
        };
        let fy = if o.top > 0.0 && o.bottom < vp.bottom {
            vp.center_y()
        } else {
            focal_y
        };

        let left = fx - (fx - o.left) * factor;
        let top = fy - (fy - o.top) * factor;
        let next = RectF::new(
            left,
            top,
            left + o.width() * factor,
            top + o.height() * factor,
        );

        if next.width() < self.thumb_show_rect.width()
            || next.height() < self.thumb_show_rect.height()
        {
            self.reset_to_thumb();
            return ScaleOutcome::SnappedToFloor;
        }

        let scale = next.width() / self.image_width as f32;
        if scale > self.max_scale || scale < self.min_scale {
            return ScaleOutcome::Rejected;
        }

        self.apply_view_rect(next);

        let a = self.to_view_coords(self.show_rect);
        let nx = if a.width() < vp.width() {
            vp.center_x() - a.center_x()
        } else if a.left > 0.0 {
            -a.left
        } else if a.right < vp.right {
            vp.right - a.right
        } else {
            0.0
        };
        let ny = if a.height() < vp.height() {
            vp.center_y() - a.center_y()
        } else if a.top > 0.0 {
            -a.top
        } else if a.bottom < vp.bottom {
            vp.bottom - a.bottom
        } else {
            0.0
        };
        self.apply_view_rect(a.offset(nx, ny));

        ScaleOutcome::Applied
    }

    /// Recompute the sample size from the current show rect.
    ///
    /// Called when a zoom gesture ends, not on every step. Returns true
    /// when the effective sample size changed, meaning visible tiles
    /// need re-decoding at the new resolution.
    pub fn commit_sample_size(&mut self) -> bool {
        let next = sample_size_for(
            self.image_width,
            self.image_height,
            self.show_rect.width(),
            self.show_rect.height(),
        );
        if next == self.sample_size {
            return false;
        }
        self.sample_size = next;
        true
    }

    /// Snap back to the thumbnail rect, centered.
    pub fn reset_to_thumb(&mut self) {
        self.show_rect = self.thumb_show_rect;
        self.center_view_offset();
    }

    fn center_view_offset(&mut self) {
        let left = (self.show_rect.width() - self.viewport.width()) / 2.0;
        let top = (self.show_rect.height() - self.viewport.height()) / 2.0;
        self.view_offset = RectF::new(
            left,
            top,
            left + self.viewport.width(),
            top + self.viewport.height(),
        );
    }

    /// Adopt a show rect given in view coordinates: the new offset is
    /// its negated origin and the new show rect its size.
    fn apply_view_rect(&mut self, rect: RectF) {
        self.view_offset = RectF::new(
            -rect.left,
            -rect.top,
            -rect.left + self.viewport.width(),
            -rect.top + self.viewport.height(),
        );
        self.show_rect = RectF::from_size(rect.width(), rect.height());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tall_image() -> ViewState {
        // 4000x8000 source inside a 1000x1000 viewport.
        ViewState::new(4000, 8000, 1000, 1000).unwrap()
    }

    #[test]
    fn initial_fit_fills_the_less_constrained_axis() {
        let state = tall_image();
        assert_eq!(state.show_rect(), RectF::from_size(1000.0, 2000.0));
        assert_eq!(state.sample_size(), 4);
        assert_eq!(state.thumb_sample_size(), 4);
        assert_eq!(state.current_scale_factor(), 0.25);
    }

    #[test]
    fn initial_offset_is_centered() {
        let state = tall_image();
        // 1000-wide show in a 1000-wide viewport: x centered at zero
        // offset; 2000-tall show: vertical middle.
        assert_eq!(state.visible_show_rect(), RectF::new(0.0, 500.0, 1000.0, 1500.0));
    }

    #[test]
    fn small_image_is_not_upscaled_at_init() {
        let state = ViewState::new(500, 300, 1000, 1000).unwrap();
        assert_eq!(state.show_rect(), RectF::from_size(500.0, 300.0));
        assert_eq!(state.sample_size(), 1);
        // Centered on both axes: offset origin is negative.
        let vc = state.to_view_coords(state.show_rect());
        assert_eq!(vc.left, 250.0);
        assert_eq!(vc.top, 350.0);
    }

    #[test]
    fn degenerate_sizes_are_rejected() {
        assert_eq!(
            ViewState::new(0, 100, 100, 100),
            Err(GeometryError::DegenerateImage {
                width: 0,
                height: 100
            })
        );
        assert_eq!(
            ViewState::new(100, 100, 100, 0),
            Err(GeometryError::DegenerateViewport {
                width: 100,
                height: 0
            })
        );
    }

    #[test]
    fn coordinate_round_trip() {
        let mut state = tall_image();
        state.pan(-37.0, 191.0);
        let rect = RectF::new(12.5, 40.0, 600.0, 777.0);
        let back = state.to_show_coords(state.to_view_coords(rect));
        assert_eq!(back, rect);
    }

    #[test]
    fn pan_clamps_at_the_bottom_edge() {
        let mut state = tall_image();
        for _ in 0..50 {
            state.pan(0.0, -400.0);
        }
        // Offset bottom never passes the show rect bottom.
        assert_eq!(state.visible_show_rect(), RectF::new(0.0, 1000.0, 1000.0, 2000.0));
    }

    #[test]
    fn pan_reports_flush_edges() {
        let mut state = tall_image();
        let flags = state.pan(0.0, -5000.0);
        // Width is fully visible, so LEFT|RIGHT stay flush; the pan
        // pushed the view to the bottom edge.
        assert!(flags.contains(EdgeFlags::LEFT | EdgeFlags::RIGHT | EdgeFlags::BOTTOM));
        assert!(!flags.contains(EdgeFlags::TOP));
    }

    #[test]
    fn pan_is_ignored_on_a_fully_visible_axis() {
        let mut state = tall_image();
        let before = state.visible_show_rect();
        state.pan(300.0, 0.0);
        assert_eq!(state.visible_show_rect(), before);
    }

    #[test]
    fn small_image_stays_centered_through_pans() {
        let mut state = ViewState::new(500, 300, 1000, 1000).unwrap();
        let flags = state.pan(123.0, -456.0);
        let vc = state.to_view_coords(state.show_rect());
        assert_eq!((vc.left, vc.top), (250.0, 350.0));
        // Both edges of both axes read as flush when fully visible.
        assert_eq!(flags, EdgeFlags::all());
    }

    #[test]
    fn zoom_in_doubles_the_show_rect() {
        let mut state = tall_image();
        let outcome = state.scale(500.0, 500.0, 2.0);
        assert_eq!(outcome, ScaleOutcome::Applied);
        assert_eq!(state.show_rect(), RectF::from_size(2000.0, 4000.0));
        assert!(state.commit_sample_size());
        assert_eq!(state.sample_size(), 2);
    }

    #[test]
    fn commit_is_a_noop_when_the_sample_size_is_unchanged() {
        let mut state = tall_image();
        assert!(!state.commit_sample_size());
        state.scale(500.0, 500.0, 2.0);
        assert!(state.commit_sample_size());
        assert!(!state.commit_sample_size());
        assert_eq!(state.sample_size(), 2);
    }

    #[test]
    fn zoom_floor_snaps_back_to_the_thumbnail_rect() {
        let mut state = tall_image();
        assert_eq!(state.scale(500.0, 500.0, 0.4), ScaleOutcome::SnappedToFloor);
        assert_eq!(state.show_rect(), RectF::from_size(1000.0, 2000.0));

        // Any zoom-out sequence keeps the floor.
        for factor in [0.9, 0.5, 0.99, 0.1] {
            state.scale(321.0, 654.0, factor);
            assert!(state.show_rect().width() >= 1000.0);
            assert!(state.show_rect().height() >= 2000.0);
        }
    }

    #[test]
    fn zoom_beyond_the_ceiling_is_rejected() {
        let mut state = tall_image();
        // 0.25 * 32 = 8.0 > DEFAULT_MAX_SCALE.
        assert_eq!(state.scale(500.0, 500.0, 32.0), ScaleOutcome::Rejected);
        assert_eq!(state.show_rect(), RectF::from_size(1000.0, 2000.0));
    }

    #[test]
    fn zoom_keeps_the_viewport_covered() {
        let mut state = tall_image();
        // Zoom around a corner focal point; afterwards no gap may open
        // between the image and any viewport edge.
        state.scale(0.0, 0.0, 1.5);
        let vc = state.to_view_coords(state.show_rect());
        assert!(vc.left <= 0.0 && vc.right >= 1000.0);
        assert!(vc.top <= 0.0 && vc.bottom >= 1000.0);
    }

    #[test]
    fn zoom_focal_anchoring_keeps_the_point_under_the_finger() {
        let mut state = tall_image();
        // Pan to the top edge so the vertical axis is not centered.
        state.pan(0.0, 5000.0);
        let before = state.to_view_coords(state.show_rect());
        assert_eq!(before.top, 0.0);
        // Anchor at the top-left visible corner; the top edge must not
        // move during the scale (before clamping it is the fixed point).
        state.scale(0.0, 0.0, 2.0);
        let after = state.to_view_coords(state.show_rect());
        assert_eq!(after.top, 0.0);
    }

    #[test]
    fn fit_factors_follow_the_current_show_rect() {
        let mut state = tall_image();
        assert_eq!(state.min_fit_scale_factor(), 0.5);
        assert_eq!(state.max_fit_scale_factor(), 1.0);
        // At the thumb size the toggle wants to grow to cover.
        assert_eq!(state.toggle_fit_factor(), 0.5);

        // Shrink semantics once zoomed in.
        state.scale(500.0, 500.0, 2.0);
        assert_eq!(state.toggle_fit_factor(), 0.25);
    }

    #[test]
    fn tap_hit_test_uses_view_coordinates() {
        let state = ViewState::new(500, 300, 1000, 1000).unwrap();
        assert!(state.is_tap_on_image(500.0, 500.0));
        assert!(!state.is_tap_on_image(100.0, 100.0));
    }
}
