//! The region viewer facade.
//!
//! Owns the viewing state, the tile grid and the decode pipeline, and
//! exposes the host-facing API: attach an image, forward gestures,
//! draw. All gesture and draw calls are expected on one UI thread; the
//! single decode worker only ever touches the shared state through
//! short critical sections, with decode I/O always outside the lock,
//! so drawing never waits on a decode.

use crate::event::ViewerEvent;
use std::sync::{Arc, Mutex, MutexGuard};
use tileview_render::{Canvas, GridRange, RegionSource, TileGrid, TileSnapshot};
use tileview_scheduler::{DecodeJob, DecodeQueue, DecodeWorker, JobExecutor, QueueStats};
use tracing::{debug, warn};
use viewer_core::{EdgeFlags, RectF, ScaleOutcome, ViewState, DEFAULT_MAX_SCALE};

/// Tuning knobs for the viewer.
#[derive(Debug, Clone, Copy)]
pub struct ViewerConfig {
    /// Absolute zoom ceiling relative to source size; relaxed to the
    /// max-fit factor for images smaller than the viewport.
    pub max_scale_factor: f32,

    /// Width of the kept-decoded margin around the visible cell range.
    pub halo_tiles: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            max_scale_factor: DEFAULT_MAX_SCALE,
            halo_tiles: 1,
        }
    }
}

/// Callbacks into the host widget.
///
/// `request_redraw` must be safe to call from the decode worker
/// thread; hosts typically post an invalidate to their UI loop.
pub trait ViewerHost: Send + Sync {
    fn request_redraw(&self);

    /// Attach finished: the low-res grid is fully decoded (`true`) or
    /// the image turned out to be undecodable (`false`).
    fn on_image_ready(&self, _success: bool) {}
}

struct Inner {
    source: Option<Arc<dyn RegionSource>>,
    view: Option<ViewState>,
    grid: Option<TileGrid>,
    viewport: (u32, u32),
    /// Bumped on every attach/rebuild; stale decode results are
    /// recognized and dropped by comparing against it.
    generation: u64,
    /// True from attach until every low-res tile is decoded.
    priming: bool,
    /// The image failed to decode; the viewer stays inert until the
    /// next attach.
    failed: bool,
}

impl Inner {
    fn is_interactive(&self) -> bool {
        !self.priming && !self.failed && self.view.is_some() && self.grid.is_some()
    }
}

/// Viewer engine for raster images larger than the viewport can hold.
pub struct RegionViewer {
    inner: Arc<Mutex<Inner>>,
    queue: Arc<DecodeQueue>,
    worker: Option<DecodeWorker>,
    host: Arc<dyn ViewerHost>,
    config: ViewerConfig,
}

impl RegionViewer {
    pub fn new(host: Arc<dyn ViewerHost>) -> Self {
        Self::with_config(host, ViewerConfig::default())
    }

    pub fn with_config(host: Arc<dyn ViewerHost>, config: ViewerConfig) -> Self {
        let inner = Arc::new(Mutex::new(Inner {
            source: None,
            view: None,
            grid: None,
            viewport: (0, 0),
            generation: 0,
            priming: false,
            failed: false,
        }));

        let queue = Arc::new(DecodeQueue::new());
        let executor: JobExecutor = {
            let inner = inner.clone();
            let host = host.clone();
            Arc::new(move |job| execute_job(&inner, &host, job))
        };
        let worker = DecodeWorker::spawn(queue.clone(), executor);

        Self {
            inner,
            queue,
            worker: Some(worker),
            host,
            config,
        }
    }

    /// Attach a new image, tearing down whatever was attached before,
    /// including an attach still priming.
    pub fn set_image(&mut self, source: Arc<dyn RegionSource>) {
        {
            let mut guard = self.lock();
            guard.source = Some(source);
        }
        self.reinitialize();
    }

    /// The host viewport changed size; rebuilds the show rect and the
    /// whole grid.
    pub fn on_viewport_resized(&mut self, width: u32, height: u32) {
        {
            let mut guard = self.lock();
            if guard.viewport == (width, height) {
                return;
            }
            guard.viewport = (width, height);
            if guard.source.is_none() {
                return;
            }
        }
        self.reinitialize();
    }

    /// Apply a pan delta; returns which image edges are flush with the
    /// viewport so the host can release gestures to a parent.
    pub fn on_pan_delta(&mut self, dx: f32, dy: f32) -> EdgeFlags {
        let mut guard = self.lock();
        if !guard.is_interactive() {
            return EdgeFlags::empty();
        }
        let Some(view) = guard.view.as_mut() else {
            return EdgeFlags::empty();
        };
        let flags = view.pan(dx, dy);
        drop(guard);

        self.host.request_redraw();
        flags
    }

    /// Apply one incremental zoom step anchored at a focal point.
    pub fn on_zoom_delta(&mut self, focal_x: f32, focal_y: f32, factor: f32) -> ScaleOutcome {
        let mut guard = self.lock();
        if !guard.is_interactive() {
            return ScaleOutcome::Rejected;
        }
        let Some(view) = guard.view.as_mut() else {
            return ScaleOutcome::Rejected;
        };
        let outcome = view.scale(focal_x, focal_y, factor);
        drop(guard);

        if outcome != ScaleOutcome::Rejected {
            self.host.request_redraw();
        }
        outcome
    }

    /// The zoom gesture ended: commit the sample size. Visible tiles
    /// start re-decoding at the new resolution on the next draw.
    pub fn on_zoom_gesture_end(&mut self) {
        let mut guard = self.lock();
        if !guard.is_interactive() {
            return;
        }
        let Some(view) = guard.view.as_mut() else {
            return;
        };
        let changed = view.commit_sample_size();
        if changed {
            debug!(sample_size = view.sample_size(), "sample size committed");
        }
        drop(guard);

        if changed {
            self.host.request_redraw();
        }
    }

    /// Single entry point for hosts that prefer event dispatch over
    /// the named methods. Returns edge flags for pan events.
    pub fn handle_event(&mut self, event: ViewerEvent) -> Option<EdgeFlags> {
        match event {
            ViewerEvent::Pan { dx, dy } => Some(self.on_pan_delta(dx, dy)),
            ViewerEvent::ZoomStep {
                focal_x,
                focal_y,
                factor,
            } => {
                self.on_zoom_delta(focal_x, focal_y, factor);
                None
            }
            ViewerEvent::ZoomEnd => {
                self.on_zoom_gesture_end();
                None
            }
            ViewerEvent::Resize { width, height } => {
                self.on_viewport_resized(width, height);
                None
            }
        }
    }

    /// Draw the visible tiles, best bitmap first.
    ///
    /// Returns false while nothing can be drawn (no image attached,
    /// still priming, or the image failed). Never blocks on decoding:
    /// cells whose full-res bitmap is missing draw their low-res
    /// fallback and are queued for upgrade.
    pub fn draw(&mut self, canvas: &mut dyn Canvas) -> bool {
        let mut guard = self.lock();
        if !guard.is_interactive() {
            return false;
        }
        let generation = guard.generation;
        let inner = &mut *guard;
        let (Some(view), Some(grid)) = (&inner.view, &mut inner.grid) else {
            return false;
        };
        if !grid.low_res_complete() {
            return false;
        }

        let Some(range) = grid.visible_range(view.visible_show_rect(), view.show_rect()) else {
            return false;
        };

        grid.evict_outside(range, self.config.halo_tiles);

        let sample = view.sample_size();
        let upgrade_wanted = sample != view.thumb_sample_size();
        let mut requests = Vec::new();
        let mut drew = false;

        for row in range.row_start..=range.row_end {
            for col in range.col_start..=range.col_end {
                if upgrade_wanted
                    && grid.needs_upgrade(row, col, sample)
                    && grid.try_begin_loading(row, col)
                {
                    requests.push((row, col));
                }
                if let Some(buffer) = grid.best_buffer(row, col) {
                    let dest = view.to_view_coords(grid.show_rect(row, col, view.show_rect()));
                    canvas.draw_buffer(&buffer, dest);
                    drew = true;
                }
            }
        }
        drop(guard);

        for (row, col) in requests {
            if !self.queue.push(DecodeJob::UpgradeTile {
                row,
                col,
                generation,
            }) {
                break;
            }
        }

        drew
    }

    /// Current zoom relative to source pixels; 0.0 while unavailable.
    pub fn current_scale_factor(&self) -> f32 {
        let guard = self.lock();
        if !guard.is_interactive() {
            return 0.0;
        }
        guard
            .view
            .as_ref()
            .map(ViewState::current_scale_factor)
            .unwrap_or(0.0)
    }

    /// The whole image's rect at the current zoom.
    pub fn current_show_rect(&self) -> Option<RectF> {
        let guard = self.lock();
        if !guard.is_interactive() {
            return None;
        }
        guard.view.as_ref().map(ViewState::show_rect)
    }

    /// Source dimensions, for hosts that want to warn about images
    /// beyond what their surface can address.
    pub fn source_dimensions(&self) -> Option<(u32, u32)> {
        let guard = self.lock();
        guard
            .source
            .as_ref()
            .map(|source| (source.width(), source.height()))
    }

    /// True once the low-res grid is decoded and gestures are live.
    pub fn is_ready(&self) -> bool {
        self.lock().is_interactive()
    }

    /// True when the viewport point lies over the drawn image.
    pub fn is_tap_on_image(&self, x: f32, y: f32) -> bool {
        let guard = self.lock();
        if !guard.is_interactive() {
            return false;
        }
        guard
            .view
            .as_ref()
            .map(|view| view.is_tap_on_image(x, y))
            .unwrap_or(false)
    }

    /// Grid dimensions as (rows, cols), once a grid exists.
    pub fn grid_dimensions(&self) -> Option<(u32, u32)> {
        let guard = self.lock();
        guard.grid.as_ref().map(|grid| (grid.rows(), grid.cols()))
    }

    /// One tile's cache state, for diagnostics.
    pub fn tile_snapshot(&self, row: u32, col: u32) -> Option<TileSnapshot> {
        let guard = self.lock();
        guard.grid.as_ref().and_then(|grid| grid.snapshot(row, col))
    }

    /// Decode pipeline counters, for diagnostics.
    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Tear everything down: stop the worker, drop all tiles. The
    /// viewer stays inert afterwards; attach a fresh instance instead
    /// of reusing it.
    pub fn destroy(&mut self) {
        {
            let mut guard = self.lock();
            guard.generation += 1;
            guard.source = None;
            guard.view = None;
            guard.grid = None;
            guard.priming = false;
        }
        self.queue.close();
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
        self.host.request_redraw();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Rebuild view state and grid for the current source + viewport
    /// and queue the low-res prime decode. Anything in flight for the
    /// previous state is invalidated by the generation bump.
    fn reinitialize(&mut self) {
        let generation;
        {
            let mut guard = self.lock();
            guard.generation += 1;
            generation = guard.generation;
            guard.view = None;
            guard.grid = None;
            guard.failed = false;
            guard.priming = true;

            let Some(source) = guard.source.clone() else {
                guard.priming = false;
                return;
            };
            let (vw, vh) = guard.viewport;

            let view = match ViewState::with_max_scale(
                source.width(),
                source.height(),
                vw,
                vh,
                self.config.max_scale_factor,
            ) {
                Ok(view) => view,
                Err(err) => {
                    debug!(error = %err, "viewer not ready");
                    guard.priming = false;
                    return;
                }
            };
            let grid = TileGrid::new(
                source.width(),
                source.height(),
                vw,
                vh,
                view.thumb_sample_size(),
            );
            debug!(
                rows = grid.rows(),
                cols = grid.cols(),
                sample_size = view.thumb_sample_size(),
                "grid rebuilt"
            );
            guard.view = Some(view);
            guard.grid = Some(grid);
        }

        self.queue.clear();
        self.queue.push(DecodeJob::PrimeGrid { generation });
    }
}

impl Drop for RegionViewer {
    fn drop(&mut self) {
        // Worker teardown (close + join) happens in DecodeWorker's own
        // Drop; in-flight results are discarded by the generation check.
        self.queue.close();
    }
}

/// Decode worker entry point.
fn execute_job(inner: &Arc<Mutex<Inner>>, host: &Arc<dyn ViewerHost>, job: DecodeJob) {
    match job {
        DecodeJob::PrimeGrid { generation } => prime_grid(inner, host, generation),
        DecodeJob::UpgradeTile {
            row,
            col,
            generation,
        } => upgrade_tile(inner, host, row, col, generation),
    }
}

/// Decode every cell's low-res bitmap. Runs as one sequential job so
/// the viewer flips to drawable exactly once, when the whole grid is
/// covered.
fn prime_grid(inner: &Arc<Mutex<Inner>>, host: &Arc<dyn ViewerHost>, generation: u64) {
    let (source, thumb_sample, cells) = {
        let guard = inner.lock().unwrap();
        if guard.generation != generation {
            return;
        }
        let (Some(source), Some(view), Some(grid)) = (&guard.source, &guard.view, &guard.grid)
        else {
            return;
        };

        let mut cells = Vec::with_capacity(grid.rows() as usize * grid.cols() as usize);
        for row in 0..grid.rows() {
            for col in 0..grid.cols() {
                if let Some(rect) = grid.source_rect(row, col) {
                    cells.push((row, col, rect));
                }
            }
        }
        (source.clone(), view.thumb_sample_size(), cells)
    };

    for (row, col, rect) in cells {
        match source.decode_region(rect, thumb_sample) {
            Ok(buffer) => {
                let mut guard = inner.lock().unwrap();
                if guard.generation != generation {
                    return;
                }
                if let Some(grid) = guard.grid.as_mut() {
                    grid.set_low_res(row, col, Arc::new(buffer), thumb_sample);
                }
            }
            Err(err) => {
                warn!(row, col, error = %err, "low-res decode failed; image unavailable");
                let mut guard = inner.lock().unwrap();
                if guard.generation != generation {
                    return;
                }
                guard.priming = false;
                guard.failed = true;
                drop(guard);

                host.on_image_ready(false);
                return;
            }
        }
    }

    {
        let mut guard = inner.lock().unwrap();
        if guard.generation != generation {
            return;
        }
        guard.priming = false;
    }
    debug!("low-res grid primed");
    host.on_image_ready(true);
    host.request_redraw();
}

/// Decode one cell at the current sample size, re-validating before
/// and after: fast pans and zooms can make queued work stale, and a
/// finished decode may be for a sample size that is no longer current.
/// Stale results are discarded, never stored.
fn upgrade_tile(
    inner: &Arc<Mutex<Inner>>,
    host: &Arc<dyn ViewerHost>,
    row: u32,
    col: u32,
    generation: u64,
) {
    let (source, rect, sample) = {
        let mut guard = inner.lock().unwrap();
        if guard.generation != generation {
            return;
        }
        let Some(source) = guard.source.clone() else {
            return;
        };
        let (sample, still_wanted, rect) = match (&guard.view, &guard.grid) {
            (Some(view), Some(grid)) => {
                let sample = view.sample_size();
                let visible = grid
                    .visible_range(view.visible_show_rect(), view.show_rect())
                    .map(|range: GridRange| range.contains(row, col))
                    .unwrap_or(false);
                let wanted = visible
                    && sample != view.thumb_sample_size()
                    && grid.needs_upgrade(row, col, sample);
                (sample, wanted, grid.source_rect(row, col))
            }
            _ => return,
        };
        let Some(rect) = rect.filter(|_| still_wanted) else {
            if let Some(grid) = guard.grid.as_mut() {
                grid.finish_loading(row, col);
            }
            return;
        };
        (source, rect, sample)
    };

    let result = source.decode_region(rect, sample);

    let mut guard = inner.lock().unwrap();
    if guard.generation != generation {
        return;
    }
    match result {
        Ok(buffer) => {
            let still_current = guard
                .view
                .as_ref()
                .map(|view| view.sample_size() == sample)
                .unwrap_or(false);
            if let Some(grid) = guard.grid.as_mut() {
                if still_current {
                    grid.store_full_res(row, col, Arc::new(buffer), sample);
                } else {
                    grid.finish_loading(row, col);
                }
            }
            drop(guard);

            if still_current {
                host.request_redraw();
            }
        }
        Err(err) => {
            warn!(row, col, error = %err, "tile decode failed; keeping low-res fallback");
            if let Some(grid) = guard.grid.as_mut() {
                grid.finish_loading(row, col);
            }
        }
    }
}
