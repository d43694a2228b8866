//! The tile grid: per-cell bitmap cache with halo eviction.
//!
//! Tiling is fixed in source-pixel space: one cell covers one
//! viewport's worth of source pixels, independent of the current zoom,
//! so the grid is rebuilt only when the viewport size or the image
//! changes, never on a zoom step. Each cell keeps a low-res bitmap
//! (decoded once when the grid is primed, resident until teardown) and
//! an on-demand full-res bitmap that is released once the cell leaves
//! the visible range plus a one-cell halo.

use crate::pixels::PixelBuffer;
use crate::source::SourceRect;
use std::sync::Arc;
use viewer_core::RectF;

/// Inclusive range of grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRange {
    pub row_start: u32,
    pub row_end: u32,
    pub col_start: u32,
    pub col_end: u32,
}

impl GridRange {
    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.row_start && row <= self.row_end && col >= self.col_start && col <= self.col_end
    }

    /// Distance in cells from the range (0 when inside).
    pub fn distance(&self, row: u32, col: u32) -> u32 {
        let row_dist = if row < self.row_start {
            self.row_start - row
        } else if row > self.row_end {
            row - self.row_end
        } else {
            0
        };
        let col_dist = if col < self.col_start {
            self.col_start - col
        } else if col > self.col_end {
            col - self.col_end
        } else {
            0
        };
        row_dist.max(col_dist)
    }
}

/// Cheap copy of one tile's cache state, for hosts and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSnapshot {
    pub has_low_res: bool,
    pub has_full_res: bool,
    pub current_sample_size: u32,
    pub loading: bool,
}

#[derive(Debug)]
struct Tile {
    low_res: Option<Arc<PixelBuffer>>,
    full_res: Option<Arc<PixelBuffer>>,
    /// Sample size of the best buffer this tile currently holds; a
    /// mismatch against the global sample size is what triggers an
    /// upgrade decode.
    current_sample_size: u32,
    loading: bool,
}

/// N x M grid of tiles over one source image.
pub struct TileGrid {
    rows: u32,
    cols: u32,
    /// One cell's extent in source pixels (= viewport size).
    tile_width: u32,
    tile_height: u32,
    image_width: u32,
    image_height: u32,
    thumb_sample_size: u32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// Allocate an empty grid; low-res bitmaps arrive via
    /// [`TileGrid::set_low_res`] when the prime decode runs.
    pub fn new(
        image_width: u32,
        image_height: u32,
        viewport_width: u32,
        viewport_height: u32,
        thumb_sample_size: u32,
    ) -> Self {
        let rows = image_height.div_ceil(viewport_height);
        let cols = image_width.div_ceil(viewport_width);
        let tiles = (0..rows as usize * cols as usize)
            .map(|_| Tile {
                low_res: None,
                full_res: None,
                current_sample_size: thumb_sample_size,
                loading: false,
            })
            .collect();

        Self {
            rows,
            cols,
            tile_width: viewport_width,
            tile_height: viewport_height,
            image_width,
            image_height,
            thumb_sample_size,
            tiles,
        }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn thumb_sample_size(&self) -> u32 {
        self.thumb_sample_size
    }

    fn index(&self, row: u32, col: u32) -> Option<usize> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(row as usize * self.cols as usize + col as usize)
    }

    /// The cell's rectangle in source pixels, clamped to the image.
    ///
    /// `None` for out-of-grid indices or cells clamped to nothing
    /// (cannot happen for a grid built from positive sizes, but kept
    /// as a guard for edge rounding).
    pub fn source_rect(&self, row: u32, col: u32) -> Option<SourceRect> {
        self.index(row, col)?;

        let left = (col * self.tile_width).min(self.image_width);
        let right = (left + self.tile_width).min(self.image_width);
        let top = (row * self.tile_height).min(self.image_height);
        let bottom = (top + self.tile_height).min(self.image_height);

        if left == right || top == bottom {
            return None;
        }

        Some(SourceRect::new(left, top, right - left, bottom - top))
    }

    /// The cell's rectangle in show space for the given show rect.
    pub fn show_rect(&self, row: u32, col: u32, show: RectF) -> RectF {
        let ratio = show.height() / self.image_height as f32;
        let unit_w = self.tile_width as f32 * ratio;
        let unit_h = self.tile_height as f32 * ratio;

        let left = (col as f32 * unit_w).min(show.width());
        let right = (left + unit_w).min(show.width());
        let top = (row as f32 * unit_h).min(show.height());
        let bottom = (top + unit_h).min(show.height());

        RectF::new(left, top, right, bottom)
    }

    /// Cells intersecting the visible portion of the show rect.
    ///
    /// Computed in source-pixel space with a single show-to-source
    /// ratio. Bounds are inclusive; `None` when nothing is visible.
    pub fn visible_range(&self, visible_show: RectF, show: RectF) -> Option<GridRange> {
        if visible_show.is_empty() || show.is_empty() {
            return None;
        }

        let to_source = self.image_height as f32 / show.height();
        let vis = visible_show.scaled(to_source);

        let col_start = ((vis.left / self.tile_width as f32).floor().max(0.0) as u32)
            .min(self.cols - 1);
        let col_end = (((vis.right / self.tile_width as f32).ceil() as u32).saturating_sub(1))
            .clamp(col_start, self.cols - 1);
        let row_start = ((vis.top / self.tile_height as f32).floor().max(0.0) as u32)
            .min(self.rows - 1);
        let row_end = (((vis.bottom / self.tile_height as f32).ceil() as u32).saturating_sub(1))
            .clamp(row_start, self.rows - 1);

        Some(GridRange {
            row_start,
            row_end,
            col_start,
            col_end,
        })
    }

    /// Store a cell's always-resident low-res bitmap.
    pub fn set_low_res(&mut self, row: u32, col: u32, buffer: Arc<PixelBuffer>, sample_size: u32) {
        if let Some(i) = self.index(row, col) {
            let tile = &mut self.tiles[i];
            tile.low_res = Some(buffer);
            tile.current_sample_size = sample_size;
        }
    }

    /// True once every cell holds a low-res bitmap; the viewer is not
    /// drawable before that.
    pub fn low_res_complete(&self) -> bool {
        self.tiles.iter().all(|tile| tile.low_res.is_some())
    }

    /// Whether the cell's cached bitmap no longer matches the global
    /// sample size and an upgrade decode is wanted.
    pub fn needs_upgrade(&self, row: u32, col: u32, sample_size: u32) -> bool {
        match self.index(row, col) {
            Some(i) => self.tiles[i].current_sample_size != sample_size,
            None => false,
        }
    }

    /// Mark the cell loading. Returns false (request deduplicated) if
    /// it already was.
    pub fn try_begin_loading(&mut self, row: u32, col: u32) -> bool {
        match self.index(row, col) {
            Some(i) => {
                if self.tiles[i].loading {
                    false
                } else {
                    self.tiles[i].loading = true;
                    true
                }
            }
            None => false,
        }
    }

    /// Clear the loading flag without storing a result (failed or
    /// stale decode).
    pub fn finish_loading(&mut self, row: u32, col: u32) {
        if let Some(i) = self.index(row, col) {
            self.tiles[i].loading = false;
        }
    }

    pub fn is_loading(&self, row: u32, col: u32) -> bool {
        self.index(row, col)
            .map(|i| self.tiles[i].loading)
            .unwrap_or(false)
    }

    /// Store a completed full-res decode and clear the loading flag.
    pub fn store_full_res(
        &mut self,
        row: u32,
        col: u32,
        buffer: Arc<PixelBuffer>,
        sample_size: u32,
    ) {
        if let Some(i) = self.index(row, col) {
            let tile = &mut self.tiles[i];
            tile.full_res = Some(buffer);
            tile.current_sample_size = sample_size;
            tile.loading = false;
        }
    }

    /// Best bitmap available right now: full-res if present, else the
    /// low-res fallback. Never blocks.
    pub fn best_buffer(&self, row: u32, col: u32) -> Option<Arc<PixelBuffer>> {
        let i = self.index(row, col)?;
        let tile = &self.tiles[i];
        tile.full_res.clone().or_else(|| tile.low_res.clone())
    }

    /// Release full-res bitmaps of cells strictly more than `halo`
    /// cells outside `range` and reset their sample size to the
    /// thumbnail's. Low-res bitmaps are always retained. Returns how
    /// many buffers were released.
    pub fn evict_outside(&mut self, range: GridRange, halo: u32) -> usize {
        let mut released = 0;
        for row in 0..self.rows {
            for col in 0..self.cols {
                if range.distance(row, col) <= halo {
                    continue;
                }
                let i = row as usize * self.cols as usize + col as usize;
                let tile = &mut self.tiles[i];
                if tile.full_res.take().is_some() {
                    released += 1;
                }
                tile.current_sample_size = self.thumb_sample_size;
            }
        }
        released
    }

    pub fn snapshot(&self, row: u32, col: u32) -> Option<TileSnapshot> {
        let i = self.index(row, col)?;
        let tile = &self.tiles[i];
        Some(TileSnapshot {
            has_low_res: tile.low_res.is_some(),
            has_full_res: tile.full_res.is_some(),
            current_sample_size: tile.current_sample_size,
            loading: tile.loading,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixels::PixelFormat;

    fn buffer() -> Arc<PixelBuffer> {
        Arc::new(PixelBuffer {
            width: 1,
            height: 1,
            format: PixelFormat::Rgba8888,
            data: vec![0; 4],
        })
    }

    /// 4000x8000 image split by a 1000x1000 viewport: 8 rows, 4 cols.
    fn grid() -> TileGrid {
        TileGrid::new(4000, 8000, 1000, 1000, 4)
    }

    #[test]
    fn dimensions_round_up() {
        let g = grid();
        assert_eq!((g.rows(), g.cols()), (8, 4));

        let ragged = TileGrid::new(4100, 7900, 1000, 1000, 4);
        assert_eq!((ragged.rows(), ragged.cols()), (8, 5));
    }

    #[test]
    fn source_rect_is_clamped_at_the_image_edge() {
        let ragged = TileGrid::new(4100, 7900, 1000, 1000, 4);
        assert_eq!(
            ragged.source_rect(0, 4),
            Some(SourceRect::new(4000, 0, 100, 1000))
        );
        assert_eq!(
            ragged.source_rect(7, 0),
            Some(SourceRect::new(0, 7000, 1000, 900))
        );
        assert_eq!(ragged.source_rect(8, 0), None);
    }

    #[test]
    fn show_rect_scales_with_the_show_size() {
        let g = grid();
        // Show rect at half the source size: cells are 500x500.
        let show = RectF::from_size(2000.0, 4000.0);
        assert_eq!(g.show_rect(0, 0, show), RectF::new(0.0, 0.0, 500.0, 500.0));
        assert_eq!(
            g.show_rect(2, 3, show),
            RectF::new(1500.0, 1000.0, 2000.0, 1500.0)
        );
    }

    #[test]
    fn visible_range_is_inclusive_and_tight() {
        let g = grid();
        let show = RectF::from_size(2000.0, 4000.0);

        // Viewport-sized window exactly over the top-left 2x2 cells.
        let visible = RectF::new(0.0, 0.0, 1000.0, 1000.0);
        assert_eq!(
            g.visible_range(visible, show),
            Some(GridRange {
                row_start: 0,
                row_end: 1,
                col_start: 0,
                col_end: 1
            })
        );

        // A window straddling cell borders picks up the partials.
        let visible = RectF::new(400.0, 900.0, 1400.0, 1900.0);
        assert_eq!(
            g.visible_range(visible, show),
            Some(GridRange {
                row_start: 1,
                row_end: 3,
                col_start: 0,
                col_end: 2
            })
        );

        // Bottom-right corner clamps to the last cells.
        let visible = RectF::new(1500.0, 3500.0, 2000.0, 4000.0);
        assert_eq!(
            g.visible_range(visible, show),
            Some(GridRange {
                row_start: 7,
                row_end: 7,
                col_start: 3,
                col_end: 3
            })
        );
    }

    #[test]
    fn visible_range_rejects_empty_windows() {
        let g = grid();
        let show = RectF::from_size(2000.0, 4000.0);
        assert_eq!(g.visible_range(RectF::default(), show), None);
    }

    #[test]
    fn low_res_gate_requires_every_cell() {
        let mut g = TileGrid::new(1500, 1500, 1000, 1000, 2);
        assert!(!g.low_res_complete());
        for row in 0..2 {
            for col in 0..2 {
                g.set_low_res(row, col, buffer(), 2);
            }
        }
        assert!(g.low_res_complete());
    }

    #[test]
    fn upgrade_tracking_follows_the_sample_size() {
        let mut g = grid();
        g.set_low_res(0, 0, buffer(), 4);
        assert!(!g.needs_upgrade(0, 0, 4));
        assert!(g.needs_upgrade(0, 0, 2));

        g.store_full_res(0, 0, buffer(), 2);
        assert!(!g.needs_upgrade(0, 0, 2));
        // Out-of-grid cells never want work.
        assert!(!g.needs_upgrade(99, 0, 2));
    }

    #[test]
    fn loading_flag_deduplicates_requests() {
        let mut g = grid();
        assert!(g.try_begin_loading(1, 1));
        assert!(!g.try_begin_loading(1, 1));
        assert!(g.is_loading(1, 1));

        g.finish_loading(1, 1);
        assert!(!g.is_loading(1, 1));
        assert!(g.try_begin_loading(1, 1));

        g.store_full_res(1, 1, buffer(), 2);
        assert!(!g.is_loading(1, 1));
    }

    #[test]
    fn best_buffer_prefers_full_res_and_falls_back() {
        let mut g = grid();
        assert!(g.best_buffer(0, 0).is_none());

        let low = buffer();
        g.set_low_res(0, 0, low.clone(), 4);
        assert!(Arc::ptr_eq(&g.best_buffer(0, 0).unwrap(), &low));

        let full = buffer();
        g.store_full_res(0, 0, full.clone(), 2);
        assert!(Arc::ptr_eq(&g.best_buffer(0, 0).unwrap(), &full));
    }

    #[test]
    fn eviction_spares_the_halo_and_keeps_low_res() {
        let mut g = grid();
        for row in 0..8 {
            for col in 0..4 {
                g.set_low_res(row, col, buffer(), 4);
                g.store_full_res(row, col, buffer(), 2);
            }
        }

        let visible = GridRange {
            row_start: 0,
            row_end: 1,
            col_start: 0,
            col_end: 1,
        };
        let released = g.evict_outside(visible, 1);
        assert!(released > 0);

        // Inside the halo: untouched.
        let kept = g.snapshot(2, 2).unwrap();
        assert!(kept.has_full_res);
        assert_eq!(kept.current_sample_size, 2);

        // Beyond the halo: full-res gone, low-res kept, sample reset.
        let evicted = g.snapshot(3, 0).unwrap();
        assert!(!evicted.has_full_res);
        assert!(evicted.has_low_res);
        assert_eq!(evicted.current_sample_size, 4);

        let far = g.snapshot(7, 3).unwrap();
        assert!(!far.has_full_res);
        assert!(far.has_low_res);
    }
}
