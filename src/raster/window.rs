//! Read/write window planning.
//!
//! A raster is never held fully in memory: each stage iterates a
//! [`WindowPlan`] that partitions the raster exactly (no overlap, no gap)
//! into bounded sub-windows — full-width row stripes for streaming kernels,
//! or square blocks for aggregation.

use crate::error::{FluxError, Result};

/// One rectangular read/write region of a raster, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Column of the window's left edge.
    pub x_off: usize,
    /// Row of the window's top edge.
    pub y_off: usize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    /// GDAL-style signed offset tuple.
    #[inline]
    pub fn offset(&self) -> (isize, isize) {
        (self.x_off as isize, self.y_off as isize)
    }

    /// Size tuple `(width, height)`.
    #[inline]
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// ndarray dimension tuple `(rows, cols)`.
    #[inline]
    pub fn dim(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Number of pixels in the window.
    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// True for degenerate zero-area windows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An exact partition of a raster into windows, iterated row-major.
#[derive(Debug, Clone)]
pub struct WindowPlan {
    raster_width: usize,
    raster_height: usize,
    window_width: usize,
    window_height: usize,
}

impl WindowPlan {
    /// Full-width row stripes of at most `rows` rows each.
    ///
    /// The last stripe is clamped to the raster edge.
    pub fn stripes(raster_width: usize, raster_height: usize, rows: usize) -> Self {
        Self {
            raster_width,
            raster_height,
            window_width: raster_width,
            window_height: rows.max(1),
        }
    }

    /// Square blocks of edge `block_edge`.
    ///
    /// The edge must divide both raster dimensions exactly; aggregation
    /// depends on every block mapping to exactly one coarse cell.
    pub fn blocks(raster_width: usize, raster_height: usize, block_edge: usize) -> Result<Self> {
        if block_edge == 0 || raster_width % block_edge != 0 {
            return Err(FluxError::BlockLayout {
                block_edge,
                extent: raster_width,
            });
        }
        if raster_height % block_edge != 0 {
            return Err(FluxError::BlockLayout {
                block_edge,
                extent: raster_height,
            });
        }
        Ok(Self {
            raster_width,
            raster_height,
            window_width: block_edge,
            window_height: block_edge,
        })
    }

    /// Number of windows across.
    pub fn cols(&self) -> usize {
        self.raster_width.div_ceil(self.window_width)
    }

    /// Number of windows down.
    pub fn rows(&self) -> usize {
        self.raster_height.div_ceil(self.window_height)
    }

    /// Total number of windows in the plan.
    pub fn len(&self) -> usize {
        self.cols() * self.rows()
    }

    /// True if the plan covers an empty raster.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the window at a row-major index.
    pub fn window(&self, index: usize) -> Window {
        let row = index / self.cols();
        let col = index % self.cols();
        let x_off = col * self.window_width;
        let y_off = row * self.window_height;
        Window {
            x_off,
            y_off,
            width: self.window_width.min(self.raster_width - x_off),
            height: self.window_height.min(self.raster_height - y_off),
        }
    }

    /// Iterates all windows in row-major order.
    pub fn iter(&self) -> WindowIter<'_> {
        WindowIter {
            plan: self,
            current: 0,
        }
    }
}

/// Iterator over the windows of a [`WindowPlan`].
#[derive(Debug, Clone)]
pub struct WindowIter<'a> {
    plan: &'a WindowPlan,
    current: usize,
}

impl Iterator for WindowIter<'_> {
    type Item = Window;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.plan.len() {
            return None;
        }
        let window = self.plan.window(self.current);
        self.current += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.len() - self.current;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for WindowIter<'_> {}
