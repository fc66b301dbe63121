//! Fixed-resolution point histogram with memoized box-downsampled views.

use imgref::{ImgRef, ImgVec};

use crate::data::Bounds;

/// Integer histogram of point positions at a fixed resolution.
///
/// The grid is filled once per dataset; render requests only read box-summed
/// views of it. The last view is cached until its size changes or the grid
/// is re-accumulated.
pub struct PointCountGrid {
    counts: ImgVec<u32>,
    column_sums: ImgVec<u32>,
    scaled: ImgVec<u32>,
    view_size: Option<(usize, usize)>,
}

impl PointCountGrid {
    /// Allocate a zeroed grid and its scratch buffers.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        let zeroed = || ImgVec::new(vec![0u32; width * height], width, height);
        Self {
            counts: zeroed(),
            column_sums: zeroed(),
            scaled: zeroed(),
            view_size: None,
        }
    }

    /// Grid width.
    #[must_use]
    pub fn width(&self) -> usize {
        self.counts.width()
    }

    /// Grid height.
    #[must_use]
    pub fn height(&self) -> usize {
        self.counts.height()
    }

    /// Full-resolution counts.
    #[must_use]
    pub fn counts(&self) -> ImgRef<'_, u32> {
        self.counts.as_ref()
    }

    /// Add points to the grid.
    ///
    /// Points are mapped linearly from `bounds` onto the grid with the y-axis
    /// flipped (row 0 holds the largest y). An axis with zero range maps every
    /// point to the middle of the grid. Mismatched or empty arrays are a no-op.
    pub fn accumulate(&mut self, x: &[f64], y: &[f64], bounds: &Bounds) {
        if x.is_empty() || x.len() != y.len() {
            return;
        }
        let (width, height) = (self.width(), self.height());
        if width == 0 || height == 0 {
            return;
        }

        let x_range = bounds.x_max - bounds.x_min;
        let y_range = bounds.y_max - bounds.y_min;
        let stride = self.counts.stride();
        let buf = self.counts.buf_mut();

        for (&px, &py) in x.iter().zip(y) {
            let col = grid_coordinate(px - bounds.x_min, x_range, width);
            let row = grid_coordinate(bounds.y_max - py, y_range, height);
            if let (Some(col), Some(row)) = (col, row) {
                let cell = &mut buf[row * stride + col];
                *cell = cell.saturating_add(1);
            }
        }
        self.view_size = None;
    }

    /// Zero all counts.
    pub fn reset(&mut self) {
        self.counts.buf_mut().fill(0);
        self.view_size = None;
    }

    /// Box-downsampled view of the grid at `width × height`.
    ///
    /// Requested sizes larger than the grid are clamped to the grid size. The
    /// result is recomputed only when the size differs from the last call.
    pub fn view(&mut self, width: usize, height: usize) -> ImgRef<'_, u32> {
        let width = width.min(self.width());
        let height = height.min(self.height());
        if self.view_size != Some((width, height)) {
            self.rescale(width, height);
            self.view_size = Some((width, height));
        }
        self.scaled.sub_image(0, 0, width, height)
    }

    /// Separable box reduction: columns first, then rows.
    fn rescale(&mut self, dst_w: usize, dst_h: usize) {
        let (src_w, src_h) = (self.width(), self.height());
        if dst_w == 0 || dst_h == 0 {
            return;
        }
        let cols = bucket_bounds(src_w, dst_w);
        let rows = bucket_bounds(src_h, dst_h);

        let mut column_sums = self.column_sums.sub_image_mut(0, 0, dst_w, src_h);
        for (src_row, dst_row) in self.counts.rows().zip(column_sums.rows_mut()) {
            for (c, dst) in dst_row.iter_mut().enumerate() {
                *dst = src_row[cols[c]..cols[c + 1]].iter().sum();
            }
        }

        let column_sums = self.column_sums.sub_image(0, 0, dst_w, src_h);
        let mut scaled = self.scaled.sub_image_mut(0, 0, dst_w, dst_h);
        for (r, dst_row) in scaled.rows_mut().enumerate() {
            dst_row.fill(0);
            for src_row in column_sums.rows().skip(rows[r]).take(rows[r + 1] - rows[r]) {
                for (dst, &src) in dst_row.iter_mut().zip(src_row) {
                    *dst += src;
                }
            }
        }
    }
}

/// Map an offset within `range` onto `0..len`, `None` when outside.
fn grid_coordinate(offset: f64, range: f64, len: usize) -> Option<usize> {
    let max = (len - 1) as f64;
    let pos = if range > 0.0 {
        (offset * max / range).round()
    } else {
        (max / 2.0).round()
    };
    (pos.is_finite() && pos >= 0.0 && pos <= max).then_some(pos as usize)
}

/// Boundaries `round(i * src / dst)` for `i` in `0..=dst`.
fn bucket_bounds(src: usize, dst: usize) -> Vec<usize> {
    let scale = src as f64 / dst as f64;
    (0..=dst)
        .map(|i| ((i as f64 * scale).round() as usize).min(src))
        .collect()
}
