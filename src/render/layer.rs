//! Per-class grayscale ink layer.
//!
//! A layer stamps the marker footprint at every occupied cell of the class's
//! [`PointCountGrid`] view (sparse shifted adds, one per opaque marker
//! pixel) and maps the resulting overlap counts through an exponential ink
//! lookup table. The output is a transmittance image: 255 where no marker
//! covers the pixel, falling towards 0 as markers pile up.

use std::collections::HashMap;
use std::sync::Arc;

use imgref::{ImgRef, ImgVec};

use super::grid::PointCountGrid;
use crate::data::Bounds;
use crate::design::Design;
use crate::error::{Error, Result};
use crate::marker::MarkerShape;

/// Upper bound on the overlap index stored per opacity level.
const MAX_LUT_LEN: usize = 65536;

/// Extra pixels left around the largest marker on each side.
const MARGIN: usize = 10;

/// Transmittance lookup for all 256 opacity levels.
///
/// `get(a, v) = round(255 * (1 - a/255)^v)`. Each table stops at the first
/// zero entry; indices past the end repeat the last value.
#[derive(Debug, Clone)]
pub struct InkLut {
    tables: Vec<Vec<u8>>,
}

impl InkLut {
    /// Precompute the tables.
    #[must_use]
    pub fn new() -> Self {
        let tables = (0..=255u8)
            .map(|a| {
                if a == 0 {
                    return vec![255];
                }
                let base = 1.0 - f64::from(a) / 255.0;
                let mut table = Vec::new();
                for v in 0..MAX_LUT_LEN {
                    let value = (255.0 * base.powi(v as i32)).round() as u8;
                    table.push(value);
                    if value == 0 {
                        break;
                    }
                }
                table
            })
            .collect();
        Self { tables }
    }

    /// Transmittance after `overlap` markers of opacity `opacity`.
    #[must_use]
    pub fn get(&self, opacity: u8, overlap: u32) -> u8 {
        let table = &self.tables[usize::from(opacity)];
        table
            .get(overlap as usize)
            .or_else(|| table.last())
            .copied()
            .unwrap_or(0)
    }

    /// Table for one opacity level.
    #[must_use]
    pub fn table(&self, opacity: u8) -> &[u8] {
        &self.tables[usize::from(opacity)]
    }
}

impl Default for InkLut {
    fn default() -> Self {
        Self::new()
    }
}

/// Design fields the overlap buffer depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    width: usize,
    height: usize,
    marker: MarkerShape,
    marker_size: u32,
}

impl Geometry {
    fn of(design: &Design) -> Self {
        Self {
            width: design.width,
            height: design.height,
            marker: design.marker,
            marker_size: design.marker_size,
        }
    }
}

/// Renders one class into a transmittance image.
pub struct ClassLayerRenderer {
    grid: PointCountGrid,
    lut: Arc<InkLut>,
    max: (usize, usize),
    max_marker_size: u32,
    padding: (usize, usize),
    offsets: HashMap<(MarkerShape, u32), Vec<(usize, usize)>>,
    overlap: ImgVec<u32>,
    image: ImgVec<u8>,
    image_f: ImgVec<f32>,
    geometry: Option<Geometry>,
    opacity: Option<u8>,
    point_count: usize,
}

impl ClassLayerRenderer {
    /// Allocate buffers for canvases up to `max_width × max_height`.
    ///
    /// Padding is sized so the largest of `markers` at `max_marker_size`
    /// never leaves the canvas.
    #[must_use]
    pub fn new(
        max_width: usize,
        max_height: usize,
        markers: &[MarkerShape],
        max_marker_size: u32,
        lut: Arc<InkLut>,
    ) -> Self {
        let (marker_w, marker_h) = markers
            .iter()
            .map(|m| m.dimensions(max_marker_size))
            .fold((0, 0), |(w, h), (mw, mh)| (w.max(mw), h.max(mh)));

        Self {
            grid: PointCountGrid::new(max_width, max_height),
            lut,
            max: (max_width, max_height),
            max_marker_size,
            padding: (marker_w + 2 * MARGIN, marker_h + 2 * MARGIN),
            offsets: HashMap::new(),
            overlap: ImgVec::new(vec![0; max_width * max_height], max_width, max_height),
            image: ImgVec::new(vec![255; max_width * max_height], max_width, max_height),
            image_f: ImgVec::new(vec![1.0; max_width * max_height], max_width, max_height),
            geometry: None,
            opacity: None,
            point_count: 0,
        }
    }

    /// Replace the class's points.
    pub fn set_points(&mut self, x: &[f64], y: &[f64], bounds: &Bounds) {
        self.grid.reset();
        self.grid.accumulate(x, y, bounds);
        self.point_count = if x.len() == y.len() { x.len() } else { 0 };
        self.geometry = None;
        self.opacity = None;
    }

    /// Number of points last set.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Canvas padding (x, y) reserved around the point area.
    #[must_use]
    pub fn padding(&self) -> (usize, usize) {
        self.padding
    }

    /// Check that `design` fits the preallocated canvas and padding.
    pub fn check_design(&self, design: &Design) -> Result<()> {
        if design.width == 0
            || design.height == 0
            || design.width > self.max.0
            || design.height > self.max.1
        {
            return Err(Error::CanvasTooLarge {
                requested: (design.width, design.height),
                max: self.max,
            });
        }
        if design.marker_size > self.max_marker_size {
            return Err(Error::InvalidRange {
                name: "marker_size".to_string(),
                reason: format!(
                    "{} exceeds the maximum of {}",
                    design.marker_size, self.max_marker_size
                ),
            });
        }
        Ok(())
    }

    /// Transmittance image for `design`, 0-255.
    ///
    /// The overlap buffer is rebuilt only when size or marker changed; the
    /// lookup is redone only when it was rebuilt or the opacity changed.
    pub fn render(&mut self, design: &Design) -> Result<ImgRef<'_, u8>> {
        self.check_design(design)?;
        self.update(design);
        Ok(self.image.sub_image(0, 0, design.width, design.height))
    }

    /// Transmittance image for `design`, normalized to 0.0-1.0.
    pub fn render_normalized(&mut self, design: &Design) -> Result<ImgRef<'_, f32>> {
        self.check_design(design)?;
        self.update(design);
        Ok(self.image_f.sub_image(0, 0, design.width, design.height))
    }

    fn update(&mut self, design: &Design) {
        let geometry = Geometry::of(design);
        if self.geometry != Some(geometry) {
            log::debug!(
                "Rebuilding overlap {}x{} {} size {}",
                design.width,
                design.height,
                design.marker,
                design.marker_size
            );
            self.update_overlap(geometry);
            self.geometry = Some(geometry);
            self.update_image(geometry, design.marker_opacity);
        } else if self.opacity != Some(design.marker_opacity) {
            self.update_image(geometry, design.marker_opacity);
        }
    }

    fn update_overlap(&mut self, geometry: Geometry) {
        let Geometry {
            width,
            height,
            marker,
            marker_size,
        } = geometry;
        let w = width.saturating_sub(self.padding.0);
        let h = height.saturating_sub(self.padding.1);

        let mut canvas = self.overlap.sub_image_mut(0, 0, width, height);
        for row in canvas.rows_mut() {
            row.fill(0);
        }
        if w == 0 || h == 0 {
            return;
        }

        let offsets = marker_offsets(&mut self.offsets, self.padding, marker, marker_size);
        let counts = self.grid.view(w, h);
        for &(dy, dx) in offsets.iter() {
            let mut target = canvas.sub_image_mut(dx, dy, counts.width(), counts.height());
            for (dst_row, src_row) in target.rows_mut().zip(counts.rows()) {
                for (dst, &src) in dst_row.iter_mut().zip(src_row) {
                    *dst = dst.saturating_add(src);
                }
            }
        }
    }

    fn update_image(&mut self, geometry: Geometry, opacity: u8) {
        let (width, height) = (geometry.width, geometry.height);
        let table = self.lut.table(opacity);
        let last = table.last().copied().unwrap_or(0);

        let overlap = self.overlap.sub_image(0, 0, width, height);
        let mut image = self.image.sub_image_mut(0, 0, width, height);
        let mut image_f = self.image_f.sub_image_mut(0, 0, width, height);
        for ((src_row, dst_row), dst_f_row) in
            overlap.rows().zip(image.rows_mut()).zip(image_f.rows_mut())
        {
            for ((&v, dst), dst_f) in src_row.iter().zip(dst_row.iter_mut()).zip(dst_f_row) {
                let t = table.get(v as usize).copied().unwrap_or(last);
                *dst = t;
                *dst_f = f32::from(t) / 255.0;
            }
        }
        self.opacity = Some(opacity);
    }
}

/// Opaque marker pixels as (row, column) canvas offsets, centered in the
/// padding. Cached per marker and size.
fn marker_offsets(
    cache: &mut HashMap<(MarkerShape, u32), Vec<(usize, usize)>>,
    padding: (usize, usize),
    marker: MarkerShape,
    size: u32,
) -> &Vec<(usize, usize)> {
    cache.entry((marker, size)).or_insert_with(|| {
        let Some(mask) = marker.opaque_mask(size) else {
            return Vec::new();
        };
        let (marker_w, marker_h) = marker.dimensions(size);
        let offset_x = padding.0.saturating_sub(marker_w) / 2;
        let offset_y = padding.1.saturating_sub(marker_h) / 2;
        mask.rows()
            .enumerate()
            .flat_map(|(y, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(_, opaque)| **opaque)
                    .map(move |(x, _)| (y + offset_y, x + offset_x))
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer(max: usize) -> ClassLayerRenderer {
        ClassLayerRenderer::new(max, max, &MarkerShape::ALL, 6, Arc::new(InkLut::new()))
    }

    fn design(size: usize, marker_size: u32, opacity: u8) -> Design {
        Design {
            width: size,
            height: size,
            marker: MarkerShape::Square,
            marker_size,
            marker_opacity: opacity,
            colors: vec![[0.0, 0.0, 0.0]],
        }
    }

    #[test]
    fn test_lut_monotonic_and_starts_opaque() {
        let lut = InkLut::new();
        for a in 1..=255u8 {
            assert_eq!(lut.get(a, 0), 255, "a = {a}");
            let table = lut.table(a);
            assert!(table.windows(2).all(|w| w[1] <= w[0]), "a = {a}");
            assert_eq!(*table.last().unwrap(), 0, "a = {a}");
            assert_eq!(lut.get(a, 1_000_000), 0);
        }
        assert_eq!(lut.get(0, 0), 255);
        assert_eq!(lut.get(0, 500), 255);
    }

    #[test]
    fn test_lut_values() {
        let lut = InkLut::new();
        assert_eq!(lut.get(255, 1), 0);
        let expected = (255.0 * (1.0 - 128.0 / 255.0_f64)).round() as u8;
        assert_eq!(lut.get(128, 1), expected);
    }

    #[test]
    fn test_single_point_stamps_marker() {
        let mut layer = renderer(64);
        layer.set_points(&[0.5], &[0.5], &Bounds::new(0.0, 0.0, 1.0, 1.0));
        let d = design(64, 3, 255);

        let image: Vec<u8> = layer.render(&d).unwrap().pixels().collect();
        let inked = image.iter().filter(|&&p| p == 0).count();
        assert_eq!(inked, 9);
        assert_eq!(image.iter().filter(|&&p| p == 255).count(), 64 * 64 - 9);
    }

    #[test]
    fn test_overlapping_points_darken() {
        let mut layer = renderer(64);
        layer.set_points(&[0.5, 0.5], &[0.5, 0.5], &Bounds::new(0.0, 0.0, 1.0, 1.0));
        let d = design(64, 1, 100);

        let min = layer.render(&d).unwrap().pixels().min().unwrap();
        assert_eq!(min, InkLut::new().get(100, 2));
    }

    #[test]
    fn test_opacity_change_reuses_overlap() {
        let mut layer = renderer(48);
        layer.set_points(&[0.2, 0.8], &[0.3, 0.7], &Bounds::new(0.0, 0.0, 1.0, 1.0));

        let light: Vec<u8> = layer.render(&design(48, 4, 50)).unwrap().pixels().collect();
        let dark: Vec<u8> = layer.render(&design(48, 4, 200)).unwrap().pixels().collect();
        let light_again: Vec<u8> = layer.render(&design(48, 4, 50)).unwrap().pixels().collect();

        assert_eq!(light, light_again);
        assert!(dark.iter().zip(&light).all(|(d, l)| d <= l));
        assert!(dark.iter().zip(&light).any(|(d, l)| d < l));
    }

    #[test]
    fn test_color_change_does_not_invalidate() {
        let mut layer = renderer(32);
        layer.set_points(&[0.5], &[0.5], &Bounds::new(0.0, 0.0, 1.0, 1.0));
        let mut d = design(32, 2, 128);
        layer.render(&d).unwrap();
        let geometry = layer.geometry;

        d.colors = vec![[1.0, 0.0, 0.0]];
        layer.render(&d).unwrap();
        assert_eq!(layer.geometry, geometry);
        assert_eq!(layer.opacity, Some(128));
    }

    #[test]
    fn test_normalized_matches_bytes() {
        let mut layer = renderer(32);
        layer.set_points(&[0.1, 0.9], &[0.5, 0.5], &Bounds::new(0.0, 0.0, 1.0, 1.0));
        let d = design(32, 3, 90);
        let bytes: Vec<u8> = layer.render(&d).unwrap().pixels().collect();
        let floats: Vec<f32> = layer.render_normalized(&d).unwrap().pixels().collect();
        for (b, f) in bytes.iter().zip(&floats) {
            assert!((f32::from(*b) / 255.0 - f).abs() < 1e-6);
        }
    }

    #[test]
    fn test_canvas_smaller_than_padding_is_blank() {
        let mut layer = renderer(64);
        layer.set_points(&[0.5], &[0.5], &Bounds::new(0.0, 0.0, 1.0, 1.0));
        let d = design(10, 3, 255);
        assert!(layer.render(&d).unwrap().pixels().all(|p| p == 255));
    }

    #[test]
    fn test_oversized_design_is_rejected() {
        let mut layer = ClassLayerRenderer::new(32, 32, &MarkerShape::ALL, 6, Arc::new(InkLut::new()));
        layer.set_points(&[0.5], &[0.5], &Bounds::new(0.0, 0.0, 1.0, 1.0));

        let wide = Design {
            width: 64,
            ..design(32, 3, 128)
        };
        assert!(matches!(
            layer.render(&wide),
            Err(Error::CanvasTooLarge { requested: (64, 32), max: (32, 32) })
        ));
        assert!(matches!(
            layer.render_normalized(&wide),
            Err(Error::CanvasTooLarge { .. })
        ));
        assert!(matches!(
            layer.render(&design(32, 7, 128)),
            Err(Error::InvalidRange { .. })
        ));
        assert!(matches!(
            layer.render(&design(0, 3, 128)),
            Err(Error::CanvasTooLarge { .. })
        ));
        assert!(layer.render(&design(32, 3, 128)).is_ok());
    }

    #[test]
    fn test_zero_size_marker_leaves_layer_blank() {
        let mut layer = renderer(32);
        layer.set_points(&[0.5], &[0.5], &Bounds::new(0.0, 0.0, 1.0, 1.0));
        assert!(layer.render(&design(32, 0, 255)).unwrap().pixels().all(|p| p == 255));
    }
}
