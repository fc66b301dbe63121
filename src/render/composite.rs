//! Multi-class compositing.

use std::sync::Arc;

use imgref::{ImgRef, ImgRefMut, ImgVec};
use rgb::{RGB, RGBA8};

use super::layer::{ClassLayerRenderer, InkLut};
use crate::config::RenderConfig;
use crate::data::{ClassLabel, PointSet};
use crate::design::Design;
use crate::error::{Error, Result};

/// Gamma applied to colors before blending.
pub const GAMMA: f32 = 2.2;

struct Layer {
    label: ClassLabel,
    renderer: ClassLayerRenderer,
}

/// Composites one [`ClassLayerRenderer`] per class into RGBA images and
/// alpha channels.
///
/// Layers are blended in class insertion order with gamma-corrected
/// premultiplied "over" compositing, so the result depends on that order
/// where layers overlap.
pub struct CompositeRenderer {
    config: RenderConfig,
    lut: Arc<InkLut>,
    layers: Vec<Layer>,
    sums: ImgVec<RGB<f32>>,
    inv_alpha: ImgVec<f32>,
    output: ImgVec<RGBA8>,
}

impl CompositeRenderer {
    /// Allocate buffers for the configured maximum canvas.
    #[must_use]
    pub fn new(config: RenderConfig) -> Self {
        Self::with_lut(config, Arc::new(InkLut::new()))
    }

    /// Like [`CompositeRenderer::new`] with a shared lookup table.
    #[must_use]
    pub fn with_lut(config: RenderConfig, lut: Arc<InkLut>) -> Self {
        let (w, h) = (config.max_width, config.max_height);
        Self {
            config,
            lut,
            layers: Vec::new(),
            sums: ImgVec::new(vec![RGB::new(0.0, 0.0, 0.0); w * h], w, h),
            inv_alpha: ImgVec::new(vec![1.0; w * h], w, h),
            output: ImgVec::new(vec![RGBA8::new(0, 0, 0, 0); w * h], w, h),
        }
    }

    /// Renderer limits.
    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Shared ink lookup table.
    #[must_use]
    pub fn lut(&self) -> &Arc<InkLut> {
        &self.lut
    }

    /// Load a dataset.
    ///
    /// Existing layer renderers are recycled by position; missing ones are
    /// allocated and surplus ones dropped.
    pub fn set_data(&mut self, data: &PointSet) {
        let bounds = data.bounds();
        let mut free: Vec<ClassLayerRenderer> =
            self.layers.drain(..).rev().map(|l| l.renderer).collect();
        let reused = free.len().min(data.len());

        for class in data.classes() {
            let mut renderer = match free.pop() {
                Some(renderer) => renderer,
                None => self.new_layer(),
            };
            renderer.set_points(&class.x, &class.y, &bounds);
            self.layers.push(Layer {
                label: class.label,
                renderer,
            });
        }
        log::debug!(
            "Loaded {} layers ({reused} reused, {} dropped)",
            self.layers.len(),
            free.len()
        );
    }

    fn new_layer(&self) -> ClassLayerRenderer {
        ClassLayerRenderer::new(
            self.config.max_width,
            self.config.max_height,
            &self.config.markers,
            self.config.max_marker_size,
            Arc::clone(&self.lut),
        )
    }

    /// Class labels in compositing order.
    pub fn labels(&self) -> impl Iterator<Item = ClassLabel> + '_ {
        self.layers.iter().map(|l| l.label)
    }

    /// Number of layers.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Whether a layer exists for `label`.
    #[must_use]
    pub fn has_layer(&self, label: ClassLabel) -> bool {
        self.layers.iter().any(|l| l.label == label)
    }

    /// Number of points in the layer for `label`.
    #[must_use]
    pub fn point_count(&self, label: ClassLabel) -> usize {
        self.layers
            .iter()
            .find(|l| l.label == label)
            .map_or(0, |l| l.renderer.point_count())
    }

    /// Check that `design` fits the preallocated buffers.
    pub fn check_design(&self, design: &Design) -> Result<()> {
        let max = (self.config.max_width, self.config.max_height);
        if design.width == 0
            || design.height == 0
            || design.width > max.0
            || design.height > max.1
        {
            return Err(Error::CanvasTooLarge {
                requested: (design.width, design.height),
                max,
            });
        }
        if design.marker_size < 1 {
            return Err(Error::InvalidRange {
                name: "marker_size".to_string(),
                reason: "marker size must be at least 1".to_string(),
            });
        }
        if design.marker_size > self.config.max_marker_size {
            return Err(Error::InvalidRange {
                name: "marker_size".to_string(),
                reason: format!(
                    "{} exceeds the maximum of {}",
                    design.marker_size, self.config.max_marker_size
                ),
            });
        }
        if !self.config.markers.contains(&design.marker) {
            return Err(Error::UnknownMarker(design.marker.to_string()));
        }
        Ok(())
    }

    /// Transmittance image of one layer, `None` if no such label.
    pub fn layer_image(
        &mut self,
        label: ClassLabel,
        design: &Design,
    ) -> Result<Option<ImgRef<'_, u8>>> {
        self.check_design(design)?;
        self.layers
            .iter_mut()
            .find(|l| l.label == label)
            .map(|l| l.renderer.render(design))
            .transpose()
    }

    /// Composite all layers into an RGBA image.
    pub fn render(&mut self, design: &Design) -> Result<ImgRef<'_, RGBA8>> {
        self.check_design(design)?;
        let (width, height) = (design.width, design.height);

        let mut sums = self.sums.sub_image_mut(0, 0, width, height);
        let mut inv_alpha = self.inv_alpha.sub_image_mut(0, 0, width, height);
        for row in sums.rows_mut() {
            row.fill(RGB::new(0.0, 0.0, 0.0));
        }
        for row in inv_alpha.rows_mut() {
            row.fill(1.0);
        }

        for (index, layer) in self.layers.iter_mut().enumerate() {
            let [r, g, b] = design.color(index);
            let color = RGB::new(r.powf(GAMMA), g.powf(GAMMA), b.powf(GAMMA));
            let transmittance = layer.renderer.render_normalized(design)?;

            for ((t_row, sum_row), inv_row) in transmittance
                .rows()
                .zip(sums.rows_mut())
                .zip(inv_alpha.rows_mut())
            {
                for ((&t, sum), inv) in t_row.iter().zip(sum_row.iter_mut()).zip(inv_row) {
                    let weight = (1.0 - t) * *inv;
                    sum.r += color.r * weight;
                    sum.g += color.g * weight;
                    sum.b += color.b * weight;
                    *inv *= t;
                }
            }
        }

        let sums = self.sums.sub_image(0, 0, width, height);
        let inv_alpha = self.inv_alpha.sub_image(0, 0, width, height);
        let mut output = self.output.sub_image_mut(0, 0, width, height);
        for ((out_row, sum_row), inv_row) in output
            .rows_mut()
            .zip(sums.rows())
            .zip(inv_alpha.rows())
        {
            for ((out, sum), &inv) in out_row.iter_mut().zip(sum_row).zip(inv_row) {
                let alpha = 1.0 - inv;
                let channel = |c: f32| {
                    if alpha > 0.0 {
                        to_u8((c / alpha).powf(1.0 / GAMMA))
                    } else {
                        0
                    }
                };
                *out = RGBA8::new(channel(sum.r), channel(sum.g), channel(sum.b), to_u8(alpha));
            }
        }

        Ok(self.output.sub_image(0, 0, width, height))
    }

    /// Combined opacity of all layers, 0-255.
    pub fn alpha_channel(&mut self, design: &Design) -> Result<ImgVec<u8>> {
        let mut alpha = ImgVec::new(vec![0; design.width * design.height], design.width, design.height);
        self.alpha_channel_into(design, None, alpha.as_mut())?;
        Ok(alpha)
    }

    /// Combined opacity of all layers except `label`, 0-255.
    pub fn alpha_channel_excluding(
        &mut self,
        design: &Design,
        label: ClassLabel,
    ) -> Result<ImgVec<u8>> {
        let mut alpha = ImgVec::new(vec![0; design.width * design.height], design.width, design.height);
        self.alpha_channel_into(design, Some(label), alpha.as_mut())?;
        Ok(alpha)
    }

    /// Write the combined opacity into `dst`, optionally leaving one layer
    /// out.
    ///
    /// With a single contributing layer the result is exactly
    /// `255 - transmittance`.
    pub fn alpha_channel_into(
        &mut self,
        design: &Design,
        exclude: Option<ClassLabel>,
        mut dst: ImgRefMut<'_, u8>,
    ) -> Result<()> {
        self.check_design(design)?;
        let (width, height) = (design.width, design.height);
        if (dst.width(), dst.height()) != (width, height) {
            return Err(Error::DimensionMismatch {
                expected: (width, height),
                actual: (dst.width(), dst.height()),
            });
        }

        let mut included = self
            .layers
            .iter_mut()
            .filter(|l| Some(l.label) != exclude)
            .collect::<Vec<_>>();

        match included.as_mut_slice() {
            [] => {
                for row in dst.rows_mut() {
                    row.fill(0);
                }
            }
            [only] => {
                let image = only.renderer.render(design)?;
                for (dst_row, src_row) in dst.rows_mut().zip(image.rows()) {
                    for (d, &t) in dst_row.iter_mut().zip(src_row) {
                        *d = 255 - t;
                    }
                }
            }
            layers => {
                let mut product = self.inv_alpha.sub_image_mut(0, 0, width, height);
                for row in product.rows_mut() {
                    row.fill(1.0);
                }
                for layer in layers.iter_mut() {
                    let transmittance = layer.renderer.render_normalized(design)?;
                    for (p_row, t_row) in product.rows_mut().zip(transmittance.rows()) {
                        for (p, &t) in p_row.iter_mut().zip(t_row) {
                            *p *= t;
                        }
                    }
                }
                let product = self.inv_alpha.sub_image(0, 0, width, height);
                for (dst_row, p_row) in dst.rows_mut().zip(product.rows()) {
                    for (d, &p) in dst_row.iter_mut().zip(p_row) {
                        *d = to_u8(1.0 - p);
                    }
                }
            }
        }
        Ok(())
    }
}

fn to_u8(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OUTLIER_LABEL;
    use crate::marker::MarkerShape;

    fn config() -> RenderConfig {
        RenderConfig {
            max_width: 64,
            max_height: 48,
            max_marker_size: 6,
            markers: MarkerShape::ALL.to_vec(),
        }
    }

    fn design(opacity: u8, colors: Vec<[f32; 3]>) -> Design {
        Design {
            width: 60,
            height: 40,
            marker: MarkerShape::Circle,
            marker_size: 5,
            marker_opacity: opacity,
            colors,
        }
    }

    fn two_classes() -> PointSet {
        PointSet::from_rows(
            (0..40)
                .map(|i| (f64::from(i) / 40.0, f64::from(i % 7) / 7.0, 0))
                .chain((0..30).map(|i| (f64::from(i % 5) / 5.0, f64::from(i) / 30.0, 1))),
        )
    }

    #[test]
    fn test_single_class_alpha_equals_layer() {
        let mut renderer = CompositeRenderer::new(config());
        renderer.set_data(&PointSet::from_rows(
            (0..50).map(|i| (f64::from(i), f64::from(i * i % 17), 0)),
        ));
        let d = design(90, vec![[0.2, 0.4, 0.6]]);

        let layer: Vec<u8> = renderer.layer_image(0, &d).unwrap().unwrap().pixels().collect();
        let rendered: Vec<u8> = renderer.render(&d).unwrap().pixels().map(|p| p.a).collect();
        let alpha: Vec<u8> = renderer.alpha_channel(&d).unwrap().pixels().collect();

        for ((&t, &a_render), &a_channel) in layer.iter().zip(&rendered).zip(&alpha) {
            assert_eq!(a_channel, 255 - t);
            assert_eq!(a_render, 255 - t);
        }
        assert!(layer.iter().any(|&t| t < 255));
    }

    #[test]
    fn test_single_layer_keeps_its_color() {
        let mut renderer = CompositeRenderer::new(config());
        renderer.set_data(&PointSet::from_rows([(0.0, 0.0, 0), (1.0, 1.0, 0)]));
        let d = design(255, vec![[1.0, 0.0, 0.6]]);

        let image = renderer.render(&d).unwrap();
        let inked: Vec<RGBA8> = image.pixels().filter(|p| p.a > 0).collect();
        assert!(!inked.is_empty());
        for p in inked {
            assert_eq!(p.r, 255);
            assert_eq!(p.g, 0);
            assert_eq!(p.b, 153);
        }
        assert!(image.pixels().filter(|p| p.a == 0).all(|p| p.r == 0 && p.g == 0 && p.b == 0));
    }

    #[test]
    fn test_alpha_excluding_drops_one_layer() {
        let mut renderer = CompositeRenderer::new(config());
        renderer.set_data(&two_classes());
        let d = design(120, vec![[0.0, 0.0, 0.0]]);

        let full = renderer.alpha_channel(&d).unwrap();
        let without_0 = renderer.alpha_channel_excluding(&d, 0).unwrap();
        let layer_1: Vec<u8> = renderer.layer_image(1, &d).unwrap().unwrap().pixels().collect();

        for (&a, &t) in without_0.pixels().collect::<Vec<_>>().iter().zip(&layer_1) {
            assert_eq!(a, 255 - t);
        }
        assert!(full.pixels().zip(without_0.pixels()).all(|(f, w)| f >= w));
        assert!(full.pixels().zip(without_0.pixels()).any(|(f, w)| f > w));

        let unchanged = renderer.alpha_channel_excluding(&d, OUTLIER_LABEL).unwrap();
        assert_eq!(unchanged.buf(), full.buf());
    }

    #[test]
    fn test_oversized_design_is_rejected() {
        let mut renderer = CompositeRenderer::new(config());
        renderer.set_data(&two_classes());
        let mut d = design(100, vec![]);
        d.width = 65;
        assert!(matches!(renderer.render(&d), Err(Error::CanvasTooLarge { .. })));

        let mut d = design(100, vec![]);
        d.marker_size = 7;
        assert!(matches!(renderer.alpha_channel(&d), Err(Error::InvalidRange { .. })));

        d.marker_size = 0;
        assert!(matches!(renderer.render(&d), Err(Error::InvalidRange { .. })));
    }

    #[test]
    fn test_set_data_recycles_layers() {
        let mut renderer = CompositeRenderer::new(config());
        renderer.set_data(&two_classes());
        assert_eq!(renderer.layer_count(), 2);
        assert_eq!(renderer.point_count(1), 30);

        renderer.set_data(&PointSet::from_rows([(0.0, 0.0, 5)]));
        assert_eq!(renderer.labels().collect::<Vec<_>>(), vec![5]);
        assert_eq!(renderer.point_count(5), 1);
        assert!(!renderer.has_layer(0));

        let d = design(255, vec![]);
        let alpha = renderer.alpha_channel(&d).unwrap();
        assert!(alpha.pixels().any(|a| a == 255));
    }

    #[test]
    fn test_alpha_into_checks_dimensions() {
        let mut renderer = CompositeRenderer::new(config());
        renderer.set_data(&two_classes());
        let d = design(100, vec![]);
        let mut small = ImgVec::new(vec![0u8; 4], 2, 2);
        assert!(matches!(
            renderer.alpha_channel_into(&d, None, small.as_mut()),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
