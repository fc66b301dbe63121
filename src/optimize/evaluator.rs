//! Design scoring.

use std::collections::HashMap;
use std::sync::Arc;

use imgref::ImgVec;

use super::cache::{Evaluation, Measure, MeasureCache, Measures, Weights, MEASURE_COUNT};
use crate::config::{EvalConfig, OptimizerConfig};
use crate::data::{Bounds, ClassLabel, OUTLIER_LABEL, PointSet};
use crate::design::Design;
use crate::error::Result;
use crate::metrics::{EllipseDetector, EllipseFit, WindowedSsim, fit_points};
use crate::render::{CompositeRenderer, InkLut};

/// Renders designs for one dataset and scores them against the ten quality
/// measures.
///
/// Raw measures are cached per design fingerprint until the dataset
/// changes. Scores normalize the two separability measures with the
/// running range over all cached designs at the time of the call.
///
/// # Example
///
/// ```rust,ignore
/// use scatter_opt::{DesignEvaluator, OptimizerConfig, PointSet, Weights};
///
/// let mut evaluator = DesignEvaluator::new(OptimizerConfig::default());
/// evaluator.set_data(PointSet::from_rows(rows).into());
///
/// let best = evaluator.find_best(&designs, Some(&Weights::uniform()))?;
/// ```
pub struct DesignEvaluator {
    config: OptimizerConfig,
    renderer: CompositeRenderer,
    ssim: WindowedSsim,
    ellipse: EllipseDetector,
    cache: MeasureCache,
    data: Arc<PointSet>,
    data_ellipses: HashMap<ClassLabel, Option<EllipseFit>>,
    alpha: ImgVec<u8>,
    alpha_without: ImgVec<u8>,
    generation: u64,
    renders: usize,
}

impl DesignEvaluator {
    /// Create an evaluator with no data loaded.
    #[must_use]
    pub fn new(config: OptimizerConfig) -> Self {
        Self::with_lut(config, Arc::new(InkLut::new()))
    }

    /// Like [`DesignEvaluator::new`] with a shared lookup table.
    #[must_use]
    pub fn with_lut(config: OptimizerConfig, lut: Arc<InkLut>) -> Self {
        let (w, h) = (config.render.max_width, config.render.max_height);
        Self {
            renderer: CompositeRenderer::with_lut(config.render.clone(), lut),
            ssim: WindowedSsim::new(config.eval.ssim),
            ellipse: EllipseDetector::new(config.eval.ellipse),
            cache: MeasureCache::new(),
            data: Arc::new(PointSet::new(Bounds::new(0.0, 0.0, 0.0, 0.0))),
            data_ellipses: HashMap::new(),
            alpha: ImgVec::new(vec![0; w * h], w, h),
            alpha_without: ImgVec::new(vec![0; w * h], w, h),
            generation: 0,
            renders: 0,
            config,
        }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Evaluation parameters in use.
    #[must_use]
    pub fn eval_config(&self) -> &EvalConfig {
        &self.config.eval
    }

    /// Current dataset.
    #[must_use]
    pub fn data(&self) -> &Arc<PointSet> {
        &self.data
    }

    /// Shared ink lookup table.
    #[must_use]
    pub fn lut(&self) -> &Arc<InkLut> {
        self.renderer.lut()
    }

    /// Mutable access to the renderer, e.g. to export a composite image.
    pub fn renderer_mut(&mut self) -> &mut CompositeRenderer {
        &mut self.renderer
    }

    /// Cached measures.
    #[must_use]
    pub fn cache(&self) -> &MeasureCache {
        &self.cache
    }

    /// Mutable cache access for merging worker results.
    pub fn cache_mut(&mut self) -> &mut MeasureCache {
        &mut self.cache
    }

    /// Incremented on every dataset change.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of designs rendered and measured so far (cache misses).
    #[must_use]
    pub fn render_count(&self) -> usize {
        self.renders
    }

    /// Load a new dataset, invalidating every cached result.
    pub fn set_data(&mut self, data: Arc<PointSet>) {
        self.renderer.set_data(&data);
        let axis_scale = self.config.eval.ellipse.axis_scale;
        self.data_ellipses = data
            .classes()
            .iter()
            .filter(|c| !c.is_outlier())
            .map(|c| (c.label, fit_points(&c.x, &c.y, axis_scale)))
            .collect();
        self.data = data;
        self.generation += 1;
        self.reset();
    }

    /// Clear the cache and the running separability ranges.
    pub fn reset(&mut self) {
        if !self.cache.is_empty() {
            log::info!("Clearing {} cached evaluations", self.cache.len());
        }
        self.cache.clear();
    }

    /// Check that `design` fits the preallocated buffers.
    pub fn check_design(&self, design: &Design) -> Result<()> {
        self.renderer.check_design(design)
    }

    /// Raw (unnormalized) measures of `design`, rendering it on a cache miss.
    pub fn evaluate(&mut self, design: &Design) -> Result<Measures> {
        let fingerprint = design.fingerprint()?;
        if let Some(measures) = self.cache.get(&fingerprint) {
            log::debug!("Cache hit for {fingerprint}");
            return Ok(*measures);
        }

        log::debug!("Cache miss for {fingerprint}");
        let measures = self.compute_measures(design)?;
        self.renders += 1;
        self.cache.insert(fingerprint, design.clone(), measures);
        Ok(measures)
    }

    /// Measures of `design` with the separability entries normalized, and
    /// their score.
    pub fn evaluate_weighted(
        &mut self,
        design: &Design,
        weights: Option<&Weights>,
    ) -> Result<Evaluation> {
        let measures = self.evaluate(design)?;
        Ok(self.cache.evaluation(&measures, weights))
    }

    /// Evaluate every design, then return the lowest-scoring cached one.
    pub fn find_best(
        &mut self,
        designs: &[Design],
        weights: Option<&Weights>,
    ) -> Result<Option<(Design, Evaluation)>> {
        for design in designs {
            self.evaluate(design)?;
        }
        Ok(self.best(weights))
    }

    /// Lowest-scoring cached design.
    #[must_use]
    pub fn best(&self, weights: Option<&Weights>) -> Option<(Design, Evaluation)> {
        self.cache.best(weights)
    }

    fn compute_measures(&mut self, design: &Design) -> Result<Measures> {
        self.renderer.check_design(design)?;
        let data = Arc::clone(&self.data);
        let (width, height) = (design.width, design.height);
        let n = data.inlier_points() as f64;
        let class_weight = |len: usize| if n > 0.0 { len as f64 / n } else { 0.0 };

        let mut m: Measures = [0.0; MEASURE_COUNT];

        // Perceived correlation
        let (mut angle_error, mut ratio_error) = (0.0, 0.0);
        for class in data.classes().iter().filter(|c| !c.is_outlier()) {
            let perceived = match self.renderer.layer_image(class.label, design)? {
                Some(image) => self.ellipse.perceived(image),
                None => None,
            };
            let expected = self.data_ellipses.get(&class.label).copied().flatten();
            let (angle, ratio) = match (perceived, expected) {
                (Some(p), Some(d)) => (p.angle_error(&d), p.axis_ratio_error(&d)),
                _ => (1.0, 1.0),
            };
            let weight = class_weight(class.len());
            angle_error += weight * angle;
            ratio_error += weight * ratio;
        }
        m[Measure::AngleError.index()] = angle_error;
        m[Measure::AxisRatioError.index()] = ratio_error;

        // Image quality
        self.renderer
            .alpha_channel_into(design, None, self.alpha.sub_image_mut(0, 0, width, height))?;
        let alpha = self.alpha.sub_image(0, 0, width, height);

        let (mut non_zero, mut sum, mut squared_sum) = (0u64, 0u64, 0u64);
        for row in alpha.rows() {
            for &a in row {
                let a = u64::from(a);
                non_zero += u64::from(a > 0);
                sum += a;
                squared_sum += a * a;
            }
        }
        let (non_zero, sum, squared_sum) = (non_zero as f64, sum as f64, squared_sum as f64);

        let (mean_opacity, contrast) = if non_zero > 0.0 {
            let mean = sum / non_zero / 255.0;
            let variance = (squared_sum / 65025.0 - non_zero * mean * mean).abs() / non_zero;
            (mean, variance.sqrt())
        } else {
            (0.0, 0.0)
        };
        let marker_pixels = design.marker.opaque_pixel_count(design.marker_size) as f64;
        let ink_capacity = marker_pixels * n;
        let alpha_capacity = f64::from(design.marker_opacity) * ink_capacity;

        m[Measure::MeanOpacity.index()] = mean_opacity;
        m[Measure::Contrast.index()] = contrast;
        m[Measure::OpacityDeviation.index()] =
            (self.config.eval.desired_opacity - mean_opacity).abs();
        m[Measure::ContrastDeviation.index()] =
            (self.config.eval.desired_contrast - contrast).abs();
        m[Measure::PointOverlap.index()] = if ink_capacity > 0.0 {
            1.0 - non_zero / ink_capacity
        } else {
            1.0
        };
        m[Measure::Overplotting.index()] = if alpha_capacity > 0.0 {
            1.0 - sum / alpha_capacity
        } else {
            1.0
        };

        // Class and outlier separability
        let layers = self.renderer.layer_count();
        let has_outliers = self.renderer.has_layer(OUTLIER_LABEL);
        if layers > 1 {
            if has_outliers {
                self.renderer.alpha_channel_into(
                    design,
                    Some(OUTLIER_LABEL),
                    self.alpha_without.sub_image_mut(0, 0, width, height),
                )?;
                let without = self.alpha_without.sub_image(0, 0, width, height);
                m[Measure::OutlierSeparability.index()] = self.ssim.compute(alpha, without)?;
            }

            if !has_outliers || layers > 2 {
                let mut separability = 0.0;
                for class in data.classes().iter().filter(|c| !c.is_outlier()) {
                    self.renderer.alpha_channel_into(
                        design,
                        Some(class.label),
                        self.alpha_without.sub_image_mut(0, 0, width, height),
                    )?;
                    let without = self.alpha_without.sub_image(0, 0, width, height);
                    separability += class_weight(class.len()) * self.ssim.compute(alpha, without)?;
                }
                m[Measure::ClassSeparability.index()] = separability;
            }
        }

        for value in &mut m {
            *value = if value.is_finite() { value.clamp(0.0, 1.0) } else { 1.0 };
        }
        Ok(m)
    }
}
