//! Windowed mean SSIM between grayscale images.
//!
//! Images are first brought down to a bounded resolution, then split into
//! square windows aligned to the bottom-right corner (leftover rows and
//! columns at the top and left are dropped). Each window pair yields one
//! SSIM value from its means, variances and covariance; the result is the
//! arithmetic mean over windows, clamped to `[0, 1]`.

use image::GrayImage;
use imgref::ImgRef;

use crate::config::SsimConfig;
use crate::error::{Error, Result};
use crate::imgops::{load_gray, resize_area};

const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

/// SSIM calculator with reusable downscale buffers.
#[derive(Debug, Clone, Default)]
pub struct WindowedSsim {
    config: SsimConfig,
    full_a: GrayImage,
    full_b: GrayImage,
}

impl WindowedSsim {
    /// Create a calculator.
    #[must_use]
    pub fn new(config: SsimConfig) -> Self {
        Self {
            config,
            full_a: GrayImage::default(),
            full_b: GrayImage::default(),
        }
    }

    /// Parameters in use.
    #[must_use]
    pub fn config(&self) -> &SsimConfig {
        &self.config
    }

    /// Size both images are reduced to before windowing.
    #[must_use]
    pub fn working_size(&self, width: usize, height: usize) -> (usize, usize) {
        let long = width.max(height) as f64;
        let short = width.min(height) as f64;
        let factor = (self.config.max_long_edge as f64 / long)
            .min(self.config.max_short_edge as f64 / short);
        if factor < 1.0 {
            (
                ((width as f64 * factor + 1e-9).floor() as usize).max(1),
                ((height as f64 * factor + 1e-9).floor() as usize).max(1),
            )
        } else {
            (width, height)
        }
    }

    /// Mean SSIM of `a` and `b`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the images differ in size.
    pub fn compute(&mut self, a: ImgRef<'_, u8>, b: ImgRef<'_, u8>) -> Result<f64> {
        let (width, height) = (a.width(), a.height());
        if (b.width(), b.height()) != (width, height) {
            return Err(Error::DimensionMismatch {
                expected: (width, height),
                actual: (b.width(), b.height()),
            });
        }
        if width == 0 || height == 0 {
            return Ok(1.0);
        }

        let (w, h) = self.working_size(width, height);
        if (w, h) == (width, height) {
            return Ok(self.mean_over_windows(a, b));
        }

        load_gray(a, &mut self.full_a);
        load_gray(b, &mut self.full_b);
        let small_a = resize_area(&self.full_a, w, h);
        let small_b = resize_area(&self.full_b, w, h);
        Ok(self.mean_over_windows(
            ImgRef::new(small_a.as_raw(), w, h),
            ImgRef::new(small_b.as_raw(), w, h),
        ))
    }

    fn mean_over_windows(&self, a: ImgRef<'_, u8>, b: ImgRef<'_, u8>) -> f64 {
        let (width, height) = (a.width(), a.height());
        let size = self.config.window_size.max(1);
        if width < size || height < size {
            return window_ssim(a, b).clamp(0.0, 1.0);
        }

        let (x0, y0) = (width % size, height % size);
        let mut total = 0.0;
        let mut count = 0usize;
        for top in (y0..height).step_by(size) {
            for left in (x0..width).step_by(size) {
                let wa = a.sub_image(left, top, size, size);
                let wb = b.sub_image(left, top, size, size);
                total += window_ssim(wa, wb);
                count += 1;
            }
        }
        (total / count as f64).clamp(0.0, 1.0)
    }
}

/// SSIM of two equally sized windows.
fn window_ssim(a: ImgRef<'_, u8>, b: ImgRef<'_, u8>) -> f64 {
    let n = (a.width() * a.height()) as f64;
    let (mut sum_a, mut sum_b) = (0.0, 0.0);
    let (mut sum_aa, mut sum_bb, mut sum_ab) = (0.0, 0.0, 0.0);
    for (row_a, row_b) in a.rows().zip(b.rows()) {
        for (&pa, &pb) in row_a.iter().zip(row_b) {
            let (pa, pb) = (f64::from(pa), f64::from(pb));
            sum_a += pa;
            sum_b += pb;
            sum_aa += pa * pa;
            sum_bb += pb * pb;
            sum_ab += pa * pb;
        }
    }

    let mean_a = sum_a / n;
    let mean_b = sum_b / n;
    let var_a = (sum_aa / n - mean_a * mean_a).max(0.0);
    let var_b = (sum_bb / n - mean_b * mean_b).max(0.0);
    let cov = sum_ab / n - mean_a * mean_b;

    ((2.0 * mean_a * mean_b + C1) * (2.0 * cov + C2))
        / ((mean_a * mean_a + mean_b * mean_b + C1) * (var_a + var_b + C2))
}

/// Mean SSIM with default parameters.
pub fn mean_ssim(a: ImgRef<'_, u8>, b: ImgRef<'_, u8>) -> Result<f64> {
    WindowedSsim::default().compute(a, b)
}
