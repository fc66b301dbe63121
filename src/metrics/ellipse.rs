//! Principal-axis ellipse fitting.
//!
//! [`fit_points`] fits the covariance ellipse of a point cloud. The
//! [`EllipseDetector`] does the same for the *perceived* shape of a rendered
//! layer: the image is downscaled, blurred and run through Canny edge
//! detection, and the ellipse is fitted to the edge pixels.

use image::GrayImage;
use imgref::ImgRef;
use serde::{Deserialize, Serialize};

use crate::config::EllipseConfig;
use crate::imgops::{canny, eigen_symmetric_2x2, gaussian_blur, load_gray, resize_area};

/// Covariance ellipse of a point cloud.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipseFit {
    /// Angle of the major axis from the x-axis, degrees in `[0, 180]`.
    pub angle: f64,
    /// Major axis length.
    pub major_axis: f64,
    /// Minor axis length.
    pub minor_axis: f64,
}

impl EllipseFit {
    /// Minor over major axis, 1 for a degenerate ellipse.
    #[must_use]
    pub fn axis_ratio(&self) -> f64 {
        if self.major_axis > 0.0 {
            self.minor_axis / self.major_axis
        } else {
            1.0
        }
    }

    /// Circular angle difference to `other`, scaled to `[0, 1]`.
    #[must_use]
    pub fn angle_error(&self, other: &Self) -> f64 {
        let diff = (self.angle - other.angle).abs();
        diff.min(180.0 - diff) / 90.0
    }

    /// Absolute difference of axis ratios.
    #[must_use]
    pub fn axis_ratio_error(&self, other: &Self) -> f64 {
        (self.axis_ratio() - other.axis_ratio()).abs()
    }
}

/// Fit the covariance ellipse of `(x, y)`.
///
/// Uses the sample covariance, so at least two points are needed. Axis
/// lengths are `axis_scale` standard deviations along each principal axis.
#[must_use]
pub fn fit_points(x: &[f64], y: &[f64], axis_scale: f64) -> Option<EllipseFit> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }
    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (&px, &py) in x.iter().zip(y) {
        let (dx, dy) = (px - mean_x, py - mean_y);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let denom = nf - 1.0;
    let eigen = eigen_symmetric_2x2(sxx / denom, sxy / denom, syy / denom);

    let mut major = eigen.vectors[0];
    if major[1] < 0.0 {
        major = [-major[0], -major[1]];
    }
    let fit = EllipseFit {
        angle: major[0].clamp(-1.0, 1.0).acos().to_degrees(),
        major_axis: axis_scale * eigen.values[0].max(0.0).sqrt(),
        minor_axis: axis_scale * eigen.values[1].max(0.0).sqrt(),
    };
    fit.angle.is_finite().then_some(fit)
}

/// Fits ellipses to the edges of rendered layers.
#[derive(Debug, Clone, Default)]
pub struct EllipseDetector {
    config: EllipseConfig,
    layer: GrayImage,
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl EllipseDetector {
    /// Create a detector.
    #[must_use]
    pub fn new(config: EllipseConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Perceived ellipse of a layer image, `None` when no edges are found.
    pub fn perceived(&mut self, image: ImgRef<'_, u8>) -> Option<EllipseFit> {
        let scale = self.config.downscale;
        if image.width() == 0 || image.height() == 0 {
            return None;
        }
        let w = ((image.width() as f64 * scale).round() as usize).max(1);
        let h = ((image.height() as f64 * scale).round() as usize).max(1);

        load_gray(image, &mut self.layer);
        let small = resize_area(&self.layer, w, h);
        let blurred = gaussian_blur(&small, self.config.blur_sigma as f32);
        let edges = canny(&blurred, self.config.canny_low, self.config.canny_high);

        self.xs.clear();
        self.ys.clear();
        for (col, row, pixel) in edges.enumerate_pixels() {
            if pixel.0[0] > 0 {
                self.xs.push(f64::from(col));
                self.ys.push((h - row as usize) as f64);
            }
        }
        if self.xs.is_empty() {
            return None;
        }
        fit_points(&self.xs, &self.ys, self.config.axis_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgref::ImgVec;

    /// Deterministic elongated cloud along the x-axis.
    fn cloud() -> (Vec<f64>, Vec<f64>) {
        let x = (0..200).map(|i| f64::from(i) * 0.1 - 10.0).collect::<Vec<_>>();
        let y = (0..200)
            .map(|i| ((f64::from(i) * 1.7).sin()) * 1.5)
            .collect::<Vec<_>>();
        (x, y)
    }

    fn rotate(x: &[f64], y: &[f64], degrees: f64) -> (Vec<f64>, Vec<f64>) {
        let (s, c) = degrees.to_radians().sin_cos();
        x.iter()
            .zip(y)
            .map(|(&px, &py)| (c * px - s * py, s * px + c * py))
            .unzip()
    }

    #[test]
    fn test_fit_axis_aligned_cloud() {
        let (x, y) = cloud();
        let fit = fit_points(&x, &y, 1.5).unwrap();
        let angle_from_axis = fit.angle.min(180.0 - fit.angle);
        assert!(angle_from_axis < 2.0, "{}", fit.angle);
        assert!(fit.major_axis > fit.minor_axis);
        assert!(fit.axis_ratio() < 0.5);
    }

    #[test]
    fn test_fit_rotation_invariance() {
        let (x, y) = cloud();
        let base = fit_points(&x, &y, 1.5).unwrap();

        for theta in [15.0, 45.0, 90.0, 130.0, 200.0] {
            let (rx, ry) = rotate(&x, &y, theta);
            let fit = fit_points(&rx, &ry, 1.5).unwrap();

            let expected = (base.angle + theta).rem_euclid(180.0);
            let diff = (fit.angle - expected).abs();
            assert!(diff.min(180.0 - diff) < 1e-6, "theta {theta}: {} vs {expected}", fit.angle);
            assert!((fit.major_axis - base.major_axis).abs() < 1e-9);
            assert!((fit.minor_axis - base.minor_axis).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fit_needs_two_points() {
        assert!(fit_points(&[1.0], &[2.0], 1.5).is_none());
        assert!(fit_points(&[1.0, 2.0], &[2.0], 1.5).is_none());
        let degenerate = fit_points(&[1.0, 1.0], &[2.0, 2.0], 1.5).unwrap();
        assert!((degenerate.axis_ratio() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_angle_error_wraps() {
        let a = EllipseFit {
            angle: 5.0,
            major_axis: 2.0,
            minor_axis: 1.0,
        };
        let b = EllipseFit {
            angle: 175.0,
            major_axis: 4.0,
            minor_axis: 1.0,
        };
        assert!((a.angle_error(&b) - 10.0 / 90.0).abs() < 1e-12);
        assert!((a.axis_ratio_error(&b) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_perceived_blank_image_has_no_ellipse() {
        let blank = ImgVec::new(vec![255u8; 64 * 64], 64, 64);
        let mut detector = EllipseDetector::default();
        assert!(detector.perceived(blank.as_ref()).is_none());
    }

    #[test]
    fn test_perceived_diagonal_blob() {
        // Dark ellipse rising to the right on a white background.
        let size = 160usize;
        let c = size as f64 / 2.0;
        let pixels = (0..size * size)
            .map(|i| {
                let (col, row) = ((i % size) as f64 - c, (i / size) as f64 - c);
                let (x, y) = (col, -row);
                let u = (x + y) / 2f64.sqrt();
                let v = (x - y) / 2f64.sqrt();
                if (u / 60.0).powi(2) + (v / 15.0).powi(2) <= 1.0 { 0 } else { 255 }
            })
            .collect();
        let image = ImgVec::new(pixels, size, size);

        let fit = EllipseDetector::default().perceived(image.as_ref()).unwrap();
        assert!((fit.angle - 45.0).abs() < 10.0, "{}", fit.angle);
        assert!(fit.axis_ratio() < 0.6);
    }
}
