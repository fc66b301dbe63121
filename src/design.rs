//! Design values and design-space enumeration.
//!
//! A [`Design`] is one candidate rendering configuration. A [`DesignSpace`]
//! expands three parameter ranges (aspect ratio, marker size, marker
//! opacity) into batches of designs, one batch per (aspect, size) pair.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::marker::MarkerShape;

/// One candidate rendering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Design {
    /// Canvas width in pixels.
    pub width: usize,
    /// Canvas height in pixels.
    pub height: usize,
    /// Marker shape.
    pub marker: MarkerShape,
    /// Marker size in pixels.
    pub marker_size: u32,
    /// Marker opacity, 0-255.
    pub marker_opacity: u8,
    /// Gamma-encoded RGB colors (0.0-1.0), assigned to layers in class order and
    /// reused cyclically.
    pub colors: Vec<[f32; 3]>,
}

impl Design {
    /// Canonical serialization used as the evaluation cache key.
    pub fn fingerprint(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Color of the `index`-th layer, black when no colors are set.
    #[must_use]
    pub fn color(&self, index: usize) -> [f32; 3] {
        if self.colors.is_empty() {
            [0.0; 3]
        } else {
            self.colors[index % self.colors.len()]
        }
    }
}

/// Inclusive numeric range expanded with a fixed step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeSpec {
    /// First value.
    pub min: f64,
    /// Upper limit, included when hit by a step.
    pub max: f64,
    /// Increment.
    pub step: f64,
}

impl RangeSpec {
    /// Create a range.
    #[must_use]
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    /// A range holding the single value `value`.
    #[must_use]
    pub fn fixed(value: f64) -> Self {
        Self::new(value, value, 1.0)
    }

    /// Values `min, min + step, ...` up to and including `max`.
    pub fn values(&self, name: &str) -> Result<Vec<f64>> {
        let invalid = |reason: &str| Error::InvalidRange {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if !(self.min.is_finite() && self.max.is_finite() && self.step.is_finite()) {
            return Err(invalid("bounds and step must be finite"));
        }
        if self.step <= 0.0 {
            return Err(invalid("step must be positive"));
        }
        if self.min > self.max {
            return Err(invalid("min is greater than max"));
        }

        let count = ((self.max - self.min) / self.step + 1e-9).floor() as usize + 1;
        Ok((0..count).map(|i| self.min + i as f64 * self.step).collect())
    }
}

/// Convert an aspect "diff" to a width/height ratio.
///
/// Negative diffs give portrait ratios `1 / (1 - diff)`, others landscape
/// ratios `1 + diff`, so `0` is square and the scale is symmetric.
#[must_use]
pub fn aspect_diff_to_ratio(diff: f64) -> f64 {
    if diff < 0.0 {
        1.0 / (1.0 - diff)
    } else {
        1.0 + diff
    }
}

/// Inverse of [`aspect_diff_to_ratio`].
#[must_use]
pub fn aspect_ratio_to_diff(ratio: f64) -> f64 {
    if ratio < 1.0 {
        1.0 - 1.0 / ratio
    } else {
        ratio - 1.0
    }
}

/// Largest canvas with the given ratio inside `max_width × max_height`.
///
/// Height fills the available space first; width is shrunk to fit when
/// needed. Both sides are at least one pixel.
#[must_use]
pub fn fit_aspect(ratio: f64, max_width: usize, max_height: usize) -> (usize, usize) {
    let mut height = max_height;
    let mut width = (ratio * height as f64).round() as usize;
    if width > max_width {
        width = max_width;
        height = (width as f64 / ratio).round() as usize;
    }
    (width.max(1), height.clamp(1, max_height.max(1)))
}

/// Parameter ranges of one optimization sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignSpace {
    /// Aspect diffs (see [`aspect_diff_to_ratio`]).
    pub aspect: RangeSpec,
    /// Marker sizes in pixels.
    pub marker_size: RangeSpec,
    /// Marker opacities, 0-255.
    pub marker_opacity: RangeSpec,
    /// Marker shape shared by all designs.
    pub marker: MarkerShape,
    /// Layer colors shared by all designs.
    pub colors: Vec<[f32; 3]>,
    /// Available canvas width.
    pub max_width: usize,
    /// Available canvas height.
    pub max_height: usize,
}

impl DesignSpace {
    /// Default sweep ranges for a canvas of the given size.
    #[must_use]
    pub fn new(max_width: usize, max_height: usize) -> Self {
        Self {
            aspect: RangeSpec::new(-0.6, 0.6, 0.2),
            marker_size: RangeSpec::new(2.0, 12.0, 2.0),
            marker_opacity: RangeSpec::new(15.0, 255.0, 15.0),
            marker: MarkerShape::Circle,
            colors: vec![[0.0, 0.0, 0.0]],
            max_width,
            max_height,
        }
    }

    /// Expand into batches grouped by (aspect, marker size), each varying
    /// the opacity.
    pub fn batches(&self) -> Result<Vec<Vec<Design>>> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(Error::EmptyDesignSpace);
        }
        let aspects = self.aspect.values("aspect")?;
        let sizes = self.marker_size.values("marker_size")?;
        let opacities = self.marker_opacity.values("marker_opacity")?;

        if sizes.iter().any(|&s| s < 1.0) {
            return Err(Error::InvalidRange {
                name: "marker_size".to_string(),
                reason: "sizes must be at least 1".to_string(),
            });
        }
        if opacities.iter().any(|&a| !(0.0..=255.0).contains(&a)) {
            return Err(Error::InvalidRange {
                name: "marker_opacity".to_string(),
                reason: "opacities must lie in 0-255".to_string(),
            });
        }

        let mut batches = Vec::with_capacity(aspects.len() * sizes.len());
        for &aspect in &aspects {
            let (width, height) =
                fit_aspect(aspect_diff_to_ratio(aspect), self.max_width, self.max_height);
            for &size in &sizes {
                let batch = opacities
                    .iter()
                    .map(|&opacity| Design {
                        width,
                        height,
                        marker: self.marker,
                        marker_size: size.round() as u32,
                        marker_opacity: opacity.round() as u8,
                        colors: self.colors.clone(),
                    })
                    .collect();
                batches.push(batch);
            }
        }

        if batches.is_empty() {
            return Err(Error::EmptyDesignSpace);
        }
        Ok(batches)
    }

    /// All designs in sweep order.
    pub fn designs(&self) -> Result<Vec<Design>> {
        Ok(self.batches()?.into_iter().flatten().collect())
    }
}
