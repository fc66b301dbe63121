//! Optimizer configuration.
//!
//! All types deserialize from JSON with every field optional, so a config
//! file only needs to name the values it overrides.

use serde::{Deserialize, Serialize};

use crate::marker::MarkerShape;

/// Preallocation limits for the renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Largest canvas width any design may request.
    pub max_width: usize,
    /// Largest canvas height any design may request.
    pub max_height: usize,
    /// Largest marker size any design may request.
    pub max_marker_size: u32,
    /// Registered marker shapes.
    pub markers: Vec<MarkerShape>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_width: 800,
            max_height: 600,
            max_marker_size: 16,
            markers: MarkerShape::ALL.to_vec(),
        }
    }
}

/// Windowed SSIM parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsimConfig {
    /// Window edge in pixels.
    pub window_size: usize,
    /// Cap on the longer image edge before windowing.
    pub max_long_edge: usize,
    /// Cap on the shorter image edge before windowing.
    pub max_short_edge: usize,
}

impl Default for SsimConfig {
    fn default() -> Self {
        Self {
            window_size: 16,
            max_long_edge: 512,
            max_short_edge: 256,
        }
    }
}

/// Perceived-ellipse pipeline parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EllipseConfig {
    /// Scale applied to the layer before edge detection.
    pub downscale: f64,
    /// Gaussian blur sigma (5x5 kernel).
    pub blur_sigma: f64,
    /// Lower hysteresis threshold.
    pub canny_low: f32,
    /// Upper hysteresis threshold.
    pub canny_high: f32,
    /// Axis length in standard deviations.
    pub axis_scale: f64,
}

impl Default for EllipseConfig {
    fn default() -> Self {
        Self {
            downscale: 0.25,
            blur_sigma: 1.0,
            canny_low: 0.1 * 255.0,
            canny_high: 0.2 * 255.0,
            axis_scale: 1.5,
        }
    }
}

/// Measure targets and metric parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Target mean opacity of inked pixels.
    pub desired_opacity: f64,
    /// Target opacity standard deviation.
    pub desired_contrast: f64,
    /// Similarity metric parameters.
    pub ssim: SsimConfig,
    /// Ellipse fit parameters.
    pub ellipse: EllipseConfig,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            desired_opacity: 0.5,
            desired_contrast: 0.5,
            ssim: SsimConfig::default(),
            ellipse: EllipseConfig::default(),
        }
    }
}

/// Complete optimizer configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Renderer limits.
    pub render: RenderConfig,
    /// Evaluation parameters.
    pub eval: EvalConfig,
}

impl OptimizerConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> OptimizerConfigBuilder {
        OptimizerConfigBuilder::default()
    }

    /// Parse a JSON config.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Builder for [`OptimizerConfig`].
#[derive(Debug, Default)]
pub struct OptimizerConfigBuilder {
    max_size: Option<(usize, usize)>,
    max_marker_size: Option<u32>,
    markers: Option<Vec<MarkerShape>>,
    desired_opacity: Option<f64>,
    desired_contrast: Option<f64>,
    ssim: Option<SsimConfig>,
    ellipse: Option<EllipseConfig>,
}

impl OptimizerConfigBuilder {
    /// Set the largest canvas any design may request.
    #[must_use]
    pub fn max_canvas(mut self, width: usize, height: usize) -> Self {
        self.max_size = Some((width, height));
        self
    }

    /// Set the largest marker size.
    #[must_use]
    pub fn max_marker_size(mut self, size: u32) -> Self {
        self.max_marker_size = Some(size);
        self
    }

    /// Set the registered marker shapes.
    #[must_use]
    pub fn markers(mut self, markers: Vec<MarkerShape>) -> Self {
        self.markers = Some(markers);
        self
    }

    /// Set the target mean opacity.
    #[must_use]
    pub fn desired_opacity(mut self, value: f64) -> Self {
        self.desired_opacity = Some(value);
        self
    }

    /// Set the target contrast.
    #[must_use]
    pub fn desired_contrast(mut self, value: f64) -> Self {
        self.desired_contrast = Some(value);
        self
    }

    /// Set the similarity metric parameters.
    #[must_use]
    pub fn ssim(mut self, ssim: SsimConfig) -> Self {
        self.ssim = Some(ssim);
        self
    }

    /// Set the ellipse fit parameters.
    #[must_use]
    pub fn ellipse(mut self, ellipse: EllipseConfig) -> Self {
        self.ellipse = Some(ellipse);
        self
    }

    /// Build the configuration, filling unset values with defaults.
    #[must_use]
    pub fn build(self) -> OptimizerConfig {
        let render_defaults = RenderConfig::default();
        let eval_defaults = EvalConfig::default();
        let (max_width, max_height) = self
            .max_size
            .unwrap_or((render_defaults.max_width, render_defaults.max_height));

        OptimizerConfig {
            render: RenderConfig {
                max_width,
                max_height,
                max_marker_size: self
                    .max_marker_size
                    .unwrap_or(render_defaults.max_marker_size),
                markers: self.markers.unwrap_or(render_defaults.markers),
            },
            eval: EvalConfig {
                desired_opacity: self
                    .desired_opacity
                    .unwrap_or(eval_defaults.desired_opacity),
                desired_contrast: self
                    .desired_contrast
                    .unwrap_or(eval_defaults.desired_contrast),
                ssim: self.ssim.unwrap_or_default(),
                ellipse: self.ellipse.unwrap_or_default(),
            },
        }
    }
}
