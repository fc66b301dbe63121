//! CLI command implementations.

use std::path::Path;

use anyhow::{Context, Result};
use palette::{IntoColor, Lch, Srgb};
use scatter_opt::{CsvColumns, Design, OptimizerConfig, PointSet, WeightPreset, Weights};

use crate::{DataArgs, DesignArgs};

pub mod evaluate;
pub mod optimize;
pub mod render;

/// Load the optimizer config, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<OptimizerConfig> {
    let Some(path) = path else {
        return Ok(OptimizerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    OptimizerConfig::from_json(&text)
        .with_context(|| format!("Failed to parse config {}", path.display()))
}

/// Import the point set described by `args`.
pub fn load_points(args: &DataArgs, verbose: bool) -> Result<PointSet> {
    if verbose {
        eprintln!("Importing points from: {}", args.input.display());
    }

    let mut columns = CsvColumns::builder();
    if let Some(col) = &args.x_col {
        columns = columns.x_column(col);
    }
    if let Some(col) = &args.y_col {
        columns = columns.y_column(col);
    }
    if let Some(col) = &args.class_col {
        columns = columns.class_column(col);
    }
    if let Some(col) = &args.outlier_col {
        columns = columns.outlier_column(col);
    }

    let points = PointSet::from_csv(&args.input, &columns.build())
        .with_context(|| format!("Failed to import points from {}", args.input.display()))?;

    println!(
        "Loaded {} points in {} classes{}",
        points.total_points(),
        points.len(),
        if points.has_outliers() {
            " (with outliers)"
        } else {
            ""
        }
    );
    Ok(points)
}

/// Weights from `--weights` or `--preset`, defaulting to uniform.
pub fn parse_weights(weights: Option<Vec<f64>>, preset: Option<WeightPreset>) -> Result<Weights> {
    match (weights, preset) {
        (Some(w), _) => Weights::from_slice(&w).context("Invalid --weights"),
        (None, Some(preset)) => Ok(preset.weights()),
        (None, None) => Ok(Weights::uniform()),
    }
}

/// Build a design from command-line arguments.
pub fn design_from_args(args: &DesignArgs, points: &PointSet) -> Design {
    Design {
        width: args.width,
        height: args.height,
        marker: args.marker,
        marker_size: args.size,
        marker_opacity: args.opacity,
        colors: palette(points.effective_class_count()),
    }
}

/// `n` colors with equidistant LCH hues at lightness 50 and chroma 100,
/// clamped into sRGB.
pub fn palette(n: usize) -> Vec<[f32; 3]> {
    let n = n.max(1);
    (0..n)
        .map(|i| {
            let lch: Lch = Lch::new(50.0, 100.0, i as f32 * 360.0 / n as f32);
            let rgb: Srgb = lch.into_color();
            [rgb.red, rgb.green, rgb.blue].map(|v| v.clamp(0.0, 1.0))
        })
        .collect()
}
