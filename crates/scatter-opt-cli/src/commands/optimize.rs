//! Design-space optimization command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use scatter_opt::{
    DesignEvaluator, DesignSpace, MarkerShape, OptimizerConfig, RangeSpec, Sweep, SweepReport,
    Weights,
};

use super::{load_points, palette};
use crate::DataArgs;

/// Design-space axes from the command line.
pub struct SpaceArgs {
    pub width: usize,
    pub height: usize,
    pub marker: MarkerShape,
    pub aspect: RangeSpec,
    pub sizes: RangeSpec,
    pub opacities: RangeSpec,
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    mut config: OptimizerConfig,
    data: &DataArgs,
    space_args: SpaceArgs,
    weights: Weights,
    parallel: bool,
    report: Option<PathBuf>,
    csv: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let points = load_points(data, verbose)?;

    // Grow the preallocated buffers to cover the requested space.
    config.render.max_width = config.render.max_width.max(space_args.width);
    config.render.max_height = config.render.max_height.max(space_args.height);
    config.render.max_marker_size = config
        .render
        .max_marker_size
        .max(space_args.sizes.max.ceil().max(0.0) as u32);

    let space = DesignSpace {
        aspect: space_args.aspect,
        marker_size: space_args.sizes,
        marker_opacity: space_args.opacities,
        marker: space_args.marker,
        colors: palette(points.effective_class_count()),
        max_width: space_args.width,
        max_height: space_args.height,
    };

    let mut evaluator = DesignEvaluator::new(config);
    evaluator.set_data(Arc::new(points));

    let sweep = Sweep::new(&space, weights, &evaluator).context("Invalid design space")?;
    let total = sweep.progress().total;
    println!(
        "Evaluating {} designs{}",
        total,
        if parallel { " in parallel" } else { "" }
    );

    let on_progress = |p: scatter_opt::SweepProgress| {
        if verbose {
            eprintln!("  {}/{}", p.evaluated, p.total);
        }
    };
    let outcome = if parallel {
        sweep.run_parallel(&mut evaluator, on_progress)?
    } else {
        sweep.run(&mut evaluator, on_progress)?
    };

    let best = &outcome.design;
    println!("Best design (score {:.4}):", outcome.evaluation.score);
    println!("  canvas:  {}x{}", best.width, best.height);
    println!("  marker:  {} size {}", best.marker, best.marker_size);
    println!("  opacity: {}", best.marker_opacity);
    println!("Measures:");
    for (measure, value) in scatter_opt::Measure::ALL
        .iter()
        .zip(outcome.evaluation.measures.iter())
    {
        println!("  {:<24} {:.4}", measure.name(), value);
    }

    if report.is_some() || csv.is_some() {
        let summary = SweepReport::new(&outcome, &evaluator, &weights);
        if let Some(path) = report {
            summary
                .write_json(&path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("Saved report to: {}", path.display());
        }
        if let Some(path) = csv {
            summary
                .write_csv(&path)
                .with_context(|| format!("Failed to write CSV to {}", path.display()))?;
            println!("Saved designs to: {}", path.display());
        }
    }

    Ok(())
}
