//! Single-design evaluation command.

use std::sync::Arc;

use anyhow::{Context, Result};
use scatter_opt::{DesignEvaluator, Measure, OptimizerConfig, Weights};

use super::{design_from_args, load_points};
use crate::{DataArgs, DesignArgs};

pub fn run(
    config: OptimizerConfig,
    data: &DataArgs,
    design: &DesignArgs,
    weights: Weights,
    verbose: bool,
) -> Result<()> {
    let points = load_points(data, verbose)?;
    let design = design_from_args(design, &points);

    let mut evaluator = DesignEvaluator::new(config);
    evaluator.set_data(Arc::new(points));
    let evaluation = evaluator
        .evaluate_weighted(&design, Some(&weights))
        .context("Failed to evaluate design")?;

    println!(
        "{}x{} {} size {} opacity {}",
        design.width, design.height, design.marker, design.marker_size, design.marker_opacity
    );
    for measure in Measure::ALL {
        println!(
            "  {:<24} {:.4}",
            measure.name(),
            evaluation.measures[measure.index()]
        );
    }
    println!("Score: {:.4}", evaluation.score);

    if verbose {
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
    }

    Ok(())
}
