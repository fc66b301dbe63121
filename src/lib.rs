//! # scatter-opt
//!
//! Scatterplot design optimization.
//!
//! Given labeled 2-D points, this library renders the data under many
//! candidate designs (canvas aspect ratio, marker shape, size and opacity,
//! class colors), scores each rendering against ten perceptual quality
//! measures, and returns the design with the lowest weighted score.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use scatter_opt::{DesignEvaluator, DesignSpace, OptimizerConfig, PointSet, Sweep, Weights};
//!
//! let config = OptimizerConfig::builder().max_canvas(640, 480).build();
//! let mut evaluator = DesignEvaluator::new(config);
//! evaluator.set_data(Arc::new(PointSet::from_csv("points.csv", &Default::default())?));
//!
//! let space = DesignSpace::new(640, 480);
//! let outcome = Sweep::new(&space, Weights::uniform(), &evaluator)?
//!     .run(&mut evaluator, |p| println!("{}/{}", p.evaluated, p.total))?;
//! println!("best score {:.3}: {:?}", outcome.evaluation.score, outcome.design);
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`config`]: Renderer limits and metric parameters
//! - [`data`]: Labeled point sets and CSV import
//! - [`design`]: Design values and design-space enumeration
//! - [`marker`]: Registered marker shapes
//! - [`render`]: Count grids, class layers and compositing
//! - [`metrics`]: Windowed SSIM and ellipse fitting
//! - [`optimize`]: Evaluation cache, scoring, sweeps and reports
//! - [`imgops`]: Grayscale image primitives

pub mod config;
pub mod data;
pub mod design;
pub mod error;
pub mod imgops;
pub mod marker;
pub mod metrics;
pub mod optimize;
pub mod render;

// Re-export commonly used types
pub use config::{EllipseConfig, EvalConfig, OptimizerConfig, RenderConfig, SsimConfig};
pub use data::{Bounds, ClassLabel, ClassPoints, CsvColumns, OUTLIER_LABEL, PointSet};
pub use design::{Design, DesignSpace, RangeSpec};
pub use error::{Error, Result};
pub use marker::MarkerShape;
pub use metrics::{EllipseFit, WindowedSsim};
pub use optimize::{
    DesignEvaluator, Evaluation, MEASURE_COUNT, Measure, MeasureCache, Measures, Sweep,
    SweepOutcome, SweepProgress, SweepReport, SweepStatus, WeightPreset, Weights,
};
pub use render::{ClassLayerRenderer, CompositeRenderer, PointCountGrid};
