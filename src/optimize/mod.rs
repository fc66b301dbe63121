//! Design scoring and search.
//!
//! - [`DesignEvaluator`]: renders a design and computes its ten measures
//! - [`MeasureCache`]: raw measures per design fingerprint plus the running
//!   separability ranges used for normalization
//! - [`Sweep`]: batched evaluation of a whole design space
//! - [`SweepReport`]: JSON/CSV output of a finished sweep

pub mod cache;
pub mod evaluator;
pub mod report;
pub mod sweep;

pub use cache::{
    Evaluation, MEASURE_COUNT, Measure, MeasureCache, Measures, RunningRange, WeightPreset,
    Weights,
};
pub use evaluator::DesignEvaluator;
pub use report::{EvaluatedDesign, MeasureValue, SweepReport};
pub use sweep::{Sweep, SweepOutcome, SweepProgress, SweepStatus};
