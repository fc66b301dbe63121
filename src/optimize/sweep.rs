//! Batched design-space sweeps.
//!
//! A [`Sweep`] holds the batches of one design space. It can be driven one
//! batch at a time with [`Sweep::step`] (cooperative scheduling: the caller
//! regains control between batches), run to completion with
//! [`Sweep::run`], or spread across threads with [`Sweep::run_parallel`].
//!
//! A sweep remembers the evaluator's data generation at creation. If the
//! dataset changes between steps the evaluator has already dropped its
//! cache, and the sweep reports itself cancelled instead of scoring designs
//! against the new data.

use std::collections::VecDeque;
use std::time::Instant;

use rayon::prelude::*;

use super::cache::{Evaluation, MeasureCache, Weights};
use super::evaluator::DesignEvaluator;
use crate::design::{Design, DesignSpace};
use crate::error::{Error, Result};

/// Progress of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepProgress {
    /// Designs evaluated so far.
    pub evaluated: usize,
    /// Designs in the sweep.
    pub total: usize,
}

/// State after one [`Sweep::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStatus {
    /// Batches remain.
    InProgress,
    /// Every batch was evaluated.
    Finished,
    /// The dataset changed; remaining batches were dropped.
    Cancelled,
}

/// Best design of a finished sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutcome {
    /// Lowest-scoring design.
    pub design: Design,
    /// Its normalized measures and score.
    pub evaluation: Evaluation,
    /// Number of designs in the sweep.
    pub evaluated: usize,
}

/// Queue of design batches for one optimization pass.
#[derive(Debug, Clone)]
pub struct Sweep {
    batches: VecDeque<Vec<Design>>,
    weights: Weights,
    total: usize,
    evaluated: usize,
    generation: u64,
}

impl Sweep {
    /// Expand `space` and validate every design against the evaluator's
    /// buffers.
    ///
    /// # Errors
    ///
    /// Fails on invalid ranges, an empty space, or a design that does not
    /// fit the preallocated canvas.
    pub fn new(space: &DesignSpace, weights: Weights, evaluator: &DesignEvaluator) -> Result<Self> {
        Self::from_batches(space.batches()?, weights, evaluator)
    }

    /// Sweep over explicit batches.
    pub fn from_batches(
        batches: Vec<Vec<Design>>,
        weights: Weights,
        evaluator: &DesignEvaluator,
    ) -> Result<Self> {
        for design in batches.iter().flatten() {
            evaluator.check_design(design)?;
        }
        let total = batches.iter().map(Vec::len).sum();
        if total == 0 {
            return Err(Error::EmptyDesignSpace);
        }
        log::info!("Sweeping {total} designs in {} batches", batches.len());
        Ok(Self {
            batches: batches.into(),
            weights,
            total,
            evaluated: 0,
            generation: evaluator.generation(),
        })
    }

    /// Current progress.
    #[must_use]
    pub fn progress(&self) -> SweepProgress {
        SweepProgress {
            evaluated: self.evaluated,
            total: self.total,
        }
    }

    /// Weights used for the final selection.
    #[must_use]
    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// Evaluate the next batch.
    pub fn step(&mut self, evaluator: &mut DesignEvaluator) -> Result<SweepStatus> {
        if evaluator.generation() != self.generation {
            if !self.batches.is_empty() {
                log::info!(
                    "Dataset changed, cancelling sweep after {} of {} designs",
                    self.evaluated,
                    self.total
                );
                self.batches.clear();
            }
            return Ok(SweepStatus::Cancelled);
        }
        let Some(batch) = self.batches.pop_front() else {
            return Ok(SweepStatus::Finished);
        };
        for design in &batch {
            evaluator.evaluate(design)?;
        }
        self.evaluated += batch.len();

        Ok(if self.batches.is_empty() {
            SweepStatus::Finished
        } else {
            SweepStatus::InProgress
        })
    }

    /// Best design so far under the sweep's weights.
    #[must_use]
    pub fn best(&self, evaluator: &DesignEvaluator) -> Option<(Design, Evaluation)> {
        evaluator.best(Some(&self.weights))
    }

    /// Evaluate all batches in order, reporting progress after each.
    pub fn run(
        mut self,
        evaluator: &mut DesignEvaluator,
        mut on_progress: impl FnMut(SweepProgress),
    ) -> Result<SweepOutcome> {
        let start = Instant::now();
        loop {
            match self.step(evaluator)? {
                SweepStatus::InProgress => on_progress(self.progress()),
                SweepStatus::Finished => {
                    on_progress(self.progress());
                    break;
                }
                SweepStatus::Cancelled => {
                    return Err(Error::SweepCancelled {
                        evaluated: self.evaluated,
                        total: self.total,
                    });
                }
            }
        }
        log::info!(
            "Sweep finished: {} designs in {:.2?}",
            self.total,
            start.elapsed()
        );
        self.finish(evaluator)
    }

    /// Evaluate batches on the rayon pool.
    ///
    /// Each worker owns its own evaluator (renderer, metric buffers and
    /// cache) built from the main evaluator's config and dataset. Worker
    /// results are merged into the main cache in batch order; designs
    /// already cached are skipped.
    pub fn run_parallel(
        mut self,
        evaluator: &mut DesignEvaluator,
        mut on_progress: impl FnMut(SweepProgress),
    ) -> Result<SweepOutcome> {
        if evaluator.generation() != self.generation {
            return Err(Error::SweepCancelled {
                evaluated: self.evaluated,
                total: self.total,
            });
        }
        let start = Instant::now();
        let config = evaluator.config().clone();
        let data = evaluator.data().clone();
        let lut = evaluator.lut().clone();

        let mut pending: Vec<Vec<Design>> = Vec::with_capacity(self.batches.len());
        for batch in self.batches.drain(..) {
            let mut todo = Vec::with_capacity(batch.len());
            for design in batch {
                if evaluator.cache().contains(&design.fingerprint()?) {
                    self.evaluated += 1;
                } else {
                    todo.push(design);
                }
            }
            if !todo.is_empty() {
                pending.push(todo);
            }
        }

        let results: Vec<Result<(usize, MeasureCache)>> = pending
            .into_par_iter()
            .map_init(
                || {
                    let mut worker = DesignEvaluator::with_lut(config.clone(), lut.clone());
                    worker.set_data(data.clone());
                    worker
                },
                |worker, batch| {
                    let mut cache = MeasureCache::new();
                    for design in &batch {
                        let measures = worker.evaluate(design)?;
                        cache.insert(design.fingerprint()?, design.clone(), measures);
                    }
                    Ok((batch.len(), cache))
                },
            )
            .collect();

        for result in results {
            let (count, cache) = result?;
            evaluator.cache_mut().merge(cache);
            self.evaluated += count;
            on_progress(self.progress());
        }
        log::info!(
            "Parallel sweep finished: {} designs in {:.2?}",
            self.total,
            start.elapsed()
        );
        self.finish(evaluator)
    }

    fn finish(&self, evaluator: &DesignEvaluator) -> Result<SweepOutcome> {
        let (design, evaluation) = self.best(evaluator).ok_or(Error::EmptyDesignSpace)?;
        log::info!("Best design scores {:.4}", evaluation.score);
        Ok(SweepOutcome {
            design,
            evaluation,
            evaluated: self.evaluated,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::OptimizerConfig;
    use crate::data::PointSet;
    use crate::design::RangeSpec;

    fn evaluator() -> DesignEvaluator {
        let config = OptimizerConfig::builder()
            .max_canvas(80, 60)
            .max_marker_size(6)
            .build();
        let mut evaluator = DesignEvaluator::new(config);
        evaluator.set_data(Arc::new(PointSet::from_rows((0..50).map(|i| {
            let t = f64::from(i);
            (t, (t * 0.3).sin() + t * 0.05, i32::from(i % 2 == 0))
        }))));
        evaluator
    }

    fn space() -> DesignSpace {
        DesignSpace {
            aspect: RangeSpec::new(0.0, 0.2, 0.2),
            marker_size: RangeSpec::new(2.0, 4.0, 2.0),
            marker_opacity: RangeSpec::new(100.0, 200.0, 100.0),
            ..DesignSpace::new(80, 60)
        }
    }

    #[test]
    fn test_step_until_finished() {
        let mut evaluator = evaluator();
        let mut sweep = Sweep::new(&space(), Weights::uniform(), &evaluator).unwrap();
        assert_eq!(sweep.progress(), SweepProgress { evaluated: 0, total: 8 });

        let mut steps = 0;
        while sweep.step(&mut evaluator).unwrap() == SweepStatus::InProgress {
            steps += 1;
        }
        assert_eq!(steps, 3);
        assert_eq!(sweep.progress().evaluated, 8);
        assert_eq!(evaluator.cache().len(), 8);
        assert_eq!(sweep.step(&mut evaluator).unwrap(), SweepStatus::Finished);
    }

    #[test]
    fn test_data_change_cancels() {
        let mut evaluator = evaluator();
        let mut sweep = Sweep::new(&space(), Weights::uniform(), &evaluator).unwrap();
        assert_eq!(sweep.step(&mut evaluator).unwrap(), SweepStatus::InProgress);

        let data = evaluator.data().clone();
        evaluator.set_data(data);
        assert_eq!(sweep.step(&mut evaluator).unwrap(), SweepStatus::Cancelled);
        assert!(evaluator.cache().is_empty());
    }

    #[test]
    fn test_oversized_space_fails_at_setup() {
        let evaluator = evaluator();
        let big = DesignSpace {
            max_height: 100,
            ..space()
        };
        assert!(matches!(
            Sweep::new(&big, Weights::uniform(), &evaluator),
            Err(Error::CanvasTooLarge { .. })
        ));
    }

    #[test]
    fn test_zero_marker_size_fails_at_setup() {
        let evaluator = evaluator();
        let zero = DesignSpace {
            marker_size: RangeSpec::new(0.0, 2.0, 2.0),
            ..space()
        };
        assert!(matches!(
            Sweep::new(&zero, Weights::uniform(), &evaluator),
            Err(Error::InvalidRange { .. })
        ));

        let mut design = space().designs().unwrap().remove(0);
        design.marker_size = 0;
        assert!(matches!(
            Sweep::from_batches(vec![vec![design]], Weights::uniform(), &evaluator),
            Err(Error::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let weights = Weights::uniform();

        let mut sequential = evaluator();
        let mut calls = 0;
        let seq = Sweep::new(&space(), weights, &sequential)
            .unwrap()
            .run(&mut sequential, |_| calls += 1)
            .unwrap();
        assert_eq!(calls, 4);

        let mut parallel = evaluator();
        let par = Sweep::new(&space(), weights, &parallel)
            .unwrap()
            .run_parallel(&mut parallel, |_| {})
            .unwrap();

        assert_eq!(parallel.cache().len(), 8);
        assert_eq!(par.evaluated, 8);
        assert_eq!(seq.design, par.design);
        assert!((seq.evaluation.score - par.evaluation.score).abs() < 1e-12);
    }
}
