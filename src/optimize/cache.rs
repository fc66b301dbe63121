//! Evaluation cache, measure names and weights.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::design::Design;
use crate::error::{Error, Result};

/// Number of quality measures per design.
pub const MEASURE_COUNT: usize = 10;

/// Raw measure vector, every entry in `[0, 1]` with 0 = best.
pub type Measures = [f64; MEASURE_COUNT];

/// The ten quality measures, in vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    /// Perceived principal-axis angle vs. the data's.
    AngleError,
    /// Perceived axis ratio vs. the data's.
    AxisRatioError,
    /// Mean opacity of inked pixels.
    MeanOpacity,
    /// Standard deviation of inked pixel opacity.
    Contrast,
    /// Distance of the mean opacity from its target.
    OpacityDeviation,
    /// Distance of the contrast from its target.
    ContrastDeviation,
    /// Share of marker pixels lost to overlap.
    PointOverlap,
    /// Share of ink lost to overplotting.
    Overplotting,
    /// Similarity of the plot with and without each class.
    ClassSeparability,
    /// Similarity of the plot with and without the outliers.
    OutlierSeparability,
}

impl Measure {
    /// All measures in vector order.
    pub const ALL: [Self; MEASURE_COUNT] = [
        Self::AngleError,
        Self::AxisRatioError,
        Self::MeanOpacity,
        Self::Contrast,
        Self::OpacityDeviation,
        Self::ContrastDeviation,
        Self::PointOverlap,
        Self::Overplotting,
        Self::ClassSeparability,
        Self::OutlierSeparability,
    ];

    /// Position in a [`Measures`] vector.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable name used in reports.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::AngleError => "angle_error",
            Self::AxisRatioError => "axis_ratio_error",
            Self::MeanOpacity => "mean_opacity",
            Self::Contrast => "contrast",
            Self::OpacityDeviation => "opacity_deviation",
            Self::ContrastDeviation => "contrast_deviation",
            Self::PointOverlap => "point_overlap",
            Self::Overplotting => "overplotting",
            Self::ClassSeparability => "class_separability",
            Self::OutlierSeparability => "outlier_separability",
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Weight per measure for the scalar score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights([f64; MEASURE_COUNT]);

impl Weights {
    /// Explicit weights.
    #[must_use]
    pub fn new(weights: [f64; MEASURE_COUNT]) -> Self {
        Self(weights)
    }

    /// Weight 1 for every measure; scores become plain sums.
    #[must_use]
    pub fn uniform() -> Self {
        Self([1.0; MEASURE_COUNT])
    }

    /// Weights from a slice of exactly [`MEASURE_COUNT`] values.
    pub fn from_slice(weights: &[f64]) -> Result<Self> {
        let array: [f64; MEASURE_COUNT] =
            weights.try_into().map_err(|_| Error::InvalidWeights {
                expected: MEASURE_COUNT,
                actual: weights.len(),
            })?;
        Ok(Self(array))
    }

    /// Weight of one measure.
    #[must_use]
    pub fn get(&self, measure: Measure) -> f64 {
        self.0[measure.index()]
    }

    /// Set the weight of one measure.
    #[must_use]
    pub fn with(mut self, measure: Measure, weight: f64) -> Self {
        self.0[measure.index()] = weight;
        self
    }

    /// Weighted sum of `measures`.
    #[must_use]
    pub fn dot(&self, measures: &Measures) -> f64 {
        self.0.iter().zip(measures).map(|(w, m)| w * m).sum()
    }

    /// Raw weight array.
    #[must_use]
    pub fn as_array(&self) -> &[f64; MEASURE_COUNT] {
        &self.0
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self::uniform()
    }
}

/// Named weight sets for common analysis tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeightPreset {
    /// Every measure counts equally.
    Uniform,
    /// Reading trends: shape fidelity first, then legibility.
    Correlation,
    /// Telling classes apart.
    Clusters,
    /// Spotting outliers.
    Outliers,
    /// Judging point density: opacity and overdraw only.
    Density,
}

impl WeightPreset {
    /// All presets.
    pub const ALL: [Self; 5] = [
        Self::Uniform,
        Self::Correlation,
        Self::Clusters,
        Self::Outliers,
        Self::Density,
    ];

    /// Name used on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Correlation => "correlation",
            Self::Clusters => "clusters",
            Self::Outliers => "outliers",
            Self::Density => "density",
        }
    }

    /// The preset's weights, in measure order.
    #[must_use]
    pub fn weights(self) -> Weights {
        Weights(match self {
            Self::Uniform => [1.0; MEASURE_COUNT],
            Self::Correlation => [1.0, 1.0, 0.0, 0.0, 0.5, 0.5, 0.5, 0.5, 0.0, 0.0],
            Self::Clusters => [0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 0.5, 1.0, 0.0],
            Self::Outliers => [0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 0.5, 0.0, 1.0],
            Self::Density => [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0],
        })
    }

    /// Preset whose weights equal `weights`, if any.
    #[must_use]
    pub fn matching(weights: &Weights) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.weights() == *weights)
    }
}

impl fmt::Display for WeightPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WeightPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownPreset(s.to_string()))
    }
}

impl From<WeightPreset> for Weights {
    fn from(preset: WeightPreset) -> Self {
        preset.weights()
    }
}

/// Normalized measures and their score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Measures with the separability entries range-normalized.
    pub measures: Measures,
    /// Weighted sum, or plain sum when no weights were given.
    pub score: f64,
}

/// Running min/max of one measure across cached designs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunningRange {
    /// Smallest value seen, starts at 1.
    pub min: f64,
    /// Largest value seen, starts at 0.
    pub max: f64,
}

impl RunningRange {
    /// Range before any value was seen.
    pub const EMPTY: Self = Self { min: 1.0, max: 0.0 };

    /// Widen the range to include `value`.
    pub fn update(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Map `value` into the range, unchanged when the range is empty or flat.
    #[must_use]
    pub fn normalize(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        if range > 0.0 {
            (value - self.min) / range
        } else {
            value
        }
    }
}

impl Default for RunningRange {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    design: Design,
    measures: Measures,
}

/// Measures per design fingerprint, valid for one dataset.
///
/// Entries are never replaced. The running ranges of the two separability
/// measures only grow when a new entry is inserted, so merging caches is
/// independent of insertion order.
#[derive(Debug, Clone, Default)]
pub struct MeasureCache {
    entries: BTreeMap<String, CacheEntry>,
    class_range: RunningRange,
    outlier_range: RunningRange,
}

impl MeasureCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached designs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries and reset the running ranges.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.class_range = RunningRange::EMPTY;
        self.outlier_range = RunningRange::EMPTY;
    }

    /// Raw measures for a fingerprint.
    #[must_use]
    pub fn get(&self, fingerprint: &str) -> Option<&Measures> {
        self.entries.get(fingerprint).map(|e| &e.measures)
    }

    /// Whether a fingerprint is cached.
    #[must_use]
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.entries.contains_key(fingerprint)
    }

    /// Cache raw measures; returns `false` (and changes nothing) if the
    /// fingerprint was already present.
    pub fn insert(&mut self, fingerprint: String, design: Design, measures: Measures) -> bool {
        if self.entries.contains_key(&fingerprint) {
            return false;
        }
        self.class_range
            .update(measures[Measure::ClassSeparability.index()]);
        self.outlier_range
            .update(measures[Measure::OutlierSeparability.index()]);
        self.entries
            .insert(fingerprint, CacheEntry { design, measures });
        true
    }

    /// Insert every entry of `other` not already present.
    pub fn merge(&mut self, other: Self) -> usize {
        let mut added = 0;
        for (fingerprint, entry) in other.entries {
            if self.insert(fingerprint, entry.design, entry.measures) {
                added += 1;
            }
        }
        added
    }

    /// Running range of class separability.
    #[must_use]
    pub fn class_range(&self) -> RunningRange {
        self.class_range
    }

    /// Running range of outlier separability.
    #[must_use]
    pub fn outlier_range(&self) -> RunningRange {
        self.outlier_range
    }

    /// Normalize the separability measures with the current ranges.
    #[must_use]
    pub fn normalized(&self, measures: &Measures) -> Measures {
        let mut out = *measures;
        let class = Measure::ClassSeparability.index();
        let outlier = Measure::OutlierSeparability.index();
        out[class] = self.class_range.normalize(out[class]);
        out[outlier] = self.outlier_range.normalize(out[outlier]);
        out
    }

    /// Normalize and score raw measures.
    #[must_use]
    pub fn evaluation(&self, measures: &Measures, weights: Option<&Weights>) -> Evaluation {
        let measures = self.normalized(measures);
        let score = match weights {
            Some(weights) => weights.dot(&measures),
            None => measures.iter().sum(),
        };
        Evaluation { measures, score }
    }

    /// Cached designs with their raw measures, in fingerprint order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Design, &Measures)> {
        self.entries
            .iter()
            .map(|(k, e)| (k.as_str(), &e.design, &e.measures))
    }

    /// Lowest-scoring cached design.
    ///
    /// Every entry is renormalized with the final ranges. Ties keep the
    /// design with the smallest fingerprint.
    #[must_use]
    pub fn best(&self, weights: Option<&Weights>) -> Option<(Design, Evaluation)> {
        let mut best: Option<(&Design, Evaluation)> = None;
        for entry in self.entries.values() {
            let evaluation = self.evaluation(&entry.measures, weights);
            if best
                .as_ref()
                .is_none_or(|(_, current)| evaluation.score < current.score)
            {
                best = Some((&entry.design, evaluation));
            }
        }
        best.map(|(design, evaluation)| (design.clone(), evaluation))
    }
}
