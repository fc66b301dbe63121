//! Sweep reports.
//!
//! A [`SweepReport`] records the winning design together with every
//! evaluated design, so a sweep can be inspected after the fact. Reports
//! serialize to JSON; the per-design table can also be written as CSV.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::cache::{Measure, Measures, Weights};
use super::evaluator::DesignEvaluator;
use super::sweep::SweepOutcome;
use crate::design::Design;
use crate::error::Result;

/// One evaluated design with normalized measures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatedDesign {
    /// The design.
    pub design: Design,
    /// Measures, separability entries normalized with the final ranges.
    pub measures: Measures,
    /// Weighted score.
    pub score: f64,
}

/// Named measure value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasureValue {
    /// Measure.
    pub measure: Measure,
    /// Normalized value.
    pub value: f64,
}

/// Result of one optimization sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    /// Lowest-scoring design.
    pub best: Design,
    /// Its score.
    pub score: f64,
    /// Its normalized measures by name.
    pub measures: Vec<MeasureValue>,
    /// Weights the score was computed with.
    pub weights: Weights,
    /// Number of designs in the sweep.
    pub evaluated: usize,
    /// Every cached design, best first.
    pub designs: Vec<EvaluatedDesign>,
    /// When this report was generated.
    #[serde(with = "chrono_serde")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl SweepReport {
    /// Build a report from a finished sweep.
    #[must_use]
    pub fn new(outcome: &SweepOutcome, evaluator: &DesignEvaluator, weights: &Weights) -> Self {
        let cache = evaluator.cache();
        let mut designs: Vec<EvaluatedDesign> = cache
            .iter()
            .map(|(_, design, measures)| {
                let evaluation = cache.evaluation(measures, Some(weights));
                EvaluatedDesign {
                    design: design.clone(),
                    measures: evaluation.measures,
                    score: evaluation.score,
                }
            })
            .collect();
        designs.sort_by(|a, b| a.score.total_cmp(&b.score));

        Self {
            best: outcome.design.clone(),
            score: outcome.evaluation.score,
            measures: Measure::ALL
                .iter()
                .map(|&measure| MeasureValue {
                    measure,
                    value: outcome.evaluation.measures[measure.index()],
                })
                .collect(),
            weights: *weights,
            evaluated: outcome.evaluated,
            designs,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a report written by [`SweepReport::write_json`].
    pub fn read_json(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write one CSV row per evaluated design.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;

        let mut header = vec![
            "width".to_string(),
            "height".to_string(),
            "marker".to_string(),
            "marker_size".to_string(),
            "marker_opacity".to_string(),
        ];
        header.extend(Measure::ALL.iter().map(|m| m.name().to_string()));
        header.push("score".to_string());
        wtr.write_record(&header)?;

        for entry in &self.designs {
            let d = &entry.design;
            let mut record = vec![
                d.width.to_string(),
                d.height.to_string(),
                d.marker.to_string(),
                d.marker_size.to_string(),
                d.marker_opacity.to_string(),
            ];
            record.extend(entry.measures.iter().map(|m| format!("{m:.6}")));
            record.push(format!("{:.6}", entry.score));
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }
}

mod chrono_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dt.to_rfc3339().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
