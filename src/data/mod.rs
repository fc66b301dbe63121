//! Labeled 2-D point data.
//!
//! A [`PointSet`] maps class labels to coordinate arrays and carries the
//! bounding box every class is projected into. Label [`OUTLIER_LABEL`]
//! (`-1`) is reserved for outliers.

mod import;

use serde::{Deserialize, Serialize};

pub use import::{CsvColumns, CsvColumnsBuilder, MAX_CLASSES};

/// Label reserved for the outlier class.
pub const OUTLIER_LABEL: ClassLabel = -1;

/// Integer class label.
pub type ClassLabel = i32;

/// Axis-aligned bounding box of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum x value.
    pub x_min: f64,
    /// Minimum y value.
    pub y_min: f64,
    /// Maximum x value.
    pub x_max: f64,
    /// Maximum y value.
    pub y_max: f64,
}

impl Bounds {
    /// Create a bounding box from explicit limits.
    #[must_use]
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Empty box that any point extends.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY)
    }

    /// Grow the box to contain `(x, y)`.
    pub fn extend(&mut self, x: f64, y: f64) {
        self.x_min = self.x_min.min(x);
        self.y_min = self.y_min.min(y);
        self.x_max = self.x_max.max(x);
        self.y_max = self.y_max.max(y);
    }

    /// Whether no point has been added yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x_min > self.x_max || self.y_min > self.y_max
    }
}

/// Coordinates of one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassPoints {
    /// Class label.
    pub label: ClassLabel,
    /// X coordinates.
    pub x: Vec<f64>,
    /// Y coordinates, same length as `x`.
    pub y: Vec<f64>,
}

impl ClassPoints {
    /// Number of points in the class.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether the class holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Whether this is the outlier class.
    #[must_use]
    pub fn is_outlier(&self) -> bool {
        self.label == OUTLIER_LABEL
    }
}

/// Mapping from class label to coordinates, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSet {
    classes: Vec<ClassPoints>,
    bounds: Bounds,
}

impl PointSet {
    /// Create an empty point set with the given bounding box.
    #[must_use]
    pub fn new(bounds: Bounds) -> Self {
        Self {
            classes: Vec::new(),
            bounds,
        }
    }

    /// Group `(x, y, label)` rows by label and compute the bounding box.
    ///
    /// Classes keep the order in which their label first appears.
    pub fn from_rows(rows: impl IntoIterator<Item = (f64, f64, ClassLabel)>) -> Self {
        let mut set = Self::new(Bounds::empty());
        for (x, y, label) in rows {
            if !x.is_finite() || !y.is_finite() {
                log::warn!("Skipping non-finite point ({x}, {y}) in class {label}");
                continue;
            }
            set.bounds.extend(x, y);
            match set.classes.iter_mut().find(|c| c.label == label) {
                Some(class) => {
                    class.x.push(x);
                    class.y.push(y);
                }
                None => set.classes.push(ClassPoints {
                    label,
                    x: vec![x],
                    y: vec![y],
                }),
            }
        }
        if set.bounds.is_empty() {
            set.bounds = Bounds::new(0.0, 0.0, 0.0, 0.0);
        }
        set
    }

    /// Insert or replace the coordinates of one class.
    ///
    /// Empty or mismatched arrays are skipped with a warning; the set is
    /// left unchanged.
    pub fn insert(&mut self, label: ClassLabel, x: Vec<f64>, y: Vec<f64>) {
        if x.len() != y.len() {
            log::warn!(
                "Skipping class {label}: x has {} values but y has {}",
                x.len(),
                y.len()
            );
            return;
        }
        if x.is_empty() {
            log::warn!("Skipping class {label}: no points");
            return;
        }
        let points = ClassPoints { label, x, y };
        match self.classes.iter_mut().find(|c| c.label == label) {
            Some(existing) => *existing = points,
            None => self.classes.push(points),
        }
    }

    /// Bounding box all classes are projected into.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Classes in insertion order.
    #[must_use]
    pub fn classes(&self) -> &[ClassPoints] {
        &self.classes
    }

    /// Look up a class by label.
    #[must_use]
    pub fn get(&self, label: ClassLabel) -> Option<&ClassPoints> {
        self.classes.iter().find(|c| c.label == label)
    }

    /// Number of classes, outliers included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the set holds no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Whether an outlier class is present.
    #[must_use]
    pub fn has_outliers(&self) -> bool {
        self.get(OUTLIER_LABEL).is_some()
    }

    /// Total number of points across all classes.
    #[must_use]
    pub fn total_points(&self) -> usize {
        self.classes.iter().map(ClassPoints::len).sum()
    }

    /// Number of points excluding outliers.
    #[must_use]
    pub fn inlier_points(&self) -> usize {
        self.classes
            .iter()
            .filter(|c| !c.is_outlier())
            .map(ClassPoints::len)
            .sum()
    }

    /// Number of classes for color mapping.
    ///
    /// A single class plus outliers counts as one class.
    #[must_use]
    pub fn effective_class_count(&self) -> usize {
        if self.has_outliers() && self.classes.len() == 2 {
            1
        } else {
            self.classes.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_groups_by_label() {
        let set = PointSet::from_rows([
            (0.0, 1.0, 3),
            (2.0, -1.0, OUTLIER_LABEL),
            (1.0, 5.0, 3),
        ]);

        assert_eq!(set.len(), 2);
        assert_eq!(set.classes()[0].label, 3);
        assert_eq!(set.classes()[0].x, vec![0.0, 1.0]);
        assert_eq!(set.total_points(), 3);
        assert_eq!(set.inlier_points(), 2);
        assert_eq!(set.bounds(), Bounds::new(0.0, -1.0, 2.0, 5.0));
    }

    #[test]
    fn test_insert_skips_mismatched_arrays() {
        let mut set = PointSet::new(Bounds::new(0.0, 0.0, 1.0, 1.0));
        set.insert(0, vec![0.0, 1.0], vec![0.0]);
        set.insert(1, vec![], vec![]);
        assert!(set.is_empty());

        set.insert(0, vec![0.5], vec![0.5]);
        set.insert(0, vec![0.1, 0.2], vec![0.3, 0.4]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0).map(ClassPoints::len), Some(2));
    }

    #[test]
    fn test_effective_class_count() {
        let one_plus_outliers = PointSet::from_rows([(0.0, 0.0, 0), (1.0, 1.0, OUTLIER_LABEL)]);
        assert_eq!(one_plus_outliers.effective_class_count(), 1);

        let two_plus_outliers =
            PointSet::from_rows([(0.0, 0.0, 0), (1.0, 1.0, 1), (1.0, 1.0, OUTLIER_LABEL)]);
        assert_eq!(two_plus_outliers.effective_class_count(), 3);
    }
}
