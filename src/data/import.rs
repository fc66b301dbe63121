//! CSV import for labeled point data.
//!
//! At minimum the file needs two numeric columns for x and y. An optional
//! class column assigns labels `0..` in order of first appearance, and an
//! optional outlier column moves truthy rows into the outlier class.
//!
//! ## Example
//!
//! ```rust,ignore
//! use scatter_opt::data::{CsvColumns, PointSet};
//!
//! let columns = CsvColumns::builder()
//!     .x_column("sepal_length")
//!     .y_column("sepal_width")
//!     .class_column("species")
//!     .build();
//!
//! let points = PointSet::from_csv("iris.csv", &columns)?;
//! ```

use std::path::Path;

use super::{ClassLabel, OUTLIER_LABEL, PointSet};
use crate::error::{Error, Result};

/// Maximum number of distinct values accepted in the class column.
pub const MAX_CLASSES: usize = 20;

/// Column selection for CSV import.
#[derive(Debug, Clone, Default)]
pub struct CsvColumns {
    /// Column name for x coordinates.
    pub x_column: Option<String>,
    /// Column name for y coordinates.
    pub y_column: Option<String>,
    /// Column name for class values.
    pub class_column: Option<String>,
    /// Column name for the outlier flag.
    pub outlier_column: Option<String>,
}

impl CsvColumns {
    /// Create a column builder.
    #[must_use]
    pub fn builder() -> CsvColumnsBuilder {
        CsvColumnsBuilder::default()
    }
}

/// Builder for [`CsvColumns`].
#[derive(Debug, Default)]
pub struct CsvColumnsBuilder {
    columns: CsvColumns,
}

impl CsvColumnsBuilder {
    /// Set the x column name.
    #[must_use]
    pub fn x_column(mut self, name: impl Into<String>) -> Self {
        self.columns.x_column = Some(name.into());
        self
    }

    /// Set the y column name.
    #[must_use]
    pub fn y_column(mut self, name: impl Into<String>) -> Self {
        self.columns.y_column = Some(name.into());
        self
    }

    /// Set the class column name.
    #[must_use]
    pub fn class_column(mut self, name: impl Into<String>) -> Self {
        self.columns.class_column = Some(name.into());
        self
    }

    /// Set the outlier flag column name.
    #[must_use]
    pub fn outlier_column(mut self, name: impl Into<String>) -> Self {
        self.columns.outlier_column = Some(name.into());
        self
    }

    /// Build the column selection.
    #[must_use]
    pub fn build(self) -> CsvColumns {
        self.columns
    }
}

impl PointSet {
    /// Import points from a CSV file with a header row.
    ///
    /// When no x/y column is configured the first and second columns are
    /// used. Rows with non-numeric coordinates are skipped.
    pub fn from_csv(path: impl AsRef<Path>, columns: &CsvColumns) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        Self::from_csv_reader(&mut reader, columns)
    }

    /// Import points from an already opened CSV reader.
    pub fn from_csv_reader<R: std::io::Read>(
        reader: &mut csv::Reader<R>,
        columns: &CsvColumns,
    ) -> Result<Self> {
        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();

        let x_idx = resolve_column(&header_refs, columns.x_column.as_deref(), 0)?;
        let y_idx = resolve_column(&header_refs, columns.y_column.as_deref(), 1)?;
        let class_idx = optional_column(&header_refs, columns.class_column.as_deref())?;
        let outlier_idx = optional_column(&header_refs, columns.outlier_column.as_deref())?;

        let mut class_values: Vec<String> = Vec::new();
        let mut rows = Vec::new();

        for (line_num, record) in reader.records().enumerate() {
            let line = line_num + 2; // +2 for 1-based and header
            let record = record.map_err(|e| Error::CsvImport {
                line,
                reason: e.to_string(),
            })?;

            let x = record.get(x_idx).and_then(|s| s.trim().parse::<f64>().ok());
            let y = record.get(y_idx).and_then(|s| s.trim().parse::<f64>().ok());
            let (Some(x), Some(y)) = (x, y) else {
                log::warn!("Skipping line {line}: non-numeric coordinates");
                continue;
            };

            let is_outlier = outlier_idx
                .and_then(|i| record.get(i))
                .is_some_and(is_truthy);

            let label = if is_outlier {
                OUTLIER_LABEL
            } else if let Some(i) = class_idx {
                let value = record.get(i).unwrap_or("").trim();
                class_label(&mut class_values, value)?
            } else {
                0
            };

            rows.push((x, y, label));
        }

        let set = Self::from_rows(rows);
        log::info!(
            "Imported {} points in {} classes",
            set.total_points(),
            set.len()
        );
        Ok(set)
    }
}

/// Map a class value to its label, registering it on first sight.
fn class_label(values: &mut Vec<String>, value: &str) -> Result<ClassLabel> {
    if let Some(pos) = values.iter().position(|v| v == value) {
        return Ok(pos as ClassLabel);
    }
    if values.len() >= MAX_CLASSES {
        return Err(Error::TooManyClasses {
            max: MAX_CLASSES,
            found: values.len() + 1,
        });
    }
    values.push(value.to_string());
    Ok((values.len() - 1) as ClassLabel)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "outlier"
    )
}

fn resolve_column(headers: &[&str], name: Option<&str>, fallback: usize) -> Result<usize> {
    match name {
        Some(name) => {
            find_header_index(headers, name).ok_or_else(|| Error::MissingColumn(name.to_string()))
        }
        None if fallback < headers.len() => Ok(fallback),
        None => Err(Error::MissingColumn(format!("column #{}", fallback + 1))),
    }
}

fn optional_column(headers: &[&str], name: Option<&str>) -> Result<Option<usize>> {
    name.map(|n| find_header_index(headers, n).ok_or_else(|| Error::MissingColumn(n.to_string())))
        .transpose()
}

/// Find a header index by name (case-insensitive).
fn find_header_index(headers: &[&str], name: &str) -> Option<usize> {
    let name_lower = name.to_lowercase();
    headers
        .iter()
        .position(|h| h.trim().to_lowercase() == name_lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(text: &str) -> csv::Reader<&[u8]> {
        csv::Reader::from_reader(text.as_bytes())
    }

    #[test]
    fn test_columns_builder() {
        let columns = CsvColumns::builder()
            .x_column("a")
            .y_column("b")
            .class_column("kind")
            .build();

        assert_eq!(columns.x_column, Some("a".to_string()));
        assert_eq!(columns.class_column, Some("kind".to_string()));
        assert_eq!(columns.outlier_column, None);
    }

    #[test]
    fn test_import_classes_and_outliers() {
        let text = "x,y,kind,flag\n1,2,cat,0\n3,4,dog,0\n5,6,cat,1\nnope,1,cat,0\n7,8,dog,false\n";
        let columns = CsvColumns::builder()
            .class_column("Kind")
            .outlier_column("flag")
            .build();

        let set = PointSet::from_csv_reader(&mut reader(text), &columns).unwrap();

        assert_eq!(set.len(), 3);
        assert_eq!(set.get(0).unwrap().x, vec![1.0]);
        assert_eq!(set.get(1).unwrap().x, vec![3.0, 7.0]);
        assert_eq!(set.get(OUTLIER_LABEL).unwrap().y, vec![6.0]);
        assert_eq!(set.bounds().x_max, 7.0);
    }

    #[test]
    fn test_import_missing_column() {
        let columns = CsvColumns::builder().x_column("nope").build();
        let result = PointSet::from_csv_reader(&mut reader("x,y\n1,2\n"), &columns);
        assert!(matches!(result, Err(Error::MissingColumn(_))));
    }

    #[test]
    fn test_import_too_many_classes() {
        let mut text = String::from("x,y,c\n");
        for i in 0..=MAX_CLASSES {
            text.push_str(&format!("{i},{i},class{i}\n"));
        }
        let columns = CsvColumns::builder().class_column("c").build();
        let result = PointSet::from_csv_reader(&mut reader(&text), &columns);
        assert!(matches!(result, Err(Error::TooManyClasses { max: MAX_CLASSES, .. })));
    }

    #[test]
    fn test_import_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.csv");
        std::fs::write(&path, "x,y\n0,0\n1,1\n").unwrap();

        let set = PointSet::from_csv(&path, &CsvColumns::default()).unwrap();
        assert_eq!(set.total_points(), 2);
        assert_eq!(set.classes()[0].label, 0);
    }
}
