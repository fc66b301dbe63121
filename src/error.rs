//! Error types for scatter-opt operations.

use thiserror::Error;

/// Result type alias for scatter-opt operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering, scoring or searching designs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A design asks for a canvas larger than the preallocated buffers.
    #[error("Canvas too large: requested {requested:?}, maximum is {max:?}")]
    CanvasTooLarge {
        /// Requested dimensions (width, height).
        requested: (usize, usize),
        /// Preallocated maximum dimensions (width, height).
        max: (usize, usize),
    },

    /// Image dimensions don't match between two compared images.
    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        /// Expected dimensions (width, height).
        expected: (usize, usize),
        /// Actual dimensions (width, height).
        actual: (usize, usize),
    },

    /// Weight vector has the wrong number of entries.
    #[error("Invalid weights: expected {expected} entries, got {actual}")]
    InvalidWeights {
        /// Number of quality measures.
        expected: usize,
        /// Number of weights supplied.
        actual: usize,
    },

    /// The design space produced no candidate designs.
    #[error("Design space is empty")]
    EmptyDesignSpace,

    /// A parameter range could not be expanded.
    #[error("Invalid range for {name}: {reason}")]
    InvalidRange {
        /// Name of the design axis.
        name: String,
        /// Reason for the failure.
        reason: String,
    },

    /// The dataset changed while a sweep was running.
    #[error("Sweep cancelled: dataset changed after {evaluated} of {total} designs")]
    SweepCancelled {
        /// Designs evaluated before the change was noticed.
        evaluated: usize,
        /// Designs in the sweep.
        total: usize,
    },

    /// Marker name is not in the registry.
    #[error("Unknown marker shape: {0}")]
    UnknownMarker(String),

    /// Weight preset name is not known.
    #[error("Unknown weight preset: {0}")]
    UnknownPreset(String),

    /// Error importing CSV point data.
    #[error("CSV import error at line {line}: {reason}")]
    CsvImport {
        /// Line number where the error occurred.
        line: usize,
        /// Reason for the failure.
        reason: String,
    },

    /// The class column holds more distinct values than supported.
    #[error("Too many classes: found more than {max} distinct values ({found} seen)")]
    TooManyClasses {
        /// Maximum number of supported classes.
        max: usize,
        /// Number of distinct values seen before giving up.
        found: usize,
    },

    /// A required CSV column was not found in the header.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
