//! Error types for layoffs-clean.

use std::path::PathBuf;

use crate::pipeline::Stage;

/// Result type alias for cleaning operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, cleaning, or saving a layoff table.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        /// The path where the error occurred, if known.
        path: Option<PathBuf>,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Arrow error during data processing.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error during file operations.
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Report serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Column not found in schema.
    #[error("Column '{name}' not found in schema")]
    ColumnNotFound {
        /// The name of the missing column.
        name: String,
    },

    /// Invalid cleaning rules.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Unsupported file format.
    #[error("Unsupported format: {format}")]
    UnsupportedFormat {
        /// The unsupported format name or extension.
        format: String,
    },

    /// The source contained no batches.
    #[error("Table is empty")]
    EmptyTable,

    /// Column set or column types differ from what a stage expects.
    #[error("Schema mismatch: {message}")]
    SchemaMismatch {
        /// Description of the schema mismatch.
        message: String,
    },

    /// Transform error.
    #[error("Transform error: {message}")]
    Transform {
        /// Description of the transform error.
        message: String,
    },

    /// A date cell does not match the expected format.
    #[error("Cannot parse date '{text}' at row {row} (company {company:?}): expected {format}")]
    DateParse {
        /// Zero-based row of the ingested source table. Falls back to the
        /// position in the batch when no `source_row` column is present.
        row: usize,
        /// Company of the offending row, if present.
        company: Option<String>,
        /// The raw date text.
        text: String,
        /// The expected chrono format string.
        format: String,
    },

    /// Records of one company disagree on industry.
    #[error("Company '{company}' has conflicting industries: {candidates:?}")]
    AmbiguousBackfill {
        /// Company with more than one known industry.
        company: String,
        /// Distinct industries in table order.
        candidates: Vec<String>,
    },

    /// A pipeline stage failed; earlier stages remain committed.
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        /// The stage that failed.
        stage: Stage,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an I/O error with a path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            path: Some(path.into()),
            source,
        }
    }

    /// Create a column not found error.
    pub fn column_not_found(name: impl Into<String>) -> Self {
        Self::ColumnNotFound { name: name.into() }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Create a schema mismatch error.
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }

    /// Create a transform error.
    pub fn transform(message: impl Into<String>) -> Self {
        Self::Transform {
            message: message.into(),
        }
    }

    /// Wrap an error with the stage it came from.
    #[must_use]
    pub fn in_stage(self, stage: Stage) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, looking through stage wrappers.
    pub fn root(&self) -> &Self {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}
