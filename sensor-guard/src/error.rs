//! Error types for the sensor-guard pipeline.
//!
//! Every failure the pipeline can observe is represented by [`GuardError`].
//! Most variants are recoverable and are handled where they are detected
//! (a malformed row is skipped, an unknown sensor is dropped); only
//! configuration errors are meant to abort startup.

use thiserror::Error;

/// The main error type for sensor-guard.
#[derive(Error, Debug)]
pub enum GuardError {
    /// A row or cell could not be interpreted.
    #[error("Malformed row in '{source_file}': {message}")]
    MalformedRow {
        /// File the row was read from
        source_file: String,
        /// What was wrong with the row
        message: String,
    },

    /// A required column could not be found in a file or batch.
    #[error("Column '{column}' not found in '{source_file}'")]
    MissingColumn { column: String, source_file: String },

    /// A sensor id has no entry in the metadata registry.
    #[error("Unknown sensor '{sensor_id}'")]
    UnknownSensor { sensor_id: String },

    /// A parameter has no registered threshold band.
    #[error("No threshold registered for parameter '{parameter}'")]
    MissingThreshold { parameter: String },

    /// Error from data source operations.
    #[error("Data source error: {message}")]
    DataSource {
        /// Path or description of the source
        source_file: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error from Arrow CSV decoding.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The decision collaborator failed to handle a batch.
    #[error("Decision handler failed: {0}")]
    Decision(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, GuardError>`.
pub type Result<T> = std::result::Result<T, GuardError>;

impl GuardError {
    /// Creates a malformed row error.
    pub fn malformed_row(source_file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedRow {
            source_file: source_file.into(),
            message: message.into(),
        }
    }

    /// Creates a missing column error.
    pub fn missing_column(column: impl Into<String>, source_file: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
            source_file: source_file.into(),
        }
    }

    /// Creates a new data source error.
    pub fn data_source(source_file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            source_file: source_file.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new data source error with a source error.
    pub fn data_source_with_source(
        source_file: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::DataSource {
            source_file: source_file.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Returns true for conditions the pipeline skips over instead of failing.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration(_) | Self::Internal(_))
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<GuardError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.with_context(|| msg.to_string())
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| match e.into() {
            GuardError::Configuration(inner) => {
                GuardError::Configuration(format!("{}: {inner}", f()))
            }
            GuardError::Internal(inner) => GuardError::Internal(format!("{}: {inner}", f())),
            other => GuardError::Internal(format!("{}: {other}", f())),
        })
    }
}
