//! Custom error types for the field data pipeline.
//!
//! Every step fails fast: errors are never caught inside the pipeline, they
//! abort the current `process` call and surface to the caller unchanged.
//!
//! Errors are serializable as `{ code, message }` so callers that forward them
//! (a CLI JSON report, a service response) get a stable machine-readable code.

use serde::Serialize;
use serde::ser::SerializeStruct;
use std::fmt;
use thiserror::Error;

/// Which side of the weather join lacked the key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    /// The Working Table.
    Left,
    /// The fetched weather-station mapping.
    Right,
}

impl fmt::Display for JoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("field data"),
            Self::Right => f.write_str("weather mapping"),
        }
    }
}

/// The main error type for the field data pipeline.
#[derive(Error, Debug)]
pub enum FieldDataError {
    /// The database could not be opened or the query failed.
    #[error("Failed to ingest data from '{location}': {reason}")]
    IngestionFailed { location: String, reason: String },

    /// Column was not found in the Working Table.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// The join key is missing from one side of the weather join.
    #[error("Join key '{key}' not found in {side} table")]
    JoinKeyMissing { key: String, side: JoinSide },

    /// A column has a dtype the operation cannot work with.
    #[error("Column '{column}' has type {found}, expected {expected}")]
    InvalidColumnType {
        column: String,
        expected: String,
        found: String,
    },

    /// The weather mapping could not be retrieved.
    #[error("Failed to fetch table from '{locator}': {reason}")]
    FetchFailed { locator: String, reason: String },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A step ran before `ingest_sql_data` produced a table.
    #[error("No data loaded")]
    NoDataLoaded,

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error (only with the "remote" feature).
    #[cfg(feature = "remote")]
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<FieldDataError>,
    },
}

impl FieldDataError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        FieldDataError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get the stable error code.
    ///
    /// The first four codes correspond to the failure kinds callers are
    /// expected to branch on: ingestion, schema, join and type errors.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::IngestionFailed { .. } => "INGESTION_ERROR",
            Self::ColumnNotFound(_) => "SCHEMA_ERROR",
            Self::JoinKeyMissing { .. } => "JOIN_ERROR",
            Self::InvalidColumnType { .. } => "TYPE_ERROR",
            Self::FetchFailed { .. } => "FETCH_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::NoDataLoaded => "NO_DATA_LOADED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            #[cfg(feature = "remote")]
            Self::Http(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Strip any context wrappers and return the underlying error.
    pub fn root(&self) -> &FieldDataError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error came from the database collaborator.
    pub fn is_ingestion_error(&self) -> bool {
        matches!(self.root(), Self::IngestionFailed { .. })
    }

    /// Check if an expected column was missing.
    pub fn is_schema_error(&self) -> bool {
        matches!(self.root(), Self::ColumnNotFound(_))
    }

    /// Check if the join key was missing.
    pub fn is_join_error(&self) -> bool {
        matches!(self.root(), Self::JoinKeyMissing { .. })
    }

    /// Check if a column had an unusable dtype.
    pub fn is_type_error(&self) -> bool {
        matches!(self.root(), Self::InvalidColumnType { .. })
    }
}

/// Serialized as a struct with `code` and `message` fields.
impl Serialize for FieldDataError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("FieldDataError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for field data operations.
pub type Result<T> = std::result::Result<T, FieldDataError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| FieldDataError::Polars(e).with_context(context))
    }
}
