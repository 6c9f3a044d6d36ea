//! Configuration for the field data pipeline.
//!
//! A [`FieldDataConfig`] is built once (from JSON or through
//! [`FieldDataConfig::builder()`]), validated, and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Default join key shared by the field data and the weather mapping.
pub const DEFAULT_JOIN_KEY: &str = "Field_ID";

/// Index column left behind when the source table was exported with its row index.
pub const DEFAULT_ARTIFACT_COLUMN: &str = "Unnamed: 0";

/// A pair of column labels whose contents were stored under each other's name.
///
/// Serialized as a single-entry map (`{"Annual_yield": "Crop_type"}`), the
/// shape the survey configs use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct ColumnSwap {
    pub first: String,
    pub second: String,
}

impl ColumnSwap {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }
}

impl TryFrom<BTreeMap<String, String>> for ColumnSwap {
    type Error = ConfigValidationError;

    fn try_from(map: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        if map.len() != 1 {
            return Err(ConfigValidationError::InvalidColumnSwap(map.len()));
        }
        let (first, second) = map
            .into_iter()
            .next()
            .ok_or(ConfigValidationError::InvalidColumnSwap(0))?;
        Ok(Self { first, second })
    }
}

impl From<ColumnSwap> for BTreeMap<String, String> {
    fn from(swap: ColumnSwap) -> Self {
        BTreeMap::from([(swap.first, swap.second)])
    }
}

fn default_join_key() -> String {
    DEFAULT_JOIN_KEY.to_string()
}

fn default_artifact_column() -> String {
    DEFAULT_ARTIFACT_COLUMN.to_string()
}

fn default_true() -> bool {
    true
}

/// Configuration for the field data pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDataConfig {
    /// Database location: a file path or a `sqlite:///path` URL.
    pub db_path: String,

    /// Query producing the raw field table.
    pub sql_query: String,

    /// The two columns whose labels must be swapped.
    pub columns_to_rename: ColumnSwap,

    /// Categorical value corrections (raw value -> canonical value).
    /// Unmapped values pass through unchanged. Required, but may be empty.
    pub values_to_rename: HashMap<String, String>,

    /// URL or path of the weather-station mapping CSV.
    pub weather_mapping_csv: String,

    /// Key column for the weather join.
    /// Default: "Field_ID"
    #[serde(default = "default_join_key")]
    pub join_key: String,

    /// Column dropped at the end of `process`.
    /// Default: "Unnamed: 0"
    #[serde(default = "default_artifact_column")]
    pub artifact_column: String,

    /// Whether a missing artifact column is an error.
    /// Default: true
    #[serde(default = "default_true")]
    pub require_artifact_column: bool,
}

impl FieldDataConfig {
    /// Create a new configuration builder.
    pub fn builder() -> FieldDataConfigBuilder {
        FieldDataConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> crate::error::Result<Self> {
        let config: FieldDataConfig = serde_json::from_str(json)?;
        config
            .validate()
            .map_err(|e| crate::error::FieldDataError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let required = [
            ("db_path", &self.db_path),
            ("sql_query", &self.sql_query),
            ("weather_mapping_csv", &self.weather_mapping_csv),
            ("join_key", &self.join_key),
            ("artifact_column", &self.artifact_column),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigValidationError::EmptyField(field.to_string()));
            }
        }

        if self.columns_to_rename.first.is_empty() || self.columns_to_rename.second.is_empty() {
            return Err(ConfigValidationError::EmptyField(
                "columns_to_rename".to_string(),
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Field '{0}' must not be empty")]
    EmptyField(String),

    #[error("columns_to_rename must hold exactly one pair, got {0}")]
    InvalidColumnSwap(usize),
}

/// Builder for [`FieldDataConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct FieldDataConfigBuilder {
    db_path: Option<String>,
    sql_query: Option<String>,
    columns_to_rename: Option<ColumnSwap>,
    values_to_rename: HashMap<String, String>,
    weather_mapping_csv: Option<String>,
    join_key: Option<String>,
    artifact_column: Option<String>,
    require_artifact_column: Option<bool>,
}

impl FieldDataConfigBuilder {
    /// Set the database location.
    pub fn db_path(mut self, path: impl Into<String>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    /// Set the query that produces the raw field table.
    pub fn sql_query(mut self, query: impl Into<String>) -> Self {
        self.sql_query = Some(query.into());
        self
    }

    /// Set the pair of columns whose labels are swapped.
    pub fn columns_to_rename(mut self, first: impl Into<String>, second: impl Into<String>) -> Self {
        self.columns_to_rename = Some(ColumnSwap::new(first, second));
        self
    }

    /// Add one categorical value correction.
    pub fn value_to_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.values_to_rename.insert(from.into(), to.into());
        self
    }

    /// Replace all categorical value corrections.
    pub fn values_to_rename(mut self, values: HashMap<String, String>) -> Self {
        self.values_to_rename = values;
        self
    }

    /// Set the weather-station mapping locator.
    pub fn weather_mapping_csv(mut self, locator: impl Into<String>) -> Self {
        self.weather_mapping_csv = Some(locator.into());
        self
    }

    /// Override the join key (default "Field_ID").
    pub fn join_key(mut self, key: impl Into<String>) -> Self {
        self.join_key = Some(key.into());
        self
    }

    /// Override the artifact column dropped at the end (default "Unnamed: 0").
    pub fn artifact_column(mut self, column: impl Into<String>) -> Self {
        self.artifact_column = Some(column.into());
        self
    }

    /// Tolerate a missing artifact column instead of failing.
    pub fn require_artifact_column(mut self, require: bool) -> Self {
        self.require_artifact_column = Some(require);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `FieldDataConfig` or an error if a required field
    /// is missing or invalid.
    pub fn build(self) -> Result<FieldDataConfig, ConfigValidationError> {
        let config = FieldDataConfig {
            db_path: self
                .db_path
                .ok_or_else(|| ConfigValidationError::MissingField("db_path".to_string()))?,
            sql_query: self
                .sql_query
                .ok_or_else(|| ConfigValidationError::MissingField("sql_query".to_string()))?,
            columns_to_rename: self.columns_to_rename.ok_or_else(|| {
                ConfigValidationError::MissingField("columns_to_rename".to_string())
            })?,
            values_to_rename: self.values_to_rename,
            weather_mapping_csv: self.weather_mapping_csv.ok_or_else(|| {
                ConfigValidationError::MissingField("weather_mapping_csv".to_string())
            })?,
            join_key: self.join_key.unwrap_or_else(default_join_key),
            artifact_column: self.artifact_column.unwrap_or_else(default_artifact_column),
            require_artifact_column: self.require_artifact_column.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}
