//! Field Survey Data Processing Library
//!
//! Loads raw field survey records from SQL, repairs known data-entry issues
//! and attaches each field's weather station, built on Polars.
//!
//! # Overview
//!
//! The pipeline runs five steps over one in-memory table:
//!
//! - **Ingestion**: run the configured query against the survey database
//! - **Column swap**: two columns were stored under each other's label; swap them back
//! - **Corrections**: absolute elevation, crop name fixes, whitespace stripping
//! - **Weather mapping**: left-join the weather-station mapping CSV on `Field_ID`
//! - **Cleanup**: drop the `Unnamed: 0` index artifact
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use field_processing::{FieldDataConfig, FieldDataProcessor};
//!
//! let config = FieldDataConfig::builder()
//!     .db_path("sqlite:///Maji_Ndogo_farm_survey_small.db")
//!     .sql_query("SELECT * FROM geographic_features LEFT JOIN weather_features USING (Field_ID)")
//!     .columns_to_rename("Annual_yield", "Crop_type")
//!     .value_to_rename("cassaval", "cassava")
//!     .value_to_rename("wheatn", "wheat")
//!     .weather_mapping_csv("https://example.org/Weather_station_field_mapping.csv")
//!     .build()?;
//!
//! let mut processor = FieldDataProcessor::new(config, "INFO")?;
//! let df = processor.process()?;
//! println!("{df}");
//! ```
//!
//! # Data sources
//!
//! The database and the weather mapping are reached through the
//! [`DatabaseConnector`] and [`TableFetcher`] traits. The defaults are
//! [`SqliteConnector`] and [`CsvTableFetcher`]; pass your own through
//! [`FieldDataProcessor::builder()`].
//!
//! # Logging
//!
//! Every processor has its own named [`FieldLogger`] with a `DEBUG`, `INFO`
//! or `NONE` verbosity. Output is written to stdout by a `tracing-subscriber`
//! installed once per process.

pub mod config;
pub mod corrections;
pub mod error;
pub mod ingestion;
pub mod logging;
pub mod processor;
pub mod progress;
pub mod types;

// Re-exports for convenient access
pub use config::{ColumnSwap, ConfigValidationError, FieldDataConfig, FieldDataConfigBuilder};
pub use error::{FieldDataError, JoinSide, Result as FieldDataResult, ResultExt};
pub use ingestion::{
    CsvTableFetcher, DatabaseConnection, DatabaseConnector, SqliteConnector, TableFetcher,
};
pub use logging::{FieldLogger, LogLevel};
pub use processor::{FieldDataProcessor, FieldDataProcessorBuilder};
pub use progress::{ClosureProgressReporter, ProcessingStage, ProgressReporter, ProgressUpdate};
pub use types::{ActionType, ProcessingAction, ProcessingSummary};
