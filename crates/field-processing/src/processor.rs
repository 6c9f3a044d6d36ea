//! The field data processor.
//!
//! [`FieldDataProcessor`] owns the configuration and the Working Table and
//! runs the pipeline in a fixed order:
//!
//! 1. ingest the raw table from the database
//! 2. swap the two mislabelled columns
//! 3. apply corrections (absolute elevation, crop name fixes, whitespace)
//! 4. left-join the weather-station mapping
//! 5. drop the index artifact column
//!
//! Each step is also public so callers can run and inspect them one by one.
//! A step works on a copy of the table and only commits it on success, so a
//! failed step leaves the previous table untouched.

use crate::config::FieldDataConfig;
use crate::corrections::{
    absolute_values, drop_column, left_join_on, placeholder_label, remap_values, require_column,
    strip_whitespace, swap_column_labels,
};
use crate::error::{FieldDataError, Result};
use crate::ingestion::{
    CsvTableFetcher, DatabaseConnection, DatabaseConnector, SqliteConnector, TableFetcher,
};
use crate::logging::{FieldLogger, LogLevel};
use crate::progress::{ClosureProgressReporter, ProcessingStage, ProgressReporter, ProgressUpdate};
use crate::types::{ActionType, ProcessingAction, ProcessingSummary};
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;

/// Column corrected through `values_to_rename` by default.
pub const DEFAULT_CATEGORY_COLUMN: &str = "Crop_type";

/// Column made non-negative by default.
pub const DEFAULT_ABS_COLUMN: &str = "Elevation";

/// Runs the field data pipeline over one Working Table.
///
/// # Example
///
/// ```rust,ignore
/// use field_processing::{FieldDataConfig, FieldDataProcessor};
///
/// let config = FieldDataConfig::from_json_file("config.json")?;
/// let mut processor = FieldDataProcessor::new(config, "INFO")?;
/// let df = processor.process()?;
/// ```
pub struct FieldDataProcessor {
    config: FieldDataConfig,
    logger: FieldLogger,
    connector: Arc<dyn DatabaseConnector>,
    fetcher: Arc<dyn TableFetcher>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    connection: Option<Box<dyn DatabaseConnection>>,
    df: Option<DataFrame>,
    summary: ProcessingSummary,
}

static_assertions::assert_impl_all!(FieldDataProcessor: Send);

impl FieldDataProcessor {
    /// Create a processor with the default SQLite and CSV collaborators.
    ///
    /// `logging_level` is `DEBUG`, `INFO` or `NONE` (any case); anything
    /// else falls back to `INFO`.
    pub fn new(config: FieldDataConfig, logging_level: impl Into<LogLevel>) -> Result<Self> {
        Self::builder().config(config).log_level(logging_level).build()
    }

    pub fn builder() -> FieldDataProcessorBuilder {
        FieldDataProcessorBuilder::default()
    }

    pub fn config(&self) -> &FieldDataConfig {
        &self.config
    }

    pub fn logger(&self) -> &FieldLogger {
        &self.logger
    }

    /// The current Working Table, if ingestion has run.
    pub fn dataframe(&self) -> Option<&DataFrame> {
        self.df.as_ref()
    }

    /// Whether a database connection is held.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Summary of the actions taken so far.
    pub fn summary(&self) -> &ProcessingSummary {
        &self.summary
    }

    fn table(&self) -> Result<&DataFrame> {
        self.df.as_ref().ok_or(FieldDataError::NoDataLoaded)
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    /// Load the raw table from the configured database and query.
    pub fn ingest_sql_data(&mut self) -> Result<&DataFrame> {
        self.logger
            .debug(format_args!("Connecting to {}", self.config.db_path));
        let connection = self.connector.connect(&self.config.db_path)?;
        let df = connection.query(&self.config.sql_query)?;
        self.logger.debug(format_args!(
            "Query returned {} rows x {} columns",
            df.height(),
            df.width()
        ));

        self.summary.rows_ingested = df.height();
        self.summary.columns_ingested = df.width();
        self.summary.add_action(ProcessingAction::new(
            ActionType::DataLoaded,
            "dataset",
            format!("Loaded {} rows from {}", df.height(), self.config.db_path),
        ));

        self.connection = Some(connection);
        self.logger.info("Successfully loaded data.");
        Ok(&*self.df.insert(df))
    }

    /// Swap the labels of the two configured columns.
    pub fn rename_columns(&mut self) -> Result<()> {
        let first = self.config.columns_to_rename.first.clone();
        let second = self.config.columns_to_rename.second.clone();

        let mut df = self.table()?.clone();
        swap_column_labels(&mut df, &first, &second)?;
        if first != second {
            self.logger.debug(format_args!(
                "Swapped '{first}' and '{second}' via '{}'",
                placeholder_label(&df)
            ));
        }
        self.df = Some(df);

        self.logger
            .info(format_args!("Swapped columns: {first} with {second}"));
        self.summary.add_action(ProcessingAction::new(
            ActionType::ColumnsSwapped,
            format!("{first}, {second}"),
            format!("Swapped columns: {first} with {second}"),
        ));
        Ok(())
    }

    /// Clean `abs_column` and `column_name`.
    ///
    /// In order: absolute value of `abs_column`, `values_to_rename` lookup on
    /// `column_name` (unmapped values pass through), then whitespace stripping
    /// on `column_name`. The lookup runs before stripping, so mapping keys
    /// must match the raw values.
    pub fn apply_corrections(&mut self, column_name: &str, abs_column: &str) -> Result<()> {
        let mut df = self.table()?.clone();
        require_column(&df, abs_column)?;
        require_column(&df, column_name)?;

        absolute_values(&mut df, abs_column)?;
        let replaced = remap_values(&mut df, column_name, &self.config.values_to_rename)?;
        strip_whitespace(&mut df, column_name)?;
        self.df = Some(df);

        self.logger.debug(format_args!(
            "Corrected '{abs_column}' and renamed {replaced} values in '{column_name}'"
        ));
        self.summary.add_action(ProcessingAction::new(
            ActionType::AbsoluteValues,
            abs_column,
            format!("Took absolute values of {abs_column}"),
        ));
        self.summary.add_action(ProcessingAction::new(
            ActionType::ValuesRenamed,
            column_name,
            format!("Renamed {replaced} values in {column_name}"),
        ));
        self.summary.add_action(ProcessingAction::new(
            ActionType::WhitespaceStripped,
            column_name,
            format!("Stripped whitespace in {column_name}"),
        ));
        Ok(())
    }

    /// [`apply_corrections`](Self::apply_corrections) on `Crop_type` and `Elevation`.
    pub fn apply_default_corrections(&mut self) -> Result<()> {
        self.apply_corrections(DEFAULT_CATEGORY_COLUMN, DEFAULT_ABS_COLUMN)
    }

    /// Fetch the weather-station mapping and left-join it on the join key.
    pub fn weather_station_mapping(&mut self) -> Result<()> {
        let df = self.table()?.clone();
        self.logger.debug(format_args!(
            "Fetching weather mapping from {}",
            self.config.weather_mapping_csv
        ));
        let weather = self.fetcher.fetch(&self.config.weather_mapping_csv)?;
        self.logger.debug(format_args!(
            "Fetched {} weather mapping rows from {}",
            weather.height(),
            self.config.weather_mapping_csv
        ));

        let rows_before = df.height();
        let outcome = left_join_on(df, weather, &self.config.join_key)?;

        if outcome.unmatched_rows > 0 {
            self.logger.warn(format_args!(
                "{} rows have no weather station for their {}",
                outcome.unmatched_rows, self.config.join_key
            ));
            self.summary.add_warning(format!(
                "{} rows without a weather station match",
                outcome.unmatched_rows
            ));
        }
        self.summary.unmatched_weather_rows = outcome.unmatched_rows;
        self.summary.add_action(ProcessingAction::new(
            ActionType::WeatherJoined,
            self.config.join_key.clone(),
            format!(
                "Joined weather stations: {} rows before, {} after",
                rows_before,
                outcome.df.height()
            ),
        ));

        self.df = Some(outcome.df);
        Ok(())
    }

    /// Drop the configured artifact column ("Unnamed: 0").
    ///
    /// A missing column is a schema error unless `require_artifact_column`
    /// is turned off, in which case it is logged and skipped.
    pub fn drop_artifact_column(&mut self) -> Result<()> {
        let column = self.config.artifact_column.clone();
        let df = self.table()?.clone();

        if df.column(&column).is_err() && !self.config.require_artifact_column {
            self.logger
                .warn(format_args!("Column '{column}' not present, nothing to drop"));
            self.summary
                .add_warning(format!("Artifact column '{column}' not present"));
            return Ok(());
        }

        self.df = Some(drop_column(df, &column)?);
        self.summary.add_action(ProcessingAction::new(
            ActionType::ColumnRemoved,
            column.clone(),
            format!("Dropped {column}"),
        ));
        Ok(())
    }

    /// Run the whole pipeline and return the cleaned table.
    ///
    /// The first failing step aborts the run; its error is returned unchanged.
    pub fn process(&mut self) -> Result<DataFrame> {
        let start_time = Instant::now();
        self.summary = ProcessingSummary::new();

        match self.process_internal() {
            Ok(df) => {
                self.summary.duration_ms = start_time.elapsed().as_millis() as u64;
                self.summary.rows_after = df.height();
                self.summary.columns_after = df.width();
                self.logger.debug(format_args!(
                    "Processing finished in {} ms: {} rows x {} columns ({} rows added by the weather join)",
                    self.summary.duration_ms,
                    df.height(),
                    df.width(),
                    self.summary.rows_added()
                ));
                self.report_progress(ProgressUpdate::complete("Processing completed successfully"));
                Ok(df)
            }
            Err(e) => {
                self.logger.error(format_args!("Processing failed: {e}"));
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                Err(e)
            }
        }
    }

    fn process_internal(&mut self) -> Result<DataFrame> {
        self.report_progress(ProgressUpdate::new(
            ProcessingStage::Ingestion,
            0.0,
            "Loading field data...",
        ));
        self.ingest_sql_data()?;

        self.report_progress(ProgressUpdate::new(
            ProcessingStage::ColumnRename,
            0.0,
            "Swapping mislabelled columns...",
        ));
        self.rename_columns()?;

        self.report_progress(ProgressUpdate::new(
            ProcessingStage::Corrections,
            0.0,
            "Applying corrections...",
        ));
        self.apply_default_corrections()?;

        self.report_progress(ProgressUpdate::new(
            ProcessingStage::WeatherMapping,
            0.0,
            "Mapping weather stations...",
        ));
        self.weather_station_mapping()?;

        self.report_progress(ProgressUpdate::new(
            ProcessingStage::Finalizing,
            0.0,
            "Dropping artifact column...",
        ));
        self.drop_artifact_column()?;

        Ok(self.table()?.clone())
    }
}

/// Builder for [`FieldDataProcessor`].
#[derive(Default)]
pub struct FieldDataProcessorBuilder {
    config: Option<FieldDataConfig>,
    log_level: LogLevel,
    connector: Option<Arc<dyn DatabaseConnector>>,
    fetcher: Option<Arc<dyn TableFetcher>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl FieldDataProcessorBuilder {
    /// Set the pipeline configuration (required).
    pub fn config(mut self, config: FieldDataConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the logging verbosity (default `INFO`).
    pub fn log_level(mut self, level: impl Into<LogLevel>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Replace the database collaborator (default [`SqliteConnector`]).
    pub fn connector(mut self, connector: Arc<dyn DatabaseConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replace the weather mapping collaborator (default [`CsvTableFetcher`]).
    pub fn fetcher(mut self, fetcher: Arc<dyn TableFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the processor.
    ///
    /// Fails if no configuration was given or it does not validate.
    pub fn build(self) -> Result<FieldDataProcessor> {
        let config = self.config.ok_or_else(|| {
            FieldDataError::InvalidConfig("a configuration is required".to_string())
        })?;
        config
            .validate()
            .map_err(|e| FieldDataError::InvalidConfig(e.to_string()))?;

        let fetcher: Arc<dyn TableFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(CsvTableFetcher::new()?),
        };

        Ok(FieldDataProcessor {
            config,
            logger: FieldLogger::new(self.log_level),
            connector: self.connector.unwrap_or_else(|| Arc::new(SqliteConnector)),
            fetcher,
            progress_reporter: self.progress_reporter,
            connection: None,
            df: None,
            summary: ProcessingSummary::new(),
        })
    }
}
