//! Data sources for the pipeline.
//!
//! The processor never talks to SQLite or HTTP directly. It goes through two
//! small traits so callers (and tests) can plug in their own sources:
//!
//! - [`DatabaseConnector`] / [`DatabaseConnection`]: open a database from a
//!   location string, then run the configured query.
//! - [`TableFetcher`]: load the weather-station mapping from a URL or path.
//!
//! Default implementations are [`SqliteConnector`] and [`CsvTableFetcher`].

use crate::error::{FieldDataError, Result, ResultExt};
use polars::io::SerReader;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use std::io::Cursor;
use std::path::{Path, PathBuf};

#[cfg(feature = "remote")]
use reqwest::blocking::Client;

/// Opens database connections from a location string.
pub trait DatabaseConnector: Send + Sync {
    /// Open a connection. Failure is reported as an ingestion error.
    fn connect(&self, location: &str) -> Result<Box<dyn DatabaseConnection>>;
}

/// An open database connection able to run a query into a table.
pub trait DatabaseConnection: Send {
    /// Run `sql` and collect the full result set.
    fn query(&self, sql: &str) -> Result<DataFrame>;
}

/// Fetches a CSV table from a locator.
pub trait TableFetcher: Send + Sync {
    fn fetch(&self, locator: &str) -> Result<DataFrame>;
}

// =============================================================================
// SQLite
// =============================================================================

/// [`DatabaseConnector`] backed by SQLite files.
///
/// Accepts a plain path (`farm_survey.db`) or an SQLAlchemy-style URL
/// (`sqlite:///farm_survey.db`, `sqlite:////abs/farm_survey.db`).
/// Databases are opened read-only, so a missing file is an error instead of
/// silently creating an empty database.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnector;

impl SqliteConnector {
    /// Resolve a location string to a filesystem path.
    pub fn resolve_path(location: &str) -> PathBuf {
        let trimmed = location.trim();
        let path = trimmed
            .strip_prefix("sqlite:///")
            .or_else(|| trimmed.strip_prefix("sqlite://"))
            .unwrap_or(trimmed);
        PathBuf::from(path)
    }
}

impl DatabaseConnector for SqliteConnector {
    fn connect(&self, location: &str) -> Result<Box<dyn DatabaseConnection>> {
        let path = Self::resolve_path(location);
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(|e| FieldDataError::IngestionFailed {
            location: location.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Box::new(SqliteConnection {
            conn,
            location: location.to_string(),
        }))
    }
}

/// An open read-only SQLite connection.
pub struct SqliteConnection {
    conn: Connection,
    location: String,
}

impl SqliteConnection {
    fn ingestion_error(&self, e: impl ToString) -> FieldDataError {
        FieldDataError::IngestionFailed {
            location: self.location.clone(),
            reason: e.to_string(),
        }
    }
}

impl DatabaseConnection for SqliteConnection {
    fn query(&self, sql: &str) -> Result<DataFrame> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| self.ingestion_error(e))?;

        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let mut values: Vec<Vec<Value>> = vec![Vec::new(); names.len()];

        let mut rows = stmt.query([]).map_err(|e| self.ingestion_error(e))?;
        while let Some(row) = rows.next().map_err(|e| self.ingestion_error(e))? {
            for (idx, column) in values.iter_mut().enumerate() {
                let value: Value = row.get(idx).map_err(|e| self.ingestion_error(e))?;
                column.push(value);
            }
        }

        let columns: Vec<Column> = names
            .iter()
            .zip(values)
            .map(|(name, column)| sqlite_values_to_column(name, column))
            .collect();

        DataFrame::new(columns).context("Failed to assemble query result")
    }
}

/// Convert one result column into a polars column.
///
/// SQLite is dynamically typed per value, so the dtype is chosen from the
/// widest storage class present: text > real > integer. Columns that are
/// entirely NULL get the `Null` dtype.
pub(crate) fn sqlite_values_to_column(name: &str, values: Vec<Value>) -> Column {
    let mut has_integer = false;
    let mut has_real = false;
    let mut has_text = false;

    for value in &values {
        match value {
            Value::Null => {}
            Value::Integer(_) => has_integer = true,
            Value::Real(_) => has_real = true,
            Value::Text(_) | Value::Blob(_) => has_text = true,
        }
    }

    let series = if has_text {
        let converted: Vec<Option<String>> = values
            .into_iter()
            .map(|value| match value {
                Value::Null => None,
                Value::Integer(v) => Some(v.to_string()),
                Value::Real(v) => Some(v.to_string()),
                Value::Text(v) => Some(v),
                Value::Blob(v) => Some(String::from_utf8_lossy(&v).into_owned()),
            })
            .collect();
        Series::new(name.into(), converted)
    } else if has_real {
        let converted: Vec<Option<f64>> = values
            .into_iter()
            .map(|value| match value {
                Value::Integer(v) => Some(v as f64),
                Value::Real(v) => Some(v),
                _ => None,
            })
            .collect();
        Series::new(name.into(), converted)
    } else if has_integer {
        let converted: Vec<Option<i64>> = values
            .into_iter()
            .map(|value| match value {
                Value::Integer(v) => Some(v),
                _ => None,
            })
            .collect();
        Series::new(name.into(), converted)
    } else {
        Series::full_null(name.into(), values.len(), &DataType::Null)
    };

    Column::from(series)
}

// =============================================================================
// CSV
// =============================================================================

/// [`TableFetcher`] for CSV files with a header row.
///
/// `http://` and `https://` locators are downloaded with a blocking client
/// (requires the `remote` feature); everything else is read from disk.
pub struct CsvTableFetcher {
    #[cfg(feature = "remote")]
    client: Client,
}

impl CsvTableFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            #[cfg(feature = "remote")]
            client: Client::builder().build()?,
        })
    }

    /// Whether a locator points at an HTTP(S) resource.
    pub fn is_remote(locator: &str) -> bool {
        let lower = locator.trim_start().to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }

    #[cfg(feature = "remote")]
    fn download(&self, locator: &str) -> Result<Vec<u8>> {
        let response = self.client.get(locator).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FieldDataError::FetchFailed {
                locator: locator.to_string(),
                reason: format!("HTTP status {status}"),
            });
        }
        Ok(response.bytes()?.to_vec())
    }

    #[cfg(not(feature = "remote"))]
    fn download(&self, locator: &str) -> Result<Vec<u8>> {
        Err(FieldDataError::FetchFailed {
            locator: locator.to_string(),
            reason: "remote locators require the 'remote' feature".to_string(),
        })
    }

    fn read_local(&self, locator: &str) -> Result<DataFrame> {
        let path = Path::new(locator);
        if !path.is_file() {
            return Err(FieldDataError::FetchFailed {
                locator: locator.to_string(),
                reason: "file not found".to_string(),
            });
        }

        CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .context(format!("Failed to parse CSV from '{locator}'"))
    }
}

impl TableFetcher for CsvTableFetcher {
    fn fetch(&self, locator: &str) -> Result<DataFrame> {
        if !Self::is_remote(locator) {
            return self.read_local(locator);
        }

        let body = self.download(locator)?;
        CsvReadOptions::default()
            .with_has_header(true)
            .into_reader_with_file_handle(Cursor::new(body))
            .finish()
            .context(format!("Failed to parse CSV from '{locator}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_survey_db(dir: &Path) -> PathBuf {
        let path = dir.join("survey.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE geographic_features (
                "Unnamed: 0" INTEGER,
                Field_ID INTEGER,
                Elevation REAL,
                Crop_type TEXT,
                Notes TEXT
            );
            INSERT INTO geographic_features VALUES (0, 40734, 786.05, 'cassava', NULL);
            INSERT INTO geographic_features VALUES (1, 30629, -674.89, 'wheat ', NULL);
            INSERT INTO geographic_features VALUES (2, 39924, 826, 'tea', NULL);
            "#,
        )
        .unwrap();
        path
    }

    #[test]
    fn test_resolve_path_strips_sqlalchemy_prefix() {
        assert_eq!(
            SqliteConnector::resolve_path("sqlite:///Maji_Ndogo_farm_survey_small.db"),
            PathBuf::from("Maji_Ndogo_farm_survey_small.db")
        );
        assert_eq!(
            SqliteConnector::resolve_path("sqlite:////data/farm.db"),
            PathBuf::from("/data/farm.db")
        );
        assert_eq!(
            SqliteConnector::resolve_path("farm.db"),
            PathBuf::from("farm.db")
        );
    }

    #[test]
    fn test_sqlite_query_infers_dtypes() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_survey_db(dir.path());

        let conn = SqliteConnector
            .connect(path.to_str().unwrap())
            .expect("database should open");
        let df = conn.query("SELECT * FROM geographic_features").unwrap();

        assert_eq!(df.shape(), (3, 5));
        assert_eq!(df.column("Unnamed: 0").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("Field_ID").unwrap().dtype(), &DataType::Int64);
        // 826 is stored as an integer but the column also holds reals.
        assert_eq!(df.column("Elevation").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("Crop_type").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("Notes").unwrap().dtype(), &DataType::Null);

        let crops: Vec<Option<&str>> = df
            .column("Crop_type")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(crops, vec![Some("cassava"), Some("wheat "), Some("tea")]);
    }

    #[test]
    fn test_sqlite_missing_database_is_ingestion_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.db");

        let result = SqliteConnector.connect(missing.to_str().unwrap());
        let error = result.err().expect("missing file must not open");
        assert!(error.is_ingestion_error());
    }

    #[test]
    fn test_sqlite_bad_query_is_ingestion_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_survey_db(dir.path());

        let conn = SqliteConnector.connect(path.to_str().unwrap()).unwrap();
        let error = conn.query("SELECT * FROM no_such_table").unwrap_err();
        assert!(error.is_ingestion_error());
        assert!(error.to_string().contains("no_such_table"));
    }

    #[test]
    fn test_mixed_text_column_renders_numbers() {
        let column = sqlite_values_to_column(
            "mixed",
            vec![
                Value::Integer(3),
                Value::Text("three".to_string()),
                Value::Null,
            ],
        );
        let values: Vec<Option<&str>> = column.as_materialized_series().str().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some("3"), Some("three"), None]);
    }

    #[test]
    fn test_is_remote() {
        assert!(CsvTableFetcher::is_remote("https://example.org/map.csv"));
        assert!(CsvTableFetcher::is_remote("HTTP://example.org/map.csv"));
        assert!(!CsvTableFetcher::is_remote("data/map.csv"));
    }

    #[test]
    fn test_fetch_local_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Field_ID,Weather_station").unwrap();
        writeln!(file, "40734,0").unwrap();
        writeln!(file, "30629,1").unwrap();
        drop(file);

        let fetcher = CsvTableFetcher::new().unwrap();
        let df = fetcher.fetch(path.to_str().unwrap()).unwrap();
        assert_eq!(df.shape(), (2, 2));
        assert!(df.column("Weather_station").is_ok());
    }

    #[test]
    fn test_fetch_missing_local_file() {
        let fetcher = CsvTableFetcher::new().unwrap();
        let error = fetcher.fetch("/definitely/not/here.csv").unwrap_err();
        assert_eq!(error.error_code(), "FETCH_ERROR");
    }
}
