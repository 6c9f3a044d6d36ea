//! Integration tests for the field data pipeline.
//!
//! These tests run the processor against a real SQLite database created in a
//! temporary directory and CSV fixtures on disk.

use field_processing::{FieldDataConfig, FieldDataError, FieldDataProcessor, JoinSide};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> String {
    fixtures_path().join(name).to_string_lossy().into_owned()
}

/// Three survey rows plus the exported index column.
fn create_survey_db(dir: &Path) -> PathBuf {
    let path = dir.join("field_survey.db");
    let conn = Connection::open(&path).expect("Failed to create database");
    conn.execute_batch(
        r#"
        CREATE TABLE geographic_features (
            "Unnamed: 0" INTEGER,
            Field_ID INTEGER,
            Elevation REAL,
            Crop_type TEXT,
            Soil_type TEXT
        );
        INSERT INTO geographic_features VALUES (0, 1, -5.0, 'cassava ', 'Sandy');
        INSERT INTO geographic_features VALUES (1, 2, 3.2, 'Wheat', 'Clay');
        INSERT INTO geographic_features VALUES (2, 3, -1.0, 'teff', 'Loam');
        "#,
    )
    .expect("Failed to seed database");
    path
}

fn base_config(db: &Path) -> field_processing::FieldDataConfigBuilder {
    FieldDataConfig::builder()
        .db_path(format!("sqlite:///{}", db.display()))
        .sql_query("SELECT * FROM geographic_features")
        .weather_mapping_csv(fixture("weather_station_mapping_unique.csv"))
}

fn strings(df: &DataFrame, column: &str) -> Vec<Option<String>> {
    df.column(column)
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

fn floats(df: &DataFrame, column: &str) -> Vec<Option<f64>> {
    df.column(column)
        .unwrap()
        .as_materialized_series()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

fn processor(config: FieldDataConfig) -> FieldDataProcessor {
    FieldDataProcessor::new(config, "NONE").expect("Failed to build processor")
}

fn setup() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db = create_survey_db(dir.path());
    (dir, db)
}

// ============================================================================
// Full Pipeline Tests
// ============================================================================

#[test]
fn test_full_pipeline_with_swapped_crop_and_soil() {
    let (_dir, db) = setup();
    let config = base_config(&db)
        .columns_to_rename("Crop_type", "Soil_type")
        .value_to_rename("Sandy", "Sand")
        .build()
        .unwrap();

    let mut processor = processor(config);
    let df = processor.process().expect("Pipeline should complete successfully");

    assert_eq!(df.height(), 3);
    assert!(df.column("Unnamed: 0").is_err(), "artifact column dropped");
    assert_eq!(
        strings(&df, "Crop_type"),
        vec![Some("Sand".into()), Some("Clay".into()), Some("Loam".into())]
    );
    assert_eq!(
        strings(&df, "Soil_type"),
        vec![Some("cassava ".into()), Some("Wheat".into()), Some("teff".into())]
    );
    assert_eq!(floats(&df, "Elevation"), vec![Some(5.0), Some(3.2), Some(1.0)]);

    let stations: Vec<Option<i64>> = df
        .column("Weather_station")
        .unwrap()
        .as_materialized_series()
        .i64()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(stations, vec![Some(0), Some(1), Some(2)]);

    let summary = processor.summary();
    assert_eq!(summary.rows_ingested, 3);
    assert_eq!(summary.columns_ingested, 5);
    assert_eq!(summary.columns_after, 5);
}

#[test]
fn test_swap_then_correct_only_touches_current_labels() {
    let (_dir, db) = setup();
    let config = base_config(&db)
        .columns_to_rename("Elevation", "Soil_type")
        .value_to_rename("cassava ", "Cassava")
        .build()
        .unwrap();

    let mut processor = processor(config);
    processor.ingest_sql_data().unwrap();
    processor.rename_columns().unwrap();

    // The soil data now sits under "Elevation", so the default correction
    // refuses to take absolute values of strings.
    let error = processor.apply_default_corrections().unwrap_err();
    assert!(error.is_type_error());

    // The elevation readings are now labelled "Soil_type".
    processor.apply_corrections("Crop_type", "Soil_type").unwrap();
    let df = processor.dataframe().unwrap();

    assert_eq!(
        strings(df, "Crop_type"),
        vec![Some("Cassava".into()), Some("Wheat".into()), Some("teff".into())]
    );
    assert_eq!(floats(df, "Soil_type"), vec![Some(5.0), Some(3.2), Some(1.0)]);
    assert_eq!(
        strings(df, "Elevation"),
        vec![Some("Sandy".into()), Some("Clay".into()), Some("Loam".into())]
    );
}

#[test]
fn test_mapping_keys_must_match_unstripped_values() {
    let (_dir, db) = setup();
    let config = base_config(&db)
        .columns_to_rename("Crop_type", "Crop_type")
        .value_to_rename("cassava", "Cassava")
        .build()
        .unwrap();

    let mut processor = processor(config);
    let df = processor.process().unwrap();

    assert_eq!(
        strings(&df, "Crop_type"),
        vec![Some("cassava".into()), Some("Wheat".into()), Some("teff".into())]
    );
}

#[test]
fn test_corrections_are_idempotent() {
    let (_dir, db) = setup();
    let config = base_config(&db)
        .columns_to_rename("Crop_type", "Crop_type")
        .value_to_rename("teff", "Teff")
        .build()
        .unwrap();

    let mut processor = processor(config);
    processor.ingest_sql_data().unwrap();
    processor.apply_default_corrections().unwrap();
    let once = processor.dataframe().unwrap().clone();
    processor.apply_default_corrections().unwrap();

    assert!(processor.dataframe().unwrap().equals(&once));
    assert!(
        floats(&once, "Elevation")
            .into_iter()
            .all(|v| v.is_some_and(|v| v >= 0.0))
    );
}

// ============================================================================
// Weather Join Tests
// ============================================================================

#[test]
fn test_weather_join_keeps_unmatched_and_duplicates_rows() {
    let (_dir, db) = setup();
    let config = base_config(&db)
        .columns_to_rename("Crop_type", "Crop_type")
        .weather_mapping_csv(fixture("weather_station_mapping.csv"))
        .build()
        .unwrap();

    let mut processor = processor(config);
    processor.ingest_sql_data().unwrap();
    let before = processor.dataframe().unwrap().clone();
    processor.weather_station_mapping().unwrap();
    let after = processor.dataframe().unwrap();

    // Field 2 has two stations, field 3 has none.
    assert_eq!(after.height(), 4);
    assert!(after.height() >= before.height());
    assert_eq!(processor.summary().unmatched_weather_rows, 1);

    let ids: Vec<Option<i64>> = after
        .column("Field_ID")
        .unwrap()
        .as_materialized_series()
        .i64()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(ids, vec![Some(1), Some(2), Some(2), Some(3)]);

    // Pre-join columns are carried over unchanged.
    assert_eq!(
        strings(after, "Soil_type"),
        vec![
            Some("Sandy".into()),
            Some("Clay".into()),
            Some("Clay".into()),
            Some("Loam".into())
        ]
    );
}

#[test]
fn test_weather_join_without_field_id_is_join_error() {
    let (_dir, db) = setup();
    let config = base_config(&db)
        .sql_query("SELECT \"Unnamed: 0\", Elevation, Crop_type, Soil_type FROM geographic_features")
        .columns_to_rename("Crop_type", "Crop_type")
        .build()
        .unwrap();

    let mut processor = processor(config);
    let error = processor.process().unwrap_err();

    assert!(matches!(
        error,
        FieldDataError::JoinKeyMissing {
            side: JoinSide::Left,
            ..
        }
    ));
    assert_eq!(error.error_code(), "JOIN_ERROR");
}

#[test]
fn test_missing_weather_file_is_fetch_error() {
    let (_dir, db) = setup();
    let config = base_config(&db)
        .columns_to_rename("Crop_type", "Crop_type")
        .weather_mapping_csv(fixture("no_such_mapping.csv"))
        .build()
        .unwrap();

    let error = processor(config).process().unwrap_err();
    assert_eq!(error.error_code(), "FETCH_ERROR");
}

// ============================================================================
// Failure Tests
// ============================================================================

#[test]
fn test_missing_database_is_ingestion_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(&dir.path().join("missing.db"))
        .columns_to_rename("Crop_type", "Soil_type")
        .build()
        .unwrap();

    let mut processor = processor(config);
    let error = processor.process().unwrap_err();

    assert!(error.is_ingestion_error());
    assert!(processor.dataframe().is_none());
    assert!(!processor.is_connected());
}

#[test]
fn test_missing_rename_column_is_schema_error() {
    let (_dir, db) = setup();
    let config = base_config(&db)
        .columns_to_rename("Annual_yield", "Crop_type")
        .build()
        .unwrap();

    let error = processor(config).process().unwrap_err();
    assert!(matches!(error, FieldDataError::ColumnNotFound(ref c) if c == "Annual_yield"));
    assert_eq!(error.error_code(), "SCHEMA_ERROR");
}

#[test]
fn test_missing_artifact_column() {
    let (_dir, db) = setup();
    let query = "SELECT Field_ID, Elevation, Crop_type, Soil_type FROM geographic_features";

    let strict = base_config(&db)
        .sql_query(query)
        .columns_to_rename("Crop_type", "Soil_type")
        .build()
        .unwrap();
    let error = processor(strict).process().unwrap_err();
    assert!(error.is_schema_error());

    let lenient = base_config(&db)
        .sql_query(query)
        .columns_to_rename("Crop_type", "Soil_type")
        .require_artifact_column(false)
        .build()
        .unwrap();
    let df = processor(lenient).process().unwrap();
    assert_eq!(df.width(), 5);
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_pipeline_from_json_config() {
    let (dir, db) = setup();
    let config_path = dir.path().join("config.json");
    let json = serde_json::json!({
        "db_path": format!("sqlite:///{}", db.display()),
        "sql_query": "SELECT * FROM geographic_features",
        "columns_to_rename": {"Crop_type": "Soil_type"},
        "values_to_rename": {},
        "weather_mapping_csv": fixture("weather_station_mapping_unique.csv"),
    });
    std::fs::write(&config_path, json.to_string()).unwrap();

    let config = FieldDataConfig::from_json_file(&config_path).unwrap();
    let df = processor(config).process().unwrap();

    assert_eq!(df.shape(), (3, 5));
}
