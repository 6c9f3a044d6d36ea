//! CLI entry point for the field data pipeline.

use anyhow::{Result, anyhow};
use clap::Parser;
use dotenv::dotenv;
use field_processing::{FieldDataConfig, FieldDataProcessor, LogLevel};
use polars::io::SerWriter;
use polars::io::csv::write::CsvWriter;
use polars::prelude::*;
use std::fs::File;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Field survey data processing",
    long_about = "Loads field survey records from SQLite, fixes swapped columns and \
                  crop names, and attaches weather stations.\n\n\
                  EXAMPLES:\n  \
                  # Print the processed table\n  \
                  field-processing -c config.json\n\n  \
                  # Write the result as CSV with debug logging\n  \
                  field-processing -c config.json -o cleaned.csv --log-level DEBUG"
)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (DEBUG, INFO, NONE)
    #[arg(short, long, default_value = "INFO")]
    log_level: String,

    /// Write the processed table to this CSV file instead of printing it
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the processing summary as JSON after the run
    #[arg(long)]
    summary: bool,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load environment variables (RUST_LOG) from .env file
    dotenv().ok();

    if !args.config.exists() {
        return Err(anyhow!("Config file not found: {}", args.config.display()));
    }

    let config = FieldDataConfig::from_json_file(&args.config)?;
    let log_level = LogLevel::parse(&args.log_level);
    let mut builder = FieldDataProcessor::builder()
        .config(config)
        .log_level(log_level);

    if !args.quiet && log_level != LogLevel::None {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }

    let mut processor = builder.build()?;
    let mut df = processor.process()?;

    match &args.output {
        Some(path) => {
            let mut file = File::create(path)?;
            CsvWriter::new(&mut file)
                .include_header(true)
                .finish(&mut df)?;
            println!("Wrote {} rows to {}", df.height(), path.display());
        }
        None => println!("{df}"),
    }

    if args.summary {
        println!("{}", serde_json::to_string_pretty(processor.summary())?);
    }

    Ok(())
}
