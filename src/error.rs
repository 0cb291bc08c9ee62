use itertools::Itertools;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error(
        "Schema error: missing required fields [{}]; found columns [{}]",
        .missing.iter().join(", "),
        .found.iter().join(", ")
    )]
    Schema {
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("Date parse error: no row of column '{column}' could be read as a calendar date (expected YYYY-MM-DD)")]
    DateParse { column: String },

    #[error("No records dated {0}")]
    NoRecords(chrono::NaiveDate),

    #[error("Unit count {0} is out of range")]
    UnitRange(u64),

    #[error("Source load error: {0}")]
    SourceLoad(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

pub type Result<T> = std::result::Result<T, ReportError>;
