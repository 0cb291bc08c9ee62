//! Authoritative daily unit totals from the reference sheet
//!
//! The sheet is keyed by date; the total column may carry thousands separators
//! (`1,234,567`). Rows whose date or total cannot be read are skipped.

use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::record::parse_date;
use crate::source::TableSource;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use polars::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

lazy_static! {
    static ref DIGIT_SEPARATORS: Regex = Regex::new(r"[,\s_']").expect("valid separator regex");
}

/// Date → authoritative total unit count. At most one entry per date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyTotals {
    totals: BTreeMap<NaiveDate, u64>,
}

impl DailyTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, total: u64) -> Option<u64> {
        self.totals.insert(date, total)
    }

    pub fn get(&self, date: NaiveDate) -> Option<u64> {
        self.totals.get(&date).copied()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Read totals from a reference frame, locating the date and total columns among
    /// the names accepted by `config`.
    pub fn from_frame(df: &DataFrame, config: &ReportConfig) -> Result<Self> {
        let date_col = find_column(df, &config.totals_date_columns)?;
        let value_col = find_column(df, &config.totals_value_columns)?;
        debug!("Reference totals: date column '{}', total column '{}'", date_col, value_col);

        let dates = df.column(&date_col)?.cast(&DataType::String)?;
        let values = df.column(&value_col)?.cast(&DataType::String)?;
        let dates = dates.str()?;
        let values = values.str()?;

        let mut totals = Self::new();
        let mut skipped = 0usize;
        for idx in 0..df.height() {
            let date = dates.get(idx).and_then(parse_date);
            let total = values.get(idx).and_then(parse_total);
            match (date, total) {
                (Some(date), Some(total)) => {
                    if let Some(previous) = totals.insert(date, total) {
                        warn!(
                            "Duplicate reference total for {}: {} replaced by {}",
                            date, previous, total
                        );
                    }
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!("Skipped {} unreadable reference total rows", skipped);
        }
        info!("Loaded {} authoritative daily totals", totals.len());
        Ok(totals)
    }

    /// Load totals from a source. A failed load is not fatal: it is logged and an empty
    /// map is returned, so denominators fall back to row sums.
    pub async fn load_optional(source: &dyn TableSource, config: &ReportConfig) -> Self {
        let loaded = match source.load().await {
            Ok(df) => Self::from_frame(&df, config),
            Err(e) => Err(e),
        };
        match loaded {
            Ok(totals) => totals,
            Err(e) => {
                warn!(
                    "Reference totals from {} unavailable, using row sums: {}",
                    source.describe(),
                    e
                );
                Self::new()
            }
        }
    }
}

/// Parse a total with thousands separators stripped. Negative or non-integral → `None`.
pub fn parse_total(raw: &str) -> Option<u64> {
    let cleaned = DIGIT_SEPARATORS.replace_all(raw.trim(), "");
    if let Ok(n) = cleaned.parse::<u64>() {
        return Some(n);
    }
    match cleaned.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Some(f as u64),
        _ => None,
    }
}

fn find_column(df: &DataFrame, candidates: &[String]) -> Result<String> {
    let names = df.get_column_names();
    for candidate in candidates {
        if let Some(name) = names.iter().find(|n| n.trim() == candidate.as_str()) {
            return Ok(name.to_string());
        }
    }
    Err(ReportError::SourceLoad(format!(
        "reference totals need one of [{}], found [{}]",
        candidates.join(", "),
        names.join(", ")
    )))
}
