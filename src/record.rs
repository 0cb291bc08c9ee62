//! Records - typed rows of a validated fulfillment log
//!
//! Row-level data problems never fail the table: an unreadable date becomes `None`
//! (and the row drops out of every per-date aggregate), an unreadable unit count
//! becomes 0. Only a table in which *no* date parses is rejected.

use crate::error::{ReportError, Result};
use crate::normalize::{BlameLabel, StatusLabel};
use crate::schema;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{info, warn};

pub const STATUS_STD: &str = "상태_std";
pub const BLAME_STD: &str = "귀책_std";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub date: Option<NaiveDate>,
    pub order_id: String,
    pub units: u64,
    pub kind: String,
    pub status_raw: String,
    pub status: StatusLabel,
    pub pack_completed_at: String,
    pub sort_completed_at: String,
    pub packer_worker: String,
    pub sorter_worker: String,
    pub reason: String,
    pub blame_raw: String,
    pub blame: BlameLabel,
}

impl Record {
    /// Build a record from raw cell text, normalizing labels and coercing values.
    pub fn from_cells(cells: &RawCells<'_>) -> Self {
        Self {
            date: parse_date(cells.date),
            order_id: cells.order_id.trim().to_string(),
            units: coerce_units(cells.units),
            kind: cells.kind.trim().to_string(),
            status_raw: cells.status.to_string(),
            status: StatusLabel::normalize(cells.status),
            pack_completed_at: cells.pack_completed_at.trim().to_string(),
            sort_completed_at: cells.sort_completed_at.trim().to_string(),
            packer_worker: cells.packer_worker.trim().to_string(),
            sorter_worker: cells.sorter_worker.trim().to_string(),
            reason: cells.reason.trim().to_string(),
            blame_raw: cells.blame.to_string(),
            blame: BlameLabel::normalize(cells.blame),
        }
    }
}

/// Borrowed cell text of one row, nulls already replaced by ""
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCells<'a> {
    pub date: &'a str,
    pub order_id: &'a str,
    pub units: &'a str,
    pub kind: &'a str,
    pub status: &'a str,
    pub pack_completed_at: &'a str,
    pub sort_completed_at: &'a str,
    pub packer_worker: &'a str,
    pub sorter_worker: &'a str,
    pub reason: &'a str,
    pub blame: &'a str,
}

/// Parse a calendar date; date-times keep their date part. Unreadable → `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Largest unit count a single row can carry
pub const MAX_UNITS: u64 = i64::MAX as u64;

/// Read unit text as a non-negative count. Decimals truncate, negatives clamp to 0 and
/// values above `MAX_UNITS` clamp to it; `None` when the text is not a finite number.
pub fn parse_units(raw: &str) -> Option<u64> {
    let text = raw.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Some(n.max(0) as u64);
    }
    if text.parse::<u64>().is_ok() {
        return Some(MAX_UNITS);
    }
    match text.parse::<f64>() {
        // float-to-int `as` saturates at i64::MAX
        Ok(f) if f.is_finite() => Some((f.trunc() as i64).max(0) as u64),
        _ => None,
    }
}

/// Unit total that saturates at `u64::MAX` instead of overflowing
pub fn total_units<'a>(records: impl IntoIterator<Item = &'a Record>) -> u64 {
    records
        .into_iter()
        .fold(0u64, |acc, r| acc.saturating_add(r.units))
}

/// Unit count with everything unreadable coerced to 0
pub fn coerce_units(raw: &str) -> u64 {
    parse_units(raw).unwrap_or(0)
}

fn string_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a StringChunked> {
    Ok(df.column(name)?.str()?)
}

/// The immutable, validated and normalized record set of one invocation
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Build records from a schema-validated frame (string columns, canonical names).
    ///
    /// Fails with `DateParse` when no row carries a readable date.
    pub fn from_validated(df: &DataFrame) -> Result<Self> {
        let dates = string_column(df, schema::DATE)?;
        let order_ids = string_column(df, schema::ORDER_ID)?;
        let units = string_column(df, schema::UNITS)?;
        let kinds = string_column(df, schema::KIND)?;
        let statuses = string_column(df, schema::STATUS)?;
        let packed = string_column(df, schema::PACK_COMPLETED_AT)?;
        let sorted = string_column(df, schema::SORT_COMPLETED_AT)?;
        let packers = string_column(df, schema::PACKER_WORKER)?;
        let sorters = string_column(df, schema::SORTER_WORKER)?;
        let reasons = string_column(df, schema::REASON)?;
        let blames = string_column(df, schema::BLAME)?;

        let mut records = Vec::with_capacity(df.height());
        let mut unreadable_units = 0usize;
        for idx in 0..df.height() {
            if let Some(raw) = units.get(idx) {
                if !raw.trim().is_empty() && parse_units(raw).is_none() {
                    unreadable_units += 1;
                }
            }
            let cells = RawCells {
                date: dates.get(idx).unwrap_or(""),
                order_id: order_ids.get(idx).unwrap_or(""),
                units: units.get(idx).unwrap_or(""),
                kind: kinds.get(idx).unwrap_or(""),
                status: statuses.get(idx).unwrap_or(""),
                pack_completed_at: packed.get(idx).unwrap_or(""),
                sort_completed_at: sorted.get(idx).unwrap_or(""),
                packer_worker: packers.get(idx).unwrap_or(""),
                sorter_worker: sorters.get(idx).unwrap_or(""),
                reason: reasons.get(idx).unwrap_or(""),
                blame: blames.get(idx).unwrap_or(""),
            };
            records.push(Record::from_cells(&cells));
        }

        let set = Self::new(records);
        set.log_coercions(unreadable_units);
        if set.dates().is_empty() {
            return Err(ReportError::DateParse {
                column: schema::DATE.to_string(),
            });
        }
        Ok(set)
    }

    fn log_coercions(&self, unreadable_units: usize) {
        let undated = self.records.iter().filter(|r| r.date.is_none()).count();
        if undated > 0 {
            warn!(
                "{} of {} rows have no readable date and are excluded from daily figures",
                undated,
                self.records.len()
            );
        }
        if unreadable_units > 0 {
            warn!("{} rows had unreadable unit counts, coerced to 0", unreadable_units);
        }
        info!(
            "Normalized {} records over {} dates",
            self.records.len(),
            self.dates().len()
        );
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct readable dates, ascending
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records
            .iter()
            .filter_map(|r| r.date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.records.iter().filter_map(|r| r.date).max()
    }

    /// Records dated `date`
    pub fn on(&self, date: NaiveDate) -> Vec<&Record> {
        self.records.iter().filter(|r| r.date == Some(date)).collect()
    }

    /// The cleaned table: required fields in canonical order plus the normalized labels.
    /// Dates render as `YYYY-MM-DD` (empty when unreadable), units as the coerced count.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        frame_of(self.records.iter())
    }
}

/// Frame of the given records, same layout as `RecordSet::to_dataframe`.
/// Blank text becomes null so exports leave the cell empty.
pub fn frame_of<'a>(records: impl Iterator<Item = &'a Record>) -> Result<DataFrame> {
    let records: Vec<&Record> = records.collect();
    let text = |field: fn(&Record) -> &str| -> Vec<Option<String>> {
        records.iter().map(|r| non_blank(field(r))).collect()
    };

    let dates: Vec<Option<String>> = records
        .iter()
        .map(|r| r.date.map(|d| d.format("%Y-%m-%d").to_string()))
        .collect();
    let units = records
        .iter()
        .map(|r| i64::try_from(r.units).map_err(|_| ReportError::UnitRange(r.units)))
        .collect::<Result<Vec<i64>>>()?;

    let df = DataFrame::new(vec![
        Series::new(schema::DATE, dates),
        Series::new(schema::ORDER_ID, text(|r| r.order_id.as_str())),
        Series::new(schema::UNITS, units),
        Series::new(schema::KIND, text(|r| r.kind.as_str())),
        Series::new(schema::STATUS, text(|r| r.status_raw.as_str())),
        Series::new(schema::PACK_COMPLETED_AT, text(|r| r.pack_completed_at.as_str())),
        Series::new(schema::SORT_COMPLETED_AT, text(|r| r.sort_completed_at.as_str())),
        Series::new(schema::PACKER_WORKER, text(|r| r.packer_worker.as_str())),
        Series::new(schema::SORTER_WORKER, text(|r| r.sorter_worker.as_str())),
        Series::new(schema::REASON, text(|r| r.reason.as_str())),
        Series::new(schema::BLAME, text(|r| r.blame_raw.as_str())),
        Series::new(STATUS_STD, text(|r| r.status.as_str())),
        Series::new(BLAME_STD, text(|r| r.blame.as_str())),
    ])?;
    Ok(df)
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
