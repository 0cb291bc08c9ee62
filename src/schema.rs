//! Schema validation for uploaded fulfillment logs.
//!
//! Header variants are folded onto canonical names first, then the table must carry every
//! required field. Validation is all-or-nothing: a table with any field missing is rejected
//! before a single row is looked at.

use crate::error::{ReportError, Result};
use lazy_static::lazy_static;
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

pub const DATE: &str = "날짜";
pub const ORDER_ID: &str = "주문번호";
pub const UNITS: &str = "유닛";
pub const KIND: &str = "타입";
pub const STATUS: &str = "상태";
pub const PACK_COMPLETED_AT: &str = "포장완료시간";
pub const SORT_COMPLETED_AT: &str = "분류완료시간";
pub const PACKER_WORKER: &str = "포장작업자";
pub const SORTER_WORKER: &str = "풋월작업자";
pub const REASON: &str = "사유";
pub const BLAME: &str = "귀책";

/// Required fields in canonical order
pub const REQUIRED_FIELDS: [&str; 11] = [
    DATE,
    ORDER_ID,
    UNITS,
    KIND,
    STATUS,
    PACK_COMPLETED_AT,
    SORT_COMPLETED_AT,
    PACKER_WORKER,
    SORTER_WORKER,
    REASON,
    BLAME,
];

lazy_static! {
    /// Alternate header spellings seen in exports, keyed by the variant
    static ref FIELD_SYNONYMS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("포장 완료시간", PACK_COMPLETED_AT);
        m.insert("포장완료일시", PACK_COMPLETED_AT);
        m.insert("분류 완료시간", SORT_COMPLETED_AT);
        m.insert("분류완료일시", SORT_COMPLETED_AT);
        m
    };
}

/// Canonical name for a header, if it is a known synonym
pub fn canonical_field(header: &str) -> Option<&'static str> {
    FIELD_SYNONYMS.get(header.trim()).copied()
}

/// Rename synonym headers to their canonical names.
///
/// A synonym is ignored when the canonical column (or an earlier synonym of it) is
/// already present, so folding never produces duplicate columns.
pub fn fold_synonyms(mut df: DataFrame) -> Result<DataFrame> {
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let mut present: HashSet<String> = names.iter().cloned().collect();

    for name in &names {
        let trimmed = name.trim();
        let target = canonical_field(trimmed).unwrap_or(trimmed);
        if target == name.as_str() {
            continue;
        }
        if present.contains(target) {
            debug!("Ignoring header '{}': '{}' already present", name, target);
            continue;
        }
        debug!("Folding header '{}' -> '{}'", name, target);
        df.rename(name, target)?;
        present.remove(name);
        present.insert(target.to_string());
    }
    Ok(df)
}

/// Fields of `REQUIRED_FIELDS` absent from `columns`, in canonical order
pub fn missing_fields(columns: &[&str]) -> Vec<String> {
    REQUIRED_FIELDS
        .iter()
        .filter(|field| !columns.contains(field))
        .map(|field| field.to_string())
        .collect()
}

/// Fold synonyms, check required fields, and return the table restricted to the required
/// fields in canonical order with every column cast to string.
pub fn validate(df: DataFrame) -> Result<DataFrame> {
    let found: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let folded = fold_synonyms(df)?;

    let missing = missing_fields(&folded.get_column_names());
    if !missing.is_empty() {
        return Err(ReportError::Schema { missing, found });
    }

    let selected = folded.select(REQUIRED_FIELDS)?;
    let columns = selected
        .get_columns()
        .iter()
        .map(|s| s.cast(&DataType::String))
        .collect::<PolarsResult<Vec<_>>>()?;
    let validated = DataFrame::new(columns)?;

    info!(
        "Schema OK: {} rows, {} of {} columns kept",
        validated.height(),
        REQUIRED_FIELDS.len(),
        found.len()
    );
    Ok(validated)
}
