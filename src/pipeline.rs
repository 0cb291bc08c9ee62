//! Pipeline - raw table → validated table → normalized records
//!
//! Each stage produces a new value; nothing is shared between invocations. Structural
//! failures (missing fields, no readable dates) stop here, before any metric exists.

use crate::config::ReportConfig;
use crate::error::Result;
use crate::record::RecordSet;
use crate::schema;
use crate::source::TableSource;
use crate::totals::DailyTotals;
use polars::prelude::DataFrame;
use tracing::info;

/// Validate and normalize a raw table
pub fn prepare(raw: DataFrame) -> Result<RecordSet> {
    let validated = schema::validate(raw)?;
    RecordSet::from_validated(&validated)
}

/// Everything one report invocation works from
#[derive(Debug, Clone)]
pub struct Inputs {
    pub records: RecordSet,
    pub totals: DailyTotals,
}

/// Load the log (required) and the reference totals (optional) and prepare records.
pub async fn load_inputs(
    log: &dyn TableSource,
    totals: Option<&dyn TableSource>,
    config: &ReportConfig,
) -> Result<Inputs> {
    info!("Loading fulfillment log from {}", log.describe());
    let raw = log.load().await?;
    let records = prepare(raw)?;

    let totals = match totals {
        Some(source) => DailyTotals::load_optional(source, config).await,
        None => DailyTotals::new(),
    };
    Ok(Inputs { records, totals })
}
