//! Metric Engine - matched units, rates against a denominator, and grouped summaries
//!
//! Every rate on the dashboard (actual, OF-fault only, recoverable-excluded) is the same
//! formula `matched_units / denominator` with a different `RateQuery`.

use crate::error::Result;
use crate::normalize::{BlameLabel, StatusLabel};
use crate::record::{frame_of, total_units, Record, BLAME_STD, STATUS_STD};
use crate::schema;
use polars::prelude::*;
use serde::Serialize;

const COUNT_COL: &str = "건수";
const UNITS_COL: &str = "유닛";

/// Which records count toward a rate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateQuery {
    /// Normalized statuses that match
    pub statuses: Vec<StatusLabel>,
    /// Normalized blames that match; `None` accepts any blame
    pub blames: Option<Vec<BlameLabel>>,
}

impl RateQuery {
    pub fn new(statuses: Vec<StatusLabel>) -> Self {
        Self {
            statuses,
            blames: None,
        }
    }

    pub fn with_blames(mut self, blames: Vec<BlameLabel>) -> Self {
        self.blames = Some(blames);
        self
    }

    /// Status in the status set, blame in the blame set (if any), blame not excluded
    pub fn matches(&self, record: &Record, excluded: &[BlameLabel]) -> bool {
        self.statuses.contains(&record.status)
            && self
                .blames
                .as_ref()
                .map_or(true, |blames| blames.contains(&record.blame))
            && !excluded.contains(&record.blame)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateMetric {
    pub matched_units: u64,
    pub denominator: u64,
    /// Fraction, 0.0001 = 0.01%
    pub rate: f64,
    pub target: f64,
    /// `rate - target` in percentage points
    pub delta_vs_target_pp: f64,
}

impl RateMetric {
    pub fn new(matched_units: u64, denominator: u64, target: f64) -> Self {
        let rate = rate(matched_units, denominator);
        Self {
            matched_units,
            denominator,
            rate,
            target,
            delta_vs_target_pp: to_pp(rate - target),
        }
    }

    pub fn meets_target(&self) -> bool {
        self.rate <= self.target
    }
}

/// Sum of units over matching records
pub fn matched_units(day: &[&Record], query: &RateQuery, excluded: &[BlameLabel]) -> u64 {
    total_units(day.iter().copied().filter(|r| query.matches(r, excluded)))
}

/// `matched / denominator`, 0.0 for a zero denominator
pub fn rate(matched: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    matched as f64 / denominator as f64
}

/// Fraction → percentage points
pub fn to_pp(fraction: f64) -> f64 {
    fraction * 100.0
}

/// Evaluate `query` over one day's records against a fixed denominator
pub fn evaluate(day: &[&Record], query: &RateQuery, denominator: u64, target: f64) -> RateMetric {
    RateMetric::new(matched_units(day, query, &[]), denominator, target)
}

/// Categorical fields available for drill-down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupField {
    Status,
    Blame,
    Reason,
    PackerWorker,
    SorterWorker,
}

impl GroupField {
    pub const ALL: [GroupField; 5] = [
        GroupField::Status,
        GroupField::Blame,
        GroupField::Reason,
        GroupField::PackerWorker,
        GroupField::SorterWorker,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            GroupField::Status => STATUS_STD,
            GroupField::Blame => BLAME_STD,
            GroupField::Reason => schema::REASON,
            GroupField::PackerWorker => schema::PACKER_WORKER,
            GroupField::SorterWorker => schema::SORTER_WORKER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub key: String,
    pub count: u64,
    pub units: u64,
}

/// Record count and unit sum per group, sorted by units then count (both descending).
///
/// Blank keys form their own group so that the unit sums always add up to the day total.
/// Group sums saturate the same way `total_units` does.
pub fn summarize(day: &[&Record], field: GroupField) -> Result<Vec<GroupSummary>> {
    let key = field.column();
    let grouped = frame_of(day.iter().copied())?
        .lazy()
        .group_by([col(key)])
        .agg([
            len().cast(DataType::Int64).alias(COUNT_COL),
            col(schema::UNITS).alias(UNITS_COL),
        ])
        .collect()?;

    let keys = grouped.column(key)?.str()?;
    let counts = grouped.column(COUNT_COL)?.i64()?;
    let unit_lists = grouped.column(UNITS_COL)?.list()?;

    let mut summaries = Vec::with_capacity(grouped.height());
    for (idx, units) in unit_lists.into_iter().enumerate() {
        let units = match units {
            Some(series) => saturating_sum(series.i64()?),
            None => 0,
        };
        summaries.push(GroupSummary {
            key: keys.get(idx).unwrap_or_default().to_string(),
            count: counts.get(idx).unwrap_or(0).max(0) as u64,
            units,
        });
    }

    summaries.sort_by(|a, b| {
        b.units
            .cmp(&a.units)
            .then(b.count.cmp(&a.count))
            .then_with(|| a.key.cmp(&b.key))
    });
    Ok(summaries)
}

fn saturating_sum(values: &Int64Chunked) -> u64 {
    values
        .into_iter()
        .flatten()
        .fold(0u64, |acc, v| acc.saturating_add(v.max(0) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{BlameKind, StatusKind};
    use crate::record::{RawCells, MAX_UNITS};

    fn record(status: &str, blame: &str, units: &str, packer: &str) -> Record {
        Record::from_cells(&RawCells {
            date: "2025-01-01",
            status,
            blame,
            units,
            packer_worker: packer,
            ..RawCells::default()
        })
    }

    fn sample() -> Vec<Record> {
        vec![
            record("교차오배분", "OF", "10", "kim"),
            record("교차 오배분", "시스템", "4", "lee"),
            record("생산누락", "", "5", "kim"),
            record("반품", "고객", "1", ""),
        ]
    }

    #[test]
    fn test_matched_units_by_status() {
        let rows = sample();
        let day: Vec<&Record> = rows.iter().collect();
        let query = RateQuery::new(vec![StatusLabel::known(StatusKind::CrossMisallocation)]);
        assert_eq!(matched_units(&day, &query, &[]), 14);
    }

    #[test]
    fn test_matched_units_with_blame_filter() {
        let rows = sample();
        let day: Vec<&Record> = rows.iter().collect();
        let query = RateQuery::new(vec![StatusLabel::known(StatusKind::CrossMisallocation)])
            .with_blames(vec![BlameLabel::Known(BlameKind::OfFault)]);
        assert_eq!(matched_units(&day, &query, &[]), 10);
    }

    #[test]
    fn test_rate_and_delta() {
        let metric = RateMetric::new(2, 10_000, 0.00019);
        assert!((metric.rate - 0.0002).abs() < 1e-12);
        assert!((metric.delta_vs_target_pp - 0.001).abs() < 1e-9);
        assert!(!metric.meets_target());
        assert_eq!(rate(5, 0), 0.0);
    }

    #[test]
    fn test_summarize_orders_and_partitions() {
        let rows = sample();
        let day: Vec<&Record> = rows.iter().collect();
        let total: u64 = rows.iter().map(|r| r.units).sum();

        for field in GroupField::ALL {
            let summary = summarize(&day, field).unwrap();
            assert_eq!(summary.iter().map(|g| g.units).sum::<u64>(), total, "{field:?}");
            assert_eq!(summary.iter().map(|g| g.count).sum::<u64>(), 4, "{field:?}");
            assert!(summary.windows(2).all(|w| w[0].units >= w[1].units));
        }

        let by_packer = summarize(&day, GroupField::PackerWorker).unwrap();
        assert_eq!(
            by_packer[0],
            GroupSummary {
                key: "kim".to_string(),
                count: 2,
                units: 15
            }
        );
        assert_eq!(by_packer.last().unwrap().key, "");
    }

    #[test]
    fn test_summarize_tie_break_on_count() {
        let rows = vec![
            record("교차", "A", "3", ""),
            record("교차", "B", "1", ""),
            record("교차", "B", "2", ""),
        ];
        let day: Vec<&Record> = rows.iter().collect();
        let by_blame = summarize(&day, GroupField::Blame).unwrap();
        assert_eq!(by_blame[0].key, "B");
        assert_eq!(by_blame[0].count, 2);
        assert_eq!(by_blame[1].key, "A");
    }

    #[test]
    #[allow(arithmetic_overflow)]
    fn test_summarize_partitions_huge_units() {
        let rows = vec![
            record("교차", "OF", "10000000000000000000", "kim"),
            record("교차", "OF", "5", "kim"),
            record("생산누락", "고객", "1e19", "lee"),
        ];
        let day: Vec<&Record> = rows.iter().collect();
        let total = total_units(day.iter().copied());
        assert_eq!(total, 2 * MAX_UNITS + 5);

        for field in GroupField::ALL {
            let summary = summarize(&day, field).unwrap();
            let group_sum = summary
                .iter()
                .fold(0u64, |acc, g| acc.saturating_add(g.units));
            assert_eq!(group_sum, total, "{field:?}");
        }

        let by_status = summarize(&day, GroupField::Status).unwrap();
        assert_eq!(by_status[0].units, MAX_UNITS + 5);
        assert_eq!(by_status[0].count, 2);
    }

    #[test]
    fn test_matched_units_do_not_overflow() {
        let rows = vec![
            record("교차", "", "1e19", ""),
            record("교차", "", "1e19", ""),
            record("교차", "", "1e19", ""),
        ];
        let day: Vec<&Record> = rows.iter().collect();
        let query = RateQuery::new(vec![StatusLabel::known(StatusKind::CrossMisallocation)]);
        assert_eq!(matched_units(&day, &query, &[]), u64::MAX);
    }

    #[test]
    fn test_summarize_empty_day() {
        assert!(summarize(&[], GroupField::Status).unwrap().is_empty());
    }
}
