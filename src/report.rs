//! Daily and trend reports assembled from the pipeline stages
//!
//! A report is a derived, serializable view; rebuilding it from the same record set
//! and totals always gives the same result.

use crate::config::ReportConfig;
use crate::denominator::{Denominator, DenominatorResolver};
use crate::error::{ReportError, Result};
use crate::metrics::{evaluate, summarize, GroupField, GroupSummary, RateMetric, RateQuery};
use crate::normalize::{BlameKind, BlameLabel};
use crate::record::{total_units, Record, RecordSet};
use crate::totals::DailyTotals;
use crate::whatif::{simulate, WhatIfOutcome};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Write;
use tracing::info;

/// One metric (mis-ship or missing-unit) seen three ways
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPanel {
    pub name: &'static str,
    /// Status set only, any blame
    pub actual: RateMetric,
    /// Status set restricted to OF-fault blame
    pub of_fault_only: RateMetric,
    /// Recoverable blames excluded, denominator held
    pub hypothetical: WhatIfOutcome,
    /// Extra exclusions requested by the caller, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<WhatIfOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Drilldowns {
    pub by_status: Vec<GroupSummary>,
    pub by_blame: Vec<GroupSummary>,
    pub by_reason: Vec<GroupSummary>,
    pub by_packer: Vec<GroupSummary>,
    pub by_sorter: Vec<GroupSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub total_cases: usize,
    pub total_units: u64,
    pub denominator: Denominator,
    pub mis_ship: MetricPanel,
    pub missing: MetricPanel,
    pub drilldowns: Drilldowns,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRow {
    pub date: NaiveDate,
    pub denominator: Denominator,
    pub mis_ship_units: u64,
    pub missing_units: u64,
    pub mis_ship_rate: f64,
    pub missing_rate: f64,
    pub mis_ship_hypothetical_rate: f64,
    pub missing_hypothetical_rate: f64,
}

/// Builds reports for one invocation's record set
pub struct ReportBuilder<'a> {
    records: &'a RecordSet,
    resolver: DenominatorResolver<'a>,
    config: &'a ReportConfig,
    mis_ship: RateQuery,
    missing: RateQuery,
    recoverable: Vec<BlameLabel>,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(records: &'a RecordSet, totals: &'a DailyTotals, config: &'a ReportConfig) -> Self {
        Self {
            records,
            resolver: DenominatorResolver::new(totals),
            config,
            mis_ship: RateQuery::new(config.mis_ship_status_labels()),
            missing: RateQuery::new(config.missing_status_labels()),
            recoverable: config.recoverable_blame_labels(),
        }
    }

    /// Report for `date`, or the latest date present when `None`.
    pub fn daily(&self, date: Option<NaiveDate>, extra_exclusions: &[BlameLabel]) -> Result<DailyReport> {
        let date = match date.or_else(|| self.records.latest_date()) {
            Some(date) => date,
            None => {
                return Err(ReportError::DateParse {
                    column: crate::schema::DATE.to_string(),
                })
            }
        };
        let day = self.records.on(date);
        if day.is_empty() {
            return Err(ReportError::NoRecords(date));
        }

        let denominator = self.resolver.resolve(date, &day);
        info!(
            "Building report for {}: {} records, denominator {} ({:?})",
            date,
            day.len(),
            denominator.units,
            denominator.source
        );

        let mis_ship = self.panel(
            "mis_ship",
            &day,
            &self.mis_ship,
            denominator.units,
            self.config.mis_ship_target,
            extra_exclusions,
        );
        let missing = self.panel(
            "missing",
            &day,
            &self.missing,
            denominator.units,
            self.config.missing_target,
            extra_exclusions,
        );

        Ok(DailyReport {
            date,
            total_cases: day.len(),
            total_units: total_units(day.iter().copied()),
            denominator,
            mis_ship,
            missing,
            drilldowns: Drilldowns {
                by_status: summarize(&day, GroupField::Status)?,
                by_blame: summarize(&day, GroupField::Blame)?,
                by_reason: summarize(&day, GroupField::Reason)?,
                by_packer: summarize(&day, GroupField::PackerWorker)?,
                by_sorter: summarize(&day, GroupField::SorterWorker)?,
            },
        })
    }

    fn panel(
        &self,
        name: &'static str,
        day: &[&Record],
        query: &RateQuery,
        denominator: u64,
        target: f64,
        extra_exclusions: &[BlameLabel],
    ) -> MetricPanel {
        let of_fault = query
            .clone()
            .with_blames(vec![BlameLabel::Known(BlameKind::OfFault)]);
        MetricPanel {
            name,
            actual: evaluate(day, query, denominator, target),
            of_fault_only: evaluate(day, &of_fault, denominator, target),
            hypothetical: simulate(day, query, &self.recoverable, denominator, target),
            custom: (!extra_exclusions.is_empty())
                .then(|| simulate(day, query, extra_exclusions, denominator, target)),
        }
    }

    /// One row per readable date, ascending
    pub fn trend(&self) -> Vec<TrendRow> {
        self.records
            .dates()
            .into_iter()
            .map(|date| {
                let day = self.records.on(date);
                let denominator = self.resolver.resolve(date, &day);
                let mis_ship = simulate(
                    &day,
                    &self.mis_ship,
                    &self.recoverable,
                    denominator.units,
                    self.config.mis_ship_target,
                );
                let missing = simulate(
                    &day,
                    &self.missing,
                    &self.recoverable,
                    denominator.units,
                    self.config.missing_target,
                );
                TrendRow {
                    date,
                    denominator,
                    mis_ship_units: mis_ship.baseline.matched_units,
                    missing_units: missing.baseline.matched_units,
                    mis_ship_rate: mis_ship.old_rate(),
                    missing_rate: missing.old_rate(),
                    mis_ship_hypothetical_rate: mis_ship.new_rate(),
                    missing_hypothetical_rate: missing.new_rate(),
                }
            })
            .collect()
    }
}

/// Fraction as a percentage, `0.00019` → `0.019%`
pub fn pct(fraction: f64) -> String {
    format!("{:.3}%", fraction * 100.0)
}

/// Percentage points with sign, `0.012` → `+0.012 pp`
pub fn pp(points: f64) -> String {
    format!("{:+.3} pp", points)
}

pub fn render_daily_text(report: &DailyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", report.date);
    let _ = writeln!(
        out,
        "cases {}  units {}  denominator {} ({:?})",
        report.total_cases, report.total_units, report.denominator.units, report.denominator.source
    );

    for panel in [&report.mis_ship, &report.missing] {
        let _ = writeln!(out, "\n[{}] target {}", panel.name, pct(panel.actual.target));
        write_metric(&mut out, "actual", &panel.actual);
        write_metric(&mut out, "OF-fault only", &panel.of_fault_only);
        write_metric(&mut out, "hypothetical", &panel.hypothetical.simulated);
        if let Some(custom) = &panel.custom {
            let excluded: Vec<&str> = custom.excluded.iter().map(|b| b.as_str()).collect();
            write_metric(
                &mut out,
                &format!("without {}", excluded.join("/")),
                &custom.simulated,
            );
        }
    }

    let sections = [
        ("status", &report.drilldowns.by_status),
        ("blame", &report.drilldowns.by_blame),
        ("reason", &report.drilldowns.by_reason),
        ("packer", &report.drilldowns.by_packer),
        ("sorter", &report.drilldowns.by_sorter),
    ];
    for (title, groups) in sections {
        let _ = writeln!(out, "\n-- by {} --", title);
        for group in groups.iter() {
            let key = if group.key.is_empty() { "(blank)" } else { group.key.as_str() };
            let _ = writeln!(out, "{:<20} {:>6} cases {:>8} units", key, group.count, group.units);
        }
    }
    out
}

fn write_metric(out: &mut String, label: &str, metric: &RateMetric) {
    let _ = writeln!(
        out,
        "  {:<16} {:>8} / {:<10} {:>9}  {}",
        label,
        metric.matched_units,
        metric.denominator,
        pct(metric.rate),
        pp(metric.delta_vs_target_pp)
    );
}

pub fn render_trend_text(rows: &[TrendRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<12} {:>10} {:>8} {:>8} {:>9} {:>9} {:>9} {:>9}",
        "date", "units", "misship", "missing", "mis%", "mis%hyp", "miss%", "miss%hyp"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<12} {:>10} {:>8} {:>8} {:>9} {:>9} {:>9} {:>9}",
            row.date.to_string(),
            row.denominator.units,
            row.mis_ship_units,
            row.missing_units,
            pct(row.mis_ship_rate),
            pct(row.mis_ship_hypothetical_rate),
            pct(row.missing_rate),
            pct(row.missing_hypothetical_rate)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatting() {
        assert_eq!(pct(0.00019), "0.019%");
        assert_eq!(pp(0.012), "+0.012 pp");
        assert_eq!(pp(-0.5), "-0.500 pp");
    }
}
