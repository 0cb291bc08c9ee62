//! What-If Simulator - "what would the rate have been without these root causes?"
//!
//! Excluding a blame category only shrinks the numerator. The denominator stays the
//! day's resolved volume, even though the excluded units did ship.

use crate::metrics::{matched_units, to_pp, RateMetric, RateQuery};
use crate::normalize::BlameLabel;
use crate::record::Record;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhatIfOutcome {
    pub excluded: Vec<BlameLabel>,
    pub baseline: RateMetric,
    pub simulated: RateMetric,
    /// Units removed from the numerator by the exclusion
    pub excluded_units: u64,
    /// `simulated.rate - baseline.rate` in percentage points
    pub delta_pp: f64,
}

impl WhatIfOutcome {
    pub fn old_rate(&self) -> f64 {
        self.baseline.rate
    }

    pub fn new_rate(&self) -> f64 {
        self.simulated.rate
    }

    /// Simulated rate against the target, in percentage points
    pub fn delta_vs_target_pp(&self) -> f64 {
        self.simulated.delta_vs_target_pp
    }
}

/// Recompute `query` over `day` with records blamed on any of `excluded` removed from
/// the numerator, holding `denominator` fixed.
pub fn simulate(
    day: &[&Record],
    query: &RateQuery,
    excluded: &[BlameLabel],
    denominator: u64,
    target: f64,
) -> WhatIfOutcome {
    let baseline_units = matched_units(day, query, &[]);
    let simulated_units = matched_units(day, query, excluded);

    let baseline = RateMetric::new(baseline_units, denominator, target);
    let simulated = RateMetric::new(simulated_units, denominator, target);

    WhatIfOutcome {
        excluded: excluded.to_vec(),
        baseline,
        simulated,
        excluded_units: baseline_units - simulated_units,
        delta_pp: to_pp(simulated.rate - baseline.rate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::evaluate;
    use crate::normalize::{BlameKind, StatusKind, StatusLabel};
    use crate::record::RawCells;

    fn record(status: &str, blame: &str, units: &str) -> Record {
        Record::from_cells(&RawCells {
            date: "2025-01-01",
            status,
            blame,
            units,
            ..RawCells::default()
        })
    }

    fn rows() -> Vec<Record> {
        vec![
            record("교차오배분", " OF 책임 ", "6"),
            record("교차오배분", "시스템오류", "4"),
            record("생산누락", "", "90"),
        ]
    }

    fn mis_ship() -> RateQuery {
        RateQuery::new(vec![StatusLabel::known(StatusKind::CrossMisallocation)])
    }

    #[test]
    fn test_empty_exclusion_matches_engine() {
        let rows = rows();
        let day: Vec<&Record> = rows.iter().collect();
        let outcome = simulate(&day, &mis_ship(), &[], 100, 0.00019);
        assert_eq!(outcome.simulated, evaluate(&day, &mis_ship(), 100, 0.00019));
        assert_eq!(outcome.delta_pp, 0.0);
        assert_eq!(outcome.excluded_units, 0);
    }

    #[test]
    fn test_unmatched_exclusion_is_noop() {
        let rows = rows();
        let day: Vec<&Record> = rows.iter().collect();
        let outcome = simulate(
            &day,
            &mis_ship(),
            &[BlameLabel::Known(BlameKind::VendorFault)],
            100,
            0.00019,
        );
        assert_eq!(outcome.new_rate(), outcome.old_rate());
    }

    #[test]
    fn test_exclusion_holds_denominator() {
        let rows = rows();
        let day: Vec<&Record> = rows.iter().collect();
        let outcome = simulate(
            &day,
            &mis_ship(),
            &[BlameLabel::Known(BlameKind::OfFault)],
            100,
            0.00019,
        );
        assert_eq!(outcome.baseline.denominator, 100);
        assert_eq!(outcome.simulated.denominator, 100);
        assert_eq!(outcome.simulated.matched_units, 4);
        assert_eq!(outcome.excluded_units, 6);
        assert!((outcome.delta_pp - (-6.0)).abs() < 1e-9);
        assert!((outcome.delta_vs_target_pp() - (4.0 - 0.019)).abs() < 1e-9);
    }
}
