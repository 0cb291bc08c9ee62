use crate::record::{total_units, Record};
use crate::totals::DailyTotals;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

/// Where a denominator came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenominatorSource {
    /// Authoritative total from the reference sheet, used verbatim
    Authoritative,
    /// Sum of the day's row units
    RowSum,
    /// No authoritative total and no volume: 1, so every rate reports as 0
    NoVolume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Denominator {
    pub units: u64,
    pub source: DenominatorSource,
}

pub struct DenominatorResolver<'a> {
    totals: &'a DailyTotals,
}

impl<'a> DenominatorResolver<'a> {
    pub fn new(totals: &'a DailyTotals) -> Self {
        Self { totals }
    }

    /// Unit base for `date`.
    ///
    /// An authoritative total wins even when it is smaller than the matched units (or 0);
    /// it is not second-guessed. Without one, the day's row sum is used, and an empty
    /// day resolves to 1.
    pub fn resolve(&self, date: NaiveDate, day: &[&Record]) -> Denominator {
        if let Some(total) = self.totals.get(date) {
            debug!("Denominator for {}: authoritative {}", date, total);
            return Denominator {
                units: total,
                source: DenominatorSource::Authoritative,
            };
        }

        let row_sum = total_units(day.iter().copied());
        if row_sum == 0 {
            debug!("Denominator for {}: no volume, using 1", date);
            return Denominator {
                units: 1,
                source: DenominatorSource::NoVolume,
            };
        }
        debug!("Denominator for {}: row sum {}", date, row_sum);
        Denominator {
            units: row_sum,
            source: DenominatorSource::RowSum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawCells;

    fn record(units: &str) -> Record {
        Record::from_cells(&RawCells {
            date: "2025-01-01",
            units,
            ..RawCells::default()
        })
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    #[test]
    fn test_authoritative_total_verbatim() {
        let mut totals = DailyTotals::new();
        totals.insert(day(), 3);
        let rows = [record("10"), record("5")];
        let refs: Vec<&Record> = rows.iter().collect();

        let denominator = DenominatorResolver::new(&totals).resolve(day(), &refs);
        assert_eq!(denominator.units, 3);
        assert_eq!(denominator.source, DenominatorSource::Authoritative);
    }

    #[test]
    fn test_authoritative_zero_is_literal() {
        let mut totals = DailyTotals::new();
        totals.insert(day(), 0);
        let rows = [record("10")];
        let refs: Vec<&Record> = rows.iter().collect();

        let denominator = DenominatorResolver::new(&totals).resolve(day(), &refs);
        assert_eq!(denominator.units, 0);
        assert_eq!(denominator.source, DenominatorSource::Authoritative);
    }

    #[test]
    fn test_row_sum_fallback() {
        let totals = DailyTotals::new();
        let rows = [record("10"), record("5"), record("x")];
        let refs: Vec<&Record> = rows.iter().collect();

        let denominator = DenominatorResolver::new(&totals).resolve(day(), &refs);
        assert_eq!(denominator.units, 15);
        assert_eq!(denominator.source, DenominatorSource::RowSum);
    }

    #[test]
    fn test_row_sum_saturates_on_huge_units() {
        let totals = DailyTotals::new();
        let rows = [record("1e19"), record("1e19"), record("1e19")];
        let refs: Vec<&Record> = rows.iter().collect();

        let denominator = DenominatorResolver::new(&totals).resolve(day(), &refs[..2]);
        assert_eq!(denominator.units, 2 * crate::record::MAX_UNITS);
        let denominator = DenominatorResolver::new(&totals).resolve(day(), &refs);
        assert_eq!(denominator.units, u64::MAX);
        assert_eq!(denominator.source, DenominatorSource::RowSum);
    }

    #[test]
    fn test_no_volume_resolves_to_one() {
        let totals = DailyTotals::new();
        let rows = [record("0")];
        let refs: Vec<&Record> = rows.iter().collect();

        let resolver = DenominatorResolver::new(&totals);
        assert_eq!(resolver.resolve(day(), &refs).units, 1);
        assert_eq!(resolver.resolve(day(), &[]).source, DenominatorSource::NoVolume);
    }
}
