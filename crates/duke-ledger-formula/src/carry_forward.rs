//! Carry-forward of Recurrent attributes
//!
//! A Recurrent attribute behaves like a running balance: each row starts
//! from the previous row's value of the attribute it points at. The first
//! row of a period reads the anchor row, the last row before the period.

use chrono::NaiveDate;
use duke_ledger_core::{Period, Recurrence};

use crate::error::FormulaResult;
use crate::evaluator::ResolvedRow;

/// Which row before a period may serve as its anchor
///
/// Only [`PreviousPeriodOnly`](Self::PreviousPeriodOnly) limits the anchor
/// to the previous month's last row, so a month after an empty month opens
/// at 0. The default [`LatestBefore`](Self::LatestBefore) reaches past empty
/// months to the last row before the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorPolicy {
    /// The last row strictly before the period, however old
    #[default]
    LatestBefore,
    /// Only a row in the immediately preceding month
    PreviousPeriodOnly,
}

impl AnchorPolicy {
    /// Whether a row dated `date` may anchor `period`
    pub fn admits(self, date: NaiveDate, period: Period) -> bool {
        match self {
            AnchorPolicy::LatestBefore => date < period.first_day(),
            AnchorPolicy::PreviousPeriodOnly => Period::of(date) == period.previous(),
        }
    }
}

/// Resolves carry-forward values and owns the fed state transition
pub struct CarryForwardResolver;

impl CarryForwardResolver {
    /// Carried value of a Recurrent attribute at `row_index` of a period
    ///
    /// `previous(row, attribute)` yields the resolved number of an earlier
    /// row of the same period. With no pointer, or no previous row and no
    /// anchor, the carried value is zero.
    pub fn resolve<F>(
        recurrence: &Recurrence,
        row_index: usize,
        anchor: Option<&ResolvedRow>,
        previous: F,
    ) -> FormulaResult<f64>
    where
        F: FnOnce(usize, usize) -> FormulaResult<f64>,
    {
        let Some(reference) = recurrence.reference_index else {
            return Ok(0.0);
        };
        if row_index > 0 {
            return previous(row_index - 1, reference);
        }
        Ok(anchor.map_or(0.0, |anchor| anchor.number(reference)))
    }

    /// Fed state of a newly added Recurrent attribute
    pub fn initial_fed(sheet_has_rows: bool) -> bool {
        sheet_has_rows
    }

    /// Whether a manual value is accepted as the attribute's seed
    pub fn accepts_seed(recurrence: &Recurrence) -> bool {
        !recurrence.fed
    }

    /// Whether an adjustment may be stored for the attribute
    pub fn accepts_adjustment(recurrence: &Recurrence) -> bool {
        recurrence.fed
    }

    /// Mark the attribute as fed; returns whether the flag changed
    pub fn feed(recurrence: &mut Recurrence) -> bool {
        !std::mem::replace(&mut recurrence.fed, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormulaError;
    use duke_ledger_core::CellValue;

    fn anchor(values: Vec<f64>) -> ResolvedRow {
        ResolvedRow {
            date: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            values: values.into_iter().map(CellValue::Number).collect(),
        }
    }

    fn unused(_: usize, _: usize) -> FormulaResult<f64> {
        Err(FormulaError::RowOutOfBounds { index: 0, len: 0 })
    }

    #[test]
    fn test_first_row_reads_anchor() {
        let recurrence = Recurrence::new(5);
        let anchor = anchor(vec![0.0, 0.0, 0.0, 0.0, 0.0, 120.0]);
        let value = CarryForwardResolver::resolve(&recurrence, 0, Some(&anchor), unused).unwrap();
        assert_eq!(value, 120.0);
    }

    #[test]
    fn test_first_row_without_anchor_is_zero() {
        let recurrence = Recurrence::new(5);
        let value = CarryForwardResolver::resolve(&recurrence, 0, None, unused).unwrap();
        assert_eq!(value, 0.0);
    }

    #[test]
    fn test_later_rows_read_previous_row() {
        let recurrence = Recurrence::new(5);
        let value = CarryForwardResolver::resolve(&recurrence, 3, None, |row, attr| {
            assert_eq!((row, attr), (2, 5));
            Ok(70.0)
        })
        .unwrap();
        assert_eq!(value, 70.0);
    }

    #[test]
    fn test_null_pointer_is_zero() {
        let mut recurrence = Recurrence::new(5);
        recurrence.forget(5);
        let anchor = anchor(vec![1.0; 6]);
        assert_eq!(
            CarryForwardResolver::resolve(&recurrence, 0, Some(&anchor), unused).unwrap(),
            0.0
        );
        assert_eq!(
            CarryForwardResolver::resolve(&recurrence, 4, Some(&anchor), unused).unwrap(),
            0.0
        );
    }

    #[test]
    fn test_fed_transition_is_one_way() {
        let mut recurrence = Recurrence::new(5);
        assert!(CarryForwardResolver::accepts_seed(&recurrence));
        assert!(!CarryForwardResolver::accepts_adjustment(&recurrence));
        assert!(CarryForwardResolver::feed(&mut recurrence));
        assert!(!CarryForwardResolver::feed(&mut recurrence));
        assert!(recurrence.fed);
        assert!(!CarryForwardResolver::accepts_seed(&recurrence));
        assert!(CarryForwardResolver::accepts_adjustment(&recurrence));
    }

    #[test]
    fn test_anchor_policy() {
        let march = Period::new(2024, 3).unwrap();
        let feb = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let dec = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let in_march = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        assert!(AnchorPolicy::LatestBefore.admits(feb, march));
        assert!(AnchorPolicy::LatestBefore.admits(dec, march));
        assert!(!AnchorPolicy::LatestBefore.admits(in_march, march));

        assert!(AnchorPolicy::PreviousPeriodOnly.admits(feb, march));
        assert!(!AnchorPolicy::PreviousPeriodOnly.admits(dec, march));
    }
}
