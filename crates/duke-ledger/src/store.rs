//! Row storage for one sheet

use std::collections::BTreeMap;

use chrono::NaiveDate;
use duke_ledger_core::{Error, Period, Result, Row};
use duke_ledger_formula::AnchorPolicy;

/// Rows of one period plus the raw anchor row
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRows<'a> {
    /// Last row before the period (display order), if the policy admits one
    pub anchor: Option<&'a Row>,
    /// Rows of the period in display order
    pub rows: Vec<&'a Row>,
}

/// The rows of a sheet, one per date
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowStore {
    rows: BTreeMap<NaiveDate, Row>,
}

impl RowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from rows, rejecting duplicate dates
    pub fn from_rows<I: IntoIterator<Item = Row>>(rows: I) -> Result<Self> {
        let mut store = Self::new();
        for row in rows {
            store.insert(row)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&Row> {
        self.rows.get(&date)
    }

    pub fn try_get(&self, date: NaiveDate) -> Result<&Row> {
        self.get(date).ok_or(Error::RowNotFound(date))
    }

    /// All rows by date
    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    /// Add a row; one row per date
    pub fn insert(&mut self, row: Row) -> Result<()> {
        if self.rows.contains_key(&row.date()) {
            return Err(Error::DuplicateRow(row.date()));
        }
        self.rows.insert(row.date(), row);
        Ok(())
    }

    /// Replace the row with the same date
    pub fn replace(&mut self, row: Row) -> Result<()> {
        let slot = self
            .rows
            .get_mut(&row.date())
            .ok_or(Error::RowNotFound(row.date()))?;
        *slot = row;
        Ok(())
    }

    pub fn remove(&mut self, date: NaiveDate) -> Result<Row> {
        self.rows.remove(&date).ok_or(Error::RowNotFound(date))
    }

    /// Periods that have rows, ascending
    pub fn periods(&self) -> Vec<Period> {
        let mut periods: Vec<Period> = self.rows.keys().map(|&d| Period::of(d)).collect();
        periods.dedup();
        periods
    }

    /// Rows of a period in display order: creation time, then date
    pub fn period_rows(&self, period: Period) -> Vec<&Row> {
        let mut rows: Vec<&Row> = self
            .rows
            .range(period.first_day()..=period.last_day())
            .map(|(_, row)| row)
            .collect();
        rows.sort_by_key(|row| (row.created_at(), row.date()));
        rows
    }

    /// Rows of a period and the raw anchor row before it
    pub fn fetch(&self, period: Period, policy: AnchorPolicy) -> PeriodRows<'_> {
        let anchor = self
            .periods()
            .into_iter()
            .filter(|&p| p < period)
            .last()
            .and_then(|p| self.period_rows(p).last().copied())
            .filter(|row| policy.admits(row.date(), period));
        PeriodRows {
            anchor,
            rows: self.period_rows(period),
        }
    }

    /// Drop a deleted column from every row
    pub fn remove_column(&mut self, index: usize) {
        for row in self.rows.values_mut() {
            row.remove_column(index);
        }
    }

    pub(crate) fn row_mut(&mut self, date: NaiveDate) -> Result<&mut Row> {
        self.rows.get_mut(&date).ok_or(Error::RowNotFound(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row(m: u32, d: u32, created_hour: u32) -> Row {
        let date = NaiveDate::from_ymd_opt(2024, m, d).unwrap();
        Row::new(date, Utc.with_ymd_and_hms(2024, 6, 1, created_hour, 0, 0).unwrap())
    }

    fn store() -> RowStore {
        RowStore::from_rows([row(1, 20, 1), row(3, 5, 3), row(3, 1, 4), row(3, 9, 2)]).unwrap()
    }

    #[test]
    fn test_duplicate_date_rejected() {
        let mut s = store();
        assert_eq!(
            s.insert(row(3, 5, 9)),
            Err(Error::DuplicateRow(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()))
        );
    }

    #[test]
    fn test_period_rows_in_creation_order() {
        let s = store();
        let march = Period::new(2024, 3).unwrap();
        let days: Vec<u32> = s
            .period_rows(march)
            .iter()
            .map(|r| chrono::Datelike::day(&r.date()))
            .collect();
        assert_eq!(days, vec![9, 5, 1]);
    }

    #[test]
    fn test_periods() {
        let periods = store().periods();
        assert_eq!(
            periods,
            vec![Period::new(2024, 1).unwrap(), Period::new(2024, 3).unwrap()]
        );
    }

    #[test]
    fn test_anchor_policies() {
        let s = store();
        let march = Period::new(2024, 3).unwrap();
        let fetched = s.fetch(march, AnchorPolicy::LatestBefore);
        assert_eq!(fetched.rows.len(), 3);
        assert_eq!(
            fetched.anchor.map(|r| r.date()),
            NaiveDate::from_ymd_opt(2024, 1, 20)
        );

        // February is empty, so no anchor under the strict policy.
        assert!(s.fetch(march, AnchorPolicy::PreviousPeriodOnly).anchor.is_none());

        let april = Period::new(2024, 4).unwrap();
        let fetched = s.fetch(april, AnchorPolicy::PreviousPeriodOnly);
        assert!(fetched.rows.is_empty());
        assert_eq!(
            fetched.anchor.map(|r| r.date()),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }

    #[test]
    fn test_remove_and_replace() {
        let mut s = store();
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let mut updated = s.try_get(date).unwrap().clone();
        updated.set_cell(1, duke_ledger_core::CellValue::Number(1.0));
        s.replace(updated).unwrap();
        assert_eq!(s.remove(date).unwrap().cell_count(), 2);
        assert!(matches!(s.remove(date), Err(Error::RowNotFound(_))));
    }
}
