//! Ledger calculation
//!
//! Resolves the periods of a sheet in chronological order, so that each
//! period's anchor is the fully resolved last row of the period before it.
//!
//! # Example
//!
//! ```rust
//! use duke_ledger::prelude::*;
//!
//! let mut ledger = Ledger::new();
//! ledger.create_sheet("cash", "Cash").unwrap();
//! let id = SheetId::from("cash");
//! ledger
//!     .mutate_schema(&id, Mutation::AddColumn(Attribute::independent("In")))
//!     .unwrap();
//!
//! let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//! ledger.insert_row_on(&id, date, RowInput::new().value(1, 25.0)).unwrap();
//!
//! let view = ledger.view(&id, Period::of(date)).unwrap();
//! assert_eq!(view.rows[0].number(1), 25.0);
//! ```

use ahash::AHashMap;
use chrono::NaiveDate;
use duke_ledger_core::{CellValue, Error, Period, Result, Row, Schema, SheetId, SourceRef};
use duke_ledger_formula::{
    source_value, CellBreakdown, EvaluationOptions, PeriodEvaluator, ReferenceSource, ResolvedRow,
};

use parking_lot::Mutex;

use crate::ledger::Ledger;
use crate::store::RowStore;

/// A resolved period of a sheet, ready for display
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodView {
    pub period: Period,
    /// Column names in schema order
    pub columns: Vec<String>,
    /// Resolved last row before the period; not displayed
    pub anchor: Option<ResolvedRow>,
    /// Resolved rows of the period in display order
    pub rows: Vec<ResolvedRow>,
}

impl PeriodView {
    /// Resolved row for a date
    pub fn row(&self, date: NaiveDate) -> Option<&ResolvedRow> {
        self.rows.iter().find(|row| row.date == date)
    }
}

/// [`ReferenceSource`] over the sheets of a ledger
///
/// The ordered rows of each referenced (sheet, period) are collected once
/// and reused for every later lookup.
pub struct LedgerReferences<'a> {
    ledger: &'a Ledger,
    periods: Mutex<AHashMap<(SheetId, Period), Vec<&'a Row>>>,
}

impl<'a> LedgerReferences<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self {
            ledger,
            periods: Mutex::new(AHashMap::new()),
        }
    }

    /// Number of (sheet, period) row lists collected so far
    pub fn cached_periods(&self) -> usize {
        self.periods.lock().len()
    }
}

impl<'a> ReferenceSource for LedgerReferences<'a> {
    fn lookup(&self, source: &SourceRef, period: Period, row_index: usize) -> Option<CellValue> {
        let (Ok(schema), Ok(store)) = (
            self.ledger.fetch_schema(&source.sheet),
            self.ledger.row_store(&source.sheet),
        ) else {
            tracing::warn!(sheet = %source.sheet, "referenced sheet is missing");
            return None;
        };
        let mut periods = self.periods.lock();
        let rows = periods
            .entry((source.sheet.clone(), period))
            .or_insert_with(|| store.period_rows(period));
        source_value(schema, rows.as_slice(), source.index, row_index)
    }
}

/// Evaluates the periods of a ledger's sheets
pub struct CalculationEngine<'a> {
    ledger: &'a Ledger,
    options: EvaluationOptions,
    references: LedgerReferences<'a>,
}

impl<'a> CalculationEngine<'a> {
    pub fn new(ledger: &'a Ledger, options: EvaluationOptions) -> Self {
        Self {
            ledger,
            options,
            references: LedgerReferences::new(ledger),
        }
    }

    /// Resolve one period of a sheet
    pub fn view(&self, id: &SheetId, period: Period) -> Result<PeriodView> {
        let schema = self.ledger.fetch_schema(id)?;
        let store = self.ledger.row_store(id)?;
        let anchor = self.anchor_for(schema, store, period)?;
        let rows = self.evaluate(schema, period, store.period_rows(period), anchor.as_ref())?;
        Ok(PeriodView {
            period,
            columns: schema.names().map(str::to_string).collect(),
            anchor,
            rows,
        })
    }

    /// Resolve every period of a sheet from `from` on, oldest first
    pub fn resolve_from(&self, id: &SheetId, from: Period) -> Result<Vec<(Period, Vec<ResolvedRow>)>> {
        let schema = self.ledger.fetch_schema(id)?;
        let store = self.ledger.row_store(id)?;
        let mut anchor = self.anchor_for(schema, store, from)?;
        let mut resolved = Vec::new();
        for period in store.periods().into_iter().filter(|&p| p >= from) {
            let admitted = anchor
                .take()
                .filter(|row| self.options.anchor_policy.admits(row.date, period));
            let rows = self.evaluate(schema, period, store.period_rows(period), admitted.as_ref())?;
            anchor = rows.last().cloned();
            resolved.push((period, rows));
        }
        Ok(resolved)
    }

    /// How a Recurrent cell's value came about
    pub fn breakdown(&self, id: &SheetId, date: NaiveDate, index: usize) -> Result<CellBreakdown> {
        let schema = self.ledger.fetch_schema(id)?;
        let store = self.ledger.row_store(id)?;
        let period = Period::of(date);
        let anchor = self.anchor_for(schema, store, period)?;
        let rows = store.period_rows(period);
        let position = rows
            .iter()
            .position(|row| row.date() == date)
            .ok_or(Error::RowNotFound(date))?;

        let mut evaluator = PeriodEvaluator::new(
            schema,
            period,
            rows,
            anchor.as_ref(),
            &self.references,
            &self.options,
        )?;
        evaluator
            .breakdown(position, index)?
            .ok_or_else(|| Error::other(format!("attribute {index} is not Recurrent")))
    }

    /// Resolved last row before `period`, following the anchor policy
    fn anchor_for(
        &self,
        schema: &Schema,
        store: &RowStore,
        period: Period,
    ) -> Result<Option<ResolvedRow>> {
        let policy = self.options.anchor_policy;
        let mut anchor: Option<ResolvedRow> = None;
        for earlier in store.periods().into_iter().filter(|&p| p < period) {
            let admitted = anchor.take().filter(|row| policy.admits(row.date, earlier));
            let rows = self.evaluate(schema, earlier, store.period_rows(earlier), admitted.as_ref())?;
            anchor = rows.last().cloned();
        }
        Ok(anchor.filter(|row| policy.admits(row.date, period)))
    }

    fn evaluate(
        &self,
        schema: &Schema,
        period: Period,
        rows: Vec<&Row>,
        anchor: Option<&ResolvedRow>,
    ) -> Result<Vec<ResolvedRow>> {
        let resolved =
            PeriodEvaluator::new(schema, period, rows, anchor, &self.references, &self.options)?
                .evaluate()?;
        Ok(resolved)
    }
}
