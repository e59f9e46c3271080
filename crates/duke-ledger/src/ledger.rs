//! Ledger document
//!
//! A [`Ledger`] holds the sheets of one document and their rows. Every
//! operation either applies completely or leaves the ledger unchanged: it
//! works on a copy-on-write draft (sheets and row stores are shared behind
//! `Arc`) and replaces the ledger only when everything succeeded.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use duke_ledger_core::{
    AttributeKind, Error, Period, Result, Row, Schema, Sheet, SheetId,
};
use duke_ledger_csv::ImportedRow;
use duke_ledger_formula::{highlight, CellBreakdown, DependencyHighlight, EvaluationOptions};

use crate::calculation::{CalculationEngine, PeriodView};
use crate::mutator::{Applied, Mutation, SchemaMutator};
use crate::registry::SchemaRegistry;
use crate::store::{PeriodRows, RowStore};
use crate::write::{RowInput, RowWriter, WriteOutcome};

/// Options for a ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerOptions {
    /// Options for period evaluation
    pub evaluation: EvaluationOptions,
}

/// Counts of an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
}

/// A ledger document: sheets, schemas and rows
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    options: LedgerOptions,
    registry: SchemaRegistry,
    rows: BTreeMap<SheetId, Arc<RowStore>>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty ledger with options
    pub fn with_options(options: LedgerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Build a ledger from sheets and their rows, validating everything
    pub fn from_parts(parts: Vec<(Sheet, Vec<Row>)>) -> Result<Self> {
        let mut sheets = Vec::with_capacity(parts.len());
        let mut rows = BTreeMap::new();
        for (sheet, sheet_rows) in parts {
            rows.insert(sheet.id().clone(), Arc::new(RowStore::from_rows(sheet_rows)?));
            sheets.push(sheet);
        }
        Ok(Self {
            options: LedgerOptions::default(),
            registry: SchemaRegistry::from_sheets(sheets)?,
            rows,
        })
    }

    /// Sheets with their rows, in id order
    pub fn to_parts(&self) -> Vec<(Sheet, Vec<Row>)> {
        self.registry
            .sheets()
            .map(|sheet| {
                let rows = self
                    .rows
                    .get(sheet.id())
                    .map(|store| store.iter().cloned().collect())
                    .unwrap_or_default();
                (sheet.clone(), rows)
            })
            .collect()
    }

    pub fn options(&self) -> &LedgerOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: LedgerOptions) {
        self.options = options;
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    // === Sheets ===

    /// Sheets in id order
    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.registry.sheets()
    }

    pub fn sheet(&self, id: &SheetId) -> Result<&Sheet> {
        self.registry.sheet(id)
    }

    /// Add a sheet whose schema holds only the date column
    pub fn create_sheet<I: Into<SheetId>>(&mut self, id: I, name: &str) -> Result<&Sheet> {
        let sheet = Sheet::new(id, name);
        let id = sheet.id().clone();
        self.registry.insert(sheet)?;
        self.rows.insert(id.clone(), Arc::new(RowStore::new()));
        tracing::info!(sheet = %id, "sheet created");
        self.registry.sheet(&id)
    }

    /// Add a sheet with a complete schema
    pub fn add_sheet(&mut self, sheet: Sheet) -> Result<()> {
        let id = sheet.id().clone();
        self.registry.insert(sheet)?;
        self.rows.insert(id.clone(), Arc::new(RowStore::new()));
        tracing::info!(sheet = %id, "sheet added");
        Ok(())
    }

    pub fn rename_sheet(&mut self, id: &SheetId, name: &str) -> Result<()> {
        let mut sheet = self.registry.sheet(id)?.clone();
        sheet.set_name(name);
        self.registry.put_sheets(vec![sheet])?;
        tracing::info!(sheet = %id, name, "sheet renamed");
        Ok(())
    }

    /// Remove a sheet and its rows; rejected while another sheet references it
    pub fn remove_sheet(&mut self, id: &SheetId) -> Result<Sheet> {
        let sheet = self.registry.remove(id)?;
        self.rows.remove(id);
        tracing::info!(sheet = %id, "sheet removed");
        Ok(sheet)
    }

    // === Schema ===

    pub fn fetch_schema(&self, id: &SheetId) -> Result<&Schema> {
        self.registry.get(id)
    }

    /// Apply a schema mutation; returns the new schema
    pub fn mutate_schema(&mut self, id: &SheetId, mutation: Mutation) -> Result<Schema> {
        self.apply_mutation(id, mutation).map(|applied| applied.schema)
    }

    /// Apply a schema mutation; returns everything it changed
    pub fn apply_mutation(&mut self, id: &SheetId, mutation: Mutation) -> Result<Applied> {
        let name = mutation.name();
        let has_rows = !self.row_store(id)?.is_empty();
        let mut draft = self.clone();
        let applied = SchemaMutator::apply(&mut draft.registry, id, mutation, has_rows)?;
        if let Some(index) = applied.deleted {
            draft.rows_mut(id)?.remove_column(index);
        }
        for sheet in &applied.touched {
            draft.refresh_all(sheet)?;
        }
        *self = draft;
        tracing::info!(
            sheet = %id,
            mutation = name,
            attributes = applied.schema.len(),
            "schema mutated"
        );
        Ok(applied)
    }

    /// Signed formula terms and dependents of a column
    pub fn highlight(&self, id: &SheetId, index: usize) -> Result<DependencyHighlight> {
        let schema = self.fetch_schema(id)?;
        schema.try_attribute(index)?;
        Ok(highlight(schema, index))
    }

    // === Rows ===

    pub fn row_store(&self, id: &SheetId) -> Result<&RowStore> {
        self.rows
            .get(id)
            .map(|store| store.as_ref())
            .ok_or_else(|| Error::SheetNotFound(id.to_string()))
    }

    /// Raw rows of a period and the raw anchor row
    pub fn fetch_rows(&self, id: &SheetId, period: Period) -> Result<PeriodRows<'_>> {
        Ok(self
            .row_store(id)?
            .fetch(period, self.options.evaluation.anchor_policy))
    }

    /// Periods of a sheet that have rows, ascending
    pub fn periods(&self, id: &SheetId) -> Result<Vec<Period>> {
        Ok(self.row_store(id)?.periods())
    }

    /// Insert today's row
    pub fn insert_row(&mut self, id: &SheetId, input: RowInput) -> Result<WriteOutcome> {
        let now = Utc::now();
        self.insert_row_at(id, Row::new(now.date_naive(), now), input)
    }

    /// Insert a backdated row; it is ordered as if created at midnight UTC
    /// of its date
    pub fn insert_row_on(
        &mut self,
        id: &SheetId,
        date: NaiveDate,
        input: RowInput,
    ) -> Result<WriteOutcome> {
        let created_at = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
        self.insert_row_at(id, Row::new(date, created_at), input)
    }

    fn insert_row_at(&mut self, id: &SheetId, row: Row, input: RowInput) -> Result<WriteOutcome> {
        if self.row_store(id)?.get(row.date()).is_some() {
            return Err(Error::DuplicateRow(row.date()));
        }
        self.write_row(id, row, input, true)
    }

    /// Update the row of a date
    pub fn update_row(
        &mut self,
        id: &SheetId,
        date: NaiveDate,
        input: RowInput,
    ) -> Result<WriteOutcome> {
        let row = self.row_store(id)?.try_get(date)?.clone();
        self.write_row(id, row, input, false)
    }

    /// Remove the row of a date
    pub fn delete_row(&mut self, id: &SheetId, date: NaiveDate) -> Result<Row> {
        let mut draft = self.clone();
        let row = draft.rows_mut(id)?.remove(date)?;
        draft.refresh_from(id, Period::of(date))?;
        *self = draft;
        tracing::info!(sheet = %id, %date, "row deleted");
        Ok(row)
    }

    /// Insert or update rows from an import; all or nothing
    pub fn import_rows(&mut self, id: &SheetId, rows: Vec<ImportedRow>) -> Result<ImportSummary> {
        let mut draft = self.clone();
        let mut summary = ImportSummary::default();
        for imported in rows {
            let input = RowInput {
                values: imported.values,
                ..RowInput::default()
            };
            if draft.row_store(id)?.get(imported.date).is_some() {
                draft.update_row(id, imported.date, input)?;
                summary.updated += 1;
            } else {
                draft.insert_row_on(id, imported.date, input)?;
                summary.inserted += 1;
            }
        }
        *self = draft;
        tracing::info!(
            sheet = %id,
            inserted = summary.inserted,
            updated = summary.updated,
            "rows imported"
        );
        Ok(summary)
    }

    fn write_row(
        &mut self,
        id: &SheetId,
        mut row: Row,
        input: RowInput,
        is_new: bool,
    ) -> Result<WriteOutcome> {
        let date = row.date();
        let patch = RowWriter::apply(self.fetch_schema(id)?, &mut row, input)?;

        let mut draft = self.clone();
        {
            let store = draft.rows_mut(id)?;
            if is_new {
                store.insert(row)?;
            } else {
                store.replace(row)?;
            }
        }
        if !patch.is_empty() {
            tracing::debug!(sheet = %id, fed = ?patch.fed, "applying schema patch");
            SchemaMutator::apply(
                &mut draft.registry,
                id,
                Mutation::MarkFed {
                    indices: patch.fed.clone(),
                },
                true,
            )?;
        }
        draft.refresh_from(id, Period::of(date))?;

        let row = draft.row_store(id)?.try_get(date)?.clone();
        *self = draft;
        tracing::info!(sheet = %id, %date, new = is_new, "row written");
        Ok(WriteOutcome {
            row,
            schema_patch: (!patch.is_empty()).then_some(patch),
        })
    }

    // === Calculation ===

    /// Resolve one period of a sheet
    pub fn view(&self, id: &SheetId, period: Period) -> Result<PeriodView> {
        CalculationEngine::new(self, self.options.evaluation).view(id, period)
    }

    /// How a Recurrent cell's displayed value came about
    pub fn breakdown(&self, id: &SheetId, date: NaiveDate, index: usize) -> Result<CellBreakdown> {
        CalculationEngine::new(self, self.options.evaluation).breakdown(id, date, index)
    }

    // === Internals ===

    fn rows_mut(&mut self, id: &SheetId) -> Result<&mut RowStore> {
        self.rows
            .get_mut(id)
            .map(Arc::make_mut)
            .ok_or_else(|| Error::SheetNotFound(id.to_string()))
    }

    fn refresh_all(&mut self, id: &SheetId) -> Result<()> {
        match self.row_store(id)?.periods().first() {
            Some(&first) => self.refresh_from(id, first),
            None => Ok(()),
        }
    }

    /// Store resolved values of computed cells from `from` on
    ///
    /// Stored values of computed cells are a cache for readers of the raw
    /// document; evaluation never reads them. A cell backed by subrow
    /// records stores the current aggregate of its records, whatever its
    /// kind.
    fn refresh_from(&mut self, id: &SheetId, from: Period) -> Result<()> {
        let resolved =
            CalculationEngine::new(self, self.options.evaluation).resolve_from(id, from)?;
        let schema = self.fetch_schema(id)?.clone();
        let store = self.rows_mut(id)?;
        for resolved_row in resolved.into_iter().flat_map(|(_, rows)| rows) {
            let row = store.row_mut(resolved_row.date)?;
            for (index, attribute) in schema.iter() {
                let cached = match attribute.kind() {
                    AttributeKind::Derived(_) | AttributeKind::Referenced { .. } => true,
                    AttributeKind::Recurrent(_) if !row.is_seeded(index) => true,
                    _ => {
                        attribute.subrows().is_some()
                            && row.subrows(index).is_some_and(|records| !records.is_empty())
                    }
                };
                if cached {
                    row.set_cell(index, resolved_row.value(index).clone());
                }
            }
        }
        Ok(())
    }

    /// Copy the committed state of `ids` over from `draft`
    pub(crate) fn publish(&mut self, draft: &Ledger, ids: &BTreeSet<SheetId>) {
        for id in ids {
            self.registry.publish(&draft.registry, id);
            match draft.rows.get(id) {
                Some(store) => {
                    self.rows.insert(id.clone(), Arc::clone(store));
                }
                None => {
                    self.rows.remove(id);
                }
            }
        }
    }
}
