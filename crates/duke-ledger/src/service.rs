//! Shared ledger access
//!
//! [`LedgerService`] lets many threads read and write one ledger. Readers
//! take a snapshot and never wait on writers. Writers serialize per sheet:
//! a write locks the sheets it can change (in id order), works on a draft
//! copy of the ledger and publishes only those sheets when it succeeds.
//! Writes to unrelated sheets proceed in parallel.

use std::collections::BTreeSet;
use std::sync::Arc;

use ahash::AHashMap;
use chrono::NaiveDate;
use duke_ledger_core::{Period, Result, Row, Schema, Sheet, SheetId};
use duke_ledger_csv::ImportedRow;
use duke_ledger_formula::{CellBreakdown, DependencyHighlight};
use parking_lot::{Mutex, RwLock};

use crate::calculation::PeriodView;
use crate::ledger::{ImportSummary, Ledger};
use crate::mutator::Mutation;
use crate::write::{RowInput, WriteOutcome};

/// A ledger shared between threads
#[derive(Debug, Default)]
pub struct LedgerService {
    ledger: RwLock<Arc<Ledger>>,
    writers: Mutex<AHashMap<SheetId, Arc<Mutex<()>>>>,
}

impl LedgerService {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger: RwLock::new(Arc::new(ledger)),
            writers: Mutex::new(AHashMap::new()),
        }
    }

    /// The current committed state
    pub fn snapshot(&self) -> Arc<Ledger> {
        Arc::clone(&self.ledger.read())
    }

    pub fn into_inner(self) -> Ledger {
        let ledger = self.ledger.into_inner();
        Arc::try_unwrap(ledger).unwrap_or_else(|shared| shared.as_ref().clone())
    }

    // === Reads ===

    pub fn fetch_schema(&self, id: &SheetId) -> Result<Schema> {
        self.snapshot().fetch_schema(id).cloned()
    }

    pub fn sheets(&self) -> Vec<Sheet> {
        self.snapshot().sheets().cloned().collect()
    }

    pub fn view(&self, id: &SheetId, period: Period) -> Result<PeriodView> {
        self.snapshot().view(id, period)
    }

    pub fn breakdown(&self, id: &SheetId, date: NaiveDate, index: usize) -> Result<CellBreakdown> {
        self.snapshot().breakdown(id, date, index)
    }

    pub fn highlight(&self, id: &SheetId, index: usize) -> Result<DependencyHighlight> {
        self.snapshot().highlight(id, index)
    }

    // === Writes ===

    pub fn create_sheet(&self, id: &SheetId, name: &str) -> Result<Sheet> {
        self.write(|_| vec![id.clone()], |ledger| ledger.create_sheet(id, name).cloned())
    }

    pub fn add_sheet(&self, sheet: Sheet) -> Result<()> {
        let id = sheet.id().clone();
        self.write(|_| vec![id.clone()], |ledger| ledger.add_sheet(sheet))
    }

    pub fn rename_sheet(&self, id: &SheetId, name: &str) -> Result<()> {
        self.write(|_| vec![id.clone()], |ledger| ledger.rename_sheet(id, name))
    }

    /// Remove a sheet; its writer lock is dropped with it
    pub fn remove_sheet(&self, id: &SheetId) -> Result<Sheet> {
        self.write_evicting(
            |ledger| ledger.registry().ids().cloned().collect(),
            |ledger| ledger.remove_sheet(id),
            Some(id),
        )
    }

    pub fn mutate_schema(&self, id: &SheetId, mutation: Mutation) -> Result<Schema> {
        self.write(
            |ledger| {
                let mut ids = mutation.related_sheets(ledger.registry(), id);
                ids.push(id.clone());
                ids
            },
            |ledger| ledger.mutate_schema(id, mutation.clone()),
        )
    }

    pub fn insert_row(&self, id: &SheetId, input: RowInput) -> Result<WriteOutcome> {
        self.write(|_| vec![id.clone()], |ledger| ledger.insert_row(id, input))
    }

    pub fn insert_row_on(
        &self,
        id: &SheetId,
        date: NaiveDate,
        input: RowInput,
    ) -> Result<WriteOutcome> {
        self.write(
            |_| vec![id.clone()],
            |ledger| ledger.insert_row_on(id, date, input),
        )
    }

    pub fn update_row(&self, id: &SheetId, date: NaiveDate, input: RowInput) -> Result<WriteOutcome> {
        self.write(
            |_| vec![id.clone()],
            |ledger| ledger.update_row(id, date, input),
        )
    }

    pub fn delete_row(&self, id: &SheetId, date: NaiveDate) -> Result<Row> {
        self.write(|_| vec![id.clone()], |ledger| ledger.delete_row(id, date))
    }

    pub fn import_rows(&self, id: &SheetId, rows: Vec<ImportedRow>) -> Result<ImportSummary> {
        self.write(|_| vec![id.clone()], |ledger| ledger.import_rows(id, rows))
    }

    /// Run `op` on a draft while holding the writer locks of `lock_set`
    fn write<T, L, F>(&self, lock_set: L, op: F) -> Result<T>
    where
        L: Fn(&Ledger) -> Vec<SheetId>,
        F: FnOnce(&mut Ledger) -> Result<T>,
    {
        self.write_evicting(lock_set, op, None)
    }

    /// Like [`write`](Self::write), dropping the writer lock of `evict`
    /// after a successful publish
    ///
    /// The lock set is computed from the committed state, so it is checked
    /// again once the locks are held; if it grew in between, or a lock was
    /// evicted while waiting for it, the locks are released and taken again.
    fn write_evicting<T, L, F>(&self, lock_set: L, op: F, evict: Option<&SheetId>) -> Result<T>
    where
        L: Fn(&Ledger) -> Vec<SheetId>,
        F: FnOnce(&mut Ledger) -> Result<T>,
    {
        let mut ids: BTreeSet<SheetId> = lock_set(&self.snapshot()).into_iter().collect();
        loop {
            let locks = self.writer_locks(&ids);
            let _guards: Vec<_> = locks.iter().map(|lock| lock.lock()).collect();
            if !self.still_registered(&ids, &locks) {
                tracing::trace!("writer lock evicted, retrying");
                continue;
            }

            let current = self.snapshot();
            let needed: BTreeSet<SheetId> = lock_set(&current).into_iter().collect();
            if !needed.is_subset(&ids) {
                tracing::trace!(sheets = needed.len(), "lock set grew, retrying");
                ids.extend(needed);
                continue;
            }

            let mut draft = current.as_ref().clone();
            let result = op(&mut draft)?;
            Arc::make_mut(&mut *self.ledger.write()).publish(&draft, &ids);
            if let Some(id) = evict {
                self.writers.lock().remove(id);
            }
            return Ok(result);
        }
    }

    fn still_registered(&self, ids: &BTreeSet<SheetId>, locks: &[Arc<Mutex<()>>]) -> bool {
        let writers = self.writers.lock();
        ids.iter().zip(locks).all(|(id, lock)| {
            writers
                .get(id)
                .is_some_and(|current| Arc::ptr_eq(current, lock))
        })
    }

    fn writer_locks(&self, ids: &BTreeSet<SheetId>) -> Vec<Arc<Mutex<()>>> {
        let mut writers = self.writers.lock();
        ids.iter()
            .map(|id| Arc::clone(writers.entry(id.clone()).or_default()))
            .collect()
    }
}

impl From<Ledger> for LedgerService {
    fn from(ledger: Ledger) -> Self {
        Self::new(ledger)
    }
}
