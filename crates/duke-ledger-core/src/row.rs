//! Row types

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};

use crate::cell::CellValue;
use crate::period::Period;
use crate::subrow::SubrowRecord;

/// One dated entry of a sheet
///
/// `cells` are positionally aligned to the sheet's schema. A row may be
/// shorter than the schema (columns added after the row was written); the
/// missing cells read as empty.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Row {
    date: NaiveDate,
    created_at: DateTime<Utc>,
    cells: Vec<CellValue>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "BTreeMap::is_empty")
    )]
    subrows: BTreeMap<usize, Vec<SubrowRecord>>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "BTreeMap::is_empty")
    )]
    adjustments: BTreeMap<usize, f64>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "BTreeSet::is_empty")
    )]
    seeded: BTreeSet<usize>,
}

impl Row {
    /// Create an empty row; the date cell is filled in
    pub fn new(date: NaiveDate, created_at: DateTime<Utc>) -> Self {
        Self {
            date,
            created_at,
            cells: vec![CellValue::text(date.format("%Y-%m-%d").to_string())],
            subrows: BTreeMap::new(),
            adjustments: BTreeMap::new(),
            seeded: BTreeSet::new(),
        }
    }

    /// Row key: one row per sheet per date
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Ordering key within a period
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn period(&self) -> Period {
        Period::of(self.date)
    }

    /// Number of stored cells (may be less than the schema length)
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[CellValue] {
        &self.cells
    }

    /// Stored value of a cell; missing cells are empty
    pub fn cell(&self, index: usize) -> &CellValue {
        const EMPTY: &CellValue = &CellValue::Empty;
        self.cells.get(index).unwrap_or(EMPTY)
    }

    /// Store a cell value, padding with empty cells as needed
    pub fn set_cell(&mut self, index: usize, value: CellValue) {
        if index >= self.cells.len() {
            self.cells.resize(index + 1, CellValue::Empty);
        }
        self.cells[index] = value;
    }

    pub fn subrows(&self, index: usize) -> Option<&[SubrowRecord]> {
        self.subrows.get(&index).map(Vec::as_slice)
    }

    pub fn all_subrows(&self) -> &BTreeMap<usize, Vec<SubrowRecord>> {
        &self.subrows
    }

    /// Replace a cell's subrow records wholesale; an empty list removes them
    pub fn set_subrows(&mut self, index: usize, records: Vec<SubrowRecord>) {
        if records.is_empty() {
            self.subrows.remove(&index);
        } else {
            self.subrows.insert(index, records);
        }
    }

    pub fn adjustment(&self, index: usize) -> Option<f64> {
        self.adjustments.get(&index).copied()
    }

    pub fn adjustments(&self) -> &BTreeMap<usize, f64> {
        &self.adjustments
    }

    /// Set or clear the adjustment of a carried-forward cell
    pub fn set_adjustment(&mut self, index: usize, adjustment: Option<f64>) {
        match adjustment {
            Some(value) if value != 0.0 => {
                self.adjustments.insert(index, value);
            }
            _ => {
                self.adjustments.remove(&index);
            }
        }
    }

    /// Whether the row holds the manual seed of a Recurrent column
    pub fn is_seeded(&self, index: usize) -> bool {
        self.seeded.contains(&index)
    }

    pub fn seeded(&self) -> &BTreeSet<usize> {
        &self.seeded
    }

    pub fn mark_seeded(&mut self, index: usize) {
        self.seeded.insert(index);
    }

    /// Drop the cell of a deleted column and re-key everything after it
    pub fn remove_column(&mut self, deleted: usize) {
        if deleted < self.cells.len() {
            self.cells.remove(deleted);
        }
        self.subrows = rekey(std::mem::take(&mut self.subrows), deleted);
        self.adjustments = rekey(std::mem::take(&mut self.adjustments), deleted);
        self.seeded = self
            .seeded
            .iter()
            .filter(|&&i| i != deleted)
            .map(|&i| if i > deleted { i - 1 } else { i })
            .collect();
    }
}

fn rekey<V>(map: BTreeMap<usize, V>, deleted: usize) -> BTreeMap<usize, V> {
    map.into_iter()
        .filter(|(k, _)| *k != deleted)
        .map(|(k, v)| if k > deleted { (k - 1, v) } else { (k, v) })
        .collect()
}
