//! # duke-ledger
//!
//! A Rust library for dated ledgers whose columns compute themselves.
//!
//! A ledger holds sheets. Each sheet has a schema of attributes (columns)
//! and one row per date. Attributes are either entered by hand
//! (Independent) or computed: signed sums of other columns (Derived), the
//! same cell of another sheet (Referenced), or a column carried forward
//! from the previous row (Recurrent). Rows are grouped into monthly
//! periods; the first row of a period continues from the last row of the
//! period before it.
//!
//! ## Features
//!
//! - Schema mutations with validation and column renumbering
//! - Period evaluation with carry-forward and cross-sheet references
//! - Subrow records folded into a cell (sum, average, max, min)
//! - JSON documents and CSV import/export
//! - A thread-safe service with per-sheet writers
//!
//! ## Example
//!
//! ```rust
//! use duke_ledger::prelude::*;
//!
//! let schema = Schema::from_attributes(vec![
//!     Attribute::independent("Date"),
//!     Attribute::independent("Purchase"),
//!     Attribute::recurrent("Opening", 4),
//!     Attribute::independent("Sold"),
//!     Attribute::derived("Closing", [1, 2], [3]),
//! ])
//! .unwrap();
//!
//! let mut ledger = Ledger::new();
//! let id = SheetId::from("stock");
//! ledger.add_sheet(Sheet::with_schema("stock", "Stock", schema)).unwrap();
//!
//! let feb = chrono::NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
//! let mar = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//! ledger
//!     .insert_row_on(&id, feb, RowInput::new().value(1, 100.0).value(3, 30.0))
//!     .unwrap();
//! ledger
//!     .insert_row_on(&id, mar, RowInput::new().value(1, 50.0))
//!     .unwrap();
//!
//! let view = ledger.view(&id, Period::of(mar)).unwrap();
//! assert_eq!(view.rows[0].number(2), 70.0);
//! assert_eq!(view.rows[0].number(4), 120.0);
//!
//! // ledger.save("ledger.json").unwrap();
//! ```

pub mod calculation;
pub mod document;
pub mod ledger;
pub mod mutator;
pub mod prelude;
pub mod registry;
pub mod service;
pub mod store;
pub mod write;

pub use calculation::{CalculationEngine, LedgerReferences, PeriodView};
pub use document::{JsonDocument, DOCUMENT_VERSION};
pub use ledger::{ImportSummary, Ledger, LedgerOptions};
pub use mutator::{Applied, Mutation, SchemaMutator};
pub use registry::SchemaRegistry;
pub use service::LedgerService;
pub use store::{PeriodRows, RowStore};
pub use write::{RowInput, RowWriter, SchemaPatch, WriteOutcome};

// Re-export core types
pub use duke_ledger_core::{
    clean_name, normalize_name, Aggregation, Attribute, AttributeKind, CellValue, Error,
    ErrorKind, FieldType, Formula, FormulaTerm, Period, Recurrence, Result, Row, Schema, Sheet,
    SheetId, Sign, SourceRef, SubrowConfig, SubrowField, SubrowRecord, ValidationError,
    DATE_COLUMN_NAME, MAX_NAME_LEN,
};

// Re-export formula types
pub use duke_ledger_formula::{
    AnchorPolicy, CellBreakdown, DependencyHighlight, EvaluationOptions, FormulaError,
    FormulaResult, ResolvedRow, DEFAULT_MAX_DEPTH,
};

// Re-export I/O types
pub use duke_ledger_csv::{
    CsvError, CsvReadOptions, CsvReader, CsvWriteOptions, CsvWriter, ImportedRow, LineTerminator,
};

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Extension trait for Ledger to add file I/O
pub trait LedgerExt {
    /// Open a ledger from a file
    fn open<P: AsRef<Path>>(path: P) -> Result<Ledger>;

    /// Save the ledger to a file
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()>;
}

impl LedgerExt for Ledger {
    fn open<P: AsRef<Path>>(path: P) -> Result<Ledger> {
        let path = path.as_ref();
        match extension(path).as_deref() {
            Some("json") => {
                let file = File::open(path).map_err(|e| Error::other(e.to_string()))?;
                JsonDocument::read(BufReader::new(file))
            }
            _ => Err(Error::other(format!(
                "Unsupported file format: {}",
                path.display()
            ))),
        }
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        match extension(path).as_deref() {
            Some("json") => {
                let file = File::create(path).map_err(|e| Error::other(e.to_string()))?;
                JsonDocument::write(self, BufWriter::new(file))
            }
            _ => Err(Error::other(format!(
                "Unsupported file format: {}",
                path.display()
            ))),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}
