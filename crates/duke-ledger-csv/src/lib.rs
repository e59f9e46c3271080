//! # duke-ledger-csv
//!
//! CSV export of resolved periods and CSV import of row values for
//! duke-ledger.

mod error;
mod options;
mod reader;
mod writer;

pub use error::{CsvError, CsvResult};
pub use options::{CsvReadOptions, CsvWriteOptions, LineTerminator};
pub use reader::{CsvReader, ImportedRow};
pub use writer::CsvWriter;
