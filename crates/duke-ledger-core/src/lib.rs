//! # duke-ledger-core
//!
//! Core data structures for the duke-ledger bookkeeping engine.
//!
//! This crate provides the fundamental types used throughout duke-ledger:
//! - [`Sheet`] and [`Schema`] - A ledger and its ordered column list
//! - [`Attribute`] and [`AttributeKind`] - Column definitions (Independent,
//!   Derived, Referenced, Recurrent)
//! - [`Row`] and [`CellValue`] - Dated entries and their values
//! - [`SubrowConfig`] and [`SubrowRecord`] - Itemized line entries
//! - [`Period`] - The (year, month) partition rows are viewed by
//!
//! ## Example
//!
//! ```rust
//! use duke_ledger_core::{Attribute, Schema};
//!
//! let schema = Schema::from_attributes(vec![
//!     Attribute::independent("Date"),
//!     Attribute::independent("Purchase"),
//!     Attribute::recurrent("Opening Stock", 5),
//!     Attribute::independent("Inward"),
//!     Attribute::independent("Outward"),
//!     Attribute::derived("Closing Stock", [1, 2], [4]),
//! ])
//! .unwrap();
//!
//! assert_eq!(schema.position("closing stock"), Some(5));
//! ```

pub mod attribute;
pub mod cell;
pub mod error;
pub mod period;
pub mod row;
pub mod schema;
pub mod sheet;
pub mod subrow;

// Re-exports for convenience
pub use attribute::{
    clean_name, normalize_name, Attribute, AttributeKind, Formula, FormulaTerm, Recurrence, Sign,
    SourceRef,
};
pub use cell::CellValue;
pub use error::{Error, ErrorKind, Result, ValidationError};
pub use period::Period;
pub use row::Row;
pub use schema::{Schema, DATE_COLUMN_NAME};
pub use sheet::{Sheet, SheetId};
pub use subrow::{Aggregation, FieldType, SubrowConfig, SubrowField, SubrowRecord};

/// Maximum length of a sheet or attribute name
pub const MAX_NAME_LEN: usize = 64;
