//! Prelude module - common imports for duke-ledger users
//!
//! ```rust
//! use duke_ledger::prelude::*;
//! ```

pub use crate::{
    // Schema types
    Aggregation,
    Attribute,
    AttributeKind,
    // Calculation types
    CellBreakdown,
    // Cell types
    CellValue,
    CsvReader,
    CsvWriter,
    // Error types
    Error,
    Formula,
    // Main types
    Ledger,
    // Extension traits
    LedgerExt,
    LedgerService,
    Mutation,
    Period,
    PeriodView,
    Result,
    Row,
    RowInput,
    Schema,
    Sheet,
    SheetId,
    SourceRef,
    SubrowConfig,
    SubrowRecord,
    ValidationError,
};
