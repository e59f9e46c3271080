//! # duke-ledger-formula
//!
//! Attribute evaluation engine for duke-ledger.
//!
//! This crate provides:
//! - Dependency tracking between Derived attributes (cycle detection,
//!   evaluation order, highlight view-state)
//! - Subrow aggregation (sum, average, max, min)
//! - Carry-forward of Recurrent attributes and their fed state
//! - One-hop cross-sheet references
//! - Period evaluation: every cell of a month's rows resolved from raw input
//!
//! ## Example
//!
//! ```rust
//! use chrono::{NaiveDate, TimeZone, Utc};
//! use duke_ledger_core::{Attribute, CellValue, Period, Row, Schema};
//! use duke_ledger_formula::{EvaluationOptions, NoReferences, PeriodEvaluator};
//!
//! let schema = Schema::from_attributes(vec![
//!     Attribute::independent("Date"),
//!     Attribute::independent("In"),
//!     Attribute::independent("Out"),
//!     Attribute::derived("Net", [1], [2]),
//! ])
//! .unwrap();
//!
//! let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//! let mut row = Row::new(date, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
//! row.set_cell(1, CellValue::Number(10.0));
//! row.set_cell(2, CellValue::Number(4.0));
//! let rows = vec![row];
//!
//! let options = EvaluationOptions::default();
//! let resolved = PeriodEvaluator::new(
//!     &schema,
//!     Period::of(date),
//!     &rows,
//!     None,
//!     &NoReferences,
//!     &options,
//! )
//! .unwrap()
//! .evaluate()
//! .unwrap();
//!
//! assert_eq!(resolved[0].number(3), 6.0);
//! ```

pub mod aggregate;
pub mod carry_forward;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod reference;

pub use aggregate::{raw_value, SubrowAggregator};
pub use carry_forward::{AnchorPolicy, CarryForwardResolver};
pub use dependency::{
    dependents, formula_terms, highlight, validate_schema, DependencyGraph, DependencyHighlight,
};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{
    CellBreakdown, EvaluationOptions, FormulaEvaluator, PeriodEvaluator, ResolvedRow,
    DEFAULT_MAX_DEPTH,
};
pub use reference::{source_value, NoReferences, ReferenceResolver, ReferenceSource};
