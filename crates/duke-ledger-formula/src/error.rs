//! Formula error types

use duke_ledger_core::{Error, ValidationError};
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during evaluation
///
/// Missing or non-numeric inputs are not errors; they evaluate as zero.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Derived attributes depend on each other in a loop
    #[error("Circular reference detected through attributes {0:?}")]
    CircularReference(Vec<usize>),

    /// Attribute index outside the schema
    #[error("Invalid reference: attribute {index} (schema has {len})")]
    InvalidReference { index: usize, len: usize },

    /// Row index outside the evaluated period
    #[error("Row {index} out of bounds (period has {len} rows)")]
    RowOutOfBounds { index: usize, len: usize },

    /// Nesting of Derived attributes deeper than allowed
    #[error("Evaluation depth limit {limit} exceeded at attribute {attribute}")]
    DepthExceeded { attribute: usize, limit: usize },
}

impl From<FormulaError> for Error {
    fn from(err: FormulaError) -> Self {
        match err {
            FormulaError::CircularReference(path) => {
                Error::Validation(ValidationError::CircularFormula(path))
            }
            FormulaError::InvalidReference { index, len } => Error::AttributeNotFound(index, len),
            other => Error::other(other.to_string()),
        }
    }
}
