//! Error types for duke-ledger-core

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in duke-ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Input or schema rejected before anything was applied
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Sheet not found by id
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Attribute index out of bounds
    #[error("Attribute index {0} out of bounds (count: {1})")]
    AttributeNotFound(usize, usize),

    /// Attribute not found by name
    #[error("Attribute not found: {0}")]
    AttributeNameNotFound(String),

    /// No row exists for the date
    #[error("No row for {0}")]
    RowNotFound(NaiveDate),

    /// A row already exists for the date
    #[error("A row for {0} already exists")]
    DuplicateRow(NaiveDate),

    /// A sheet with the id already exists
    #[error("Sheet id already exists: {0}")]
    DuplicateSheet(String),

    /// Sheet is still the source of Referenced columns elsewhere
    #[error("Sheet {sheet} is referenced by sheet {referrer}")]
    SheetInUse { sheet: String, referrer: String },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Broad classification of an [`Error`], matching how callers react to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; fix the request
    Validation,
    /// Unknown sheet, attribute or row
    NotFound,
    /// Request conflicts with current state
    StateConflict,
    /// Anything else
    Other,
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::SheetNotFound(_)
            | Error::AttributeNotFound(..)
            | Error::AttributeNameNotFound(_)
            | Error::RowNotFound(_) => ErrorKind::NotFound,
            Error::DuplicateRow(_) | Error::DuplicateSheet(_) | Error::SheetInUse { .. } => {
                ErrorKind::StateConflict
            }
            Error::Other(_) => ErrorKind::Other,
        }
    }
}

/// Reasons a schema change or row write is rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Attribute or sheet name is empty after normalization
    #[error("name must not be empty")]
    EmptyName,

    /// Name longer than [`crate::MAX_NAME_LEN`] characters
    #[error("name '{0}' is too long")]
    NameTooLong(String),

    /// Attribute name collides with another attribute of the sheet
    #[error("an attribute named '{0}' already exists")]
    DuplicateName(String),

    /// The date column at index 0 is fixed
    #[error("the date column cannot be changed or deleted")]
    DateColumn,

    /// Schema does not start with an Independent date column
    #[error("attribute 0 must be the Independent date column")]
    MissingDateColumn,

    /// Formula, recurrence or subrow pointer past the end of the schema
    #[error("attribute {attribute} refers to index {index}, but the sheet has {len} attributes")]
    IndexOutOfRange {
        attribute: usize,
        index: usize,
        len: usize,
    },

    /// Formula or recurrence points at the date column
    #[error("attribute {0} refers to the date column")]
    DateReference(usize),

    /// Derived attribute refers to itself
    #[error("attribute {0} refers to itself")]
    SelfReference(usize),

    /// Index present in both addition and subtraction sets
    #[error("attribute {attribute} adds and subtracts index {index}")]
    OverlappingFormula { attribute: usize, index: usize },

    /// Derived attributes form a cycle
    #[error("circular formula through attributes {0:?}")]
    CircularFormula(Vec<usize>),

    /// Referenced attribute points at its own sheet
    #[error("attribute {0} references its own sheet")]
    SelfSheetReference(usize),

    /// Referenced attribute must point at an Independent source column
    #[error("source attribute {index} of sheet {sheet} is not Independent")]
    ReferenceNotIndependent { sheet: String, index: usize },

    /// Subrow configuration is malformed
    #[error("invalid subrow configuration on attribute {attribute}: {reason}")]
    SubrowConfig { attribute: usize, reason: String },

    /// Subrow configuration attached to a kind that cannot hold subrows
    #[error("attribute {0} cannot hold subrows")]
    SubrowsNotAllowed(usize),

    /// Subrow record does not match the configuration
    #[error("invalid subrow record {record} for attribute {attribute}: {reason}")]
    MalformedSubrow {
        attribute: usize,
        record: usize,
        reason: String,
    },

    /// Value supplied for a computed column
    #[error("attribute {0} is computed and cannot be written")]
    ComputedColumn(usize),

    /// Manual value supplied for a fed Recurrent column
    #[error("attribute {0} is carried forward; use an adjustment instead")]
    FedColumn(usize),

    /// Adjustment supplied for a column that does not accept one
    #[error("attribute {0} does not accept adjustments")]
    AdjustmentNotAllowed(usize),

    /// Value or adjustment is not a finite number
    #[error("attribute {0} requires a finite number")]
    NotANumber(usize),
}
