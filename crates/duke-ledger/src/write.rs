//! Row write path
//!
//! A write is validated in full against the schema before anything is
//! applied. Writing the first manual value of an unfed Recurrent column
//! seeds it; the returned [`SchemaPatch`] flips the column to fed.

use std::collections::BTreeMap;

use duke_ledger_core::{
    AttributeKind, CellValue, Error, Result, Row, Schema, SubrowRecord, ValidationError,
};
use duke_ledger_formula::{CarryForwardResolver, SubrowAggregator};

/// Values supplied for one row write, keyed by attribute index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowInput {
    pub values: BTreeMap<usize, CellValue>,
    /// Replaces the cell's records wholesale; an empty list clears them
    pub subrows: BTreeMap<usize, Vec<SubrowRecord>>,
    /// `None` clears a stored adjustment
    pub adjustments: BTreeMap<usize, Option<f64>>,
}

impl RowInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a raw value
    pub fn value<V: Into<CellValue>>(mut self, index: usize, value: V) -> Self {
        self.values.insert(index, value.into());
        self
    }

    /// Replace the subrow records of a cell
    pub fn subrows(mut self, index: usize, records: Vec<SubrowRecord>) -> Self {
        self.subrows.insert(index, records);
        self
    }

    /// Set the adjustment of a carried-forward cell
    pub fn adjustment(mut self, index: usize, adjustment: f64) -> Self {
        self.adjustments.insert(index, Some(adjustment));
        self
    }

    /// Remove the adjustment of a carried-forward cell
    pub fn clear_adjustment(mut self, index: usize) -> Self {
        self.adjustments.insert(index, None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.subrows.is_empty() && self.adjustments.is_empty()
    }
}

/// Schema change implied by a row write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaPatch {
    /// Recurrent columns that received their seed and are now fed
    pub fed: Vec<usize>,
}

impl SchemaPatch {
    pub fn is_empty(&self) -> bool {
        self.fed.is_empty()
    }
}

/// Result of a row write
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    /// The row as stored
    pub row: Row,
    /// Applied together with the row
    pub schema_patch: Option<SchemaPatch>,
}

/// Validates and applies [`RowInput`]s
pub struct RowWriter;

impl RowWriter {
    /// Check an input against a schema without applying it
    pub fn validate(schema: &Schema, input: &RowInput) -> Result<()> {
        let attribute_kind = |index: usize| -> Result<&AttributeKind> {
            if index == 0 {
                return Err(ValidationError::DateColumn.into());
            }
            Ok(schema.try_attribute(index)?.kind())
        };

        for (&index, value) in &input.values {
            match attribute_kind(index)? {
                kind if kind.is_computed() => {
                    return Err(ValidationError::ComputedColumn(index).into())
                }
                AttributeKind::Recurrent(r) if !CarryForwardResolver::accepts_seed(r) => {
                    return Err(ValidationError::FedColumn(index).into())
                }
                _ => {}
            }
            if let CellValue::Number(n) = value {
                if !n.is_finite() {
                    return Err(ValidationError::NotANumber(index).into());
                }
            }
        }

        for (&index, records) in &input.subrows {
            match attribute_kind(index)? {
                kind if kind.is_computed() => {
                    return Err(ValidationError::ComputedColumn(index).into())
                }
                AttributeKind::Recurrent(r) if !CarryForwardResolver::accepts_seed(r) => {
                    return Err(ValidationError::FedColumn(index).into())
                }
                _ => {}
            }
            let config = schema
                .try_attribute(index)?
                .subrows()
                .ok_or(ValidationError::SubrowsNotAllowed(index))?;
            for (position, record) in records.iter().enumerate() {
                let mut numbered = vec![record.clone()];
                config.number_serials(&mut numbered);
                config.validate_record(index, position, &numbered[0])?;
            }
        }

        for (&index, adjustment) in &input.adjustments {
            match attribute_kind(index)? {
                AttributeKind::Recurrent(r) if CarryForwardResolver::accepts_adjustment(r) => {}
                _ => return Err(ValidationError::AdjustmentNotAllowed(index).into()),
            }
            if adjustment.map_or(false, |a| !a.is_finite()) {
                return Err(ValidationError::NotANumber(index).into());
            }
        }
        Ok(())
    }

    /// Validate and apply an input to a row
    ///
    /// Returns the Recurrent columns seeded by this write. Nothing is
    /// applied when validation fails.
    pub fn apply(schema: &Schema, row: &mut Row, input: RowInput) -> Result<SchemaPatch> {
        Self::validate(schema, &input)?;
        let mut patch = SchemaPatch::default();

        for (index, value) in input.values {
            let seeds = !value.is_empty();
            row.set_cell(index, value);
            if seeds {
                Self::seed(schema, row, index, &mut patch);
            }
        }

        for (index, mut records) in input.subrows {
            let attribute = schema.try_attribute(index)?;
            let config = attribute
                .subrows()
                .ok_or(Error::Validation(ValidationError::SubrowsNotAllowed(index)))?;
            config.number_serials(&mut records);
            if !records.is_empty() {
                row.set_cell(
                    index,
                    CellValue::Number(SubrowAggregator::aggregate(&records, config)),
                );
                row.set_subrows(index, records);
                Self::seed(schema, row, index, &mut patch);
            } else {
                row.set_subrows(index, records);
            }
        }

        for (index, adjustment) in input.adjustments {
            row.set_adjustment(index, adjustment);
        }

        Ok(patch)
    }

    fn seed(schema: &Schema, row: &mut Row, index: usize, patch: &mut SchemaPatch) {
        let unfed = schema
            .attribute(index)
            .and_then(|a| a.recurrence())
            .map_or(false, CarryForwardResolver::accepts_seed);
        if unfed {
            row.mark_seeded(index);
            if !patch.fed.contains(&index) {
                patch.fed.push(index);
            }
        }
    }
}
