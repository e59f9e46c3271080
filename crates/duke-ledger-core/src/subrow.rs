//! Subrow (itemized line entry) definitions
//!
//! A column with a [`SubrowConfig`] expands each of its cells into a list of
//! [`SubrowRecord`]s. One field of the configuration is the aggregate field;
//! its values are reduced with the configured [`Aggregation`] into the cell's
//! displayed value.

use std::fmt;
use std::str::FromStr;

use crate::cell::CellValue;
use crate::error::{Error, ValidationError};

/// How a list of subrow values is reduced to a single cell value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Aggregation {
    #[default]
    Sum,
    Average,
    Max,
    Min,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Average => "average",
            Aggregation::Max => "max",
            Aggregation::Min => "min",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Aggregation::Sum),
            "average" | "avg" => Ok(Aggregation::Average),
            "max" => Ok(Aggregation::Max),
            "min" => Ok(Aggregation::Min),
            other => Err(Error::other(format!("Unknown aggregation: {other}"))),
        }
    }
}

/// Type of a subrow field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FieldType {
    /// Numeric value
    Number,
    /// Free text (category, note)
    Text,
    /// Running serial number; numbered 1..n on write when left empty
    Serial,
}

/// One field of a subrow record
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubrowField {
    pub name: String,
    pub field_type: FieldType,
    /// Records missing a required field are rejected on write and not
    /// counted on read
    pub required: bool,
}

impl SubrowField {
    pub fn new<S: Into<String>>(name: S, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Subrow layout of a column
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubrowConfig {
    pub fields: Vec<SubrowField>,
    /// Index into `fields` of the value that is aggregated
    pub aggregate_field: usize,
    #[cfg_attr(feature = "serde", serde(default))]
    pub aggregation: Aggregation,
}

impl SubrowConfig {
    /// Create a configuration aggregating `fields[aggregate_field]`
    pub fn new(fields: Vec<SubrowField>, aggregate_field: usize, aggregation: Aggregation) -> Self {
        Self {
            fields,
            aggregate_field,
            aggregation,
        }
    }

    /// The layout used by stock columns: serial, category, note and a
    /// required, summed value
    pub fn stock_items() -> Self {
        Self::new(
            vec![
                SubrowField::new("serial", FieldType::Serial),
                SubrowField::new("category", FieldType::Text),
                SubrowField::new("note", FieldType::Text),
                SubrowField::new("value", FieldType::Number).required(),
            ],
            3,
            Aggregation::Sum,
        )
    }

    /// Check the configuration itself; `attribute` is only used for errors
    pub fn validate(&self, attribute: usize) -> Result<(), ValidationError> {
        let fail = |reason: String| ValidationError::SubrowConfig { attribute, reason };

        if self.fields.is_empty() {
            return Err(fail("no fields".into()));
        }
        let mut seen: Vec<String> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let name = crate::attribute::normalize_name(&field.name);
            if name.is_empty() {
                return Err(fail("field name must not be empty".into()));
            }
            if seen.contains(&name) {
                return Err(fail(format!("duplicate field '{name}'")));
            }
            seen.push(name);
        }
        match self.fields.get(self.aggregate_field) {
            None => Err(fail(format!(
                "aggregate field {} out of range",
                self.aggregate_field
            ))),
            Some(field) if field.field_type != FieldType::Number => Err(fail(format!(
                "aggregate field '{}' must be a number",
                field.name
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Check a record against the configuration
    ///
    /// `attribute` and `record` are only used for error reporting.
    pub fn validate_record(
        &self,
        attribute: usize,
        record: usize,
        values: &SubrowRecord,
    ) -> Result<(), ValidationError> {
        let fail = |reason: String| ValidationError::MalformedSubrow {
            attribute,
            record,
            reason,
        };

        if values.len() != self.fields.len() {
            return Err(fail(format!(
                "expected {} fields, got {}",
                self.fields.len(),
                values.len()
            )));
        }
        for (field, value) in self.fields.iter().zip(values.values()) {
            if value.is_empty() {
                if field.required {
                    return Err(fail(format!("missing required field '{}'", field.name)));
                }
                continue;
            }
            match field.field_type {
                FieldType::Number | FieldType::Serial if value.as_number().is_none() => {
                    return Err(fail(format!("field '{}' must be a number", field.name)));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Whether a record carries every required field (read-side check)
    pub fn is_complete(&self, record: &SubrowRecord) -> bool {
        self.fields.iter().enumerate().all(|(i, field)| {
            !field.required || record.get(i).map(|v| !v.is_empty()).unwrap_or(false)
        })
    }

    /// Fill empty serial fields with the record's 1-based position
    pub fn number_serials(&self, records: &mut [SubrowRecord]) {
        for (field_idx, field) in self.fields.iter().enumerate() {
            if field.field_type != FieldType::Serial {
                continue;
            }
            for (pos, record) in records.iter_mut().enumerate() {
                if let Some(slot) = record.0.get_mut(field_idx) {
                    if slot.is_empty() {
                        *slot = CellValue::Number((pos + 1) as f64);
                    }
                }
            }
        }
    }
}

/// One itemized line entry, positionally aligned to a [`SubrowConfig`]
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SubrowRecord(pub Vec<CellValue>);

impl SubrowRecord {
    pub fn new(values: Vec<CellValue>) -> Self {
        Self(values)
    }

    pub fn get(&self, field: usize) -> Option<&CellValue> {
        self.0.get(field)
    }

    pub fn values(&self) -> &[CellValue] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<CellValue>> for SubrowRecord {
    fn from(values: Vec<CellValue>) -> Self {
        Self(values)
    }
}
