//! Sheet type

use std::borrow::Borrow;
use std::fmt;

use crate::attribute::{clean_name, AttributeKind};
use crate::error::{Result, ValidationError};
use crate::schema::Schema;
use crate::MAX_NAME_LEN;

/// Identifier of a sheet
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SheetId(String);

impl SheetId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SheetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SheetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&SheetId> for SheetId {
    fn from(id: &SheetId) -> Self {
        id.clone()
    }
}

impl Borrow<str> for SheetId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A ledger sheet: identity, display name and schema
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sheet {
    id: SheetId,
    name: String,
    schema: Schema,
}

impl Sheet {
    /// Create a sheet with only the date column
    pub fn new<I: Into<SheetId>, S: AsRef<str>>(id: I, name: S) -> Self {
        Self {
            id: id.into(),
            name: clean_name(name.as_ref()),
            schema: Schema::new(),
        }
    }

    /// Create a sheet with an existing schema
    pub fn with_schema<I: Into<SheetId>, S: AsRef<str>>(id: I, name: S, schema: Schema) -> Self {
        Self {
            id: id.into(),
            name: clean_name(name.as_ref()),
            schema,
        }
    }

    pub fn id(&self) -> &SheetId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name<S: AsRef<str>>(&mut self, name: S) {
        self.name = clean_name(name.as_ref());
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    pub fn set_schema(&mut self, schema: Schema) {
        self.schema = schema;
    }

    /// Validate what can be checked without looking at other sheets
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.id.as_str().trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::NameTooLong(self.name.clone()).into());
        }
        self.schema.validate()?;
        for (index, attribute) in self.schema.iter() {
            if let AttributeKind::Referenced {
                source: Some(source),
            } = attribute.kind()
            {
                if source.sheet == self.id {
                    return Err(ValidationError::SelfSheetReference(index).into());
                }
            }
        }
        Ok(())
    }

    /// Whether any Referenced column of this sheet points at `other`
    pub fn references_sheet(&self, other: &SheetId) -> bool {
        self.schema
            .attributes()
            .iter()
            .filter_map(|a| a.source())
            .any(|source| &source.sheet == other)
    }
}
