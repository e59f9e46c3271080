//! Sheet schema: the ordered attribute list

use crate::attribute::{normalize_name, Attribute, AttributeKind};
use crate::error::{Error, Result, ValidationError};
use crate::MAX_NAME_LEN;

/// Name given to the date column of new schemas
pub const DATE_COLUMN_NAME: &str = "Date";

/// Ordered attribute list of a sheet
///
/// Position 0 is always the Independent date column. Positions are the
/// addressing scheme of formulas, references and carry-forward pointers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Schema {
    attributes: Vec<Attribute>,
}

impl Schema {
    /// Create a schema holding only the date column
    pub fn new() -> Self {
        Self {
            attributes: vec![Attribute::independent(DATE_COLUMN_NAME)],
        }
    }

    /// Build a schema from a full attribute list and validate its
    /// structure. Cycle detection lives in the formula crate.
    pub fn from_attributes(attributes: Vec<Attribute>) -> Result<Self> {
        let schema = Self { attributes };
        schema.validate()?;
        Ok(schema)
    }

    /// Number of attributes, including the date column
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Always false for a valid schema; present for API symmetry
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, index: usize) -> Option<&Attribute> {
        self.attributes.get(index)
    }

    /// Get an attribute or a not-found error
    pub fn try_attribute(&self, index: usize) -> Result<&Attribute> {
        self.attributes
            .get(index)
            .ok_or(Error::AttributeNotFound(index, self.attributes.len()))
    }

    pub fn attribute_mut(&mut self, index: usize) -> Option<&mut Attribute> {
        self.attributes.get_mut(index)
    }

    /// Position of the attribute with the given name (normalized compare)
    pub fn position(&self, name: &str) -> Option<usize> {
        let wanted = normalize_name(name);
        self.attributes
            .iter()
            .position(|a| a.normalized_name() == wanted)
    }

    /// Resolve a column given either by name or by numeric index
    pub fn resolve_column(&self, key: &str) -> Result<usize> {
        if let Ok(index) = key.trim().parse::<usize>() {
            self.try_attribute(index)?;
            return Ok(index);
        }
        self.position(key)
            .ok_or_else(|| Error::AttributeNameNotFound(key.to_string()))
    }

    /// Column names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name())
    }

    /// Iterate `(index, attribute)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Attribute)> {
        self.attributes.iter().enumerate()
    }

    /// Indices of Recurrent attributes
    pub fn recurrent_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.iter()
            .filter(|(_, a)| matches!(a.kind(), AttributeKind::Recurrent(_)))
            .map(|(i, _)| i)
    }

    /// Append an attribute without validation; returns its index
    pub fn push_unchecked(&mut self, attribute: Attribute) -> usize {
        self.attributes.push(attribute);
        self.attributes.len() - 1
    }

    /// Remove an attribute without renumbering anything
    pub fn remove_unchecked(&mut self, index: usize) -> Option<Attribute> {
        if index < self.attributes.len() {
            Some(self.attributes.remove(index))
        } else {
            None
        }
    }

    /// Check the structural invariants
    ///
    /// - attribute 0 is an Independent date column without subrows
    /// - names are non-empty and unique after normalization
    /// - Derived index sets are disjoint, in range, and point neither at the
    ///   attribute itself nor at the date column
    /// - Recurrent pointers are in range and not the date column
    /// - subrow configurations are well formed and only on Independent or
    ///   Recurrent attributes
    pub fn validate(&self) -> Result<()> {
        self.validate_structure().map_err(Error::from)
    }

    fn validate_structure(&self) -> std::result::Result<(), ValidationError> {
        let len = self.attributes.len();
        match self.attributes.first() {
            Some(date) if matches!(date.kind(), AttributeKind::Independent) => {
                if date.subrows().is_some() {
                    return Err(ValidationError::DateColumn);
                }
            }
            _ => return Err(ValidationError::MissingDateColumn),
        }

        let mut seen: Vec<String> = Vec::with_capacity(len);
        for (index, attribute) in self.iter() {
            let name = attribute.normalized_name();
            if name.is_empty() {
                return Err(ValidationError::EmptyName);
            }
            if name.chars().count() > MAX_NAME_LEN {
                return Err(ValidationError::NameTooLong(attribute.name().to_string()));
            }
            if seen.contains(&name) {
                return Err(ValidationError::DuplicateName(attribute.name().to_string()));
            }
            seen.push(name);

            let check = |target: usize| -> std::result::Result<(), ValidationError> {
                if target >= len {
                    return Err(ValidationError::IndexOutOfRange {
                        attribute: index,
                        index: target,
                        len,
                    });
                }
                if target == 0 {
                    return Err(ValidationError::DateReference(index));
                }
                Ok(())
            };

            match attribute.kind() {
                AttributeKind::Independent | AttributeKind::Referenced { .. } => {}
                AttributeKind::Derived(formula) => {
                    for target in formula.indices() {
                        check(target)?;
                        if target == index {
                            return Err(ValidationError::SelfReference(index));
                        }
                    }
                    if let Some(&both) = formula.addition.intersection(&formula.subtraction).next()
                    {
                        return Err(ValidationError::OverlappingFormula {
                            attribute: index,
                            index: both,
                        });
                    }
                }
                AttributeKind::Recurrent(recurrence) => {
                    if let Some(target) = recurrence.reference_index {
                        check(target)?;
                    }
                }
            }

            if let Some(config) = attribute.subrows() {
                match attribute.kind() {
                    AttributeKind::Independent | AttributeKind::Recurrent(_) if index != 0 => {
                        config.validate(index)?
                    }
                    _ => return Err(ValidationError::SubrowsNotAllowed(index)),
                }
            }
        }
        Ok(())
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}
