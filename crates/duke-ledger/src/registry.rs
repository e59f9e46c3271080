//! Schema registry
//!
//! Holds every sheet of a ledger and refuses to store a schema that breaks
//! an invariant, including invariants that span sheets (Referenced columns
//! must point at an existing Independent column of another sheet).

use std::collections::BTreeMap;
use std::sync::Arc;

use duke_ledger_core::{
    AttributeKind, Error, Result, Schema, Sheet, SheetId, ValidationError,
};
use duke_ledger_formula::validate_schema;

/// Sheets of a ledger keyed by id
///
/// Sheets are kept behind `Arc` so snapshots of the registry are cheap.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    sheets: BTreeMap<SheetId, Arc<Sheet>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a full set of sheets, validating them together
    pub fn from_sheets(sheets: Vec<Sheet>) -> Result<Self> {
        let mut registry = Self::new();
        for sheet in &sheets {
            if registry.contains(sheet.id()) {
                return Err(Error::DuplicateSheet(sheet.id().to_string()));
            }
            registry
                .sheets
                .insert(sheet.id().clone(), Arc::new(sheet.clone()));
        }
        for sheet in registry.sheets.values() {
            registry.check_sheet(sheet)?;
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn contains(&self, id: &SheetId) -> bool {
        self.sheets.contains_key(id)
    }

    /// Schema of a sheet
    pub fn get(&self, id: &SheetId) -> Result<&Schema> {
        self.sheet(id).map(Sheet::schema)
    }

    pub fn sheet(&self, id: &SheetId) -> Result<&Sheet> {
        self.sheets
            .get(id)
            .map(|sheet| sheet.as_ref())
            .ok_or_else(|| Error::SheetNotFound(id.to_string()))
    }

    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.values().map(|sheet| sheet.as_ref())
    }

    pub fn ids(&self) -> impl Iterator<Item = &SheetId> {
        self.sheets.keys()
    }

    /// Replace the schema of an existing sheet
    pub fn put(&mut self, id: &SheetId, schema: Schema) -> Result<()> {
        let mut sheet = self.sheet(id)?.clone();
        sheet.set_schema(schema);
        self.put_sheets(vec![sheet])
    }

    /// Add a new sheet
    pub fn insert(&mut self, sheet: Sheet) -> Result<()> {
        if self.contains(sheet.id()) {
            return Err(Error::DuplicateSheet(sheet.id().to_string()));
        }
        self.put_sheets(vec![sheet])
    }

    /// Store several sheets as one change: either all are stored or none
    pub fn put_sheets(&mut self, sheets: Vec<Sheet>) -> Result<()> {
        let mut candidate = self.clone();
        let touched: Vec<SheetId> = sheets.iter().map(|s| s.id().clone()).collect();
        for sheet in sheets {
            candidate.sheets.insert(sheet.id().clone(), Arc::new(sheet));
        }
        for id in &touched {
            candidate.check_sheet(candidate.sheet(id)?)?;
            for referrer in candidate.referrers(id) {
                candidate.check_sheet(candidate.sheet(&referrer)?)?;
            }
        }
        *self = candidate;
        Ok(())
    }

    /// Remove a sheet no other sheet references
    pub fn remove(&mut self, id: &SheetId) -> Result<Sheet> {
        self.sheet(id)?;
        if let Some(referrer) = self.referrers(id).into_iter().next() {
            return Err(Error::SheetInUse {
                sheet: id.to_string(),
                referrer: referrer.to_string(),
            });
        }
        let sheet = self
            .sheets
            .remove(id)
            .ok_or_else(|| Error::SheetNotFound(id.to_string()))?;
        Ok(Arc::try_unwrap(sheet).unwrap_or_else(|shared| shared.as_ref().clone()))
    }

    /// Other sheets with a Referenced column pointing at `id`, sorted
    pub fn referrers(&self, id: &SheetId) -> Vec<SheetId> {
        self.sheets
            .values()
            .filter(|sheet| sheet.id() != id && sheet.references_sheet(id))
            .map(|sheet| sheet.id().clone())
            .collect()
    }

    /// Copy one sheet's committed state over from another registry
    pub(crate) fn publish(&mut self, from: &SchemaRegistry, id: &SheetId) {
        match from.sheets.get(id) {
            Some(sheet) => {
                self.sheets.insert(id.clone(), Arc::clone(sheet));
            }
            None => {
                self.sheets.remove(id);
            }
        }
    }

    /// Check a sheet's own invariants and its outgoing references
    fn check_sheet(&self, sheet: &Sheet) -> Result<()> {
        sheet.validate()?;
        validate_schema(sheet.schema())?;
        for attribute in sheet.schema().attributes() {
            let AttributeKind::Referenced {
                source: Some(source),
            } = attribute.kind()
            else {
                continue;
            };
            let target = self.get(&source.sheet)?;
            let kind = target.try_attribute(source.index)?.kind();
            if !matches!(kind, AttributeKind::Independent) || source.index == 0 {
                return Err(ValidationError::ReferenceNotIndependent {
                    sheet: source.sheet.to_string(),
                    index: source.index,
                }
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duke_ledger_core::{Attribute, SourceRef};

    fn prices() -> Sheet {
        let schema = Schema::from_attributes(vec![
            Attribute::independent("Date"),
            Attribute::independent("Price"),
            Attribute::derived("Double", [1], []),
        ])
        .unwrap();
        Sheet::with_schema("prices", "Prices", schema)
    }

    fn sales(index: usize) -> Sheet {
        let schema = Schema::from_attributes(vec![
            Attribute::independent("Date"),
            Attribute::referenced("Price", SourceRef::new("prices", index)),
        ])
        .unwrap();
        Sheet::with_schema("sales", "Sales", schema)
    }

    #[test]
    fn test_insert_and_get() {
        let mut registry = SchemaRegistry::new();
        registry.insert(prices()).unwrap();
        assert_eq!(registry.get(&"prices".into()).unwrap().len(), 3);
        assert!(matches!(
            registry.insert(prices()),
            Err(Error::DuplicateSheet(_))
        ));
        assert!(matches!(
            registry.get(&"nope".into()),
            Err(Error::SheetNotFound(_))
        ));
    }

    #[test]
    fn test_reference_must_target_independent() {
        let mut registry = SchemaRegistry::new();
        registry.insert(prices()).unwrap();
        assert!(registry.insert(sales(1)).is_ok());

        let mut other = sales(2);
        other.set_name("Other");
        let err = SchemaRegistry::from_sheets(vec![prices(), other]).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::ReferenceNotIndependent { index: 2, .. })
        ));
    }

    #[test]
    fn test_reference_to_missing_sheet() {
        let mut registry = SchemaRegistry::new();
        assert!(matches!(
            registry.insert(sales(1)),
            Err(Error::SheetNotFound(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_source_change_checked_against_referrers() {
        let mut registry = SchemaRegistry::from_sheets(vec![prices(), sales(1)]).unwrap();
        let id = SheetId::from("prices");
        let mut schema = registry.get(&id).unwrap().clone();
        schema
            .attribute_mut(1)
            .unwrap()
            .set_kind(AttributeKind::Derived(Default::default()));
        assert!(registry.put(&id, schema).is_err());
        // Unchanged after the failed put.
        assert!(matches!(
            registry.get(&id).unwrap().attribute(1).unwrap().kind(),
            AttributeKind::Independent
        ));
    }

    #[test]
    fn test_put_rejects_cycles() {
        let mut registry = SchemaRegistry::new();
        registry.insert(prices()).unwrap();
        let id = SheetId::from("prices");
        let mut schema = registry.get(&id).unwrap().clone();
        schema.push_unchecked(Attribute::derived("A", [4], []));
        schema.push_unchecked(Attribute::derived("B", [3], []));
        assert!(matches!(
            registry.put(&id, schema),
            Err(Error::Validation(ValidationError::CircularFormula(_)))
        ));
    }

    #[test]
    fn test_remove_referenced_sheet_rejected() {
        let mut registry = SchemaRegistry::from_sheets(vec![prices(), sales(1)]).unwrap();
        assert!(matches!(
            registry.remove(&"prices".into()),
            Err(Error::SheetInUse { .. })
        ));
        registry.remove(&"sales".into()).unwrap();
        registry.remove(&"prices".into()).unwrap();
        assert!(registry.is_empty());
    }
}
