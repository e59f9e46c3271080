//! Schema mutations
//!
//! Every structural change to a sheet goes through [`SchemaMutator`]. A
//! mutation is applied to a copy of the affected schemas, validated, and
//! only then stored; a failing mutation changes nothing.

use duke_ledger_core::{
    Attribute, AttributeKind, Error, Formula, Recurrence, Result, Schema, Sheet, SheetId,
    SourceRef, SubrowConfig, ValidationError,
};
use duke_ledger_formula::CarryForwardResolver;

use crate::registry::SchemaRegistry;

/// A change to one sheet's schema
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Append a column
    AddColumn(Attribute),
    /// Rename a column
    RenameColumn { index: usize, name: String },
    /// Make a column Derived with the given formula
    UpdateFormula { index: usize, formula: Formula },
    /// Make a column Referenced with the given source
    UpdateReference { index: usize, source: SourceRef },
    /// Make a column Recurrent, carrying `reference_index` forward
    UpdateRecurrence { index: usize, reference_index: usize },
    /// Attach, replace or remove a column's subrow configuration
    UpdateSubrows {
        index: usize,
        config: Option<SubrowConfig>,
    },
    /// Remove a column and renumber everything that points past it
    DeleteColumn { index: usize },
    /// Flip Recurrent columns to fed after their seed was written
    MarkFed { indices: Vec<usize> },
}

impl Mutation {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::AddColumn(_) => "add_column",
            Mutation::RenameColumn { .. } => "rename_column",
            Mutation::UpdateFormula { .. } => "update_formula",
            Mutation::UpdateReference { .. } => "update_reference",
            Mutation::UpdateRecurrence { .. } => "update_recurrence",
            Mutation::UpdateSubrows { .. } => "update_subrows",
            Mutation::DeleteColumn { .. } => "delete_column",
            Mutation::MarkFed { .. } => "mark_fed",
        }
    }

    /// Other sheets that must not change while the mutation is applied:
    /// the source of a new reference, or the referrers a deletion rewrites
    pub fn related_sheets(&self, registry: &SchemaRegistry, sheet: &SheetId) -> Vec<SheetId> {
        match self {
            Mutation::AddColumn(attribute) => attribute
                .source()
                .map(|s| vec![s.sheet.clone()])
                .unwrap_or_default(),
            Mutation::UpdateReference { source, .. } => vec![source.sheet.clone()],
            Mutation::DeleteColumn { .. } => registry.referrers(sheet),
            Mutation::RenameColumn { .. }
            | Mutation::UpdateFormula { .. }
            | Mutation::UpdateRecurrence { .. }
            | Mutation::UpdateSubrows { .. }
            | Mutation::MarkFed { .. } => Vec::new(),
        }
    }
}

/// What a successful mutation changed
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// The sheet's new schema
    pub schema: Schema,
    /// Every sheet whose schema was rewritten, the mutated sheet first
    pub touched: Vec<SheetId>,
    /// Index of a deleted column; its cells must be dropped from every row
    pub deleted: Option<usize>,
}

/// Applies [`Mutation`]s to a [`SchemaRegistry`]
pub struct SchemaMutator;

impl SchemaMutator {
    /// Apply a mutation to sheet `id`
    ///
    /// `has_rows` decides the initial fed state of new Recurrent columns.
    pub fn apply(
        registry: &mut SchemaRegistry,
        id: &SheetId,
        mutation: Mutation,
        has_rows: bool,
    ) -> Result<Applied> {
        let mut sheet = registry.sheet(id)?.clone();
        let mut touched = vec![id.clone()];
        let mut repaired: Vec<Sheet> = Vec::new();
        let mut deleted = None;
        let schema = sheet.schema_mut();

        match mutation {
            Mutation::AddColumn(mut attribute) => {
                if let AttributeKind::Recurrent(recurrence) = attribute.kind_mut() {
                    recurrence.fed = CarryForwardResolver::initial_fed(has_rows);
                }
                schema.push_unchecked(attribute);
            }
            Mutation::RenameColumn { index, name } => {
                Self::editable(schema, index)?.set_name(name);
            }
            Mutation::UpdateFormula { index, formula } => {
                Self::editable(schema, index)?.set_kind(AttributeKind::Derived(formula));
            }
            Mutation::UpdateReference { index, source } => {
                Self::editable(schema, index)?.set_kind(AttributeKind::Referenced {
                    source: Some(source),
                });
            }
            Mutation::UpdateRecurrence {
                index,
                reference_index,
            } => {
                let attribute = Self::editable(schema, index)?;
                let fed = match attribute.recurrence() {
                    Some(existing) => existing.fed,
                    None => CarryForwardResolver::initial_fed(has_rows),
                };
                attribute.set_kind(AttributeKind::Recurrent(Recurrence {
                    reference_index: Some(reference_index),
                    fed,
                }));
            }
            Mutation::UpdateSubrows { index, config } => {
                Self::editable(schema, index)?.set_subrows(config);
            }
            Mutation::DeleteColumn { index } => {
                Self::editable(schema, index)?;
                schema.remove_unchecked(index);
                Self::forget(schema, index);
                for referrer in registry.referrers(id) {
                    let mut other = registry.sheet(&referrer)?.clone();
                    Self::repair_references(other.schema_mut(), id, index);
                    touched.push(referrer);
                    repaired.push(other);
                }
                deleted = Some(index);
            }
            Mutation::MarkFed { indices } => {
                for index in indices {
                    match schema.try_attribute(index)?.kind() {
                        AttributeKind::Recurrent(_) => {}
                        _ => {
                            return Err(Error::other(format!(
                                "attribute {index} is not Recurrent"
                            )))
                        }
                    }
                    if let Some(AttributeKind::Recurrent(recurrence)) =
                        schema.attribute_mut(index).map(Attribute::kind_mut)
                    {
                        CarryForwardResolver::feed(recurrence);
                    }
                }
            }
        }

        let schema = sheet.schema().clone();
        let mut sheets = vec![sheet];
        sheets.extend(repaired);
        registry.put_sheets(sheets)?;
        Ok(Applied {
            schema,
            touched,
            deleted,
        })
    }

    /// Attribute at `index`, refusing the fixed date column
    fn editable(schema: &mut Schema, index: usize) -> Result<&mut Attribute> {
        if index == 0 {
            return Err(ValidationError::DateColumn.into());
        }
        let len = schema.len();
        schema
            .attribute_mut(index)
            .ok_or(Error::AttributeNotFound(index, len))
    }

    /// Renumber a schema's own pointers after attribute `deleted` was removed
    fn forget(schema: &mut Schema, deleted: usize) {
        for index in 0..schema.len() {
            let Some(attribute) = schema.attribute_mut(index) else {
                continue;
            };
            match attribute.kind_mut() {
                AttributeKind::Derived(formula) => formula.forget(deleted),
                AttributeKind::Recurrent(recurrence) => recurrence.forget(deleted),
                AttributeKind::Independent | AttributeKind::Referenced { .. } => {}
            }
        }
    }

    /// Null or renumber Referenced pointers into `source` after its attribute
    /// `deleted` was removed
    fn repair_references(schema: &mut Schema, source: &SheetId, deleted: usize) {
        for index in 0..schema.len() {
            let Some(attribute) = schema.attribute_mut(index) else {
                continue;
            };
            if let AttributeKind::Referenced { source: pointer } = attribute.kind_mut() {
                *pointer = match pointer.take() {
                    Some(p) if &p.sheet == source && p.index == deleted => None,
                    Some(mut p) if &p.sheet == source && p.index > deleted => {
                        p.index -= 1;
                        Some(p)
                    }
                    other => other,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> SchemaRegistry {
        let stock = Schema::from_attributes(vec![
            Attribute::independent("Date"),
            Attribute::independent("Purchase"),
            Attribute::recurrent("Opening Stock", 5),
            Attribute::independent("Inward"),
            Attribute::independent("Outward"),
            Attribute::derived("Closing Stock", [1, 2], [4]),
        ])
        .unwrap();
        let sales = Schema::from_attributes(vec![
            Attribute::independent("Date"),
            Attribute::referenced("Inward", SourceRef::new("stock", 3)),
            Attribute::referenced("Outward", SourceRef::new("stock", 4)),
            Attribute::referenced("Purchase", SourceRef::new("stock", 1)),
        ])
        .unwrap();
        SchemaRegistry::from_sheets(vec![
            Sheet::with_schema("stock", "Stock", stock),
            Sheet::with_schema("sales", "Sales", sales),
        ])
        .unwrap()
    }

    fn stock() -> SheetId {
        SheetId::from("stock")
    }

    #[test]
    fn test_delete_renumbers_formulas() {
        let mut registry = registry();
        let mut schema = registry.get(&stock()).unwrap().clone();
        schema
            .attribute_mut(5)
            .unwrap()
            .set_kind(AttributeKind::Derived(Formula::new([1, 3], [])));
        registry.put(&stock(), schema).unwrap();

        let applied = SchemaMutator::apply(
            &mut registry,
            &stock(),
            Mutation::DeleteColumn { index: 2 },
            true,
        )
        .unwrap();

        assert_eq!(applied.deleted, Some(2));
        assert_eq!(
            applied.schema.attribute(4).unwrap().formula(),
            Some(&Formula::new([1, 2], []))
        );
    }

    #[test]
    fn test_delete_nulls_recurrent_pointer() {
        let mut registry = registry();
        let applied = SchemaMutator::apply(
            &mut registry,
            &stock(),
            Mutation::DeleteColumn { index: 5 },
            true,
        )
        .unwrap();
        assert_eq!(
            applied.schema.attribute(2).unwrap().recurrence().unwrap().reference_index,
            None
        );
    }

    #[test]
    fn test_delete_repairs_other_sheets() {
        let mut registry = registry();
        let applied = SchemaMutator::apply(
            &mut registry,
            &stock(),
            Mutation::DeleteColumn { index: 3 },
            true,
        )
        .unwrap();
        assert_eq!(applied.touched, vec![stock(), SheetId::from("sales")]);

        let sales = registry.get(&"sales".into()).unwrap();
        assert_eq!(sales.attribute(1).unwrap().source(), None);
        assert_eq!(
            sales.attribute(2).unwrap().source(),
            Some(&SourceRef::new("stock", 3))
        );
        assert_eq!(
            sales.attribute(3).unwrap().source(),
            Some(&SourceRef::new("stock", 1))
        );
    }

    #[test]
    fn test_date_column_is_fixed() {
        let mut registry = registry();
        for mutation in [
            Mutation::DeleteColumn { index: 0 },
            Mutation::RenameColumn {
                index: 0,
                name: "Day".into(),
            },
        ] {
            assert_eq!(
                SchemaMutator::apply(&mut registry, &stock(), mutation, true),
                Err(Error::Validation(ValidationError::DateColumn))
            );
        }
    }

    #[test]
    fn test_failed_mutation_leaves_schema_unchanged() {
        let mut registry = registry();
        let before = registry.get(&stock()).unwrap().clone();

        let cycle = SchemaMutator::apply(
            &mut registry,
            &stock(),
            Mutation::UpdateFormula {
                index: 1,
                formula: Formula::new([5], []),
            },
            true,
        );
        assert!(matches!(
            cycle,
            Err(Error::Validation(ValidationError::CircularFormula(_)))
        ));

        let duplicate = SchemaMutator::apply(
            &mut registry,
            &stock(),
            Mutation::RenameColumn {
                index: 3,
                name: "OUTWARD".into(),
            },
            true,
        );
        assert!(matches!(
            duplicate,
            Err(Error::Validation(ValidationError::DuplicateName(_)))
        ));

        // Source of a Referenced column must stay Independent.
        let referenced = SchemaMutator::apply(
            &mut registry,
            &stock(),
            Mutation::UpdateFormula {
                index: 3,
                formula: Formula::new([1], []),
            },
            true,
        );
        assert!(referenced.is_err());

        assert_eq!(registry.get(&stock()).unwrap(), &before);
    }

    #[test]
    fn test_new_recurrent_fed_state() {
        let mut registry = registry();
        let applied = SchemaMutator::apply(
            &mut registry,
            &stock(),
            Mutation::AddColumn(Attribute::recurrent("Balance", 5)),
            true,
        )
        .unwrap();
        assert!(applied.schema.attribute(6).unwrap().recurrence().unwrap().fed);

        let applied = SchemaMutator::apply(
            &mut registry,
            &stock(),
            Mutation::AddColumn(Attribute::recurrent("Other", 5)),
            false,
        )
        .unwrap();
        assert!(!applied.schema.attribute(7).unwrap().recurrence().unwrap().fed);

        let applied = SchemaMutator::apply(
            &mut registry,
            &stock(),
            Mutation::MarkFed { indices: vec![7] },
            false,
        )
        .unwrap();
        assert!(applied.schema.attribute(7).unwrap().recurrence().unwrap().fed);
    }

    #[test]
    fn test_reference_to_own_sheet_rejected() {
        let mut registry = registry();
        let result = SchemaMutator::apply(
            &mut registry,
            &stock(),
            Mutation::AddColumn(Attribute::referenced("Loop", SourceRef::new("stock", 1))),
            true,
        );
        assert_eq!(
            result,
            Err(Error::Validation(ValidationError::SelfSheetReference(6)))
        );
    }

    #[test]
    fn test_subrows_on_derived_rejected() {
        let mut registry = registry();
        let result = SchemaMutator::apply(
            &mut registry,
            &stock(),
            Mutation::UpdateSubrows {
                index: 5,
                config: Some(SubrowConfig::stock_items()),
            },
            true,
        );
        assert_eq!(
            result,
            Err(Error::Validation(ValidationError::SubrowsNotAllowed(5)))
        );
    }
}
