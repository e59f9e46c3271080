//! Dependency tracking between the attributes of a sheet
//!
//! Only same-row dependencies are edges here: a Derived attribute depends
//! on the attributes its formula adds or subtracts. Recurrent attributes read
//! the *previous* row and Referenced attributes read another sheet, so
//! neither can close a loop within a row.

use ahash::{AHashMap, AHashSet};
use duke_ledger_core::{AttributeKind, FormulaTerm, Schema, ValidationError};

use crate::error::{FormulaError, FormulaResult};

/// Dependency graph for the attributes of one schema
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Attribute → attributes that depend on it (dependents)
    dependents: AHashMap<usize, AHashSet<usize>>,
    /// Attribute → attributes it depends on (precedents)
    precedents: AHashMap<usize, AHashSet<usize>>,
    /// Number of attributes in the schema the graph was built from
    len: usize,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of a schema's Derived formulas
    pub fn from_schema(schema: &Schema) -> Self {
        let mut graph = Self {
            len: schema.len(),
            ..Self::default()
        };
        for (index, attribute) in schema.iter() {
            if let AttributeKind::Derived(formula) = attribute.kind() {
                for precedent in formula.indices() {
                    graph.add_dependency(precedent, index);
                }
            }
        }
        graph
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: usize, dependent: usize) {
        self.dependents
            .entry(precedent)
            .or_default()
            .insert(dependent);
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
        self.len = self.len.max(precedent + 1).max(dependent + 1);
    }

    /// Attributes that depend on the given attribute, sorted
    pub fn get_dependents(&self, attribute: usize) -> Vec<usize> {
        sorted(self.dependents.get(&attribute))
    }

    /// Attributes the given attribute depends on, sorted
    pub fn get_precedents(&self, attribute: usize) -> Vec<usize> {
        sorted(self.precedents.get(&attribute))
    }

    /// Find any cycle in the graph; returns the attributes along it
    pub fn find_cycle(&self) -> Option<Vec<usize>> {
        let mut visited = AHashSet::new();
        let mut starts: Vec<usize> = self.precedents.keys().copied().collect();
        starts.sort_unstable();
        for start in starts {
            let mut stack = Vec::new();
            if let Some(cycle) = self.detect_cycle(start, &mut visited, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    fn detect_cycle(
        &self,
        attribute: usize,
        visited: &mut AHashSet<usize>,
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        if let Some(pos) = stack.iter().position(|&a| a == attribute) {
            return Some(stack[pos..].to_vec());
        }
        if visited.contains(&attribute) {
            return None;
        }

        visited.insert(attribute);
        stack.push(attribute);

        for precedent in self.get_precedents(attribute) {
            if let Some(cycle) = self.detect_cycle(precedent, visited, stack) {
                return Some(cycle);
            }
        }

        stack.pop();
        None
    }

    /// Order in which a row's attributes can be resolved: every attribute
    /// comes after the attributes its formula reads. Ties keep schema order.
    pub fn evaluation_order(&self) -> FormulaResult<Vec<usize>> {
        let mut remaining: Vec<usize> = (0..self.len)
            .map(|a| self.precedents.get(&a).map_or(0, |p| p.len()))
            .collect();
        let mut ready: std::collections::BTreeSet<usize> =
            (0..self.len).filter(|&a| remaining[a] == 0).collect();
        let mut order = Vec::with_capacity(self.len);

        while let Some(next) = ready.pop_first() {
            order.push(next);
            for dependent in self.get_dependents(next) {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < self.len {
            return Err(FormulaError::CircularReference(
                self.find_cycle().unwrap_or_default(),
            ));
        }
        Ok(order)
    }
}

fn sorted(set: Option<&AHashSet<usize>>) -> Vec<usize> {
    let mut items: Vec<usize> = set.into_iter().flat_map(|s| s.iter().copied()).collect();
    items.sort_unstable();
    items
}

/// Validate a schema's structure and reject formula cycles
pub fn validate_schema(schema: &Schema) -> duke_ledger_core::Result<()> {
    schema.validate()?;
    if let Some(cycle) = DependencyGraph::from_schema(schema).find_cycle() {
        return Err(ValidationError::CircularFormula(cycle).into());
    }
    Ok(())
}

/// What to highlight when a user points at an attribute
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DependencyHighlight {
    /// Signed inputs of the attribute's formula (empty unless Derived)
    pub terms: Vec<FormulaTerm>,
    /// Derived attributes reading this attribute directly
    pub dependents: Vec<usize>,
    /// Recurrent attributes carrying this attribute forward
    pub carried_by: Vec<usize>,
}

/// Signed terms of a Derived attribute; empty for other kinds
pub fn formula_terms(schema: &Schema, index: usize) -> Vec<FormulaTerm> {
    schema
        .attribute(index)
        .and_then(|a| a.formula())
        .map(|f| f.terms().collect())
        .unwrap_or_default()
}

/// Derived attributes whose formula reads attribute `index`
pub fn dependents(schema: &Schema, index: usize) -> Vec<usize> {
    DependencyGraph::from_schema(schema).get_dependents(index)
}

/// Compute the highlight view-state for an attribute
pub fn highlight(schema: &Schema, index: usize) -> DependencyHighlight {
    let terms = formula_terms(schema, index);
    let dependents = dependents(schema, index);
    let carried_by = schema
        .iter()
        .filter(|(_, a)| {
            a.recurrence()
                .map_or(false, |r| r.reference_index == Some(index))
        })
        .map(|(i, _)| i)
        .collect();
    DependencyHighlight {
        terms,
        dependents,
        carried_by,
    }
}
