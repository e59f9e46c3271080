//! Period evaluator
//!
//! Resolves every cell of a period's rows through the pipeline
//! Referenced → subrow-aggregated → Recurrent → Derived. Values are always
//! recomputed from raw inputs; values cached in computed cells are ignored.

use chrono::NaiveDate;
use duke_ledger_core::{AttributeKind, CellValue, Formula, Period, Row, Schema};

use crate::aggregate::raw_value;
use crate::carry_forward::{AnchorPolicy, CarryForwardResolver};
use crate::dependency::DependencyGraph;
use crate::error::{FormulaError, FormulaResult};
use crate::reference::{ReferenceResolver, ReferenceSource};

/// Default limit on nested Derived evaluation
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Options for evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// Which earlier row anchors a period
    pub anchor_policy: AnchorPolicy,
    /// Maximum nesting of Derived attributes within a row
    pub max_depth: usize,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            anchor_policy: AnchorPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// A row with every attribute resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRow {
    pub date: NaiveDate,
    /// One value per schema attribute
    pub values: Vec<CellValue>,
}

impl ResolvedRow {
    /// Resolved value of an attribute; out of range reads as empty
    pub fn value(&self, index: usize) -> &CellValue {
        const EMPTY: &CellValue = &CellValue::Empty;
        self.values.get(index).unwrap_or(EMPTY)
    }

    /// Resolved value as a number, zero when missing or non-numeric
    pub fn number(&self, index: usize) -> f64 {
        self.value(index).number_or_zero()
    }
}

/// How a Recurrent cell's displayed value came about
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBreakdown {
    /// Value carried from the previous row or the anchor
    pub carried: f64,
    /// Adjustment stored on the row (zero when none)
    pub adjustment: f64,
    /// The row holds the column's manual seed
    pub seeded: bool,
    /// Value shown in the cell
    pub displayed: f64,
}

/// Linear formula evaluation
pub struct FormulaEvaluator;

impl FormulaEvaluator {
    /// Sum of the added terms minus the sum of the subtracted terms
    pub fn combine<F>(formula: &Formula, mut value: F) -> FormulaResult<f64>
    where
        F: FnMut(usize) -> FormulaResult<f64>,
    {
        let mut total = 0.0;
        for term in formula.terms() {
            total += term.sign.apply(value(term.index)?);
        }
        Ok(total)
    }

    /// Value of attribute `index` computed from an already resolved row
    ///
    /// Derived attributes are recomputed from their inputs; every other
    /// kind reads the row.
    pub fn evaluate(schema: &Schema, row: &ResolvedRow, index: usize) -> f64 {
        match schema.attribute(index).and_then(|a| a.formula()) {
            Some(formula) => formula
                .terms()
                .map(|term| term.sign.apply(row.number(term.index)))
                .sum(),
            None => row.number(index),
        }
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Pending,
    InProgress,
    Done(CellValue),
}

/// Evaluates the rows of one period of one sheet
///
/// Rows must be given in display order (creation order). The anchor is the
/// fully resolved last row before the period, if any.
pub struct PeriodEvaluator<'a, S: ReferenceSource + ?Sized> {
    schema: &'a Schema,
    period: Period,
    rows: Vec<&'a Row>,
    anchor: Option<&'a ResolvedRow>,
    references: ReferenceResolver<'a, S>,
    order: Vec<usize>,
    max_depth: usize,
    slots: Vec<Vec<Slot>>,
    stack: Vec<usize>,
}

impl<'a, S: ReferenceSource + ?Sized> PeriodEvaluator<'a, S> {
    /// Prepare evaluation; fails if the schema's formulas form a cycle
    pub fn new<I>(
        schema: &'a Schema,
        period: Period,
        rows: I,
        anchor: Option<&'a ResolvedRow>,
        references: &'a S,
        options: &EvaluationOptions,
    ) -> FormulaResult<Self>
    where
        I: IntoIterator<Item = &'a Row>,
    {
        let order = DependencyGraph::from_schema(schema).evaluation_order()?;
        let rows: Vec<&'a Row> = rows.into_iter().collect();
        let slots = vec![vec![Slot::Pending; schema.len()]; rows.len()];
        Ok(Self {
            schema,
            period,
            rows,
            anchor,
            references: ReferenceResolver::new(references),
            order,
            max_depth: options.max_depth,
            slots,
            stack: Vec::new(),
        })
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Resolve every row of the period
    pub fn evaluate(&mut self) -> FormulaResult<Vec<ResolvedRow>> {
        tracing::debug!(
            period = %self.period,
            rows = self.rows.len(),
            attributes = self.schema.len(),
            "evaluating period"
        );
        (0..self.rows.len()).map(|r| self.resolve_row(r)).collect()
    }

    /// Resolved value of one cell
    pub fn value(&mut self, row: usize, attribute: usize) -> FormulaResult<CellValue> {
        self.check_bounds(row, attribute)?;
        // Earlier rows first, so carry-forward never recurses deeply.
        for earlier in 0..row {
            self.resolve_row(earlier)?;
        }
        self.resolve(row, attribute)
    }

    /// Breakdown of a Recurrent cell; `None` for other kinds
    pub fn breakdown(&mut self, row: usize, attribute: usize) -> FormulaResult<Option<CellBreakdown>> {
        self.check_bounds(row, attribute)?;
        let schema = self.schema;
        let Some(recurrence) = schema.attribute(attribute).and_then(|a| a.recurrence()) else {
            return Ok(None);
        };
        let displayed = self.value(row, attribute)?.number_or_zero();
        let anchor = self.anchor;
        let carried = CarryForwardResolver::resolve(recurrence, row, anchor, |r, a| {
            self.resolve(r, a).map(|v| v.number_or_zero())
        })?;
        let source = self.rows[row];
        Ok(Some(CellBreakdown {
            carried,
            adjustment: source.adjustment(attribute).unwrap_or(0.0),
            seeded: source.is_seeded(attribute),
            displayed,
        }))
    }

    fn check_bounds(&self, row: usize, attribute: usize) -> FormulaResult<()> {
        if row >= self.rows.len() {
            return Err(FormulaError::RowOutOfBounds {
                index: row,
                len: self.rows.len(),
            });
        }
        if attribute >= self.schema.len() {
            return Err(FormulaError::InvalidReference {
                index: attribute,
                len: self.schema.len(),
            });
        }
        Ok(())
    }

    fn resolve_row(&mut self, row: usize) -> FormulaResult<ResolvedRow> {
        for i in 0..self.order.len() {
            let attribute = self.order[i];
            self.resolve(row, attribute)?;
        }
        let values = (0..self.schema.len())
            .map(|a| match &self.slots[row][a] {
                Slot::Done(value) => value.clone(),
                _ => CellValue::Empty,
            })
            .collect();
        Ok(ResolvedRow {
            date: self.rows[row].date(),
            values,
        })
    }

    fn resolve(&mut self, row: usize, attribute: usize) -> FormulaResult<CellValue> {
        self.check_bounds(row, attribute)?;
        match &self.slots[row][attribute] {
            Slot::Done(value) => return Ok(value.clone()),
            Slot::InProgress => {
                let start = self
                    .stack
                    .iter()
                    .position(|&a| a == attribute)
                    .unwrap_or(0);
                return Err(FormulaError::CircularReference(self.stack[start..].to_vec()));
            }
            Slot::Pending => {}
        }
        if self.stack.len() >= self.max_depth {
            return Err(FormulaError::DepthExceeded {
                attribute,
                limit: self.max_depth,
            });
        }

        self.slots[row][attribute] = Slot::InProgress;
        self.stack.push(attribute);
        let result = self.compute(row, attribute);
        self.stack.pop();

        match result {
            Ok(value) => {
                self.slots[row][attribute] = Slot::Done(value.clone());
                Ok(value)
            }
            Err(err) => {
                self.slots[row][attribute] = Slot::Pending;
                Err(err)
            }
        }
    }

    fn compute(&mut self, row: usize, index: usize) -> FormulaResult<CellValue> {
        let schema = self.schema;
        let source = self.rows[row];
        let attribute = schema.try_attribute(index).map_err(|_| FormulaError::InvalidReference {
            index,
            len: schema.len(),
        })?;

        match attribute.kind() {
            AttributeKind::Independent => Ok(raw_value(attribute, source, index)),
            AttributeKind::Referenced { source: pointer } => {
                Ok(self.references.resolve(pointer.as_ref(), self.period, row))
            }
            AttributeKind::Recurrent(recurrence) => {
                if source.is_seeded(index) {
                    return Ok(raw_value(attribute, source, index));
                }
                let anchor = self.anchor;
                let carried = CarryForwardResolver::resolve(recurrence, row, anchor, |r, a| {
                    self.resolve(r, a).map(|v| v.number_or_zero())
                })?;
                let adjustment = source.adjustment(index).unwrap_or(0.0);
                Ok(CellValue::Number(carried + adjustment))
            }
            AttributeKind::Derived(formula) => {
                let total = FormulaEvaluator::combine(formula, |term| {
                    self.resolve(row, term).map(|v| v.number_or_zero())
                })?;
                Ok(CellValue::Number(total))
            }
        }
    }
}
