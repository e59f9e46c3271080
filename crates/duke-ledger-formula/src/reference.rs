//! Cross-sheet references
//!
//! A Referenced attribute shows the raw value of an Independent attribute of
//! another sheet, at the same row index of the same period. References are
//! one hop: the source is raw data, never another computed column.

use duke_ledger_core::{AttributeKind, CellValue, Period, Row, Schema, SourceRef};

use crate::aggregate::raw_value;

/// Lookup of raw values in other sheets
pub trait ReferenceSource {
    /// Raw value of `source` at `row_index` of `period`, or `None` when the
    /// sheet, row or attribute does not exist
    fn lookup(&self, source: &SourceRef, period: Period, row_index: usize) -> Option<CellValue>;
}

/// A reference source with no other sheets; every lookup misses
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReferences;

impl ReferenceSource for NoReferences {
    fn lookup(&self, _: &SourceRef, _: Period, _: usize) -> Option<CellValue> {
        None
    }
}

impl<F> ReferenceSource for F
where
    F: Fn(&SourceRef, Period, usize) -> Option<CellValue>,
{
    fn lookup(&self, source: &SourceRef, period: Period, row_index: usize) -> Option<CellValue> {
        self(source, period, row_index)
    }
}

/// Resolves Referenced attributes against a [`ReferenceSource`]
pub struct ReferenceResolver<'a, S: ReferenceSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: ReferenceSource + ?Sized> ReferenceResolver<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Value of a Referenced attribute; dangling or missing sources read as
    /// empty
    pub fn resolve(
        &self,
        source: Option<&SourceRef>,
        period: Period,
        row_index: usize,
    ) -> CellValue {
        let Some(source) = source else {
            return CellValue::Empty;
        };
        match self.source.lookup(source, period, row_index) {
            Some(value) => value,
            None => {
                tracing::trace!(
                    sheet = %source.sheet,
                    index = source.index,
                    %period,
                    row_index,
                    "reference source missing, reading as empty"
                );
                CellValue::Empty
            }
        }
    }
}

/// Raw value of attribute `index` at `row_index` among a source sheet's rows
/// of one period (rows in display order)
///
/// Misses when the row or attribute does not exist, or when the attribute
/// is not Independent.
pub fn source_value(schema: &Schema, rows: &[&Row], index: usize, row_index: usize) -> Option<CellValue> {
    let attribute = schema.attribute(index)?;
    if !matches!(attribute.kind(), AttributeKind::Independent) {
        return None;
    }
    let row = rows.get(row_index)?;
    Some(raw_value(attribute, row, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use duke_ledger_core::{Attribute, SubrowConfig, SubrowRecord};

    fn row(day: u32, price: f64) -> Row {
        let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        let mut row = Row::new(date, Utc.with_ymd_and_hms(2024, 3, day, 8, 0, 0).unwrap());
        row.set_cell(1, CellValue::Number(price));
        row
    }

    fn prices() -> Schema {
        Schema::from_attributes(vec![
            Attribute::independent("Date"),
            Attribute::independent("Price").with_subrows(SubrowConfig::stock_items()),
            Attribute::derived("Double", [1, 1], []),
        ])
        .unwrap()
    }

    #[test]
    fn test_source_value() {
        let schema = prices();
        let mut second = row(2, 0.0);
        second.set_subrows(
            1,
            vec![SubrowRecord::new(vec![
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Number(8.0),
            ])],
        );
        let first = row(1, 5.0);
        let rows = vec![&first, &second];

        assert_eq!(source_value(&schema, &rows, 1, 0), Some(CellValue::Number(5.0)));
        assert_eq!(source_value(&schema, &rows, 1, 1), Some(CellValue::Number(8.0)));
        assert_eq!(source_value(&schema, &rows, 1, 2), None);
        assert_eq!(source_value(&schema, &rows, 2, 0), None);
        assert_eq!(source_value(&schema, &rows, 9, 0), None);
    }

    #[test]
    fn test_resolver_reads_missing_as_empty() {
        let period = Period::new(2024, 3).unwrap();
        let resolver = ReferenceResolver::new(&NoReferences);
        let source = SourceRef::new("prices", 1);
        assert_eq!(resolver.resolve(Some(&source), period, 0), CellValue::Empty);
        assert_eq!(resolver.resolve(None, period, 0), CellValue::Empty);
    }

    #[test]
    fn test_closure_source() {
        let period = Period::new(2024, 3).unwrap();
        let lookup = |source: &SourceRef, _: Period, row_index: usize| {
            (source.sheet.as_str() == "prices").then(|| CellValue::Number(row_index as f64 + 1.0))
        };
        let resolver = ReferenceResolver::new(&lookup);
        assert_eq!(
            resolver.resolve(Some(&SourceRef::new("prices", 1)), period, 2),
            CellValue::Number(3.0)
        );
        assert_eq!(
            resolver.resolve(Some(&SourceRef::new("other", 1)), period, 2),
            CellValue::Empty
        );
    }
}
