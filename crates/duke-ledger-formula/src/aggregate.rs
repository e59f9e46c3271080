//! Subrow aggregation
//!
//! A cell backed by subrow records displays the aggregate of the records'
//! aggregate field. The aggregate is recomputed from the full record set on
//! every read; whatever is cached in the row's cell is ignored while records
//! exist.

use duke_ledger_core::{Aggregation, Attribute, CellValue, Row, SubrowConfig, SubrowRecord};

/// Reduces subrow records to a single number
pub struct SubrowAggregator;

impl SubrowAggregator {
    /// Aggregate records with the field and operation of `config`
    ///
    /// Records missing a required field are skipped. Non-numeric values in
    /// the aggregate field of a complete record count as zero.
    pub fn aggregate(records: &[SubrowRecord], config: &SubrowConfig) -> f64 {
        let values = records
            .iter()
            .filter(|record| config.is_complete(record))
            .map(|record| {
                record
                    .get(config.aggregate_field)
                    .map_or(0.0, CellValue::number_or_zero)
            });
        Self::reduce(values, config.aggregation)
    }

    /// Aggregate field `field` of every record with `op`
    pub fn aggregate_with(records: &[SubrowRecord], field: usize, op: Aggregation) -> f64 {
        let values = records
            .iter()
            .map(|record| record.get(field).map_or(0.0, CellValue::number_or_zero));
        Self::reduce(values, op)
    }

    fn reduce<I: Iterator<Item = f64>>(values: I, op: Aggregation) -> f64 {
        let mut count = 0usize;
        let mut acc: Option<f64> = None;
        for value in values {
            count += 1;
            acc = Some(match (acc, op) {
                (None, _) => value,
                (Some(a), Aggregation::Sum | Aggregation::Average) => a + value,
                (Some(a), Aggregation::Max) => a.max(value),
                (Some(a), Aggregation::Min) => a.min(value),
            });
        }
        match (acc, op) {
            (None, _) => 0.0,
            (Some(total), Aggregation::Average) => total / count as f64,
            (Some(value), _) => value,
        }
    }
}

/// Raw value of a writable cell: the subrow aggregate when the attribute
/// has a subrow configuration and the row holds records for it, otherwise
/// the stored cell
pub fn raw_value(attribute: &Attribute, row: &Row, index: usize) -> CellValue {
    match (attribute.subrows(), row.subrows(index)) {
        (Some(config), Some(records)) if !records.is_empty() => {
            CellValue::Number(SubrowAggregator::aggregate(records, config))
        }
        _ => row.cell(index).clone(),
    }
}
