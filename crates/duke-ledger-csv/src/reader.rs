//! CSV reader

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;

use crate::error::{CsvError, CsvResult};
use crate::options::CsvReadOptions;
use duke_ledger_core::{AttributeKind, CellValue, Schema};

/// Values of one imported CSV record, keyed by attribute index
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedRow {
    pub date: NaiveDate,
    pub values: BTreeMap<usize, CellValue>,
}

/// CSV file reader
pub struct CsvReader;

impl CsvReader {
    /// Read a CSV file against a sheet schema
    pub fn read_file<P: AsRef<Path>>(
        path: P,
        schema: &Schema,
        options: &CsvReadOptions,
    ) -> CsvResult<Vec<ImportedRow>> {
        let file = File::open(path)?;
        Self::read(file, schema, options)
    }

    /// Read CSV records against a sheet schema
    ///
    /// Columns are matched to attributes by header name (or by position
    /// without a header). The date column keys each record. Only
    /// Independent attributes are imported; computed columns, such as those
    /// of an exported period, are skipped. Blank fields are left out.
    pub fn read<R: Read>(
        reader: R,
        schema: &Schema,
        options: &CsvReadOptions,
    ) -> CsvResult<Vec<ImportedRow>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .has_headers(options.has_header)
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<usize> = if options.has_header {
            csv_reader
                .headers()?
                .iter()
                .map(|name| schema.resolve_column(name))
                .collect::<duke_ledger_core::Result<_>>()?
        } else {
            (0..schema.len()).collect()
        };

        let date_field = columns
            .iter()
            .position(|&index| index == 0)
            .ok_or_else(|| CsvError::Parse {
                row: 0,
                column: 0,
                message: "no date column".to_string(),
            })?;

        let mut rows = Vec::new();
        for (row_idx, result) in csv_reader.records().enumerate() {
            let record = result?;
            // 1-based, counting the header line
            let line = row_idx + 1 + usize::from(options.has_header);

            let raw_date = record.get(date_field).unwrap_or("").trim();
            let date = NaiveDate::parse_from_str(raw_date, &options.date_format).map_err(|e| {
                CsvError::Parse {
                    row: line,
                    column: date_field + 1,
                    message: format!("invalid date '{raw_date}': {e}"),
                }
            })?;

            let mut values = BTreeMap::new();
            for (field, &index) in record.iter().zip(&columns) {
                if index == 0 {
                    continue;
                }
                let writable = schema
                    .attribute(index)
                    .map_or(false, |a| matches!(a.kind(), AttributeKind::Independent));
                if !writable {
                    continue;
                }
                let value = CellValue::parse_input(field);
                if !value.is_empty() {
                    values.insert(index, value);
                }
            }
            rows.push(ImportedRow { date, values });
        }

        tracing::debug!(rows = rows.len(), "read CSV");
        Ok(rows)
    }
}
