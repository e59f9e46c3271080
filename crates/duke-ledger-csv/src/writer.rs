//! CSV writer

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::CsvResult;
use crate::options::{CsvWriteOptions, LineTerminator};
use duke_ledger_core::Schema;
use duke_ledger_formula::ResolvedRow;

/// CSV file writer
pub struct CsvWriter;

impl CsvWriter {
    /// Write resolved rows to a CSV file
    pub fn write_file<P: AsRef<Path>>(
        schema: &Schema,
        rows: &[ResolvedRow],
        path: P,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let file = File::create(path)?;
        Self::write(schema, rows, file, options)
    }

    /// Write resolved rows to a writer
    ///
    /// One record per row with every attribute's displayed value; the date
    /// column is formatted with `options.date_format`.
    pub fn write<W: Write>(
        schema: &Schema,
        rows: &[ResolvedRow],
        writer: W,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let terminator = match options.line_terminator {
            LineTerminator::LF => csv::Terminator::Any(b'\n'),
            LineTerminator::CRLF => csv::Terminator::CRLF,
            LineTerminator::CR => csv::Terminator::Any(b'\r'),
        };

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .terminator(terminator)
            .from_writer(writer);

        if options.write_header {
            csv_writer.write_record(schema.names())?;
        }

        for row in rows {
            let mut record = Vec::with_capacity(schema.len());
            record.push(row.date.format(&options.date_format).to_string());
            for index in 1..schema.len() {
                record.push(row.value(index).to_string());
            }
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        tracing::debug!(rows = rows.len(), "wrote CSV");
        Ok(())
    }

    /// Write resolved rows to a string
    pub fn write_string(
        schema: &Schema,
        rows: &[ResolvedRow],
        options: &CsvWriteOptions,
    ) -> CsvResult<String> {
        let mut buffer = Vec::new();
        Self::write(schema, rows, &mut buffer, options)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use duke_ledger_core::{Attribute, CellValue};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_view() {
        let schema = Schema::from_attributes(vec![
            Attribute::independent("Date"),
            Attribute::independent("Item, name"),
            Attribute::derived("Total", [], []),
        ])
        .unwrap();
        let rows = vec![ResolvedRow {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            values: vec![
                CellValue::text("2024-03-01"),
                CellValue::text("bolts"),
                CellValue::Number(2.5),
            ],
        }];
        let options = CsvWriteOptions {
            line_terminator: LineTerminator::LF,
            date_format: "%d/%m/%Y".to_string(),
            ..Default::default()
        };
        let out = CsvWriter::write_string(&schema, &rows, &options).unwrap();
        assert_eq!(out, "Date,\"Item, name\",Total\n01/03/2024,bolts,2.5\n");
    }
}
