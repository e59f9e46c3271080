//! JSON ledger documents
//!
//! A document stores sheets with their schemas and raw rows. Resolved
//! values of computed cells are stored as well but are only a cache:
//! loading re-validates every sheet and evaluation never reads them.

use std::io::{Read, Write};

use duke_ledger_core::{Error, Result, Row, Sheet};
use serde::{Deserialize, Serialize};

use crate::ledger::Ledger;

/// Current document format version
pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct LedgerDocument {
    version: u32,
    sheets: Vec<SheetDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SheetDocument {
    sheet: Sheet,
    #[serde(default)]
    rows: Vec<Row>,
}

/// Reads and writes ledgers as JSON
pub struct JsonDocument;

impl JsonDocument {
    /// Read a ledger from JSON
    pub fn read<R: Read>(reader: R) -> Result<Ledger> {
        let document: LedgerDocument = serde_json::from_reader(reader)
            .map_err(|e| Error::other(format!("invalid ledger document: {e}")))?;
        if document.version > DOCUMENT_VERSION {
            return Err(Error::other(format!(
                "unsupported document version {}",
                document.version
            )));
        }
        let parts = document
            .sheets
            .into_iter()
            .map(|s| (s.sheet, s.rows))
            .collect();
        let ledger = Ledger::from_parts(parts)?;
        tracing::debug!(sheets = ledger.registry().len(), "ledger document read");
        Ok(ledger)
    }

    /// Write a ledger as pretty-printed JSON
    pub fn write<W: Write>(ledger: &Ledger, writer: W) -> Result<()> {
        let document = LedgerDocument {
            version: DOCUMENT_VERSION,
            sheets: ledger
                .to_parts()
                .into_iter()
                .map(|(sheet, rows)| SheetDocument { sheet, rows })
                .collect(),
        };
        serde_json::to_writer_pretty(writer, &document).map_err(|e| Error::other(e.to_string()))
    }

    pub fn from_str(json: &str) -> Result<Ledger> {
        Self::read(json.as_bytes())
    }

    pub fn to_string(ledger: &Ledger) -> Result<String> {
        let mut buf = Vec::new();
        Self::write(ledger, &mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::other(e.to_string()))
    }
}
