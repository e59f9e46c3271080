//! CSV options

/// Date format used by exported and imported date columns
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Options for reading CSV files
#[derive(Debug, Clone)]
pub struct CsvReadOptions {
    /// Field delimiter (default: comma)
    pub delimiter: u8,
    /// Quote character (default: double quote)
    pub quote: u8,
    /// Whether the first record names the columns; without a header, fields
    /// map to attributes by position
    pub has_header: bool,
    /// `chrono` format of the date column
    pub date_format: String,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            has_header: true,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// Options for writing CSV files
#[derive(Debug, Clone)]
pub struct CsvWriteOptions {
    /// Field delimiter (default: comma)
    pub delimiter: u8,
    /// Quote character (default: double quote)
    pub quote: u8,
    /// Write a header of column names
    pub write_header: bool,
    /// Line terminator
    pub line_terminator: LineTerminator,
    /// `chrono` format of the date column
    pub date_format: String,
}

impl Default for CsvWriteOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            write_header: true,
            line_terminator: LineTerminator::CRLF,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// Line terminator type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTerminator {
    /// Unix-style (LF)
    LF,
    /// Windows-style (CRLF)
    CRLF,
    /// Mac classic (CR)
    CR,
}
