//! Duke Ledger CLI - ledger file tool

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{ArgAction, Parser, Subcommand};
use duke_ledger::prelude::*;
use duke_ledger::{CsvReadOptions, CsvWriteOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "duke-ledger")]
#[command(author, version, about = "Dated ledgers with computed columns")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Ledger file (JSON)
    #[arg(env = "DUKE_LEDGER_FILE")]
    file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty ledger file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List sheets
    Sheets,

    /// Add a sheet with only the date column
    AddSheet {
        /// Sheet id
        sheet: String,
        /// Display name (default: the id)
        name: Option<String>,
    },

    /// Remove a sheet no other sheet references
    RemoveSheet { sheet: String },

    /// Show the columns of a sheet
    Schema { sheet: String },

    /// Append a column; Independent unless a formula, reference or carry is given
    AddColumn {
        sheet: String,
        name: String,
        /// Columns added by the formula (names or indices)
        #[arg(long, value_delimiter = ',')]
        plus: Vec<String>,
        /// Columns subtracted by the formula (names or indices)
        #[arg(long, value_delimiter = ',')]
        minus: Vec<String>,
        /// Source column as SHEET:COLUMN
        #[arg(long, conflicts_with_all = ["plus", "minus", "carry"])]
        reference: Option<String>,
        /// Column carried forward from the previous row
        #[arg(long, conflicts_with_all = ["plus", "minus"])]
        carry: Option<String>,
        /// Record stock items (serial, category, note, value) summed into the cell
        #[arg(long)]
        items: bool,
    },

    /// Rename a column
    RenameColumn {
        sheet: String,
        column: String,
        name: String,
    },

    /// Make a column Derived
    SetFormula {
        sheet: String,
        column: String,
        #[arg(long, value_delimiter = ',')]
        plus: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        minus: Vec<String>,
    },

    /// Make a column Referenced
    SetReference {
        sheet: String,
        column: String,
        /// Source column as SHEET:COLUMN
        source: String,
    },

    /// Make a column Recurrent
    SetRecurrence {
        sheet: String,
        column: String,
        /// Column carried forward from the previous row
        #[arg(long)]
        from: String,
    },

    /// Delete a column
    DeleteColumn { sheet: String, column: String },

    /// Insert a row (today unless --date is given)
    Insert {
        sheet: String,
        /// Values as COLUMN=VALUE
        values: Vec<String>,
        /// Backdate the row (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[command(flatten)]
        extras: RowExtras,
    },

    /// Update the row of a date
    Update {
        sheet: String,
        date: NaiveDate,
        /// Values as COLUMN=VALUE
        values: Vec<String>,
        #[command(flatten)]
        extras: RowExtras,
    },

    /// Delete the row of a date
    DeleteRow { sheet: String, date: NaiveDate },

    /// Print a resolved period (default: the latest with rows)
    Show {
        sheet: String,
        /// Period as YYYY-MM
        period: Option<Period>,
    },

    /// Export a resolved period as CSV to stdout or a file
    Export {
        sheet: String,
        /// Period as YYYY-MM
        period: Period,
        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Field delimiter (default: comma)
        #[arg(short, long, default_value = ",")]
        delimiter: char,
    },

    /// Import rows of Independent values from CSV, keyed by the date column
    Import {
        sheet: String,
        input: PathBuf,
        /// Field delimiter (default: comma)
        #[arg(short, long, default_value = ",")]
        delimiter: char,
    },
}

#[derive(clap::Args)]
struct RowExtras {
    /// Adjustment of a carried-forward column as COLUMN=AMOUNT
    #[arg(long = "adjust")]
    adjustments: Vec<String>,
    /// Subrow record as COLUMN=FIELD|FIELD|...; replaces the cell's records
    #[arg(long = "item")]
    items: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file = cli.file;
    match cli.command {
        Commands::Init { force } => init(&file, force),
        command => {
            let mut ledger = Ledger::open(&file)
                .with_context(|| format!("Failed to open '{}'", file.display()))?;
            tracing::debug!(file = %file.display(), sheets = ledger.registry().len(), "ledger opened");
            if run(&mut ledger, command)? {
                ledger
                    .save(&file)
                    .with_context(|| format!("Failed to write '{}'", file.display()))?;
            }
            Ok(())
        }
    }
}

/// Log to stderr; `RUST_LOG` wins over `-v`
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn init(file: &Path, force: bool) -> Result<()> {
    if file.exists() && !force {
        bail!("'{}' already exists (use --force to overwrite)", file.display());
    }
    Ledger::new()
        .save(file)
        .with_context(|| format!("Failed to write '{}'", file.display()))?;
    eprintln!("Created '{}'", file.display());
    Ok(())
}

/// Run a command; returns whether the ledger changed
fn run(ledger: &mut Ledger, command: Commands) -> Result<bool> {
    match command {
        Commands::Init { .. } => Ok(false),
        Commands::Sheets => {
            for sheet in ledger.sheets() {
                println!("{}\t{}\t{} columns", sheet.id(), sheet.name(), sheet.schema().len());
            }
            Ok(false)
        }
        Commands::AddSheet { sheet, name } => {
            let name = name.unwrap_or_else(|| sheet.clone());
            ledger.create_sheet(sheet.as_str(), &name)?;
            eprintln!("Added sheet '{sheet}'");
            Ok(true)
        }
        Commands::RemoveSheet { sheet } => {
            ledger.remove_sheet(&SheetId::from(sheet.as_str()))?;
            eprintln!("Removed sheet '{sheet}'");
            Ok(true)
        }
        Commands::Schema { sheet } => {
            let id = SheetId::from(sheet.as_str());
            print_schema(ledger, &id)?;
            Ok(false)
        }
        Commands::AddColumn {
            sheet,
            name,
            plus,
            minus,
            reference,
            carry,
            items,
        } => {
            let id = SheetId::from(sheet.as_str());
            let schema = ledger.fetch_schema(&id)?;
            let mut attribute = if let Some(source) = reference {
                Attribute::referenced(&name, source_ref(ledger, &source)?)
            } else if let Some(carried) = carry {
                Attribute::recurrent(&name, schema.resolve_column(&carried)?)
            } else if !plus.is_empty() || !minus.is_empty() {
                Attribute::new(&name, AttributeKind::Derived(formula(schema, &plus, &minus)?))
            } else {
                Attribute::independent(&name)
            };
            if items {
                attribute = attribute.with_subrows(SubrowConfig::stock_items());
            }
            let schema = ledger.mutate_schema(&id, Mutation::AddColumn(attribute))?;
            eprintln!("Added column {} '{}'", schema.len() - 1, name);
            Ok(true)
        }
        Commands::RenameColumn {
            sheet,
            column,
            name,
        } => {
            let id = SheetId::from(sheet.as_str());
            let index = ledger.fetch_schema(&id)?.resolve_column(&column)?;
            ledger.mutate_schema(&id, Mutation::RenameColumn { index, name })?;
            Ok(true)
        }
        Commands::SetFormula {
            sheet,
            column,
            plus,
            minus,
        } => {
            let id = SheetId::from(sheet.as_str());
            let schema = ledger.fetch_schema(&id)?;
            let index = schema.resolve_column(&column)?;
            let formula = formula(schema, &plus, &minus)?;
            ledger.mutate_schema(&id, Mutation::UpdateFormula { index, formula })?;
            Ok(true)
        }
        Commands::SetReference {
            sheet,
            column,
            source,
        } => {
            let id = SheetId::from(sheet.as_str());
            let index = ledger.fetch_schema(&id)?.resolve_column(&column)?;
            let source = source_ref(ledger, &source)?;
            ledger.mutate_schema(&id, Mutation::UpdateReference { index, source })?;
            Ok(true)
        }
        Commands::SetRecurrence {
            sheet,
            column,
            from,
        } => {
            let id = SheetId::from(sheet.as_str());
            let schema = ledger.fetch_schema(&id)?;
            let index = schema.resolve_column(&column)?;
            let reference_index = schema.resolve_column(&from)?;
            ledger.mutate_schema(
                &id,
                Mutation::UpdateRecurrence {
                    index,
                    reference_index,
                },
            )?;
            Ok(true)
        }
        Commands::DeleteColumn { sheet, column } => {
            let id = SheetId::from(sheet.as_str());
            let index = ledger.fetch_schema(&id)?.resolve_column(&column)?;
            let applied = ledger.apply_mutation(&id, Mutation::DeleteColumn { index })?;
            eprintln!(
                "Deleted column {index}; updated {} sheet(s)",
                applied.touched.len()
            );
            Ok(true)
        }
        Commands::Insert {
            sheet,
            values,
            date,
            extras,
        } => {
            let id = SheetId::from(sheet.as_str());
            let input = row_input(ledger.fetch_schema(&id)?, &values, &extras)?;
            let outcome = match date {
                Some(date) => ledger.insert_row_on(&id, date, input)?,
                None => ledger.insert_row(&id, input)?,
            };
            report_write("Inserted", &outcome);
            Ok(true)
        }
        Commands::Update {
            sheet,
            date,
            values,
            extras,
        } => {
            let id = SheetId::from(sheet.as_str());
            let input = row_input(ledger.fetch_schema(&id)?, &values, &extras)?;
            let outcome = ledger.update_row(&id, date, input)?;
            report_write("Updated", &outcome);
            Ok(true)
        }
        Commands::DeleteRow { sheet, date } => {
            ledger.delete_row(&SheetId::from(sheet.as_str()), date)?;
            eprintln!("Deleted row {date}");
            Ok(true)
        }
        Commands::Show { sheet, period } => {
            let id = SheetId::from(sheet.as_str());
            let period = match period {
                Some(period) => period,
                None => ledger
                    .periods(&id)?
                    .last()
                    .copied()
                    .unwrap_or_else(|| Period::of(Utc::now().date_naive())),
            };
            print_view(&ledger.view(&id, period)?);
            Ok(false)
        }
        Commands::Export {
            sheet,
            period,
            output,
            delimiter,
        } => {
            let id = SheetId::from(sheet.as_str());
            let view = ledger.view(&id, period)?;
            let schema = ledger.fetch_schema(&id)?;
            let options = CsvWriteOptions {
                delimiter: ascii(delimiter)?,
                ..Default::default()
            };
            match output {
                Some(path) => {
                    CsvWriter::write_file(schema, &view.rows, &path, &options)
                        .with_context(|| format!("Failed to write '{}'", path.display()))?;
                    eprintln!("Wrote {} rows to '{}'", view.rows.len(), path.display());
                }
                None => {
                    CsvWriter::write(schema, &view.rows, io::stdout().lock(), &options)
                        .context("Failed to write to stdout")?;
                }
            }
            Ok(false)
        }
        Commands::Import {
            sheet,
            input,
            delimiter,
        } => {
            let id = SheetId::from(sheet.as_str());
            let options = CsvReadOptions {
                delimiter: ascii(delimiter)?,
                ..Default::default()
            };
            let rows = CsvReader::read_file(&input, ledger.fetch_schema(&id)?, &options)
                .with_context(|| format!("Failed to read '{}'", input.display()))?;
            let summary = ledger.import_rows(&id, rows)?;
            eprintln!(
                "Imported '{}': {} inserted, {} updated",
                input.display(),
                summary.inserted,
                summary.updated
            );
            Ok(true)
        }
    }
}

fn ascii(delimiter: char) -> Result<u8> {
    if !delimiter.is_ascii() {
        bail!("Delimiter must be an ASCII character, got '{delimiter}'");
    }
    Ok(delimiter as u8)
}

/// Split `COLUMN=VALUE`
fn split_pair(pair: &str) -> Result<(&str, &str)> {
    pair.split_once('=')
        .with_context(|| format!("Expected COLUMN=VALUE, got '{pair}'"))
}

fn formula(schema: &Schema, plus: &[String], minus: &[String]) -> Result<Formula> {
    let resolve = |names: &[String]| -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| Ok(schema.resolve_column(name)?))
            .collect()
    };
    Ok(Formula::new(resolve(plus)?, resolve(minus)?))
}

/// Parse `SHEET:COLUMN` against the source sheet's schema
fn source_ref(ledger: &Ledger, source: &str) -> Result<SourceRef> {
    let (sheet, column) = source
        .split_once(':')
        .with_context(|| format!("Expected SHEET:COLUMN, got '{source}'"))?;
    let index = ledger
        .fetch_schema(&SheetId::from(sheet))?
        .resolve_column(column)?;
    Ok(SourceRef::new(sheet, index))
}

fn row_input(schema: &Schema, values: &[String], extras: &RowExtras) -> Result<RowInput> {
    let mut input = RowInput::new();
    for pair in values {
        let (column, value) = split_pair(pair)?;
        input = input.value(schema.resolve_column(column)?, CellValue::parse_input(value));
    }
    for pair in &extras.adjustments {
        let (column, value) = split_pair(pair)?;
        let amount: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("Invalid adjustment '{value}'"))?;
        input = input.adjustment(schema.resolve_column(column)?, amount);
    }
    let mut items: BTreeMap<usize, Vec<SubrowRecord>> = BTreeMap::new();
    for pair in &extras.items {
        let (column, fields) = split_pair(pair)?;
        let record = SubrowRecord::new(fields.split('|').map(CellValue::parse_input).collect());
        items
            .entry(schema.resolve_column(column)?)
            .or_default()
            .push(record);
    }
    for (index, records) in items {
        input = input.subrows(index, records);
    }
    Ok(input)
}

fn report_write(action: &str, outcome: &duke_ledger::WriteOutcome) {
    eprintln!("{action} row {}", outcome.row.date());
    if let Some(patch) = &outcome.schema_patch {
        eprintln!("Seeded carried-forward columns {:?}", patch.fed);
    }
}

fn print_schema(ledger: &Ledger, id: &SheetId) -> Result<()> {
    let schema = ledger.fetch_schema(id)?;
    let name = |index: usize| schema.attribute(index).map_or("?", |a| a.name());
    for (index, attribute) in schema.iter() {
        let detail = match attribute.kind() {
            AttributeKind::Independent => "independent".to_string(),
            AttributeKind::Derived(formula) => {
                let terms: Vec<String> = formula
                    .terms()
                    .map(|t| match t.sign {
                        duke_ledger::Sign::Plus => format!("+{}", name(t.index)),
                        duke_ledger::Sign::Minus => format!("-{}", name(t.index)),
                    })
                    .collect();
                format!("derived = {}", terms.join(" "))
            }
            AttributeKind::Referenced { source: Some(s) } => {
                let column = ledger
                    .fetch_schema(&s.sheet)
                    .ok()
                    .and_then(|other| other.attribute(s.index))
                    .map_or("?", |a| a.name());
                format!("referenced <- {}:{}", s.sheet, column)
            }
            AttributeKind::Referenced { source: None } => "referenced (unset)".to_string(),
            AttributeKind::Recurrent(r) => {
                let from = r.reference_index.map_or("(unset)", name);
                let state = if r.fed { "fed" } else { "awaiting seed" };
                format!("recurrent <- {from} ({state})")
            }
        };
        let items = if attribute.subrows().is_some() { " [items]" } else { "" };
        println!("{index}\t{}\t{detail}{items}", attribute.name());
    }
    Ok(())
}

fn print_view(view: &PeriodView) {
    if let Some(anchor) = &view.anchor {
        eprintln!("{}: carried from {}", view.period, anchor.date);
    }
    println!("{}", view.columns.join("\t"));
    for row in &view.rows {
        let mut fields = vec![row.date.to_string()];
        fields.extend(row.values.iter().skip(1).map(ToString::to_string));
        println!("{}", fields.join("\t"));
    }
    if view.rows.is_empty() {
        eprintln!("{}: no rows", view.period);
    }
}
