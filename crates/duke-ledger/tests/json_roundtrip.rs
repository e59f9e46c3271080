//! Saving and reopening ledger files

use chrono::NaiveDate;
use duke_ledger::prelude::*;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn item(category: &str, value: f64) -> SubrowRecord {
    SubrowRecord::new(vec![
        CellValue::Empty,
        CellValue::text(category),
        CellValue::Empty,
        CellValue::Number(value),
    ])
}

#[test]
fn test_save_and_open() {
    let schema = Schema::from_attributes(vec![
        Attribute::independent("Date"),
        Attribute::independent("Purchase").with_subrows(SubrowConfig::stock_items()),
        Attribute::recurrent("Opening", 4),
        Attribute::independent("Sold"),
        Attribute::derived("Closing", [1, 2], [3]),
    ])
    .unwrap();
    let mut ledger = Ledger::new();
    ledger
        .add_sheet(Sheet::with_schema("stock", "Stock", schema))
        .unwrap();
    let id = SheetId::from("stock");

    let d1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let d2 = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
    ledger
        .insert_row_on(
            &id,
            d1,
            RowInput::new()
                .subrows(1, vec![item("bolts", 30.0), item("nuts", 12.5)])
                .value(2, 10.0),
        )
        .unwrap();
    ledger
        .insert_row_on(&id, d2, RowInput::new().value(3, 4.0).adjustment(2, 1.5))
        .unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.json");
    ledger.save(&path).unwrap();
    let reopened = Ledger::open(&path).unwrap();

    assert_eq!(reopened.to_parts(), ledger.to_parts());

    let row = reopened.row_store(&id).unwrap().try_get(d1).unwrap();
    assert_eq!(row.cell(1), &CellValue::Number(42.5));
    let records = row.subrows(1).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].get(0), Some(&CellValue::Number(2.0)));

    let schema = reopened.fetch_schema(&id).unwrap();
    assert!(schema.attribute(2).unwrap().recurrence().unwrap().fed);

    let view = reopened.view(&id, Period::of(d1)).unwrap();
    assert_eq!(view.rows[0].number(4), 52.5);
    assert_eq!(view.rows[1].number(2), 54.0);
    assert_eq!(view.rows[1].number(4), 50.0);
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let err = Ledger::new().save(dir.path().join("ledger.xlsx")).unwrap_err();
    assert!(err.to_string().contains("Unsupported file format"));
    assert!(Ledger::open(dir.path().join("missing.json")).is_err());
}
