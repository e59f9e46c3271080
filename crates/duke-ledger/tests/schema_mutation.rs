//! Schema mutations through the ledger

use chrono::NaiveDate;
use duke_ledger::prelude::*;
use duke_ledger::{AnchorPolicy, ErrorKind, EvaluationOptions, LedgerOptions};
use pretty_assertions::assert_eq;

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

fn cash() -> (Ledger, SheetId) {
    let mut ledger = Ledger::new();
    ledger.create_sheet("cash", "Cash").unwrap();
    let id = SheetId::from("cash");
    for name in ["In", "Out"] {
        ledger
            .mutate_schema(&id, Mutation::AddColumn(Attribute::independent(name)))
            .unwrap();
    }
    (ledger, id)
}

#[test]
fn test_create_sheet_has_date_column() {
    let mut ledger = Ledger::new();
    let sheet = ledger.create_sheet("s", "Sheet").unwrap();
    assert_eq!(sheet.schema().names().collect::<Vec<_>>(), vec!["Date"]);
    assert_eq!(
        ledger.create_sheet("s", "Other").unwrap_err().kind(),
        ErrorKind::StateConflict
    );
}

#[test]
fn test_duplicate_and_empty_names_rejected() {
    let (mut ledger, id) = cash();
    let err = ledger
        .mutate_schema(&id, Mutation::AddColumn(Attribute::independent("  in ")))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::DuplicateName(_))
    ));

    let err = ledger
        .mutate_schema(
            &id,
            Mutation::RenameColumn {
                index: 1,
                name: "   ".into(),
            },
        )
        .unwrap_err();
    assert_eq!(err, Error::Validation(ValidationError::EmptyName));
    assert_eq!(ledger.fetch_schema(&id).unwrap().len(), 3);
}

#[test]
fn test_formula_cycle_rejected() {
    let (mut ledger, id) = cash();
    ledger
        .mutate_schema(&id, Mutation::AddColumn(Attribute::derived("Net", [1], [2])))
        .unwrap();
    ledger
        .mutate_schema(&id, Mutation::AddColumn(Attribute::derived("Double", [3, 3], [])))
        .unwrap();

    let before = ledger.fetch_schema(&id).unwrap().clone();
    let err = ledger
        .mutate_schema(
            &id,
            Mutation::UpdateFormula {
                index: 3,
                formula: Formula::new([4], []),
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::CircularFormula(_))
    ));
    assert_eq!(ledger.fetch_schema(&id).unwrap(), &before);
}

#[test]
fn test_overlapping_and_self_formulas_rejected() {
    let (mut ledger, id) = cash();
    let overlap = ledger.mutate_schema(
        &id,
        Mutation::AddColumn(Attribute::derived("Net", [1, 2], [2])),
    );
    assert!(matches!(
        overlap,
        Err(Error::Validation(ValidationError::OverlappingFormula { .. }))
    ));

    let own = ledger.mutate_schema(&id, Mutation::AddColumn(Attribute::derived("Net", [3], [])));
    assert!(matches!(
        own,
        Err(Error::Validation(ValidationError::SelfReference(3)))
    ));

    let date_ref = ledger.mutate_schema(&id, Mutation::AddColumn(Attribute::derived("Net", [0], [])));
    assert!(date_ref.is_err());
}

#[test]
fn test_date_column_is_fixed() {
    let (mut ledger, id) = cash();
    for mutation in [
        Mutation::DeleteColumn { index: 0 },
        Mutation::RenameColumn {
            index: 0,
            name: "Day".into(),
        },
    ] {
        assert_eq!(
            ledger.mutate_schema(&id, mutation),
            Err(Error::Validation(ValidationError::DateColumn))
        );
    }
}

#[test]
fn test_new_recurrent_column_fed_when_rows_exist() {
    let (mut ledger, id) = cash();
    ledger
        .mutate_schema(&id, Mutation::AddColumn(Attribute::derived("Net", [1], [2])))
        .unwrap();
    ledger
        .insert_row_on(&id, date(3, 1), RowInput::new().value(1, 10.0))
        .unwrap();

    let schema = ledger
        .mutate_schema(&id, Mutation::AddColumn(Attribute::recurrent("Balance", 3)))
        .unwrap();
    assert_eq!(schema.attribute(4).unwrap().recurrence().map(|r| r.fed), Some(true));

    let err = ledger
        .insert_row_on(&id, date(3, 2), RowInput::new().value(4, 1.0))
        .unwrap_err();
    assert_eq!(err, Error::Validation(ValidationError::FedColumn(4)));
}

#[test]
fn test_delete_nulls_recurrence_and_references() {
    let (mut ledger, cash) = cash();
    ledger
        .mutate_schema(&cash, Mutation::AddColumn(Attribute::derived("Net", [1], [2])))
        .unwrap();
    ledger
        .mutate_schema(&cash, Mutation::AddColumn(Attribute::recurrent("Balance", 3)))
        .unwrap();
    ledger.create_sheet("report", "Report").unwrap();
    let report = SheetId::from("report");
    ledger
        .mutate_schema(
            &report,
            Mutation::AddColumn(Attribute::referenced("Out", SourceRef::new("cash", 2))),
        )
        .unwrap();
    ledger
        .mutate_schema(
            &report,
            Mutation::AddColumn(Attribute::referenced("In", SourceRef::new("cash", 1))),
        )
        .unwrap();

    let applied = ledger
        .apply_mutation(&cash, Mutation::DeleteColumn { index: 1 })
        .unwrap();
    assert_eq!(applied.touched, vec![cash.clone(), report.clone()]);

    let schema = ledger.fetch_schema(&cash).unwrap();
    assert_eq!(schema.names().collect::<Vec<_>>(), vec!["Date", "Out", "Net", "Balance"]);
    assert_eq!(schema.attribute(3).unwrap().recurrence().unwrap().reference_index, Some(2));

    let report_schema = ledger.fetch_schema(&report).unwrap();
    assert_eq!(
        report_schema.attribute(1).unwrap().source(),
        Some(&SourceRef::new("cash", 1))
    );
    assert_eq!(report_schema.attribute(2).unwrap().source(), None);

    // Deleting the carried column nulls the pointer; evaluation still works.
    ledger
        .mutate_schema(&cash, Mutation::DeleteColumn { index: 2 })
        .unwrap();
    let schema = ledger.fetch_schema(&cash).unwrap();
    assert_eq!(schema.attribute(2).unwrap().recurrence().unwrap().reference_index, None);
    ledger
        .insert_row_on(&cash, date(3, 1), RowInput::new().value(1, 4.0))
        .unwrap();
    let view = ledger.view(&cash, Period::of(date(3, 1))).unwrap();
    assert_eq!(view.rows[0].number(2), 0.0);
}

#[test]
fn test_reference_must_target_independent_column() {
    let (mut ledger, cash) = cash();
    ledger
        .mutate_schema(&cash, Mutation::AddColumn(Attribute::derived("Net", [1], [2])))
        .unwrap();
    ledger.create_sheet("report", "Report").unwrap();
    let report = SheetId::from("report");

    let err = ledger
        .mutate_schema(
            &report,
            Mutation::AddColumn(Attribute::referenced("Net", SourceRef::new("cash", 3))),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::ReferenceNotIndependent { .. })
    ));

    let err = ledger
        .mutate_schema(
            &report,
            Mutation::AddColumn(Attribute::referenced("X", SourceRef::new("missing", 1))),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_subrow_config_mutation() {
    let (mut ledger, id) = cash();
    ledger
        .mutate_schema(
            &id,
            Mutation::UpdateSubrows {
                index: 1,
                config: Some(SubrowConfig::stock_items()),
            },
        )
        .unwrap();
    ledger
        .mutate_schema(&id, Mutation::AddColumn(Attribute::derived("Net", [1], [2])))
        .unwrap();
    let err = ledger
        .mutate_schema(
            &id,
            Mutation::UpdateSubrows {
                index: 3,
                config: Some(SubrowConfig::stock_items()),
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let schema = ledger
        .mutate_schema(&id, Mutation::UpdateSubrows { index: 1, config: None })
        .unwrap();
    assert!(schema.attribute(1).unwrap().subrows().is_none());
}

#[test]
fn test_subrow_config_change_restores_stored_aggregate() {
    let (mut ledger, id) = cash();
    ledger
        .mutate_schema(
            &id,
            Mutation::UpdateSubrows {
                index: 1,
                config: Some(SubrowConfig::stock_items()),
            },
        )
        .unwrap();
    let item = |value: f64| {
        SubrowRecord::new(vec![
            CellValue::Empty,
            CellValue::text("bolts"),
            CellValue::Empty,
            CellValue::Number(value),
        ])
    };
    ledger
        .insert_row_on(&id, date(3, 1), RowInput::new().subrows(1, vec![item(2.0), item(5.0)]))
        .unwrap();
    let stored = |ledger: &Ledger| {
        ledger
            .row_store(&id)
            .unwrap()
            .try_get(date(3, 1))
            .unwrap()
            .cell(1)
            .clone()
    };
    assert_eq!(stored(&ledger), CellValue::Number(7.0));

    ledger
        .mutate_schema(
            &id,
            Mutation::UpdateSubrows {
                index: 1,
                config: Some(SubrowConfig {
                    aggregation: Aggregation::Max,
                    ..SubrowConfig::stock_items()
                }),
            },
        )
        .unwrap();
    let view = ledger.view(&id, Period::of(date(3, 1))).unwrap();
    assert_eq!(view.rows[0].value(1), &CellValue::Number(5.0));
    assert_eq!(stored(&ledger), CellValue::Number(5.0));

    let parts = ledger.to_parts();
    assert_eq!(parts[0].1[0].cell(1), &CellValue::Number(5.0));
}

#[test]
fn test_previous_period_only_policy() {
    let mut ledger = Ledger::with_options(LedgerOptions {
        evaluation: EvaluationOptions {
            anchor_policy: AnchorPolicy::PreviousPeriodOnly,
            ..EvaluationOptions::default()
        },
    });
    let schema = Schema::from_attributes(vec![
        Attribute::independent("Date"),
        Attribute::independent("In"),
        Attribute::recurrent("Opening", 3),
        Attribute::derived("Closing", [1, 2], []),
    ])
    .unwrap();
    ledger.add_sheet(Sheet::with_schema("s", "S", schema)).unwrap();
    let id = SheetId::from("s");
    ledger
        .insert_row_on(&id, date(1, 15), RowInput::new().value(1, 9.0))
        .unwrap();
    ledger
        .insert_row_on(&id, date(3, 1), RowInput::new().value(1, 1.0))
        .unwrap();

    // February is empty, so March has no anchor under this policy.
    let view = ledger.view(&id, Period::of(date(3, 1))).unwrap();
    assert!(view.anchor.is_none());
    assert_eq!(view.rows[0].number(2), 0.0);
    assert!(ledger.fetch_rows(&id, Period::of(date(3, 1))).unwrap().anchor.is_none());

    ledger.set_options(LedgerOptions::default());
    let view = ledger.view(&id, Period::of(date(3, 1))).unwrap();
    assert_eq!(view.rows[0].number(2), 9.0);
}
