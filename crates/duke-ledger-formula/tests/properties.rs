//! Property tests for period evaluation

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use duke_ledger_core::{Attribute, CellValue, Period, Row, Schema};
use duke_ledger_formula::{EvaluationOptions, NoReferences, PeriodEvaluator, ResolvedRow};
use proptest::prelude::*;

const INPUTS: usize = 4;

/// Date, four Independent inputs, a Derived column over a subset of them, a
/// Recurrent column carrying the Derived one
fn schema(addition: &[usize], subtraction: &[usize]) -> Schema {
    let mut attributes = vec![Attribute::independent("Date")];
    for i in 1..=INPUTS {
        attributes.push(Attribute::independent(format!("In {i}")));
    }
    attributes.push(Attribute::derived(
        "Total",
        addition.iter().copied(),
        subtraction.iter().copied(),
    ));
    attributes.push(Attribute::recurrent("Carried", INPUTS + 1));
    Schema::from_attributes(attributes).unwrap()
}

fn rows(values: &[Vec<f64>], stale_total: f64) -> Vec<Row> {
    let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(i, inputs)| {
            let date = start + Duration::days(i as i64);
            let created = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::days(i as i64);
            let mut row = Row::new(date, created);
            for (j, v) in inputs.iter().enumerate() {
                row.set_cell(j + 1, CellValue::Number(*v));
            }
            row.set_cell(INPUTS + 1, CellValue::Number(stale_total));
            row
        })
        .collect()
}

/// Disjoint addition/subtraction sets over the input columns
fn formula_sets() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    prop::collection::vec(0u8..3, INPUTS).prop_map(|choice| {
        let mut add = Vec::new();
        let mut sub = Vec::new();
        for (i, c) in choice.into_iter().enumerate() {
            match c {
                1 => add.push(i + 1),
                2 => sub.push(i + 1),
                _ => {}
            }
        }
        (add, sub)
    })
}

fn input_rows() -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(prop::collection::vec(-1000i32..1000, INPUTS), 1..8)
        .prop_map(|rows| {
            rows.into_iter()
                .map(|r| r.into_iter().map(f64::from).collect())
                .collect()
        })
}

fn evaluate(schema: &Schema, rows: &[Row], anchor: Option<&ResolvedRow>) -> Vec<ResolvedRow> {
    let period = Period::new(2024, 5).unwrap();
    let options = EvaluationOptions::default();
    PeriodEvaluator::new(schema, period, rows, anchor, &NoReferences, &options)
        .unwrap()
        .evaluate()
        .unwrap()
}

proptest! {
    #[test]
    fn derived_is_signed_sum_of_inputs(
        (add, sub) in formula_sets(),
        values in input_rows(),
        stale in -50.0f64..50.0,
    ) {
        let schema = schema(&add, &sub);
        let rows = rows(&values, stale);
        let resolved = evaluate(&schema, &rows, None);

        for (inputs, row) in values.iter().zip(&resolved) {
            let expected: f64 = add.iter().map(|&i| inputs[i - 1]).sum::<f64>()
                - sub.iter().map(|&i| inputs[i - 1]).sum::<f64>();
            prop_assert_eq!(row.number(INPUTS + 1), expected);
        }
    }

    #[test]
    fn recurrent_carries_previous_row(
        (add, sub) in formula_sets(),
        values in input_rows(),
        opening in prop::option::of(-500i32..500),
    ) {
        let schema = schema(&add, &sub);
        let rows = rows(&values, 0.0);
        let anchor = opening.map(|v| ResolvedRow {
            date: NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
            values: (0..schema.len())
                .map(|i| if i == INPUTS + 1 { CellValue::Number(f64::from(v)) } else { CellValue::Empty })
                .collect(),
        });
        let resolved = evaluate(&schema, &rows, anchor.as_ref());

        let carried = INPUTS + 2;
        let first = anchor.as_ref().map_or(0.0, |a| a.number(INPUTS + 1));
        prop_assert_eq!(resolved[0].number(carried), first);
        for i in 1..resolved.len() {
            prop_assert_eq!(resolved[i].number(carried), resolved[i - 1].number(INPUTS + 1));
        }
    }
}
