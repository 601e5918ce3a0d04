//! FILENAME: tests/test_variables.rs
//! Integration tests for variable scoping as seen through band output.

mod common;

use band_engine::{
    BandType, Element, ExecutionRequest, IterSource, ReportEngine, ResetScope, Variable,
    VariableType,
};
use common::{expr, field_values, ReportFixture, SalesFixture};
use expr_engine::{Row, Value};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Flat report whose detail band shows `$name` for each given variable.
fn run_with_detail_variables(variables: Vec<Variable>, rows: Vec<Row>) -> Vec<Vec<Value>> {
    let mut def = ReportFixture::flat().definition;
    for band in &mut def.bands {
        if band.band_type == BandType::Detail {
            band.elements = variables
                .iter()
                .map(|v| Element::expression(&format!("${}", v.name)).named(&v.name))
                .collect();
        }
    }
    def.variables.extend(variables);

    let engine = ReportEngine::new(def).unwrap();
    let document = engine
        .execute(IterSource::new(rows), &ExecutionRequest::new())
        .unwrap();
    document
        .bands_of(BandType::Detail)
        .map(field_values)
        .collect()
}

fn amounts(values: &[Value]) -> Vec<Row> {
    values
        .iter()
        .map(|v| Row::new().with("amount", v.clone()))
        .collect()
}

// ============================================================================
// RESET SCOPES
// ============================================================================

#[test]
fn test_detail_scoped_sum_equals_row_contribution() {
    let rows = amounts(&[Value::from(10), Value::from(20), Value::from(5)]);
    let values = run_with_detail_variables(
        vec![
            Variable::new("row_sum", VariableType::Sum, Some(expr("amount")))
                .reset_on(ResetScope::Detail),
        ],
        rows,
    );
    assert_eq!(
        values,
        vec![
            vec![Value::Number(10.0)],
            vec![Value::Number(20.0)],
            vec![Value::Number(5.0)],
        ]
    );
}

#[test]
fn test_report_scoped_sum_runs_across_rows() {
    let rows = amounts(&[Value::from(10), Value::from(20), Value::from(5)]);
    let values = run_with_detail_variables(
        vec![Variable::new("running", VariableType::Sum, Some(expr("amount")))],
        rows,
    );
    let running: Vec<Value> = values.into_iter().flatten().collect();
    assert_eq!(
        running,
        vec![Value::Number(10.0), Value::Number(30.0), Value::Number(35.0)]
    );
}

#[test]
fn test_group_aggregate_in_header_shows_reset_state() {
    let mut fixture = ReportFixture::grouped();
    for band in &mut fixture.definition.bands {
        if band.band_type == BandType::GroupHeader {
            band.elements
                .push(Element::expression("$region_total").named("so_far"));
        }
    }
    let document = fixture.run(SalesFixture::small());
    let headers: Vec<Vec<Value>> = document
        .bands_of(BandType::GroupHeader)
        .map(field_values)
        .collect();

    // region field, then the group total before this group's rows
    assert_eq!(headers[0][1], Value::Number(0.0));
    assert_eq!(headers[1][1], Value::Number(0.0));
}

// ============================================================================
// AGGREGATE TYPES
// ============================================================================

#[test]
fn test_average_without_rows_is_empty() {
    let mut def = ReportFixture::flat().definition;
    def.variables
        .push(Variable::new("avg", VariableType::Average, Some(expr("amount"))));
    let engine = ReportEngine::new(def).unwrap();
    let document = engine
        .execute(IterSource::new(Vec::new()), &ExecutionRequest::new())
        .unwrap();
    assert_eq!(document.metadata.variables.get("avg"), Some(&Value::Empty));
}

#[test]
fn test_min_max_average_over_stream() {
    let rows = amounts(&[Value::from(4), Value::Empty, Value::from(10), Value::from(1)]);
    let values = run_with_detail_variables(
        vec![
            Variable::new("low", VariableType::Min, Some(expr("amount"))),
            Variable::new("high", VariableType::Max, Some(expr("amount"))),
            Variable::new("avg", VariableType::Average, Some(expr("amount"))),
        ],
        rows,
    );
    assert_eq!(
        values.last().unwrap(),
        &vec![Value::Number(1.0), Value::Number(10.0), Value::Number(5.0)]
    );
    // the empty row leaves every extreme untouched
    assert_eq!(values[1], values[0]);
}

#[test]
fn test_count_semantics() {
    let rows = amounts(&[Value::from(3), Value::Empty, Value::from(false), Value::from("x")]);
    let values = run_with_detail_variables(
        vec![
            Variable::new("rows", VariableType::Count, None),
            Variable::new("filled", VariableType::Count, Some(expr("amount"))),
        ],
        rows,
    );
    assert_eq!(
        values.last().unwrap(),
        &vec![Value::Number(4.0), Value::Number(2.0)]
    );
}

#[test]
fn test_custom_reads_reset_average_in_same_tick() {
    // after the last row the detail-scoped average is reset, and the
    // custom variable reading it falls back to its initial value
    let mut def = ReportFixture::flat().definition;
    def.variables.push(
        Variable::new("row_avg", VariableType::Average, Some(expr("amount")))
            .reset_on(ResetScope::Detail),
    );
    def.variables.push(Variable::new(
        "shown",
        VariableType::Custom,
        Some(expr("COALESCE($row_avg, -1)")),
    ));
    for band in &mut def.bands {
        match band.band_type {
            BandType::Detail => band.elements.push(Element::expression("$shown").named("shown")),
            BandType::Summary => band.elements = vec![Element::expression("$shown")],
            _ => {}
        }
    }

    let engine = ReportEngine::new(def).unwrap();
    let document = engine
        .execute(IterSource::new(SalesFixture::small()), &ExecutionRequest::new())
        .unwrap();

    let details: Vec<Vec<Value>> = document
        .bands_of(BandType::Detail)
        .map(field_values)
        .collect();
    assert_eq!(details[0][2], Value::Number(10.0));
    assert_eq!(details[2][2], Value::Number(5.0));

    assert_eq!(
        document.metadata.variables.get("row_avg"),
        Some(&Value::Empty)
    );
    assert_eq!(document.metadata.variables.get("shown"), Some(&Value::Empty));
    let summary = document.bands_of(BandType::Summary).next().unwrap();
    assert_eq!(field_values(summary), vec![Value::Empty]);
}

#[test]
fn test_report_custom_over_group_totals_across_break() {
    let mut fixture = ReportFixture::grouped();
    let def = &mut fixture.definition;
    def.variables.push(
        Variable::new("g_sum", VariableType::Sum, Some(expr("amount"))).reset_on_group(1),
    );
    def.variables
        .push(Variable::new("g_count", VariableType::Count, None).reset_on_group(1));
    def.variables.push(Variable::new(
        "avg_amount",
        VariableType::Custom,
        Some(expr("$g_sum / $g_count")),
    ));
    for band in &mut def.bands {
        if matches!(
            band.band_type,
            BandType::GroupHeader | BandType::Detail | BandType::GroupFooter
        ) {
            band.elements
                .push(Element::expression("$avg_amount").named("avg_amount"));
        }
    }

    let document = fixture.run(SalesFixture::small());
    let last = |values: Vec<Value>| values.last().cloned().unwrap();

    let footers: Vec<Value> = document
        .bands_of(BandType::GroupFooter)
        .map(|b| last(field_values(b)))
        .collect();
    assert_eq!(footers, vec![Value::Number(15.0), Value::Number(5.0)]);

    // header B comes right after the level 1 reset
    let headers: Vec<Value> = document
        .bands_of(BandType::GroupHeader)
        .map(|b| last(field_values(b)))
        .collect();
    assert_eq!(headers, vec![Value::Empty, Value::Empty]);

    let details: Vec<Value> = document
        .bands_of(BandType::Detail)
        .map(|b| last(field_values(b)))
        .collect();
    assert_eq!(
        details,
        vec![Value::Number(10.0), Value::Number(15.0), Value::Number(5.0)]
    );
    assert_eq!(document.metadata.record_count, 3);
}

#[test]
fn test_initial_value_seeds_sum() {
    let rows = amounts(&[Value::from(1), Value::from(2)]);
    let values = run_with_detail_variables(
        vec![Variable::new("carry", VariableType::Sum, Some(expr("amount"))).with_initial_value(100)],
        rows,
    );
    assert_eq!(values[1], vec![Value::Number(103.0)]);
}

#[test]
fn test_sum_over_text_fails_with_variable_context() {
    let mut def = ReportFixture::flat().definition;
    def.variables.clear();
    def.variables
        .push(Variable::new("total", VariableType::Sum, Some(expr("amount"))));
    let engine = ReportEngine::new(def).unwrap();
    let rows = vec![
        Row::new().with("amount", 1),
        Row::new().with("amount", "lots"),
    ];
    let err = engine
        .execute(IterSource::new(rows), &ExecutionRequest::new())
        .unwrap_err();
    let context = err.context().expect("error should carry context");
    assert_eq!(context.variable.as_deref(), Some("total"));
    assert_eq!(context.row_index, Some(1));
}
