//! FILENAME: tests/test_execution.rs
//! Integration tests for the execution API: parameters, cancellation,
//! streaming sinks, error reporting and concurrent runs.

mod common;

use band_engine::{
    BandOutput, BandType, CancelPolicy, CancellationToken, CountingSink, Element,
    ExecutionOptions, ExecutionRequest, IterSource, JsonLinesSource, Parameter,
    ReportDefinition, ReportEngine, ReportError, RowSource, RowSourceError, SinkError,
    TryIterSource,
};
use common::{expr, field_values, ReportFixture, SalesFixture};
use expr_engine::{Row, Value};
use layout_ir::Content;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Serves rows and trips the token once `cancel_after` rows were handed out.
struct CancellingSource {
    rows: std::vec::IntoIter<Row>,
    token: CancellationToken,
    cancel_after: usize,
    served: usize,
}

impl RowSource for CancellingSource {
    fn next_row(&mut self) -> Option<Result<Row, RowSourceError>> {
        if self.served == self.cancel_after {
            self.token.cancel();
        }
        self.served += 1;
        self.rows.next().map(Ok)
    }
}

fn cancelling(token: &CancellationToken, cancel_after: usize) -> CancellingSource {
    CancellingSource {
        rows: SalesFixture::generated(10, 1).into_iter(),
        token: token.clone(),
        cancel_after,
        served: 0,
    }
}

fn with_parameter(required: bool, default: Option<Value>) -> ReportDefinition {
    let mut def = ReportFixture::flat().definition;
    def.parameters.push(Parameter {
        name: "currency".to_string(),
        default,
        required,
    });
    for band in &mut def.bands {
        if band.band_type == BandType::Title {
            band.elements
                .push(Element::expression("\"Amounts in \" & @currency").named("unit"));
        }
    }
    def
}

fn title_text(document: &band_engine::ReportDocument) -> String {
    let title = document.bands_of(BandType::Title).next().unwrap();
    match field_values(title).first() {
        Some(value) => value.as_text(),
        None => String::new(),
    }
}

// ============================================================================
// PARAMETERS
// ============================================================================

#[test]
fn test_missing_required_parameter_fails_before_any_band() {
    let engine = ReportEngine::new(with_parameter(true, None)).unwrap();
    let mut sink = CountingSink::default();
    let result = engine.execute_into(
        IterSource::new(SalesFixture::small()),
        &ExecutionRequest::new(),
        &mut sink,
    );

    assert!(matches!(result, Err(ReportError::Parameter(ref m)) if m.contains("currency")));
    assert_eq!(sink.count, 0);
}

#[test]
fn test_supplied_parameter_overrides_default() {
    let engine = ReportEngine::new(with_parameter(false, Some(Value::from("USD")))).unwrap();

    let document = engine
        .execute(IterSource::new(Vec::new()), &ExecutionRequest::new())
        .unwrap();
    assert_eq!(title_text(&document), "Amounts in USD");

    let request = ExecutionRequest::new().with_parameter("currency", "EUR");
    let document = engine.execute(IterSource::new(Vec::new()), &request).unwrap();
    assert_eq!(title_text(&document), "Amounts in EUR");
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[test]
fn test_cancel_abort_returns_cancelled() {
    let engine = ReportFixture::flat().engine();
    let token = CancellationToken::new();
    let request = ExecutionRequest::new().with_cancellation(token.clone());

    let result = engine.execute(cancelling(&token, 2), &request);
    assert!(matches!(result, Err(ReportError::Cancelled { records: 3 })));
}

#[test]
fn test_cancel_close_report_yields_well_formed_document() {
    let engine = ReportFixture::grouped().engine();
    let token = CancellationToken::new();
    let request = ExecutionRequest::new()
        .with_options(ExecutionOptions::default().with_cancel_policy(CancelPolicy::CloseReport))
        .with_cancellation(token.clone());

    let document = engine.execute(cancelling(&token, 2), &request).unwrap();

    assert!(document.metadata.cancelled);
    assert_eq!(document.metadata.record_count, 3);
    assert_eq!(document.bands_of(BandType::Detail).count(), 3);
    assert_eq!(
        document.bands_of(BandType::GroupHeader).count(),
        document.bands_of(BandType::GroupFooter).count()
    );
    let sequence = document.band_sequence();
    assert_eq!(
        &sequence[sequence.len() - 3..],
        &[BandType::ColumnFooter, BandType::PageFooter, BandType::Summary]
    );
}

#[test]
fn test_cancel_before_first_row() {
    let engine = ReportFixture::flat().engine();
    let token = CancellationToken::new();
    token.cancel();
    let request = ExecutionRequest::new().with_cancellation(token);

    let result = engine.execute(IterSource::new(SalesFixture::small()), &request);
    assert!(matches!(result, Err(ReportError::Cancelled { records: 0 })));
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn test_row_source_error_is_fatal() {
    let engine = ReportFixture::flat().engine();
    let rows = vec![
        Ok(Row::new().with("region", "A").with("amount", 1)),
        Err(RowSourceError::new("connection reset")),
        Ok(Row::new().with("region", "A").with("amount", 2)),
    ];
    let err = engine
        .execute(TryIterSource::new(rows), &ExecutionRequest::new())
        .unwrap_err();

    match err {
        ReportError::RowSource { row_index, source } => {
            assert_eq!(row_index, 1);
            assert_eq!(source.to_string(), "connection reset");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_element_error_carries_band_and_row() {
    let mut def = ReportFixture::flat().definition;
    for band in &mut def.bands {
        if band.band_type == BandType::Detail {
            band.elements
                .push(Element::expression("100 / amount").named("share"));
        }
    }
    let engine = ReportEngine::new(def).unwrap();
    let rows = vec![
        Row::new().with("region", "A").with("amount", 4),
        Row::new().with("region", "A").with("amount", 0),
    ];
    let err = engine
        .execute(IterSource::new(rows), &ExecutionRequest::new())
        .unwrap_err();

    let context = err.context().unwrap();
    assert_eq!(context.band.as_deref(), Some("detail"));
    assert_eq!(context.element.as_deref(), Some("share"));
    assert_eq!(context.row_index, Some(1));
    assert!(err.to_string().contains("band 'detail'"));
}

#[test]
fn test_failing_hook_is_fatal() {
    let mut def = ReportFixture::flat().definition;
    for band in &mut def.bands {
        if band.band_type == BandType::Summary {
            band.on_exit = Some(expr("1 / 0"));
        }
    }
    let engine = ReportEngine::new(def).unwrap();
    let err = engine
        .execute(IterSource::new(SalesFixture::small()), &ExecutionRequest::new())
        .unwrap_err();
    assert_eq!(
        err.context().and_then(|c| c.element.as_deref()),
        Some("on_exit")
    );
}

#[test]
fn test_sink_error_stops_execution() {
    let engine = ReportFixture::flat().engine();
    let mut fired = 0;
    let mut sink = |output: BandOutput| {
        fired += 1;
        if output.band_type() == BandType::Detail {
            Err(SinkError("disk full".to_string()))
        } else {
            Ok(())
        }
    };
    let result = engine.execute_into(
        IterSource::new(SalesFixture::small()),
        &ExecutionRequest::new(),
        &mut sink,
    );
    assert!(matches!(result, Err(ReportError::Sink(_))));
    // title, page header, column header, then the failing detail
    assert_eq!(fired, 4);
}

// ============================================================================
// WARNINGS AND METADATA
// ============================================================================

#[test]
fn test_conditional_on_missing_field_warns_once() {
    let mut def = ReportFixture::flat().definition;
    for band in &mut def.bands {
        if band.band_type == BandType::Detail {
            band.elements.push(
                Element::label("VIP")
                    .named("vip")
                    .with_conditional(expr("is_vip")),
            );
        }
    }
    let engine = ReportEngine::new(def).unwrap();
    let document = engine
        .execute(IterSource::new(SalesFixture::small()), &ExecutionRequest::new())
        .unwrap();

    assert_eq!(document.metadata.warnings.len(), 1);
    assert!(document.metadata.warnings[0].contains("is_vip"));

    // the suppressed label leaves an empty third cell
    let detail = document.bands_of(BandType::Detail).next().unwrap();
    let row = detail.layout.rows().next().unwrap();
    assert_eq!(row.cells.len(), 3);
    assert!(row.cells[2].contents.is_empty());
}

#[test]
fn test_activation_trace_is_opt_in() {
    let engine = ReportFixture::flat().engine();
    let document = engine
        .execute(IterSource::new(SalesFixture::small()), &ExecutionRequest::new())
        .unwrap();
    assert!(document.metadata.activations.is_empty());
    assert_eq!(document.metadata.activation_count, document.bands.len() as u64);

    let options = ExecutionOptions::default().with_activation_trace(true);
    let document = engine
        .execute(
            IterSource::new(SalesFixture::small()),
            &ExecutionRequest::new().with_options(options),
        )
        .unwrap();
    assert_eq!(
        document.metadata.activations.len() as u64,
        document.metadata.activation_count
    );
    assert_eq!(document.metadata.activation_count, document.bands.len() as u64);
}

#[test]
fn test_streaming_run_keeps_no_trace() {
    let engine = ReportFixture::grouped().engine();
    let mut sink = CountingSink::default();
    let metadata = engine
        .execute_into(
            IterSource::new(SalesFixture::generated(2_000, 10)),
            &ExecutionRequest::new(),
            &mut sink,
        )
        .unwrap();
    assert_eq!(metadata.record_count, 2_000);
    assert_eq!(sink.count, metadata.activation_count);
    assert!(metadata.activations.is_empty());
}

#[test]
fn test_locale_reaches_formatter() {
    let mut def = ReportFixture::flat().definition;
    for band in &mut def.bands {
        if band.band_type == BandType::Detail {
            band.elements = vec![Element::field("amount")
                .with_format(expr_engine::FormatSpec::number_with_separators(2))];
        }
    }
    let engine = ReportEngine::new(def).unwrap();
    let request =
        ExecutionRequest::new().with_options(ExecutionOptions::default().with_locale("de"));
    let rows = vec![Row::new().with("amount", 1234.5)];
    let document = engine.execute(IterSource::new(rows), &request).unwrap();

    let detail = document.bands_of(BandType::Detail).next().unwrap();
    let row = detail.layout.rows().next().unwrap();
    match &row.cells[0].contents[0] {
        Content::Field { formatted, .. } => assert_eq!(formatted, "1.234,50"),
        other => panic!("unexpected content {:?}", other),
    }
}

// ============================================================================
// DEFINITIONS FROM JSON
// ============================================================================

const DEFINITION_JSON: &str = r#"{
    "name": "regional_sales",
    "title": "Regional sales",
    "groups": [{"level": 1, "keys": ["region"]}],
    "variables": [
        {"name": "grand_total", "type": "sum", "expression": "amount"},
        {"name": "region_count", "type": "count", "reset_on": "group", "reset_group": 1}
    ],
    "bands": [
        {"type": "title", "elements": [{"type": "label", "source": "Regional sales"}]},
        {"type": "group_header", "group_level": 1,
         "elements": [{"type": "field", "source": "region"}]},
        {"type": "detail", "elements": [{"type": "field", "source": "amount"}]},
        {"type": "group_footer", "group_level": 1, "elements": [
            {"type": "expression", "source": "$region_count"},
            {"type": "aggregate", "function": "max", "source": "amount"}
        ]},
        {"type": "summary", "elements": [{"type": "expression", "source": "$grand_total"}]}
    ]
}"#;

#[test]
fn test_json_definition_over_json_lines_rows() {
    let def = ReportDefinition::from_json(DEFINITION_JSON).unwrap();
    let engine = ReportEngine::new(def).unwrap();
    let data = "{\"region\": \"A\", \"amount\": 10}\n\
                {\"region\": \"A\", \"amount\": 20}\n\
                {\"region\": \"B\", \"amount\": 5}\n";
    let document = engine
        .execute(
            JsonLinesSource::new(std::io::Cursor::new(data)),
            &ExecutionRequest::new(),
        )
        .unwrap();

    assert_eq!(document.title.as_deref(), Some("Regional sales"));
    let footers: Vec<Vec<Value>> = document
        .bands_of(BandType::GroupFooter)
        .map(field_values)
        .collect();
    assert_eq!(
        footers,
        vec![
            vec![Value::Number(2.0), Value::Number(20.0)],
            vec![Value::Number(1.0), Value::Number(5.0)],
        ]
    );
    let summary = document.bands_of(BandType::Summary).next().unwrap();
    assert_eq!(field_values(summary), vec![Value::Number(35.0)]);
}

#[test]
fn test_document_serializes_to_json() {
    let document = ReportFixture::grouped().run(SalesFixture::small());
    let json = serde_json::to_value(&document).unwrap();

    assert_eq!(json["name"], "sales");
    assert_eq!(json["bands"][0]["band_type"], "title");
    assert_eq!(json["metadata"]["record_count"], 3);
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[test]
fn test_concurrent_executions_share_one_engine() {
    let engine = ReportFixture::grouped().engine();

    let totals: Vec<Value> = std::thread::scope(|scope| {
        let handles: Vec<_> = (1..=4)
            .map(|n| {
                let engine = &engine;
                scope.spawn(move || {
                    let rows = SalesFixture::generated(50 * n, n);
                    let document = engine
                        .execute(IterSource::new(rows), &ExecutionRequest::new())
                        .unwrap();
                    document
                        .metadata
                        .variables
                        .get("total")
                        .cloned()
                        .unwrap_or_default()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (n, total) in (1..=4).zip(totals) {
        let expected: i64 = (0..50 * n).map(|i| (i % 7) as i64).sum();
        assert_eq!(total, Value::Number(expected as f64));
    }
}
