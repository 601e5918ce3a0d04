//! FILENAME: tests/test_band_sequence.rs
//! Integration tests for band firing order, group breaks and page breaks.

mod common;

use band_engine::{
    Band, BandType, Element, ExecutionOptions, ExecutionRequest, Group, IterSource,
    ReportDefinition, Variable, VariableType,
};
use common::{band_names, expr, field_values, ReportFixture, SalesFixture};
use expr_engine::Value;
use layout_ir::Content;

use BandType::*;

// ============================================================================
// BASIC SEQUENCE
// ============================================================================

#[test]
fn test_empty_stream_sequence() {
    let document = ReportFixture::flat().run(Vec::new());

    assert_eq!(
        document.band_sequence(),
        vec![Title, PageHeader, ColumnHeader, ColumnFooter, PageFooter, Summary]
    );
    assert_eq!(document.metadata.record_count, 0);
    assert_eq!(document.metadata.page_count, 1);
}

#[test]
fn test_empty_grouped_stream_fires_no_group_bands() {
    let document = ReportFixture::grouped().run(Vec::new());
    assert_eq!(document.bands_of(GroupHeader).count(), 0);
    assert_eq!(document.bands_of(GroupFooter).count(), 0);
    assert_eq!(document.bands_of(Detail).count(), 0);
}

#[test]
fn test_title_first_summary_last() {
    let document = ReportFixture::grouped().run(SalesFixture::nested());
    let sequence = document.band_sequence();

    assert_eq!(sequence.first(), Some(&Title));
    assert_eq!(sequence.last(), Some(&Summary));
    assert_eq!(sequence.iter().filter(|t| **t == Title).count(), 1);
    assert_eq!(sequence.iter().filter(|t| **t == Summary).count(), 1);
}

#[test]
fn test_detail_fires_once_per_row() {
    let rows = SalesFixture::nested();
    let document = ReportFixture::flat().run(rows.clone());
    assert_eq!(document.bands_of(Detail).count(), rows.len());
    assert_eq!(document.metadata.record_count, rows.len() as u64);
}

#[test]
fn test_row_indexes_follow_the_stream() {
    let document = ReportFixture::flat().run(SalesFixture::small());
    let indexes: Vec<Option<u64>> = document
        .bands_of(Detail)
        .map(|b| b.activation.row_index)
        .collect();
    assert_eq!(indexes, vec![Some(0), Some(1), Some(2)]);

    let title = document.bands_of(Title).next().unwrap();
    assert_eq!(title.activation.row_index, None);
    let summary = document.bands_of(Summary).next().unwrap();
    assert_eq!(summary.activation.row_index, Some(2));
}

// ============================================================================
// GROUP BREAKS
// ============================================================================

#[test]
fn test_region_scenario_sequence_and_totals() {
    let document = ReportFixture::grouped().run(SalesFixture::small());

    assert_eq!(
        document.band_sequence(),
        vec![
            Title,
            PageHeader,
            ColumnHeader,
            GroupHeader,
            Detail,
            Detail,
            GroupFooter,
            GroupHeader,
            Detail,
            GroupFooter,
            ColumnFooter,
            PageFooter,
            Summary,
        ]
    );

    let footers: Vec<_> = document.bands_of(GroupFooter).collect();
    assert_eq!(
        field_values(footers[0]),
        vec![Value::Number(30.0), Value::Number(30.0)]
    );
    assert_eq!(
        field_values(footers[1]),
        vec![Value::Number(5.0), Value::Number(5.0)]
    );

    let summary = document.bands_of(Summary).next().unwrap();
    assert_eq!(field_values(summary), vec![Value::Number(35.0)]);
    assert_eq!(
        document.metadata.variables.get("total"),
        Some(&Value::Number(35.0))
    );
}

#[test]
fn test_group_footer_sees_previous_row() {
    let document = ReportFixture::grouped().run(SalesFixture::small());
    let footer = document.bands_of(GroupFooter).next().unwrap();
    assert_eq!(footer.activation.row_index, Some(1));
    assert_eq!(footer.activation.group_level, Some(1));
}

#[test]
fn test_headers_and_footers_pair_up() {
    let document = ReportFixture::grouped().run(SalesFixture::generated(100, 7));

    let mut open = 0i32;
    for band in &document.bands {
        match band.band_type() {
            GroupHeader => {
                assert_eq!(open, 0, "header fired while a group was open");
                open += 1;
            }
            GroupFooter => {
                assert_eq!(open, 1, "footer fired without an open group");
                open -= 1;
            }
            Detail => assert_eq!(open, 1, "detail fired outside a group"),
            _ => {}
        }
    }
    assert_eq!(open, 0);
}

fn two_level_definition() -> ReportDefinition {
    let mut def = ReportFixture::flat().definition;
    def.groups = vec![
        Group::new(1, vec![expr("region")]),
        Group::new(2, vec![expr("city")]),
    ];
    def.variables.push(
        Variable::new("city_total", VariableType::Sum, Some(expr("amount"))).reset_on_group(2),
    );
    def.variables.push(
        Variable::new("region_total", VariableType::Sum, Some(expr("amount"))).reset_on_group(1),
    );
    let bands = vec![
        Band::new(GroupHeader).named("region_head").with_group_level(1),
        Band::new(GroupHeader).named("city_head").with_group_level(2),
        Band::new(GroupFooter)
            .named("city_foot")
            .with_group_level(2)
            .with_element(Element::expression("$city_total")),
        Band::new(GroupFooter)
            .named("region_foot")
            .with_group_level(1)
            .with_element(Element::expression("$region_total")),
    ];
    for (offset, band) in bands.into_iter().enumerate() {
        def.bands.insert(3 + offset, band);
    }
    def
}

#[test]
fn test_same_named_footers_keep_separate_aggregates() {
    let mut def = two_level_definition();
    for band in &mut def.bands {
        if band.band_type == GroupFooter {
            band.name = Some("footer".to_string());
            band.elements = vec![Element::aggregate("sum", "amount").named("t")];
        }
    }
    let engine = band_engine::ReportEngine::new(def).unwrap();
    let document = engine
        .execute(IterSource::new(SalesFixture::nested()), &ExecutionRequest::new())
        .unwrap();

    let footers: Vec<(Option<u32>, Vec<Value>)> = document
        .bands_of(GroupFooter)
        .map(|b| (b.activation.group_level, field_values(b)))
        .collect();
    let expected = [
        (2, 150.0),
        (2, 25.0),
        (1, 175.0),
        (2, 40.0),
        (2, 60.0),
        (1, 100.0),
    ];
    assert_eq!(
        footers,
        expected
            .iter()
            .map(|(level, total)| (Some(*level), vec![Value::Number(*total)]))
            .collect::<Vec<_>>()
    );
}

#[test]
fn test_nested_groups_close_innermost_first() {
    let engine = band_engine::ReportEngine::new(two_level_definition()).unwrap();
    let document = engine
        .execute(IterSource::new(SalesFixture::nested()), &ExecutionRequest::new())
        .unwrap();

    let group_bands: Vec<&str> = document
        .bands
        .iter()
        .filter(|b| b.band_type().is_group_band())
        .map(|b| b.activation.band.as_str())
        .collect();
    assert_eq!(
        group_bands,
        vec![
            "region_head", "city_head", // North / Oslo
            "city_foot", "city_head", // Bergen
            "city_foot", "region_foot", "region_head", "city_head", // South / Rome
            "city_foot", "city_head", // Milan
            "city_foot", "region_foot", // end of stream
        ]
    );

    let totals: Vec<Value> = document
        .bands
        .iter()
        .filter(|b| b.band_type() == GroupFooter)
        .flat_map(field_values)
        .collect();
    assert_eq!(
        totals,
        vec![
            Value::Number(150.0), // Oslo
            Value::Number(25.0),  // Bergen
            Value::Number(175.0), // North
            Value::Number(40.0),  // Rome
            Value::Number(60.0),  // Milan
            Value::Number(100.0), // South
        ]
    );
}

#[test]
fn test_group_header_nested_details_are_scheduled() {
    let mut def = ReportFixture::flat().definition;
    def.groups.push(Group::new(1, vec![expr("region")]));
    def.bands.retain(|b| b.band_type != Detail);
    def.bands.insert(
        3,
        Band::new(GroupHeader)
            .with_group_level(1)
            .with_child(Band::new(Detail).named("second").with_detail_number(1))
            .with_child(Band::new(Detail).named("third").with_detail_number(2)),
    );
    let engine = band_engine::ReportEngine::new(def).unwrap();
    let document = engine
        .execute(IterSource::new(SalesFixture::small()), &ExecutionRequest::new())
        .unwrap();

    let details: Vec<&str> = document
        .bands_of(Detail)
        .map(|b| b.activation.band.as_str())
        .collect();
    assert_eq!(
        details,
        vec!["second", "third", "second", "third", "second", "third"]
    );
    let numbers: Vec<Option<u32>> = document
        .bands_of(Detail)
        .take(2)
        .map(|b| b.activation.detail_number)
        .collect();
    assert_eq!(numbers, vec![Some(1), Some(2)]);
}

// ============================================================================
// SUB-BANDS
// ============================================================================

#[test]
fn test_sub_bands_fire_depth_first_after_parent() {
    let mut def = ReportFixture::flat().definition;
    let detail = def
        .bands
        .iter_mut()
        .find(|b| b.band_type == Detail)
        .unwrap();
    detail.bands = vec![
        Band::new(ColumnHeader)
            .named("child_a")
            .with_child(Band::new(ColumnHeader).named("grandchild")),
        Band::new(ColumnFooter).named("child_b"),
    ];
    let engine = band_engine::ReportEngine::new(def).unwrap();
    let document = engine
        .execute(
            IterSource::new(SalesFixture::small().into_iter().take(1)),
            &ExecutionRequest::new(),
        )
        .unwrap();

    let names = band_names(&document);
    let start = names.iter().position(|n| n == "detail").unwrap();
    assert_eq!(
        &names[start..start + 4],
        &["detail", "child_a", "grandchild", "child_b"]
    );

    let depths: Vec<u32> = document.bands[start..start + 4]
        .iter()
        .map(|b| b.activation.depth)
        .collect();
    assert_eq!(depths, vec![0, 1, 2, 1]);
    // inline children see the parent's row
    assert!(document.bands[start..start + 4]
        .iter()
        .all(|b| b.activation.row_index == Some(0)));
}

// ============================================================================
// PAGE BREAKS
// ============================================================================

#[test]
fn test_rows_per_page_breaks_pages() {
    let engine = ReportFixture::flat().engine();
    let request = ExecutionRequest::new()
        .with_options(ExecutionOptions::default().with_rows_per_page(2));
    let rows = SalesFixture::generated(5, 1);
    let document = engine.execute(IterSource::new(rows), &request).unwrap();

    assert_eq!(document.metadata.page_count, 3);
    assert_eq!(document.bands_of(PageHeader).count(), 3);
    assert_eq!(document.bands_of(PageFooter).count(), 3);
    assert_eq!(document.bands_of(ColumnHeader).count(), 3);

    let pages: Vec<u32> = document
        .bands_of(Detail)
        .map(|b| b.activation.page)
        .collect();
    assert_eq!(pages, vec![1, 1, 2, 2, 3]);
    assert!(document
        .bands_of(PageHeader)
        .all(|b| b.activation.repeat_per_page));
}

#[test]
fn test_page_break_before_group_header() {
    let mut fixture = ReportFixture::grouped();
    for band in &mut fixture.definition.bands {
        if band.band_type == GroupHeader {
            band.options
                .insert("page_break_before".to_string(), Value::Boolean(true));
        }
    }
    let document = fixture.run(SalesFixture::small());

    assert_eq!(document.metadata.page_count, 2);
    let sequence = document.band_sequence();
    let second_header = sequence
        .iter()
        .enumerate()
        .filter(|(_, t)| **t == GroupHeader)
        .nth(1)
        .map(|(i, _)| i)
        .unwrap();
    // footer of A, then the page turn, then the header of B
    assert_eq!(
        &sequence[second_header - 4..=second_header],
        &[GroupFooter, PageFooter, PageHeader, ColumnHeader, GroupHeader]
    );
}

#[test]
fn test_page_scoped_variable_resets_at_page_break() {
    let mut def = ReportFixture::flat().definition;
    def.variables.push(
        Variable::new("page_total", VariableType::Sum, Some(expr("amount")))
            .reset_on(band_engine::ResetScope::Page),
    );
    for band in &mut def.bands {
        if band.band_type == PageFooter {
            band.elements.push(Element::expression("$page_total"));
        }
    }
    let engine = band_engine::ReportEngine::new(def).unwrap();
    let request = ExecutionRequest::new()
        .with_options(ExecutionOptions::default().with_rows_per_page(2));
    let document = engine
        .execute(IterSource::new(SalesFixture::small()), &request)
        .unwrap();

    let totals: Vec<Value> = document.bands_of(PageFooter).flat_map(field_values).collect();
    assert_eq!(totals, vec![Value::Number(30.0), Value::Number(5.0)]);
}

// ============================================================================
// LAYOUT OUTPUT
// ============================================================================

#[test]
fn test_detail_layout_has_one_cell_per_element() {
    let document = ReportFixture::flat().run(SalesFixture::small());
    let detail = document.bands_of(Detail).next().unwrap();
    let rows: Vec<_> = detail.layout.rows().collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].cells.len(), 2);
    match &rows[0].cells[0].contents[0] {
        Content::Field { formatted, .. } => assert_eq!(formatted, "A"),
        other => panic!("unexpected content {:?}", other),
    }
    assert!(detail.layout.validate().is_ok());
}
