//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for band-engine integration tests.

#![allow(dead_code)]

use band_engine::{
    Band, BandType, Element, ExecutionRequest, Group, IterSource, ReportDefinition,
    ReportDocument, ReportEngine, Variable, VariableType,
};
use expr_engine::{Expression, Row, Value};
use layout_ir::{BandOutput, Content};

/// Parses an expression, panicking on bad test input.
pub fn expr(source: &str) -> Expression {
    Expression::parse(source).expect("test expression should parse")
}

/// Sales rows, pre-sorted by region.
pub struct SalesFixture;

impl SalesFixture {
    /// The three-row scenario: two rows in A, one in B.
    pub fn small() -> Vec<Row> {
        vec![
            Row::new().with("region", "A").with("amount", 10),
            Row::new().with("region", "A").with("amount", 20),
            Row::new().with("region", "B").with("amount", 5),
        ]
    }

    /// Two group levels: region, then city.
    pub fn nested() -> Vec<Row> {
        let data = [
            ("North", "Oslo", 100.0),
            ("North", "Oslo", 50.0),
            ("North", "Bergen", 25.0),
            ("South", "Rome", 10.0),
            ("South", "Rome", 30.0),
            ("South", "Milan", 60.0),
        ];
        data.iter()
            .map(|(region, city, amount)| {
                Row::new()
                    .with("region", *region)
                    .with("city", *city)
                    .with("amount", *amount)
            })
            .collect()
    }

    /// `count` rows spread evenly over `regions` regions.
    pub fn generated(count: usize, regions: usize) -> Vec<Row> {
        let per_region = (count / regions.max(1)).max(1);
        (0..count)
            .map(|i| {
                Row::new()
                    .with("region", format!("R{:03}", i / per_region))
                    .with("amount", (i % 7) as i64)
            })
            .collect()
    }
}

/// Builds report definitions for the common test layouts.
pub struct ReportFixture {
    pub definition: ReportDefinition,
}

impl ReportFixture {
    /// Title, page/column headers, detail, column/page footers and summary.
    pub fn flat() -> Self {
        ReportFixture {
            definition: ReportDefinition {
                name: "sales".to_string(),
                title: Some("Sales".to_string()),
                resource: None,
                bands: vec![
                    Band::new(BandType::Title).with_element(Element::label("Sales report")),
                    Band::new(BandType::PageHeader),
                    Band::new(BandType::ColumnHeader)
                        .with_element(Element::label("Region"))
                        .with_element(Element::label("Amount")),
                    Band::new(BandType::Detail)
                        .named("detail")
                        .with_element(Element::field("region").named("region"))
                        .with_element(Element::field("amount").named("amount")),
                    Band::new(BandType::ColumnFooter),
                    Band::new(BandType::PageFooter),
                    Band::new(BandType::Summary)
                        .named("summary")
                        .with_element(Element::expression("$total").named("total")),
                ],
                variables: vec![Variable::new(
                    "total",
                    VariableType::Sum,
                    Some(expr("amount")),
                )],
                groups: Vec::new(),
                parameters: Vec::new(),
            },
        }
    }

    /// `flat()` plus one region group whose footer shows the group sum.
    pub fn grouped() -> Self {
        let mut fixture = ReportFixture::flat();
        let def = &mut fixture.definition;
        def.groups.push(Group::new(1, vec![expr("region")]));
        def.variables.push(
            Variable::new("region_total", VariableType::Sum, Some(expr("amount")))
                .reset_on_group(1),
        );

        let header = Band::new(BandType::GroupHeader)
            .named("region_header")
            .with_group_level(1)
            .with_element(Element::field("region").named("region"));
        let footer = Band::new(BandType::GroupFooter)
            .named("region_footer")
            .with_group_level(1)
            .with_element(Element::expression("$region_total").named("total"))
            .with_element(Element::aggregate("sum", "amount").named("agg_total"));

        // keep title first and summary last
        let detail_at = def
            .bands
            .iter()
            .position(|b| b.band_type == BandType::Detail)
            .unwrap_or(0);
        def.bands.insert(detail_at + 1, footer);
        def.bands.insert(detail_at, header);
        fixture
    }

    pub fn engine(&self) -> ReportEngine {
        ReportEngine::new(self.definition.clone()).expect("fixture definition should be valid")
    }

    pub fn run(&self, rows: Vec<Row>) -> ReportDocument {
        self.engine()
            .execute(IterSource::new(rows), &ExecutionRequest::new())
            .expect("execution should succeed")
    }
}

/// Values of all field contents in a band output, in cell order.
pub fn field_values(output: &BandOutput) -> Vec<Value> {
    let mut values = Vec::new();
    output.layout.walk_cells(&mut |cell| {
        for content in &cell.contents {
            if let Content::Field { value, .. } = content {
                values.push(value.clone());
            }
        }
    });
    values
}

/// Band names in firing order.
pub fn band_names(document: &ReportDocument) -> Vec<String> {
    document
        .bands
        .iter()
        .map(|b| b.activation.band.clone())
        .collect()
}
