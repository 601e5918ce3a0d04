//! FILENAME: core/band-engine/src/plan.rs
//! PURPOSE: Compiles a validated definition into an execution plan.
//! CONTEXT: The band tree is flattened into an arena once, at engine
//! construction. Scheduled bands are sorted into per-lifecycle slot lists
//! so the processor never walks the tree while rows stream. Bands that are
//! not scheduled on their own are inline sub-bands: they fire right after
//! their parent, depth-first, in definition order.
//!
//! Scheduling rule: a band is scheduled if it is top-level, or if it sits
//! under a group band and is itself a group band or a detail-family band.

use crate::definition::{
    Band, BandLayout, BandType, Element, ElementType, ReportDefinition, ResetScope, Variable,
    VariableType,
};
use crate::error::DefinitionError;
use expr_engine::Expression;
use std::collections::BTreeMap;

pub type BandId = usize;

/// Whether a band with this parent fires from the processor's schedule.
pub(crate) fn is_scheduled(parent: Option<BandType>, child: BandType) -> bool {
    match parent {
        None => true,
        Some(parent) => parent.is_group_band() && (child.is_group_band() || child.is_row_band()),
    }
}

#[derive(Debug, Clone)]
pub struct CompiledElement {
    pub key: String,
    pub element: Element,
    /// Parsed source for expression and aggregate elements.
    pub expression: Option<Expression>,
    /// Hidden variable backing an aggregate element.
    pub aggregate_var: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlannedBand {
    pub name: String,
    pub band_type: BandType,
    pub group_level: Option<u32>,
    pub detail_number: Option<u32>,
    pub depth: u32,
    pub elements: Vec<CompiledElement>,
    pub layout: Option<BandLayout>,
    pub on_entry: Option<Expression>,
    pub on_exit: Option<Expression>,
    pub page_break_before: bool,
    /// Inline sub-bands, in definition order.
    pub children: Vec<BandId>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    bands: Vec<PlannedBand>,
    pub titles: Vec<BandId>,
    pub page_headers: Vec<BandId>,
    pub column_headers: Vec<BandId>,
    pub group_headers: BTreeMap<u32, Vec<BandId>>,
    pub detail_headers: Vec<BandId>,
    /// Stable-sorted by detail number.
    pub details: Vec<BandId>,
    pub detail_footers: Vec<BandId>,
    pub group_footers: BTreeMap<u32, Vec<BandId>>,
    pub column_footers: Vec<BandId>,
    pub page_footers: Vec<BandId>,
    pub summaries: Vec<BandId>,
    /// Hidden accumulators for aggregate elements.
    pub aggregates: Vec<Variable>,
}

impl ExecutionPlan {
    pub fn build(def: &ReportDefinition) -> Result<Self, DefinitionError> {
        let mut plan = ExecutionPlan::default();
        let mut detail_position = 0;
        for (i, band) in def.bands.iter().enumerate() {
            let id = plan.add_band(band, None, &format!("{}", i), 0)?;
            if band.band_type == BandType::Detail {
                detail_position += 1;
                plan.bands[id].detail_number.get_or_insert(detail_position);
            }
        }
        plan.details
            .sort_by_key(|id| plan.bands[*id].detail_number.unwrap_or(0));
        Ok(plan)
    }

    pub fn band(&self, id: BandId) -> &PlannedBand {
        &self.bands[id]
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Header bands for a group level, in definition order.
    pub fn group_headers(&self, level: u32) -> &[BandId] {
        self.group_headers.get(&level).map_or(&[], Vec::as_slice)
    }

    pub fn group_footers(&self, level: u32) -> &[BandId] {
        self.group_footers.get(&level).map_or(&[], Vec::as_slice)
    }

    fn add_band(
        &mut self,
        band: &Band,
        parent: Option<BandType>,
        path: &str,
        depth: u32,
    ) -> Result<BandId, DefinitionError> {
        let name = band
            .name
            .clone()
            .unwrap_or_else(|| format!("{}#{}", band.band_type, path));

        let mut elements = Vec::with_capacity(band.elements.len());
        for (i, element) in band.elements.iter().enumerate() {
            elements.push(self.compile_element(band, &name, path, element, i)?);
        }

        let id = self.bands.len();
        self.bands.push(PlannedBand {
            name,
            band_type: band.band_type,
            group_level: band.group_level,
            detail_number: band.detail_number,
            depth,
            elements,
            layout: band.layout.clone(),
            on_entry: band.on_entry.clone(),
            on_exit: band.on_exit.clone(),
            page_break_before: band.option_flag("page_break_before"),
            children: Vec::new(),
        });

        if is_scheduled(parent, band.band_type) {
            self.schedule(id);
        }

        let mut detail_position = 0;
        for (i, child) in band.bands.iter().enumerate() {
            let child_path = format!("{}.{}", path, i);
            let scheduled = is_scheduled(Some(band.band_type), child.band_type);
            let child_depth = if scheduled { depth } else { depth + 1 };
            let child_id = self.add_band(child, Some(band.band_type), &child_path, child_depth)?;
            if child.band_type == BandType::Detail {
                detail_position += 1;
                self.bands[child_id].detail_number.get_or_insert(detail_position);
            }
            if !scheduled {
                self.bands[id].children.push(child_id);
            }
        }

        Ok(id)
    }

    fn schedule(&mut self, id: BandId) {
        let band = &self.bands[id];
        let level = band.group_level.unwrap_or(0);
        match band.band_type {
            BandType::Title => self.titles.push(id),
            BandType::PageHeader => self.page_headers.push(id),
            BandType::ColumnHeader => self.column_headers.push(id),
            BandType::GroupHeader => self.group_headers.entry(level).or_default().push(id),
            BandType::DetailHeader => self.detail_headers.push(id),
            BandType::Detail => self.details.push(id),
            BandType::DetailFooter => self.detail_footers.push(id),
            BandType::GroupFooter => self.group_footers.entry(level).or_default().push(id),
            BandType::ColumnFooter => self.column_footers.push(id),
            BandType::PageFooter => self.page_footers.push(id),
            BandType::Summary => self.summaries.push(id),
        }
    }

    fn compile_element(
        &mut self,
        band: &Band,
        band_name: &str,
        path: &str,
        element: &Element,
        index: usize,
    ) -> Result<CompiledElement, DefinitionError> {
        let key = element.key(index);
        let location = || format!("band '{}' element '{}'", band_name, key);

        let expression = match element.kind {
            ElementType::Expression | ElementType::Aggregate => {
                let source = element.source.as_deref().unwrap_or("");
                Some(
                    Expression::parse(source).map_err(|source| DefinitionError::Expression {
                        location: location(),
                        source,
                    })?,
                )
            }
            _ => None,
        };

        let mut aggregate_var = None;
        if element.kind == ElementType::Aggregate {
            let function = element.function.as_deref().unwrap_or("");
            let kind = VariableType::from_aggregate_function(function).ok_or_else(|| {
                DefinitionError::invalid(
                    location(),
                    format!("unknown aggregate function '{}'", function),
                )
            })?;

            let (scope, reset_group) = aggregate_scope(band, element);
            // keyed by tree path: band names need not be unique
            let name = format!("#agg:{}/{}", path, key);
            let mut variable = Variable::new(&name, kind, expression.clone());
            variable.reset_on = scope;
            variable.reset_group = reset_group;
            self.aggregates.push(variable);
            aggregate_var = Some(name);
        }

        Ok(CompiledElement {
            key,
            element: element.clone(),
            expression,
            aggregate_var,
        })
    }
}

/// Explicit scope on the element, else implied by the enclosing band.
fn aggregate_scope(band: &Band, element: &Element) -> (ResetScope, Option<u32>) {
    match element.reset_on {
        Some(ResetScope::Group) => (
            ResetScope::Group,
            element.reset_group.or(band.group_level),
        ),
        Some(scope) => (scope, None),
        None if band.band_type.is_group_band() => (ResetScope::Group, band.group_level),
        None if band.band_type.is_page_band() => (ResetScope::Page, None),
        None => (ResetScope::Report, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Group;

    fn grouped() -> ReportDefinition {
        ReportDefinition {
            name: "sales".to_string(),
            title: None,
            resource: None,
            bands: vec![
                Band::new(BandType::Title),
                Band::new(BandType::GroupHeader)
                    .with_group_level(1)
                    .with_child(Band::new(BandType::Detail).named("second").with_detail_number(2))
                    .with_child(Band::new(BandType::Detail).named("first").with_detail_number(1))
                    .with_child(
                        Band::new(BandType::ColumnHeader)
                            .named("inline")
                            .with_child(Band::new(BandType::PageFooter).named("nested")),
                    ),
                Band::new(BandType::GroupFooter)
                    .with_group_level(1)
                    .with_element(Element::aggregate("sum", "amount").named("total")),
                Band::new(BandType::Summary),
            ],
            variables: Vec::new(),
            groups: vec![Group::new(1, vec![Expression::parse("region").unwrap()])],
            parameters: Vec::new(),
        }
    }

    #[test]
    fn scheduling_rule() {
        assert!(is_scheduled(None, BandType::PageFooter));
        assert!(is_scheduled(Some(BandType::GroupHeader), BandType::Detail));
        assert!(is_scheduled(Some(BandType::GroupFooter), BandType::GroupHeader));
        assert!(!is_scheduled(Some(BandType::GroupHeader), BandType::PageHeader));
        assert!(!is_scheduled(Some(BandType::Detail), BandType::Detail));
    }

    #[test]
    fn scheduled_bands_land_in_slots() {
        let plan = ExecutionPlan::build(&grouped()).unwrap();
        assert_eq!(plan.titles.len(), 1);
        assert_eq!(plan.summaries.len(), 1);
        assert_eq!(plan.group_headers(1).len(), 1);
        assert_eq!(plan.group_footers(1).len(), 1);
        assert!(plan.group_headers(2).is_empty());

        let names: Vec<&str> = plan.details.iter().map(|id| plan.band(*id).name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn inline_children_hang_off_their_parent() {
        let plan = ExecutionPlan::build(&grouped()).unwrap();
        let header = plan.band(plan.group_headers(1)[0]);
        assert_eq!(header.children.len(), 1);

        let inline = plan.band(header.children[0]);
        assert_eq!(inline.name, "inline");
        assert_eq!(inline.depth, 1);
        // anything under a non-group band is inline too
        assert_eq!(inline.children.len(), 1);
        assert_eq!(plan.band(inline.children[0]).depth, 2);
        assert_eq!(plan.details.len(), 2);
    }

    #[test]
    fn generated_names_follow_the_tree_path() {
        let plan = ExecutionPlan::build(&grouped()).unwrap();
        assert_eq!(plan.band(plan.titles[0]).name, "title#0");
        assert_eq!(plan.band(plan.summaries[0]).name, "summary#3");
    }

    #[test]
    fn aggregates_get_hidden_group_scoped_variables() {
        let plan = ExecutionPlan::build(&grouped()).unwrap();
        assert_eq!(plan.aggregates.len(), 1);
        let variable = &plan.aggregates[0];
        assert_eq!(variable.name, "#agg:2/total");
        assert_eq!(variable.kind, VariableType::Sum);
        assert_eq!(variable.reset_on, ResetScope::Group);
        assert_eq!(variable.reset_group, Some(1));

        let footer = plan.band(plan.group_footers(1)[0]);
        assert_eq!(
            footer.elements[0].aggregate_var.as_deref(),
            Some("#agg:2/total")
        );
    }

    #[test]
    fn aggregate_scope_follows_band_type() {
        let element = Element::aggregate("count", "amount");
        assert_eq!(
            aggregate_scope(&Band::new(BandType::PageFooter), &element),
            (ResetScope::Page, None)
        );
        assert_eq!(
            aggregate_scope(&Band::new(BandType::Summary), &element),
            (ResetScope::Report, None)
        );
        let mut explicit = element.clone();
        explicit.reset_on = Some(ResetScope::Detail);
        assert_eq!(
            aggregate_scope(&Band::new(BandType::Summary), &explicit),
            (ResetScope::Detail, None)
        );
    }
}
