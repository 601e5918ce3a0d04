//! FILENAME: core/band-engine/src/definition.rs
//! Report Definition - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE a report.
//! These structures are designed to be:
//! - Deserializable from JSON (expressions are written as strings)
//! - Validated once at load time, then shared read-only
//! - Immutable snapshots of the report author's intent

use crate::error::DefinitionError;
use expr_engine::{Expression, FormatSpec, Value};
use layout_ir::{Frame, LayoutKind, Properties};
use serde::{Deserialize, Serialize};

pub use layout_ir::BandType;

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Identifier of the resource that drives the row source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Top-level bands in definition order.
    pub bands: Vec<Band>,

    /// Variables in evaluation order.
    #[serde(default)]
    pub variables: Vec<Variable>,

    /// Groups, level 1 (outermost) to N (innermost).
    #[serde(default)]
    pub groups: Vec<Group>,

    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl ReportDefinition {
    /// Parses and validates a definition from JSON.
    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        let definition: ReportDefinition = serde_json::from_str(json)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Converts and validates a definition from an already-parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, DefinitionError> {
        let definition: ReportDefinition = serde_json::from_value(value)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Fails closed on anything the engine cannot execute unambiguously.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        crate::validate::validate(self)
    }

    pub fn group(&self, level: u32) -> Option<&Group> {
        self.groups.iter().find(|g| g.level == level)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }
}

// ============================================================================
// BANDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "type")]
    pub band_type: BandType,

    /// Required for group_header/group_footer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_level: Option<u32>,

    /// Ordering among sibling detail bands, starting at 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_number: Option<u32>,

    /// Child bands (recursive).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bands: Vec<Band>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<Element>,

    /// Explicit cell placement. Without one, elements fill a single grid row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<BandLayout>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_entry: Option<Expression>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_exit: Option<Expression>,

    /// Free-form options. `page_break_before` is understood on group headers.
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub options: Properties,
}

impl Band {
    pub fn new(band_type: BandType) -> Self {
        Band {
            name: None,
            band_type,
            group_level: None,
            detail_number: None,
            bands: Vec::new(),
            elements: Vec::new(),
            layout: None,
            on_entry: None,
            on_exit: None,
            options: Properties::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_group_level(mut self, level: u32) -> Self {
        self.group_level = Some(level);
        self
    }

    pub fn with_detail_number(mut self, number: u32) -> Self {
        self.detail_number = Some(number);
        self
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_child(mut self, band: Band) -> Self {
        self.bands.push(band);
        self
    }

    pub fn with_option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    /// True if the named option is set to a truthy value.
    pub fn option_flag(&self, key: &str) -> bool {
        self.options.get(key).map_or(false, Value::is_truthy)
    }
}

/// Explicit layout of a band's elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BandLayout {
    #[serde(default)]
    pub kind: LayoutKind,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
    pub rows: Vec<LayoutRowSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LayoutRowSpec {
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
    pub cells: Vec<CellSpec>,
}

/// Places elements (by key) or a nested layout at a grid position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<BandLayout>,
    pub col: u32,
    pub row: u32,
    #[serde(default = "default_span")]
    pub colspan: u32,
    #[serde(default = "default_span")]
    pub rowspan: u32,
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

fn default_span() -> u32 {
    1
}

impl CellSpec {
    pub fn new(col: u32, row: u32) -> Self {
        CellSpec {
            elements: Vec::new(),
            layout: None,
            col,
            row,
            colspan: 1,
            rowspan: 1,
            properties: Properties::new(),
        }
    }

    pub fn with_element(mut self, key: &str) -> Self {
        self.elements.push(key.to_string());
        self
    }

    pub fn with_span(mut self, colspan: u32, rowspan: u32) -> Self {
        self.colspan = colspan;
        self.rowspan = rowspan;
        self
    }
}

// ============================================================================
// GROUPS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// 1-based, outer to inner.
    pub level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// A break occurs when the evaluated key tuple changes.
    pub keys: Vec<Expression>,
}

impl Group {
    pub fn new(level: u32, keys: Vec<Expression>) -> Self {
        Group {
            level,
            name: None,
            keys,
        }
    }
}

// ============================================================================
// VARIABLES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    Sum,
    Count,
    Average,
    Min,
    Max,
    Custom,
}

impl VariableType {
    pub fn name(&self) -> &'static str {
        match self {
            VariableType::Sum => "sum",
            VariableType::Count => "count",
            VariableType::Average => "average",
            VariableType::Min => "min",
            VariableType::Max => "max",
            VariableType::Custom => "custom",
        }
    }

    /// Aggregate elements accept every type except custom.
    pub fn from_aggregate_function(name: &str) -> Option<VariableType> {
        match name.to_ascii_lowercase().as_str() {
            "sum" => Some(VariableType::Sum),
            "count" => Some(VariableType::Count),
            "average" | "avg" => Some(VariableType::Average),
            "min" => Some(VariableType::Min),
            "max" => Some(VariableType::Max),
            _ => None,
        }
    }
}

/// The lifecycle event that re-initializes a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResetScope {
    Detail,
    Group,
    Page,
    #[default]
    Report,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: VariableType,

    /// Required unless the type is count (which then counts rows).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<Expression>,

    #[serde(default)]
    pub reset_on: ResetScope,

    /// Required when `reset_on` is group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_group: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<Value>,
}

impl Variable {
    pub fn new(name: &str, kind: VariableType, expression: Option<Expression>) -> Self {
        Variable {
            name: name.to_string(),
            kind,
            expression,
            reset_on: ResetScope::Report,
            reset_group: None,
            initial_value: None,
        }
    }

    pub fn reset_on(mut self, scope: ResetScope) -> Self {
        self.reset_on = scope;
        self
    }

    pub fn reset_on_group(mut self, level: u32) -> Self {
        self.reset_on = ResetScope::Group;
        self.reset_group = Some(level);
        self
    }

    pub fn with_initial_value(mut self, value: impl Into<Value>) -> Self {
        self.initial_value = Some(value.into());
        self
    }
}

// ============================================================================
// PARAMETERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub required: bool,
}

// ============================================================================
// ELEMENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Field,
    Label,
    Expression,
    Aggregate,
    Line,
    Box,
    Image,
}

impl ElementType {
    pub fn name(&self) -> &'static str {
        match self {
            ElementType::Field => "field",
            ElementType::Label => "label",
            ElementType::Expression => "expression",
            ElementType::Aggregate => "aggregate",
            ElementType::Line => "line",
            ElementType::Box => "box",
            ElementType::Image => "image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Key used by explicit layouts and error messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "type")]
    pub kind: ElementType,

    /// Field path, expression text, label text or image location,
    /// depending on `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Passed to the formatter as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatSpec>,

    /// Geometry for the typesetting backend. Not interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Frame>,

    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub style: Properties,

    /// Rendering is suppressed when this evaluates falsy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<Expression>,

    /// Aggregate elements: sum, count, average, min or max.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,

    /// Aggregate elements: overrides the scope implied by the band.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_on: Option<ResetScope>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_group: Option<u32>,
}

impl Element {
    fn new(kind: ElementType, source: Option<&str>) -> Self {
        Element {
            name: None,
            kind,
            source: source.map(str::to_string),
            format: None,
            position: None,
            style: Properties::new(),
            conditional: None,
            function: None,
            reset_on: None,
            reset_group: None,
        }
    }

    pub fn field(path: &str) -> Self {
        Element::new(ElementType::Field, Some(path))
    }

    pub fn label(text: &str) -> Self {
        Element::new(ElementType::Label, Some(text))
    }

    pub fn expression(source: &str) -> Self {
        Element::new(ElementType::Expression, Some(source))
    }

    pub fn aggregate(function: &str, source: &str) -> Self {
        let mut element = Element::new(ElementType::Aggregate, Some(source));
        element.function = Some(function.to_string());
        element
    }

    pub fn line() -> Self {
        Element::new(ElementType::Line, None)
    }

    pub fn rect() -> Self {
        Element::new(ElementType::Box, None)
    }

    pub fn image(location: &str) -> Self {
        Element::new(ElementType::Image, Some(location))
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_format(mut self, format: FormatSpec) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_position(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.position = Some(Frame {
            x,
            y,
            width,
            height,
        });
        self
    }

    pub fn with_style(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.style.insert(key.to_string(), value.into());
        self
    }

    pub fn with_conditional(mut self, conditional: Expression) -> Self {
        self.conditional = Some(conditional);
        self
    }

    /// The element's name, or "#<index>" for unnamed elements.
    pub fn key(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{}", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_band_tree() {
        let band: Band = serde_json::from_str(
            r#"{
                "type": "group_header",
                "group_level": 1,
                "options": {"page_break_before": true},
                "elements": [
                    {"type": "field", "source": "region", "name": "region"},
                    {"type": "aggregate", "function": "sum", "source": "amount"}
                ],
                "bands": [{"type": "detail", "detail_number": 1}]
            }"#,
        )
        .unwrap();

        assert_eq!(band.band_type, BandType::GroupHeader);
        assert_eq!(band.group_level, Some(1));
        assert!(band.option_flag("page_break_before"));
        assert_eq!(band.elements.len(), 2);
        assert_eq!(band.elements[1].function.as_deref(), Some("sum"));
        assert_eq!(band.bands[0].band_type, BandType::Detail);
    }

    #[test]
    fn variable_defaults_to_report_scope() {
        let variable: Variable =
            serde_json::from_str(r#"{"name": "total", "type": "sum", "expression": "amount"}"#)
                .unwrap();
        assert_eq!(variable.reset_on, ResetScope::Report);
        assert_eq!(variable.reset_group, None);
    }

    #[test]
    fn bad_expression_fails_to_deserialize() {
        let result: Result<Variable, _> =
            serde_json::from_str(r#"{"name": "total", "type": "sum", "expression": "amount +"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn element_keys() {
        assert_eq!(Element::label("x").key(3), "#3");
        assert_eq!(Element::label("x").named("caption").key(3), "caption");
    }

    #[test]
    fn aggregate_function_names() {
        assert_eq!(
            VariableType::from_aggregate_function("AVG"),
            Some(VariableType::Average)
        );
        assert_eq!(VariableType::from_aggregate_function("custom"), None);
        assert_eq!(VariableType::from_aggregate_function("median"), None);
    }
}
