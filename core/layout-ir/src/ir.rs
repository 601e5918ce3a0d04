//! FILENAME: core/layout-ir/src/ir.rs
//! Layout IR - the format-agnostic tree handed to renderers.
//!
//! A band activation produces one `Layout`. A layout is a grid, table or
//! stack whose children are rows (of positioned, spanned cells) or nested
//! layouts. Cells hold an ordered list of content nodes.
//!
//! The tree is built once per activation and never mutated afterwards.
//! Every renderer walks the same tree, which is what keeps HTML, JSON and
//! the PDF backend structurally identical.

use crate::error::{IrError, OverlapError};
use expr_engine::{FormatSpec, Value};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form properties and styles. Ordered so output is deterministic.
pub type Properties = BTreeMap<String, Value>;

// ============================================================================
// LAYOUT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    #[default]
    Grid,
    Table,
    Stack,
}

impl LayoutKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayoutKind::Grid => "grid",
            LayoutKind::Table => "table",
            LayoutKind::Stack => "stack",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Layout {
    pub kind: LayoutKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
    pub children: Vec<LayoutChild>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum LayoutChild {
    Row(Row),
    Layout(Layout),
}

impl Layout {
    pub fn new(kind: LayoutKind) -> Self {
        Layout {
            kind,
            properties: Properties::new(),
            children: Vec::new(),
        }
    }

    /// Direct child rows, in order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.children.iter().filter_map(|child| match child {
            LayoutChild::Row(row) => Some(row),
            LayoutChild::Layout(_) => None,
        })
    }

    /// Total number of cells in this layout and every nested layout.
    pub fn cell_count(&self) -> usize {
        let mut count = 0;
        self.walk_cells(&mut |_| count += 1);
        count
    }

    /// Visits every cell depth-first, including cells of nested layouts.
    pub fn walk_cells<'a>(&'a self, visit: &mut dyn FnMut(&'a Cell)) {
        for child in &self.children {
            match child {
                LayoutChild::Row(row) => {
                    for cell in &row.cells {
                        visit(cell);
                        for content in &cell.contents {
                            if let Content::NestedLayout { layout } = content {
                                layout.walk_cells(visit);
                            }
                        }
                    }
                }
                LayoutChild::Layout(layout) => layout.walk_cells(visit),
            }
        }
    }

    /// Checks spans and cell overlap for this layout and all nested layouts.
    /// Each layout is its own coordinate space.
    pub fn validate(&self) -> Result<(), IrError> {
        let mut occupancy = Occupancy::default();
        for child in &self.children {
            match child {
                LayoutChild::Row(row) => {
                    for cell in &row.cells {
                        occupancy.claim(cell)?;
                        for content in &cell.contents {
                            if let Content::NestedLayout { layout } = content {
                                layout.validate()?;
                            }
                        }
                    }
                }
                LayoutChild::Layout(layout) => layout.validate()?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// ROW AND CELL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Row {
    pub index: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(index: u32) -> Self {
        Row {
            index,
            properties: Properties::new(),
            cells: Vec::new(),
        }
    }
}

/// Zero-based (col, row) anchor of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct CellPosition {
    pub col: u32,
    pub row: u32,
}

impl std::fmt::Display for CellPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub colspan: u32,
    pub rowspan: u32,
}

impl Default for Span {
    fn default() -> Self {
        Span {
            colspan: 1,
            rowspan: 1,
        }
    }
}

/// Element geometry, passed through untouched for the typesetting backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub position: CellPosition,
    #[serde(default)]
    pub span: Span,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<Frame>,
    pub contents: Vec<Content>,
}

impl Cell {
    pub fn new(col: u32, row: u32) -> Self {
        Cell {
            position: CellPosition { col, row },
            span: Span::default(),
            properties: Properties::new(),
            frame: None,
            contents: Vec::new(),
        }
    }

    pub fn with_span(mut self, colspan: u32, rowspan: u32) -> Self {
        self.span = Span { colspan, rowspan };
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_frame(mut self, frame: Option<Frame>) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_content(mut self, content: Content) -> Self {
        self.contents.push(content);
        self
    }

    /// Every (col, row) position covered by this cell, row-major.
    pub fn occupied_positions(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let CellPosition { col, row } = self.position;
        (row..row.saturating_add(self.span.rowspan)).flat_map(move |r| {
            (col..col.saturating_add(self.span.colspan)).map(move |c| (c, r))
        })
    }
}

// ============================================================================
// CONTENT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Line,
    Box,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Static text.
    Label {
        text: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        style: Properties,
    },
    /// A data-bound value with its formatted rendering.
    Field {
        source: String,
        value: Value,
        formatted: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<FormatSpec>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        style: Properties,
    },
    NestedLayout { layout: Layout },
    /// Layout-only line or box.
    Shape {
        shape: ShapeKind,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        style: Properties,
    },
    Image {
        source: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        style: Properties,
    },
}

impl Content {
    pub fn label(text: impl Into<String>) -> Self {
        Content::Label {
            text: text.into(),
            style: Properties::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Content::Label { .. } => "label",
            Content::Field { .. } => "field",
            Content::NestedLayout { .. } => "nested_layout",
            Content::Shape { .. } => "shape",
            Content::Image { .. } => "image",
        }
    }
}

// ============================================================================
// OCCUPANCY
// ============================================================================

/// Tracks which grid positions are taken within one layout.
#[derive(Debug, Default)]
pub(crate) struct Occupancy {
    taken: FxHashMap<(u32, u32), CellPosition>,
}

impl Occupancy {
    /// Claims every position of `cell`, failing on the first conflict.
    pub(crate) fn claim(&mut self, cell: &Cell) -> Result<(), IrError> {
        if cell.span.colspan == 0 || cell.span.rowspan == 0 {
            return Err(IrError::InvalidSpan {
                position: cell.position,
                colspan: cell.span.colspan,
                rowspan: cell.span.rowspan,
            });
        }

        // Check before inserting so a failed claim leaves no partial state
        if let Some(((col, row), first)) = cell
            .occupied_positions()
            .find_map(|pos| self.taken.get(&pos).map(|first| (pos, *first)))
        {
            return Err(OverlapError {
                col,
                row,
                first,
                second: cell.position,
            }
            .into());
        }

        for pos in cell.occupied_positions() {
            self.taken.insert(pos, cell.position);
        }
        Ok(())
    }
}
