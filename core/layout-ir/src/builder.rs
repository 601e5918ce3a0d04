//! FILENAME: core/layout-ir/src/builder.rs
//! PURPOSE: Incremental construction of layouts with overlap detection.
//! CONTEXT: Band composition builds one layout per activation through these
//! builders. Overlap and span checks happen as rows are added, so a bad
//! placement fails at construction time with the offending cell named.

use crate::error::IrError;
use crate::ir::{Cell, Layout, LayoutChild, LayoutKind, Occupancy, Properties, Row};
use expr_engine::Value;

/// Builds a `Layout`, checking each row's cells against everything placed so far.
#[derive(Debug, Default)]
pub struct LayoutBuilder {
    kind: LayoutKind,
    properties: Properties,
    children: Vec<LayoutChild>,
    occupancy: Occupancy,
    next_row_index: u32,
}

impl LayoutBuilder {
    pub fn new(kind: LayoutKind) -> Self {
        LayoutBuilder {
            kind,
            ..LayoutBuilder::default()
        }
    }

    pub fn grid() -> Self {
        LayoutBuilder::new(LayoutKind::Grid)
    }

    pub fn table() -> Self {
        LayoutBuilder::new(LayoutKind::Table)
    }

    pub fn stack() -> Self {
        LayoutBuilder::new(LayoutKind::Stack)
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn set_properties(&mut self, properties: Properties) {
        self.properties.extend(properties);
    }

    /// Starts a new row. Row indexes are assigned in insertion order.
    pub fn begin_row(&mut self) -> RowBuilder<'_> {
        let index = self.next_row_index;
        RowBuilder {
            layout: self,
            row: Row::new(index),
        }
    }

    /// Adds a complete row, validating all of its cells.
    pub fn push_row(&mut self, mut row: Row) -> Result<(), IrError> {
        for cell in &row.cells {
            self.occupancy.claim(cell)?;
        }
        row.index = self.next_row_index;
        self.next_row_index += 1;
        self.children.push(LayoutChild::Row(row));
        Ok(())
    }

    pub fn build(self) -> Layout {
        Layout {
            kind: self.kind,
            properties: self.properties,
            children: self.children,
        }
    }
}

/// Collects the cells of one row; `finish` hands the row to its layout.
pub struct RowBuilder<'a> {
    layout: &'a mut LayoutBuilder,
    row: Row,
}

impl<'a> RowBuilder<'a> {
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.row.properties.insert(key.into(), value.into());
        self
    }

    pub fn cell(mut self, cell: Cell) -> Self {
        self.row.cells.push(cell);
        self
    }

    pub fn finish(self) -> Result<(), IrError> {
        self.layout.push_row(self.row)
    }
}
