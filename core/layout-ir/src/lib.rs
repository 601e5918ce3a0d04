//! FILENAME: core/layout-ir/src/lib.rs
//! Layout intermediate representation for banded reports.
//!
//! Layers:
//! - `ir`: the layout tree (layouts, rows, spanned cells, content nodes)
//! - `builder`: incremental construction with overlap detection
//! - `document`: band output fragments and the finished report document
//! - `error`: overlap and span errors

pub mod builder;
pub mod document;
pub mod error;
pub mod ir;

pub use builder::{LayoutBuilder, RowBuilder};
pub use document::{Activation, BandOutput, BandType, DocumentMetadata, ReportDocument};
pub use error::{IrError, OverlapError};
pub use ir::{
    Cell, CellPosition, Content, Frame, Layout, LayoutChild, LayoutKind, Properties, Row,
    ShapeKind, Span,
};
