//! FILENAME: core/layout-ir/src/error.rs
//! PURPOSE: Errors raised while building or validating a layout tree.

use crate::ir::CellPosition;
use thiserror::Error;

/// Two cells claim the same grid position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cell at {second} overlaps cell at {first} (both occupy column {col}, row {row})")]
pub struct OverlapError {
    /// Column of the first conflicting position.
    pub col: u32,
    /// Row of the first conflicting position.
    pub row: u32,
    /// Anchor of the cell that claimed the position first.
    pub first: CellPosition,
    /// Anchor of the cell that tried to claim it again.
    pub second: CellPosition,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    #[error(transparent)]
    Overlap(#[from] OverlapError),

    #[error("invalid span {colspan}x{rowspan} for cell at {position}: spans must be at least 1")]
    InvalidSpan {
        position: CellPosition,
        colspan: u32,
        rowspan: u32,
    },
}
