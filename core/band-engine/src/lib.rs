//! FILENAME: core/band-engine/src/lib.rs
//! PURPOSE: Main library entry point for banded report execution.
//! CONTEXT: Turns a report definition plus a streamed row source into a
//! sequence of band layouts. The definition is validated and planned once;
//! each execution then drives bands through their lifecycle (title, page
//! and column headers, group headers and footers, details, summary) while
//! accumulating variables and detecting group breaks.
//!
//! PIPELINE: ReportDefinition --> validate --> ExecutionPlan
//!           RowSource --> BandProcessor --> BandOutput --> ReportSink

mod compose;
pub mod definition;
mod elements;
mod env;
pub mod error;
pub mod execution;
pub mod groups;
pub mod options;
pub mod plan;
mod processor;
pub mod sink;
pub mod source;
mod validate;
pub mod variables;

// Re-export commonly used types at the crate root
pub use definition::{
    Band, BandLayout, BandType, CellSpec, Element, ElementType, Group, LayoutRowSpec, Parameter,
    ReportDefinition, ResetScope, Variable, VariableType,
};
pub use error::{DefinitionError, ErrorContext, ReportError};
pub use execution::{CancellationToken, ExecutionRequest, ReportEngine};
pub use groups::{GroupBreak, GroupKey, GroupProcessor};
pub use options::{CancelPolicy, ExecutionOptions};
pub use plan::{BandId, ExecutionPlan};
pub use sink::{CountingSink, DocumentCollector, ReportSink, SinkError};
pub use source::{IterSource, JsonLinesSource, RowSource, RowSourceError, TryIterSource};
pub use variables::{ResetTrigger, VariableState};

pub use layout_ir::{Activation, BandOutput, DocumentMetadata, ReportDocument};
