//! FILENAME: core/expr-engine/src/lib.rs
//! PURPOSE: Main library entry point for expression evaluation and formatting.
//! CONTEXT: Defines the collaborator interfaces the band engine consumes
//! (`Evaluator`, `Formatter`, `VariableLookup`) together with the standard
//! implementations, and the shared `Value`/`Row` data types.

pub mod context;
pub mod dependency_graph;
pub mod evaluator;
pub mod expression;
pub mod format;
pub mod row;
pub mod value;

// Re-export commonly used types at the crate root
pub use context::{EvalContext, NoVariables, Parameters, VariableLookup};
pub use dependency_graph::{CycleError, DependencyGraph};
pub use evaluator::{EvalError, Evaluator, StandardEvaluator};
pub use expression::Expression;
pub use format::{CurrencyPosition, FormatError, FormatSpec, Formatter, LocaleSymbols, StandardFormatter};
pub use row::Row;
pub use value::Value;

pub use expr_parser::ParseError;
