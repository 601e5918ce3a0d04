//! FILENAME: core/expr-engine/src/context.rs
//! PURPOSE: The evaluation context handed to an Evaluator.
//! CONTEXT: Holds the current row (absent for bands that fire outside a
//! row, such as the title), a read-only view of the report variables,
//! the report parameters and the active locale.

use crate::row::Row;
use crate::value::Value;
use rustc_hash::FxHashMap;

/// Resolved report parameters, by name.
pub type Parameters = FxHashMap<String, Value>;

/// Read access to the current variable values.
pub trait VariableLookup {
    /// Returns the current value, or None if no such variable exists.
    fn lookup(&self, name: &str) -> Option<Value>;
}

/// A lookup with no variables, for contexts evaluated outside a report run.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVariables;

impl VariableLookup for NoVariables {
    fn lookup(&self, _name: &str) -> Option<Value> {
        None
    }
}

impl VariableLookup for FxHashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

pub struct EvalContext<'a> {
    pub row: Option<&'a Row>,
    pub variables: &'a dyn VariableLookup,
    pub parameters: &'a Parameters,
    pub locale: &'a str,
}

impl<'a> EvalContext<'a> {
    pub fn new(variables: &'a dyn VariableLookup, parameters: &'a Parameters) -> Self {
        EvalContext {
            row: None,
            variables,
            parameters,
            locale: "en",
        }
    }

    pub fn with_row(mut self, row: Option<&'a Row>) -> Self {
        self.row = row;
        self
    }

    pub fn with_locale(mut self, locale: &'a str) -> Self {
        self.locale = locale;
        self
    }
}
