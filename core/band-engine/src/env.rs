//! FILENAME: core/band-engine/src/env.rs
//! PURPOSE: The per-execution collaborator bundle.

use expr_engine::{EvalContext, Evaluator, Formatter, Parameters, Row, VariableLookup};

/// Everything an expression needs besides the row and the variables.
#[derive(Clone, Copy)]
pub(crate) struct EvalEnv<'a> {
    pub evaluator: &'a dyn Evaluator,
    pub formatter: &'a dyn Formatter,
    pub parameters: &'a Parameters,
    pub locale: &'a str,
}

impl<'a> EvalEnv<'a> {
    pub fn context<'b>(
        &'b self,
        row: Option<&'b Row>,
        variables: &'b dyn VariableLookup,
    ) -> EvalContext<'b> {
        EvalContext::new(variables, self.parameters)
            .with_row(row)
            .with_locale(self.locale)
    }
}
