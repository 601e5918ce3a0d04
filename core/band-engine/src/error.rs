//! FILENAME: core/band-engine/src/error.rs
//! PURPOSE: Error types for definition loading and report execution.
//! CONTEXT: Every execution error is fatal to that execution. Errors raised
//! while a band is firing carry an `ErrorContext` naming the band, row,
//! element or variable involved, so a caller can diagnose a failed run
//! from the single terminal error it receives.

use crate::sink::SinkError;
use crate::source::RowSourceError;
use expr_engine::{CycleError, EvalError, FormatError, ParseError};
use layout_ir::IrError;
use thiserror::Error;

/// A malformed definition. Raised at load time; the engine fails closed.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read report definition: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid expression in {location}: {source}")]
    Expression {
        location: String,
        #[source]
        source: ParseError,
    },

    #[error("invalid report definition at {location}: {message}")]
    Invalid { location: String, message: String },

    #[error("variables depend on each other in a cycle: {0}")]
    Cycle(#[from] CycleError),
}

impl DefinitionError {
    pub fn invalid(location: impl Into<String>, message: impl Into<String>) -> Self {
        DefinitionError::Invalid {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Where in the report an execution error happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub band: Option<String>,
    pub row_index: Option<u64>,
    pub element: Option<String>,
    pub variable: Option<String>,
}

impl ErrorContext {
    pub fn band(name: &str, row_index: Option<u64>) -> Self {
        ErrorContext {
            band: Some(name.to_string()),
            row_index,
            ..ErrorContext::default()
        }
    }

    pub fn variable(name: &str, row_index: Option<u64>) -> Self {
        ErrorContext {
            variable: Some(name.to_string()),
            row_index,
            ..ErrorContext::default()
        }
    }

    pub fn with_element(mut self, key: &str) -> Self {
        self.element = Some(key.to_string());
        self
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(band) = &self.band {
            parts.push(format!("band '{}'", band));
        }
        if let Some(element) = &self.element {
            parts.push(format!("element '{}'", element));
        }
        if let Some(variable) = &self.variable {
            parts.push(format!("variable '{}'", variable));
        }
        if let Some(row) = self.row_index {
            parts.push(format!("row {}", row));
        }
        if parts.is_empty() {
            Ok(())
        } else {
            write!(f, " [{}]", parts.join(", "))
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("row source failed at row {row_index}: {source}")]
    RowSource {
        row_index: u64,
        #[source]
        source: RowSourceError,
    },

    #[error("evaluation failed{context}: {source}")]
    Eval {
        context: ErrorContext,
        #[source]
        source: EvalError,
    },

    #[error("formatting failed{context}: {source}")]
    Format {
        context: ErrorContext,
        #[source]
        source: FormatError,
    },

    #[error("layout construction failed{context}: {source}")]
    Overlap {
        context: ErrorContext,
        #[source]
        source: IrError,
    },

    #[error("execution cancelled after {records} row(s)")]
    Cancelled { records: u64 },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("parameter error: {0}")]
    Parameter(String),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl ReportError {
    pub fn eval(context: ErrorContext, source: EvalError) -> Self {
        ReportError::Eval { context, source }
    }

    /// The diagnostic context, for errors raised inside a band.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            ReportError::Eval { context, .. }
            | ReportError::Format { context, .. }
            | ReportError::Overlap { context, .. } => Some(context),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_rendered_into_message() {
        let err = ReportError::eval(
            ErrorContext::band("detail", Some(4)).with_element("amount"),
            EvalError::DivisionByZero,
        );
        assert_eq!(
            err.to_string(),
            "evaluation failed [band 'detail', element 'amount', row 4]: division by zero"
        );
    }

    #[test]
    fn empty_context_renders_nothing() {
        assert_eq!(ErrorContext::default().to_string(), "");
    }
}
