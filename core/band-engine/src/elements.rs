//! FILENAME: core/band-engine/src/elements.rs
//! PURPOSE: Renders one element against the current row and variables.
//! CONTEXT: Called by band composition for each element of a firing band.
//! Returns `None` when the element's conditional suppresses it. All
//! evaluation and formatting failures are fatal and carry the band,
//! element and row that produced them.

use crate::definition::{ElementType, VariableType};
use crate::env::EvalEnv;
use crate::error::{DefinitionError, ErrorContext, ReportError};
use crate::plan::{CompiledElement, PlannedBand};
use crate::variables::VariableState;
use expr_engine::{FormatSpec, Row, Value};
use layout_ir::{Content, Properties, ShapeKind};
use rustc_hash::FxHashSet;

/// Non-fatal diagnostics, de-duplicated and capped.
#[derive(Debug, Default)]
pub(crate) struct Warnings {
    list: Vec<String>,
    seen: FxHashSet<String>,
    cap: usize,
}

impl Warnings {
    pub fn new(cap: usize) -> Self {
        Warnings {
            cap,
            ..Warnings::default()
        }
    }

    pub fn push(&mut self, message: String) {
        if self.list.len() >= self.cap || self.seen.contains(&message) {
            return;
        }
        log::warn!(target: "BAND", "{}", message);
        self.seen.insert(message.clone());
        self.list.push(message);
    }

    pub fn into_vec(self) -> Vec<String> {
        self.list
    }
}

pub(crate) struct ElementRenderer<'e, 'a> {
    env: &'e EvalEnv<'a>,
}

impl<'e, 'a> ElementRenderer<'e, 'a> {
    pub fn new(env: &'e EvalEnv<'a>) -> Self {
        ElementRenderer { env }
    }

    pub fn render(
        &self,
        band: &PlannedBand,
        compiled: &CompiledElement,
        row: Option<&Row>,
        row_index: Option<u64>,
        variables: &VariableState,
        warnings: &mut Warnings,
    ) -> Result<Option<Content>, ReportError> {
        let element = &compiled.element;
        let context = || ErrorContext::band(&band.name, row_index).with_element(&compiled.key);
        let eval_ctx = self.env.context(row, variables);

        if let Some(conditional) = &element.conditional {
            for path in conditional.field_paths() {
                if row.and_then(|r| r.resolve(path)).is_none() {
                    warnings.push(format!(
                        "conditional of element '{}' in band '{}' references missing field '{}'",
                        compiled.key, band.name, path
                    ));
                }
            }
            let visible = self
                .env
                .evaluator
                .evaluate(conditional, &eval_ctx)
                .map_err(|e| ReportError::eval(context(), e))?;
            if !visible.is_truthy() {
                return Ok(None);
            }
        }

        let style = element.style.clone();
        let content = match element.kind {
            ElementType::Label => Content::Label {
                text: element.source.clone().unwrap_or_default(),
                style,
            },
            ElementType::Field => {
                let path = element.source.as_deref().unwrap_or_default();
                let value = row
                    .and_then(|r| r.resolve(path))
                    .cloned()
                    .unwrap_or_default();
                self.field(path, value, element.format.as_ref(), style, context)?
            }
            ElementType::Expression => {
                let Some(expr) = &compiled.expression else {
                    return Err(missing_source(&band.name, &compiled.key, "expression"));
                };
                let value = self
                    .env
                    .evaluator
                    .evaluate(expr, &eval_ctx)
                    .map_err(|e| ReportError::eval(context(), e))?;
                self.field(expr.source(), value, element.format.as_ref(), style, context)?
            }
            ElementType::Aggregate => {
                let function = element.function.as_deref().unwrap_or_default();
                if VariableType::from_aggregate_function(function).is_none() {
                    return Err(ReportError::Definition(DefinitionError::invalid(
                        format!("band '{}' element '{}'", band.name, compiled.key),
                        format!("unknown aggregate function '{}'", function),
                    )));
                }
                let (Some(expr), Some(var)) = (&compiled.expression, &compiled.aggregate_var)
                else {
                    return Err(missing_source(&band.name, &compiled.key, "aggregate"));
                };
                let value = variables.value(var)?;
                let source = format!("{}({})", function.to_ascii_lowercase(), expr.source());
                self.field(&source, value, element.format.as_ref(), style, context)?
            }
            ElementType::Line => Content::Shape {
                shape: ShapeKind::Line,
                style,
            },
            ElementType::Box => Content::Shape {
                shape: ShapeKind::Box,
                style,
            },
            ElementType::Image => Content::Image {
                source: element.source.clone().unwrap_or_default(),
                style,
            },
        };

        Ok(Some(content))
    }

    fn field(
        &self,
        source: &str,
        value: Value,
        format: Option<&FormatSpec>,
        style: Properties,
        context: impl Fn() -> ErrorContext,
    ) -> Result<Content, ReportError> {
        let formatted = self
            .env
            .formatter
            .format(&value, format, self.env.locale)
            .map_err(|source| ReportError::Format {
                context: context(),
                source,
            })?;
        Ok(Content::Field {
            source: source.to_string(),
            value,
            formatted,
            format: format.cloned(),
            style,
        })
    }
}

fn missing_source(band: &str, key: &str, kind: &str) -> ReportError {
    ReportError::Definition(DefinitionError::invalid(
        format!("band '{}' element '{}'", band, key),
        format!("a {} element needs a source", kind),
    ))
}
