//! FILENAME: core/expr-engine/src/evaluator.rs
//! PURPOSE: Evaluates report expressions against a row, variables and parameters.
//! CONTEXT: The band engine only depends on the `Evaluator` trait; this file
//! also provides `StandardEvaluator`, which walks the parser's AST.
//!
//! EMPTY SEMANTICS:
//! - A field path that does not resolve evaluates to Empty (not an error).
//! - Arithmetic and negation with an Empty operand yield Empty.
//! - Concatenation treats Empty as "".
//! - Empty equals only Empty; ordering comparisons involving Empty are false.
//! - Empty is falsy.
//!
//! Unknown variables and parameters ARE errors: they indicate a broken
//! definition rather than missing data.

use crate::context::EvalContext;
use crate::expression::Expression;
use crate::value::Value;
use expr_parser::{BinaryOperator, Expression as Ast, Function, UnaryOperator, Value as Literal};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("type mismatch in {operation}: expected {expected}, found {found}")]
    TypeMismatch {
        operation: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid argument to {function}: {message}")]
    InvalidArgument { function: String, message: String },

    #[error("{function} expects {expected} argument(s), found {found}")]
    ArityMismatch {
        function: String,
        expected: String,
        found: usize,
    },
}

impl EvalError {
    pub fn type_mismatch(operation: impl Into<String>, expected: &'static str, found: &Value) -> Self {
        EvalError::TypeMismatch {
            operation: operation.into(),
            expected,
            found: found.type_name(),
        }
    }
}

/// The expression-evaluation collaborator.
pub trait Evaluator {
    fn evaluate(&self, expr: &Expression, ctx: &EvalContext<'_>) -> Result<Value, EvalError>;
}

/// Reference evaluator for the built-in expression language.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardEvaluator;

impl StandardEvaluator {
    pub fn new() -> Self {
        StandardEvaluator
    }

    /// Evaluates a raw AST node.
    pub fn eval_ast(&self, expr: &Ast, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
        match expr {
            Ast::Literal(value) => Ok(self.eval_literal(value)),
            Ast::Field(path) => Ok(ctx
                .row
                .and_then(|row| row.resolve(path))
                .cloned()
                .unwrap_or(Value::Empty)),
            Ast::Variable(name) => ctx
                .variables
                .lookup(name)
                .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
            Ast::Parameter(name) => ctx
                .parameters
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UnknownParameter(name.clone())),
            Ast::BinaryOp { left, op, right } => self.eval_binary_op(left, *op, right, ctx),
            Ast::UnaryOp { op, operand } => self.eval_unary_op(*op, operand, ctx),
            Ast::FunctionCall { func, args } => self.eval_function(*func, args, ctx),
        }
    }

    fn eval_literal(&self, value: &Literal) -> Value {
        match value {
            Literal::Number(n) => Value::Number(*n),
            Literal::String(s) => Value::Text(s.clone()),
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Null => Value::Empty,
        }
    }

    // ========================================================================
    // OPERATORS
    // ========================================================================

    fn eval_binary_op(
        &self,
        left: &Ast,
        op: BinaryOperator,
        right: &Ast,
        ctx: &EvalContext<'_>,
    ) -> Result<Value, EvalError> {
        let left_val = self.eval_ast(left, ctx)?;
        let right_val = self.eval_ast(right, ctx)?;

        match op {
            BinaryOperator::Add
            | BinaryOperator::Subtract
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Power => self.eval_arithmetic(op, &left_val, &right_val),

            BinaryOperator::Concat => Ok(Value::Text(format!(
                "{}{}",
                left_val.as_text(),
                right_val.as_text()
            ))),

            BinaryOperator::Equal => Ok(Value::Boolean(values_equal(&left_val, &right_val))),
            BinaryOperator::NotEqual => Ok(Value::Boolean(!values_equal(&left_val, &right_val))),

            BinaryOperator::LessThan => self.eval_ordering(op, &left_val, &right_val, |o| {
                o == Ordering::Less
            }),
            BinaryOperator::GreaterThan => self.eval_ordering(op, &left_val, &right_val, |o| {
                o == Ordering::Greater
            }),
            BinaryOperator::LessEqual => self.eval_ordering(op, &left_val, &right_val, |o| {
                o != Ordering::Greater
            }),
            BinaryOperator::GreaterEqual => self.eval_ordering(op, &left_val, &right_val, |o| {
                o != Ordering::Less
            }),
        }
    }

    fn eval_arithmetic(
        &self,
        op: BinaryOperator,
        left: &Value,
        right: &Value,
    ) -> Result<Value, EvalError> {
        if left.is_empty() || right.is_empty() {
            return Ok(Value::Empty);
        }

        let operation = op.to_string();
        let l = left
            .as_number()
            .ok_or_else(|| EvalError::type_mismatch(operation.as_str(), "number", left))?;
        let r = right
            .as_number()
            .ok_or_else(|| EvalError::type_mismatch(operation.as_str(), "number", right))?;

        let result = match op {
            BinaryOperator::Add => l + r,
            BinaryOperator::Subtract => l - r,
            BinaryOperator::Multiply => l * r,
            BinaryOperator::Divide => {
                if r == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                l / r
            }
            BinaryOperator::Power => {
                let result = l.powf(r);
                if result.is_nan() || result.is_infinite() {
                    return Err(EvalError::InvalidArgument {
                        function: "^".to_string(),
                        message: format!("{} ^ {} is not a finite number", l, r),
                    });
                }
                result
            }
            other => {
                return Err(EvalError::InvalidArgument {
                    function: other.to_string(),
                    message: "not an arithmetic operator".to_string(),
                })
            }
        };

        Ok(Value::Number(result))
    }

    fn eval_ordering(
        &self,
        op: BinaryOperator,
        left: &Value,
        right: &Value,
        accept: impl Fn(Ordering) -> bool,
    ) -> Result<Value, EvalError> {
        if left.is_empty() || right.is_empty() {
            return Ok(Value::Boolean(false));
        }

        // Numeric text compares as a number against a number
        let ordering = match left.compare(right) {
            Some(o) => o,
            None => match (left, right) {
                (Value::Number(_), Value::Text(_)) | (Value::Text(_), Value::Number(_)) => {
                    match (left.as_number(), right.as_number()) {
                        (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
                        _ => {
                            return Err(EvalError::type_mismatch(
                                op.to_string(),
                                left.type_name(),
                                right,
                            ))
                        }
                    }
                }
                _ => {
                    return Err(EvalError::type_mismatch(
                        op.to_string(),
                        left.type_name(),
                        right,
                    ))
                }
            },
        };

        Ok(Value::Boolean(accept(ordering)))
    }

    fn eval_unary_op(
        &self,
        op: UnaryOperator,
        operand: &Ast,
        ctx: &EvalContext<'_>,
    ) -> Result<Value, EvalError> {
        let value = self.eval_ast(operand, ctx)?;
        match op {
            UnaryOperator::Negate => {
                if value.is_empty() {
                    return Ok(Value::Empty);
                }
                value
                    .as_number()
                    .map(|n| Value::Number(-n))
                    .ok_or_else(|| EvalError::type_mismatch("negation", "number", &value))
            }
        }
    }

    // ========================================================================
    // FUNCTIONS
    // ========================================================================

    fn eval_function(
        &self,
        func: Function,
        args: &[Ast],
        ctx: &EvalContext<'_>,
    ) -> Result<Value, EvalError> {
        check_arity(func, args.len())?;

        match func {
            // Lazy: only the chosen branch is evaluated
            Function::If => {
                let condition = self.eval_ast(&args[0], ctx)?;
                if condition.is_truthy() {
                    self.eval_ast(&args[1], ctx)
                } else if let Some(otherwise) = args.get(2) {
                    self.eval_ast(otherwise, ctx)
                } else {
                    Ok(Value::Empty)
                }
            }

            Function::And => {
                for arg in args {
                    if !self.eval_ast(arg, ctx)?.is_truthy() {
                        return Ok(Value::Boolean(false));
                    }
                }
                Ok(Value::Boolean(true))
            }

            Function::Or => {
                for arg in args {
                    if self.eval_ast(arg, ctx)?.is_truthy() {
                        return Ok(Value::Boolean(true));
                    }
                }
                Ok(Value::Boolean(false))
            }

            Function::Not => Ok(Value::Boolean(!self.eval_ast(&args[0], ctx)?.is_truthy())),

            Function::IsBlank => {
                let value = self.eval_ast(&args[0], ctx)?;
                let blank = match &value {
                    Value::Empty => true,
                    Value::Text(s) => s.is_empty(),
                    _ => false,
                };
                Ok(Value::Boolean(blank))
            }

            Function::Coalesce => {
                for arg in args {
                    let value = self.eval_ast(arg, ctx)?;
                    if !value.is_empty() {
                        return Ok(value);
                    }
                }
                Ok(Value::Empty)
            }

            Function::Abs => self.eval_numeric_unary(func, &args[0], ctx, f64::abs),
            Function::Floor => self.eval_numeric_unary(func, &args[0], ctx, f64::floor),
            Function::Ceiling => self.eval_numeric_unary(func, &args[0], ctx, f64::ceil),

            Function::Round => {
                let value = self.eval_ast(&args[0], ctx)?;
                if value.is_empty() {
                    return Ok(Value::Empty);
                }
                let number = expect_number(func, &value)?;
                let digits = match args.get(1) {
                    Some(arg) => expect_number(func, &self.eval_ast(arg, ctx)?)?,
                    None => 0.0,
                };
                Ok(Value::Number(round_half_away(number, digits as i32)))
            }

            Function::Min | Function::Max => {
                let mut numbers = Vec::new();
                for arg in args {
                    collect_numbers(func, &self.eval_ast(arg, ctx)?, &mut numbers)?;
                }
                let picked = if func == Function::Min {
                    numbers.into_iter().reduce(f64::min)
                } else {
                    numbers.into_iter().reduce(f64::max)
                };
                Ok(picked.map(Value::Number).unwrap_or(Value::Empty))
            }

            Function::Len => {
                let value = self.eval_ast(&args[0], ctx)?;
                Ok(Value::Number(value.as_text().chars().count() as f64))
            }

            Function::Upper => self.eval_text_unary(&args[0], ctx, |s| s.to_uppercase()),
            Function::Lower => self.eval_text_unary(&args[0], ctx, |s| s.to_lowercase()),
            Function::Trim => self.eval_text_unary(&args[0], ctx, |s| s.trim().to_string()),

            Function::Concat => {
                let mut out = String::new();
                for arg in args {
                    out.push_str(&self.eval_ast(arg, ctx)?.as_text());
                }
                Ok(Value::Text(out))
            }

            Function::Left | Function::Right => {
                let value = self.eval_ast(&args[0], ctx)?;
                if value.is_empty() {
                    return Ok(Value::Empty);
                }
                let count = expect_number(func, &self.eval_ast(&args[1], ctx)?)?;
                if count < 0.0 {
                    return Err(EvalError::InvalidArgument {
                        function: func.name().to_string(),
                        message: format!("character count must not be negative, got {}", count),
                    });
                }
                let text = value.as_text();
                let count = count as usize;
                let total = text.chars().count();
                let taken: String = if func == Function::Left {
                    text.chars().take(count).collect()
                } else {
                    text.chars().skip(total.saturating_sub(count)).collect()
                };
                Ok(Value::Text(taken))
            }
        }
    }

    fn eval_numeric_unary(
        &self,
        func: Function,
        arg: &Ast,
        ctx: &EvalContext<'_>,
        apply: fn(f64) -> f64,
    ) -> Result<Value, EvalError> {
        let value = self.eval_ast(arg, ctx)?;
        if value.is_empty() {
            return Ok(Value::Empty);
        }
        Ok(Value::Number(apply(expect_number(func, &value)?)))
    }

    fn eval_text_unary(
        &self,
        arg: &Ast,
        ctx: &EvalContext<'_>,
        apply: impl Fn(&str) -> String,
    ) -> Result<Value, EvalError> {
        let value = self.eval_ast(arg, ctx)?;
        if value.is_empty() {
            return Ok(Value::Empty);
        }
        Ok(Value::Text(apply(&value.as_text())))
    }
}

impl Evaluator for StandardEvaluator {
    fn evaluate(&self, expr: &Expression, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
        self.eval_ast(expr.ast(), ctx)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn check_arity(func: Function, found: usize) -> Result<(), EvalError> {
    let (min, max) = func.arity();
    if found < min || max.map_or(false, |max| found > max) {
        let expected = match max {
            Some(max) if max == min => format!("{}", min),
            Some(max) => format!("{} to {}", min, max),
            None => format!("at least {}", min),
        };
        return Err(EvalError::ArityMismatch {
            function: func.name().to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

fn expect_number(func: Function, value: &Value) -> Result<f64, EvalError> {
    value
        .as_number()
        .ok_or_else(|| EvalError::type_mismatch(func.name(), "number", value))
}

/// Flattens lists and skips Empty, for MIN/MAX.
fn collect_numbers(func: Function, value: &Value, out: &mut Vec<f64>) -> Result<(), EvalError> {
    match value {
        Value::Empty => Ok(()),
        Value::List(items) => {
            for item in items {
                collect_numbers(func, item, out)?;
            }
            Ok(())
        }
        other => {
            out.push(expect_number(func, other)?);
            Ok(())
        }
    }
}

/// Equality with Empty semantics: Empty equals only Empty.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Empty, Value::Empty) => true,
        (Value::Empty, _) | (_, Value::Empty) => false,
        (Value::Number(l), Value::Number(r)) => (l - r).abs() < f64::EPSILON,
        // Cross-type comparisons
        (Value::Number(n), Value::Text(s)) | (Value::Text(s), Value::Number(n)) => s
            .trim()
            .parse::<f64>()
            .map(|parsed| (parsed - n).abs() < f64::EPSILON)
            .unwrap_or(false),
        (l, r) => l == r,
    }
}

/// Rounds half away from zero at the given number of decimal digits.
fn round_half_away(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}
