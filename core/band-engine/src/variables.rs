//! FILENAME: core/band-engine/src/variables.rs
//! PURPOSE: Variable state: accumulation and scoped resets.
//! CONTEXT: One `VariableState` exists per execution. It is updated once per
//! row, after the group headers for that row have fired and before its
//! detail bands, and reset by lifecycle triggers (detail, group level,
//! page). Report-scoped variables are never reset during a run.
//!
//! Variables are evaluated in definition order, so an expression only sees
//! variables that were already updated for the current row. Validation
//! guarantees every reference points backwards.

use crate::definition::{ResetScope, Variable, VariableType};
use crate::env::EvalEnv;
use crate::error::{ErrorContext, ReportError};
use expr_engine::{EvalError, Expression, Row, Value, VariableLookup};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// The lifecycle event that re-initializes variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTrigger {
    /// After each row's detail bands.
    Detail,
    /// After the footer of group level L. Resets every group-scoped
    /// variable bound to level L or an inner level.
    Group(u32),
    /// At a logical page break, after the page footer.
    Page,
}

#[derive(Debug, Clone, PartialEq)]
enum Accumulator {
    Sum(f64),
    Count(u64),
    Average { sum: f64, count: u64 },
    Min(Option<Value>),
    Max(Option<Value>),
    Custom(Value),
}

impl Accumulator {
    fn initial(kind: VariableType, initial: Option<&Value>) -> Self {
        match kind {
            VariableType::Sum => Accumulator::Sum(initial.and_then(Value::as_number).unwrap_or(0.0)),
            VariableType::Count => Accumulator::Count(
                initial
                    .and_then(Value::as_number)
                    .map_or(0, |n| n.max(0.0) as u64),
            ),
            VariableType::Average => Accumulator::Average { sum: 0.0, count: 0 },
            VariableType::Min => Accumulator::Min(initial.cloned()),
            VariableType::Max => Accumulator::Max(initial.cloned()),
            VariableType::Custom => Accumulator::Custom(initial.cloned().unwrap_or_default()),
        }
    }

    fn current(&self) -> Value {
        match self {
            Accumulator::Sum(total) => Value::Number(*total),
            Accumulator::Count(n) => Value::Number(*n as f64),
            Accumulator::Average { count: 0, .. } => Value::Empty,
            Accumulator::Average { sum, count } => Value::Number(sum / *count as f64),
            Accumulator::Min(v) | Accumulator::Max(v) => v.clone().unwrap_or_default(),
            Accumulator::Custom(v) => v.clone(),
        }
    }

    /// Folds one row's evaluated value in. `None` means the variable has no
    /// expression (a plain row count).
    fn accept(&mut self, value: Option<Value>) -> Result<(), EvalError> {
        match self {
            Accumulator::Sum(total) => {
                if let Some(n) = numeric_input("sum", value)? {
                    *total += n;
                }
            }
            Accumulator::Count(n) => {
                let counts = match value {
                    None => true,
                    Some(Value::Empty) | Some(Value::Boolean(false)) => false,
                    Some(_) => true,
                };
                if counts {
                    *n += 1;
                }
            }
            Accumulator::Average { sum, count } => {
                if let Some(n) = numeric_input("average", value)? {
                    *sum += n;
                    *count += 1;
                }
            }
            Accumulator::Min(current) => keep_extreme(current, value, Ordering::Less, "min")?,
            Accumulator::Max(current) => keep_extreme(current, value, Ordering::Greater, "max")?,
            Accumulator::Custom(current) => *current = value.unwrap_or_default(),
        }
        Ok(())
    }
}

/// Empty inputs are skipped; anything else must coerce to a number.
fn numeric_input(operation: &str, value: Option<Value>) -> Result<Option<f64>, EvalError> {
    match value {
        None | Some(Value::Empty) => Ok(None),
        Some(v) => v
            .as_number()
            .map(Some)
            .ok_or_else(|| EvalError::type_mismatch(operation, "number", &v)),
    }
}

fn keep_extreme(
    current: &mut Option<Value>,
    value: Option<Value>,
    wanted: Ordering,
    operation: &str,
) -> Result<(), EvalError> {
    let value = match value {
        None | Some(Value::Empty) => return Ok(()),
        Some(v) => v,
    };
    match current {
        None => *current = Some(value),
        Some(existing) => match value.compare(existing) {
            Some(ordering) if ordering == wanted => *current = Some(value),
            Some(_) => {}
            None => {
                return Err(EvalError::type_mismatch(
                    operation,
                    existing.type_name(),
                    &value,
                ))
            }
        },
    }
    Ok(())
}

struct Slot {
    name: String,
    kind: VariableType,
    expression: Option<Expression>,
    scope: ResetScope,
    reset_group: Option<u32>,
    initial: Option<Value>,
    hidden: bool,
    acc: Accumulator,
}

impl Slot {
    fn resets_on(&self, trigger: ResetTrigger) -> bool {
        match (trigger, self.scope) {
            (ResetTrigger::Detail, ResetScope::Detail) => true,
            (ResetTrigger::Page, ResetScope::Page) => true,
            (ResetTrigger::Group(level), ResetScope::Group) => {
                self.reset_group.map_or(false, |bound| bound >= level)
            }
            _ => false,
        }
    }

    fn reset(&mut self) {
        self.acc = Accumulator::initial(self.kind, self.initial.as_ref());
    }
}

/// The live values of all report variables during one execution.
#[derive(Default)]
pub struct VariableState {
    slots: Vec<Slot>,
    index: FxHashMap<String, usize>,
}

impl VariableState {
    pub fn new() -> Self {
        VariableState::default()
    }

    /// Builds the state for a definition's declared variables.
    pub fn from_variables(variables: &[Variable]) -> Self {
        let mut state = VariableState::new();
        for variable in variables {
            state.register(variable, false);
        }
        state
    }

    /// Adds a variable. Hidden variables back aggregate elements and are
    /// left out of snapshots. Registering an existing name replaces it.
    pub fn register(&mut self, variable: &Variable, hidden: bool) {
        let slot = Slot {
            name: variable.name.clone(),
            kind: variable.kind,
            expression: variable.expression.clone(),
            scope: variable.reset_on,
            reset_group: variable.reset_group,
            initial: variable.initial_value.clone(),
            hidden,
            acc: Accumulator::initial(variable.kind, variable.initial_value.as_ref()),
        };
        match self.index.get(&variable.name) {
            Some(&i) => self.slots[i] = slot,
            None => {
                self.index.insert(variable.name.clone(), self.slots.len());
                self.slots.push(slot);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Folds the current row into every variable, in definition order.
    pub(crate) fn update(
        &mut self,
        env: &EvalEnv<'_>,
        row: &Row,
        row_index: u64,
    ) -> Result<(), ReportError> {
        for i in 0..self.slots.len() {
            let value = self.evaluate_slot(i, env, Some(row), row_index)?;
            let slot = &mut self.slots[i];
            slot.acc
                .accept(value)
                .map_err(|e| ReportError::eval(ErrorContext::variable(&slot.name, Some(row_index)), e))?;
        }
        log::trace!(target: "VARS", "updated {} variable(s) row={}", self.slots.len(), row_index);
        Ok(())
    }

    /// Re-initializes every variable bound to `trigger`.
    ///
    /// A custom variable that reads a variable reset here goes back to its
    /// initial value too, so a read before the next row sees the reset
    /// state. It is recomputed by the next `update`.
    pub(crate) fn reset(&mut self, trigger: ResetTrigger) {
        let mut changed: Vec<bool> = vec![false; self.slots.len()];
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.resets_on(trigger) {
                slot.reset();
                changed[i] = true;
            }
        }
        let reset_count = changed.iter().filter(|c| **c).count();
        if reset_count == 0 {
            return;
        }

        // Definition order: a custom only reads earlier slots.
        for i in 0..self.slots.len() {
            if changed[i] || self.slots[i].kind != VariableType::Custom {
                continue;
            }
            let stale = self.slots[i].expression.as_ref().map_or(false, |expr| {
                expr.variable_names()
                    .iter()
                    .any(|name| self.index.get(*name).map_or(false, |&j| changed[j]))
            });
            if stale {
                self.slots[i].reset();
                changed[i] = true;
            }
        }

        log::trace!(
            target: "VARS",
            "reset {:?} slots={}",
            trigger,
            changed.iter().filter(|c| **c).count()
        );
    }

    fn evaluate_slot(
        &self,
        i: usize,
        env: &EvalEnv<'_>,
        row: Option<&Row>,
        row_index: u64,
    ) -> Result<Option<Value>, ReportError> {
        let slot = &self.slots[i];
        let Some(expr) = &slot.expression else {
            return Ok(None);
        };
        let ctx = env.context(row, self);
        env.evaluator
            .evaluate(expr, &ctx)
            .map(Some)
            .map_err(|e| ReportError::eval(ErrorContext::variable(&slot.name, Some(row_index)), e))
    }

    /// Current value of a variable.
    pub fn value(&self, name: &str) -> Result<Value, ReportError> {
        self.lookup(name)
            .ok_or_else(|| ReportError::UnknownVariable(name.to_string()))
    }

    /// Values of all declared (non-hidden) variables, by name.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.slots
            .iter()
            .filter(|s| !s.hidden)
            .map(|s| (s.name.clone(), s.acc.current()))
            .collect()
    }
}

impl VariableLookup for VariableState {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.index.get(name).map(|&i| self.slots[i].acc.current())
    }
}
