//! FILENAME: core/band-engine/src/groups.rs
//! PURPOSE: Group-break detection over the row stream.
//! CONTEXT: Each group level's key tuple is evaluated once per row and
//! compared with the previous row's keys. A change at level L breaks L and
//! every inner level. Rows are assumed to arrive pre-sorted by the group
//! keys; the processor never reorders input.

use crate::definition::Group;
use crate::env::EvalEnv;
use crate::error::{ErrorContext, ReportError};
use expr_engine::{Expression, Row, Value, VariableLookup};
use smallvec::SmallVec;

/// The evaluated key tuple of one group level for one row.
pub type GroupKey = SmallVec<[Value; 2]>;

/// The levels that close and open between two consecutive rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupBreak {
    /// Levels whose headers fire, outermost first.
    pub entering: Vec<u32>,
    /// Levels whose footers fire, innermost first.
    pub exiting: Vec<u32>,
}

impl GroupBreak {
    pub fn is_empty(&self) -> bool {
        self.entering.is_empty() && self.exiting.is_empty()
    }
}

struct GroupLevel {
    level: u32,
    label: String,
    keys: Vec<Expression>,
}

pub struct GroupProcessor {
    levels: Vec<GroupLevel>,
    previous: Option<Vec<GroupKey>>,
}

impl GroupProcessor {
    pub fn new(groups: &[Group]) -> Self {
        let mut levels: Vec<GroupLevel> = groups
            .iter()
            .map(|g| GroupLevel {
                level: g.level,
                label: g
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("group#{}", g.level)),
                keys: g.keys.clone(),
            })
            .collect();
        levels.sort_by_key(|l| l.level);
        GroupProcessor {
            levels,
            previous: None,
        }
    }

    /// Evaluates the keys for `row` and reports which levels break.
    /// The first row enters every level and exits none.
    pub(crate) fn detect(
        &mut self,
        env: &EvalEnv<'_>,
        row: &Row,
        row_index: u64,
        variables: &dyn VariableLookup,
    ) -> Result<GroupBreak, ReportError> {
        let ctx = env.context(Some(row), variables);
        let mut current = Vec::with_capacity(self.levels.len());
        for level in &self.levels {
            let mut key = GroupKey::new();
            for expr in &level.keys {
                let value = env.evaluator.evaluate(expr, &ctx).map_err(|e| {
                    ReportError::eval(ErrorContext::band(&level.label, Some(row_index)), e)
                })?;
                key.push(value);
            }
            current.push(key);
        }

        let first_changed = match &self.previous {
            None => Some(0),
            Some(previous) => previous
                .iter()
                .zip(current.iter())
                .position(|(before, now)| before != now),
        };

        let mut change = GroupBreak::default();
        if let Some(start) = first_changed {
            let broken: Vec<u32> = self.levels[start..].iter().map(|l| l.level).collect();
            if self.previous.is_some() {
                change.exiting = broken.iter().rev().copied().collect();
            }
            change.entering = broken;
        }

        if !change.is_empty() {
            log::debug!(
                target: "GROUP",
                "break row={} entering={:?} exiting={:?}",
                row_index,
                change.entering,
                change.exiting
            );
        }

        self.previous = Some(current);
        Ok(change)
    }

    /// The synthetic final break: every open level, innermost first.
    /// Empty if no row was ever seen.
    pub fn close_all(&mut self) -> Vec<u32> {
        match self.previous.take() {
            Some(_) => self.levels.iter().rev().map(|l| l.level).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expr_engine::{NoVariables, Parameters, StandardEvaluator, StandardFormatter};

    fn processor() -> GroupProcessor {
        GroupProcessor::new(&[
            Group::new(2, vec![Expression::parse("city").unwrap()]),
            Group::new(1, vec![Expression::parse("region").unwrap()]),
        ])
    }

    fn detect(groups: &mut GroupProcessor, row: &Row, index: u64) -> GroupBreak {
        let parameters = Parameters::default();
        let env = EvalEnv {
            evaluator: &StandardEvaluator,
            formatter: &StandardFormatter::new(),
            parameters: &parameters,
            locale: "en",
        };
        groups.detect(&env, row, index, &NoVariables).unwrap()
    }

    fn row(region: &str, city: &str) -> Row {
        Row::new().with("region", region).with("city", city)
    }

    #[test]
    fn first_row_enters_all_levels() {
        let mut groups = processor();
        let change = detect(&mut groups, &row("A", "x"), 0);
        assert_eq!(change.entering, vec![1, 2]);
        assert!(change.exiting.is_empty());
    }

    #[test]
    fn inner_change_breaks_inner_level_only() {
        let mut groups = processor();
        detect(&mut groups, &row("A", "x"), 0);
        let change = detect(&mut groups, &row("A", "y"), 1);
        assert_eq!(change.entering, vec![2]);
        assert_eq!(change.exiting, vec![2]);
    }

    #[test]
    fn outer_change_breaks_every_inner_level() {
        let mut groups = processor();
        detect(&mut groups, &row("A", "x"), 0);
        // city is unchanged, but the outer break still cascades
        let change = detect(&mut groups, &row("B", "x"), 1);
        assert_eq!(change.entering, vec![1, 2]);
        assert_eq!(change.exiting, vec![2, 1]);
    }

    #[test]
    fn unchanged_keys_do_not_break() {
        let mut groups = processor();
        detect(&mut groups, &row("A", "x"), 0);
        assert!(detect(&mut groups, &row("A", "x"), 1).is_empty());
    }

    #[test]
    fn missing_key_field_is_a_distinct_value() {
        let mut groups = processor();
        detect(&mut groups, &row("A", "x"), 0);
        let change = detect(&mut groups, &Row::new().with("region", "A"), 1);
        assert_eq!(change.entering, vec![2]);
    }

    #[test]
    fn close_all_is_innermost_first() {
        let mut groups = processor();
        assert!(groups.close_all().is_empty());
        detect(&mut groups, &row("A", "x"), 0);
        assert_eq!(groups.close_all(), vec![2, 1]);
        // the next row starts fresh
        let change = detect(&mut groups, &row("A", "x"), 1);
        assert_eq!(change.entering, vec![1, 2]);
        assert!(change.exiting.is_empty());
    }
}
