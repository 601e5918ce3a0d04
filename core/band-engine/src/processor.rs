//! FILENAME: core/band-engine/src/processor.rs
//! PURPOSE: Drives the band lifecycle over a streamed row set.
//! CONTEXT: One `BandProcessor` exists per execution and owns that run's
//! variable state, group state and warnings. The execution layer feeds it
//! rows one at a time; it fires bands in this order:
//!
//! 1. start: title, page header, column header (no row)
//! 2. per row:
//!    - group footers for every exiting level, innermost first, seeing the
//!      previous row, each followed by the group-level reset
//!    - a logical page break, if one is due
//!    - group headers for every entering level, outermost first
//!    - variable update, then detail headers, details, detail footers
//!    - detail-scoped reset
//! 3. finish: footers for every still-open level, column footer, page
//!    footer, summary (all seeing the last row)
//!
//! Each firing band runs its entry hook, renders and composes its
//! elements, hands the fragment to the sink, runs its exit hook, and then
//! fires its inline sub-bands depth-first.

use crate::definition::{Group, Variable};
use crate::elements::{ElementRenderer, Warnings};
use crate::env::EvalEnv;
use crate::error::{ErrorContext, ReportError};
use crate::compose::compose_band;
use crate::groups::GroupProcessor;
use crate::options::ExecutionOptions;
use crate::plan::{BandId, ExecutionPlan};
use crate::sink::ReportSink;
use crate::variables::{ResetTrigger, VariableState};
use expr_engine::{Expression, Row};
use layout_ir::{Activation, BandOutput, DocumentMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessorState {
    Idle,
    RunningTitle,
    RunningPageHeader,
    RunningBody,
    RunningDetail,
    RunningSummary,
    Done,
}

pub(crate) struct BandProcessor<'p, S: ReportSink + ?Sized> {
    plan: &'p ExecutionPlan,
    env: EvalEnv<'p>,
    options: &'p ExecutionOptions,
    sink: &'p mut S,
    variables: VariableState,
    groups: GroupProcessor,
    warnings: Warnings,
    state: ProcessorState,
    page: u32,
    rows_on_page: u64,
    records: u64,
    activation_count: u64,
    activations: Vec<Activation>,
    previous: Option<Row>,
}

impl<'p, S: ReportSink + ?Sized> BandProcessor<'p, S> {
    pub fn new(
        plan: &'p ExecutionPlan,
        env: EvalEnv<'p>,
        options: &'p ExecutionOptions,
        sink: &'p mut S,
        groups: &[Group],
        variables: &[Variable],
    ) -> Self {
        let mut state = VariableState::from_variables(variables);
        for aggregate in &plan.aggregates {
            state.register(aggregate, true);
        }

        BandProcessor {
            plan,
            env,
            options,
            sink,
            variables: state,
            groups: GroupProcessor::new(groups),
            warnings: Warnings::new(options.max_warnings),
            state: ProcessorState::Idle,
            page: 1,
            rows_on_page: 0,
            records: 0,
            activation_count: 0,
            activations: Vec::new(),
            previous: None,
        }
    }

    /// Rows consumed so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    fn transition(&mut self, next: ProcessorState) {
        if self.state != next {
            log::trace!(target: "BAND", "state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    pub fn start(&mut self) -> Result<(), ReportError> {
        let plan = self.plan;

        self.transition(ProcessorState::RunningTitle);
        self.fire_all(&plan.titles, None, None)?;

        self.transition(ProcessorState::RunningPageHeader);
        self.fire_all(&plan.page_headers, None, None)?;
        self.fire_all(&plan.column_headers, None, None)?;

        self.transition(ProcessorState::RunningBody);
        Ok(())
    }

    pub fn process_row(&mut self, row: Row) -> Result<(), ReportError> {
        let plan = self.plan;
        let index = self.records;
        let env = self.env;

        let change = self.groups.detect(&env, &row, index, &self.variables)?;

        let previous = self.previous.take();
        let previous_index = index.checked_sub(1);
        for level in &change.exiting {
            self.fire_all(plan.group_footers(*level), previous.as_ref(), previous_index)?;
            self.variables.reset(ResetTrigger::Group(*level));
        }

        if self.records > 0 && self.page_break_due(&change.entering) {
            self.page_break(previous.as_ref(), previous_index, &row, index)?;
        }

        for level in &change.entering {
            self.fire_all(plan.group_headers(*level), Some(&row), Some(index))?;
        }

        self.transition(ProcessorState::RunningDetail);
        self.variables.update(&env, &row, index)?;
        self.fire_all(&plan.detail_headers, Some(&row), Some(index))?;
        self.fire_all(&plan.details, Some(&row), Some(index))?;
        self.fire_all(&plan.detail_footers, Some(&row), Some(index))?;
        self.variables.reset(ResetTrigger::Detail);
        self.transition(ProcessorState::RunningBody);

        self.records += 1;
        self.rows_on_page += 1;
        self.previous = Some(row);
        Ok(())
    }

    fn page_break_due(&self, entering: &[u32]) -> bool {
        let full = self
            .options
            .rows_per_page
            .map_or(false, |limit| limit > 0 && self.rows_on_page >= limit);
        let forced = entering.iter().any(|level| {
            self.plan
                .group_headers(*level)
                .iter()
                .any(|id| self.plan.band(*id).page_break_before)
        });
        full || forced
    }

    /// Closes the current logical page and opens the next one.
    fn page_break(
        &mut self,
        previous: Option<&Row>,
        previous_index: Option<u64>,
        row: &Row,
        index: u64,
    ) -> Result<(), ReportError> {
        let plan = self.plan;

        self.fire_all(&plan.page_footers, previous, previous_index)?;
        self.variables.reset(ResetTrigger::Page);

        self.page += 1;
        self.rows_on_page = 0;
        log::debug!(target: "BAND", "page break page={} row={}", self.page, index);

        self.transition(ProcessorState::RunningPageHeader);
        self.fire_all(&plan.page_headers, Some(row), Some(index))?;
        self.fire_all(&plan.column_headers, Some(row), Some(index))?;
        self.transition(ProcessorState::RunningBody);
        Ok(())
    }

    /// Runs the closing sequence and returns the run's metadata.
    pub fn finish(mut self) -> Result<DocumentMetadata, ReportError> {
        let plan = self.plan;
        let last = self.previous.take();
        let last_index = self.records.checked_sub(1);

        for level in self.groups.close_all() {
            self.fire_all(plan.group_footers(level), last.as_ref(), last_index)?;
            self.variables.reset(ResetTrigger::Group(level));
        }

        self.fire_all(&plan.column_footers, last.as_ref(), last_index)?;
        self.fire_all(&plan.page_footers, last.as_ref(), last_index)?;

        self.transition(ProcessorState::RunningSummary);
        self.fire_all(&plan.summaries, last.as_ref(), last_index)?;
        self.transition(ProcessorState::Done);

        Ok(DocumentMetadata {
            record_count: self.records,
            activation_count: self.activation_count,
            page_count: self.page,
            variables: self.variables.snapshot(),
            warnings: self.warnings.into_vec(),
            cancelled: false,
            activations: self.activations,
        })
    }

    // ========================================================================
    // FIRING
    // ========================================================================

    fn fire_all(
        &mut self,
        ids: &[BandId],
        row: Option<&Row>,
        row_index: Option<u64>,
    ) -> Result<(), ReportError> {
        for id in ids {
            self.fire(*id, row, row_index)?;
        }
        Ok(())
    }

    /// Fires a band and then its inline sub-bands, depth-first, without
    /// recursion.
    fn fire(&mut self, id: BandId, row: Option<&Row>, row_index: Option<u64>) -> Result<(), ReportError> {
        let plan = self.plan;
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            self.emit(id, row, row_index)?;
            stack.extend(plan.band(id).children.iter().rev());
        }
        Ok(())
    }

    fn emit(&mut self, id: BandId, row: Option<&Row>, row_index: Option<u64>) -> Result<(), ReportError> {
        let plan = self.plan;
        let band = plan.band(id);

        if let Some(hook) = &band.on_entry {
            self.run_hook(hook, &band.name, "on_entry", row, row_index)?;
        }

        let renderer = ElementRenderer::new(&self.env);
        let mut contents = Vec::with_capacity(band.elements.len());
        for compiled in &band.elements {
            contents.push(renderer.render(
                band,
                compiled,
                row,
                row_index,
                &self.variables,
                &mut self.warnings,
            )?);
        }
        let layout = compose_band(band, contents, row_index)?;

        let activation = Activation {
            band: band.name.clone(),
            band_type: band.band_type,
            group_level: band.group_level,
            detail_number: band.detail_number,
            row_index,
            page: self.page,
            depth: band.depth,
            repeat_per_page: band.band_type.is_page_band(),
        };
        log::debug!(
            target: "BAND",
            "fire band={} type={} row={:?} page={} depth={}",
            activation.band,
            activation.band_type,
            row_index,
            self.page,
            band.depth
        );

        self.activation_count += 1;
        if self.options.record_activations {
            self.activations.push(activation.clone());
        }
        self.sink.accept(BandOutput { activation, layout })?;

        if let Some(hook) = &band.on_exit {
            self.run_hook(hook, &band.name, "on_exit", row, row_index)?;
        }
        Ok(())
    }

    fn run_hook(
        &self,
        hook: &Expression,
        band: &str,
        which: &str,
        row: Option<&Row>,
        row_index: Option<u64>,
    ) -> Result<(), ReportError> {
        let ctx = self.env.context(row, &self.variables);
        self.env
            .evaluator
            .evaluate(hook, &ctx)
            .map(|_| ())
            .map_err(|e| ReportError::eval(ErrorContext::band(band, row_index).with_element(which), e))
    }
}
