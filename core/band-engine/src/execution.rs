//! FILENAME: core/band-engine/src/execution.rs
//! PURPOSE: The public execution API.
//! CONTEXT: A `ReportEngine` wraps one validated, planned definition and
//! can execute it any number of times, concurrently, from multiple
//! threads. Every execution owns its own variable state, group state and
//! output; nothing mutable is shared between runs.

use crate::definition::ReportDefinition;
use crate::env::EvalEnv;
use crate::error::{DefinitionError, ReportError};
use crate::options::{CancelPolicy, ExecutionOptions};
use crate::plan::ExecutionPlan;
use crate::processor::BandProcessor;
use crate::sink::{DocumentCollector, ReportSink};
use crate::source::RowSource;
use expr_engine::{Evaluator, Formatter, Parameters, StandardEvaluator, StandardFormatter, Value};
use layout_ir::{DocumentMetadata, ReportDocument};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ============================================================================
// CANCELLATION
// ============================================================================

/// A cloneable flag checked at every row boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// REQUEST
// ============================================================================

/// Everything that varies between executions of the same definition.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    pub parameters: Parameters,
    pub options: ExecutionOptions,
    pub cancellation: Option<CancellationToken>,
}

impl ExecutionRequest {
    pub fn new() -> Self {
        ExecutionRequest::default()
    }

    pub fn with_parameter(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map_or(false, CancellationToken::is_cancelled)
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct ReportEngine {
    definition: Arc<ReportDefinition>,
    evaluator: Arc<dyn Evaluator + Send + Sync>,
    formatter: Arc<dyn Formatter + Send + Sync>,
    plan: ExecutionPlan,
}

impl ReportEngine {
    /// Validates and plans `definition` with the standard evaluator and
    /// formatter.
    pub fn new(definition: ReportDefinition) -> Result<Self, DefinitionError> {
        ReportEngine::with_collaborators(
            Arc::new(definition),
            Arc::new(StandardEvaluator::new()),
            Arc::new(StandardFormatter::new()),
        )
    }

    /// Builds an engine around externally supplied collaborators.
    pub fn with_collaborators(
        definition: Arc<ReportDefinition>,
        evaluator: Arc<dyn Evaluator + Send + Sync>,
        formatter: Arc<dyn Formatter + Send + Sync>,
    ) -> Result<Self, DefinitionError> {
        definition.validate()?;
        let plan = ExecutionPlan::build(&definition)?;
        log::debug!(
            target: "EXEC",
            "planned report={} bands={} aggregates={}",
            definition.name,
            plan.band_count(),
            plan.aggregates.len()
        );
        Ok(ReportEngine {
            definition,
            evaluator,
            formatter,
            plan,
        })
    }

    pub fn definition(&self) -> &ReportDefinition {
        &self.definition
    }

    /// Runs the report to completion and collects every fragment.
    pub fn execute<R: RowSource>(
        &self,
        source: R,
        request: &ExecutionRequest,
    ) -> Result<ReportDocument, ReportError> {
        let mut collector = DocumentCollector::new();
        let metadata = self.execute_into(source, request, &mut collector)?;

        let mut document = ReportDocument::new(
            self.definition.name.clone(),
            self.definition.title.clone(),
        );
        document.bands = collector.into_bands();
        document.metadata = metadata;
        Ok(document)
    }

    /// Runs the report, streaming each fragment into `sink` as it is built.
    pub fn execute_into<R, S>(
        &self,
        mut source: R,
        request: &ExecutionRequest,
        sink: &mut S,
    ) -> Result<DocumentMetadata, ReportError>
    where
        R: RowSource,
        S: ReportSink + ?Sized,
    {
        log::info!(target: "EXEC", "ENTER execute report={}", self.definition.name);

        let parameters = self.resolve_parameters(&request.parameters)?;
        let env = EvalEnv {
            evaluator: self.evaluator.as_ref(),
            formatter: self.formatter.as_ref(),
            parameters: &parameters,
            locale: &request.options.locale,
        };

        let mut processor = BandProcessor::new(
            &self.plan,
            env,
            &request.options,
            sink,
            &self.definition.groups,
            &self.definition.variables,
        );
        processor.start()?;

        let mut cancelled = false;
        loop {
            if request.is_cancelled() {
                match request.options.cancel_policy {
                    CancelPolicy::Abort => {
                        let records = processor.records();
                        log::info!(target: "EXEC", "cancelled report={} records={}", self.definition.name, records);
                        return Err(ReportError::Cancelled { records });
                    }
                    CancelPolicy::CloseReport => {
                        log::info!(
                            target: "EXEC",
                            "cancelled report={} records={}, closing",
                            self.definition.name,
                            processor.records()
                        );
                        cancelled = true;
                        break;
                    }
                }
            }

            match source.next_row() {
                None => break,
                Some(Ok(row)) => processor.process_row(row)?,
                Some(Err(err)) => {
                    return Err(ReportError::RowSource {
                        row_index: processor.records(),
                        source: err,
                    })
                }
            }
        }

        let mut metadata = processor.finish()?;
        metadata.cancelled = cancelled;

        log::info!(
            target: "EXEC",
            "EXIT execute records={} bands={}",
            metadata.record_count,
            metadata.activation_count
        );
        Ok(metadata)
    }

    /// Supplied values override defaults. A required parameter with no
    /// value fails the execution before any band fires.
    fn resolve_parameters(&self, supplied: &Parameters) -> Result<Parameters, ReportError> {
        let mut resolved = supplied.clone();
        for param in &self.definition.parameters {
            if resolved.contains_key(&param.name) {
                continue;
            }
            match &param.default {
                Some(default) => {
                    resolved.insert(param.name.clone(), default.clone());
                }
                None if param.required => {
                    return Err(ReportError::Parameter(format!(
                        "missing required parameter '{}'",
                        param.name
                    )))
                }
                None => {
                    resolved.insert(param.name.clone(), Value::Empty);
                }
            }
        }
        Ok(resolved)
    }
}
