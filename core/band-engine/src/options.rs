//! FILENAME: core/band-engine/src/options.rs
//! PURPOSE: Per-execution configuration.
//! CONTEXT: Options travel with each execution request rather than the
//! definition, so the same shared definition can run with different
//! locales or page sizes concurrently. All fields have defaults, so a
//! partial JSON object (or none) is a valid configuration.

use serde::{Deserialize, Serialize};

/// What to do when cancellation is observed at a row boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Stop and return `ReportError::Cancelled`; no output.
    #[default]
    Abort,
    /// Stop consuming rows, run the closing sequence and return a
    /// well-formed document flagged as cancelled.
    CloseReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    /// Locale handed to the formatter and evaluator.
    pub locale: String,

    pub cancel_policy: CancelPolicy,

    /// Starts a new logical page after this many rows. None = one page.
    pub rows_per_page: Option<u64>,

    /// Keep an activation trace in the document metadata. Off by default:
    /// the trace grows with the row count.
    pub record_activations: bool,

    /// Cap on collected warnings. Further warnings are dropped.
    pub max_warnings: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        ExecutionOptions {
            locale: "en".to_string(),
            cancel_policy: CancelPolicy::Abort,
            rows_per_page: None,
            record_activations: false,
            max_warnings: 1000,
        }
    }
}

impl ExecutionOptions {
    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = locale.to_string();
        self
    }

    pub fn with_rows_per_page(mut self, rows: u64) -> Self {
        self.rows_per_page = Some(rows);
        self
    }

    pub fn with_cancel_policy(mut self, policy: CancelPolicy) -> Self {
        self.cancel_policy = policy;
        self
    }

    pub fn with_activation_trace(mut self, record: bool) -> Self {
        self.record_activations = record;
        self
    }
}
