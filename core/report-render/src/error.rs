//! FILENAME: core/report-render/src/error.rs

use layout_ir::IrError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A band layout broke a structural invariant (span or overlap).
    #[error("malformed layout in band '{band}': {source}")]
    Malformed {
        band: String,
        #[source]
        source: IrError,
    },

    #[error("rendered output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
