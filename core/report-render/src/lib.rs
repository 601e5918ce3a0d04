//! FILENAME: core/report-render/src/lib.rs
//! PURPOSE: Renderer dispatch over the layout IR.
//! CONTEXT: Every renderer consumes the same `ReportDocument` (or the same
//! stream of `BandOutput` fragments) and differs only in surface syntax.
//! Record count and final variable values are emitted by every format in
//! the same canonical JSON encoding, so outputs can be cross-checked.
//!
//! PIPELINE: ReportDocument --> validate layouts --> Renderer --> RenderOutput

mod error;
mod html;
mod json;
mod options;
mod pdf;

pub use error::RenderError;
pub use html::HtmlRenderer;
pub use json::JsonRenderer;
pub use options::{HtmlOptions, JsonOptions, OutputFormat, PdfOptions, RenderOptions};
pub use pdf::PdfBackendRenderer;

use expr_engine::Value;
use layout_ir::{BandOutput, ReportDocument};

/// Turns layout IR into one output format.
pub trait Renderer {
    fn format(&self) -> OutputFormat;

    /// Renders a single band fragment, for streaming consumers that never
    /// hold the whole document.
    fn render_band(&self, band: &BandOutput, options: &RenderOptions)
        -> Result<String, RenderError>;

    /// Renders a finished document.
    fn render_document(
        &self,
        document: &ReportDocument,
        options: &RenderOptions,
    ) -> Result<RenderOutput, RenderError>;
}

/// The bytes produced by one renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
}

impl RenderOutput {
    pub fn new(format: OutputFormat, text: String) -> Self {
        RenderOutput {
            format,
            bytes: text.into_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_string(self) -> Result<String, RenderError> {
        Ok(String::from_utf8(self.bytes)?)
    }
}

/// Returns the renderer for a format.
pub fn renderer_for(format: OutputFormat) -> Box<dyn Renderer> {
    match format {
        OutputFormat::Html => Box::new(HtmlRenderer),
        OutputFormat::Json => Box::new(JsonRenderer),
        OutputFormat::PdfBackend => Box::new(PdfBackendRenderer),
    }
}

/// Renders a document in the requested format.
pub fn render(
    document: &ReportDocument,
    format: OutputFormat,
    options: &RenderOptions,
) -> Result<RenderOutput, RenderError> {
    log::debug!(
        target: "RENDER",
        "ENTER render format={} report={} bands={}",
        format,
        document.name,
        document.bands.len()
    );
    let output = renderer_for(format).render_document(document, options)?;
    log::info!(
        target: "RENDER",
        "EXIT render format={} bytes={}",
        format,
        output.len()
    );
    Ok(output)
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Rejects a fragment whose layout has bad spans or overlapping cells.
pub(crate) fn check_band(band: &BandOutput) -> Result<(), RenderError> {
    band.layout
        .validate()
        .map_err(|source| RenderError::Malformed {
            band: band.activation.band.clone(),
            source,
        })
}

pub(crate) fn check_document(document: &ReportDocument) -> Result<(), RenderError> {
    document.bands.iter().try_for_each(check_band)
}

/// Canonical encoding of a metadata value, shared by all formats.
pub(crate) fn canonical(value: &Value) -> String {
    value.to_json().to_string()
}
