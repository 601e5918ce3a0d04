//! FILENAME: core/report-render/src/json.rs
//! PURPOSE: Structured-data output.
//! CONTEXT: The document serializes as-is, so the JSON form can be read
//! back into a `ReportDocument`. Streamed fragments are one compact JSON
//! object each, suitable for JSON-lines output.

use crate::{check_band, check_document, OutputFormat, RenderError, RenderOptions, RenderOutput, Renderer};
use layout_ir::{BandOutput, ReportDocument};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn render_band(&self, band: &BandOutput, _options: &RenderOptions) -> Result<String, RenderError> {
        check_band(band)?;
        Ok(serde_json::to_string(band)?)
    }

    fn render_document(
        &self,
        document: &ReportDocument,
        options: &RenderOptions,
    ) -> Result<RenderOutput, RenderError> {
        check_document(document)?;
        let text = if options.json.pretty {
            serde_json::to_string_pretty(document)?
        } else {
            serde_json::to_string(document)?
        };
        Ok(RenderOutput::new(OutputFormat::Json, text))
    }
}
