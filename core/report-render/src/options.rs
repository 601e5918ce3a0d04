//! FILENAME: core/report-render/src/options.rs
//! PURPOSE: Output format selection and per-format renderer settings.
//! CONTEXT: Options are plain serde structs with defaults on every field,
//! so callers can pass a partial JSON object. Each renderer only reads its
//! own section.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Html,
    Json,
    /// Positioned draw commands for a downstream PDF typesetter.
    PdfBackend,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] =
        [OutputFormat::Html, OutputFormat::Json, OutputFormat::PdfBackend];

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
            OutputFormat::PdfBackend => "pdf_backend",
        }
    }

    pub fn from_name(name: &str) -> Option<OutputFormat> {
        match name.to_ascii_lowercase().as_str() {
            "html" => Some(OutputFormat::Html),
            "json" => Some(OutputFormat::Json),
            "pdf" | "pdf_backend" => Some(OutputFormat::PdfBackend),
            _ => None,
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
            OutputFormat::PdfBackend => "pdfir",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// PER-FORMAT SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlOptions {
    /// Emit the stylesheet and inline element styles.
    pub include_styles: bool,
    /// Append record count and final variable values.
    pub include_metadata: bool,
    /// Replaces the document title taken from the report.
    pub document_title: Option<String>,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        HtmlOptions {
            include_styles: true,
            include_metadata: true,
            document_title: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct JsonOptions {
    pub pretty: bool,
}

/// Page geometry for the draw stream, in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfOptions {
    pub page_width: f64,
    pub page_height: f64,
    pub margin: f64,
    /// Height of one layout row.
    pub line_height: f64,
    /// Vertical gap between consecutive bands.
    pub band_spacing: f64,
}

impl Default for PdfOptions {
    fn default() -> Self {
        // A4 portrait
        PdfOptions {
            page_width: 595.0,
            page_height: 842.0,
            margin: 36.0,
            line_height: 14.0,
            band_spacing: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RenderOptions {
    pub html: HtmlOptions,
    pub json: JsonOptions,
    pub pdf: PdfOptions,
}

impl RenderOptions {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.html.document_title = Some(title.into());
        self
    }

    pub fn with_pretty_json(mut self, pretty: bool) -> Self {
        self.json.pretty = pretty;
        self
    }

    pub fn with_page_size(mut self, width: f64, height: f64) -> Self {
        self.pdf.page_width = width;
        self.pdf.page_height = height;
        self
    }
}
