//! FILENAME: core/layout-ir/src/document.rs
//! PURPOSE: Band-level output fragments and the finished report document.
//! CONTEXT: Each band activation yields one `BandOutput` (activation info
//! plus its layout). A full run collects them into a `ReportDocument`
//! together with execution metadata. Streaming consumers receive the
//! fragments one at a time instead.

use crate::ir::Layout;
use expr_engine::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The eleven band kinds, each tied to a lifecycle moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandType {
    Title,
    PageHeader,
    ColumnHeader,
    GroupHeader,
    DetailHeader,
    Detail,
    DetailFooter,
    GroupFooter,
    ColumnFooter,
    PageFooter,
    Summary,
}

impl BandType {
    pub const ALL: [BandType; 11] = [
        BandType::Title,
        BandType::PageHeader,
        BandType::ColumnHeader,
        BandType::GroupHeader,
        BandType::DetailHeader,
        BandType::Detail,
        BandType::DetailFooter,
        BandType::GroupFooter,
        BandType::ColumnFooter,
        BandType::PageFooter,
        BandType::Summary,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BandType::Title => "title",
            BandType::PageHeader => "page_header",
            BandType::ColumnHeader => "column_header",
            BandType::GroupHeader => "group_header",
            BandType::DetailHeader => "detail_header",
            BandType::Detail => "detail",
            BandType::DetailFooter => "detail_footer",
            BandType::GroupFooter => "group_footer",
            BandType::ColumnFooter => "column_footer",
            BandType::PageFooter => "page_footer",
            BandType::Summary => "summary",
        }
    }

    pub fn is_group_band(&self) -> bool {
        matches!(self, BandType::GroupHeader | BandType::GroupFooter)
    }

    pub fn is_page_band(&self) -> bool {
        matches!(self, BandType::PageHeader | BandType::PageFooter)
    }

    /// Detail-family bands fire once per row.
    pub fn is_row_band(&self) -> bool {
        matches!(
            self,
            BandType::DetailHeader | BandType::Detail | BandType::DetailFooter
        )
    }
}

impl std::fmt::Display for BandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which band fired, and in what context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activation {
    /// Band name (from the definition, or a generated path name).
    pub band: String,
    pub band_type: BandType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_number: Option<u32>,
    /// Zero-based index of the row the band saw, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u64>,
    /// One-based logical page number.
    pub page: u32,
    /// Nesting depth: 0 for scheduled bands, 1+ for inline sub-bands.
    pub depth: u32,
    /// Page headers/footers are templates a paginating backend may repeat.
    #[serde(default)]
    pub repeat_per_page: bool,
}

/// One activation plus the layout it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandOutput {
    #[serde(flatten)]
    pub activation: Activation,
    pub layout: Layout,
}

impl BandOutput {
    pub fn band_type(&self) -> BandType {
        self.activation.band_type
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DocumentMetadata {
    /// Rows consumed from the row source.
    pub record_count: u64,
    /// Band activations fired, sub-bands included.
    pub activation_count: u64,
    pub page_count: u32,
    /// Final values of report-scoped variables.
    pub variables: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub cancelled: bool,
    /// Activation trace, when recording is enabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub activations: Vec<Activation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReportDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub bands: Vec<BandOutput>,
    pub metadata: DocumentMetadata,
}

impl ReportDocument {
    pub fn new(name: impl Into<String>, title: Option<String>) -> Self {
        ReportDocument {
            name: name.into(),
            title,
            bands: Vec::new(),
            metadata: DocumentMetadata::default(),
        }
    }

    /// Bands of one type, in firing order.
    pub fn bands_of(&self, band_type: BandType) -> impl Iterator<Item = &BandOutput> {
        self.bands
            .iter()
            .filter(move |b| b.activation.band_type == band_type)
    }

    /// The band types in firing order.
    pub fn band_sequence(&self) -> Vec<BandType> {
        self.bands.iter().map(|b| b.activation.band_type).collect()
    }
}
