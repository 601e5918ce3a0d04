//! FILENAME: core/report-render/src/pdf.rs
//! PURPOSE: Positioned draw-command stream for a PDF typesetting backend.
//! CONTEXT: The stream is plain text, one command per line, coordinates in
//! points from the top-left page corner. It is fully deterministic for a
//! given document and options.
//!
//! PAGINATION: logical pages come from band activations. When a logical
//! page overflows the physical page height, a new physical page is opened
//! and the current page header bands (`repeat_per_page`) are drawn again.
//!
//! COMMANDS:
//!   PAGE <physical> logical=<n> width=<w> height=<h>
//!   BAND <name> type=<band type> page=<n> depth=<d> [row=<index>]
//!   TEXT x=.. y=.. w=.. "<text>"
//!   FIELD x=.. y=.. w=.. source="<source>" "<formatted>"
//!   LINE x1=.. y1=.. x2=.. y2=..
//!   RECT x=.. y=.. w=.. h=..
//!   IMAGE x=.. y=.. w=.. h=.. "<source>"
//!   ENDPAGE <physical>
//!   META / VAR / END trailer

use crate::{canonical, check_band, check_document, OutputFormat, PdfOptions, RenderError, RenderOptions, RenderOutput, Renderer};
use layout_ir::{BandOutput, BandType, Content, Layout, LayoutChild, Properties, ReportDocument, ShapeKind};

const STREAM_HEADER: &str = "%REPORT-IR 1";

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfBackendRenderer;

impl Renderer for PdfBackendRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::PdfBackend
    }

    fn render_band(&self, band: &BandOutput, options: &RenderOptions) -> Result<String, RenderError> {
        check_band(band)?;
        let mut painter = Painter::new(&options.pdf);
        painter.cursor_y = options.pdf.margin;
        painter.draw_band(band);
        Ok(painter.out)
    }

    fn render_document(
        &self,
        document: &ReportDocument,
        options: &RenderOptions,
    ) -> Result<RenderOutput, RenderError> {
        check_document(document)?;
        let mut painter = Painter::new(&options.pdf);
        painter.line(STREAM_HEADER.to_string());
        painter.line(format!(
            "DOCUMENT name={} title={}",
            quote(&document.name),
            quote(document.title.as_deref().unwrap_or(""))
        ));

        for band in &document.bands {
            painter.place(band);
        }
        painter.close_page();

        let metadata = &document.metadata;
        painter.line(format!(
            "META record_count={} page_count={} physical_pages={} cancelled={}",
            metadata.record_count, metadata.page_count, painter.physical_page, metadata.cancelled
        ));
        for (name, value) in &metadata.variables {
            painter.line(format!("VAR {} {}", name, canonical(value)));
        }
        painter.line("END".to_string());

        log::debug!(
            target: "RENDER",
            "pdf stream pages={} commands={}",
            painter.physical_page,
            painter.commands
        );
        Ok(RenderOutput::new(OutputFormat::PdfBackend, painter.out))
    }
}

// ============================================================================
// PAINTER
// ============================================================================

struct Painter<'d> {
    options: &'d PdfOptions,
    out: String,
    commands: usize,
    physical_page: u32,
    logical_page: Option<u32>,
    page_open: bool,
    cursor_y: f64,
    /// Page header bands of the current logical page.
    repeat: Vec<&'d BandOutput>,
}

impl<'d> Painter<'d> {
    fn new(options: &'d PdfOptions) -> Self {
        Painter {
            options,
            out: String::new(),
            commands: 0,
            physical_page: 0,
            logical_page: None,
            page_open: false,
            cursor_y: 0.0,
            repeat: Vec::new(),
        }
    }

    fn line(&mut self, command: String) {
        self.out.push_str(&command);
        self.out.push('\n');
        self.commands += 1;
    }

    fn content_width(&self) -> f64 {
        (self.options.page_width - 2.0 * self.options.margin).max(0.0)
    }

    fn bottom(&self) -> f64 {
        self.options.page_height - self.options.margin
    }

    fn open_page(&mut self, logical: u32) {
        self.physical_page += 1;
        self.page_open = true;
        self.cursor_y = self.options.margin;
        self.line(format!(
            "PAGE {} logical={} width={:.2} height={:.2}",
            self.physical_page, logical, self.options.page_width, self.options.page_height
        ));
    }

    fn close_page(&mut self) {
        if self.page_open {
            self.line(format!("ENDPAGE {}", self.physical_page));
            self.page_open = false;
        }
    }

    /// Places a band, opening pages as the logical page changes or the
    /// physical page fills up.
    fn place(&mut self, band: &'d BandOutput) {
        let logical = band.activation.page;
        if self.logical_page != Some(logical) {
            self.close_page();
            self.repeat.clear();
            self.logical_page = Some(logical);
            self.open_page(logical);
        }

        let height = layout_height(&band.layout, self.options.line_height);
        let page_used = self.cursor_y > self.options.margin;
        if page_used && self.cursor_y + height > self.bottom() {
            self.close_page();
            self.open_page(logical);
            let headers = self.repeat.clone();
            for header in headers {
                self.draw_band(header);
            }
        }

        self.draw_band(band);
        if band.activation.repeat_per_page && band.activation.band_type == BandType::PageHeader {
            self.repeat.push(band);
        }
    }

    fn draw_band(&mut self, band: &BandOutput) {
        let activation = &band.activation;
        let mut header = format!(
            "BAND {} type={} page={} depth={}",
            quote(&activation.band),
            activation.band_type.name(),
            activation.page,
            activation.depth
        );
        if let Some(row_index) = activation.row_index {
            header.push_str(&format!(" row={}", row_index));
        }
        self.line(header);

        let top = self.cursor_y;
        let width = self.content_width();
        self.draw_layout(self.options.margin, top, width, &band.layout);
        self.cursor_y = top
            + layout_height(&band.layout, self.options.line_height)
            + self.options.band_spacing;
    }

    fn draw_layout(&mut self, x: f64, y: f64, width: f64, layout: &Layout) {
        let lh = self.options.line_height;
        let col_width = width / column_count(layout) as f64;
        let mut nested_y = y + grid_height(layout, lh);

        for child in &layout.children {
            match child {
                LayoutChild::Row(row) => {
                    for cell in &row.cells {
                        let (cx, cy, cw, ch) = match cell.frame {
                            Some(frame) => (x + frame.x, y + frame.y, frame.width, frame.height),
                            None => (
                                x + cell.position.col as f64 * col_width,
                                y + cell.position.row as f64 * lh,
                                cell.span.colspan as f64 * col_width,
                                cell.span.rowspan as f64 * lh,
                            ),
                        };
                        for content in &cell.contents {
                            self.draw_content(cx, cy, cw, ch, content);
                        }
                    }
                }
                LayoutChild::Layout(nested) => {
                    self.draw_layout(x, nested_y, width, nested);
                    nested_y += layout_height(nested, lh);
                }
            }
        }
    }

    fn draw_content(&mut self, x: f64, y: f64, w: f64, h: f64, content: &Content) {
        match content {
            Content::Label { text, style } => self.line(format!(
                "TEXT x={:.2} y={:.2} w={:.2} {}{}",
                x,
                y,
                w,
                quote(text),
                style_suffix(style)
            )),
            Content::Field {
                source,
                formatted,
                style,
                ..
            } => self.line(format!(
                "FIELD x={:.2} y={:.2} w={:.2} source={} {}{}",
                x,
                y,
                w,
                quote(source),
                quote(formatted),
                style_suffix(style)
            )),
            Content::Shape { shape, style } => match shape {
                ShapeKind::Line => self.line(format!(
                    "LINE x1={:.2} y1={:.2} x2={:.2} y2={:.2}{}",
                    x,
                    y + h / 2.0,
                    x + w,
                    y + h / 2.0,
                    style_suffix(style)
                )),
                ShapeKind::Box => self.line(format!(
                    "RECT x={:.2} y={:.2} w={:.2} h={:.2}{}",
                    x,
                    y,
                    w,
                    h,
                    style_suffix(style)
                )),
            },
            Content::Image { source, style } => self.line(format!(
                "IMAGE x={:.2} y={:.2} w={:.2} h={:.2} {}{}",
                x,
                y,
                w,
                h,
                quote(source),
                style_suffix(style)
            )),
            Content::NestedLayout { layout } => self.draw_layout(x, y, w, layout),
        }
    }
}

// ============================================================================
// GEOMETRY
// ============================================================================

/// Columns spanned by the layout's own rows. At least one.
fn column_count(layout: &Layout) -> u32 {
    layout
        .rows()
        .flat_map(|row| row.cells.iter())
        .map(|cell| cell.position.col + cell.span.colspan.max(1))
        .max()
        .unwrap_or(1)
        .max(1)
}

/// Height of the row grid, growing cells that hold a nested layout.
fn grid_height(layout: &Layout, line_height: f64) -> f64 {
    layout
        .rows()
        .flat_map(|row| row.cells.iter())
        .map(|cell| {
            let spanned = cell.span.rowspan.max(1) as f64 * line_height;
            let content = cell
                .contents
                .iter()
                .map(|content| match content {
                    Content::NestedLayout { layout } => layout_height(layout, line_height),
                    _ => line_height,
                })
                .fold(0.0, f64::max);
            cell.position.row as f64 * line_height + spanned.max(content)
        })
        .fold(0.0, f64::max)
}

fn layout_height(layout: &Layout, line_height: f64) -> f64 {
    let nested: f64 = layout
        .children
        .iter()
        .filter_map(|child| match child {
            LayoutChild::Layout(nested) => Some(layout_height(nested, line_height)),
            LayoutChild::Row(_) => None,
        })
        .sum();
    grid_height(layout, line_height) + nested
}

// ============================================================================
// ENCODING
// ============================================================================

fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}

fn style_suffix(style: &Properties) -> String {
    if style.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = style
        .iter()
        .map(|(key, value)| format!("{}={}", key, value.as_text()))
        .collect();
    format!(" style={}", quote(&pairs.join(";")))
}
