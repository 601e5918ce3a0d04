//! FILENAME: core/report-render/src/html.rs
//! PURPOSE: HTML output.
//! CONTEXT: Each band becomes a `<section>` tagged with its activation
//! (band name, type, page, depth). Grid and table layouts map to
//! `<table>`, with colspan/rowspan taken from the cell spans; stacks map to
//! nested `<div>`s. Metadata goes into a trailing `<footer>` with one
//! `data-variable` entry per report variable.

use crate::{canonical, check_band, check_document, OutputFormat, RenderError, RenderOptions, RenderOutput, Renderer};
use layout_ir::{BandOutput, Cell, Content, Layout, LayoutChild, LayoutKind, Properties, ReportDocument, ShapeKind};

const STYLESHEET: &str = "\
.report { font-family: sans-serif; font-size: 10pt; }
.band { margin: 0 0 4pt 0; }
.band-title { font-size: 16pt; font-weight: bold; }
.band-group_header, .band-group_footer { font-weight: bold; }
table.layout { border-collapse: collapse; width: 100%; }
table.layout td { padding: 1pt 4pt; vertical-align: top; }
.shape-line { border: 0; border-top: 1px solid #000; }
.shape-box { border: 1px solid #000; min-height: 1em; }
.report-metadata { margin-top: 12pt; color: #555; }
";

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Html
    }

    fn render_band(&self, band: &BandOutput, options: &RenderOptions) -> Result<String, RenderError> {
        check_band(band)?;
        let mut out = String::new();
        write_band(&mut out, band, options.html.include_styles);
        Ok(out)
    }

    fn render_document(
        &self,
        document: &ReportDocument,
        options: &RenderOptions,
    ) -> Result<RenderOutput, RenderError> {
        check_document(document)?;
        let html = &options.html;
        let title = html
            .document_title
            .as_deref()
            .or(document.title.as_deref())
            .unwrap_or(&document.name);
        let metadata = &document.metadata;

        let mut out = String::with_capacity(1024 + document.bands.len() * 256);
        out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        out.push_str(&format!("<title>{}</title>\n", html_escape(title)));
        out.push_str(&format!(
            "<meta name=\"report-records\" content=\"{}\">\n",
            metadata.record_count
        ));
        if html.include_styles {
            out.push_str("<style>\n");
            out.push_str(STYLESHEET);
            out.push_str("</style>\n");
        }
        out.push_str("</head>\n<body>\n");
        out.push_str(&format!(
            "<div class=\"report\" data-report=\"{}\">\n",
            html_escape(&document.name)
        ));

        for band in &document.bands {
            write_band(&mut out, band, html.include_styles);
        }

        if html.include_metadata {
            out.push_str("<footer class=\"report-metadata\">\n<dl>\n");
            out.push_str(&format!(
                "<dt>records</dt><dd data-metadata=\"record_count\">{}</dd>\n",
                metadata.record_count
            ));
            out.push_str(&format!(
                "<dt>pages</dt><dd data-metadata=\"page_count\">{}</dd>\n",
                metadata.page_count
            ));
            if metadata.cancelled {
                out.push_str("<dt>cancelled</dt><dd data-metadata=\"cancelled\">true</dd>\n");
            }
            for (name, value) in &metadata.variables {
                out.push_str(&format!(
                    "<dt>{}</dt><dd data-variable=\"{}\">{}</dd>\n",
                    html_escape(name),
                    html_escape(name),
                    html_escape(&canonical(value))
                ));
            }
            out.push_str("</dl>\n</footer>\n");
        }

        out.push_str("</div>\n</body>\n</html>\n");
        Ok(RenderOutput::new(OutputFormat::Html, out))
    }
}

// ============================================================================
// BANDS AND LAYOUTS
// ============================================================================

fn write_band(out: &mut String, band: &BandOutput, styles: bool) {
    let activation = &band.activation;
    out.push_str(&format!(
        "<section class=\"band band-{}\" data-band=\"{}\" data-page=\"{}\" data-depth=\"{}\"",
        activation.band_type.name(),
        html_escape(&activation.band),
        activation.page,
        activation.depth
    ));
    if let Some(row_index) = activation.row_index {
        out.push_str(&format!(" data-row-index=\"{}\"", row_index));
    }
    out.push_str(">\n");
    write_layout(out, &band.layout, styles);
    out.push_str("</section>\n");
}

fn write_layout(out: &mut String, layout: &Layout, styles: bool) {
    match layout.kind {
        LayoutKind::Grid | LayoutKind::Table => {
            out.push_str(&format!(
                "<table class=\"layout layout-{}\"{}>\n",
                layout.kind.name(),
                style_attribute(&layout.properties, styles)
            ));
            for child in &layout.children {
                match child {
                    LayoutChild::Row(row) => {
                        out.push_str(&format!(
                            "<tr data-row=\"{}\"{}>",
                            row.index,
                            style_attribute(&row.properties, styles)
                        ));
                        for cell in &row.cells {
                            write_cell(out, cell, "td", styles);
                        }
                        out.push_str("</tr>\n");
                    }
                    LayoutChild::Layout(nested) => {
                        out.push_str("<tr class=\"nested\"><td>\n");
                        write_layout(out, nested, styles);
                        out.push_str("</td></tr>\n");
                    }
                }
            }
            out.push_str("</table>\n");
        }
        LayoutKind::Stack => {
            out.push_str(&format!(
                "<div class=\"layout layout-stack\"{}>\n",
                style_attribute(&layout.properties, styles)
            ));
            for child in &layout.children {
                match child {
                    LayoutChild::Row(row) => {
                        out.push_str(&format!(
                            "<div class=\"row\" data-row=\"{}\"{}>",
                            row.index,
                            style_attribute(&row.properties, styles)
                        ));
                        for cell in &row.cells {
                            write_cell(out, cell, "div", styles);
                        }
                        out.push_str("</div>\n");
                    }
                    LayoutChild::Layout(nested) => write_layout(out, nested, styles),
                }
            }
            out.push_str("</div>\n");
        }
    }
}

fn write_cell(out: &mut String, cell: &Cell, tag: &str, styles: bool) {
    out.push_str(&format!(
        "<{} data-col=\"{}\" data-row=\"{}\"",
        tag, cell.position.col, cell.position.row
    ));
    if tag == "td" {
        if cell.span.colspan > 1 {
            out.push_str(&format!(" colspan=\"{}\"", cell.span.colspan));
        }
        if cell.span.rowspan > 1 {
            out.push_str(&format!(" rowspan=\"{}\"", cell.span.rowspan));
        }
    } else {
        out.push_str(" class=\"cell\"");
    }
    out.push_str(&style_attribute(&cell.properties, styles));
    out.push('>');
    for content in &cell.contents {
        write_content(out, content, styles);
    }
    out.push_str(&format!("</{}>", tag));
}

fn write_content(out: &mut String, content: &Content, styles: bool) {
    match content {
        Content::Label { text, style } => out.push_str(&format!(
            "<span class=\"label\"{}>{}</span>",
            style_attribute(style, styles),
            html_escape(text)
        )),
        Content::Field {
            source,
            formatted,
            style,
            ..
        } => out.push_str(&format!(
            "<span class=\"field\" data-source=\"{}\"{}>{}</span>",
            html_escape(source),
            style_attribute(style, styles),
            html_escape(formatted)
        )),
        Content::NestedLayout { layout } => write_layout(out, layout, styles),
        Content::Shape { shape, style } => match shape {
            ShapeKind::Line => out.push_str(&format!(
                "<hr class=\"shape-line\"{}>",
                style_attribute(style, styles)
            )),
            ShapeKind::Box => out.push_str(&format!(
                "<div class=\"shape-box\"{}></div>",
                style_attribute(style, styles)
            )),
        },
        Content::Image { source, style } => out.push_str(&format!(
            "<img src=\"{}\" alt=\"\"{}>",
            html_escape(source),
            style_attribute(style, styles)
        )),
    }
}

/// Inline `style` attribute from a property map. Empty when styles are off.
fn style_attribute(properties: &Properties, styles: bool) -> String {
    if !styles || properties.is_empty() {
        return String::new();
    }
    let declarations: Vec<String> = properties
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value.as_text()))
        .collect();
    format!(" style=\"{}\"", html_escape(&declarations.join("; ")))
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use layout_ir::Row;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("a & b"), "a &amp; b");
        assert_eq!(html_escape(r#""quoted""#), "&quot;quoted&quot;");
    }

    #[test]
    fn spans_become_attributes() {
        let mut row = Row::new(0);
        row.cells.push(
            Cell::new(0, 0)
                .with_span(2, 1)
                .with_content(Content::label("wide")),
        );
        let mut layout = Layout::new(LayoutKind::Table);
        layout.children.push(LayoutChild::Row(row));

        let mut out = String::new();
        write_layout(&mut out, &layout, true);
        assert!(out.starts_with("<table class=\"layout layout-table\">"));
        assert!(out.contains("<td data-col=\"0\" data-row=\"0\" colspan=\"2\">"));
        assert!(out.contains("<span class=\"label\">wide</span>"));
    }

    #[test]
    fn styles_can_be_left_out() {
        let cell = Cell::new(1, 0)
            .with_property("text-align", "right")
            .with_content(Content::label("x"));

        let mut styled = String::new();
        write_cell(&mut styled, &cell, "td", true);
        assert!(styled.contains("style=\"text-align: right\""));

        let mut plain = String::new();
        write_cell(&mut plain, &cell, "td", false);
        assert!(!plain.contains("style="));
    }
}
