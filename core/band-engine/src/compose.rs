//! FILENAME: core/band-engine/src/compose.rs
//! PURPOSE: Assembles a band's rendered elements into a layout.
//! CONTEXT: Without an explicit layout, elements fill one grid row, one
//! cell per element in definition order; a suppressed element leaves its
//! cell empty so column positions stay stable between activations. With a
//! `BandLayout`, cells are placed exactly as declared, and overlapping
//! placements are reported rather than resolved.

use crate::definition::BandLayout;
use crate::error::{ErrorContext, ReportError};
use crate::plan::PlannedBand;
use expr_engine::Value;
use layout_ir::{Cell, Content, Frame, IrError, Layout, LayoutBuilder};
use rustc_hash::FxHashMap;

/// Builds the layout for one activation. `contents` holds one entry per
/// element of `band`, in definition order.
pub(crate) fn compose_band(
    band: &PlannedBand,
    contents: Vec<Option<Content>>,
    row_index: Option<u64>,
) -> Result<Layout, ReportError> {
    let result = match &band.layout {
        None => default_layout(band, contents),
        Some(spec) => {
            let mut by_key: FxHashMap<&str, (Option<Frame>, Content)> = FxHashMap::default();
            for (compiled, content) in band.elements.iter().zip(contents) {
                if let Some(content) = content {
                    by_key.insert(
                        compiled.key.as_str(),
                        (compiled.element.position, content),
                    );
                }
            }
            explicit_layout(spec, &by_key)
        }
    };

    result
        .map(|mut layout| {
            layout
                .properties
                .insert("band".to_string(), Value::from(band.band_type.name()));
            layout
        })
        .map_err(|source| ReportError::Overlap {
            context: ErrorContext::band(&band.name, row_index),
            source,
        })
}

fn default_layout(band: &PlannedBand, contents: Vec<Option<Content>>) -> Result<Layout, IrError> {
    let mut builder = LayoutBuilder::grid();
    if !band.elements.is_empty() {
        let mut row = builder.begin_row();
        for (col, (compiled, content)) in band.elements.iter().zip(contents).enumerate() {
            let mut cell = Cell::new(col as u32, 0).with_frame(compiled.element.position);
            if let Some(content) = content {
                cell = cell.with_content(content);
            }
            row = row.cell(cell);
        }
        row.finish()?;
    }
    Ok(builder.build())
}

fn explicit_layout(
    spec: &BandLayout,
    by_key: &FxHashMap<&str, (Option<Frame>, Content)>,
) -> Result<Layout, IrError> {
    let mut builder = LayoutBuilder::new(spec.kind);
    builder.set_properties(spec.properties.clone());

    for row_spec in &spec.rows {
        let mut row = builder.begin_row();
        for (key, value) in &row_spec.properties {
            row = row.property(key.clone(), value.clone());
        }
        for cell_spec in &row_spec.cells {
            let mut cell = Cell::new(cell_spec.col, cell_spec.row)
                .with_span(cell_spec.colspan, cell_spec.rowspan);
            cell.properties = cell_spec.properties.clone();

            for key in &cell_spec.elements {
                if let Some((frame, content)) = by_key.get(key.as_str()) {
                    if cell.frame.is_none() {
                        cell.frame = *frame;
                    }
                    cell = cell.with_content(content.clone());
                }
            }
            if let Some(nested) = &cell_spec.layout {
                cell = cell.with_content(Content::NestedLayout {
                    layout: explicit_layout(nested, by_key)?,
                });
            }
            row = row.cell(cell);
        }
        row.finish()?;
    }

    Ok(builder.build())
}
