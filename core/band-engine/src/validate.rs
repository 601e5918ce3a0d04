//! FILENAME: core/band-engine/src/validate.rs
//! PURPOSE: Load-time validation of a report definition.
//! CONTEXT: The engine never guesses. Anything that would make execution
//! ambiguous is rejected here with the location of the problem, before a
//! single row is read. Runtime code may therefore assume, for example,
//! that every group band names a declared group level.

use crate::definition::{
    Band, BandLayout, BandType, Element, ElementType, ReportDefinition, ResetScope, VariableType,
};
use crate::error::DefinitionError;
use crate::plan::is_scheduled;
use expr_engine::{DependencyGraph, Expression};
use rustc_hash::FxHashSet;

pub(crate) fn validate(def: &ReportDefinition) -> Result<(), DefinitionError> {
    if def.name.trim().is_empty() {
        return Err(DefinitionError::invalid("name", "report name must not be empty"));
    }

    validate_groups(def)?;
    validate_parameters(def)?;
    validate_variables(def)?;
    validate_top_level_bands(def)?;

    let mut has_detail = false;
    for (i, band) in def.bands.iter().enumerate() {
        validate_band(def, band, None, &format!("bands[{}]", i), &mut has_detail)?;
    }
    validate_detail_numbers(&def.bands, "bands")?;

    if !has_detail {
        return Err(DefinitionError::invalid(
            "bands",
            "at least one detail band is required",
        ));
    }

    Ok(())
}

// ============================================================================
// GROUPS, PARAMETERS, VARIABLES
// ============================================================================

fn validate_groups(def: &ReportDefinition) -> Result<(), DefinitionError> {
    let mut levels: Vec<u32> = def.groups.iter().map(|g| g.level).collect();
    levels.sort_unstable();
    for (i, level) in levels.iter().enumerate() {
        if *level != i as u32 + 1 {
            return Err(DefinitionError::invalid(
                "groups",
                format!(
                    "group levels must be numbered 1..{} without gaps or duplicates",
                    levels.len()
                ),
            ));
        }
    }

    for group in &def.groups {
        let location = format!("groups[level {}]", group.level);
        if group.keys.is_empty() {
            return Err(DefinitionError::invalid(location, "group needs at least one key"));
        }
        for key in &group.keys {
            check_references(def, key, &location)?;
        }
    }
    Ok(())
}

fn validate_parameters(def: &ReportDefinition) -> Result<(), DefinitionError> {
    let mut seen = FxHashSet::default();
    for param in &def.parameters {
        if !seen.insert(param.name.as_str()) {
            return Err(DefinitionError::invalid(
                format!("parameters.{}", param.name),
                "duplicate parameter name",
            ));
        }
    }
    Ok(())
}

fn validate_variables(def: &ReportDefinition) -> Result<(), DefinitionError> {
    let group_count = def.groups.len() as u32;
    let mut seen = FxHashSet::default();
    let mut graph = DependencyGraph::new();

    for variable in &def.variables {
        let location = format!("variables.{}", variable.name);

        if !seen.insert(variable.name.as_str()) {
            return Err(DefinitionError::invalid(location, "duplicate variable name"));
        }

        match (variable.reset_on, variable.reset_group) {
            (ResetScope::Group, None) => {
                return Err(DefinitionError::invalid(
                    location,
                    "reset_group is required when reset_on is group",
                ))
            }
            (ResetScope::Group, Some(level)) if level == 0 || level > group_count => {
                return Err(DefinitionError::invalid(
                    location,
                    format!("reset_group {} does not name a declared group", level),
                ))
            }
            (scope, Some(_)) if scope != ResetScope::Group => {
                return Err(DefinitionError::invalid(
                    location,
                    "reset_group is only meaningful when reset_on is group",
                ))
            }
            _ => {}
        }

        if variable.expression.is_none() && variable.kind != VariableType::Count {
            return Err(DefinitionError::invalid(
                location,
                format!("a {} variable needs an expression", variable.kind.name()),
            ));
        }

        if let Some(initial) = &variable.initial_value {
            let numeric_kind = matches!(variable.kind, VariableType::Sum | VariableType::Count);
            if variable.kind == VariableType::Average {
                return Err(DefinitionError::invalid(
                    location,
                    "average variables start empty and take no initial value",
                ));
            }
            if numeric_kind && initial.as_number().is_none() {
                return Err(DefinitionError::invalid(
                    location,
                    "initial value of a sum or count must be numeric",
                ));
            }
        }

        graph.add_node(&variable.name);
        if let Some(expr) = &variable.expression {
            check_references(def, expr, &location)?;
            graph.set_dependencies(&variable.name, expr.variable_names());
        }
    }

    // Cycles first: they give the clearer message
    graph.topological_order()?;

    // Variables are evaluated in list order, so reads must point backwards
    for (i, variable) in def.variables.iter().enumerate() {
        let Some(expr) = &variable.expression else {
            continue;
        };
        for name in expr.variable_names() {
            let defined_at = def.variables.iter().position(|v| v.name == name);
            if defined_at.map_or(false, |pos| pos > i) {
                return Err(DefinitionError::invalid(
                    format!("variables.{}", variable.name),
                    format!("reads ${} which is evaluated later", name),
                ));
            }
        }
    }

    Ok(())
}

/// Variables and parameters an expression reads must be declared.
fn check_references(
    def: &ReportDefinition,
    expr: &Expression,
    location: &str,
) -> Result<(), DefinitionError> {
    for name in expr.variable_names() {
        if def.variable(name).is_none() {
            return Err(DefinitionError::invalid(
                location,
                format!("unknown variable ${}", name),
            ));
        }
    }

    let mut missing = None;
    expr.ast().walk(&mut |node| {
        if let expr_parser::Expression::Parameter(name) = node {
            if missing.is_none() && !def.parameters.iter().any(|p| &p.name == name) {
                missing = Some(name.clone());
            }
        }
    });
    if let Some(name) = missing {
        return Err(DefinitionError::invalid(
            location,
            format!("unknown parameter @{}", name),
        ));
    }

    Ok(())
}

// ============================================================================
// BANDS
// ============================================================================

fn validate_top_level_bands(def: &ReportDefinition) -> Result<(), DefinitionError> {
    let last = def.bands.len().saturating_sub(1);
    for (i, band) in def.bands.iter().enumerate() {
        let location = format!("bands[{}]", i);
        match band.band_type {
            BandType::Title if i != 0 => {
                return Err(DefinitionError::invalid(
                    location,
                    "the title band must be the first band",
                ))
            }
            BandType::Summary if i != last => {
                return Err(DefinitionError::invalid(
                    location,
                    "the summary band must be the last band",
                ))
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_band(
    def: &ReportDefinition,
    band: &Band,
    parent: Option<BandType>,
    location: &str,
    has_detail: &mut bool,
) -> Result<(), DefinitionError> {
    let band_type = band.band_type;

    if parent.is_some() && matches!(band_type, BandType::Title | BandType::Summary) {
        return Err(DefinitionError::invalid(
            location,
            format!("a {} band cannot be nested", band_type),
        ));
    }

    if band_type.is_group_band() {
        if let Some(parent) = parent {
            if !parent.is_group_band() {
                return Err(DefinitionError::invalid(
                    location,
                    format!("a group band cannot be nested inside a {} band", parent),
                ));
            }
        }
        match band.group_level {
            None => {
                return Err(DefinitionError::invalid(location, "group_level is required"))
            }
            Some(level) if def.group(level).is_none() => {
                return Err(DefinitionError::invalid(
                    location,
                    format!("group_level {} does not name a declared group", level),
                ))
            }
            _ => {}
        }
    } else if band.group_level.is_some() {
        return Err(DefinitionError::invalid(
            location,
            format!("a {} band cannot carry a group_level", band_type),
        ));
    }

    if band.detail_number.is_some() && band_type != BandType::Detail {
        return Err(DefinitionError::invalid(
            location,
            "detail_number is only valid on detail bands",
        ));
    }

    if band_type.is_row_band() {
        // row bands fire once per row, so they need a row slot
        if !is_scheduled(parent, band_type) {
            let parent = parent.map_or_else(String::new, |p| p.to_string());
            return Err(DefinitionError::invalid(
                location,
                format!("a {} band cannot be nested inside a {} band", band_type, parent),
            ));
        }
        if band_type == BandType::Detail {
            *has_detail = true;
        }
    }

    if let Some(hook) = &band.on_entry {
        check_references(def, hook, &format!("{}.on_entry", location))?;
    }
    if let Some(hook) = &band.on_exit {
        check_references(def, hook, &format!("{}.on_exit", location))?;
    }

    let mut keys = FxHashSet::default();
    for (i, element) in band.elements.iter().enumerate() {
        let key = element.key(i);
        let element_location = format!("{}.elements[{}]", location, key);
        if !keys.insert(key) {
            return Err(DefinitionError::invalid(
                element_location,
                "duplicate element name within band",
            ));
        }
        validate_element(def, band, element, &element_location)?;
    }

    if let Some(layout) = &band.layout {
        let mut placed = FxHashSet::default();
        validate_layout(band, layout, &format!("{}.layout", location), &mut placed)?;
        for (i, element) in band.elements.iter().enumerate() {
            let key = element.key(i);
            if !placed.contains(&key) {
                return Err(DefinitionError::invalid(
                    format!("{}.layout", location),
                    format!("element '{}' is not placed in the layout", key),
                ));
            }
        }
    }

    for (i, child) in band.bands.iter().enumerate() {
        validate_band(
            def,
            child,
            Some(band_type),
            &format!("{}.bands[{}]", location, i),
            has_detail,
        )?;
    }
    validate_detail_numbers(&band.bands, &format!("{}.bands", location))?;

    Ok(())
}

/// Explicit detail numbers among siblings must run 1, 2, 3... in order.
fn validate_detail_numbers(siblings: &[Band], location: &str) -> Result<(), DefinitionError> {
    let details: Vec<&Band> = siblings
        .iter()
        .filter(|b| b.band_type == BandType::Detail)
        .collect();
    let numbered = details.iter().filter(|b| b.detail_number.is_some()).count();
    if numbered == 0 {
        return Ok(());
    }
    if numbered != details.len() {
        return Err(DefinitionError::invalid(
            location,
            "either every sibling detail band has a detail_number or none does",
        ));
    }
    for (i, band) in details.iter().enumerate() {
        if band.detail_number != Some(i as u32 + 1) {
            return Err(DefinitionError::invalid(
                location,
                format!(
                    "detail numbers must be sequential from 1, found {:?} at position {}",
                    band.detail_number,
                    i + 1
                ),
            ));
        }
    }
    Ok(())
}

fn validate_element(
    def: &ReportDefinition,
    band: &Band,
    element: &Element,
    location: &str,
) -> Result<(), DefinitionError> {
    if let Some(conditional) = &element.conditional {
        check_references(def, conditional, &format!("{}.conditional", location))?;
    }

    let source = element.source.as_deref();
    let require_source = || {
        source.ok_or_else(|| {
            DefinitionError::invalid(
                location,
                format!("a {} element needs a source", element.kind.name()),
            )
        })
    };

    match element.kind {
        ElementType::Field => {
            let path = require_source()?;
            let parsed = Expression::parse(path).map_err(|source| DefinitionError::Expression {
                location: location.to_string(),
                source,
            })?;
            if !matches!(parsed.ast(), expr_parser::Expression::Field(_)) {
                return Err(DefinitionError::invalid(
                    location,
                    format!("'{}' is not a field path", path),
                ));
            }
        }
        ElementType::Label | ElementType::Image => {
            require_source()?;
        }
        ElementType::Expression => {
            let expr = parse_source(require_source()?, location)?;
            check_references(def, &expr, location)?;
        }
        ElementType::Aggregate => {
            let function = element.function.as_deref().unwrap_or("");
            if VariableType::from_aggregate_function(function).is_none() {
                return Err(DefinitionError::invalid(
                    location,
                    format!(
                        "aggregate function '{}' is not one of sum, count, average, min, max",
                        function
                    ),
                ));
            }
            let expr = parse_source(require_source()?, location)?;
            check_references(def, &expr, location)?;

            let group_scoped = element.reset_on == Some(ResetScope::Group)
                || (element.reset_on.is_none() && band.band_type.is_group_band());
            if group_scoped {
                let level = element.reset_group.or(band.group_level);
                match level {
                    Some(level) if def.group(level).is_some() => {}
                    _ => {
                        return Err(DefinitionError::invalid(
                            location,
                            "a group-scoped aggregate needs a declared reset_group",
                        ))
                    }
                }
            }
        }
        ElementType::Line | ElementType::Box => {}
    }

    Ok(())
}

fn parse_source(source: &str, location: &str) -> Result<Expression, DefinitionError> {
    Expression::parse(source).map_err(|source| DefinitionError::Expression {
        location: location.to_string(),
        source,
    })
}

fn validate_layout(
    band: &Band,
    layout: &BandLayout,
    location: &str,
    placed: &mut FxHashSet<String>,
) -> Result<(), DefinitionError> {
    let known: FxHashSet<String> = band
        .elements
        .iter()
        .enumerate()
        .map(|(i, e)| e.key(i))
        .collect();

    for (r, row) in layout.rows.iter().enumerate() {
        for (c, cell) in row.cells.iter().enumerate() {
            let cell_location = format!("{}.rows[{}].cells[{}]", location, r, c);
            if cell.colspan == 0 || cell.rowspan == 0 {
                return Err(DefinitionError::invalid(
                    cell_location,
                    "colspan and rowspan must be at least 1",
                ));
            }
            for key in &cell.elements {
                if !known.contains(key) {
                    return Err(DefinitionError::invalid(
                        cell_location,
                        format!("unknown element '{}'", key),
                    ));
                }
                placed.insert(key.clone());
            }
            if let Some(nested) = &cell.layout {
                validate_layout(band, nested, &format!("{}.layout", cell_location), placed)?;
            }
        }
    }
    Ok(())
}
