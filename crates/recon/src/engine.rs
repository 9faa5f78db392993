use std::collections::BTreeMap;
use std::path::Path;

use modelrecon_engine::CellId;
use modelrecon_io::{list_sheet_names, open_sheets, open_workbook, SheetGrid, WorkbookGrid};

use crate::config::ReconConfig;
use crate::consistency::check_consistency;
use crate::drilldown::{attribute, complexity_of, DependencyTree};
use crate::error::{ReconError, StructuralError};
use crate::extract::extract_line_items;
use crate::matcher::match_line_items;
use crate::model::{
    DrillDownOutcome, DrillDownPreview, FinancialStatement, LineItem, ParseOutcome, PeriodCategories, ReconMeta,
    ReconReport, SheetFailure, SheetSelection, SheetSummary, StatementRecon, StatementType,
};
use crate::period::{recognize_row_periods, PeriodMatcher};
use crate::structure::{detect_statement_type, find_header_row};
use crate::template::{categorize_periods, template_hints};
use crate::variance::{compute_variances, resolve_period};

/// Structural inference, period recognition and extraction for one loaded
/// sheet.
pub fn parse_sheet(grid: &SheetGrid, config: &ReconConfig) -> Result<FinancialStatement, StructuralError> {
    let matcher = PeriodMatcher::new(&config.periods);
    let header = find_header_row(grid, &config.structure, &matcher)?;

    let periods = recognize_row_periods(grid, header, config);
    if periods.is_empty() {
        return Err(StructuralError::NoPeriods { sheet: grid.name.clone(), row: header as u32 + 1 });
    }

    let line_items = extract_line_items(grid, header, &periods, config, &matcher);
    log::info!(
        "sheet '{}': header row {}, {} period(s), {} line item(s)",
        grid.name,
        header + 1,
        periods.len(),
        line_items.len()
    );

    Ok(FinancialStatement {
        sheet_name: grid.name.clone(),
        header_row: header as u32 + 1,
        period_to_column: periods.iter().map(|p| (p.name.clone(), p.column_index)).collect(),
        periods,
        line_items,
    })
}

/// Parse a single sheet of a workbook file.
pub fn parse_statement(path: &Path, sheet: &str, config: &ReconConfig) -> Result<FinancialStatement, ReconError> {
    let workbook = open_sheets(path, &[sheet]).map_err(ReconError::from_io)?;
    let grid = workbook.require_sheet(sheet).map_err(ReconError::from_io)?;
    Ok(parse_sheet(grid, config)?)
}

/// Parse every requested sheet. Failed sheets are collected next to the
/// parsed ones; the call only fails when none parsed or the file itself is
/// unusable.
pub fn parse_statements(
    path: &Path,
    selection: &BTreeMap<StatementType, String>,
    config: &ReconConfig,
) -> Result<ParseOutcome, ReconError> {
    if selection.is_empty() {
        return Err(ReconError::NoSheetsRequested);
    }

    let names: Vec<&str> = selection.values().map(String::as_str).collect();
    let workbook = open_sheets(path, &names).map_err(ReconError::from_io)?;

    let mut outcome = ParseOutcome::default();
    for (statement_type, sheet_name) in selection {
        let parsed = match workbook.require_sheet(sheet_name) {
            Ok(grid) => parse_sheet(grid, config),
            Err(e) => match ReconError::from_io(e) {
                ReconError::Structural(s) => Err(s),
                other => return Err(other),
            },
        };
        match parsed {
            Ok(statement) => {
                outcome.statements.insert(*statement_type, statement);
            }
            Err(error) => {
                log::warn!("{}: skipping {} sheet '{}': {}", path.display(), statement_type, sheet_name, error);
                outcome.failures.push(SheetFailure {
                    statement_type: *statement_type,
                    sheet_name: sheet_name.clone(),
                    error,
                });
            }
        }
    }

    if outcome.statements.is_empty() {
        return Err(ReconError::AllSheetsFailed { failures: outcome.failures });
    }
    Ok(outcome)
}

/// Every sheet of a workbook with its inferred role, for sheet selection.
pub fn discover_sheets(path: &Path, config: &ReconConfig) -> Result<Vec<SheetSummary>, ReconError> {
    let workbook = open_workbook(path).map_err(ReconError::from_io)?;
    let matcher = PeriodMatcher::new(&config.periods);

    let mut out = Vec::with_capacity(workbook.sheets.len() + workbook.skipped.len());
    for grid in &workbook.sheets {
        let statement_type = detect_statement_type(grid);
        let header = find_header_row(grid, &config.structure, &matcher).ok();
        let periods = header.map(|row| recognize_row_periods(grid, row, config)).unwrap_or_default();
        let names: Vec<&str> = periods.iter().map(|p| p.name.as_str()).collect();
        out.push(SheetSummary {
            name: grid.name.clone(),
            statement_type,
            header_row: header.map(|row| row as u32 + 1),
            period_count: periods.len(),
            period_kinds: categorize_periods(&periods),
            templates: template_hints(&names, config.structure.min_header_period_cells),
        });
    }
    for skipped in &workbook.skipped {
        out.push(SheetSummary {
            name: skipped.name.clone(),
            statement_type: StatementType::Unknown,
            header_row: None,
            period_count: 0,
            period_kinds: PeriodCategories::default(),
            templates: Vec::new(),
        });
    }
    Ok(out)
}

/// Sheet names present in both workbooks, in the old workbook's order.
pub fn common_sheets(old: &Path, new: &Path) -> Result<Vec<String>, ReconError> {
    let old_names = list_sheet_names(old).map_err(ReconError::from_io)?;
    let new_names = list_sheet_names(new).map_err(ReconError::from_io)?;
    Ok(old_names.into_iter().filter(|n| new_names.contains(n)).collect())
}

/// Parse both models side by side, then match and compute variances for
/// every statement type present in both.
pub fn reconcile(
    old: &Path,
    new: &Path,
    selection: &SheetSelection,
    period: &str,
    config: &ReconConfig,
) -> Result<ReconReport, ReconError> {
    config.validate()?;

    let (old_outcome, new_outcome) = rayon::join(
        || parse_statements(old, &selection.old, config),
        || parse_statements(new, &selection.new, config),
    );
    let old_outcome = old_outcome?;
    let new_outcome = new_outcome?;

    let mut statements = Vec::new();
    for (statement_type, old_stmt) in &old_outcome.statements {
        let Some(new_stmt) = new_outcome.statements.get(statement_type) else {
            log::warn!("{} only parsed in the old model, not reconciled", statement_type);
            continue;
        };
        let matches = match_line_items(old_stmt, new_stmt, config.matching.similarity_threshold);
        let variances = compute_variances(old_stmt, new_stmt, period, &matches, *statement_type);
        statements.push(StatementRecon {
            statement_type: *statement_type,
            old_sheet: old_stmt.sheet_name.clone(),
            new_sheet: new_stmt.sheet_name.clone(),
            matches,
            variances,
        });
    }

    let consistency = check_consistency(&old_outcome.statements, &new_outcome.statements);

    Ok(ReconReport {
        meta: ReconMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            old_file: old.display().to_string(),
            new_file: new.display().to_string(),
            period: period.to_string(),
        },
        statements,
        old_failures: old_outcome.failures,
        new_failures: new_outcome.failures,
        consistency,
    })
}

/// Cheap look at whether a line item can be drilled into.
pub fn preview_drill_down(
    path: &Path,
    sheet: &str,
    label: &str,
    config: &ReconConfig,
) -> Result<DrillDownPreview, ReconError> {
    let unavailable = |reason: String| DrillDownPreview { can_drill_down: false, reason: Some(reason), complexity: None };

    let statement = match parse_statement(path, sheet, config) {
        Ok(s) => s,
        Err(ReconError::Structural(e)) => return Ok(unavailable(e.to_string())),
        Err(e) => return Err(e),
    };
    let Some(item) = statement.item_by_label(label) else {
        return Ok(unavailable(format!("line item '{label}' not found in sheet '{sheet}'")));
    };
    let Some(formula) = &item.formula else {
        return Ok(unavailable(format!("line item '{label}' has no formula")));
    };

    let complexity = complexity_of(formula);
    let can_drill_down = complexity.reference_count > 0;
    Ok(DrillDownPreview {
        can_drill_down,
        reason: (!can_drill_down).then(|| "formula references no cells".to_string()),
        complexity: Some(complexity),
    })
}

/// Trace one line item's formula in both versions and attribute the change
/// in `period` to its inputs.
///
/// `max_depth` overrides the configured depth budget. Anything that makes
/// the drill-down meaningless for this item yields
/// [`DrillDownOutcome::Unavailable`]; only file-level failures are errors.
pub fn drill_down(
    old: &Path,
    new: &Path,
    sheet: &str,
    label: &str,
    period: &str,
    max_depth: Option<usize>,
    config: &ReconConfig,
) -> Result<DrillDownOutcome, ReconError> {
    let unavailable = |reason: String| -> Result<DrillDownOutcome, ReconError> {
        log::info!("drill-down of '{}' unavailable: {}", label, reason);
        Ok(DrillDownOutcome::Unavailable { reason })
    };

    let old_book = open_workbook(old).map_err(ReconError::from_io)?;
    let new_book = open_workbook(new).map_err(ReconError::from_io)?;

    let (old_item, old_cell) = match locate("old", &old_book, sheet, label, period, config) {
        Ok(found) => found,
        Err(reason) => return unavailable(reason),
    };
    let (new_item, new_cell) = match locate("new", &new_book, sheet, label, period, config) {
        Ok(found) => found,
        Err(reason) => return unavailable(reason),
    };
    if !old_item.has_formula() && !new_item.has_formula() {
        return unavailable(format!("line item '{label}' has no formula"));
    }

    let depth = max_depth.unwrap_or(config.drill_down.max_depth);
    log::info!("drilling into '{}' at {} / {} (depth {})", label, old_cell, new_cell, depth);
    let old_tree = DependencyTree::build(&old_book, &old_cell, label, depth, config);
    let new_tree = DependencyTree::build(&new_book, &new_cell, label, depth, config);

    let result = attribute(label, sheet, &old_tree, &new_tree, config.extract.value_epsilon);
    Ok(DrillDownOutcome::Available(Box::new(result)))
}

/// The line item and its cell for `period` on one side of a drill-down.
fn locate(
    side: &str,
    book: &WorkbookGrid,
    sheet: &str,
    label: &str,
    period: &str,
    config: &ReconConfig,
) -> Result<(LineItem, CellId), String> {
    let grid = book.require_sheet(sheet).map_err(|e| format!("{side} model: {e}"))?;
    let statement = parse_sheet(grid, config).map_err(|e| format!("{side} model: {e}"))?;
    let item = statement
        .item_by_label(label)
        .cloned()
        .ok_or_else(|| format!("line item '{label}' not found in the {side} model"))?;
    let (Some(period_name), _) = resolve_period(&statement, period) else {
        return Err(format!("{side} model has no period matching '{period}'"));
    };
    let col = statement
        .period_to_column
        .get(&period_name)
        .copied()
        .ok_or_else(|| format!("{side} model has no column for period '{period_name}'"))?;
    let cell = CellId::new(grid.name.clone(), item.row_index as usize - 1, col as usize);
    Ok((item, cell))
}
