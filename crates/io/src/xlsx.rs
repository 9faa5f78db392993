// Workbook import (xlsx, xlsm, xls, xlsb, ods)
//
// One-way load into the normalized grid. Each sheet is read twice through
// calamine: once for cached values and once for formula source, merged into
// a single cell map.

use std::path::Path;
use std::time::Instant;

use calamine::{open_workbook_auto, Data, Reader, Sheets};

use crate::error::IoError;
use crate::grid::{CellValue, SheetGrid, SkippedSheet, WorkbookGrid};

/// Row limit per sheet. Cells beyond it are dropped with a warning.
pub const MAX_ROWS: usize = 65_536;
/// Column limit per sheet (XFD).
pub const MAX_COLS: usize = 16_384;

/// List sheet names in workbook order without loading any cells.
pub fn list_sheet_names(path: &Path) -> Result<Vec<String>, IoError> {
    let workbook = open_raw(path)?;
    let names = workbook.sheet_names().to_vec();
    if names.is_empty() {
        return Err(IoError::NoSheets(path.to_path_buf()));
    }
    Ok(names)
}

/// Load every sheet of a workbook.
///
/// Sheets that fail to load are recorded in `WorkbookGrid::skipped`; only a
/// file that cannot be opened at all is an error.
pub fn open_workbook(path: &Path) -> Result<WorkbookGrid, IoError> {
    load(path, None)
}

/// Load only the named sheets. Names absent from the workbook are ignored
/// here; callers see them as missing through `WorkbookGrid::require_sheet`.
pub fn open_sheets(path: &Path, names: &[&str]) -> Result<WorkbookGrid, IoError> {
    load(path, Some(names))
}

fn load(path: &Path, only: Option<&[&str]>) -> Result<WorkbookGrid, IoError> {
    let start_time = Instant::now();
    let mut workbook = open_raw(path)?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(IoError::NoSheets(path.to_path_buf()));
    }

    let mut grid = WorkbookGrid::new(path);
    for sheet_name in &sheet_names {
        if let Some(wanted) = only {
            if !wanted.iter().any(|w| w == sheet_name || w.eq_ignore_ascii_case(sheet_name)) {
                continue;
            }
        }
        match load_sheet(&mut workbook, sheet_name) {
            Ok(sheet) => grid.sheets.push(sheet),
            Err(reason) => {
                log::warn!("skipping sheet '{}' in {}: {}", sheet_name, path.display(), reason);
                grid.skipped.push(SkippedSheet { name: sheet_name.clone(), reason });
            }
        }
    }

    log::info!(
        "loaded {} sheet(s) from {} in {} ms",
        grid.sheets.len(),
        path.display(),
        start_time.elapsed().as_millis()
    );
    Ok(grid)
}

fn open_raw(path: &Path) -> Result<Sheets<std::io::BufReader<std::fs::File>>, IoError> {
    // Probe first so missing and forbidden files get their own error kinds
    if let Err(e) = std::fs::File::open(path) {
        return Err(match e.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => IoError::PermissionDenied(path.to_path_buf()),
            _ => IoError::Unreadable { path: path.to_path_buf(), reason: e.to_string() },
        });
    }
    open_workbook_auto(path).map_err(|e| IoError::Unreadable { path: path.to_path_buf(), reason: e.to_string() })
}

fn load_sheet<RS>(workbook: &mut Sheets<RS>, sheet_name: &str) -> Result<SheetGrid, String>
where
    RS: std::io::Read + std::io::Seek,
{
    let range = workbook.worksheet_range(sheet_name).map_err(|e| e.to_string())?;
    let mut sheet = SheetGrid::new(sheet_name);

    let (height, width) = range.get_size();
    if height == 0 || width == 0 {
        return Ok(sheet);
    }

    // Range start offset (data may not begin at A1)
    let (data_start_row, data_start_col) = range.start().unwrap_or((0, 0));
    let mut truncated = false;

    for (row_idx, row) in range.rows().enumerate() {
        let target_row = data_start_row as usize + row_idx;
        if target_row >= MAX_ROWS {
            truncated = true;
            break;
        }
        for (col_idx, cell) in row.iter().enumerate() {
            let target_col = data_start_col as usize + col_idx;
            if target_col >= MAX_COLS {
                truncated = true;
                break;
            }
            sheet.set_value(target_row, target_col, convert(cell));
        }
    }

    // Formula source is optional: formats without it simply yield values
    match workbook.worksheet_formula(sheet_name) {
        Ok(formula_range) => {
            // Formula range may start at a different offset than data range
            let (formula_start_row, formula_start_col) = formula_range.start().unwrap_or((0, 0));
            for (row_idx, row) in formula_range.rows().enumerate() {
                let target_row = formula_start_row as usize + row_idx;
                if target_row >= MAX_ROWS {
                    break;
                }
                for (col_idx, formula) in row.iter().enumerate() {
                    let target_col = formula_start_col as usize + col_idx;
                    if target_col >= MAX_COLS {
                        break;
                    }
                    if !formula.is_empty() {
                        sheet.set_formula(target_row, target_col, &normalize_formula(formula));
                    }
                }
            }
        }
        Err(e) => log::debug!("no formulas read for sheet '{}': {}", sheet_name, e),
    }

    if truncated {
        log::warn!(
            "sheet '{}' truncated to {} rows x {} columns",
            sheet_name,
            MAX_ROWS,
            MAX_COLS
        );
    }

    Ok(sheet)
}

fn convert(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(e) => CellValue::Error(format!("#{:?}", e)),
        // Dates are kept as serial numbers (1900 system)
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// Bring formula source into `=A1` form.
///
/// ODS files use prefixed function names like `of:SUM(A1:A10)` and use
/// semicolons as argument separators; both are rewritten.
fn normalize_formula(formula: &str) -> String {
    let body = formula.trim();
    let body = body.strip_prefix('=').unwrap_or(body);
    if !(body.starts_with("of:") || body.starts_with("OF:")) {
        return format!("={}", body);
    }

    let mut result = String::with_capacity(body.len() + 1);
    result.push('=');
    let mut chars = body.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if c == '"' {
            in_string = !in_string;
            result.push(c);
            continue;
        }
        if in_string {
            result.push(c);
            continue;
        }
        if (c == 'o' || c == 'O') && matches!(chars.peek(), Some(&'f') | Some(&'F')) {
            let mut lookahead = chars.clone();
            lookahead.next();
            if lookahead.peek() == Some(&':') {
                chars.next();
                chars.next();
                continue;
            }
        }
        if c == ';' {
            result.push(',');
        } else {
            result.push(c);
        }
    }
    result
}
