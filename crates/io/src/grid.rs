//! Normalized cell grid.
//!
//! Every supported workbook format is loaded into the same shape: per sheet, a
//! sparse map of cells holding the last-calculated value and, for formula
//! cells, the formula source. Two read-only views sit on top:
//!
//! - the formula view shows formula source where a cell has one, otherwise
//!   its literal value
//! - the value view shows only last-calculated values
//!
//! Coordinates are 0-based `(row, col)`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::IoError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    Error(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text as a spreadsheet would display it without formatting.
    /// Integral numbers render without decimals.
    pub fn display_text(&self) -> Cow<'_, str> {
        match self {
            CellValue::Empty => Cow::Borrowed(""),
            CellValue::Text(s) => Cow::Borrowed(s),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    Cow::Owned(format!("{}", *n as i64))
                } else {
                    Cow::Owned(format!("{}", n))
                }
            }
            CellValue::Bool(b) => Cow::Borrowed(if *b { "TRUE" } else { "FALSE" }),
            CellValue::Error(e) => Cow::Borrowed(e),
        }
    }
}

static EMPTY: CellValue = CellValue::Empty;

#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    /// Last-calculated value (for literals, the literal itself)
    pub value: CellValue,
    /// Formula source with a leading `=`
    pub formula: Option<String>,
}

impl GridCell {
    pub fn has_formula(&self) -> bool {
        self.formula.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Formula,
    Value,
}

#[derive(Debug, Clone, Default)]
pub struct SheetGrid {
    pub name: String,
    cells: HashMap<(usize, usize), GridCell>,
    rows: usize,
    cols: usize,
}

impl SheetGrid {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Number of rows up to and including the last occupied one.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns up to and including the last occupied one.
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn set_value(&mut self, row: usize, col: usize, value: CellValue) {
        if matches!(value, CellValue::Empty) {
            return;
        }
        self.touch(row, col);
        self.cells
            .entry((row, col))
            .or_insert_with(|| GridCell { value: CellValue::Empty, formula: None })
            .value = value;
    }

    /// Attach formula source to a cell. A missing leading `=` is added.
    pub fn set_formula(&mut self, row: usize, col: usize, formula: &str) {
        let formula = formula.trim();
        if formula.is_empty() {
            return;
        }
        let formula = if formula.starts_with('=') { formula.to_string() } else { format!("={}", formula) };
        self.touch(row, col);
        self.cells
            .entry((row, col))
            .or_insert_with(|| GridCell { value: CellValue::Empty, formula: None })
            .formula = Some(formula);
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&GridCell> {
        self.cells.get(&(row, col))
    }

    pub fn value(&self, row: usize, col: usize) -> &CellValue {
        self.cells.get(&(row, col)).map(|c| &c.value).unwrap_or(&EMPTY)
    }

    pub fn formula(&self, row: usize, col: usize) -> Option<&str> {
        self.cells.get(&(row, col)).and_then(|c| c.formula.as_deref())
    }

    pub fn formula_view(&self) -> SheetView<'_> {
        SheetView { grid: self, mode: ViewMode::Formula }
    }

    pub fn value_view(&self) -> SheetView<'_> {
        SheetView { grid: self, mode: ViewMode::Value }
    }

    fn touch(&mut self, row: usize, col: usize) {
        self.rows = self.rows.max(row + 1);
        self.cols = self.cols.max(col + 1);
    }
}

/// Read-only text view of a sheet.
#[derive(Debug, Clone, Copy)]
pub struct SheetView<'a> {
    grid: &'a SheetGrid,
    mode: ViewMode,
}

impl<'a> SheetView<'a> {
    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn grid(&self) -> &'a SheetGrid {
        self.grid
    }

    pub fn rows(&self) -> usize {
        self.grid.rows
    }

    pub fn cols(&self) -> usize {
        self.grid.cols
    }

    /// Cell text as seen through this view, `None` when blank.
    pub fn text(&self, row: usize, col: usize) -> Option<Cow<'a, str>> {
        let grid: &'a SheetGrid = self.grid;
        let cell = grid.cells.get(&(row, col))?;
        if self.mode == ViewMode::Formula {
            if let Some(f) = &cell.formula {
                return Some(Cow::Borrowed(f.as_str()));
            }
        }
        let text = cell.value.display_text();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Text of a cell only when it holds a string (not a number, bool, or error).
    pub fn string(&self, row: usize, col: usize) -> Option<&'a str> {
        let grid: &'a SheetGrid = self.grid;
        let cell = grid.cells.get(&(row, col))?;
        if self.mode == ViewMode::Formula {
            if let Some(f) = &cell.formula {
                return Some(f.as_str());
            }
        }
        match &cell.value {
            CellValue::Text(s) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A sheet that was listed in the workbook but could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSheet {
    pub name: String,
    pub reason: String,
}

/// All loaded sheets of one workbook, in workbook order.
#[derive(Debug, Clone, Default)]
pub struct WorkbookGrid {
    pub path: PathBuf,
    pub sheets: Vec<SheetGrid>,
    pub skipped: Vec<SkippedSheet>,
}

impl WorkbookGrid {
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf(), ..Default::default() }
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Look up a sheet by exact name, falling back to a case-insensitive match.
    pub fn sheet(&self, name: &str) -> Option<&SheetGrid> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .or_else(|| self.sheets.iter().find(|s| s.name.eq_ignore_ascii_case(name)))
    }

    /// Like [`sheet`](Self::sheet) but explains why a sheet is unavailable.
    pub fn require_sheet(&self, name: &str) -> Result<&SheetGrid, IoError> {
        if let Some(sheet) = self.sheet(name) {
            return Ok(sheet);
        }
        match self.skipped.iter().find(|s| s.name == name) {
            Some(skipped) => Err(IoError::SheetUnreadable { sheet: skipped.name.clone(), reason: skipped.reason.clone() }),
            None => Err(IoError::SheetNotFound(name.to_string())),
        }
    }
}
