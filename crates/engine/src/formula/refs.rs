//! Reference extraction from formula source.
//!
//! Scans the token stream for cell references and ranges, keeping any sheet
//! or external-workbook qualifier. Used both for the dependency list stored on
//! line items and for walking formulas during drill-down.

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::cell_id::{format_sheet_name, CellAddr};

use super::lexer::{tokenize, Token};

/// A single cell or rectangular range referenced by a formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormulaRef {
    /// External workbook qualifier (`[1]` or `[Book.xlsx]`)
    pub workbook: Option<String>,
    /// Sheet qualifier; `None` means the formula's own sheet
    pub sheet: Option<String>,
    /// Top-left cell
    pub start: CellAddr,
    /// Bottom-right cell for ranges
    pub end: Option<CellAddr>,
    /// Canonical reference text, e.g. `Drivers!$B$2:B4`
    pub text: String,
}

impl FormulaRef {
    pub fn is_external(&self) -> bool {
        self.workbook.is_some()
    }

    pub fn is_range(&self) -> bool {
        self.end.is_some()
    }

    /// Number of cells covered by this reference.
    pub fn cell_count(&self) -> usize {
        match self.end {
            None => 1,
            Some(end) => (end.row - self.start.row + 1) * (end.col - self.start.col + 1),
        }
    }

    /// Cells covered by this reference in row-major order, produced lazily so
    /// whole-column ranges can be cut short.
    pub fn cells(&self) -> impl Iterator<Item = CellAddr> {
        let start = self.start;
        let end = self.end.unwrap_or(start);
        (start.row..=end.row).flat_map(move |row| (start.col..=end.col).map(move |col| CellAddr::new(row, col)))
    }
}

/// Extract every reference in formula order. Duplicates are kept.
///
/// # Known Limitations
///
/// - Whole-column and whole-row references (`A:A`, `3:3`) are not reported.
/// - Dynamic references (INDIRECT, OFFSET) and defined names cannot be
///   resolved lexically and are skipped.
pub fn scan_references(formula: &str) -> Vec<FormulaRef> {
    let tokens = tokenize(formula);
    let mut refs = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let (workbook, sheet, first) = match (&tokens[i], tokens.get(i + 1)) {
            (Token::SheetPrefix { workbook, sheet }, Some(next @ Token::CellRef { .. })) => {
                i += 2;
                (workbook.clone(), Some(sheet.clone()), next)
            }
            (tok @ Token::CellRef { .. }, _) => {
                i += 1;
                (None, None, tok)
            }
            _ => {
                i += 1;
                continue;
            }
        };

        // Range tail: `:B4` or `:Sheet!B4` (second qualifier must match or is ignored)
        let mut second = None;
        if tokens.get(i) == Some(&Token::Colon) {
            match (tokens.get(i + 1), tokens.get(i + 2)) {
                (Some(tok @ Token::CellRef { .. }), _) => {
                    second = Some(tok);
                    i += 2;
                }
                (Some(Token::SheetPrefix { .. }), Some(tok @ Token::CellRef { .. })) => {
                    second = Some(tok);
                    i += 3;
                }
                _ => {}
            }
        }

        refs.push(build_ref(workbook, sheet, first, second));
    }

    refs
}

/// Unique reference texts in first-seen order.
pub fn extract_dependencies(formula: &str) -> Vec<String> {
    let mut seen = FxHashSet::default();
    scan_references(formula)
        .into_iter()
        .filter_map(|r| seen.insert(r.text.clone()).then_some(r.text))
        .collect()
}

fn build_ref(workbook: Option<String>, sheet: Option<String>, first: &Token, second: Option<&Token>) -> FormulaRef {
    let (a, a_text) = cell_parts(first);
    let mut text = String::new();
    if let Some(book) = &workbook {
        text.push('[');
        text.push_str(book);
        text.push(']');
    }
    if let Some(name) = &sheet {
        if workbook.is_some() {
            text.push_str(name);
        } else {
            text.push_str(&format_sheet_name(name));
        }
        text.push('!');
    }
    text.push_str(&a_text);

    let (start, end) = match second {
        Some(tok) => {
            let (b, b_text) = cell_parts(tok);
            text.push(':');
            text.push_str(&b_text);
            (
                CellAddr::new(a.row.min(b.row), a.col.min(b.col)),
                Some(CellAddr::new(a.row.max(b.row), a.col.max(b.col))),
            )
        }
        None => (a, None),
    };

    FormulaRef { workbook, sheet, start, end, text }
}

fn cell_parts(tok: &Token) -> (CellAddr, String) {
    match tok {
        Token::CellRef { col, row, col_abs, row_abs } => {
            let addr = CellAddr::new(*row, *col);
            let col_str = crate::cell_id::col_to_letters(*col);
            let text = format!(
                "{}{}{}{}",
                if *col_abs { "$" } else { "" },
                col_str,
                if *row_abs { "$" } else { "" },
                row + 1
            );
            (addr, text)
        }
        // Callers only pass CellRef tokens
        _ => (CellAddr::new(0, 0), String::new()),
    }
}
