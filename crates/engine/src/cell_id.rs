//! Cell addressing.
//!
//! Coordinates are 0-based internally (`row 0, col 0` is `A1`). Display and
//! parsing use A1 notation.

use serde::{Deserialize, Serialize};

/// Highest column index a workbook can address (XFD).
pub const MAX_COL: usize = 16_383;
/// Highest row index a workbook can address.
pub const MAX_ROW: usize = 1_048_575;

/// A cell position within a single sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddr {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
}

impl CellAddr {
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Parse an A1-style address. `$` markers are accepted and ignored.
    ///
    /// Returns `None` for anything that is not a single in-bounds cell.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let mut chars = s.chars().peekable();

        if chars.peek() == Some(&'$') {
            chars.next();
        }

        let mut letters = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_alphabetic() {
                letters.push(c.to_ascii_uppercase());
                chars.next();
            } else {
                break;
            }
        }
        let col = letters_to_col(&letters)?;

        if chars.peek() == Some(&'$') {
            chars.next();
        }

        let digits: String = chars.collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let row: usize = digits.parse().ok()?;
        if row == 0 || row - 1 > MAX_ROW {
            return None;
        }

        Some(Self { row: row - 1, col })
    }
}

impl std::fmt::Display for CellAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row + 1)
    }
}

/// A cell position qualified by its sheet name.
///
/// Used as the identity of nodes in drill-down dependency trees, where a
/// reference may cross sheets.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    pub sheet: String,
    pub addr: CellAddr,
}

impl CellId {
    pub fn new(sheet: impl Into<String>, row: usize, col: usize) -> Self {
        Self { sheet: sheet.into(), addr: CellAddr::new(row, col) }
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}!{}", format_sheet_name(&self.sheet), self.addr)
    }
}

/// Convert 0-based column index to letter(s): 0 -> A, 25 -> Z, 26 -> AA.
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col + 1;
    while n > 0 {
        n -= 1;
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    result
}

/// Convert column letters to a 0-based index. Case-insensitive.
///
/// At most three letters, bounded by `XFD`.
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() || letters.len() > 3 || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1))
        - 1;
    (col <= MAX_COL).then_some(col)
}

/// Format a sheet name for use as a reference prefix, quoting when needed.
pub fn format_sheet_name(name: &str) -> String {
    let needs_quotes = name.contains(' ')
        || name.contains('!')
        || name.contains('\'')
        || name.contains(':')
        || name.contains('&')
        || name.contains('-')
        || name.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false);

    if needs_quotes {
        format!("'{}'", name.replace('\'', "''"))
    } else {
        name.to_string()
    }
}
