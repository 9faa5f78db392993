//! Errors raised while opening workbooks.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The path does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The path exists but cannot be opened.
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// The file could be opened but is not a readable workbook.
    #[error("cannot read workbook {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    /// The workbook has no sheet with this name.
    #[error("sheet '{0}' not found")]
    SheetNotFound(String),

    /// The sheet exists but its cells could not be loaded.
    #[error("sheet '{sheet}' could not be read: {reason}")]
    SheetUnreadable { sheet: String, reason: String },

    /// The workbook contains no sheets at all.
    #[error("workbook contains no sheets: {}", .0.display())]
    NoSheets(PathBuf),
}

impl IoError {
    /// True when the whole file is inaccessible, as opposed to a single sheet.
    pub fn is_file_level(&self) -> bool {
        matches!(
            self,
            IoError::NotFound(_) | IoError::PermissionDenied(_) | IoError::Unreadable { .. } | IoError::NoSheets(_)
        )
    }
}
