use modelrecon_io::IoError;
use serde::Serialize;

use crate::model::SheetFailure;

/// Failures confined to one sheet. Sibling sheets keep parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralError {
    /// No row among the scanned rows looks like a period header.
    #[error("sheet '{sheet}': no period header row in the first {scanned} rows")]
    NoHeaderRow { sheet: String, scanned: usize },
    /// The requested sheet does not exist or could not be loaded.
    #[error("sheet '{sheet}' is not available: {reason}")]
    SheetMissing { sheet: String, reason: String },
    /// A header row was found but no period could be recognized in it.
    #[error("sheet '{sheet}': header row {row} holds no recognizable periods")]
    NoPeriods { sheet: String, row: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    /// Sheet-scoped structural failure.
    #[error(transparent)]
    Structural(#[from] StructuralError),
    /// Whole file missing, locked, or not a workbook.
    #[error("file access error: {0}")]
    FileAccess(IoError),
    /// Every requested sheet failed; each failure is listed.
    #[error("all {} requested sheet(s) failed", .failures.len())]
    AllSheetsFailed { failures: Vec<SheetFailure> },
    /// The sheet selection was empty.
    #[error("no sheets requested")]
    NoSheetsRequested,
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config value out of range.
    #[error("config validation error: {0}")]
    ConfigValidation(String),
}

impl ReconError {
    /// Sort an IO failure into the file-level or sheet-level class.
    pub(crate) fn from_io(err: IoError) -> Self {
        if err.is_file_level() {
            return ReconError::FileAccess(err);
        }
        match err {
            IoError::SheetNotFound(sheet) => {
                StructuralError::SheetMissing { sheet, reason: "no such sheet".into() }.into()
            }
            IoError::SheetUnreadable { sheet, reason } => StructuralError::SheetMissing { sheet, reason }.into(),
            other => ReconError::FileAccess(other),
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, ReconError::Structural(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn io_errors_split_by_scope() {
        let err = ReconError::from_io(IoError::NotFound(PathBuf::from("model.xlsx")));
        assert!(matches!(err, ReconError::FileAccess(IoError::NotFound(_))));

        let err = ReconError::from_io(IoError::NoSheets(PathBuf::from("model.xlsx")));
        assert!(!err.is_structural());

        let err = ReconError::from_io(IoError::SheetNotFound("IS".into()));
        assert!(matches!(err, ReconError::Structural(StructuralError::SheetMissing { ref sheet, .. }) if sheet == "IS"));

        let err = ReconError::from_io(IoError::SheetUnreadable { sheet: "BS".into(), reason: "bad xml".into() });
        assert!(err.is_structural());
    }
}
