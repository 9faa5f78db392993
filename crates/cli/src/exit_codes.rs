//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Scripts branch on these codes, so they do not change once released.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                                |
//! |---------|------------------|--------------------------------------------|
//! | 0       | Universal        | Success                                    |
//! | 1       | Universal        | General error (unspecified)                |
//! | 2       | Universal        | CLI usage error (bad args, no sheets)      |
//! | 3-9     | input            | Workbook, sheet structure and config codes |
//! | 10-19   | drill            | Drill-down codes                           |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `recon_exit_code` or the relevant command

use modelrecon_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
/// A reconciliation with some failed sheets still exits 0; the failures are
/// listed in the report.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Input (3-9)
// =============================================================================

/// Workbook missing, locked, or not a spreadsheet.
pub const EXIT_FILE_ACCESS: u8 = 3;

/// A single requested sheet is missing or has no recognizable header/periods.
pub const EXIT_STRUCTURE: u8 = 4;

/// Every requested sheet of one model failed to parse.
pub const EXIT_ALL_SHEETS_FAILED: u8 = 5;

/// Config file unreadable, malformed, or out of range.
pub const EXIT_CONFIG: u8 = 6;

/// Output could not be written (stdout closed, --output path unwritable).
pub const EXIT_OUTPUT: u8 = 7;

// =============================================================================
// Drill (10-19)
// =============================================================================

/// The line item exists but cannot be drilled (no formula, label or period
/// missing on one side).
pub const EXIT_DRILL_UNAVAILABLE: u8 = 10;

// =============================================================================
// Error mapping
// =============================================================================

/// Map a ReconError to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::FileAccess(_) => EXIT_FILE_ACCESS,
        ReconError::Structural(_) => EXIT_STRUCTURE,
        ReconError::AllSheetsFailed { .. } => EXIT_ALL_SHEETS_FAILED,
        ReconError::NoSheetsRequested => EXIT_USAGE,
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_CONFIG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelrecon_recon::StructuralError;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_FILE_ACCESS,
            EXIT_STRUCTURE,
            EXIT_ALL_SHEETS_FAILED,
            EXIT_CONFIG,
            EXIT_OUTPUT,
            EXIT_DRILL_UNAVAILABLE,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn recon_errors_map_to_registry() {
        let structural = ReconError::from(StructuralError::NoHeaderRow { sheet: "IS".into(), scanned: 10 });
        assert_eq!(recon_exit_code(&structural), EXIT_STRUCTURE);
        assert_eq!(recon_exit_code(&ReconError::NoSheetsRequested), EXIT_USAGE);
        assert_eq!(recon_exit_code(&ReconError::ConfigParse("bad".into())), EXIT_CONFIG);
        assert_eq!(recon_exit_code(&ReconError::AllSheetsFailed { failures: vec![] }), EXIT_ALL_SHEETS_FAILED);
    }
}
