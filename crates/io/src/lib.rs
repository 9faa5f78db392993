// Workbook loading

pub mod error;
pub mod grid;
pub mod xlsx;

pub use error::IoError;
pub use grid::{CellValue, GridCell, SheetGrid, SheetView, SkippedSheet, ViewMode, WorkbookGrid};
pub use xlsx::{list_sheet_names, open_sheets, open_workbook};
