pub mod cell_id;
pub mod formula;

pub use cell_id::{col_to_letters, format_sheet_name, letters_to_col, CellAddr, CellId};
