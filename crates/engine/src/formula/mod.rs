//! Static formula analysis.
//!
//! Formulas are never evaluated here. The lexer turns formula source into a
//! flat token stream; reference extraction and complexity profiling read that
//! stream.

pub mod analyze;
pub mod lexer;
pub mod refs;

pub use analyze::{analyze_formula, negates_at_top_level, top_level_operator, FormulaProfile};
pub use lexer::{tokenize, Operator, Token};
pub use refs::{extract_dependencies, scan_references, FormulaRef};
