//! `modelrecon-recon`: reconciliation of two versions of a financial model.
//!
//! Works on the normalized grids produced by `modelrecon-io`: finds the
//! period header and line items of each selected sheet, matches line items
//! across versions, computes variances and traces formula dependencies to
//! attribute a change to its inputs.

pub mod classify;
pub mod config;
pub mod consistency;
pub mod drilldown;
pub mod engine;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod model;
pub mod period;
pub mod structure;
pub mod template;
pub mod variance;

pub use config::ReconConfig;
pub use consistency::check_consistency;
pub use engine::{
    common_sheets, discover_sheets, drill_down, parse_sheet, parse_statement, parse_statements, preview_drill_down,
    reconcile,
};
pub use error::{ReconError, StructuralError};
pub use matcher::match_line_items;
pub use model::{
    DrillDownOutcome, DrillDownPreview, DrillDownResult, FinancialStatement, LineItem, MatchOutput, ParseOutcome,
    Period, ReconReport, SheetSelection, SheetSummary, StatementType, VarianceRecord,
};
pub use period::sort_chronologically;
pub use template::{categorize_periods, suggest_templates, template_hints, PeriodTemplate, TemplateHint};
pub use variance::compute_variances;
