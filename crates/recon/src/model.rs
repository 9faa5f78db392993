use std::collections::BTreeMap;
use std::str::FromStr;

use modelrecon_engine::formula::Operator;
use serde::{Deserialize, Serialize};

use crate::error::StructuralError;
use crate::template::TemplateHint;

// ---------------------------------------------------------------------------
// Statement types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    IncomeStatement,
    BalanceSheet,
    CashFlow,
    Unknown,
}

impl StatementType {
    /// The three recognized statement kinds, in reporting order.
    pub const ALL: [StatementType; 3] =
        [StatementType::IncomeStatement, StatementType::BalanceSheet, StatementType::CashFlow];
}

impl std::fmt::Display for StatementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IncomeStatement => write!(f, "income_statement"),
            Self::BalanceSheet => write!(f, "balance_sheet"),
            Self::CashFlow => write!(f, "cash_flow"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for StatementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "income_statement" | "income" | "is" | "p&l" | "pnl" => Ok(Self::IncomeStatement),
            "balance_sheet" | "balance" | "bs" => Ok(Self::BalanceSheet),
            "cash_flow" | "cashflow" | "cf" => Ok(Self::CashFlow),
            other => Err(format!(
                "unknown statement type '{other}' (expected income_statement, balance_sheet or cash_flow)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Periods
// ---------------------------------------------------------------------------

/// One reporting column. Identity is the verbatim header text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Period {
    pub name: String,
    /// 0-based column (`A` = 0)
    pub column_index: u32,
    pub source_sheet: String,
    /// 1-based spreadsheet row the header text was found on
    pub source_row: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PeriodCategories {
    pub annual: Vec<String>,
    pub quarterly: Vec<String>,
    pub other: Vec<String>,
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    /// Verbatim label
    pub name: String,
    /// 1-based spreadsheet row
    pub row_index: u32,
    /// Values keyed by period name; only periods of the owning statement
    pub values: BTreeMap<String, f64>,
    /// Formula of the first period column that holds one
    pub formula: Option<String>,
    /// Cell references of `formula`, unique, in order of appearance
    pub dependencies: Vec<String>,
}

impl LineItem {
    pub fn value(&self, period: &str) -> Option<f64> {
        self.values.get(period).copied()
    }

    pub fn has_formula(&self) -> bool {
        self.formula.is_some()
    }
}

/// Periods and line items extracted from one sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialStatement {
    pub sheet_name: String,
    /// 1-based row holding the period headers
    pub header_row: u32,
    /// Spreadsheet column order
    pub periods: Vec<Period>,
    pub line_items: BTreeMap<u32, LineItem>,
    pub period_to_column: BTreeMap<String, u32>,
}

impl FinancialStatement {
    pub fn period_names(&self) -> Vec<&str> {
        self.periods.iter().map(|p| p.name.as_str()).collect()
    }

    /// First line item (top-down) carrying this exact label.
    pub fn item_by_label(&self, label: &str) -> Option<&LineItem> {
        self.line_items.values().find(|item| item.name == label)
    }

    /// Rows whose label already appeared higher up. Label lookups resolve to
    /// the first row, so these are never matched or compared.
    pub fn shadowed_rows(&self) -> Vec<ShadowedRow> {
        let mut first_rows: BTreeMap<&str, u32> = BTreeMap::new();
        let mut out = Vec::new();
        for item in self.line_items.values() {
            match first_rows.get(item.name.as_str()) {
                Some(&first_row) => out.push(ShadowedRow { label: item.name.clone(), row: item.row_index, first_row }),
                None => {
                    first_rows.insert(item.name.as_str(), item.row_index);
                }
            }
        }
        out
    }

    /// Distinct labels in row order.
    pub fn labels(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::with_capacity(self.line_items.len());
        for item in self.line_items.values() {
            if !out.contains(&item.name.as_str()) {
                out.push(item.name.as_str());
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Parse outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetFailure {
    pub statement_type: StatementType,
    pub sheet_name: String,
    pub error: StructuralError,
}

impl std::fmt::Display for SheetFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.sheet_name, self.statement_type, self.error)
    }
}

/// User-confirmed sheet roles for each side of a reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSelection {
    pub old: BTreeMap<StatementType, String>,
    pub new: BTreeMap<StatementType, String>,
}

impl SheetSelection {
    /// Same sheet names on both sides.
    pub fn both(roles: BTreeMap<StatementType, String>) -> Self {
        Self { old: roles.clone(), new: roles }
    }
}

/// Result of a multi-sheet parse. Succeeds when at least one sheet parsed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseOutcome {
    pub statements: BTreeMap<StatementType, FinancialStatement>,
    pub failures: Vec<SheetFailure>,
}

/// One sheet of a workbook as seen by discovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetSummary {
    pub name: String,
    pub statement_type: StatementType,
    /// 1-based header row, when one was found
    pub header_row: Option<u32>,
    pub period_count: usize,
    pub period_kinds: PeriodCategories,
    /// Patterns the header periods follow, usable as `periods.templates`
    pub templates: Vec<TemplateHint>,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelMatch {
    pub old_label: String,
    pub new_label: String,
    /// Normalized similarity; 1.0 for exact matches
    pub score: f64,
    pub kind: MatchKind,
}

/// A line item hidden behind an earlier row with the same label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShadowedRow {
    pub label: String,
    /// 1-based row of the hidden item
    pub row: u32,
    /// 1-based row the label resolves to
    pub first_row: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchOutput {
    pub matched: Vec<LabelMatch>,
    pub old_only: Vec<String>,
    pub new_only: Vec<String>,
    /// Repeated-label rows left out of matching
    pub old_shadowed: Vec<ShadowedRow>,
    pub new_shadowed: Vec<ShadowedRow>,
}

impl MatchOutput {
    /// Matched `(old_label, new_label)` pairs.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.matched.iter().map(|m| (m.old_label.clone(), m.new_label.clone())).collect()
    }
}

// ---------------------------------------------------------------------------
// Variance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFormat {
    Currency,
    /// Per-share figures shown with more decimals
    CurrencyPrecise,
    Percentage,
    Ratio,
    Count,
}

impl std::fmt::Display for DisplayFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Currency => write!(f, "currency"),
            Self::CurrencyPrecise => write!(f, "currency_precise"),
            Self::Percentage => write!(f, "percentage"),
            Self::Ratio => write!(f, "ratio"),
            Self::Count => write!(f, "count"),
        }
    }
}

/// Which period each side was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodAlignment {
    pub requested: String,
    pub old_period: Option<String>,
    pub new_period: Option<String>,
    /// Set when either side fell back to a substring match or found nothing
    pub approximate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarianceRecord {
    pub line_item: String,
    /// New-side label when it differs from `line_item`
    pub matched_with: Option<String>,
    pub old_value: f64,
    pub new_value: f64,
    pub absolute_variance: f64,
    pub percentage_variance: f64,
    pub has_formula: bool,
    pub drill_down_available: bool,
    pub format: DisplayFormat,
    pub is_key_item: bool,
    pub alignment: PeriodAlignment,
}

// ---------------------------------------------------------------------------
// Consistency
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyCheck {
    pub structure_match: bool,
    pub naming_consistency: f64,
    pub period_alignment_possible: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub compatibility_score: f64,
}

// ---------------------------------------------------------------------------
// Drill-down
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaComplexity {
    pub reference_count: usize,
    pub estimated_depth: usize,
    pub has_cross_sheet_refs: bool,
    pub has_external_refs: bool,
    pub main_function: Option<String>,
    pub complexity: ComplexityLevel,
    pub top_level_operator: Option<Operator>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrillDownPreview {
    pub can_drill_down: bool,
    pub reason: Option<String>,
    pub complexity: Option<FormulaComplexity>,
}

/// Node of a dependency tree, rooted at the drilled cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaComponent {
    pub name: String,
    pub cell_reference: String,
    pub value: f64,
    pub is_leaf: bool,
    pub formula: Option<String>,
    /// False when the reference could not be read; `value` is then 0
    pub resolved: bool,
    pub children: Vec<FormulaComponent>,
}

/// Direct input of the drilled cell with its share of the change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentContribution {
    pub name: String,
    pub cell_reference: String,
    /// New-version value
    pub value: f64,
    pub variance_contribution: f64,
    pub is_leaf: bool,
    pub has_formula: bool,
}

/// Attribution of one cell's change to its inputs.
///
/// Leaf deltas are summed; whatever the formula's operators add beyond a
/// plain sum lands in `unexplained_variance`. This is an approximation, not
/// an algebraic decomposition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrillDownResult {
    pub source_item: String,
    /// New-version value of the drilled cell
    pub source_value: f64,
    pub old_value: f64,
    pub total_variance: f64,
    pub total_explained: f64,
    pub unexplained_variance: f64,
    pub drill_down_path: Vec<String>,
    pub components: Vec<ComponentContribution>,
    pub warnings: Vec<String>,
    pub old_tree: FormulaComponent,
    pub new_tree: FormulaComponent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DrillDownOutcome {
    Available(Box<DrillDownResult>),
    Unavailable { reason: String },
}

// ---------------------------------------------------------------------------
// Reconciliation report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub engine_version: String,
    pub run_at: String,
    pub old_file: String,
    pub new_file: String,
    pub period: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatementRecon {
    pub statement_type: StatementType,
    pub old_sheet: String,
    pub new_sheet: String,
    pub matches: MatchOutput,
    pub variances: BTreeMap<String, VarianceRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconReport {
    pub meta: ReconMeta,
    pub statements: Vec<StatementRecon>,
    pub old_failures: Vec<SheetFailure>,
    pub new_failures: Vec<SheetFailure>,
    pub consistency: ConsistencyCheck,
}
