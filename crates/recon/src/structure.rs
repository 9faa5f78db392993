//! Structural inference: what kind of statement a sheet holds and which row
//! carries its period headers.

use modelrecon_io::SheetGrid;

use crate::config::StructureConfig;
use crate::error::StructuralError;
use crate::model::StatementType;
use crate::period::PeriodMatcher;

/// Sheet-name keywords, checked in order. First hit decides.
const NAME_KEYWORDS: &[(StatementType, &[&str])] = &[
    (StatementType::IncomeStatement, &["income", "p&l", "profit", "loss", "revenue", "sales", "earnings"]),
    (StatementType::BalanceSheet, &["balance", "assets", "liabilities", "equity"]),
    (StatementType::CashFlow, &["cash", "flow", "operating", "investing", "financing"]),
];

/// Content keywords; each distinct keyword present scores one point.
const CONTENT_KEYWORDS: &[(StatementType, &[&str])] = &[
    (
        StatementType::IncomeStatement,
        &[
            "income", "profit", "loss", "p&l", "revenue", "sales", "ebitda", "ebit", "operating", "gross profit",
            "net income", "earnings", "margin",
        ],
    ),
    (
        StatementType::BalanceSheet,
        &[
            "balance", "sheet", "assets", "liabilities", "equity", "cash", "debt", "current assets", "fixed assets",
            "retained earnings", "stockholder",
        ],
    ),
    (
        StatementType::CashFlow,
        &[
            "cash flow", "operating cash", "investing", "financing", "capex", "free cash flow", "working capital",
            "depreciation",
        ],
    ),
];

const SAMPLE_ROWS: usize = 15;
const SAMPLE_COLS: usize = 10;

/// Classify a sheet by name, then by sampled content.
pub fn detect_statement_type(grid: &SheetGrid) -> StatementType {
    let by_name = classify_by_name(&grid.name);
    if by_name != StatementType::Unknown {
        return by_name;
    }

    let view = grid.value_view();
    let mut sample = String::new();
    for row in 0..SAMPLE_ROWS.min(grid.rows()) {
        for col in 0..SAMPLE_COLS.min(grid.cols()) {
            if let Some(text) = view.string(row, col) {
                sample.push_str(text);
                sample.push(' ');
            }
        }
    }
    classify_by_content(&sample)
}

pub fn classify_by_name(name: &str) -> StatementType {
    let lower = name.to_lowercase();
    NAME_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(kind, _)| *kind)
        .unwrap_or(StatementType::Unknown)
}

/// Highest non-zero keyword score wins; a tie at the top is `Unknown`.
pub fn classify_by_content(text: &str) -> StatementType {
    let lower = text.to_lowercase();
    let scores: Vec<(StatementType, usize)> = CONTENT_KEYWORDS
        .iter()
        .map(|(kind, words)| (*kind, words.iter().filter(|w| lower.contains(*w)).count()))
        .collect();

    let best = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
    if best == 0 {
        return StatementType::Unknown;
    }
    let mut leaders = scores.iter().filter(|(_, s)| *s == best);
    match (leaders.next(), leaders.next()) {
        (Some((kind, _)), None) => *kind,
        _ => StatementType::Unknown,
    }
}

/// Find the period-header row (0-based).
///
/// The first of the scanned rows with enough period-like cells outside
/// column A wins. Numbers count through their display text, so a row of
/// numeric years qualifies.
pub fn find_header_row(
    grid: &SheetGrid,
    config: &StructureConfig,
    matcher: &PeriodMatcher,
) -> Result<usize, StructuralError> {
    let view = grid.value_view();
    let rows = config.header_scan_rows.min(grid.rows());

    for row in 0..rows {
        let hits = (1..grid.cols())
            .filter(|&col| match grid.value(row, col).as_number() {
                Some(n) => matcher.is_year_value(n),
                None => view.text(row, col).map(|text| matcher.looks_like_header_cell(&text)).unwrap_or(false),
            })
            .count();
        if hits >= config.min_header_period_cells {
            log::debug!("sheet '{}': header row {} ({} period-like cells)", grid.name, row + 1, hits);
            return Ok(row);
        }
    }

    log::warn!("sheet '{}': no header row in the first {} rows", grid.name, config.header_scan_rows);
    Err(StructuralError::NoHeaderRow { sheet: grid.name.clone(), scanned: config.header_scan_rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeriodConfig;
    use modelrecon_io::CellValue;

    fn grid_with_rows(name: &str, rows: &[&[&str]]) -> SheetGrid {
        let mut grid = SheetGrid::new(name);
        for (r, cells) in rows.iter().enumerate() {
            for (c, text) in cells.iter().enumerate() {
                if !text.is_empty() {
                    grid.set_value(r, c, CellValue::Text((*text).into()));
                }
            }
        }
        grid
    }

    #[test]
    fn name_keywords_win_first() {
        assert_eq!(classify_by_name("Income Statement"), StatementType::IncomeStatement);
        assert_eq!(classify_by_name("P&L"), StatementType::IncomeStatement);
        assert_eq!(classify_by_name("Balance Sheet"), StatementType::BalanceSheet);
        assert_eq!(classify_by_name("Cash Flow"), StatementType::CashFlow);
        assert_eq!(classify_by_name("Sheet1"), StatementType::Unknown);
        assert_eq!(classify_by_name("Drivers"), StatementType::Unknown);
    }

    #[test]
    fn content_scoring_picks_highest() {
        assert_eq!(
            classify_by_content("Revenue Gross Profit EBITDA Net Income"),
            StatementType::IncomeStatement
        );
        assert_eq!(
            classify_by_content("Capex Depreciation Working capital"),
            StatementType::CashFlow
        );
        assert_eq!(classify_by_content("Headcount Notes"), StatementType::Unknown);
    }

    #[test]
    fn content_tie_is_unknown() {
        // "debt" scores balance sheet once, "capex" scores cash flow once
        assert_eq!(classify_by_content("debt capex"), StatementType::Unknown);
    }

    #[test]
    fn detect_falls_back_to_content() {
        let grid = grid_with_rows("Model", &[&["Total Assets"], &["Liabilities"], &["Equity"]]);
        assert_eq!(detect_statement_type(&grid), StatementType::BalanceSheet);
    }

    #[test]
    fn header_row_found_below_title_rows() {
        let grid = grid_with_rows(
            "IS",
            &[
                &["Acme Corp"],
                &["($ in millions)"],
                &[],
                &[],
                &[],
                &["Line Item", "1Q25", "2Q25", "3Q25E"],
                &["Revenue", "", "", ""],
            ],
        );
        let matcher = PeriodMatcher::new(&PeriodConfig::default());
        let row = find_header_row(&grid, &StructureConfig::default(), &matcher).unwrap();
        assert_eq!(row, 5);
    }

    #[test]
    fn numeric_years_qualify_as_header() {
        let mut grid = SheetGrid::new("IS");
        grid.set_value(0, 0, CellValue::Text("Item".into()));
        for (c, year) in [2022.0, 2023.0, 2024.0].iter().enumerate() {
            grid.set_value(0, c + 1, CellValue::Number(*year));
        }
        let matcher = PeriodMatcher::new(&PeriodConfig::default());
        assert_eq!(find_header_row(&grid, &StructureConfig::default(), &matcher), Ok(0));
    }

    #[test]
    fn amounts_row_above_header_is_skipped() {
        let mut grid = grid_with_rows(
            "IS",
            &[&["Acme Corp"], &["Shares outstanding"], &[], &["Line Item", "1Q25", "2Q25", "3Q25E"], &["Revenue"]],
        );
        for (c, amount) in [120000.0, 120500.0, 120800.0].iter().enumerate() {
            grid.set_value(1, c + 1, CellValue::Number(*amount));
        }
        grid.set_value(4, 1, CellValue::Number(10.0));
        let matcher = PeriodMatcher::new(&PeriodConfig::default());
        assert_eq!(find_header_row(&grid, &StructureConfig::default(), &matcher), Ok(3));
    }

    #[test]
    fn amounts_as_text_are_not_header_cells() {
        let matcher = PeriodMatcher::new(&PeriodConfig::default());
        assert!(!matcher.looks_like_header_cell("120000"));
        assert!(!matcher.looks_like_header_cell("120,500"));
        assert!(matcher.looks_like_header_cell("Budget 2025"));
        assert!(!matcher.is_year_value(2015.5));
        assert!(!matcher.is_year_value(120000.0));
        assert!(matcher.is_year_value(2024.0));
    }

    #[test]
    fn column_a_does_not_count() {
        let grid = grid_with_rows("IS", &[&["FY2024", "FY2025", "Notes", "FY2026"]]);
        let matcher = PeriodMatcher::new(&PeriodConfig::default());
        let err = find_header_row(&grid, &StructureConfig::default(), &matcher).unwrap_err();
        assert!(matches!(err, StructuralError::NoHeaderRow { .. }));
    }

    #[test]
    fn missing_header_row_is_an_error() {
        let grid = grid_with_rows("Notes", &[&["Just", "some", "text"], &["and", "more", "words"]]);
        let matcher = PeriodMatcher::new(&PeriodConfig::default());
        let err = find_header_row(&grid, &StructureConfig::default(), &matcher).unwrap_err();
        assert_eq!(err, StructuralError::NoHeaderRow { sheet: "Notes".into(), scanned: 10 });
    }
}
