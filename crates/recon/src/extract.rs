//! Line-item extraction beneath the header row.

use std::collections::BTreeMap;

use modelrecon_engine::formula::extract_dependencies;
use modelrecon_io::SheetGrid;

use crate::config::ReconConfig;
use crate::model::{LineItem, Period};
use crate::period::PeriodMatcher;

/// Extract every meaningful row below `header_row` (0-based), keyed by
/// 1-based row number.
pub fn extract_line_items(
    grid: &SheetGrid,
    header_row: usize,
    periods: &[Period],
    config: &ReconConfig,
    matcher: &PeriodMatcher,
) -> BTreeMap<u32, LineItem> {
    let epsilon = config.extract.value_epsilon;
    let mut items = BTreeMap::new();
    let mut skipped = 0usize;

    for row in header_row + 1..grid.rows() {
        let Some(label) = find_label(grid, row, config.structure.label_scan_columns, matcher) else {
            continue;
        };

        let mut values = BTreeMap::new();
        let mut formula: Option<String> = None;
        for period in periods {
            let col = period.column_index as usize;
            let Some(cell) = grid.cell(row, col) else {
                continue;
            };
            if let Some(f) = &cell.formula {
                if formula.is_none() {
                    formula = Some(f.clone());
                }
                let value = cell.value.as_number().unwrap_or_else(|| {
                    log::debug!(
                        "sheet '{}': no cached number for formula at row {} col {}, using 0",
                        grid.name,
                        row + 1,
                        col
                    );
                    0.0
                });
                values.insert(period.name.clone(), value);
            } else if let Some(n) = cell.value.as_number() {
                values.insert(period.name.clone(), n);
            }
        }

        let meaningful = formula.is_some() || values.values().any(|v: &f64| v.abs() > epsilon);
        if !meaningful {
            skipped += 1;
            continue;
        }

        let dependencies = formula.as_deref().map(extract_dependencies).unwrap_or_default();
        let row_index = row as u32 + 1;
        items.insert(row_index, LineItem { name: label, row_index, values, formula, dependencies });
    }

    log::debug!(
        "sheet '{}': {} line item(s), {} labelled row(s) without values",
        grid.name,
        items.len(),
        skipped
    );
    items
}

/// First text in the leading columns that is neither a period nor
/// formatting filler.
pub fn find_label(grid: &SheetGrid, row: usize, scan_columns: usize, matcher: &PeriodMatcher) -> Option<String> {
    let view = grid.value_view();
    (0..scan_columns).find_map(|col| {
        let text = view.string(row, col)?.trim();
        if is_formatting_only(text) || matcher.is_period(text) {
            None
        } else {
            Some(text.to_string())
        }
    })
}

/// Empty text or only rule/bracket characters such as `-----` or `( )`.
fn is_formatting_only(text: &str) -> bool {
    text.chars().all(|c| c.is_whitespace() || "-_=()[]{}|\\/".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeriodConfig;
    use modelrecon_io::CellValue;

    fn periods() -> Vec<Period> {
        ["1Q25", "2Q25"]
            .iter()
            .enumerate()
            .map(|(i, name)| Period {
                name: (*name).into(),
                column_index: i as u32 + 1,
                source_sheet: "IS".into(),
                source_row: 1,
            })
            .collect()
    }

    fn sheet() -> SheetGrid {
        let mut g = SheetGrid::new("IS");
        let t = |s: &str| CellValue::Text(s.into());
        g.set_value(0, 0, t("Line Item"));
        g.set_value(0, 1, t("1Q25"));
        g.set_value(0, 2, t("2Q25"));
        // Revenue: literals
        g.set_value(1, 0, t("Revenue"));
        g.set_value(1, 1, CellValue::Number(100.0));
        g.set_value(1, 2, CellValue::Number(120.0));
        // COGS: formula with cached value
        g.set_value(2, 0, t("COGS"));
        g.set_value(2, 1, CellValue::Number(-40.0));
        g.set_formula(2, 1, "=-B2*0.4");
        // Separator row
        g.set_value(3, 0, t("-----"));
        g.set_value(3, 1, CellValue::Number(1.0));
        // All-zero row
        g.set_value(4, 0, t("Other"));
        g.set_value(4, 1, CellValue::Number(0.0));
        g.set_value(4, 2, CellValue::Number(0.0004));
        // Label in column B, column A blank
        g.set_value(5, 1, t("  Gross Profit "));
        g.set_value(5, 2, CellValue::Number(80.0));
        // Formula whose cached value is text
        g.set_value(6, 0, t("Check"));
        g.set_value(6, 2, t("OK"));
        g.set_formula(6, 2, "=IF(B2>0,\"OK\",\"ERR\")");
        g
    }

    fn extract(grid: &SheetGrid) -> BTreeMap<u32, LineItem> {
        let config = ReconConfig::default();
        let matcher = PeriodMatcher::new(&PeriodConfig::default());
        extract_line_items(grid, 0, &periods(), &config, &matcher)
    }

    #[test]
    fn literals_and_formulas_are_captured() {
        let items = extract(&sheet());
        let revenue = &items[&2];
        assert_eq!(revenue.name, "Revenue");
        assert_eq!(revenue.value("1Q25"), Some(100.0));
        assert_eq!(revenue.value("2Q25"), Some(120.0));
        assert!(revenue.formula.is_none());

        let cogs = &items[&3];
        assert_eq!(cogs.formula.as_deref(), Some("=-B2*0.4"));
        assert_eq!(cogs.value("1Q25"), Some(-40.0));
        assert_eq!(cogs.dependencies, vec!["B2"]);
    }

    #[test]
    fn filler_and_zero_rows_are_dropped() {
        let items = extract(&sheet());
        assert!(!items.contains_key(&4), "separator row kept");
        assert!(!items.contains_key(&5), "near-zero row kept");
    }

    #[test]
    fn label_found_past_blank_column() {
        let items = extract(&sheet());
        assert_eq!(items[&6].name, "Gross Profit");
        assert_eq!(items[&6].value("2Q25"), Some(80.0));
    }

    #[test]
    fn non_numeric_cached_formula_defaults_to_zero() {
        let items = extract(&sheet());
        let check = &items[&7];
        assert_eq!(check.value("2Q25"), Some(0.0));
        assert!(check.has_formula());
    }

    #[test]
    fn values_only_cover_statement_periods() {
        let mut g = sheet();
        g.set_value(1, 5, CellValue::Number(999.0));
        let items = extract(&g);
        assert_eq!(items[&2].values.len(), 2);
    }

    #[test]
    fn period_text_is_not_a_label() {
        let matcher = PeriodMatcher::new(&PeriodConfig::default());
        let mut g = SheetGrid::new("IS");
        g.set_value(0, 0, CellValue::Text("FY2025".into()));
        g.set_value(0, 1, CellValue::Text("Revenue".into()));
        assert_eq!(find_label(&g, 0, 5, &matcher).as_deref(), Some("Revenue"));
        assert_eq!(find_label(&g, 0, 1, &matcher), None);
    }
}
