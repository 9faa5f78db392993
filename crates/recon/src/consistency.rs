use std::collections::{BTreeMap, BTreeSet};

use crate::model::{ConsistencyCheck, FinancialStatement, StatementType};

const STRUCTURE_WEIGHT: f64 = 0.4;
const NAMING_WEIGHT: f64 = 0.3;
const PERIOD_WEIGHT: f64 = 0.3;

/// Compare the shape of two parsed models before reconciling them.
pub fn check_consistency(
    old: &BTreeMap<StatementType, FinancialStatement>,
    new: &BTreeMap<StatementType, FinancialStatement>,
) -> ConsistencyCheck {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    let present = |model: &BTreeMap<StatementType, FinancialStatement>| -> Vec<bool> {
        StatementType::ALL.iter().map(|t| model.contains_key(t)).collect()
    };
    let structure_match = present(old) == present(new);
    if !structure_match {
        issues.push("Different financial statements found between models".to_string());
    }

    let period_names = |model: &BTreeMap<StatementType, FinancialStatement>| -> BTreeSet<String> {
        model.values().flat_map(|s| s.periods.iter().map(|p| p.name.clone())).collect()
    };
    let period_alignment_possible = !period_names(old).is_disjoint(&period_names(new));
    if !period_alignment_possible {
        warnings.push("No common periods found - may limit comparison capabilities".to_string());
    }

    let naming_consistency = match (
        old.get(&StatementType::IncomeStatement),
        new.get(&StatementType::IncomeStatement),
    ) {
        (Some(o), Some(n)) => {
            let o: BTreeSet<&str> = o.labels().into_iter().collect();
            let n: BTreeSet<&str> = n.labels().into_iter().collect();
            let union = o.union(&n).count();
            if union == 0 {
                1.0
            } else {
                o.intersection(&n).count() as f64 / union as f64
            }
        }
        _ => 1.0,
    };

    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    let compatibility_score = STRUCTURE_WEIGHT * flag(structure_match)
        + NAMING_WEIGHT * naming_consistency
        + PERIOD_WEIGHT * flag(period_alignment_possible);

    log::info!(
        "consistency: structure_match={}, naming={:.2}, periods_align={}, score={:.2}",
        structure_match,
        naming_consistency,
        period_alignment_possible,
        compatibility_score
    );

    ConsistencyCheck {
        structure_match,
        naming_consistency,
        period_alignment_possible,
        issues,
        warnings,
        compatibility_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LineItem, Period};

    fn stmt(sheet: &str, periods: &[&str], labels: &[&str]) -> FinancialStatement {
        let periods: Vec<Period> = periods
            .iter()
            .enumerate()
            .map(|(i, n)| Period { name: (*n).into(), column_index: i as u32 + 1, source_sheet: sheet.into(), source_row: 1 })
            .collect();
        let line_items = labels
            .iter()
            .enumerate()
            .map(|(i, l)| {
                let row = i as u32 + 2;
                (
                    row,
                    LineItem {
                        name: (*l).into(),
                        row_index: row,
                        values: BTreeMap::new(),
                        formula: Some("=1".into()),
                        dependencies: Vec::new(),
                    },
                )
            })
            .collect();
        FinancialStatement {
            sheet_name: sheet.into(),
            header_row: 1,
            period_to_column: periods.iter().map(|p| (p.name.clone(), p.column_index)).collect(),
            periods,
            line_items,
        }
    }

    #[test]
    fn identical_models_score_one() {
        let mut old = BTreeMap::new();
        old.insert(StatementType::IncomeStatement, stmt("IS", &["FY2024", "FY2025"], &["Revenue", "COGS"]));
        let new = old.clone();
        let check = check_consistency(&old, &new);
        assert!(check.structure_match);
        assert!(check.period_alignment_possible);
        assert_eq!(check.naming_consistency, 1.0);
        assert!((check.compatibility_score - 1.0).abs() < 1e-9);
        assert!(check.issues.is_empty());
        assert!(check.warnings.is_empty());
    }

    #[test]
    fn mismatched_structure_and_periods() {
        let mut old = BTreeMap::new();
        old.insert(StatementType::IncomeStatement, stmt("IS", &["FY2024"], &["Revenue", "COGS", "EBIT"]));
        old.insert(StatementType::BalanceSheet, stmt("BS", &["FY2024"], &["Total Assets"]));
        let mut new = BTreeMap::new();
        new.insert(StatementType::IncomeStatement, stmt("P&L", &["FY2025"], &["Revenue", "COGS", "EBITDA"]));

        let check = check_consistency(&old, &new);
        assert!(!check.structure_match);
        assert!(!check.period_alignment_possible);
        assert_eq!(check.issues.len(), 1);
        assert_eq!(check.warnings.len(), 1);
        // 2 common of 4 distinct labels
        assert_eq!(check.naming_consistency, 0.5);
        assert!((check.compatibility_score - 0.15).abs() < 1e-9);
    }

    #[test]
    fn naming_defaults_without_income_statement() {
        let mut old = BTreeMap::new();
        old.insert(StatementType::CashFlow, stmt("CF", &["1Q25"], &["Capex"]));
        let mut new = BTreeMap::new();
        new.insert(StatementType::CashFlow, stmt("CF", &["1Q25", "2Q25"], &["FCF"]));
        let check = check_consistency(&old, &new);
        assert_eq!(check.naming_consistency, 1.0);
        assert!(check.period_alignment_possible);
    }
}
