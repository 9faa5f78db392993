use std::collections::BTreeMap;

use crate::classify::LabelClassifier;
use crate::model::{FinancialStatement, LineItem, MatchOutput, PeriodAlignment, StatementType, VarianceRecord};

/// Pick the period of `stmt` to read for `requested`.
///
/// An exact name wins. Otherwise the first period in column order whose name
/// contains, or is contained in, the requested name is used and the result
/// is flagged approximate. `(None, true)` when nothing fits.
pub fn resolve_period(stmt: &FinancialStatement, requested: &str) -> (Option<String>, bool) {
    if stmt.period_to_column.contains_key(requested) {
        return (Some(requested.to_string()), false);
    }
    let fallback = stmt
        .periods
        .iter()
        .find(|p| requested.contains(p.name.as_str()) || p.name.contains(requested))
        .map(|p| p.name.clone());
    (fallback, true)
}

pub fn percentage_variance(old_value: f64, absolute_variance: f64) -> f64 {
    if old_value == 0.0 {
        0.0
    } else {
        absolute_variance * 100.0 / old_value
    }
}

/// Variance of every matched pair for one period, keyed by old label.
///
/// A side with no usable period, or an item with no value in it, reads as 0.
pub fn compute_variances(
    old: &FinancialStatement,
    new: &FinancialStatement,
    period: &str,
    matches: &MatchOutput,
    statement_type: StatementType,
) -> BTreeMap<String, VarianceRecord> {
    let (old_period, old_approx) = resolve_period(old, period);
    let (new_period, new_approx) = resolve_period(new, period);
    let alignment = PeriodAlignment {
        requested: period.to_string(),
        old_period,
        new_period,
        approximate: old_approx || new_approx,
    };
    if alignment.approximate {
        log::warn!(
            "period '{}' aligned approximately: old '{}' uses {:?}, new '{}' uses {:?}",
            period,
            old.sheet_name,
            alignment.old_period,
            new.sheet_name,
            alignment.new_period
        );
    }

    let classifier = LabelClassifier::new();
    let mut out = BTreeMap::new();

    for m in &matches.matched {
        let (Some(old_item), Some(new_item)) = (old.item_by_label(&m.old_label), new.item_by_label(&m.new_label))
        else {
            log::debug!("match '{}' -> '{}' has no line item, skipped", m.old_label, m.new_label);
            continue;
        };

        let read = |item: &LineItem, p: &Option<String>| {
            p.as_deref().and_then(|name| item.value(name)).unwrap_or(0.0)
        };
        let old_value = read(old_item, &alignment.old_period);
        let new_value = read(new_item, &alignment.new_period);
        let absolute_variance = new_value - old_value;
        let (format, is_key_item) = classifier.classify(&m.old_label, statement_type);

        out.insert(
            m.old_label.clone(),
            VarianceRecord {
                line_item: m.old_label.clone(),
                matched_with: (m.old_label != m.new_label).then(|| m.new_label.clone()),
                old_value,
                new_value,
                absolute_variance,
                percentage_variance: percentage_variance(old_value, absolute_variance),
                has_formula: old_item.has_formula() || new_item.has_formula(),
                drill_down_available: !old_item.dependencies.is_empty() || !new_item.dependencies.is_empty(),
                format,
                is_key_item,
                alignment: alignment.clone(),
            },
        );
    }

    log::debug!("{} variance record(s) for period '{}'", out.len(), period);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DisplayFormat, LabelMatch, MatchKind, Period};

    fn statement(sheet: &str, periods: &[&str], rows: &[(&str, &[f64], Option<&str>)]) -> FinancialStatement {
        let periods: Vec<Period> = periods
            .iter()
            .enumerate()
            .map(|(i, name)| Period {
                name: (*name).into(),
                column_index: i as u32 + 1,
                source_sheet: sheet.into(),
                source_row: 1,
            })
            .collect();
        let line_items = rows
            .iter()
            .enumerate()
            .map(|(i, (label, values, formula))| {
                let row_index = i as u32 + 2;
                let values = periods.iter().zip(values.iter()).map(|(p, v)| (p.name.clone(), *v)).collect();
                let item = LineItem {
                    name: (*label).into(),
                    row_index,
                    values,
                    formula: formula.map(String::from),
                    dependencies: formula
                        .map(modelrecon_engine::formula::extract_dependencies)
                        .unwrap_or_default(),
                };
                (row_index, item)
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

    fn matched(pairs: &[(&str, &str)]) -> MatchOutput {
        MatchOutput {
            matched: pairs
                .iter()
                .map(|(o, n)| LabelMatch {
                    old_label: (*o).into(),
                    new_label: (*n).into(),
                    score: 1.0,
                    kind: if o == n { MatchKind::Exact } else { MatchKind::Fuzzy },
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn fifteen_percent_increase() {
        let old = statement("IS", &["FY2025"], &[("Revenue", &[1_000_000.0], None)]);
        let new = statement("IS", &["FY2025"], &[("Revenue", &[1_150_000.0], None)]);
        let out = compute_variances(&old, &new, "FY2025", &matched(&[("Revenue", "Revenue")]), StatementType::IncomeStatement);
        let rec = &out["Revenue"];
        assert_eq!(rec.absolute_variance, 150_000.0);
        assert_eq!(rec.percentage_variance, 15.0);
        assert!(rec.matched_with.is_none());
        assert!(!rec.alignment.approximate);
        assert!(rec.is_key_item);
        assert_eq!(rec.format, DisplayFormat::Currency);
    }

    #[test]
    fn zero_old_value_gives_zero_percent() {
        let old = statement("IS", &["FY2025"], &[("Other income", &[0.0], Some("=B9"))]);
        let new = statement("IS", &["FY2025"], &[("Other income", &[500.0], None)]);
        let out = compute_variances(&old, &new, "FY2025", &matched(&[("Other income", "Other income")]), StatementType::IncomeStatement);
        let rec = &out["Other income"];
        assert_eq!(rec.absolute_variance, 500.0);
        assert_eq!(rec.percentage_variance, 0.0);
        assert!(rec.has_formula);
        assert!(rec.drill_down_available);
    }

    #[test]
    fn fuzzy_pair_records_new_label() {
        let old = statement("IS", &["1Q25"], &[("Total Revenue", &[10.0], None)]);
        let new = statement("IS", &["1Q25"], &[("Total Revenues", &[12.0], None)]);
        let out = compute_variances(&old, &new, "1Q25", &matched(&[("Total Revenue", "Total Revenues")]), StatementType::IncomeStatement);
        assert_eq!(out["Total Revenue"].matched_with.as_deref(), Some("Total Revenues"));
        assert!(!out["Total Revenue"].drill_down_available);
    }

    #[test]
    fn exact_period_preferred() {
        let stmt = statement("IS", &["FY2025E", "FY2025"], &[]);
        assert_eq!(resolve_period(&stmt, "FY2025"), (Some("FY2025".into()), false));
    }

    #[test]
    fn substring_fallback_is_flagged() {
        let old = statement("IS", &["1Q25", "FY2025"], &[("Revenue", &[5.0, 100.0], None)]);
        let new = statement("IS", &["FY2025E"], &[("Revenue", &[110.0], None)]);
        let out = compute_variances(&old, &new, "FY2025", &matched(&[("Revenue", "Revenue")]), StatementType::IncomeStatement);
        let rec = &out["Revenue"];
        assert_eq!(rec.alignment.old_period.as_deref(), Some("FY2025"));
        assert_eq!(rec.alignment.new_period.as_deref(), Some("FY2025E"));
        assert!(rec.alignment.approximate);
        assert_eq!(rec.absolute_variance, 10.0);
    }

    #[test]
    fn fallback_checks_both_directions() {
        let stmt = statement("IS", &["1Q25", "FY2025"], &[]);
        let (period, approximate) = resolve_period(&stmt, "1Q25 Actual");
        assert_eq!(period.as_deref(), Some("1Q25"));
        assert!(approximate);

        let (period, _) = resolve_period(&stmt, "2025");
        assert_eq!(period.as_deref(), Some("FY2025"));
    }

    #[test]
    fn missing_period_reads_zero() {
        let old = statement("IS", &["FY2024"], &[("Revenue", &[100.0], None)]);
        let new = statement("IS", &["FY2025"], &[("Revenue", &[120.0], None)]);
        let out = compute_variances(&old, &new, "FY2025", &matched(&[("Revenue", "Revenue")]), StatementType::IncomeStatement);
        let rec = &out["Revenue"];
        assert_eq!(rec.alignment.old_period, None);
        assert_eq!(rec.old_value, 0.0);
        assert_eq!(rec.new_value, 120.0);
        assert_eq!(rec.percentage_variance, 0.0);
    }
}
