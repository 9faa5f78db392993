//! Presentation hints for line items: display format and headline status.
//! Nothing here affects the numbers.

use regex::Regex;

use crate::model::{DisplayFormat, StatementType};

/// Evaluated in order; the first hit decides. Anything else is currency.
const FORMAT_RULES: &[(DisplayFormat, &str)] = &[
    (DisplayFormat::CurrencyPrecise, r"\beps\b|per share"),
    (
        DisplayFormat::Percentage,
        r"margin|\brate\b|%|\bpct\b|percent|growth|\byoy\b|y/y|change|increase|decrease|\bvs\.?|\broe\b|\broa\b|\broic\b|return on|yield|cash conversion",
    ),
    (
        DisplayFormat::Ratio,
        r"ratio|\btimes\b|multiple|coverage|turnover|\bdays\b|\bdso\b|\bdpo\b|\bdio\b|debt.*ebitda|\d+(\.\d+)?x\b",
    ),
    (DisplayFormat::Count, r"shares|\bunits\b|\bcount\b|number of|outstanding|headcount|employees"),
];

const INCOME_KEY_ITEMS: &[&str] = &[
    r"^(total )?(net )?(revenue|revenues|sales)$",
    r"gross (profit|income)",
    r"operating (income|profit)|\bebit\b",
    r"\bebitda\b",
    r"net (income|profit|earnings)|bottom line",
    r"\beps\b|earnings per share",
];

const BALANCE_KEY_ITEMS: &[&str] = &[
    r"total assets",
    r"total debt|total liabilities|long.+debt",
    r"(shareholders|stockholders).+equity|total equity",
    r"^(total )?cash( and (cash )?equivalents)?$|cash equivalents",
    r"working capital",
];

const CASH_FLOW_KEY_ITEMS: &[&str] = &[
    r"operating cash flow|cash from operations|operating activities",
    r"free cash flow|\bfcf\b",
    r"\bcapex\b|capital expenditures?",
    r"net cash flow|net change in cash",
];

/// Compiled format and key-item tables.
#[derive(Debug, Clone)]
pub struct LabelClassifier {
    formats: Vec<(DisplayFormat, Regex)>,
    income: Vec<Regex>,
    balance: Vec<Regex>,
    cash_flow: Vec<Regex>,
}

impl Default for LabelClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelClassifier {
    pub fn new() -> Self {
        let compile = |patterns: &[&str]| -> Vec<Regex> {
            patterns.iter().filter_map(|p| Regex::new(&format!("(?i){p}")).ok()).collect()
        };
        Self {
            formats: FORMAT_RULES
                .iter()
                .filter_map(|(fmt, p)| Regex::new(&format!("(?i){p}")).ok().map(|re| (*fmt, re)))
                .collect(),
            income: compile(INCOME_KEY_ITEMS),
            balance: compile(BALANCE_KEY_ITEMS),
            cash_flow: compile(CASH_FLOW_KEY_ITEMS),
        }
    }

    pub fn format_of(&self, label: &str) -> DisplayFormat {
        let label = label.trim();
        self.formats
            .iter()
            .find(|(_, re)| re.is_match(label))
            .map(|(fmt, _)| *fmt)
            .unwrap_or(DisplayFormat::Currency)
    }

    /// Whether the label is a headline figure for its statement.
    pub fn is_key_item(&self, label: &str, statement_type: StatementType) -> bool {
        let table = match statement_type {
            StatementType::IncomeStatement => &self.income,
            StatementType::BalanceSheet => &self.balance,
            StatementType::CashFlow => &self.cash_flow,
            StatementType::Unknown => return false,
        };
        let label = label.trim();
        table.iter().any(|re| re.is_match(label))
    }

    pub fn classify(&self, label: &str, statement_type: StatementType) -> (DisplayFormat, bool) {
        (self.format_of(label), self.is_key_item(label, statement_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_follow_rule_order() {
        let c = LabelClassifier::new();
        assert_eq!(c.format_of("Diluted EPS"), DisplayFormat::CurrencyPrecise);
        assert_eq!(c.format_of("Dividends per share"), DisplayFormat::CurrencyPrecise);
        assert_eq!(c.format_of("Gross Margin"), DisplayFormat::Percentage);
        assert_eq!(c.format_of("Revenue growth YoY"), DisplayFormat::Percentage);
        assert_eq!(c.format_of("Tax Rate"), DisplayFormat::Percentage);
        assert_eq!(c.format_of("Interest coverage"), DisplayFormat::Ratio);
        assert_eq!(c.format_of("Net Debt / EBITDA"), DisplayFormat::Ratio);
        assert_eq!(c.format_of("DSO"), DisplayFormat::Ratio);
        assert_eq!(c.format_of("Diluted shares outstanding"), DisplayFormat::Count);
        assert_eq!(c.format_of("Revenue"), DisplayFormat::Currency);
    }

    #[test]
    fn word_boundaries_hold() {
        let c = LabelClassifier::new();
        assert_eq!(c.format_of("Accelerated Depreciation"), DisplayFormat::Currency);
        assert_eq!(c.format_of("Operating Expenses"), DisplayFormat::Currency);
        assert_eq!(c.format_of("Accounts Payable"), DisplayFormat::Currency);
    }

    #[test]
    fn key_items_depend_on_statement() {
        let c = LabelClassifier::new();
        assert!(c.is_key_item("Total Revenue", StatementType::IncomeStatement));
        assert!(c.is_key_item("EBITDA", StatementType::IncomeStatement));
        assert!(c.is_key_item("Net Income", StatementType::IncomeStatement));
        assert!(!c.is_key_item("Revenue growth", StatementType::IncomeStatement));
        assert!(!c.is_key_item("SG&A", StatementType::IncomeStatement));

        assert!(c.is_key_item("Total Assets", StatementType::BalanceSheet));
        assert!(c.is_key_item("Total Shareholders' Equity", StatementType::BalanceSheet));
        assert!(c.is_key_item("Cash and Cash Equivalents", StatementType::BalanceSheet));
        assert!(!c.is_key_item("Total Assets", StatementType::CashFlow));

        assert!(c.is_key_item("Free Cash Flow", StatementType::CashFlow));
        assert!(c.is_key_item("Capital Expenditures", StatementType::CashFlow));
        assert!(!c.is_key_item("Revenue", StatementType::Unknown));
    }

    #[test]
    fn classify_returns_both() {
        let c = LabelClassifier::new();
        assert_eq!(
            c.classify("Gross Profit", StatementType::IncomeStatement),
            (DisplayFormat::Currency, true)
        );
        assert_eq!(
            c.classify("Gross Margin %", StatementType::IncomeStatement),
            (DisplayFormat::Percentage, false)
        );
    }
}
