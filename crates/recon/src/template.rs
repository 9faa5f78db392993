//! Period templates.
//!
//! A template generalizes an observed period (`FY1Q25`) into a pattern
//! (`FY{Q}Q{YY}[E]`) that expands into every literal over a year range.
//! Placeholders: `{Q}` quarter 1-4, `{YY}` two-digit year, `{YYYY}` four-digit
//! year, `{WW}` week 01-53. Optional suffixes: `[E]` and `[Actual]`.

use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;

use crate::model::{Period, PeriodCategories};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Annual,
    Quarterly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodTemplate {
    pub name: String,
    pub pattern: String,
    pub example: String,
    pub kind: PeriodKind,
}

/// Observed shape → (name, pattern, kind). Checked in order, case-sensitive.
const REVERSE_RULES: &[(&str, &str, &str, PeriodKind)] = &[
    (r"^FY\d{4}E?$", "Annual FY format", "FY{YYYY}[E]", PeriodKind::Annual),
    (r"^FY[1-4]Q\d{2}E?$", "Quarterly FY format", "FY{Q}Q{YY}[E]", PeriodKind::Quarterly),
    (r"^\d{4}E?$", "Simple annual format", "{YYYY}[E]", PeriodKind::Annual),
    (r"^[1-4]Q\d{2}E?$", "Simple quarterly format", "{Q}Q{YY}[E]", PeriodKind::Quarterly),
    (r"^Q[1-4]\s+\d{4}$", "Quarterly Q format", "Q{Q} {YYYY}", PeriodKind::Quarterly),
    (r"^\d{4}-\d{2}$", "Year-week format", "{YYYY}-{WW}", PeriodKind::Annual),
];

const PLACEHOLDERS: [&str; 4] = ["{Q}", "{YY}", "{YYYY}", "{WW}"];

impl PeriodTemplate {
    /// Generalize an observed period. `None` for shapes with no rule.
    ///
    /// The estimate marker is always optional in the produced pattern, so a
    /// template learned from `FY1Q25` also expands to `FY1Q25E`.
    pub fn reverse_engineer(period: &str) -> Option<Self> {
        let period = period.trim();
        for (shape, name, pattern, kind) in REVERSE_RULES {
            let matched = Regex::new(shape).map(|re| re.is_match(period)).unwrap_or(false);
            if matched {
                return Some(Self {
                    name: (*name).to_string(),
                    pattern: (*pattern).to_string(),
                    example: period.to_string(),
                    kind: *kind,
                });
            }
        }
        log::debug!("no template rule for period '{}'", period);
        None
    }

    /// Build a template from a caller-supplied pattern. The pattern must carry
    /// at least one placeholder.
    pub fn from_pattern(pattern: &str) -> Option<Self> {
        let pattern = pattern.trim();
        if !PLACEHOLDERS.iter().any(|p| pattern.contains(p)) {
            return None;
        }
        let kind = if pattern.contains("{Q}") { PeriodKind::Quarterly } else { PeriodKind::Annual };
        let example = expand_one(pattern, 2025).into_iter().next().unwrap_or_default();
        Some(Self {
            name: format!("Custom {}", pattern),
            pattern: pattern.to_string(),
            example,
            kind,
        })
    }

    /// Every literal this template produces for years in `start..=end`.
    pub fn expand(&self, start: i32, end: i32) -> Vec<String> {
        let has_year = self.pattern.contains("{YYYY}") || self.pattern.contains("{YY}");
        if !has_year {
            return expand_one(&self.pattern, start);
        }
        (start..=end).flat_map(|year| expand_one(&self.pattern, year)).collect()
    }
}

fn expand_one(pattern: &str, year: i32) -> Vec<String> {
    let yy = format!("{:02}", year.rem_euclid(100));
    let base = pattern.replace("{YYYY}", &year.to_string()).replace("{YY}", &yy);

    let mut out = vec![base];
    if out[0].contains("{Q}") {
        out = out.iter().flat_map(|s| (1..=4).map(move |q| s.replace("{Q}", &q.to_string()))).collect();
    }
    if out[0].contains("{WW}") {
        out = out.iter().flat_map(|s| (1..=53).map(move |w| s.replace("{WW}", &format!("{:02}", w)))).collect();
    }
    for (marker, suffix) in [("[E]", "E"), ("[Actual]", " Actual")] {
        if out[0].contains(marker) {
            out = out
                .iter()
                .flat_map(|s| {
                    let plain = s.replace(marker, "");
                    let with = s.replace(marker, suffix);
                    [plain, with]
                })
                .collect();
        }
    }
    out
}

/// Reverse-engineer every period, keeping one template per pattern.
pub fn suggest_templates(periods: &[&str]) -> Vec<PeriodTemplate> {
    let mut suggested: Vec<PeriodTemplate> = Vec::new();
    for period in periods {
        if let Some(template) = PeriodTemplate::reverse_engineer(period) {
            if !suggested.iter().any(|t| t.pattern == template.pattern) {
                suggested.push(template);
            }
        }
    }
    log::debug!("suggested {} template(s) from {} period(s)", suggested.len(), periods.len());
    suggested
}

/// Union of all literals the templates produce.
pub fn expand_templates(templates: &[PeriodTemplate], start: i32, end: i32) -> HashSet<String> {
    templates.iter().flat_map(|t| t.expand(start, end)).collect()
}

/// Confidence (0..=1) that a template found enough periods.
pub fn template_confidence(found: usize, min_expected: usize) -> f64 {
    if min_expected == 0 {
        return 1.0;
    }
    let n = found as f64;
    let min = min_expected as f64;
    if found >= min_expected {
        (n / (min * 2.0)).min(1.0)
    } else {
        n / min
    }
}

/// A pattern some detected periods follow, with how strongly they support it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateHint {
    pub pattern: String,
    pub kind: PeriodKind,
    /// Detected periods that generalize to this pattern
    pub periods: usize,
    pub confidence: f64,
}

/// Group detected periods by the template each one generalizes to.
pub fn template_hints(periods: &[&str], min_expected: usize) -> Vec<TemplateHint> {
    let mut hints: Vec<TemplateHint> = Vec::new();
    for template in periods.iter().filter_map(|p| PeriodTemplate::reverse_engineer(p)) {
        match hints.iter_mut().find(|h| h.pattern == template.pattern) {
            Some(hint) => hint.periods += 1,
            None => hints.push(TemplateHint { pattern: template.pattern, kind: template.kind, periods: 1, confidence: 0.0 }),
        }
    }
    for hint in &mut hints {
        hint.confidence = template_confidence(hint.periods, min_expected);
    }
    hints
}

/// Split periods into annual, quarterly and other by their text.
pub fn categorize_periods(periods: &[Period]) -> PeriodCategories {
    let quarterly = Regex::new(r"(?i)[1-4]Q|Q[1-4]").ok();
    let annual =
        Regex::new(r"(?i)^(?:FY|CY)?\s?(?:\d{4}|\d{2})E?(?:\s?(?:Actual|Estimate|Forecast|Budget))?$").ok();

    let mut out = PeriodCategories::default();
    for p in periods {
        let name = p.name.trim();
        if quarterly.as_ref().map(|re| re.is_match(name)).unwrap_or(false) {
            out.quarterly.push(p.name.clone());
        } else if annual.as_ref().map(|re| re.is_match(name)).unwrap_or(false) {
            out.annual.push(p.name.clone());
        } else {
            out.other.push(p.name.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_group_periods_by_pattern() {
        let hints = template_hints(&["1Q25", "2Q25", "3Q25E", "FY2025", "Mar-24"], 3);
        assert_eq!(hints.len(), 2);
        assert_eq!(hints[0].pattern, "{Q}Q{YY}[E]");
        assert_eq!(hints[0].kind, PeriodKind::Quarterly);
        assert_eq!(hints[0].periods, 3);
        assert_eq!(hints[0].confidence, 0.5);
        assert_eq!(hints[1].pattern, "FY{YYYY}[E]");
        assert!((hints[1].confidence - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn fy_quarter_template_round_trip() {
        let template = PeriodTemplate::reverse_engineer("FY1Q25").unwrap();
        assert_eq!(template.pattern, "FY{Q}Q{YY}[E]");
        assert_eq!(template.kind, PeriodKind::Quarterly);

        let expanded: HashSet<String> = template.expand(1990, 2030).into_iter().collect();
        for q in 1..=4 {
            assert!(expanded.contains(&format!("FY{q}Q25")));
            assert!(expanded.contains(&format!("FY{q}Q25E")));
        }
        // 41 years x 4 quarters x {plain, E}
        assert_eq!(expanded.len(), 41 * 4 * 2);
    }

    #[test]
    fn reverse_engineering_rules() {
        let pattern = |p: &str| PeriodTemplate::reverse_engineer(p).map(|t| t.pattern);
        assert_eq!(pattern("FY2024").as_deref(), Some("FY{YYYY}[E]"));
        assert_eq!(pattern("2025E").as_deref(), Some("{YYYY}[E]"));
        assert_eq!(pattern("3Q24").as_deref(), Some("{Q}Q{YY}[E]"));
        assert_eq!(pattern("Q2 2024").as_deref(), Some("Q{Q} {YYYY}"));
        assert_eq!(pattern("1998-53").as_deref(), Some("{YYYY}-{WW}"));
        assert_eq!(pattern("Mar-24"), None);
    }

    #[test]
    fn year_week_expands_all_weeks() {
        let template = PeriodTemplate::reverse_engineer("1998-53").unwrap();
        let expanded = template.expand(1998, 1998);
        assert_eq!(expanded.len(), 53);
        assert!(expanded.contains(&"1998-01".to_string()));
        assert!(expanded.contains(&"1998-53".to_string()));
    }

    #[test]
    fn actual_suffix_expands() {
        let template = PeriodTemplate::from_pattern("{YYYY}[Actual]").unwrap();
        assert_eq!(template.kind, PeriodKind::Annual);
        assert_eq!(template.expand(2024, 2024), vec!["2024", "2024 Actual"]);
    }

    #[test]
    fn from_pattern_requires_placeholder() {
        assert!(PeriodTemplate::from_pattern("FY").is_none());
        let t = PeriodTemplate::from_pattern("Q{Q} {YYYY}").unwrap();
        assert_eq!(t.kind, PeriodKind::Quarterly);
        assert_eq!(t.example, "Q1 2025");
    }

    #[test]
    fn suggestions_are_deduplicated_by_pattern() {
        let templates = suggest_templates(&["1Q25", "2Q25", "3Q25E", "FY2025", "Budget"]);
        let patterns: Vec<&str> = templates.iter().map(|t| t.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["{Q}Q{YY}[E]", "FY{YYYY}[E]"]);
    }

    #[test]
    fn confidence_curve() {
        assert_eq!(template_confidence(5, 10), 0.5);
        assert_eq!(template_confidence(10, 10), 0.5);
        assert_eq!(template_confidence(15, 10), 0.75);
        assert_eq!(template_confidence(40, 10), 1.0);
        assert_eq!(template_confidence(0, 10), 0.0);
    }

    #[test]
    fn categorize() {
        let p = |name: &str| Period { name: name.into(), column_index: 0, source_sheet: "S".into(), source_row: 1 };
        let cats = categorize_periods(&[p("1Q25"), p("FY2024"), p("2025E"), p("Q3 2024"), p("Mar-24"), p("2024 Actual")]);
        assert_eq!(cats.quarterly, vec!["1Q25", "Q3 2024"]);
        assert_eq!(cats.annual, vec!["FY2024", "2025E", "2024 Actual"]);
        assert_eq!(cats.other, vec!["Mar-24"]);
    }
}
