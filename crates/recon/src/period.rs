//! Period recognition.
//!
//! An ordered table of period shapes is tried against header text; the first
//! shape that matches a substring wins, and the cell's full trimmed text
//! becomes the period's identity. Sheets are scanned through both the formula
//! view and the value view and the results unioned. When few periods turn up,
//! templates derived from what was found are expanded and matched exactly.

use std::collections::HashSet;
use std::ops::Range;

use modelrecon_io::{SheetGrid, SheetView};
use regex::Regex;
use serde::Serialize;

use crate::config::{PeriodConfig, ReconConfig};
use crate::model::Period;
use crate::template::{expand_templates, suggest_templates, PeriodTemplate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodShape {
    /// `Q1 2024`
    QuarterYear,
    /// `1Q25`, `3Q2025E`
    QuarterShortYear,
    /// `FY1Q25`, `FY2Q`
    FiscalQuarter,
    /// `FY2024`, `FY 2025E`
    FiscalYear,
    /// `CY2024`
    CalendarYear,
    /// `2024 Actual`, `2025 Budget`
    AnnotatedYear,
    /// `1998-53`
    YearWeek,
    /// `3/2024`
    SlashDate,
    /// `Mar 2024`, `March2024`
    MonthYear,
    /// `Mar-24`
    DashMonth,
    /// `2024`, `2025E`
    BareYear,
}

const SHAPES: &[(PeriodShape, &str)] = &[
    (PeriodShape::QuarterYear, r"(?i)Q([1-4])\s?(\d{4})"),
    (PeriodShape::QuarterShortYear, r"(?i)([1-4])Q(\d{2,4})E?"),
    (PeriodShape::FiscalQuarter, r"(?i)FY([1-4])Q(\d{2,4})?E?"),
    (PeriodShape::FiscalYear, r"(?i)FY\s?(\d{4})E?"),
    (PeriodShape::CalendarYear, r"(?i)CY\s?(\d{4})E?"),
    (PeriodShape::AnnotatedYear, r"(?i)(\d{4})\s?(Actual|Estimate|Forecast|Budget)"),
    (PeriodShape::YearWeek, r"(\d{4})-(\d{2})"),
    (PeriodShape::SlashDate, r"(\d{1,2})/(\d{4})"),
    (PeriodShape::MonthYear, r"(?i)(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s?(\d{4})"),
    (PeriodShape::DashMonth, r"(?i)(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)-(\d{2,4})"),
    (PeriodShape::BareYear, r"(?:^|[^0-9])(\d{4})E?(?:[^0-9]|$)"),
];

/// Text that contains digits but is never a period.
const GUARDS: &[&str] = &[
    r"^\d{3}-\d{3}-\d{4}$",
    r"^\d{10,}$",
    r"(?i)phone|tel|fax|contact",
];

/// Looser test used when deciding whether a row is a header row.
const HEADER_TOKEN: &str = r"(?i)\b(?:FY|CY)|[1-4]Q|Q[1-4]|(?:^|\D)(?:19|20)\d{2}(?:\D|$)";

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

/// Compiled shape table plus the plausible-year window.
#[derive(Debug, Clone)]
pub struct PeriodMatcher {
    shapes: Vec<(PeriodShape, Regex)>,
    guards: Vec<Regex>,
    header_token: Option<Regex>,
    min_year: i32,
    max_year: i32,
}

impl PeriodMatcher {
    pub fn new(config: &PeriodConfig) -> Self {
        let shapes = SHAPES
            .iter()
            .filter_map(|(shape, p)| Regex::new(p).ok().map(|re| (*shape, re)))
            .collect();
        Self {
            shapes,
            guards: compile(GUARDS),
            header_token: Regex::new(HEADER_TOKEN).ok(),
            min_year: config.min_plausible_year,
            max_year: config.max_plausible_year,
        }
    }

    /// The first shape matching `text`, after guards.
    ///
    /// Formula source (text starting with `=`) never matches; formula-driven
    /// headers are read through their cached value instead.
    pub fn match_shape(&self, text: &str) -> Option<PeriodShape> {
        let text = text.trim();
        if text.is_empty() || text.starts_with('=') {
            return None;
        }
        if self.guards.iter().any(|g| g.is_match(text)) {
            return None;
        }

        for (shape, re) in &self.shapes {
            if *shape == PeriodShape::BareYear {
                let plausible = re.captures_iter(text).any(|caps| {
                    caps.get(1)
                        .and_then(|m| m.as_str().parse::<i32>().ok())
                        .map(|y| y >= self.min_year && y <= self.max_year)
                        .unwrap_or(false)
                });
                if plausible {
                    return Some(*shape);
                }
            } else if re.is_match(text) {
                return Some(*shape);
            }
        }
        None
    }

    pub fn is_period(&self, text: &str) -> bool {
        self.match_shape(text).is_some()
    }

    /// Loose period-likeness for header-row detection: any period shape, a
    /// quarter token, or a 19xx/20xx year.
    pub fn looks_like_header_cell(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || text.starts_with('=') {
            return false;
        }
        self.is_period(text) || self.header_token.as_ref().map(|re| re.is_match(text)).unwrap_or(false)
    }

    /// A numeric cell counts as a header cell only as a whole year inside the
    /// plausible window.
    pub fn is_year_value(&self, n: f64) -> bool {
        n.fract() == 0.0 && n >= f64::from(self.min_year) && n <= f64::from(self.max_year)
    }
}

// ---------------------------------------------------------------------------
// Recognition passes
// ---------------------------------------------------------------------------

/// Recognize the periods anywhere in the scanned top rows of a sheet,
/// returned in column order.
pub fn recognize_periods(grid: &SheetGrid, config: &ReconConfig) -> Vec<Period> {
    let rows = config.structure.header_scan_rows.min(grid.rows());
    recognize_in_rows(grid, 0..rows, config)
}

/// Recognize the periods of one header row (0-based), in column order.
pub fn recognize_row_periods(grid: &SheetGrid, row: usize, config: &ReconConfig) -> Vec<Period> {
    recognize_in_rows(grid, row..row + 1, config)
}

fn recognize_in_rows(grid: &SheetGrid, rows: Range<usize>, config: &ReconConfig) -> Vec<Period> {
    let matcher = PeriodMatcher::new(&config.periods);

    let primary = scan_view(grid.formula_view(), rows.clone(), &matcher);
    let cached = scan_view(grid.value_view(), rows.clone(), &matcher);
    log::debug!(
        "sheet '{}': {} period(s) from formula view, {} from value view",
        grid.name,
        primary.len(),
        cached.len()
    );

    let mut periods = union(primary, cached);

    if periods.len() < config.periods.template_threshold {
        let templates: Vec<PeriodTemplate> = if config.periods.templates.is_empty() {
            let names: Vec<&str> = periods.iter().map(|(name, _, _)| name.as_str()).collect();
            suggest_templates(&names)
        } else {
            config.periods.templates.iter().filter_map(|p| PeriodTemplate::from_pattern(p)).collect()
        };

        if !templates.is_empty() {
            let candidates = expand_templates(&templates, config.periods.year_start, config.periods.year_end);
            let found = scan_exact(grid.value_view(), rows.clone(), &candidates);
            let before = periods.len();
            periods = union(periods, found);
            log::info!(
                "sheet '{}': template synthesis with {} template(s) added {} period(s)",
                grid.name,
                templates.len(),
                periods.len() - before
            );
        }
    }

    periods.sort_by_key(|(_, _, col)| *col);
    periods
        .into_iter()
        .map(|(name, row, col)| Period {
            name,
            column_index: col as u32,
            source_sheet: grid.name.clone(),
            source_row: row as u32 + 1,
        })
        .collect()
}

/// `(text, row, col)` of a recognized header cell.
type Found = (String, usize, usize);

fn scan_view(view: SheetView<'_>, rows: Range<usize>, matcher: &PeriodMatcher) -> Vec<Found> {
    let mut out = Vec::new();
    for row in rows {
        for col in 0..view.cols() {
            if let Some(text) = view.string(row, col) {
                let text = text.trim();
                if matcher.is_period(text) {
                    out.push((text.to_string(), row, col));
                }
            }
        }
    }
    out
}

fn scan_exact(view: SheetView<'_>, rows: Range<usize>, candidates: &HashSet<String>) -> Vec<Found> {
    let mut out = Vec::new();
    for row in rows {
        for col in 0..view.cols() {
            if let Some(text) = view.string(row, col) {
                let text = text.trim();
                if candidates.contains(text) {
                    out.push((text.to_string(), row, col));
                }
            }
        }
    }
    out
}

/// Union by name, first occurrence wins.
fn union(first: Vec<Found>, second: Vec<Found>) -> Vec<Found> {
    let mut seen: HashSet<String> = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|(name, _, _)| seen.insert(name.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Chronological ordering
// ---------------------------------------------------------------------------

/// Sort key `(year, month-of-year)` for known shapes.
///
/// Quarters map to their closing month, years to month 0, weeks to the month
/// they fall in. Unrecognized text yields `None`.
pub fn chronological_key(name: &str) -> Option<(i32, u32)> {
    let text = name.trim();
    let captures = |pattern: &str| Regex::new(pattern).ok().and_then(|re| re.captures(text));
    let num = |caps: &regex::Captures<'_>, i: usize| caps.get(i).and_then(|m| m.as_str().parse::<i32>().ok());

    if let Some(caps) = captures(r"(?i)([1-4])Q(\d{2,4})") {
        let q = num(&caps, 1)?;
        return Some((full_year(num(&caps, 2)?), (q * 3) as u32));
    }
    if let Some(caps) = captures(r"(?i)Q([1-4])\s?(\d{2,4})") {
        let q = num(&caps, 1)?;
        return Some((full_year(num(&caps, 2)?), (q * 3) as u32));
    }
    if let Some(caps) = captures(r"(\d{1,2})/(\d{4})") {
        let m = num(&caps, 1)?;
        if (1..=12).contains(&m) {
            return Some((num(&caps, 2)?, m as u32));
        }
    }
    if let Some(caps) = captures(r"(?i)(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?[\s-]?(\d{2,4})") {
        let month = month_number(caps.get(1)?.as_str())?;
        return Some((full_year(num(&caps, 2)?), month));
    }
    if let Some(caps) = captures(r"(\d{4})-(\d{2})$") {
        let week = num(&caps, 2)?.clamp(1, 53);
        return Some((num(&caps, 1)?, ((week * 12 + 52) / 53) as u32));
    }
    if let Some(caps) = captures(r"(\d{4})") {
        return Some((num(&caps, 1)?, 0));
    }
    if let Some(caps) = captures(r"(?i)(?:FY|CY)\s?(\d{2})\b") {
        return Some((full_year(num(&caps, 1)?), 0));
    }
    None
}

/// Reorder periods chronologically. Stable; unrecognized names go last.
pub fn sort_chronologically(periods: &mut [Period]) {
    periods.sort_by_key(|p| match chronological_key(&p.name) {
        Some((year, sub)) => (0u8, year, sub),
        None => (1u8, 0, 0),
    });
}

fn full_year(y: i32) -> i32 {
    if y < 100 {
        2000 + y
    } else {
        y
    }
}

fn month_number(abbrev: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];
    let lower = abbrev.to_ascii_lowercase();
    MONTHS.iter().position(|m| *m == lower).map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelrecon_io::CellValue;

    fn matcher() -> PeriodMatcher {
        PeriodMatcher::new(&PeriodConfig::default())
    }

    fn text(grid: &mut SheetGrid, row: usize, col: usize, s: &str) {
        grid.set_value(row, col, CellValue::Text(s.into()));
    }

    #[test]
    fn shape_table_compiles() {
        let m = matcher();
        assert_eq!(m.shapes.len(), SHAPES.len());
        assert_eq!(m.guards.len(), GUARDS.len());
        assert!(m.header_token.is_some());
    }

    #[test]
    fn recognizes_common_notations() {
        let m = matcher();
        assert_eq!(m.match_shape("Q1 2024"), Some(PeriodShape::QuarterYear));
        assert_eq!(m.match_shape("1Q25"), Some(PeriodShape::QuarterShortYear));
        assert_eq!(m.match_shape("3Q25E"), Some(PeriodShape::QuarterShortYear));
        assert_eq!(m.match_shape("FY1Q25"), Some(PeriodShape::QuarterShortYear));
        assert_eq!(m.match_shape("FY2024"), Some(PeriodShape::FiscalYear));
        assert_eq!(m.match_shape("CY 2023"), Some(PeriodShape::CalendarYear));
        assert_eq!(m.match_shape("2024 Actual"), Some(PeriodShape::AnnotatedYear));
        assert_eq!(m.match_shape("1998-53"), Some(PeriodShape::YearWeek));
        assert_eq!(m.match_shape("3/2024"), Some(PeriodShape::SlashDate));
        assert_eq!(m.match_shape("March 2024"), Some(PeriodShape::MonthYear));
        assert_eq!(m.match_shape("Mar-24"), Some(PeriodShape::DashMonth));
        assert_eq!(m.match_shape("2025E"), Some(PeriodShape::BareYear));
    }

    #[test]
    fn rejects_non_periods() {
        let m = matcher();
        assert!(!m.is_period("Revenue"));
        assert!(!m.is_period("Line Item"));
        assert!(!m.is_period("555-123-4567"));
        assert!(!m.is_period("12345678901"));
        assert!(!m.is_period("Phone 2024"));
        assert!(!m.is_period("1875"));
        assert!(!m.is_period("20245"));
        assert!(!m.is_period("=\"FY\"&RIGHT(A1,2)"));
        assert!(!m.is_period(""));
    }

    #[test]
    fn header_cells_are_looser_than_periods() {
        let m = matcher();
        assert!(m.looks_like_header_cell("Q3"));
        assert!(m.looks_like_header_cell("FY"));
        assert!(m.looks_like_header_cell("2024"));
        assert!(!m.looks_like_header_cell("Revenue"));
    }

    #[test]
    fn union_keeps_first_seen_column() {
        let a = vec![("1Q25".to_string(), 5, 1)];
        let b = vec![("1Q25".to_string(), 5, 7), ("2Q25".to_string(), 5, 2)];
        let merged = union(a, b);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].2, 1);
        assert_eq!(merged[1].0, "2Q25");
    }

    #[test]
    fn formula_headers_resolve_through_cached_value() {
        let mut grid = SheetGrid::new("IS");
        text(&mut grid, 0, 0, "Line Item");
        text(&mut grid, 0, 1, "FY1Q25");
        grid.set_formula(0, 1, "=\"FY\"&\"1Q25\"");
        text(&mut grid, 0, 2, "FY2Q25");

        let mut config = ReconConfig::default();
        config.periods.template_threshold = 0;
        let periods = recognize_periods(&grid, &config);
        let names: Vec<&str> = periods.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["FY1Q25", "FY2Q25"]);
        assert_eq!(periods[0].column_index, 1);
        assert_eq!(periods[0].source_row, 1);
    }

    #[test]
    fn template_synthesis_finds_exact_candidates() {
        let mut grid = SheetGrid::new("IS");
        text(&mut grid, 2, 1, "FY1Q25");
        text(&mut grid, 2, 2, "FY2Q25");
        text(&mut grid, 2, 3, "FY3Q25E");

        let periods = recognize_periods(&grid, &ReconConfig::default());
        assert_eq!(periods.len(), 3);
        assert!(periods.windows(2).all(|w| w[0].column_index < w[1].column_index));
    }

    #[test]
    fn row_scan_ignores_titles_above_header() {
        let mut grid = SheetGrid::new("IS");
        text(&mut grid, 0, 0, "FY2025 Budget Model");
        text(&mut grid, 3, 0, "Line Item");
        text(&mut grid, 3, 1, "FY2024");
        text(&mut grid, 3, 2, "FY2025");

        let config = ReconConfig::default();
        assert_eq!(recognize_periods(&grid, &config).len(), 3);

        let periods = recognize_row_periods(&grid, 3, &config);
        let names: Vec<&str> = periods.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["FY2024", "FY2025"]);
        assert!(periods.iter().all(|p| p.source_row == 4));
    }

    #[test]
    fn explicit_templates_recover_periods_patterns_miss() {
        // Half-year labels match no shape; explicit templates recover them
        let mut grid = SheetGrid::new("IS");
        text(&mut grid, 0, 1, "H1 24");
        text(&mut grid, 0, 2, "H2 24");

        let mut config = ReconConfig::default();
        config.periods.templates = vec!["H1 {YY}".into(), "H2 {YY}".into()];
        let periods = recognize_periods(&grid, &config);
        let names: Vec<&str> = periods.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["H1 24", "H2 24"]);
    }

    #[test]
    fn chronological_keys() {
        assert_eq!(chronological_key("1Q25"), Some((2025, 3)));
        assert_eq!(chronological_key("Q4 2024"), Some((2024, 12)));
        assert_eq!(chronological_key("FY2Q25E"), Some((2025, 6)));
        assert_eq!(chronological_key("FY2024"), Some((2024, 0)));
        assert_eq!(chronological_key("6/2024"), Some((2024, 6)));
        assert_eq!(chronological_key("Mar-24"), Some((2024, 3)));
        assert_eq!(chronological_key("1998-53"), Some((1998, 12)));
        assert_eq!(chronological_key("FY24"), Some((2024, 0)));
        assert_eq!(chronological_key("Budget"), None);
    }

    #[test]
    fn chronological_sort_is_stable_with_unknowns_last() {
        let p = |name: &str, col: u32| Period {
            name: name.into(),
            column_index: col,
            source_sheet: "S".into(),
            source_row: 1,
        };
        let mut periods = vec![p("Mystery", 1), p("2Q25", 2), p("1Q25", 3), p("Other", 4), p("FY2024", 5)];
        sort_chronologically(&mut periods);
        let names: Vec<&str> = periods.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["FY2024", "1Q25", "2Q25", "Mystery", "Other"]);
    }
}
