//! Human-readable output for each command. JSON output bypasses this module
//! and serializes the library types directly.

use std::io::{self, Write};

use modelrecon_recon::model::{
    ComplexityLevel, ConsistencyCheck, DisplayFormat, MatchKind, SheetFailure, StatementRecon,
};
use modelrecon_recon::{DrillDownPreview, DrillDownResult, FinancialStatement, ReconReport, SheetSummary};

/// Longest label printed before truncation.
const LABEL_WIDTH: usize = 36;

// ============================================================================
// sheets
// ============================================================================

pub fn sheets(out: &mut impl Write, summaries: &[SheetSummary], common: Option<&[String]>) -> io::Result<()> {
    writeln!(out, "{:<28} {:<18} {:>6} {:>8}", "SHEET", "TYPE", "HEADER", "PERIODS")?;
    for s in summaries {
        let header = s.header_row.map(|r| r.to_string()).unwrap_or_else(|| "-".into());
        let marker = match common {
            Some(names) if names.contains(&s.name) => " *",
            _ => "",
        };
        writeln!(
            out,
            "{:<28} {:<18} {:>6} {:>8}{}",
            truncate(&s.name, 28),
            s.statement_type.to_string(),
            header,
            s.period_count,
            marker
        )?;
    }
    if let Some(names) = common {
        writeln!(out)?;
        writeln!(out, "{} sheet(s) present in both files (marked *)", names.len())?;
    }
    Ok(())
}

// ============================================================================
// parse
// ============================================================================

pub fn statement(out: &mut impl Write, stmt: &FinancialStatement) -> io::Result<()> {
    writeln!(out, "sheet:   {}", stmt.sheet_name)?;
    writeln!(out, "header:  row {}", stmt.header_row)?;
    writeln!(out, "periods: {} ({})", stmt.periods.len(), preview_list(&stmt.period_names(), 8))?;
    writeln!(out, "items:   {}", stmt.line_items.len())?;
    writeln!(out)?;

    let last = stmt.periods.last().map(|p| p.name.as_str());
    writeln!(out, "{:>5}  {:<LABEL_WIDTH$} {:>16}  {}", "ROW", "LINE ITEM", last.unwrap_or(""), "FORMULA")?;
    for item in stmt.line_items.values() {
        let value = last
            .and_then(|p| item.value(p))
            .map(|v| format!("{v:.2}"))
            .unwrap_or_else(|| "-".into());
        writeln!(
            out,
            "{:>5}  {:<LABEL_WIDTH$} {:>16}  {}",
            item.row_index,
            truncate(&item.name, LABEL_WIDTH),
            value,
            item.formula.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}

// ============================================================================
// reconcile
// ============================================================================

pub fn report(out: &mut impl Write, report: &ReconReport) -> io::Result<()> {
    writeln!(out, "old:    {}", report.meta.old_file)?;
    writeln!(out, "new:    {}", report.meta.new_file)?;
    writeln!(out, "period: {}", report.meta.period)?;

    for recon in &report.statements {
        writeln!(out)?;
        statement_recon(out, recon)?;
    }

    failures(out, "old", &report.old_failures)?;
    failures(out, "new", &report.new_failures)?;

    writeln!(out)?;
    consistency(out, &report.consistency)
}

fn statement_recon(out: &mut impl Write, recon: &StatementRecon) -> io::Result<()> {
    let fuzzy = recon.matches.matched.iter().filter(|m| m.kind == MatchKind::Fuzzy).count();
    writeln!(out, "== {} ('{}' vs '{}') ==", recon.statement_type, recon.old_sheet, recon.new_sheet)?;
    writeln!(
        out,
        "matched {} ({} fuzzy), old only {}, new only {}",
        recon.matches.matched.len(),
        fuzzy,
        recon.matches.old_only.len(),
        recon.matches.new_only.len()
    )?;

    if let Some(first) = recon.variances.values().next() {
        let a = &first.alignment;
        if a.approximate {
            writeln!(
                out,
                "warning: '{}' aligned approximately (old '{}', new '{}')",
                a.requested,
                a.old_period.as_deref().unwrap_or("-"),
                a.new_period.as_deref().unwrap_or("-")
            )?;
        }
    }

    writeln!(out)?;
    writeln!(out, "  {:<LABEL_WIDTH$} {:>16} {:>16} {:>16} {:>9}", "LINE ITEM", "OLD", "NEW", "CHANGE", "%")?;
    for v in recon.variances.values() {
        let mut flags = String::new();
        if v.is_key_item {
            flags.push('*');
        }
        if v.drill_down_available {
            flags.push('>');
        }
        let label = match &v.matched_with {
            Some(new_label) => format!("{} ~ {}", v.line_item, new_label),
            None => v.line_item.clone(),
        };
        writeln!(
            out,
            "  {:<LABEL_WIDTH$} {:>16} {:>16} {:>16} {:>8.1}% {}",
            truncate(&label, LABEL_WIDTH),
            format_value(v.old_value, v.format),
            format_value(v.new_value, v.format),
            format_value(v.absolute_variance, v.format),
            v.percentage_variance,
            flags
        )?;
    }

    for label in &recon.matches.old_only {
        writeln!(out, "  - {label} (old only)")?;
    }
    for label in &recon.matches.new_only {
        writeln!(out, "  + {label} (new only)")?;
    }
    for (side, rows) in [("old", &recon.matches.old_shadowed), ("new", &recon.matches.new_shadowed)] {
        for dup in rows {
            writeln!(
                out,
                "  ! {} ({side} row {}, same label as row {}; not compared)",
                dup.label, dup.row, dup.first_row
            )?;
        }
    }
    Ok(())
}

fn failures(out: &mut impl Write, side: &str, failures: &[SheetFailure]) -> io::Result<()> {
    for f in failures {
        writeln!(out, "{side} model: {} '{}' skipped: {}", f.statement_type, f.sheet_name, f.error)?;
    }
    Ok(())
}

fn consistency(out: &mut impl Write, check: &ConsistencyCheck) -> io::Result<()> {
    writeln!(
        out,
        "compatibility {:.2} (structure {}, naming {:.2}, periods {})",
        check.compatibility_score,
        if check.structure_match { "ok" } else { "differs" },
        check.naming_consistency,
        if check.period_alignment_possible { "ok" } else { "differ" }
    )?;
    for issue in &check.issues {
        writeln!(out, "issue:   {issue}")?;
    }
    for warning in &check.warnings {
        writeln!(out, "warning: {warning}")?;
    }
    Ok(())
}

// ============================================================================
// preview / drill
// ============================================================================

pub fn preview(out: &mut impl Write, label: &str, preview: &DrillDownPreview) -> io::Result<()> {
    if !preview.can_drill_down {
        return writeln!(
            out,
            "'{label}' cannot be drilled: {}",
            preview.reason.as_deref().unwrap_or("no formula")
        );
    }
    writeln!(out, "'{label}' can be drilled")?;
    if let Some(c) = &preview.complexity {
        let level = match c.complexity {
            ComplexityLevel::Simple => "simple",
            ComplexityLevel::Moderate => "moderate",
            ComplexityLevel::Complex => "complex",
        };
        writeln!(out, "complexity:  {level}")?;
        writeln!(out, "references:  {}", c.reference_count)?;
        writeln!(out, "depth:       {}", c.estimated_depth)?;
        writeln!(out, "function:    {}", c.main_function.as_deref().unwrap_or("-"))?;
        writeln!(out, "cross-sheet: {}", yes_no(c.has_cross_sheet_refs))?;
        writeln!(out, "external:    {}", yes_no(c.has_external_refs))?;
    }
    Ok(())
}

pub fn drill(out: &mut impl Write, result: &DrillDownResult) -> io::Result<()> {
    writeln!(out, "{}", result.drill_down_path.join(" > "))?;
    writeln!(out, "old {:.2} -> new {:.2}", result.old_value, result.source_value)?;
    writeln!(out, "total variance:    {:>16.2}", result.total_variance)?;
    writeln!(out, "explained:         {:>16.2}", result.total_explained)?;
    writeln!(out, "unexplained:       {:>16.2}", result.unexplained_variance)?;
    writeln!(out)?;

    writeln!(out, "  {:<LABEL_WIDTH$} {:<14} {:>16} {:>16}", "COMPONENT", "CELL", "VALUE", "CONTRIBUTION")?;
    for c in &result.components {
        let kind = if c.has_formula { " f" } else { "" };
        writeln!(
            out,
            "  {:<LABEL_WIDTH$} {:<14} {:>16.2} {:>16.2}{}",
            truncate(&c.name, LABEL_WIDTH),
            c.cell_reference,
            c.value,
            c.variance_contribution,
            kind
        )?;
    }

    for warning in &result.warnings {
        writeln!(out, "warning: {warning}")?;
    }
    Ok(())
}

// ============================================================================
// helpers
// ============================================================================

fn format_value(value: f64, format: DisplayFormat) -> String {
    match format {
        DisplayFormat::Currency => group_thousands(value, 0),
        DisplayFormat::CurrencyPrecise => format!("{value:.2}"),
        // Margins and rates are stored as fractions.
        DisplayFormat::Percentage => format!("{:.1}%", value * 100.0),
        DisplayFormat::Ratio => format!("{value:.2}x"),
        DisplayFormat::Count => group_thousands(value, 0),
    }
}

fn group_thousands(value: f64, decimals: usize) -> String {
    let text = format!("{:.*}", decimals, value.abs());
    let (int, frac) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };
    let mut grouped = String::with_capacity(int.len() + int.len() / 3 + 2);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(f) = frac {
        grouped.push('.');
        grouped.push_str(f);
    }
    if value < 0.0 && grouped.chars().any(|c| c.is_ascii_digit() && c != '0') {
        grouped.insert(0, '-');
    }
    grouped
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn preview_list(names: &[&str], max: usize) -> String {
    if names.len() <= max {
        return names.join(", ");
    }
    format!("{}, … {}", names[..max - 1].join(", "), names[names.len() - 1])
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(1_150_000.0, 0), "1,150,000");
        assert_eq!(group_thousands(-150_000.4, 0), "-150,000");
        assert_eq!(group_thousands(999.0, 0), "999");
        assert_eq!(group_thousands(-0.2, 0), "0");
        assert_eq!(group_thousands(1234.5, 2), "1,234.50");
    }

    #[test]
    fn values_follow_display_format() {
        assert_eq!(format_value(0.4512, DisplayFormat::Percentage), "45.1%");
        assert_eq!(format_value(1.25, DisplayFormat::CurrencyPrecise), "1.25");
        assert_eq!(format_value(3.0, DisplayFormat::Ratio), "3.00x");
    }

    #[test]
    fn long_labels_truncate() {
        assert_eq!(truncate("Revenue", 10), "Revenue");
        assert_eq!(truncate("Selling, general and administrative", 10), "Selling, …");
    }

    #[test]
    fn period_list_elides_middle() {
        let names = ["1Q24", "2Q24", "3Q24", "4Q24", "1Q25"];
        assert_eq!(preview_list(&names, 8), "1Q24, 2Q24, 3Q24, 4Q24, 1Q25");
        assert_eq!(preview_list(&names, 3), "1Q24, 2Q24, … 1Q25");
    }
}
