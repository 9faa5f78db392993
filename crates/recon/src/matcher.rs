use std::collections::HashSet;

use crate::model::{FinancialStatement, LabelMatch, MatchKind, MatchOutput};

/// Match the line items of two statements by label.
pub fn match_line_items(old: &FinancialStatement, new: &FinancialStatement, threshold: f64) -> MatchOutput {
    let mut out = match_labels(&old.labels(), &new.labels(), threshold);
    out.old_shadowed = old.shadowed_rows();
    out.new_shadowed = new.shadowed_rows();
    for (stmt, shadowed) in [(old, &out.old_shadowed), (new, &out.new_shadowed)] {
        for dup in shadowed {
            log::warn!(
                "sheet '{}': row {} repeats label '{}' from row {} and is not compared",
                stmt.sheet_name,
                dup.row,
                dup.label,
                dup.first_row
            );
        }
    }
    let fuzzy = out.matched.iter().filter(|m| m.kind == MatchKind::Fuzzy).count();
    log::info!(
        "'{}' vs '{}': {} exact, {} fuzzy, {} old-only, {} new-only",
        old.sheet_name,
        new.sheet_name,
        out.matched.len() - fuzzy,
        fuzzy,
        out.old_only.len(),
        out.new_only.len()
    );
    out
}

/// Two-pass label matching.
///
/// Pass one pairs verbatim (case-sensitive) labels. Pass two scores every
/// remaining cross pair with a case-insensitive normalized Levenshtein ratio
/// and accepts pairs at or above `threshold`, best score first, each label at
/// most once. Equal scores are ordered by the unordered label pair, so
/// swapping the inputs yields the same pairs.
pub fn match_labels(old: &[&str], new: &[&str], threshold: f64) -> MatchOutput {
    let new_set: HashSet<&str> = new.iter().copied().collect();
    let mut matched = Vec::new();
    let mut old_used: HashSet<&str> = HashSet::new();
    let mut new_used: HashSet<&str> = HashSet::new();

    for &label in old {
        if new_set.contains(label) && old_used.insert(label) {
            new_used.insert(label);
            matched.push(LabelMatch {
                old_label: label.to_string(),
                new_label: label.to_string(),
                score: 1.0,
                kind: MatchKind::Exact,
            });
        }
    }

    let old_rest: Vec<&str> = old.iter().copied().filter(|l| !old_used.contains(l)).collect();
    let new_rest: Vec<&str> = new.iter().copied().filter(|l| !new_used.contains(l)).collect();

    let mut candidates = Vec::new();
    for &o in &old_rest {
        let o_lower = o.to_lowercase();
        for &n in &new_rest {
            let score = strsim::normalized_levenshtein(&o_lower, &n.to_lowercase());
            if score >= threshold {
                candidates.push((score, o, n));
            }
        }
    }
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| pair_key(a.1, a.2).cmp(&pair_key(b.1, b.2))));

    for (score, o, n) in candidates {
        if old_used.contains(o) || new_used.contains(n) {
            continue;
        }
        old_used.insert(o);
        new_used.insert(n);
        matched.push(LabelMatch { old_label: o.to_string(), new_label: n.to_string(), score, kind: MatchKind::Fuzzy });
    }

    let old_only = old_rest.into_iter().filter(|l| !old_used.contains(l)).map(String::from).collect();
    let new_only = new_rest.into_iter().filter(|l| !new_used.contains(l)).map(String::from).collect();

    MatchOutput { matched, old_only, new_only, ..Default::default() }
}

fn pair_key<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
