// Formula analysis utilities
//
// Static profiling of formula source without evaluation. Drives drill-down
// previews and attribution warnings.

use rustc_hash::FxHashSet;
use serde::Serialize;

use super::lexer::{tokenize, Operator, Token};
use super::refs::scan_references;

/// Facts about a formula gathered from its tokens.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormulaProfile {
    /// Distinct references (ranges count once)
    pub reference_count: usize,
    /// Function names in order of first appearance, uppercased
    pub functions: Vec<String>,
    /// Deepest parenthesis nesting
    pub max_nesting: usize,
    pub has_cross_sheet_refs: bool,
    pub has_external_refs: bool,
    /// Lowest-precedence binary operator outside any parentheses
    pub top_level_operator: Option<Operator>,
    /// A `-` outside any parentheses, binary or unary
    pub negates_at_top_level: bool,
}

impl FormulaProfile {
    /// The outermost function, i.e. the first one written.
    pub fn main_function(&self) -> Option<&str> {
        self.functions.first().map(String::as_str)
    }
}

/// Profile a formula. A leading `=` is optional.
pub fn analyze_formula(formula: &str) -> FormulaProfile {
    let tokens = tokenize(formula);
    let refs = scan_references(formula);

    let mut seen_refs = FxHashSet::default();
    for r in &refs {
        seen_refs.insert(r.text.as_str());
    }

    let mut functions: Vec<String> = Vec::new();
    let mut depth = 0usize;
    let mut max_nesting = 0usize;
    for (i, tok) in tokens.iter().enumerate() {
        match tok {
            Token::Ident(name) if tokens.get(i + 1) == Some(&Token::LParen) => {
                if !functions.contains(name) {
                    functions.push(name.clone());
                }
            }
            Token::LParen => {
                depth += 1;
                max_nesting = max_nesting.max(depth);
            }
            Token::RParen => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    FormulaProfile {
        reference_count: seen_refs.len(),
        functions,
        max_nesting,
        has_cross_sheet_refs: refs.iter().any(|r| r.sheet.is_some()),
        has_external_refs: refs.iter().any(|r| r.is_external()),
        top_level_operator: top_level_operator(&tokens),
        negates_at_top_level: negates_at_top_level(&tokens),
    }
}

/// Whether some operand outside parentheses enters the result with a minus
/// sign, e.g. `=A1-A2` or `=-A1+A2`.
pub fn negates_at_top_level(tokens: &[Token]) -> bool {
    let mut depth = 0usize;
    for tok in tokens {
        match tok {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Op(Operator::Sub) if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

/// Find the operator that is applied last when the formula is evaluated:
/// the lowest-precedence binary operator at nesting depth zero.
///
/// Unary signs are not binary operators. For equal precedence the rightmost
/// occurrence wins (left associativity), though only the kind matters to
/// callers.
pub fn top_level_operator(tokens: &[Token]) -> Option<Operator> {
    let mut depth = 0usize;
    let mut best: Option<Operator> = None;
    let mut prev_is_operand = false;

    for tok in tokens {
        match tok {
            Token::LParen => {
                depth += 1;
                prev_is_operand = false;
            }
            Token::RParen => {
                depth = depth.saturating_sub(1);
                prev_is_operand = true;
            }
            Token::Op(Operator::Percent) => prev_is_operand = true,
            Token::Op(op) => {
                if depth == 0 && prev_is_operand {
                    let replace = match best {
                        None => true,
                        Some(cur) => op.precedence() <= cur.precedence(),
                    };
                    if replace {
                        best = Some(*op);
                    }
                }
                prev_is_operand = false;
            }
            Token::Comma | Token::Colon | Token::Other(_) | Token::SheetPrefix { .. } => {
                prev_is_operand = false;
            }
            Token::Number(_)
            | Token::Text(_)
            | Token::Bool(_)
            | Token::ErrorLit(_)
            | Token::CellRef { .. }
            | Token::Ident(_) => prev_is_operand = true,
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top(formula: &str) -> Option<Operator> {
        top_level_operator(&tokenize(formula))
    }

    #[test]
    fn test_additive_top_level() {
        assert_eq!(top("=A1+A2"), Some(Operator::Add));
        assert_eq!(top("=A1*B1-C1"), Some(Operator::Sub));
        assert_eq!(top("=-A1+B1"), Some(Operator::Add));
    }

    #[test]
    fn test_multiplicative_top_level() {
        assert_eq!(top("=A1*B1"), Some(Operator::Mul));
        assert_eq!(top("=(A1+A2)*B1"), Some(Operator::Mul));
        assert_eq!(top("=A1/B1^2"), Some(Operator::Div));
        assert_eq!(top("=A1^2"), Some(Operator::Pow));
    }

    #[test]
    fn test_function_only_has_no_operator() {
        assert_eq!(top("=SUM(A1:A5)"), None);
        assert_eq!(top("=-A1"), None);
        assert_eq!(top("=A1%"), None);
    }

    #[test]
    fn test_top_level_negation() {
        let neg = |f: &str| negates_at_top_level(&tokenize(f));
        assert!(neg("=A1-A2"));
        assert!(neg("=A1-A2+A3"));
        assert!(neg("=-A1+B1"));
        assert!(!neg("=A1+A2"));
        assert!(!neg("=SUM(A1,-A2)"));
        assert!(!neg("=(A1-A2)*B1"));
    }

    #[test]
    fn test_profile_counts() {
        let p = analyze_formula("=SUM(A1:A3)+IF(B1>0,Drivers!C2,0)+A1");
        assert_eq!(p.reference_count, 4);
        assert_eq!(p.functions, vec!["SUM", "IF"]);
        assert_eq!(p.main_function(), Some("SUM"));
        assert_eq!(p.max_nesting, 1);
        assert!(p.has_cross_sheet_refs);
        assert!(!p.has_external_refs);
        assert_eq!(p.top_level_operator, Some(Operator::Add));
    }

    #[test]
    fn test_profile_nesting_and_external() {
        let p = analyze_formula("=ROUND(SUM([1]Data!A1,MAX(B1,B2)),2)");
        assert_eq!(p.max_nesting, 3);
        assert!(p.has_external_refs);
        assert_eq!(p.main_function(), Some("ROUND"));
        assert_eq!(p.top_level_operator, None);
    }
}
