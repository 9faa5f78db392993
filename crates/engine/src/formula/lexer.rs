//! Lenient formula lexer.
//!
//! Unlike an evaluating parser this never fails: unknown characters become
//! `Token::Other` so that partially understood formulas (array constants,
//! structured references, locale separators) still yield their references.

use serde::{Deserialize, Serialize};

use crate::cell_id::letters_to_col;
use crate::cell_id::MAX_ROW;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Text(String),
    Bool(bool),
    /// Error literal such as `#REF!` or `#N/A`
    ErrorLit(String),
    /// Sheet prefix (e.g., "Sheet1" from "Sheet1!A1"), with the external
    /// workbook name when written as `[Book]Sheet1!A1`
    SheetPrefix { workbook: Option<String>, sheet: String },
    /// Cell reference with absolute/relative flags
    CellRef { col: usize, row: usize, col_abs: bool, row_abs: bool },
    /// Function name or defined name, uppercased
    Ident(String),
    Op(Operator),
    LParen,
    RParen,
    Comma,
    Colon,
    Other(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    /// Binding strength, lowest first. Percent is postfix and binds tightest.
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Eq | Operator::Ne | Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => 1,
            Operator::Concat => 2,
            Operator::Add | Operator::Sub => 3,
            Operator::Mul | Operator::Div => 4,
            Operator::Pow => 5,
            Operator::Percent => 6,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Pow => "^",
            Operator::Concat => "&",
            Operator::Percent => "%",
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Tokenize formula source. A leading `=` is ignored.
pub fn tokenize(input: &str) -> Vec<Token> {
    let input = input.trim();
    let input = input.strip_prefix('=').unwrap_or(input);

    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    // `[Book]` seen but not yet attached to a sheet prefix
    let mut pending_workbook: Option<String> = None;

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => { chars.next(); }
            '+' => { tokens.push(Token::Op(Operator::Add)); chars.next(); }
            '-' => { tokens.push(Token::Op(Operator::Sub)); chars.next(); }
            '*' => { tokens.push(Token::Op(Operator::Mul)); chars.next(); }
            '/' => { tokens.push(Token::Op(Operator::Div)); chars.next(); }
            '^' => { tokens.push(Token::Op(Operator::Pow)); chars.next(); }
            '&' => { tokens.push(Token::Op(Operator::Concat)); chars.next(); }
            '%' => { tokens.push(Token::Op(Operator::Percent)); chars.next(); }
            '=' => { tokens.push(Token::Op(Operator::Eq)); chars.next(); }
            '(' => { tokens.push(Token::LParen); chars.next(); }
            ')' => { tokens.push(Token::RParen); chars.next(); }
            ',' | ';' => { tokens.push(Token::Comma); chars.next(); }
            ':' => { tokens.push(Token::Colon); chars.next(); }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some(&'=') => { tokens.push(Token::Op(Operator::Le)); chars.next(); }
                    Some(&'>') => { tokens.push(Token::Op(Operator::Ne)); chars.next(); }
                    _ => tokens.push(Token::Op(Operator::Lt)),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    tokens.push(Token::Op(Operator::Ge));
                    chars.next();
                } else {
                    tokens.push(Token::Op(Operator::Gt));
                }
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                while let Some(ch) = chars.next() {
                    if ch == '"' {
                        // Doubled quote is an escaped quote
                        if chars.peek() == Some(&'"') {
                            chars.next();
                            s.push('"');
                        } else {
                            break;
                        }
                    } else {
                        s.push(ch);
                    }
                }
                tokens.push(Token::Text(s));
            }
            '\'' => {
                // Quoted sheet name, possibly carrying a workbook: '[Book.xlsx]My Sheet'!A1
                chars.next();
                let mut name = String::new();
                while let Some(ch) = chars.next() {
                    if ch == '\'' {
                        if chars.peek() == Some(&'\'') {
                            chars.next();
                            name.push('\'');
                        } else {
                            break;
                        }
                    } else {
                        name.push(ch);
                    }
                }
                if chars.peek() == Some(&'!') {
                    chars.next();
                    let (workbook, sheet) = split_workbook(&name);
                    let workbook = workbook.or_else(|| pending_workbook.take());
                    tokens.push(Token::SheetPrefix { workbook, sheet });
                } else {
                    tokens.push(Token::Other('\''));
                }
            }
            '[' => {
                chars.next();
                let mut book = String::new();
                for ch in chars.by_ref() {
                    if ch == ']' {
                        break;
                    }
                    book.push(ch);
                }
                pending_workbook = Some(book);
                continue;
            }
            '#' => {
                let mut lit = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == '#' || ch.is_ascii_alphanumeric() || ch == '/' || ch == '!' || ch == '?' {
                        lit.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::ErrorLit(lit.to_uppercase()));
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // Scientific notation: 1E3, 2.5e-4
                if matches!(chars.peek(), Some(&'e') | Some(&'E')) {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    let signed = matches!(lookahead.peek(), Some(&'+') | Some(&'-'));
                    if signed {
                        lookahead.next();
                    }
                    if lookahead.peek().map(|d| d.is_ascii_digit()).unwrap_or(false) {
                        num_str.push('e');
                        chars.next();
                        if signed {
                            if let Some(sign) = chars.next() {
                                num_str.push(sign);
                            }
                        }
                        while let Some(&d) = chars.peek() {
                            if d.is_ascii_digit() {
                                num_str.push(d);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                    }
                }
                match num_str.parse::<f64>() {
                    Ok(n) => tokens.push(Token::Number(n)),
                    Err(_) => tokens.push(Token::Other('.')),
                }
            }
            ch if ch.is_alphabetic() || ch == '_' || ch == '$' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' || ch == '$' || ch == '.' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }

                if chars.peek() == Some(&'!') {
                    chars.next();
                    tokens.push(Token::SheetPrefix { workbook: pending_workbook.take(), sheet: ident });
                    continue;
                }
                // A bracket not followed by a sheet is a structured reference
                pending_workbook = None;

                if chars.peek() == Some(&'(') {
                    tokens.push(Token::Ident(ident.to_uppercase()));
                    continue;
                }

                let upper = ident.to_uppercase();
                if upper == "TRUE" {
                    tokens.push(Token::Bool(true));
                } else if upper == "FALSE" {
                    tokens.push(Token::Bool(false));
                } else if let Some(token) = try_parse_cell_ref(&upper) {
                    tokens.push(token);
                } else {
                    tokens.push(Token::Ident(upper));
                }
            }
            other => {
                tokens.push(Token::Other(other));
                chars.next();
            }
        }
    }

    tokens
}

/// Split `[Book.xlsx]Sheet` (optionally preceded by a directory path) into
/// workbook and sheet parts.
fn split_workbook(name: &str) -> (Option<String>, String) {
    if let (Some(open), Some(close)) = (name.find('['), name.find(']')) {
        if open < close {
            let book = &name[open + 1..close];
            let sheet = &name[close + 1..];
            return (Some(book.to_string()), sheet.to_string());
        }
    }
    (None, name.to_string())
}

fn try_parse_cell_ref(s: &str) -> Option<Token> {
    let mut chars = s.chars().peekable();

    let col_abs = if chars.peek() == Some(&'$') {
        chars.next();
        true
    } else {
        false
    };

    let mut col_str = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_uppercase() {
            col_str.push(c);
            chars.next();
        } else {
            break;
        }
    }
    let col = letters_to_col(&col_str)?;

    let row_abs = if chars.peek() == Some(&'$') {
        chars.next();
        true
    } else {
        false
    };

    let row_str: String = chars.collect();
    if row_str.is_empty() || !row_str.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let row: usize = row_str.parse().ok()?;
    if row == 0 || row - 1 > MAX_ROW {
        return None;
    }

    Some(Token::CellRef { col, row: row - 1, col_abs, row_abs })
}
