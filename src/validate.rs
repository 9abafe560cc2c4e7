//! A cheap, advisory check that a string only uses the expression alphabet.
//!
//! This is not a syntax check. It never rejects an expression that
//! [`evaluate`](crate::evaluate) accepts, but it happily accepts nonsense
//! such as `1 ** 2` or `sin sin`. The parser stays the authority.

use crate::env::Environment;

const OPERATOR_CHARS: &str = "+-*/%^!(),|&~<>=";

/// Returns `true` when `text` consists solely of whitespace, operator
/// characters, number-shaped runs and names of built-ins.
pub fn is_valid(text: &str) -> bool {
    let env = Environment::global();
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        let len = if c.is_whitespace() || OPERATOR_CHARS.contains(c) {
            c.len_utf8()
        } else if c.is_ascii_digit() || c == '.' {
            run_len(rest, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        } else if c.is_ascii_alphabetic() {
            let len = run_len(rest, |c| c.is_ascii_alphanumeric() || c == '_');
            if !env.contains(&rest[..len]) {
                return false;
            }
            len
        } else if c == 'π' {
            c.len_utf8()
        } else {
            return false;
        };
        rest = &rest[len..];
    }

    !text.trim().is_empty()
}

fn run_len(s: &str, pred: impl Fn(char) -> bool) -> usize {
    s.find(|c: char| !pred(c)).unwrap_or(s.len())
}
