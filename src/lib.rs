//! Evaluates single-line arithmetic expressions such as `2 * PI * 3` or
//! `log(10, 1000) + 4!` without exposing a scripting language.
//!
//! ```
//! assert_eq!(inline_calc::evaluate("1 + 2 * 3"), Ok(7.0));
//! assert!(inline_calc::evaluate("log(10)").unwrap_err().is_syntax());
//! ```

pub mod config;
pub mod env;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod validate;

pub use config::Limits;
pub use error::{DomainError, ErrorKind, EvalError, LexError, SyntaxError};
pub use lexer::*;
pub use parser::{Expr, Parser};
pub use validate::is_valid;

use log::debug;

/// Evaluates `expression` with the default [`Limits`].
pub fn evaluate(expression: &str) -> Result<f64, EvalError> {
    evaluate_with(expression, &Limits::default())
}

pub fn evaluate_with(expression: &str, limits: &Limits) -> Result<f64, EvalError> {
    let result = parse(expression, limits).and_then(|expr| expr.eval());
    match &result {
        Ok(value) => debug!("{expression:?} = {value}"),
        Err(err) => debug!("{expression:?} failed: {err}"),
    }
    result
}

/// Parses without evaluating, for callers that want to inspect the tree or
/// evaluate it more than once.
pub fn parse<'a>(expression: &'a str, limits: &Limits) -> Result<Expr<'a>, EvalError> {
    Parser::with_limits(expression, *limits).parse()
}
