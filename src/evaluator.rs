use miette::SourceSpan;

use crate::{
    error::{DomainError, EvalError, SyntaxError},
    parser::{Expr, Op, Prefix},
};

/// Largest `n` whose factorial is finite in an `f64`.
const MAX_FINITE_FACTORIAL: f64 = 170.0;

/// Work left over from walking down a left spine.
enum Pending<'e, 'a> {
    Binary(Op, &'e Expr<'a>),
    Factorial(SourceSpan),
}

impl Expr<'_> {
    /// Reduces the tree to a single number.
    ///
    /// Arithmetic follows IEEE-754: dividing by zero gives an infinity or
    /// NaN rather than an error. The only failure is a factorial outside its
    /// domain.
    ///
    /// Left operands and factorial chains are folded with an explicit stack,
    /// so the recursion depth is bounded by the parser's nesting limit rather
    /// than by the length of the input.
    pub fn eval(&self) -> Result<f64, EvalError> {
        let mut pending = Vec::new();
        let mut node = self;

        let mut value = loop {
            match node {
                Expr::Binary { op, lhs, rhs } => {
                    pending.push(Pending::Binary(*op, &**rhs));
                    node = lhs;
                }
                Expr::Factorial { operand, span } => {
                    pending.push(Pending::Factorial(*span));
                    node = operand;
                }
                Expr::Number(n) => break *n,
                Expr::Constant { value, .. } => break *value,
                Expr::Prefix { op, operand } => {
                    let x = operand.eval()?;
                    break match op {
                        Prefix::Neg => -x,
                        Prefix::Plus => x,
                        Prefix::BitNot => f64::from(!to_int32(x)),
                    };
                }
                Expr::Call {
                    name,
                    func,
                    args,
                    span,
                } => {
                    let values = args
                        .iter()
                        .map(Expr::eval)
                        .collect::<Result<Vec<f64>, EvalError>>()?;
                    break func.call(&values).ok_or_else(|| SyntaxError::ArityMismatch {
                        name: name.to_string(),
                        expected: func.arity(),
                        found: values.len(),
                        span: *span,
                    })?;
                }
            }
        };

        while let Some(step) = pending.pop() {
            value = match step {
                Pending::Binary(op, rhs) => apply(op, value, rhs.eval()?),
                Pending::Factorial(span) => {
                    factorial(value).ok_or(DomainError::Factorial { value, span })?
                }
            };
        }

        Ok(value)
    }
}

fn apply(op: Op, a: f64, b: f64) -> f64 {
    match op {
        Op::Plus => a + b,
        Op::Minus => a - b,
        Op::Star => a * b,
        Op::Slash => a / b,
        Op::Percent => a % b,
        Op::Caret => a.powf(b),
        Op::Pipe => f64::from(to_int32(a) | to_int32(b)),
        Op::Ampersand => f64::from(to_int32(a) & to_int32(b)),
        Op::ShiftLeft => f64::from(to_int32(a).wrapping_shl(shift_count(b))),
        Op::ShiftRight => f64::from(to_int32(a).wrapping_shr(shift_count(b))),
        Op::Less => truth(a < b),
        Op::LessEqual => truth(a <= b),
        Op::Greater => truth(a > b),
        Op::GreaterEqual => truth(a >= b),
        Op::Equal => truth(a == b),
        Op::NotEqual => truth(a != b),
    }
}

fn truth(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// The 32-bit signed view used by bitwise operators: truncate toward zero,
/// then wrap modulo 2^32. NaN and infinities map to 0.
fn to_int32(x: f64) -> i32 {
    if !x.is_finite() {
        return 0;
    }
    let wrapped = x.trunc().rem_euclid(4_294_967_296.0);
    wrapped as u32 as i32
}

/// Only the low five bits of a shift count are used.
fn shift_count(x: f64) -> u32 {
    (to_int32(x) as u32) & 0x1f
}

/// `n!` as the product `1 * 2 * ... * n`, or `None` when `n` is not a
/// non-negative integer.
fn factorial(n: f64) -> Option<f64> {
    if !n.is_finite() || n < 0.0 || n.fract() != 0.0 {
        return None;
    }
    if n > MAX_FINITE_FACTORIAL {
        return Some(f64::INFINITY);
    }

    let mut product = 1.0;
    let mut i = 2.0;
    while i <= n {
        product *= i;
        i += 1.0;
    }
    Some(product)
}
