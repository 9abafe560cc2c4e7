use std::collections::HashMap;
use std::f64::consts;

use lazy_static::lazy_static;

/// A built-in function together with its fixed arity.
#[derive(Clone, Copy)]
pub enum Builtin {
    Unary(fn(f64) -> f64),
    Binary(fn(f64, f64) -> f64),
}

impl Builtin {
    pub fn arity(&self) -> usize {
        match self {
            Builtin::Unary(_) => 1,
            Builtin::Binary(_) => 2,
        }
    }

    /// Applies the function, or returns `None` when `args` does not match
    /// [`Builtin::arity`].
    pub fn call(&self, args: &[f64]) -> Option<f64> {
        match (self, args) {
            (Builtin::Unary(f), [x]) => Some(f(*x)),
            (Builtin::Binary(f), [x, y]) => Some(f(*x, *y)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<builtin/{}>", self.arity())
    }
}

/// What a name refers to.
#[derive(Debug, Clone, Copy)]
pub enum Binding {
    Constant(f64),
    Function(Builtin),
}

/// The read-only table of names every expression can refer to.
#[derive(Debug)]
pub struct Environment {
    bindings: HashMap<&'static str, Binding>,
}

lazy_static! {
    static ref GLOBAL: Environment = Environment::builtins();
}

impl Environment {
    /// The process-wide table, built on first use.
    pub fn global() -> &'static Environment {
        &*GLOBAL
    }

    fn builtins() -> Self {
        let mut env = Self {
            bindings: HashMap::new(),
        };

        env.define("PI", Binding::Constant(consts::PI));
        env.define("π", Binding::Constant(consts::PI));
        env.define("E", Binding::Constant(consts::E));

        env.define_unary("abs", f64::abs);
        env.define_unary("sqrt", f64::sqrt);
        env.define_unary("sin", f64::sin);
        env.define_unary("cos", f64::cos);
        env.define_unary("tan", f64::tan);
        env.define_unary("asin", f64::asin);
        env.define_unary("acos", f64::acos);
        env.define_unary("atan", f64::atan);
        env.define_unary("ln", f64::ln);
        env.define_unary("log2", f64::log2);
        env.define_unary("log10", f64::log10);
        env.define_unary("exp", f64::exp);
        env.define_unary("round", round_half_up);
        env.define_unary("trunc", f64::trunc);
        env.define_unary("floor", f64::floor);
        env.define_unary("ceil", f64::ceil);
        env.define("log", Binding::Function(Builtin::Binary(log)));

        env
    }

    fn define(&mut self, name: &'static str, binding: Binding) {
        self.bindings.insert(name, binding);
    }

    fn define_unary(&mut self, name: &'static str, f: fn(f64) -> f64) {
        self.define(name, Binding::Function(Builtin::Unary(f)));
    }

    pub fn lookup(&self, name: &str) -> Option<Binding> {
        self.bindings.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }
}

/// `log(base, value)`
fn log(base: f64, value: f64) -> f64 {
    value.ln() / base.ln()
}

/// Rounds to the nearest integer, ties toward positive infinity
/// (`2.5 -> 3`, `-2.5 -> -2`).
fn round_half_up(x: f64) -> f64 {
    let floor = x.floor();
    if x - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str) -> Builtin {
        match Environment::global().lookup(name) {
            Some(Binding::Function(f)) => f,
            other => panic!("`{name}` is not a function: {other:?}"),
        }
    }

    #[test]
    fn test_constants() {
        let env = Environment::global();
        assert!(matches!(env.lookup("PI"), Some(Binding::Constant(v)) if v == consts::PI));
        assert!(matches!(env.lookup("π"), Some(Binding::Constant(v)) if v == consts::PI));
        assert!(matches!(env.lookup("E"), Some(Binding::Constant(v)) if v == consts::E));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let env = Environment::global();
        assert!(env.lookup("pi").is_none());
        assert!(env.lookup("SIN").is_none());
        assert!(env.contains("sin"));
    }

    #[test]
    fn test_arities() {
        assert_eq!(function("sqrt").arity(), 1);
        assert_eq!(function("ln").arity(), 1);
        assert_eq!(function("log").arity(), 2);
    }

    #[test]
    fn test_log() {
        assert!((function("log").call(&[10.0, 1000.0]).unwrap() - 3.0).abs() < 1e-9);
        assert_eq!(function("log2").call(&[1024.0]), Some(10.0));
        assert!((function("ln").call(&[consts::E]).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(3.14), 3.0);
        assert_eq!(round_half_up(2.718), 3.0);
        assert_eq!(round_half_up(-0.4), 0.0);
        assert!(round_half_up(-0.4).is_sign_positive());
    }

    #[test]
    fn test_wrong_argument_count_is_rejected() {
        assert_eq!(function("sin").call(&[1.0, 2.0]), None);
        assert_eq!(function("log").call(&[10.0]), None);
        assert_eq!(function("sqrt").call(&[]), None);
    }
}
