use log::{debug, trace};
use miette::SourceSpan;

use crate::{
    config::Limits,
    env::{Binding, Builtin, Environment},
    error::{EvalError, SyntaxError},
    lexer::{Token, TokenKind},
    Lexer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Pipe,
    Ampersand,
    ShiftLeft,
    ShiftRight,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Op::Plus => "+",
                Op::Minus => "-",
                Op::Star => "*",
                Op::Slash => "/",
                Op::Percent => "%",
                Op::Caret => "^",
                Op::Pipe => "|",
                Op::Ampersand => "&",
                Op::ShiftLeft => "<<",
                Op::ShiftRight => ">>",
                Op::Less => "<",
                Op::LessEqual => "<=",
                Op::Greater => ">",
                Op::GreaterEqual => ">=",
                Op::Equal => "==",
                Op::NotEqual => "!=",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    Neg,
    Plus,
    BitNot,
}

impl std::fmt::Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Prefix::Neg => "-",
                Prefix::Plus => "+",
                Prefix::BitNot => "~",
            }
        )
    }
}

/// A parsed expression. Every name in it is already resolved.
#[derive(Debug, Clone)]
pub enum Expr<'a> {
    Number(f64),
    Constant {
        name: &'a str,
        value: f64,
    },
    Prefix {
        op: Prefix,
        operand: Box<Expr<'a>>,
    },
    Binary {
        op: Op,
        lhs: Box<Expr<'a>>,
        rhs: Box<Expr<'a>>,
    },
    Factorial {
        operand: Box<Expr<'a>>,
        span: SourceSpan,
    },
    Call {
        name: &'a str,
        func: Builtin,
        args: Vec<Expr<'a>>,
        span: SourceSpan,
    },
}

/// Prints the tree as an S-expression, e.g. `(+ 1 (* 2 3))`.
impl std::fmt::Display for Expr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Constant { name, .. } => write!(f, "{}", name),
            Expr::Prefix { op, operand } => write!(f, "({} {})", op, operand),
            Expr::Binary { op, lhs, rhs } => write!(f, "({} {} {})", op, lhs, rhs),
            Expr::Factorial { operand, .. } => write!(f, "(! {})", operand),
            Expr::Call { name, args, .. } => {
                write!(f, "({}", name)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

// Binding powers, loosest first. `^` is the only right-associative operator
// (its right power is lower than its left one).
const PREFIX_BP: u8 = 15;
const POSTFIX_BP: u8 = 17;

fn infix_bp(kind: TokenKind) -> Option<(Op, u8, u8)> {
    let bp = match kind {
        TokenKind::Less => (Op::Less, 1, 2),
        TokenKind::LessEqual => (Op::LessEqual, 1, 2),
        TokenKind::Greater => (Op::Greater, 1, 2),
        TokenKind::GreaterEqual => (Op::GreaterEqual, 1, 2),
        TokenKind::EqualEqual => (Op::Equal, 1, 2),
        TokenKind::BangEqual => (Op::NotEqual, 1, 2),
        TokenKind::Pipe => (Op::Pipe, 3, 4),
        TokenKind::Ampersand => (Op::Ampersand, 5, 6),
        TokenKind::ShiftLeft => (Op::ShiftLeft, 7, 8),
        TokenKind::ShiftRight => (Op::ShiftRight, 7, 8),
        TokenKind::Plus => (Op::Plus, 9, 10),
        TokenKind::Minus => (Op::Minus, 9, 10),
        TokenKind::Star => (Op::Star, 11, 12),
        TokenKind::Slash => (Op::Slash, 11, 12),
        TokenKind::Percent => (Op::Percent, 11, 12),
        TokenKind::Caret => (Op::Caret, 14, 13),
        _ => return None,
    };
    Some(bp)
}

pub struct Parser<'a> {
    source: &'a str,
    lexer: Lexer<'a>,
    env: &'static Environment,
    limits: Limits,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_limits(input, Limits::default())
    }

    pub fn with_limits(input: &'a str, limits: Limits) -> Self {
        Self {
            source: input,
            lexer: Lexer::new(input),
            env: Environment::global(),
            limits,
            depth: 0,
        }
    }

    /// Parses the whole input as a single expression.
    pub fn parse(&mut self) -> Result<Expr<'a>, EvalError> {
        debug!("parsing {:?}", self.source);

        if self.source.len() > self.limits.max_len {
            return Err(SyntaxError::TooLong {
                len: self.source.len(),
                max: self.limits.max_len,
            }
            .into());
        }

        let expr = self.parse_expr(0)?;
        match self.next_token()? {
            None => {
                trace!("parsed {expr}");
                Ok(expr)
            }
            Some(token) => Err(SyntaxError::TrailingInput {
                found: token.slice.to_string(),
                span: token.span(),
            }
            .into()),
        }
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr<'a>, EvalError> {
        self.depth += 1;
        let result = if self.depth > self.limits.max_depth {
            Err(SyntaxError::TooDeep {
                max: self.limits.max_depth,
                span: self.peek_span(),
            }
            .into())
        } else {
            self.parse_expr_bp(min_bp)
        };
        self.depth -= 1;
        result
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr<'a>, EvalError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let Some(token) = self.peek_token()? else {
                break;
            };

            if token.kind == TokenKind::Bang {
                if POSTFIX_BP < min_bp {
                    break;
                }
                self.lexer.next();
                lhs = Expr::Factorial {
                    operand: Box::new(lhs),
                    span: token.span(),
                };
                continue;
            }

            let Some((op, l_bp, r_bp)) = infix_bp(token.kind) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            self.lexer.next();

            let rhs = self.parse_expr(r_bp)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr<'a>, EvalError> {
        let token = self
            .next_token()?
            .ok_or_else(|| self.eof("an expression"))?;

        let op = match token.kind {
            TokenKind::Number(n) => return Ok(Expr::Number(n)),
            TokenKind::Ident => return self.parse_ident(token),
            TokenKind::LeftParen => {
                let inner = self.parse_expr(0)?;
                self.expect_closing(token)?;
                return Ok(inner);
            }
            TokenKind::Minus => Prefix::Neg,
            TokenKind::Plus => Prefix::Plus,
            TokenKind::Tilde => Prefix::BitNot,
            _ => {
                return Err(SyntaxError::UnexpectedToken {
                    found: token.slice.to_string(),
                    expected: "an expression",
                    span: token.span(),
                }
                .into())
            }
        };

        let operand = self.parse_expr(PREFIX_BP)?;
        Ok(Expr::Prefix {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_ident(&mut self, token: Token<'a>) -> Result<Expr<'a>, EvalError> {
        let name = token.slice;
        let followed_by_paren = matches!(
            self.peek_token()?,
            Some(Token {
                kind: TokenKind::LeftParen,
                ..
            })
        );

        match self.env.lookup(name) {
            Some(Binding::Constant(_)) if followed_by_paren => Err(SyntaxError::NotAFunction {
                name: name.to_string(),
                span: token.span(),
            }
            .into()),
            Some(Binding::Constant(value)) => Ok(Expr::Constant { name, value }),
            Some(Binding::Function(_)) if !followed_by_paren => Err(SyntaxError::MissingCall {
                name: name.to_string(),
                span: token.span(),
            }
            .into()),
            Some(Binding::Function(func)) => {
                let open = self
                    .next_token()?
                    .ok_or_else(|| self.eof("`(`"))?;
                let (args, end) = self.parse_args(open)?;
                let span: SourceSpan = (token.offset, end - token.offset).into();

                if args.len() != func.arity() {
                    return Err(SyntaxError::ArityMismatch {
                        name: name.to_string(),
                        expected: func.arity(),
                        found: args.len(),
                        span,
                    }
                    .into());
                }

                Ok(Expr::Call {
                    name,
                    func,
                    args,
                    span,
                })
            }
            None => Err(SyntaxError::UnknownIdentifier {
                name: name.to_string(),
                span: token.span(),
            }
            .into()),
        }
    }

    /// Parses call arguments after `open`, returning them with the byte
    /// offset just past the closing parenthesis.
    fn parse_args(&mut self, open: Token<'a>) -> Result<(Vec<Expr<'a>>, usize), EvalError> {
        let mut args = Vec::new();

        if let Some(
            close @ Token {
                kind: TokenKind::RightParen,
                ..
            },
        ) = self.peek_token()?
        {
            self.lexer.next();
            return Ok((args, close.offset + close.slice.len()));
        }

        loop {
            args.push(self.parse_expr(0)?);

            match self.next_token()? {
                Some(Token {
                    kind: TokenKind::Comma,
                    ..
                }) => continue,
                Some(
                    close @ Token {
                        kind: TokenKind::RightParen,
                        ..
                    },
                ) => return Ok((args, close.offset + close.slice.len())),
                Some(token) => {
                    return Err(SyntaxError::UnexpectedToken {
                        found: token.slice.to_string(),
                        expected: "`,` or `)`",
                        span: token.span(),
                    }
                    .into())
                }
                None => return Err(SyntaxError::UnclosedParen { span: open.span() }.into()),
            }
        }
    }

    fn expect_closing(&mut self, open: Token<'a>) -> Result<(), EvalError> {
        match self.next_token()? {
            Some(Token {
                kind: TokenKind::RightParen,
                ..
            }) => Ok(()),
            Some(token) => Err(SyntaxError::UnexpectedToken {
                found: token.slice.to_string(),
                expected: "`)`",
                span: token.span(),
            }
            .into()),
            None => Err(SyntaxError::UnclosedParen { span: open.span() }.into()),
        }
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>, EvalError> {
        let token = self.lexer.next().transpose()?;
        if let Some(token) = &token {
            trace!("token {:?} at {}", token.kind, token.offset);
        }
        Ok(token)
    }

    fn peek_token(&mut self) -> Result<Option<Token<'a>>, EvalError> {
        match self.lexer.peek() {
            None => Ok(None),
            Some(Ok(token)) => Ok(Some(*token)),
            Some(Err(err)) => Err(err.clone().into()),
        }
    }

    fn peek_span(&mut self) -> SourceSpan {
        match self.lexer.peek() {
            Some(Ok(token)) => token.span(),
            _ => self.end_span(),
        }
    }

    fn end_span(&self) -> SourceSpan {
        (self.source.len(), 0).into()
    }

    fn eof(&self, expected: &'static str) -> EvalError {
        SyntaxError::UnexpectedEof {
            expected,
            span: self.end_span(),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LexError;
    use pretty_assertions::assert_eq;

    fn parse_input(input: &str) -> String {
        let mut parser = Parser::new(input);
        parser.parse().unwrap().to_string()
    }

    fn parse_err(input: &str) -> EvalError {
        let mut parser = Parser::new(input);
        match parser.parse() {
            Ok(expr) => panic!("expected `{input}` to fail, got {expr}"),
            Err(err) => err,
        }
    }

    #[test]
    fn test_precedence() {
        assert_eq!(parse_input("1 + 2 * 3"), "(+ 1 (* 2 3))");
        assert_eq!(parse_input("(1 + 2) * 3"), "(* (+ 1 2) 3)");
        assert_eq!(parse_input("1 - 2 - 3"), "(- (- 1 2) 3)");
        assert_eq!(parse_input("8 / 4 % 3"), "(% (/ 8 4) 3)");
    }

    #[test]
    fn test_power_is_right_associative() {
        assert_eq!(parse_input("2^3^2"), "(^ 2 (^ 3 2))");
        assert_eq!(parse_input("2 * 3^2"), "(* 2 (^ 3 2))");
    }

    #[test]
    fn test_prefix_binds_tighter_than_power() {
        assert_eq!(parse_input("-2^2"), "(^ (- 2) 2)");
        assert_eq!(parse_input("2^-1"), "(^ 2 (- 1))");
        assert_eq!(parse_input("-2 * 3"), "(* (- 2) 3)");
        assert_eq!(parse_input("~~+1"), "(~ (~ (+ 1)))");
    }

    #[test]
    fn test_factorial_binds_tightest() {
        assert_eq!(parse_input("-3!"), "(- (! 3))");
        assert_eq!(parse_input("2^3!"), "(^ 2 (! 3))");
        assert_eq!(parse_input("3!!"), "(! (! 3))");
        assert_eq!(parse_input("(1 + 2)!"), "(! (+ 1 2))");
    }

    #[test]
    fn test_bitwise_and_comparison_levels() {
        assert_eq!(parse_input("1 | 2 & 3"), "(| 1 (& 2 3))");
        assert_eq!(parse_input("1 & 2 << 3"), "(& 1 (<< 2 3))");
        assert_eq!(parse_input("1 << 2 + 3"), "(<< 1 (+ 2 3))");
        assert_eq!(parse_input("1 < 2 | 4"), "(< 1 (| 2 4))");
        assert_eq!(parse_input("3!=3"), "(!= 3 3)");
    }

    #[test]
    fn test_calls_and_constants() {
        assert_eq!(parse_input("sin(PI / 2)"), "(sin (/ PI 2))");
        assert_eq!(parse_input("log(10, 1000)"), "(log 10 1000)");
        assert_eq!(parse_input("2 * π"), "(* 2 π)");
        assert_eq!(parse_input("abs(-sqrt(4))"), "(abs (- (sqrt 4)))");
    }

    #[test]
    fn test_arity_mismatch() {
        assert_eq!(
            parse_err("log(10)"),
            EvalError::Syntax(SyntaxError::ArityMismatch {
                name: "log".into(),
                expected: 2,
                found: 1,
                span: (0, 7).into(),
            })
        );
        assert!(matches!(
            parse_err("sqrt(1, 2)"),
            EvalError::Syntax(SyntaxError::ArityMismatch { found: 2, .. })
        ));
        assert!(matches!(
            parse_err("sin()"),
            EvalError::Syntax(SyntaxError::ArityMismatch { found: 0, .. })
        ));
    }

    #[test]
    fn test_identifier_errors() {
        assert_eq!(
            parse_err("foo bar"),
            EvalError::Syntax(SyntaxError::UnknownIdentifier {
                name: "foo".into(),
                span: (0, 3).into(),
            })
        );
        assert!(matches!(
            parse_err("PI(2)"),
            EvalError::Syntax(SyntaxError::NotAFunction { .. })
        ));
        assert!(matches!(
            parse_err("sin + 1"),
            EvalError::Syntax(SyntaxError::MissingCall { .. })
        ));
    }

    #[test]
    fn test_unbalanced_parentheses() {
        assert_eq!(
            parse_err("(1+2"),
            EvalError::Syntax(SyntaxError::UnclosedParen {
                span: (0, 1).into(),
            })
        );
        assert!(matches!(
            parse_err("sqrt(4"),
            EvalError::Syntax(SyntaxError::UnclosedParen { .. })
        ));
        assert!(matches!(
            parse_err("1+2)"),
            EvalError::Syntax(SyntaxError::TrailingInput { .. })
        ));
    }

    #[test]
    fn test_trailing_input() {
        assert_eq!(
            parse_err("1 + 2 3"),
            EvalError::Syntax(SyntaxError::TrailingInput {
                found: "3".into(),
                span: (6, 1).into(),
            })
        );
        assert!(matches!(
            parse_err("1 2"),
            EvalError::Syntax(SyntaxError::TrailingInput { .. })
        ));
    }

    #[test]
    fn test_missing_operands() {
        assert_eq!(
            parse_err("1 +"),
            EvalError::Syntax(SyntaxError::UnexpectedEof {
                expected: "an expression",
                span: (3, 0).into(),
            })
        );
        assert!(matches!(
            parse_err("* 2"),
            EvalError::Syntax(SyntaxError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            parse_err(""),
            EvalError::Syntax(SyntaxError::UnexpectedEof { .. })
        ));
        assert!(matches!(
            parse_err("log(1,)"),
            EvalError::Syntax(SyntaxError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_lex_errors_surface() {
        assert!(matches!(
            parse_err("1 + 0x"),
            EvalError::Lex(LexError::MalformedNumber { .. })
        ));
        assert!(matches!(
            parse_err("1 $"),
            EvalError::Lex(LexError::UnexpectedCharacter { ch: '$', .. })
        ));
    }

    #[test]
    fn test_depth_limit() {
        let limits = Limits {
            max_depth: 8,
            ..Limits::default()
        };

        let shallow = format!("{}1{}", "(".repeat(7), ")".repeat(7));
        assert!(Parser::with_limits(&shallow, limits).parse().is_ok());

        let deep = format!("{}1{}", "(".repeat(8), ")".repeat(8));
        assert!(matches!(
            Parser::with_limits(&deep, limits).parse(),
            Err(EvalError::Syntax(SyntaxError::TooDeep { max: 8, .. }))
        ));
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        let input = format!("{}1{}", "(".repeat(2000), ")".repeat(2000));
        let limits = Limits {
            max_len: usize::MAX,
            ..Limits::default()
        };
        assert!(matches!(
            Parser::with_limits(&input, limits).parse(),
            Err(EvalError::Syntax(SyntaxError::TooDeep { .. }))
        ));
    }

    #[test]
    fn test_length_limit() {
        let limits = Limits {
            max_len: 4,
            ..Limits::default()
        };
        assert_eq!(
            Parser::with_limits("1 + 2", limits).parse().unwrap_err(),
            EvalError::Syntax(SyntaxError::TooLong { len: 5, max: 4 })
        );
    }
}
