use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// Coarse classification of an [`EvalError`].
///
/// `Arity` is a refinement of `Syntax`: arity mismatches are reported through
/// [`EvalError::Syntax`] but can still be told apart here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Syntax,
    Arity,
    Domain,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ErrorKind::Lex => "lex error",
                ErrorKind::Syntax => "syntax error",
                ErrorKind::Arity => "arity error",
                ErrorKind::Domain => "domain error",
            }
        )
    }
}

#[derive(Diagnostic, Debug, Error, Clone, PartialEq)]
pub enum LexError {
    #[error("unexpected character `{ch}`")]
    #[diagnostic(code(inline_calc::lex::unexpected_character))]
    UnexpectedCharacter {
        ch: char,
        #[label("this input character")]
        span: SourceSpan,
    },

    #[error("malformed numeric literal `{literal}`: {reason}")]
    #[diagnostic(code(inline_calc::lex::malformed_number))]
    MalformedNumber {
        literal: String,
        reason: &'static str,
        #[label("this numeric literal")]
        span: SourceSpan,
    },

    #[error("numeric literal `{literal}` does not fit in 64 bits")]
    #[diagnostic(code(inline_calc::lex::number_too_large))]
    NumberTooLarge {
        literal: String,
        #[label("this numeric literal")]
        span: SourceSpan,
    },
}

#[derive(Diagnostic, Debug, Error, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("unexpected token `{found}`, expected {expected}")]
    #[diagnostic(code(inline_calc::syntax::unexpected_token))]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("unexpected end of input, expected {expected}")]
    #[diagnostic(code(inline_calc::syntax::unexpected_eof))]
    UnexpectedEof {
        expected: &'static str,
        #[label("input ends here")]
        span: SourceSpan,
    },

    #[error("unclosed parenthesis")]
    #[diagnostic(code(inline_calc::syntax::unclosed_paren))]
    UnclosedParen {
        #[label("this parenthesis is never closed")]
        span: SourceSpan,
    },

    #[error("unexpected trailing input `{found}`")]
    #[diagnostic(code(inline_calc::syntax::trailing_input))]
    TrailingInput {
        found: String,
        #[label("expected end of input")]
        span: SourceSpan,
    },

    #[error("unknown identifier `{name}`")]
    #[diagnostic(code(inline_calc::syntax::unknown_identifier))]
    UnknownIdentifier {
        name: String,
        #[label("not a constant or function")]
        span: SourceSpan,
    },

    #[error("`{name}` is a constant, not a function")]
    #[diagnostic(code(inline_calc::syntax::not_a_function))]
    NotAFunction {
        name: String,
        #[label("cannot be called")]
        span: SourceSpan,
    },

    #[error("function `{name}` must be called with arguments")]
    #[diagnostic(code(inline_calc::syntax::missing_call))]
    MissingCall {
        name: String,
        #[label("missing `(...)`")]
        span: SourceSpan,
    },

    #[error("function `{name}` takes {expected} argument(s) but {found} were given")]
    #[diagnostic(code(inline_calc::syntax::arity_mismatch))]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        #[label("this call")]
        span: SourceSpan,
    },

    #[error("expression is nested more than {max} levels deep")]
    #[diagnostic(code(inline_calc::syntax::too_deep))]
    TooDeep {
        max: usize,
        #[label("limit reached here")]
        span: SourceSpan,
    },

    #[error("expression is {len} bytes long, the limit is {max}")]
    #[diagnostic(code(inline_calc::syntax::too_long))]
    TooLong { len: usize, max: usize },
}

#[derive(Diagnostic, Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("factorial is only defined for non-negative integers, got {value}")]
    #[diagnostic(code(inline_calc::domain::factorial))]
    Factorial {
        value: f64,
        #[label("this factorial")]
        span: SourceSpan,
    },
}

#[derive(Diagnostic, Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Domain(#[from] DomainError),
}

impl EvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::Lex(_) => ErrorKind::Lex,
            EvalError::Syntax(SyntaxError::ArityMismatch { .. }) => ErrorKind::Arity,
            EvalError::Syntax(_) => ErrorKind::Syntax,
            EvalError::Domain(_) => ErrorKind::Domain,
        }
    }

    /// True for every grammar failure, arity mismatches included.
    pub fn is_syntax(&self) -> bool {
        matches!(self, EvalError::Syntax(_))
    }

    /// Byte range of the offending input, when there is one.
    pub fn span(&self) -> Option<SourceSpan> {
        match self {
            EvalError::Lex(
                LexError::UnexpectedCharacter { span, .. }
                | LexError::MalformedNumber { span, .. }
                | LexError::NumberTooLarge { span, .. },
            ) => Some(*span),
            EvalError::Syntax(SyntaxError::TooLong { .. }) => None,
            EvalError::Syntax(
                SyntaxError::UnexpectedToken { span, .. }
                | SyntaxError::UnexpectedEof { span, .. }
                | SyntaxError::UnclosedParen { span }
                | SyntaxError::TrailingInput { span, .. }
                | SyntaxError::UnknownIdentifier { span, .. }
                | SyntaxError::NotAFunction { span, .. }
                | SyntaxError::MissingCall { span, .. }
                | SyntaxError::ArityMismatch { span, .. }
                | SyntaxError::TooDeep { span, .. },
            ) => Some(*span),
            EvalError::Domain(DomainError::Factorial { span, .. }) => Some(*span),
        }
    }
}
