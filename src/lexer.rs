use miette::SourceSpan;

use crate::error::LexError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'a> {
    pub slice: &'a str,
    pub offset: usize,
    pub kind: TokenKind,
}

impl Token<'_> {
    pub fn span(&self) -> SourceSpan {
        (self.offset, self.slice.len()).into()
    }
}

impl<'a> std::fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    /// Any numeric literal, already converted and stripped of separators.
    Number(f64),
    /// A name, resolved against the built-in tables by the parser.
    Ident,
    LeftParen,
    RightParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Bang,
    Pipe,
    Ampersand,
    Tilde,
    ShiftLeft,
    ShiftRight,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    EqualEqual,
    BangEqual,
}

#[derive(Debug)]
pub struct Lexer<'a> {
    rest: &'a str,
    byte: usize,
    peeked: Option<Result<Token<'a>, LexError>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            rest: input,
            byte: 0,
            peeked: None,
        }
    }

    pub fn peek(&mut self) -> Option<&Result<Token<'a>, LexError>> {
        if self.peeked.is_some() {
            return self.peeked.as_ref();
        }

        self.peeked = self.next();
        self.peeked.as_ref()
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(next) = self.peeked.take() {
            return Some(next);
        }

        loop {
            let mut chars = self.rest.chars();
            let c = chars.next()?;
            let offset = self.byte;
            let slice = &self.rest[..c.len_utf8()];
            let c_onwards = self.rest;
            self.rest = chars.as_str();
            self.byte += c.len_utf8();

            enum Started {
                Number,
                Ident,
                // The second character that upgrades the token, and what it upgrades to.
                Compound(&'static [(char, TokenKind)], Option<TokenKind>),
            }

            let make_token = |kind: TokenKind| {
                Some(Ok(Token {
                    slice,
                    kind,
                    offset,
                }))
            };

            let started = match c {
                '(' => return make_token(TokenKind::LeftParen),
                ')' => return make_token(TokenKind::RightParen),
                ',' => return make_token(TokenKind::Comma),
                '+' => return make_token(TokenKind::Plus),
                '-' => return make_token(TokenKind::Minus),
                '*' => return make_token(TokenKind::Star),
                '/' => return make_token(TokenKind::Slash),
                '%' => return make_token(TokenKind::Percent),
                '^' => return make_token(TokenKind::Caret),
                '|' => return make_token(TokenKind::Pipe),
                '&' => return make_token(TokenKind::Ampersand),
                '~' => return make_token(TokenKind::Tilde),
                'π' => return make_token(TokenKind::Ident),
                '!' => Started::Compound(&[('=', TokenKind::BangEqual)], Some(TokenKind::Bang)),
                '=' => Started::Compound(&[('=', TokenKind::EqualEqual)], None),
                '<' => Started::Compound(
                    &[('<', TokenKind::ShiftLeft), ('=', TokenKind::LessEqual)],
                    Some(TokenKind::Less),
                ),
                '>' => Started::Compound(
                    &[('>', TokenKind::ShiftRight), ('=', TokenKind::GreaterEqual)],
                    Some(TokenKind::Greater),
                ),
                '0'..='9' => Started::Number,
                '.' if self.rest.starts_with(|c: char| c.is_ascii_digit()) => Started::Number,
                'a'..='z' | 'A'..='Z' => Started::Ident,
                c if c.is_whitespace() => continue,
                _ => {
                    return Some(Err(LexError::UnexpectedCharacter {
                        ch: c,
                        span: (offset, c.len_utf8()).into(),
                    }))
                }
            };

            match started {
                Started::Ident => {
                    let end = c_onwards
                        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                        .unwrap_or(c_onwards.len());
                    let literal = &c_onwards[..end];

                    let extra_byte = literal.len() - c.len_utf8();
                    self.byte += extra_byte;
                    self.rest = &self.rest[extra_byte..];

                    return Some(Ok(Token {
                        slice: literal,
                        offset,
                        kind: TokenKind::Ident,
                    }));
                }
                Started::Number => {
                    let (end, value) = scan_number(c_onwards);
                    let literal = &c_onwards[..end];
                    let extra_byte = literal.len() - c.len_utf8();
                    self.byte += extra_byte;
                    self.rest = &self.rest[extra_byte..];

                    let span: SourceSpan = (offset, literal.len()).into();
                    return Some(match value {
                        Ok(n) => Ok(Token {
                            slice: literal,
                            offset,
                            kind: TokenKind::Number(n),
                        }),
                        Err(NumberError::Malformed(reason)) => Err(LexError::MalformedNumber {
                            literal: literal.to_string(),
                            reason,
                            span,
                        }),
                        Err(NumberError::TooLarge) => Err(LexError::NumberTooLarge {
                            literal: literal.to_string(),
                            span,
                        }),
                    });
                }
                Started::Compound(upgrades, fallback) => {
                    let upgrade = self.rest.chars().next().and_then(|next| {
                        upgrades
                            .iter()
                            .find(|(second, _)| *second == next)
                            .map(|(_, kind)| *kind)
                    });

                    match (upgrade, fallback) {
                        (Some(kind), _) => {
                            self.rest = &self.rest[1..];
                            self.byte += 1;
                            return Some(Ok(Token {
                                slice: &c_onwards[..2],
                                offset,
                                kind,
                            }));
                        }
                        (None, Some(kind)) => return make_token(kind),
                        (None, None) => {
                            return Some(Err(LexError::UnexpectedCharacter {
                                ch: c,
                                span: (offset, c.len_utf8()).into(),
                            }))
                        }
                    }
                }
            }
        }
    }
}

enum NumberError {
    Malformed(&'static str),
    TooLarge,
}

/// Scans the numeric literal at the start of `input`.
///
/// Returns how many bytes belong to the literal together with its value. The
/// length is meaningful even on error so the lexer can skip the whole literal.
fn scan_number(input: &str) -> (usize, Result<f64, NumberError>) {
    let bytes = input.as_bytes();

    let radix = match (bytes.first(), bytes.get(1)) {
        (Some(b'0'), Some(b'x' | b'X')) => Some(16),
        (Some(b'0'), Some(b'b' | b'B')) => Some(2),
        _ => None,
    };

    if let Some(radix) = radix {
        let body = &input[2..];
        let end = body
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(body.len());
        let digits = &body[..end];
        return (2 + end, parse_radix(digits, radix));
    }

    let digit_run = |from: usize| {
        from + input[from..]
            .find(|c: char| !(c.is_ascii_digit() || c == '_'))
            .unwrap_or(input.len() - from)
    };

    let int_end = digit_run(0);
    let mut end = int_end;
    let mut frac = None;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digit_run(end + 1);
        frac = Some(&input[end + 1..frac_end]);
        end = frac_end;
    }

    // An exponent is only taken when a digit actually follows, so `2E` stays
    // a number followed by an identifier.
    let mut exponent = None;
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let digits_start = end + 1 + sign;
        if bytes.get(digits_start).is_some_and(u8::is_ascii_digit) {
            let exp_end = digit_run(digits_start);
            exponent = Some(&input[digits_start..exp_end]);
            end = exp_end;
        }
    }

    let literal = &input[..end];
    let value = check_separators(&input[..int_end], 10)
        .and_then(|_| frac.map_or(Ok(()), |f| check_separators(f, 10)))
        .and_then(|_| exponent.map_or(Ok(()), |e| check_separators(e, 10)))
        .and_then(|_| {
            literal
                .replace('_', "")
                .parse::<f64>()
                .map_err(|_| NumberError::Malformed("not a valid decimal number"))
        });

    (end, value)
}

fn parse_radix(digits: &str, radix: u32) -> Result<f64, NumberError> {
    if digits.is_empty() {
        return Err(NumberError::Malformed("missing digits after radix prefix"));
    }
    if digits.chars().any(|c| c != '_' && !c.is_digit(radix)) {
        return Err(NumberError::Malformed(match radix {
            2 => "binary literals only contain 0 and 1",
            _ => "invalid hexadecimal digit",
        }));
    }
    check_separators(digits, radix)?;

    u64::from_str_radix(&digits.replace('_', ""), radix)
        .map(|n| n as f64)
        .map_err(|_| NumberError::TooLarge)
}

/// Every `_` must sit between two digits of the given radix.
fn check_separators(digits: &str, radix: u32) -> Result<(), NumberError> {
    let chars: Vec<char> = digits.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if *c != '_' {
            continue;
        }
        let before = i.checked_sub(1).and_then(|j| chars.get(j));
        let after = chars.get(i + 1);
        let is_digit = |c: Option<&char>| c.is_some_and(|c| c.is_digit(radix));
        if !is_digit(before) || !is_digit(after) {
            return Err(NumberError::Malformed(
                "digit separators must sit between two digits",
            ));
        }
    }
    Ok(())
}
