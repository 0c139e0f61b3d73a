//! Tokenizer for the persisted graph text.
//!
//! Produces the whole token stream up front, each token tagged with the
//! location where it starts.

use crate::error::{ParseError, ParseResult, SourceLocation};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LBrace,
    RBrace,
    Colon,
    Equals,
    /// `->`
    Arrow,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Ident(String),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LBrace => f.write_str("'{'"),
            Token::RBrace => f.write_str("'}'"),
            Token::Colon => f.write_str("':'"),
            Token::Equals => f.write_str("'='"),
            Token::Arrow => f.write_str("'->'"),
            Token::Str(s) => write!(f, "string \"{}\"", s),
            Token::Int(n) => write!(f, "integer {}", n),
            Token::Float(n) => write!(f, "number {}", n),
            Token::Bool(b) => write!(f, "boolean {}", b),
            Token::Ident(name) => write!(f, "'{}'", name),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub location: SourceLocation,
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenizes the whole input; the last token is always [`Token::Eof`].
    pub fn tokenize(mut self) -> ParseResult<Vec<Spanned>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let location = self.location();
            let Some(c) = self.peek() else {
                tokens.push(Spanned {
                    token: Token::Eof,
                    location,
                });
                return Ok(tokens);
            };
            let token = match c {
                '{' => self.single(Token::LBrace),
                '}' => self.single(Token::RBrace),
                ':' => self.single(Token::Colon),
                '=' => self.single(Token::Equals),
                '"' => self.string()?,
                '-' if self.peek_at(1) == Some('>') => {
                    self.advance();
                    self.advance();
                    Token::Arrow
                }
                '-' | '+' | '0'..='9' => self.number()?,
                c if c.is_ascii_alphabetic() || c == '_' => self.word(),
                other => {
                    return Err(ParseError::lexical(
                        format!("unexpected character '{}'", other),
                        location,
                    ))
                }
            };
            tokens.push(Spanned { token, location });
        }
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    /// Skips whitespace and `//` or `#` line comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => self.skip_line(),
                Some('/') if self.peek_at(1) == Some('/') => self.skip_line(),
                _ => return,
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.advance() {
            if c == '\n' {
                break;
            }
        }
    }

    fn string(&mut self) -> ParseResult<Token> {
        let start = self.location();
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(ParseError::UnexpectedEof {
                        expected: "closing quote".to_string(),
                        location: start,
                    })
                }
                Some('"') => return Ok(Token::Str(value)),
                Some('\\') => {
                    let escape_at = self.location();
                    match self.advance() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('"') => value.push('"'),
                        Some('\\') => value.push('\\'),
                        Some(other) => {
                            return Err(ParseError::lexical(
                                format!("unknown escape '\\{}'", other),
                                escape_at,
                            ))
                        }
                        None => {
                            return Err(ParseError::UnexpectedEof {
                                expected: "escape character".to_string(),
                                location: escape_at,
                            })
                        }
                    }
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn number(&mut self) -> ParseResult<Token> {
        let start = self.location();
        let mut text = String::new();
        if let Some(sign @ ('-' | '+')) = self.peek() {
            text.push(sign);
            self.advance();
        }
        self.digits(&mut text);
        let mut fractional = false;
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some('0'..='9')) {
            fractional = true;
            text.push('.');
            self.advance();
            self.digits(&mut text);
        }

        if !text.chars().any(|c| c.is_ascii_digit()) {
            return Err(ParseError::lexical(format!("expected digits after '{}'", text), start));
        }
        if fractional {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|e| {
                    ParseError::lexical(format!("invalid number '{}': {}", text, e), start)
                })
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|e| {
                    ParseError::lexical(format!("invalid integer '{}': {}", text, e), start)
                })
        }
    }

    fn digits(&mut self, text: &mut String) {
        while let Some(c @ '0'..='9') = self.peek() {
            text.push(c);
            self.advance();
        }
    }

    fn word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match word.as_str() {
            "true" => Token::Bool(true),
            "false" => Token::Bool(false),
            _ => Token::Ident(word),
        }
    }
}

pub fn tokenize(input: &str) -> ParseResult<Vec<Spanned>> {
    Lexer::new(input).tokenize()
}
