use std::fmt::Display;

use crate::span::Position;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Literals
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Identifier(String),

    // Keywords
    Func,
    Return,
    Var,
    If,
    Else,
    While,
    Break,
    For,
    In,

    // One or two character operators
    BitwiseAnd,
    And,
    BitwiseOr,
    Or,
    Tilde,
    Bang,
    Caret,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    BangEqual,

    // Punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Semicolon,

    // End of file
    Eof,
}

impl TokenType {
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenType::Nil
                | TokenType::Bool(_)
                | TokenType::Int(_)
                | TokenType::Float(_)
                | TokenType::String(_)
        )
    }
}

fn keyword(word: &str) -> Option<TokenType> {
    let token_type = match word {
        "nil" => TokenType::Nil,
        "true" => TokenType::Bool(true),
        "false" => TokenType::Bool(false),
        "func" => TokenType::Func,
        "return" => TokenType::Return,
        "var" => TokenType::Var,
        "if" => TokenType::If,
        "else" => TokenType::Else,
        "while" => TokenType::While,
        "break" => TokenType::Break,
        "for" => TokenType::For,
        "in" => TokenType::In,
        _ => return None,
    };
    Some(token_type)
}

/// Renders a float the way literals and values print it: shortest
/// round-trip digits, with a trailing `.0` for integral values.
pub(crate) fn fmt_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

pub(crate) fn escape_string(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len() + 2);
    escaped.push('"');
    for c in s.chars() {
        match c {
            '\x07' => escaped.push_str("\\a"),
            '\x08' => escaped.push_str("\\b"),
            '\x0C' => escaped.push_str("\\f"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\x0B' => escaped.push_str("\\v"),
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            c => escaped.push(c),
        }
    }
    escaped.push('"');
    escaped
}

impl Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TokenType::Nil => "nil",
            TokenType::Bool(b) => return write!(f, "{b}"),
            TokenType::Int(i) => return write!(f, "{i}"),
            TokenType::Float(x) => return write!(f, "{}", fmt_float(*x)),
            TokenType::String(s) => return write!(f, "{}", escape_string(s)),
            TokenType::Identifier(name) => return write!(f, "{name}"),
            TokenType::Func => "func",
            TokenType::Return => "return",
            TokenType::Var => "var",
            TokenType::If => "if",
            TokenType::Else => "else",
            TokenType::While => "while",
            TokenType::Break => "break",
            TokenType::For => "for",
            TokenType::In => "in",
            TokenType::BitwiseAnd => "&",
            TokenType::And => "&&",
            TokenType::BitwiseOr => "|",
            TokenType::Or => "||",
            TokenType::Tilde => "~",
            TokenType::Bang => "!",
            TokenType::Caret => "^",
            TokenType::Plus => "+",
            TokenType::Minus => "-",
            TokenType::Star => "*",
            TokenType::Slash => "/",
            TokenType::Percent => "%",
            TokenType::Equal => "=",
            TokenType::EqualEqual => "==",
            TokenType::Greater => ">",
            TokenType::GreaterEqual => ">=",
            TokenType::Less => "<",
            TokenType::LessEqual => "<=",
            TokenType::BangEqual => "!=",
            TokenType::LeftParen => "(",
            TokenType::RightParen => ")",
            TokenType::LeftBracket => "[",
            TokenType::RightBracket => "]",
            TokenType::LeftBrace => "{",
            TokenType::RightBrace => "}",
            TokenType::Comma => ",",
            TokenType::Dot => ".",
            TokenType::Semicolon => ";",
            TokenType::Eof => "<eof>",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub position: Position,
}

impl Token {
    pub fn new(token_type: TokenType, position: Position) -> Self {
        Self {
            token_type,
            position,
        }
    }

    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenizeErrorKind {
    #[error("Unexpected character")]
    UnexpectedCharacter,
    #[error("Incomplete number")]
    IncompleteNumber,
    #[error("Integer literal out of range")]
    IntegerOutOfRange,
    #[error("Incomplete string")]
    IncompleteString,
    #[error("Unknown escape sequence")]
    UnknownEscape,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} near {} in module {module} {position}", describe(.found))]
pub struct TokenizeError {
    pub kind: TokenizeErrorKind,
    pub found: Option<char>,
    pub module: String,
    pub position: Position,
}

fn describe(found: &Option<char>) -> String {
    match found {
        Some(c) => format!("'{}'", c.escape_debug()),
        None => "<eof>".to_string(),
    }
}

/// Scanner over a lazy sequence of code points.
///
/// `current` always holds the character at `line`/`column`; once the input
/// is exhausted every call to [`Tokenizer::token`] yields `Eof`.
pub struct Tokenizer<I: Iterator<Item = char>> {
    chars: I,
    current: Option<char>,
    module: String,
    line: usize,
    column: usize,
    buffer: String,
}

impl<'a> Tokenizer<std::str::Chars<'a>> {
    pub fn from_source(source: &'a str, module: impl Into<String>) -> Self {
        Self::new(source.chars(), module)
    }
}

impl<I: Iterator<Item = char>> Tokenizer<I> {
    pub fn new(chars: I, module: impl Into<String>) -> Self {
        let mut tokenizer = Self {
            chars,
            current: None,
            module: module.into(),
            line: 1,
            column: 0,
            buffer: String::new(),
        };
        tokenizer.advance();
        tokenizer
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn token(&mut self) -> Result<Token, TokenizeError> {
        loop {
            let start = self.position();
            let Some(c) = self.current else {
                return Ok(Token::new(TokenType::Eof, start));
            };

            match c {
                ' ' | '\t' | '\x0B' | '\x0C' => self.advance(),
                '\r' | '\n' => self.newline(),
                '&' => return Ok(self.doubled('&', TokenType::BitwiseAnd, TokenType::And, start)),
                '|' => return Ok(self.doubled('|', TokenType::BitwiseOr, TokenType::Or, start)),
                '~' => return Ok(self.single(TokenType::Tilde, start)),
                '^' => return Ok(self.single(TokenType::Caret, start)),
                '+' => return Ok(self.single(TokenType::Plus, start)),
                '-' => return Ok(self.single(TokenType::Minus, start)),
                '*' => return Ok(self.single(TokenType::Star, start)),
                '%' => return Ok(self.single(TokenType::Percent, start)),
                '(' => return Ok(self.single(TokenType::LeftParen, start)),
                ')' => return Ok(self.single(TokenType::RightParen, start)),
                '[' => return Ok(self.single(TokenType::LeftBracket, start)),
                ']' => return Ok(self.single(TokenType::RightBracket, start)),
                '{' => return Ok(self.single(TokenType::LeftBrace, start)),
                '}' => return Ok(self.single(TokenType::RightBrace, start)),
                ',' => return Ok(self.single(TokenType::Comma, start)),
                ';' => return Ok(self.single(TokenType::Semicolon, start)),
                '/' => {
                    self.advance();
                    if self.current == Some('/') {
                        self.comment();
                    } else {
                        return Ok(Token::new(TokenType::Slash, start));
                    }
                }
                '=' | '<' | '>' | '!' => return Ok(self.with_equal(c, start)),
                '.' => {
                    self.advance();
                    match self.current {
                        Some(d) if d.is_ascii_digit() => {
                            self.buffer.clear();
                            self.buffer.push('.');
                            return self.number(true, start);
                        }
                        Some(l) if l.is_alphabetic() || l == '_' => {
                            return Ok(Token::new(TokenType::Dot, start));
                        }
                        _ => {
                            return Err(self.error_at(
                                TokenizeErrorKind::UnexpectedCharacter,
                                Some('.'),
                                start,
                            ))
                        }
                    }
                }
                '\'' | '"' => return self.string(c, start),
                c if c.is_ascii_digit() => {
                    self.buffer.clear();
                    return self.number(false, start);
                }
                c if c.is_alphabetic() || c == '_' => return Ok(self.identifier(start)),
                _ => return Err(self.error(TokenizeErrorKind::UnexpectedCharacter)),
            }
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column.max(1))
    }

    fn advance(&mut self) {
        self.current = self.chars.next();
        if self.current.is_some() {
            self.column += 1;
        }
    }

    fn newline(&mut self) {
        let first = self.current;
        self.advance();
        if matches!(self.current, Some('\r' | '\n')) && self.current != first {
            self.advance();
        }
        self.line += 1;
        self.column = if self.current.is_some() { 1 } else { 0 };
    }

    fn comment(&mut self) {
        while !matches!(self.current, None | Some('\r' | '\n')) {
            self.advance();
        }
    }

    fn error(&self, kind: TokenizeErrorKind) -> TokenizeError {
        self.error_at(kind, self.current, self.position())
    }

    fn error_at(
        &self,
        kind: TokenizeErrorKind,
        found: Option<char>,
        position: Position,
    ) -> TokenizeError {
        TokenizeError {
            kind,
            found,
            module: self.module.clone(),
            position,
        }
    }

    fn single(&mut self, token_type: TokenType, start: Position) -> Token {
        self.advance();
        Token::new(token_type, start)
    }

    fn doubled(
        &mut self,
        c: char,
        single: TokenType,
        double: TokenType,
        start: Position,
    ) -> Token {
        self.advance();
        if self.current == Some(c) {
            self.advance();
            Token::new(double, start)
        } else {
            Token::new(single, start)
        }
    }

    fn with_equal(&mut self, c: char, start: Position) -> Token {
        self.advance();
        let followed_by_equal = self.current == Some('=');
        if followed_by_equal {
            self.advance();
        }
        let token_type = match (c, followed_by_equal) {
            ('=', false) => TokenType::Equal,
            ('=', true) => TokenType::EqualEqual,
            ('<', false) => TokenType::Less,
            ('<', true) => TokenType::LessEqual,
            ('>', false) => TokenType::Greater,
            ('>', true) => TokenType::GreaterEqual,
            (_, false) => TokenType::Bang,
            (_, true) => TokenType::BangEqual,
        };
        Token::new(token_type, start)
    }

    fn number(&mut self, mut has_dot: bool, start: Position) -> Result<Token, TokenizeError> {
        while let Some(c) = self.current.filter(|c| c.is_ascii_digit() || *c == '.') {
            if c == '.' {
                if has_dot {
                    return Err(self.error(TokenizeErrorKind::UnexpectedCharacter));
                }
                has_dot = true;
            }
            self.buffer.push(c);
            self.advance();
        }

        let mut exponent = false;
        if let Some(e @ ('e' | 'E')) = self.current {
            self.buffer.push(e);
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.current {
                self.buffer.push(sign);
                self.advance();
            }
            if !self.current.is_some_and(|c| c.is_ascii_digit()) {
                return Err(self.error(TokenizeErrorKind::IncompleteNumber));
            }
            while let Some(d) = self.current.filter(char::is_ascii_digit) {
                self.buffer.push(d);
                self.advance();
            }
            exponent = true;
        }

        let token_type = if has_dot || exponent {
            let value = self.buffer.parse::<f64>().map_err(|_| {
                self.error_at(TokenizeErrorKind::IncompleteNumber, self.current, start)
            })?;
            TokenType::Float(value)
        } else {
            let value = self.buffer.parse::<i64>().map_err(|_| {
                self.error_at(TokenizeErrorKind::IntegerOutOfRange, self.current, start)
            })?;
            TokenType::Int(value)
        };
        Ok(Token::new(token_type, start))
    }

    fn string(&mut self, quote: char, start: Position) -> Result<Token, TokenizeError> {
        self.buffer.clear();
        self.advance();
        loop {
            match self.current {
                None | Some('\r' | '\n') => {
                    return Err(self.error(TokenizeErrorKind::IncompleteString))
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.current {
                        Some('a') => '\x07',
                        Some('b') => '\x08',
                        Some('f') => '\x0C',
                        Some('n') => '\n',
                        Some('r') => '\r',
                        Some('t') => '\t',
                        Some('v') => '\x0B',
                        Some(c @ ('\\' | '"' | '\'')) => c,
                        _ => return Err(self.error(TokenizeErrorKind::UnknownEscape)),
                    };
                    self.buffer.push(escaped);
                    self.advance();
                }
                Some(c) => {
                    self.buffer.push(c);
                    self.advance();
                }
            }
        }
        Ok(Token::new(
            TokenType::String(std::mem::take(&mut self.buffer)),
            start,
        ))
    }

    fn identifier(&mut self, start: Position) -> Token {
        self.buffer.clear();
        while let Some(c) = self.current.filter(|c| c.is_alphanumeric() || *c == '_') {
            self.buffer.push(c);
            self.advance();
        }
        let token_type = keyword(&self.buffer)
            .unwrap_or_else(|| TokenType::Identifier(std::mem::take(&mut self.buffer)));
        Token::new(token_type, start)
    }
}

pub fn tokens(source: &str, module: &str) -> Result<Vec<Token>, TokenizeError> {
    let mut tokenizer = Tokenizer::from_source(source, module);
    let mut tokens = Vec::new();

    loop {
        let token = tokenizer.token()?;
        let done = token.token_type == TokenType::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }

    Ok(tokens)
}
