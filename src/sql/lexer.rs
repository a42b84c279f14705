//! Tokenizer for the statement subset: keywords, identifiers (bare, `` `x` ``
//! or `[x]`), raw number text, quoted strings and `?` placeholders.

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    As,
    And,
    Or,
    Not,
    In,
    True,
    False,

    /// Reserved word of a clause this dialect does not run (JOIN, GROUP, ...)
    Unsupported(String),

    Identifier(String),
    /// Numeric literal, kept as written so `2.0` stays a float
    Number(String),
    String(String),
    Placeholder,

    Equal,
    /// `!=` or `<>`
    NotEqual,
    LessThan,
    LessThanEq,
    GreaterThan,
    GreaterThanEq,
    Minus,
    Star,
    Comma,
    Dot,
    LeftParen,
    RightParen,
    Semicolon,

    Eof,
}

const KEYWORDS: &[(&str, Token)] = &[
    ("SELECT", Token::Select),
    ("FROM", Token::From),
    ("WHERE", Token::Where),
    ("INSERT", Token::Insert),
    ("INTO", Token::Into),
    ("VALUES", Token::Values),
    ("UPDATE", Token::Update),
    ("SET", Token::Set),
    ("DELETE", Token::Delete),
    ("AS", Token::As),
    ("AND", Token::And),
    ("OR", Token::Or),
    ("NOT", Token::Not),
    ("IN", Token::In),
    ("TRUE", Token::True),
    ("FALSE", Token::False),
];

const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "JOIN", "LEFT", "RIGHT", "INNER", "OUTER", "ON", "GROUP", "ORDER", "HAVING", "LIMIT",
    "OFFSET", "UNION", "LIKE", "BETWEEN", "IS", "DISTINCT",
];

fn keyword(word: &str) -> Option<Token> {
    let upper = word.to_ascii_uppercase();
    KEYWORDS
        .iter()
        .find(|(name, _)| *name == upper)
        .map(|(_, token)| token.clone())
        .or_else(|| {
            UNSUPPORTED_KEYWORDS
                .contains(&upper.as_str())
                .then(|| Token::Unsupported(upper))
        })
}

pub struct SqlLexer {
    input: Vec<char>,
    position: usize,
}

impl SqlLexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    /// Consume `expected` if it is next
    fn eat(&mut self, expected: char) -> bool {
        if self.current() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn bump(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    /// Consume characters while `accept` holds
    fn take_while(&mut self, accept: impl Fn(char) -> bool) -> String {
        let start = self.position;
        while self.current().is_some_and(&accept) {
            self.advance();
        }
        self.input[start..self.position].iter().collect()
    }

    fn skip_trivia(&mut self) {
        loop {
            self.take_while(char::is_whitespace);
            match (self.current(), self.peek()) {
                (Some('-'), Some('-')) => {
                    self.take_while(|c| c != '\n');
                }
                (Some('/'), Some('*')) => {
                    self.position += 2;
                    while let Some(ch) = self.current() {
                        self.advance();
                        if ch == '*' && self.eat('/') {
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn read_number(&mut self) -> DbResult<Token> {
        let mut text = self.take_while(|c| c.is_ascii_digit());
        if self.current() == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            text.push('.');
            text.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }

        match self.current() {
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                Err(DbError::ParseError(format!("Invalid number: {}{}", text, ch)))
            }
            _ => Ok(Token::Number(text)),
        }
    }

    /// Body up to `closing`; a doubled `closing` stands for itself.
    fn read_delimited(&mut self, closing: char, escapes: bool) -> Option<String> {
        self.advance();
        let mut text = String::new();
        while let Some(ch) = self.current() {
            self.advance();
            if ch == closing {
                if !self.eat(closing) {
                    return Some(text);
                }
                text.push(closing);
            } else if ch == '\\' && escapes {
                if let Some(escaped) = self.current() {
                    self.advance();
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
            } else {
                text.push(ch);
            }
        }
        None
    }

    fn read_word(&mut self) -> Token {
        let word = self.take_while(|c| c.is_alphanumeric() || c == '_');
        keyword(&word).unwrap_or_else(|| Token::Identifier(word))
    }

    pub fn next_token(&mut self) -> DbResult<Token> {
        self.skip_trivia();

        let Some(ch) = self.current() else {
            return Ok(Token::Eof);
        };
        let token = match ch {
            '0'..='9' => return self.read_number(),
            c if c.is_alphabetic() || c == '_' => self.read_word(),
            '\'' | '"' => self
                .read_delimited(ch, true)
                .map(Token::String)
                .ok_or_else(|| DbError::ParseError("Unterminated string".to_string()))?,
            '`' | '[' => {
                let closing = if ch == '[' { ']' } else { '`' };
                self.read_delimited(closing, false)
                    .map(Token::Identifier)
                    .ok_or_else(|| DbError::ParseError("Unterminated quoted identifier".to_string()))?
            }
            '!' => {
                self.advance();
                if self.eat('=') {
                    Token::NotEqual
                } else {
                    Token::Not
                }
            }
            '<' => {
                self.advance();
                if self.eat('=') {
                    Token::LessThanEq
                } else if self.eat('>') {
                    Token::NotEqual
                } else {
                    Token::LessThan
                }
            }
            '>' => {
                self.advance();
                if self.eat('=') {
                    Token::GreaterThanEq
                } else {
                    Token::GreaterThan
                }
            }
            '?' => self.bump(Token::Placeholder),
            '=' => self.bump(Token::Equal),
            '-' => self.bump(Token::Minus),
            '*' => self.bump(Token::Star),
            ',' => self.bump(Token::Comma),
            '.' => self.bump(Token::Dot),
            '(' => self.bump(Token::LeftParen),
            ')' => self.bump(Token::RightParen),
            ';' => self.bump(Token::Semicolon),
            other => return Err(DbError::ParseError(format!("Unexpected character: {}", other))),
        };
        Ok(token)
    }

    pub fn tokenize(&mut self) -> DbResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token == Token::Eof {
                tokens.push(token);
                return Ok(tokens);
            }
            tokens.push(token);
        }
    }
}
