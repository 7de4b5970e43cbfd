use phf::phf_map;

use crate::error::LoxError;
use crate::token::{Literal, Token, TokenType};

/// All reserved words with their token types
pub static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and" => TokenType::And,
    "break" => TokenType::Break,
    "class" => TokenType::Class,
    "continue" => TokenType::Continue,
    "elif" => TokenType::Elif,
    "else" => TokenType::Else,
    "false" => TokenType::False,
    "for" => TokenType::For,
    "fun" => TokenType::Fun,
    "if" => TokenType::If,
    "nil" => TokenType::Nil,
    "or" => TokenType::Or,
    "print" => TokenType::Print,
    "return" => TokenType::Return,
    "this" => TokenType::This,
    "true" => TokenType::True,
    "var" => TokenType::Var,
    "while" => TokenType::While,
};

pub fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub struct Scanner<'a> {
    source: &'a str,
    start: usize,
    current: usize,
    line: usize,
    done: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            start: 0,
            current: 0,
            line: 1,
            done: false,
        }
    }

    /// Scan the whole source, collecting every error instead of stopping at
    /// the first one.
    pub fn scan_all(self) -> Result<Vec<Token>, Vec<LoxError>> {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        for result in self {
            match result {
                Ok(token) => tokens.push(token),
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            Ok(tokens)
        } else {
            Err(errors)
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current..].chars().next().unwrap_or('\0');
        self.current += c.len_utf8();
        c
    }

    fn peek(&self) -> Option<char> {
        self.source[self.current..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.current..].chars();
        chars.next();
        chars.next()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.current += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn lexeme(&self) -> &str {
        &self.source[self.start..self.current]
    }

    fn add_token(&self, token_type: TokenType) -> Token {
        Token::new(token_type, self.lexeme(), self.line)
    }

    fn add_literal(&self, token_type: TokenType, literal: Literal) -> Token {
        Token {
            literal: Some(literal),
            ..self.add_token(token_type)
        }
    }

    fn either(&mut self, next: char, matched: TokenType, single: TokenType) -> Token {
        if self.match_char(next) {
            self.add_token(matched)
        } else {
            self.add_token(single)
        }
    }

    fn string(&mut self) -> Result<Token, LoxError> {
        let start_line = self.line;
        while let Some(c) = self.peek() {
            if c == '"' {
                break;
            }
            if c == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            return Err(LoxError::Scan {
                message: "Unterminated string".to_string(),
                line: start_line,
            });
        }

        // The closing quote.
        self.advance();

        let value = self.source[self.start + 1..self.current - 1]
            .replace("\\n", "\n")
            .replace("\\t", "\t");
        Ok(self.add_literal(TokenType::String, Literal::String(value)))
    }

    fn number(&mut self) -> Result<Token, LoxError> {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let value: f64 = self.lexeme().parse().map_err(|_| LoxError::Scan {
            message: format!("Invalid number '{}'", self.lexeme()),
            line: self.line,
        })?;
        Ok(self.add_literal(TokenType::Number, Literal::Number(value)))
    }

    fn identifier(&mut self) -> Token {
        while self.peek().is_some_and(is_identifier_char) {
            self.advance();
        }

        match KEYWORDS.get(self.lexeme()).copied() {
            Some(TokenType::True) => self.add_literal(TokenType::True, Literal::Bool(true)),
            Some(TokenType::False) => self.add_literal(TokenType::False, Literal::Bool(false)),
            Some(TokenType::Nil) => self.add_literal(TokenType::Nil, Literal::Nil),
            Some(keyword) => self.add_token(keyword),
            None => self.add_token(TokenType::Identifier),
        }
    }

    fn block_comment(&mut self) -> Result<(), LoxError> {
        let start_line = self.line;
        loop {
            match self.peek() {
                None => {
                    return Err(LoxError::Scan {
                        message: "Unterminated block comment".to_string(),
                        line: start_line,
                    });
                }
                Some('*') if self.peek_next() == Some('/') => {
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                Some(c) => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    self.advance();
                }
            }
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Result<Token, LoxError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if self.is_at_end() {
                self.done = true;
                return Some(Ok(Token::new(TokenType::Eof, "", self.line)));
            }

            self.start = self.current;
            let c = self.advance();

            let token = match c {
                ' ' | '\r' | '\t' => continue,
                '\n' => {
                    self.line += 1;
                    continue;
                }
                '(' => self.add_token(TokenType::LeftParen),
                ')' => self.add_token(TokenType::RightParen),
                '{' => self.add_token(TokenType::LeftBrace),
                '}' => self.add_token(TokenType::RightBrace),
                ',' => self.add_token(TokenType::Comma),
                '.' => self.add_token(TokenType::Dot),
                ';' => self.add_token(TokenType::Semicolon),
                '*' => self.add_token(TokenType::Star),
                '-' => self.either('-', TokenType::MinusMinus, TokenType::Minus),
                '+' => self.either('+', TokenType::PlusPlus, TokenType::Plus),
                '!' => self.either('=', TokenType::BangEqual, TokenType::Bang),
                '=' => self.either('=', TokenType::EqualEqual, TokenType::Equal),
                '<' => self.either('=', TokenType::LessEqual, TokenType::Less),
                '>' => self.either('=', TokenType::GreaterEqual, TokenType::Greater),
                '/' => {
                    if self.match_char('/') {
                        while self.peek().is_some_and(|c| c != '\n') {
                            self.advance();
                        }
                        continue;
                    } else if self.match_char('*') {
                        match self.block_comment() {
                            Ok(()) => continue,
                            Err(e) => return Some(Err(e)),
                        }
                    }
                    self.add_token(TokenType::Slash)
                }
                '"' => return Some(self.string()),
                c if c.is_ascii_digit() => return Some(self.number()),
                c if is_identifier_start(c) => self.identifier(),
                c => {
                    return Some(Err(LoxError::Scan {
                        message: format!("Unexpected character '{}'", c),
                        line: self.line,
                    }));
                }
            };

            return Some(Ok(token));
        }
    }
}
