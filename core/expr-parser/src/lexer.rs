//! FILENAME: core/expr-parser/src/lexer.rs
//! PURPOSE: Scans a raw expression string and produces a stream of Tokens.
//! CONTEXT: This is the first stage of the parsing pipeline. The lexer works
//! on byte offsets into the borrowed source, so names and numbers are
//! sliced out rather than built up char by char, and every token knows
//! where it started (used for parser error positions).
//!
//! SUPPORTED OPERATORS:
//! - Single char: + - * / ^ & ( ) , = < >
//! - Multi char: <= >= <> !=
//! - String literals: "text", with "" as an escaped quote

use crate::token::Token;

pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    token_start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            pos: 0,
            token_start: 0,
        }
    }

    /// Byte offset where the most recently returned token starts.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    /// Advances the lexer and returns the next token.
    pub fn next_token(&mut self) -> Token {
        self.take_while(char::is_whitespace);
        self.token_start = self.pos;

        let Some(ch) = self.bump() else {
            return Token::EOF;
        };

        match ch {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Asterisk,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '&' => Token::Ampersand,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '=' => Token::Equals,
            '<' => {
                if self.eat('=') {
                    Token::LessEqual
                } else if self.eat('>') {
                    Token::NotEqual
                } else {
                    Token::LessThan
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::GreaterEqual
                } else {
                    Token::GreaterThan
                }
            }
            // Only valid as part of !=
            '!' if self.eat('=') => Token::NotEqual,
            '"' => self.string_literal(),
            '$' | '@' => self.sigil_name(ch),
            c if c.is_ascii_digit() || c == '.' => self.number(),
            c if is_name_start(c) => self.word(),
            c => Token::Illegal(c),
        }
    }

    // ========================================================================
    // SCANNING PRIMITIVES
    // ========================================================================

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    /// Consumes `expected` if it is next.
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    /// Consumes chars while `pred` holds and returns the consumed slice.
    fn take_while(&mut self, mut pred: impl FnMut(char) -> bool) -> &'a str {
        let source = self.source;
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !pred(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        &source[start..self.pos]
    }

    // ========================================================================
    // TOKEN READERS
    // ========================================================================

    fn string_literal(&mut self) -> Token {
        let mut text = String::new();
        loop {
            text.push_str(self.take_while(|c| c != '"'));
            if self.bump().is_none() {
                // Unterminated: keep what was read
                return Token::String(text);
            }
            if !self.eat('"') {
                return Token::String(text);
            }
            text.push('"');
        }
    }

    /// `$name` or `@name`. A bare sigil is illegal.
    fn sigil_name(&mut self, sigil: char) -> Token {
        let name = self.take_while(is_name_char);
        if name.is_empty() {
            return Token::Illegal(sigil);
        }
        match sigil {
            '$' => Token::Variable(name.to_string()),
            _ => Token::Parameter(name.to_string()),
        }
    }

    fn number(&mut self) -> Token {
        let mut seen_dot = self.source[self.token_start..].starts_with('.');
        self.take_while(|c| {
            if c == '.' && !seen_dot {
                seen_dot = true;
                true
            } else {
                c.is_ascii_digit()
            }
        });
        let text = &self.source[self.token_start..self.pos];
        match text.parse::<f64>() {
            Ok(n) => Token::Number(n),
            // a lone "."
            Err(_) => Token::Illegal('.'),
        }
    }

    /// Keyword or identifier. '.' joins path segments: `customer.address.city`.
    fn word(&mut self) -> Token {
        self.take_while(|c| is_name_char(c) || c == '.');
        let word = &self.source[self.token_start..self.pos];

        // Keywords are case-insensitive; field paths keep their case.
        if word.eq_ignore_ascii_case("TRUE") {
            Token::Boolean(true)
        } else if word.eq_ignore_ascii_case("FALSE") {
            Token::Boolean(false)
        } else if word.eq_ignore_ascii_case("NULL") {
            Token::Null
        } else {
            Token::Identifier(word.to_string())
        }
    }
}

fn is_name_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_name_char(ch: char) -> bool {
    is_name_start(ch) || ch.is_ascii_digit()
}
