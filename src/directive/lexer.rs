//! Lexer for directive text.
//!
//! The lexer turns the pragma text (prefix already stripped) into a flat
//! token stream. Whitespace is insignificant outside string literals.

use crate::directive::token::{Token, TokenKind};
use crate::utils::errors::{DirectiveError, DirectiveErrorKind};
use unicode_xid::UnicodeXID;
use std::iter::Peekable;
use std::str::Chars;

/// A lexer over one directive's text.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    offset: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given directive text.
    pub fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            offset: 0,
        }
    }

    /// Tokenize the whole text.
    pub fn tokenize(mut self) -> Result<Vec<Token>, DirectiveError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.is_eof();
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    /// Produce the next token.
    fn next_token(&mut self) -> Result<Token, DirectiveError> {
        self.skip_whitespace();
        let start = self.offset;
        let c = match self.advance() {
            Some(c) => c,
            None => return Ok(Token::new(TokenKind::Eof, "", start)),
        };

        let simple = |kind: TokenKind, c: char| Ok(Token::new(kind, c.to_string(), start));
        match c {
            '(' => simple(TokenKind::LeftParen, c),
            ')' => simple(TokenKind::RightParen, c),
            '=' => simple(TokenKind::Equal, c),
            ':' => simple(TokenKind::Colon, c),
            ',' => simple(TokenKind::Comma, c),
            '/' => simple(TokenKind::Slash, c),
            '+' => simple(TokenKind::Plus, c),
            '*' => simple(TokenKind::Star, c),
            '-' => simple(TokenKind::Minus, c),
            '"' | '\'' => self.string(c, start),
            c if c.is_ascii_digit() => Ok(self.number(c, start)),
            c if UnicodeXID::is_xid_start(c) => Ok(self.name(c, start)),
            c => Err(DirectiveError::new(
                DirectiveErrorKind::UnexpectedToken,
                format!("unexpected character '{}' in directive", c),
                0,
            )),
        }
    }

    fn string(&mut self, quote: char, start: usize) -> Result<Token, DirectiveError> {
        let mut value = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => {
                    return Ok(Token::new(TokenKind::String, value, start));
                }
                Some(c) => value.push(c),
                None => {
                    return Err(DirectiveError::new(
                        DirectiveErrorKind::UnexpectedEnd,
                        "unterminated string literal in directive",
                        0,
                    ))
                }
            }
        }
    }

    fn number(&mut self, first: char, start: usize) -> Token {
        let mut value = String::from(first);
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            // advance() cannot fail after a successful peek
            if let Some(c) = self.advance() {
                value.push(c);
            }
        }
        Token::new(TokenKind::Integer, value, start)
    }

    fn name(&mut self, first: char, start: usize) -> Token {
        let mut value = String::from(first);
        // Directive keywords use '-' as an inner separator (loop-extract).
        while matches!(self.peek(), Some(c)
            if UnicodeXID::is_xid_continue(c) || c == '-')
        {
            if let Some(c) = self.advance() {
                value.push(c);
            }
        }
        Token::new(TokenKind::Name, value, start)
    }
}
