//! Tokenizer for assertion expressions.

use crate::prelude::*;

/// Token kinds of the assertion language.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    // Keywords
    And,
    Or,
    Not,
    True,
    False,
    Null,
    // Operators
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Eof,
}

impl TokenKind {
    /// Short description used in syntax errors.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Int(v) => v.to_string(),
            TokenKind::Float(v) => v.to_string(),
            TokenKind::Str(s) => format!("'{s}'"),
            TokenKind::Ident(name) => name.clone(),
            TokenKind::Eof => "end of expression".to_string(),
            other => format!("{other:?}"),
        }
    }
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

/// Converts an expression string into tokens ending with [`TokenKind::Eof`].
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            tokens: Vec::new(),
        }
    }

    /// Tokenizes the whole input, stopping at the first invalid character.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        while let Some(&(pos, c)) = self.chars.peek() {
            match c {
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                '0'..='9' => self.number(pos)?,
                '\'' | '"' => self.string(pos, c)?,
                c if c.is_alphabetic() || c == '_' => self.word(pos),
                _ => self.symbol(pos, c)?,
            }
        }

        self.tokens.push(Token {
            kind: TokenKind::Eof,
            pos: self.source.len(),
        });
        Ok(self.tokens)
    }

    fn push(&mut self, kind: TokenKind, pos: usize) {
        self.tokens.push(Token { kind, pos });
    }

    fn eat_if(&mut self, expected: char) -> bool {
        if self.chars.peek().map(|&(_, c)| c) == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn number(&mut self, start: usize) -> Result<()> {
        let mut end = start;
        let mut is_float = false;

        while let Some(&(pos, c)) = self.chars.peek() {
            if c.is_ascii_digit() || c == '_' {
                end = pos + c.len_utf8();
                self.chars.next();
            } else if c == '.' && !is_float {
                // Only a float if a digit follows the dot.
                let next_is_digit = self.source[pos + 1..]
                    .chars()
                    .next()
                    .is_some_and(|n| n.is_ascii_digit());
                if !next_is_digit {
                    break;
                }
                is_float = true;
                end = pos + 1;
                self.chars.next();
            } else {
                break;
            }
        }

        let text: String = self.source[start..end].chars().filter(|c| *c != '_').collect();
        let kind = if is_float {
            text.parse::<f64>().map(TokenKind::Float).map_err(|e| {
                TermError::evaluation(format!("invalid number '{text}' at position {start}: {e}"))
            })?
        } else {
            text.parse::<i64>().map(TokenKind::Int).map_err(|e| {
                TermError::evaluation(format!("invalid number '{text}' at position {start}: {e}"))
            })?
        };
        self.push(kind, start);
        Ok(())
    }

    fn string(&mut self, start: usize, quote: char) -> Result<()> {
        self.chars.next();
        let mut value = String::new();

        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => break,
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, c)) => value.push(c),
                    None => break,
                },
                Some((_, c)) => value.push(c),
                None => {
                    return Err(TermError::evaluation(format!(
                        "unterminated string starting at position {start}"
                    )))
                }
            }
        }

        self.push(TokenKind::Str(value), start);
        Ok(())
    }

    fn word(&mut self, start: usize) {
        let mut end = start;
        while let Some(&(pos, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                end = pos + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }

        let kind = match &self.source[start..end] {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "true" | "True" => TokenKind::True,
            "false" | "False" => TokenKind::False,
            "null" | "None" => TokenKind::Null,
            ident => TokenKind::Ident(ident.to_string()),
        };
        self.push(kind, start);
    }

    fn symbol(&mut self, pos: usize, c: char) -> Result<()> {
        self.chars.next();
        let kind = match c {
            '=' if self.eat_if('=') => TokenKind::EqEq,
            '!' if self.eat_if('=') => TokenKind::NotEq,
            '<' if self.eat_if('=') => TokenKind::LtEq,
            '<' => TokenKind::Lt,
            '>' if self.eat_if('=') => TokenKind::GtEq,
            '>' => TokenKind::Gt,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            '=' => {
                return Err(TermError::evaluation(format!(
                    "unexpected '=' at position {pos}; use '==' for comparison"
                )))
            }
            other => {
                return Err(TermError::evaluation(format!(
                    "unexpected character '{other}' at position {pos}"
                )))
            }
        };
        self.push(kind, pos);
        Ok(())
    }
}
