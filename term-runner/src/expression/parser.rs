//! Recursive-descent parser for assertion expressions.
//!
//! Precedence, loosest first:
//! `or` → `and` → `not` → comparison → additive → multiplicative → unary →
//! postfix (`[...]`, `.name`, `.name(...)`) → primary.

use super::lexer::{Token, TokenKind};
use crate::prelude::*;

/// Literal values written in an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Name(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Attribute(Box<Expr>, String),
    Method {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Call {
        function: String,
        args: Vec<Expr>,
    },
}

/// Maximum nesting of the expression tree. Groups, indexes, call arguments,
/// prefix operators and each operator in a chain all count one level.
pub const MAX_NESTING: usize = 64;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Parses a complete expression; trailing tokens are an error.
    pub fn parse(mut self) -> Result<Expr> {
        let expr = self.or_expr()?;
        if !self.check(&TokenKind::Eof) {
            return Err(self.unexpected("end of expression"));
        }
        Ok(expr)
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn peek(&self) -> &Token {
        // The token stream always ends with Eof and we never advance past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<()> {
        if self.match_token(kind) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    /// Takes one level of the nesting budget. Callers reset `depth` to the
    /// value they saw on entry once their subtree is built.
    fn nest(&mut self) -> Result<()> {
        if self.depth >= MAX_NESTING {
            return Err(TermError::evaluation(format!(
                "expression nested too deeply (limit {MAX_NESTING}) at position {}",
                self.peek().pos
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn unexpected(&self, expected: &str) -> TermError {
        let token = self.peek();
        TermError::evaluation(format!(
            "syntax error at position {}: expected {expected}, found {}",
            token.pos,
            token.kind.describe()
        ))
    }

    // ========================================================================
    // Grammar
    // ========================================================================

    fn or_expr(&mut self) -> Result<Expr> {
        let base = self.depth;
        self.nest()?;
        let mut left = self.and_expr()?;
        while self.match_token(&TokenKind::Or) {
            self.nest()?;
            let right = self.and_expr()?;
            left = Expr::Binary(Box::new(left), BinaryOp::Or, Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut left = self.not_expr()?;
        while self.match_token(&TokenKind::And) {
            self.nest()?;
            let right = self.not_expr()?;
            left = Expr::Binary(Box::new(left), BinaryOp::And, Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.match_token(&TokenKind::Not) {
            let base = self.depth;
            self.nest()?;
            let operand = self.not_expr()?;
            self.depth = base;
            Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)))
        } else {
            self.comparison()
        }
    }

    /// Comparisons do not chain: `a < b < c` is a syntax error.
    fn comparison(&mut self) -> Result<Expr> {
        let left = self.additive()?;
        let op = match self.peek().kind {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::LtEq => BinaryOp::LtEq,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::GtEq => BinaryOp::GtEq,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.additive()?;
        Ok(Expr::Binary(Box::new(left), op, Box::new(right)))
    }

    fn additive(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            self.nest()?;
            let right = self.multiplicative()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            self.nest()?;
            let right = self.unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.match_token(&TokenKind::Minus) {
            let base = self.depth;
            self.nest()?;
            let operand = self.unary()?;
            self.depth = base;
            Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)))
        } else {
            self.postfix()
        }
    }

    fn postfix(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut expr = self.primary()?;
        loop {
            if self.match_token(&TokenKind::LBracket) {
                self.nest()?;
                let index = self.or_expr()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.match_token(&TokenKind::Dot) {
                self.nest()?;
                let name = self.identifier()?;
                if self.match_token(&TokenKind::LParen) {
                    let args = self.arguments()?;
                    expr = Expr::Method {
                        receiver: Box::new(expr),
                        method: name,
                        args,
                    };
                } else {
                    expr = Expr::Attribute(Box::new(expr), name);
                }
            } else {
                self.depth = base;
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let starts_value = matches!(
            self.peek().kind,
            TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::Ident(_)
                | TokenKind::LParen
        );
        if !starts_value {
            return Err(self.unexpected("a value"));
        }

        let token = self.advance();
        let expr = match token.kind {
            TokenKind::Int(v) => Expr::Literal(Literal::Int(v)),
            TokenKind::Float(v) => Expr::Literal(Literal::Float(v)),
            TokenKind::Str(s) => Expr::Literal(Literal::Str(s)),
            TokenKind::True => Expr::Literal(Literal::Bool(true)),
            TokenKind::False => Expr::Literal(Literal::Bool(false)),
            TokenKind::Null => Expr::Literal(Literal::Null),
            TokenKind::Ident(name) => {
                if self.match_token(&TokenKind::LParen) {
                    let args = self.arguments()?;
                    Expr::Call {
                        function: name,
                        args,
                    }
                } else {
                    Expr::Name(name)
                }
            }
            TokenKind::LParen => {
                let inner = self.or_expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                inner
            }
            _ => unreachable!("checked by starts_value"),
        };
        Ok(expr)
    }

    fn identifier(&mut self) -> Result<String> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    /// Parses call arguments after the opening parenthesis.
    fn arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.match_token(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.or_expr()?);
            if self.match_token(&TokenKind::Comma) {
                continue;
            }
            self.expect(&TokenKind::RParen, "',' or ')'")?;
            return Ok(args);
        }
    }
}
