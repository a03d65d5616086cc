// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recursive-descent parser over the token stream, producing the
//! restricted [`Expr`] AST. Grammar (lowest to highest precedence):
//! `or` > `and` > `not` > comparison/`in` > additive > multiplicative > unary > postfix > primary.

use thiserror::Error;

use super::ast::{ArithOp, CmpOp, Expr, PathSegment};
use super::lexer::{lex, LexError, Token};

/// Fixed allow-list of callable helper names (spec §4.3). Anything outside
/// this set (plus names registered at runtime by plugins, checked
/// separately by the evaluator) is rejected at parse time.
pub const BUILTIN_HELPERS: &[&str] = &[
    "has_previous_session",
    "has_handoff",
    "has_stop_signal",
    "mcp_called",
    "mcp_result_is_null",
    "mcp_failed",
    "mcp_result_has",
    "task_tree_complete",
    "task_needs_user_review",
    "command_contains",
    "command_in",
    "user_says",
    "is_plan_file",
];

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ParseError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("unexpected token {0:?}")]
    UnexpectedToken(Token),
    #[error("unexpected end of expression")]
    UnexpectedEof,
    #[error("unknown root '{0}' — only event/state/variables/settings/session/task are readable")]
    UnknownRoot(String),
}

/// The only readable context roots (spec §4.3 "read-only context map").
const ALLOWED_ROOTS: &[&str] = ["event", "state", "variables", "settings", "session", "task"].as_slice();

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

pub fn parse(src: &str) -> Result<Expr, ParseError> {
    let tokens = lex(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    parser.expect_eof()?;
    Ok(expr)
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        match self.peek() {
            Token::Eof => Ok(()),
            other => Err(ParseError::UnexpectedToken(other.clone())),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while matches!(self.peek(), Token::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek(), Token::Not) {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;
        let op = match self.peek() {
            Token::Eq => Some(CmpOp::Eq),
            Token::NotEq => Some(CmpOp::NotEq),
            Token::Lt => Some(CmpOp::Lt),
            Token::LtEq => Some(CmpOp::LtEq),
            Token::Gt => Some(CmpOp::Gt),
            Token::GtEq => Some(CmpOp::GtEq),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.parse_additive()?;
            return Ok(Expr::Cmp(op, Box::new(left), Box::new(right)));
        }
        if matches!(self.peek(), Token::In) {
            self.advance();
            let right = self.parse_additive()?;
            return Ok(Expr::In(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => ArithOp::Add,
                Token::Minus => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => ArithOp::Mul,
                Token::Slash => ArithOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek(), Token::Minus) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let primary = self.parse_primary()?;
        // Only a bare root identifier may grow a path/call; everything else
        // (literals, parenthesized expressions) stands alone.
        if let Expr::Path(root, segments) = primary {
            if segments.is_empty() && matches!(self.peek(), Token::LParen) {
                return self.parse_call(root);
            }
            let mut segments = segments;
            loop {
                match self.peek() {
                    Token::Dot => {
                        self.advance();
                        let name = self.expect_ident()?;
                        segments.push(PathSegment::Field(name));
                    }
                    Token::LBracket => {
                        self.advance();
                        let index = self.parse_or()?;
                        self.expect(Token::RBracket)?;
                        segments.push(PathSegment::Index(Box::new(index)));
                    }
                    _ => break,
                }
            }
            return Ok(Expr::Path(root, segments));
        }
        Ok(primary)
    }

    fn parse_call(&mut self, name: String) -> Result<Expr, ParseError> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if !matches!(self.peek(), Token::RParen) {
            loop {
                args.push(self.parse_or()?);
                if matches!(self.peek(), Token::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(Expr::Call(name, args))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Num(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::None_ => Ok(Expr::None_),
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                let mut items = Vec::new();
                if !matches!(self.peek(), Token::RBracket) {
                    loop {
                        items.push(self.parse_or()?);
                        if matches!(self.peek(), Token::Comma) {
                            self.advance();
                            continue;
                        }
                        break;
                    }
                }
                self.expect(Token::RBracket)?;
                Ok(Expr::List(items))
            }
            Token::Ident(root) => {
                if !ALLOWED_ROOTS.contains(&root.as_str()) && !BUILTIN_HELPERS.contains(&root.as_str()) {
                    return Err(ParseError::UnknownRoot(root));
                }
                Ok(Expr::Path(root, Vec::new()))
            }
            other => Err(ParseError::UnexpectedToken(other)),
        }
    }

    fn expect(&mut self, tok: Token) -> Result<(), ParseError> {
        if *self.peek() == tok {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken(self.peek().clone()))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Token::Ident(s) => Ok(s),
            other => Err(ParseError::UnexpectedToken(other)),
        }
    }
}
