//! Recursive descent parser for the Metapath subset.
//!
//! ```text
//! expr      := or
//! or        := and ("or" and)*
//! and       := compare ("and" compare)*
//! compare   := primary (("=" | "!=" | "<" | "<=" | ">" | ">=") primary)?
//! primary   := literal | "(" expr ")" | call | path
//! call      := name "(" (expr ("," expr)*)? ")"
//! path      := "/" relative? | "//" relative | relative
//! relative  := step (("/" | "//") step)*
//! step      := ("." | ".." | "*" | name | "@" name | "@*") ("[" expr "]")*
//! ```

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{tokenize, SpannedToken, Token};
use crate::span::{Span, Spanned};

/// Parser over a tokenized expression.
pub struct Parser<'source> {
    tokens: Vec<SpannedToken>,
    pos: usize,
    source: &'source str,
}

impl<'source> Parser<'source> {
    /// Tokenize `source` and create a parser for it.
    pub fn new(source: &'source str) -> Result<Self, ParseError> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
            source,
        })
    }

    /// Parse a complete expression; trailing tokens are an error.
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        if self.tokens.is_empty() {
            return Err(ParseError::new("empty expression", Span::at(0)));
        }
        let expr = self.parse_or()?;
        if let Some(tok) = self.peek() {
            return Err(ParseError::new(
                format!("unexpected {} after expression", tok.token.describe()),
                tok.span,
            ));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_and()?;
        let mut operands = vec![first];
        while self.eat(&Token::Or).is_some() {
            operands.push(self.parse_and()?);
        }
        Ok(if operands.len() == 1 {
            operands.remove(0)
        } else {
            Expr::Or(operands)
        })
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_compare()?;
        let mut operands = vec![first];
        while self.eat(&Token::And).is_some() {
            operands.push(self.parse_compare()?);
        }
        Ok(if operands.len() == 1 {
            operands.remove(0)
        } else {
            Expr::And(operands)
        })
    }

    fn parse_compare(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_primary()?;
        let op = match self.peek().map(|t| &t.token) {
            Some(Token::Eq) => CompareOp::Eq,
            Some(Token::Ne) => CompareOp::Ne,
            Some(Token::Lt) => CompareOp::Lt,
            Some(Token::Le) => CompareOp::Le,
            Some(Token::Gt) => CompareOp::Gt,
            Some(Token::Ge) => CompareOp::Ge,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_primary()?;
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().cloned().ok_or_else(|| self.unexpected_end("an operand"))?;

        match tok.token {
            Token::String(s) => {
                self.pos += 1;
                Ok(Expr::String(s))
            }
            Token::Integer(i) => {
                self.pos += 1;
                Ok(Expr::Number(i as f64))
            }
            Token::Decimal(d) => {
                self.pos += 1;
                Ok(Expr::Number(d))
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Name(name) if self.peek_at(1).map(|t| &t.token) == Some(&Token::LParen) => {
                self.parse_call(Spanned::new(name, tok.span))
            }
            Token::Slash
            | Token::DoubleSlash
            | Token::Dot
            | Token::DotDot
            | Token::At
            | Token::Star
            | Token::Name(_) => Ok(Expr::Path(self.parse_path()?)),
            other => Err(ParseError::new(
                format!("expected an operand, found {}", other.describe()),
                tok.span,
            )),
        }
    }

    fn parse_call(&mut self, name: Spanned<String>) -> Result<Expr, ParseError> {
        let function = Function::from_name(&name.value).ok_or_else(|| {
            ParseError::new(format!("unknown function '{}'", name.value), name.span)
                .with_hint("supported: not, true, false, count, exists, empty, string, string-length, starts-with, ends-with, contains, matches")
        })?;
        self.pos += 1; // name
        self.expect(&Token::LParen)?;

        let mut args = Vec::new();
        if self.eat(&Token::RParen).is_none() {
            args.push(self.parse_or()?);
            while self.eat(&Token::Comma).is_some() {
                args.push(self.parse_or()?);
            }
            self.expect(&Token::RParen)?;
        }
        let span = name.span.merge(self.previous_span());

        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{} to {}", min, max)
            };
            return Err(ParseError::new(
                format!(
                    "{}() takes {} argument(s), {} given",
                    function.name(),
                    expected,
                    args.len()
                ),
                span,
            ));
        }

        Ok(Expr::Call {
            function,
            args,
            span,
        })
    }

    fn parse_path(&mut self) -> Result<PathExpr, ParseError> {
        let start = self.peek().map(|t| t.span).unwrap_or_default();
        let mut steps = Vec::new();
        let mut absolute = false;

        if let Some(slash) = self.eat(&Token::Slash) {
            absolute = true;
            if !self.at_step_start() {
                return Ok(PathExpr {
                    absolute,
                    steps,
                    span: slash,
                });
            }
        } else if let Some(double) = self.eat(&Token::DoubleSlash) {
            absolute = true;
            steps.push(Step::descendant_or_self(double));
        }

        steps.push(self.parse_step()?);
        loop {
            if self.eat(&Token::Slash).is_some() {
                steps.push(self.parse_step()?);
            } else if let Some(double) = self.eat(&Token::DoubleSlash) {
                steps.push(Step::descendant_or_self(double));
                steps.push(self.parse_step()?);
            } else {
                break;
            }
        }

        Ok(PathExpr {
            absolute,
            steps,
            span: start.merge(self.previous_span()),
        })
    }

    fn at_step_start(&self) -> bool {
        matches!(
            self.peek().map(|t| &t.token),
            Some(Token::Dot | Token::DotDot | Token::Star | Token::At | Token::Name(_))
        )
    }

    fn parse_step(&mut self) -> Result<Step, ParseError> {
        let tok = self.next().ok_or_else(|| self.unexpected_end("a path step"))?;
        let start = tok.span;

        let (axis, test) = match tok.token {
            Token::Dot => (Axis::SelfNode, NodeTest::Any),
            Token::DotDot => (Axis::Parent, NodeTest::Any),
            Token::Star => (Axis::Child, NodeTest::Any),
            Token::Name(name) => (Axis::Child, NodeTest::Name(Spanned::new(name, tok.span))),
            Token::At => {
                let next = self.next().ok_or_else(|| self.unexpected_end("a flag name"))?;
                match next.token {
                    Token::Star => (Axis::Flag, NodeTest::Any),
                    Token::Name(name) => (Axis::Flag, NodeTest::Name(Spanned::new(name, next.span))),
                    other => {
                        return Err(ParseError::new(
                            format!("expected a flag name after '@', found {}", other.describe()),
                            next.span,
                        ))
                    }
                }
            }
            other => {
                return Err(ParseError::new(
                    format!("expected a path step, found {}", other.describe()),
                    tok.span,
                ))
            }
        };

        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket).is_some() {
            predicates.push(self.parse_or()?);
            self.expect(&Token::RBracket)?;
        }

        Ok(Step {
            axis,
            test,
            predicates,
            span: start.merge(self.previous_span()),
        })
    }

    // --- Token helpers ---

    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&SpannedToken> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<SpannedToken> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Consume the next token if it equals `expected`, returning its span.
    fn eat(&mut self, expected: &Token) -> Option<Span> {
        match self.peek() {
            Some(tok) if &tok.token == expected => {
                let span = tok.span;
                self.pos += 1;
                Some(span)
            }
            _ => None,
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<Span, ParseError> {
        if let Some(span) = self.eat(expected) {
            return Ok(span);
        }
        match self.peek() {
            Some(tok) => Err(ParseError::new(
                format!("expected {}, found {}", expected.describe(), tok.token.describe()),
                tok.span,
            )),
            None => Err(self.unexpected_end(&expected.describe())),
        }
    }

    fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn unexpected_end(&self, expected: &str) -> ParseError {
        ParseError::new(
            format!("unexpected end of expression, expected {}", expected),
            Span::at(self.source.len()),
        )
    }
}

/// Parse an expression.
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    Parser::new(source)?.parse_expression()
}
