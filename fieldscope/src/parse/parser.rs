//! Recursive-descent parser, building nodes directly in a [`Context`]
use super::{
    Arity, MAX_DEPTH,
    alias::{self, Function},
    lexer::{Spanned, Token},
};
use crate::{
    Error,
    context::{Context, Node, UnaryOpcode, Var},
};

pub(super) struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
    arity: Arity,
    ctx: &'a mut Context,
}

impl<'a> Parser<'a> {
    pub fn new(
        tokens: &'a [Spanned],
        arity: Arity,
        ctx: &'a mut Context,
    ) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            arity,
            ctx,
        }
    }

    /// Parses the full token stream as a single expression
    pub fn parse(mut self) -> Result<Node, Error> {
        if self.tokens.is_empty() {
            return Err(Error::EmptyFormula);
        }
        let out = self.expr()?;
        match self.tokens.get(self.pos) {
            None => Ok(out),
            Some(t) => Err(unexpected(t)),
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn next(&mut self) -> Option<&'a Spanned> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// `expr := term (('+' | '-') term)*`
    fn expr(&mut self) -> Result<Node, Error> {
        let mut lhs = self.term()?;
        loop {
            if self.eat(&Token::Plus) {
                let rhs = self.term()?;
                lhs = self.ctx.add(lhs, rhs)?;
            } else if self.eat(&Token::Minus) {
                let rhs = self.term()?;
                lhs = self.ctx.sub(lhs, rhs)?;
            } else {
                return Ok(lhs);
            }
        }
    }

    /// `term := unary (('*' | '/') unary | implicit unary)*`
    fn term(&mut self) -> Result<Node, Error> {
        let mut lhs = self.unary()?;
        loop {
            if self.eat(&Token::Star) {
                let rhs = self.unary()?;
                lhs = self.ctx.mul(lhs, rhs)?;
            } else if self.eat(&Token::Slash) {
                let rhs = self.unary()?;
                lhs = self.ctx.div(lhs, rhs)?;
            } else if self.implicit_mul() {
                let rhs = self.unary()?;
                lhs = self.ctx.mul(lhs, rhs)?;
            } else {
                return Ok(lhs);
            }
        }
    }

    /// Checks for juxtaposition, e.g. `2x` or `(x + 1)(x - 1)`
    fn implicit_mul(&self) -> bool {
        let prev = self.pos.checked_sub(1).map(|i| &self.tokens[i].token);
        prev.is_some_and(Token::ends_factor)
            && self.peek().is_some_and(Token::starts_factor)
    }

    /// `unary := ('+' | '-' | '√' | '∛') unary | power`
    ///
    /// Every level of nesting passes through here, so this is where the
    /// depth limit is enforced.
    fn unary(&mut self) -> Result<Node, Error> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(Error::TooDeep(MAX_DEPTH));
        }
        let out = if self.eat(&Token::Plus) {
            self.unary()
        } else if self.eat(&Token::Minus) {
            let a = self.unary()?;
            self.ctx.neg(a)
        } else if self.eat(&Token::Sqrt) {
            let a = self.unary()?;
            self.ctx.unary(UnaryOpcode::Sqrt, a)
        } else if self.eat(&Token::Cbrt) {
            let a = self.unary()?;
            self.ctx.unary(UnaryOpcode::Cbrt, a)
        } else {
            self.power()
        };
        self.depth -= 1;
        out
    }

    /// `power := postfix ('^' unary)?`
    ///
    /// The exponent is parsed as a `unary`, which makes `^` right-associative
    /// and lets `2^-x` through.
    fn power(&mut self) -> Result<Node, Error> {
        let base = self.postfix()?;
        if self.eat(&Token::Caret) {
            let exp = self.unary()?;
            self.ctx.pow(base, exp)
        } else {
            Ok(base)
        }
    }

    /// `postfix := primary ('²' | '³' | '°')*`
    fn postfix(&mut self) -> Result<Node, Error> {
        let mut out = self.primary()?;
        loop {
            if self.eat(&Token::Squared) {
                out = self.ctx.unary(UnaryOpcode::Square, out)?;
            } else if self.eat(&Token::Cubed) {
                out = self.ctx.pow(out, 3.0)?;
            } else if self.eat(&Token::Degree) {
                out = self.ctx.mul(out, std::f64::consts::PI / 180.0)?;
            } else {
                return Ok(out);
            }
        }
    }

    fn primary(&mut self) -> Result<Node, Error> {
        let Some(t) = self.next() else {
            return Err(Error::UnexpectedEnd);
        };
        match &t.token {
            Token::Number(n) => Ok(self.ctx.constant(*n)),
            Token::LParen => {
                let out = self.expr()?;
                if self.eat(&Token::RParen) {
                    Ok(out)
                } else {
                    Err(self.unclosed(t.offset))
                }
            }
            Token::Ident(name) => self.identifier(name),
            _ => Err(unexpected(t)),
        }
    }

    fn identifier(&mut self, name: &str) -> Result<Node, Error> {
        if let Some(v) = self.arity.var(name) {
            return Ok(self.ctx.input(v));
        }
        if let Some(c) = alias::constant(name) {
            return Ok(self.ctx.constant(c));
        }
        let Some(f) = Function::from_name(name) else {
            return Err(Error::UnknownIdentifier(name.to_owned()));
        };
        let open = match self.tokens.get(self.pos) {
            Some(t) if t.token == Token::LParen => t.offset,
            _ => return Err(Error::MissingArguments(name.to_owned())),
        };
        self.pos += 1;

        let mut args = vec![self.expr()?];
        loop {
            if self.eat(&Token::Comma) {
                args.push(self.expr()?);
            } else if self.eat(&Token::RParen) {
                break;
            } else {
                return Err(self.unclosed(open));
            }
        }
        f.build(self.ctx, &args)
    }

    /// Builds the error for a missing `)`
    ///
    /// Running out of tokens means the parenthesis was never closed; any
    /// other token is reported as unexpected.
    fn unclosed(&self, open: usize) -> Error {
        match self.tokens.get(self.pos) {
            None => Error::UnclosedParen(open),
            Some(t) => unexpected(t),
        }
    }
}

fn unexpected(t: &Spanned) -> Error {
    Error::UnexpectedToken {
        found: t.token.describe(),
        offset: t.offset,
    }
}

impl Arity {
    /// Resolves a (lowercase) variable name
    fn var(self, name: &str) -> Option<Var> {
        match (name, self) {
            ("x", _) => Some(Var::X),
            ("y", _) => Some(Var::Y),
            ("t", Arity::Three) => Some(Var::T),
            _ => None,
        }
    }
}
