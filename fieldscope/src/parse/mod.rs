//! Formula parsing
//!
//! Formulas are written in a closed grammar of real-valued elementary
//! functions:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary | implicit unary)*
//! unary   := ('+' | '-' | '√' | '∛') unary | power
//! power   := postfix ('^' unary)?
//! postfix := primary ('²' | '³' | '°')*
//! primary := number | constant | variable
//!          | function '(' expr (',' expr)* ')' | '(' expr ')'
//! ```
//!
//! `^` (also spelled `**`) is right-associative and binds tighter than unary
//! minus, so `-x^2` is `-(x^2)`.  A number, `)` or postfix operator directly
//! followed by a number, identifier or `(` is an implicit multiplication
//! (`2x`, `3(x + 1)`, `(x + 1)(x - 1)`).  Identifiers are case-insensitive.
//!
//! Parsing builds nodes directly in a [`Context`]:
//! ```
//! use fieldscope::{context::Context, parse::{compile, Arity}};
//!
//! let mut ctx = Context::new();
//! let root = compile(&mut ctx, "x^2 + 2y", Arity::Two)?;
//! assert_eq!(ctx.eval_xyt(root, 3.0, 1.0, 0.0)?, 11.0);
//! # Ok::<(), fieldscope::Error>(())
//! ```
use crate::{
    Error,
    context::{Context, Node},
};

mod alias;
mod lexer;
mod parser;

pub use alias::{ArgCount, Function};
pub use lexer::{Spanned, Token, tokenize};

/// Maximum nesting depth of parentheses, calls, and prefix operators
pub const MAX_DEPTH: usize = 128;

/// Set of variables a formula may read
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Arity {
    /// `x` and `y`
    Two,
    /// `x`, `y`, and `t`
    #[default]
    Three,
}

/// Parses a formula, adding its graph to the given context
///
/// Returns the root node of the formula.
pub fn compile(
    ctx: &mut Context,
    formula: &str,
    arity: Arity,
) -> Result<Node, Error> {
    let tokens = tokenize(formula)?;
    parser::Parser::new(&tokens, arity, ctx).parse()
}

/// Looks up a named constant (`pi`, `tau`, `phi`, `e`, `deg`, `rad`)
pub fn constant(name: &str) -> Option<f64> {
    alias::constant(&name.to_ascii_lowercase())
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn eval(s: &str, x: f64, y: f64, t: f64) -> f64 {
        let mut ctx = Context::new();
        let root = compile(&mut ctx, s, Arity::Three).unwrap();
        ctx.eval_xyt(root, x, y, t).unwrap()
    }

    fn err(s: &str) -> Error {
        let mut ctx = Context::new();
        compile(&mut ctx, s, Arity::Two).unwrap_err()
    }

    #[test]
    fn precedence() {
        assert_eq!(eval("1 + 2 * 3", 0.0, 0.0, 0.0), 7.0);
        assert_eq!(eval("-x^2", 3.0, 0.0, 0.0), -9.0);
        assert_eq!(eval("2^3^2", 0.0, 0.0, 0.0), 512.0);
        assert_eq!(eval("2**-1", 0.0, 0.0, 0.0), 0.5);
        assert_eq!(eval("(1 + 2) * 3", 0.0, 0.0, 0.0), 9.0);
        assert_eq!(eval("10 - 4 - 3", 0.0, 0.0, 0.0), 3.0);
        assert_eq!(eval("8 / 4 / 2", 0.0, 0.0, 0.0), 1.0);
    }

    #[test]
    fn implicit_multiplication() {
        assert_eq!(eval("2x", 3.0, 0.0, 0.0), 6.0);
        assert_eq!(eval("3(x + 1)", 1.0, 0.0, 0.0), 6.0);
        assert_eq!(eval("(x + 1)(x - 1)", 3.0, 0.0, 0.0), 8.0);
        assert_eq!(eval("x²y", 2.0, 5.0, 0.0), 20.0);
        assert_eq!(eval("2 sin(x)", 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn unicode() {
        assert_relative_eq!(eval("√(x) × 2", 9.0, 0.0, 0.0), 6.0);
        assert_relative_eq!(eval("∛x", 27.0, 0.0, 0.0), 3.0);
        assert_relative_eq!(eval("x³ − y ÷ 2", 2.0, 4.0, 0.0), 6.0);
        assert_relative_eq!(eval("sin(90°)", 0.0, 0.0, 0.0), 1.0);
        let tau = eval("tau", 0.0, 0.0, 0.0);
        assert_relative_eq!(eval("2π", 0.0, 0.0, 0.0), tau);
        let phi = eval("phi", 0.0, 0.0, 0.0);
        assert_relative_eq!(eval("ϕ", 0.0, 0.0, 0.0), phi);
        assert_relative_eq!(eval("φ", 0.0, 0.0, 0.0), phi);
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(eval("X + Y + T", 1.0, 2.0, 3.0), 6.0);
        assert_relative_eq!(eval("SIN(PI / 2)", 0.0, 0.0, 0.0), 1.0);
    }

    #[test]
    fn functions() {
        assert_relative_eq!(eval("log(e)", 0.0, 0.0, 0.0), 1.0);
        assert_relative_eq!(eval("log(8, 2)", 0.0, 0.0, 0.0), 3.0);
        assert_relative_eq!(eval("lg(1000)", 0.0, 0.0, 0.0), 3.0);
        assert_eq!(eval("min(3, x, 1)", 2.0, 0.0, 0.0), 1.0);
        assert_eq!(eval("max(3, x, 1)", 7.0, 0.0, 0.0), 7.0);
        assert_eq!(eval("mod(-7, 3)", 0.0, 0.0, 0.0), 2.0);
        assert_eq!(eval("hypot(3, 4)", 0.0, 0.0, 0.0), 5.0);
        assert_eq!(eval("sgn(0)", 0.0, 0.0, 0.0), 0.0);
        assert_eq!(eval("int(-2.5)", 0.0, 0.0, 0.0), -2.0);
        assert_relative_eq!(
            eval("atan(1/x)", 0.0, 0.0, 0.0),
            std::f64::consts::FRAC_PI_2
        );
    }

    #[test]
    fn arity() {
        let mut ctx = Context::new();
        assert_eq!(
            compile(&mut ctx, "x + t", Arity::Two),
            Err(Error::UnknownIdentifier("t".to_owned()))
        );
        assert!(compile(&mut ctx, "x + t", Arity::Three).is_ok());
    }

    #[test]
    fn errors() {
        assert_eq!(err(""), Error::EmptyFormula);
        assert_eq!(err("   "), Error::EmptyFormula);
        assert_eq!(err("(x + 1"), Error::UnclosedParen(0));
        assert_eq!(err("sin(x"), Error::UnclosedParen(3));
        assert_eq!(err("x +"), Error::UnexpectedEnd);
        assert_eq!(
            err("x )"),
            Error::UnexpectedToken {
                found: "')'".to_owned(),
                offset: 2
            }
        );
        assert_eq!(err("foo(x)"), Error::UnknownIdentifier("foo".to_owned()));
        assert_eq!(err("sin x"), Error::MissingArguments("sin".to_owned()));
        assert_eq!(
            err("pow(x)"),
            Error::BadArgCount {
                name: "pow",
                expected: "2",
                got: 1
            }
        );
        assert!(matches!(err("max(x)"), Error::BadArgCount { got: 1, .. }));
        assert!(matches!(
            err("x @ y"),
            Error::UnexpectedChar { ch: '@', .. }
        ));
    }

    #[test]
    fn depth_limit() {
        let ok = format!("{}x{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(eval(&ok, 2.0, 0.0, 0.0), 2.0);

        let deep = format!("{}x{}", "(".repeat(1000), ")".repeat(1000));
        assert_eq!(err(&deep), Error::TooDeep(MAX_DEPTH));

        let minus = format!("{}x", "-".repeat(1000));
        assert_eq!(err(&minus), Error::TooDeep(MAX_DEPTH));

        let tower = vec!["x"; 1000].join("^");
        assert_eq!(err(&tower), Error::TooDeep(MAX_DEPTH));
    }

    #[test]
    fn long_flat_formula() {
        // Long sums are iterative, not nested
        let s = vec!["x"; 10_000].join(" + ");
        assert_eq!(eval(&s, 1.0, 0.0, 0.0), 10_000.0);
    }

    #[test]
    fn constants() {
        assert_eq!(constant("PI"), Some(std::f64::consts::PI));
        assert_eq!(constant("nope"), None);
    }
}
