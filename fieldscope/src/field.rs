//! Compiled scalar fields
use crate::{
    Error,
    context::Context,
    parse::{self, Arity},
    tape::{Tape, TapeEval},
};
use log::{debug, trace};

/// A formula compiled into a total function `(x, y, t) -> Option<f64>`
///
/// Compilation never fails: a formula that does not parse produces a field
/// which is invalid everywhere, and the parse error is kept for diagnostics.
///
/// A `Field` is immutable and `Send + Sync`; evaluation scratch lives in a
/// separate [`FieldEval`], so one field can be evaluated from many threads.
///
/// ```
/// use fieldscope::{Arity, Field};
///
/// let f = Field::compile("x^2 + y^2", Arity::Two);
/// assert_eq!(f.eval(2.0, 0.0, 0.0), Some(4.0));
/// assert_eq!(f.eval(0.0, 0.0, 0.0), Some(0.0));
///
/// let g = Field::compile("sqrt(x)", Arity::Two);
/// assert_eq!(g.eval(-1.0, 0.0, 0.0), None);
///
/// let bad = Field::compile("(x + 1", Arity::Two);
/// assert!(bad.error().is_some());
/// assert_eq!(bad.eval(1.0, 0.0, 0.0), None);
/// ```
#[derive(Clone, Debug)]
pub struct Field {
    source: String,
    arity: Arity,
    tape: Result<Tape, Error>,
}

impl Field {
    /// Compiles a formula
    pub fn compile(formula: &str, arity: Arity) -> Self {
        let mut ctx = Context::new();
        let tape = parse::compile(&mut ctx, formula, arity)
            .and_then(|root| ctx.get_tape(root));
        match &tape {
            Ok(t) => trace!("compiled {formula:?} into {} ops", t.len()),
            Err(e) => debug!("could not compile {formula:?}: {e}"),
        }
        Self {
            source: formula.to_owned(),
            arity,
            tape,
        }
    }

    /// Builds a field with the same value everywhere
    pub fn constant(v: f64) -> Self {
        Self {
            source: v.to_string(),
            arity: Arity::Two,
            tape: Ok(Tape::constant(v)),
        }
    }

    /// Returns the formula text this field was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the set of variables this field was compiled against
    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Returns the compile error, if compilation failed
    pub fn error(&self) -> Option<&Error> {
        self.tape.as_ref().err()
    }

    /// Checks whether the formula compiled successfully
    pub fn is_compiled(&self) -> bool {
        self.tape.is_ok()
    }

    /// Returns the compiled tape, if compilation succeeded
    pub fn tape(&self) -> Option<&Tape> {
        self.tape.as_ref().ok()
    }

    /// Builds an evaluator for this field
    pub fn new_eval(&self) -> FieldEval {
        FieldEval(
            self.tape
                .as_ref()
                .map(|t| t.new_eval())
                .unwrap_or_default(),
        )
    }

    /// Evaluates the field at a single point
    ///
    /// This allocates a fresh evaluator; use [`Field::new_eval`] and
    /// [`FieldEval::eval`] in loops.
    pub fn eval(&self, x: f64, y: f64, t: f64) -> Option<f64> {
        self.new_eval().eval(self, x, y, t)
    }
}

/// Scratch space for evaluating a [`Field`]
///
/// Results are checked: a NaN or infinite value is reported as `None`, so
/// `Some(v)` is always finite.  Intermediate infinities are allowed, e.g.
/// `atan(1 / x)` is `π/2` at `x = 0`.
#[derive(Clone, Debug, Default)]
pub struct FieldEval(TapeEval);

impl FieldEval {
    /// Evaluates the field at a single point
    ///
    /// `t` is ignored by fields compiled with [`Arity::Two`].
    pub fn eval(
        &mut self,
        field: &Field,
        x: f64,
        y: f64,
        t: f64,
    ) -> Option<f64> {
        let tape = field.tape.as_ref().ok()?;
        let v = self.0.eval(tape, x, y, t);
        v.is_finite().then_some(v)
    }
}
