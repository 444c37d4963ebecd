//! Straight-line evaluation tapes
//!
//! A [`Tape`] is an expression graph flattened into a list of operations in
//! forward-evaluation order.  Each operation writes exactly one slot (its own
//! index in the list) and reads only slots written before it, so the tape is
//! in SSA form; the final operation is the root of the expression.
//!
//! ```text
//! $0 = INPUT x
//! $1 = SQUARE $0
//! $2 = INPUT y
//! $3 = SQUARE $2
//! $4 = ADD $1 $3
//! ```
//!
//! Tapes contain no control flow, so evaluation always terminates after
//! exactly `tape.len()` steps.  They are plain data: they can be inspected
//! with [`Tape::ops`], printed, and serialized with `serde`.
use crate::{
    Error,
    context::{BinaryOpcode, Context, Node, Op as ContextOp, UnaryOpcode, Var},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Operation in a [`Tape`]
///
/// Arguments are slot indices of earlier operations.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Reads one of the inputs (`x`, `y`, `t`)
    Input(Var),
    /// Literal value
    Const(f64),
    /// One-argument operation
    Unary(UnaryOpcode, u32),
    /// Two-argument operation
    Binary(BinaryOpcode, u32, u32),
}

impl Op {
    /// Iterates over the slots read by this operation
    pub fn args(&self) -> impl Iterator<Item = u32> {
        let out = match *self {
            Op::Input(..) | Op::Const(..) => [None, None],
            Op::Unary(_, a) => [Some(a), None],
            Op::Binary(_, a, b) => [Some(a), Some(b)],
        };
        out.into_iter().flatten()
    }

    /// Short label for this operation (without its arguments)
    pub fn label(&self) -> String {
        match *self {
            Op::Input(v) => v.to_string(),
            Op::Const(c) => c.to_string(),
            Op::Unary(op, _) => <&'static str>::from(op).to_owned(),
            Op::Binary(op, ..) => <&'static str>::from(op).to_owned(),
        }
    }
}

/// Flattened expression, ready for evaluation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tape {
    ops: Vec<Op>,
}

impl Tape {
    /// Flattens the subtree of `ctx` rooted at `root`
    ///
    /// Only nodes reachable from `root` are included, each exactly once.
    pub fn new(ctx: &Context, root: Node) -> Result<Self, Error> {
        // Depth-first recursion on the heap, to protect against stack overflows
        enum Action {
            Down,
            Up,
        }

        let mut slots: HashMap<Node, u32> = HashMap::new();
        let mut ops = vec![];
        let mut todo = vec![(Action::Down, root)];
        while let Some((action, node)) = todo.pop() {
            if slots.contains_key(&node) {
                continue;
            }
            let op = ctx.get_op(node).ok_or(Error::BadNode)?;
            match action {
                Action::Down => {
                    todo.push((Action::Up, node));
                    // Children are pushed in reverse so the left-hand side is
                    // flattened first
                    todo.extend(
                        op.iter_children().rev().map(|c| (Action::Down, c)),
                    );
                }
                Action::Up => {
                    let out = match *op {
                        ContextOp::Input(v) => Op::Input(v),
                        ContextOp::Const(c) => Op::Const(c.0),
                        ContextOp::Unary(op, a) => Op::Unary(op, slots[&a]),
                        ContextOp::Binary(op, a, b) => {
                            Op::Binary(op, slots[&a], slots[&b])
                        }
                    };
                    slots.insert(node, ops.len() as u32);
                    ops.push(out);
                }
            }
        }
        Ok(Self { ops })
    }

    /// Builds a single-operation tape returning a constant
    pub fn constant(v: f64) -> Self {
        Self {
            ops: vec![Op::Const(v)],
        }
    }

    /// Returns the operations in forward-evaluation order
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Returns the number of operations in the tape
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Checks whether the tape is empty (never true for a built tape)
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Checks whether the tape reads the given input
    pub fn reads(&self, v: Var) -> bool {
        self.ops.iter().any(|op| *op == Op::Input(v))
    }

    /// Builds an evaluator with scratch space sized for this tape
    pub fn new_eval(&self) -> TapeEval {
        TapeEval {
            slots: Vec::with_capacity(self.ops.len()),
        }
    }
}

impl std::fmt::Display for Tape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, op) in self.ops.iter().enumerate() {
            let label = match *op {
                Op::Input(..) => "INPUT".to_owned(),
                Op::Const(..) => "CONST".to_owned(),
                _ => op.label(),
            };
            write!(f, "${i} = {label}")?;
            match *op {
                Op::Input(v) => write!(f, " {v}")?,
                Op::Const(c) => write!(f, " {c}")?,
                _ => {
                    for a in op.args() {
                        write!(f, " ${a}")?;
                    }
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Scratch space for evaluating a [`Tape`]
///
/// An evaluator carries no persistent data and may be reused across tapes;
/// it is typically built once per thread.
#[derive(Clone, Debug, Default)]
pub struct TapeEval {
    slots: Vec<f64>,
}

impl TapeEval {
    /// Evaluates the tape at a single point
    ///
    /// The raw result may be NaN or infinite; see
    /// [`FieldEval`](crate::FieldEval) for the checked version.
    pub fn eval(&mut self, tape: &Tape, x: f64, y: f64, t: f64) -> f64 {
        self.slots.resize(tape.ops.len(), 0.0);
        for (i, op) in tape.ops.iter().enumerate() {
            let v = match *op {
                Op::Input(Var::X) => x,
                Op::Input(Var::Y) => y,
                Op::Input(Var::T) => t,
                Op::Const(c) => c,
                Op::Unary(op, a) => op.apply(self.slots[a as usize]),
                Op::Binary(op, a, b) => {
                    op.apply(self.slots[a as usize], self.slots[b as usize])
                }
            };
            self.slots[i] = v;
        }
        self.slots.last().copied().unwrap_or(f64::NAN)
    }
}
