//! Infrastructure for representing math expressions as graphs
mod indexed;
mod op;

use indexed::{IndexMap, define_index};
pub use op::{BinaryOpcode, Op, UnaryOpcode, Var};

use crate::{Error, tape::Tape};

use std::fmt::Write;

use ordered_float::OrderedFloat;

define_index!(Node, "An index in the `Context::ops` map");

/// A `Context` holds a set of deduplicated constants, inputs, and operations.
///
/// It should be used like an arena allocator: it grows over time, then frees
/// all of its contents when dropped.  Operations whose arguments are all
/// constants are folded as they are built; nothing else is rewritten.
#[derive(Debug, Default)]
pub struct Context {
    ops: IndexMap<Op, Node>,
}

impl Context {
    /// Build a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the context
    ///
    /// All [`Node`] handles from this context are invalidated.
    ///
    /// ```
    /// # use fieldscope::context::Context;
    /// let mut ctx = Context::new();
    /// let x = ctx.x();
    /// ctx.clear();
    /// assert!(ctx.eval_xyt(x, 1.0, 0.0, 0.0).is_err());
    /// ```
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Returns the number of [`Op`] nodes in the context
    ///
    /// ```
    /// # use fieldscope::context::Context;
    /// let mut ctx = Context::new();
    /// let x = ctx.x();
    /// assert_eq!(ctx.len(), 1);
    /// let y = ctx.y();
    /// assert_eq!(ctx.len(), 2);
    /// ctx.clear();
    /// assert_eq!(ctx.len(), 0);
    /// ```
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Checks whether the context is empty
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Checks whether the given [`Node`] is valid in this context
    fn check_node(&self, node: Node) -> Result<(), Error> {
        self.get_op(node).ok_or(Error::BadNode).map(|_| ())
    }

    /// Looks up the constant associated with the given node.
    ///
    /// If the node is invalid for this tree, returns an error; if the node is
    /// not a constant, returns `Ok(None)`.
    pub fn const_value(&self, n: Node) -> Result<Option<f64>, Error> {
        match self.get_op(n) {
            Some(Op::Const(c)) => Ok(Some(c.0)),
            Some(_) => Ok(None),
            None => Err(Error::BadNode),
        }
    }

    /// Looks up an operation by `Node` handle
    pub fn get_op(&self, node: Node) -> Option<&Op> {
        self.ops.get_by_index(node)
    }

    ////////////////////////////////////////////////////////////////////////////
    // Primitives

    /// Constructs or finds the input node for the given variable
    pub fn input(&mut self, v: Var) -> Node {
        self.ops.insert(Op::Input(v))
    }

    /// Constructs or finds the `x` input node
    /// ```
    /// # use fieldscope::context::Context;
    /// let mut ctx = Context::new();
    /// let x = ctx.x();
    /// let v = ctx.eval_xyt(x, 1.0, 0.0, 0.0).unwrap();
    /// assert_eq!(v, 1.0);
    /// ```
    pub fn x(&mut self) -> Node {
        self.input(Var::X)
    }

    /// Constructs or finds the `y` input node
    pub fn y(&mut self) -> Node {
        self.input(Var::Y)
    }

    /// Constructs or finds the `t` input node
    pub fn t(&mut self) -> Node {
        self.input(Var::T)
    }

    /// Returns a node representing the given constant value.
    /// ```
    /// # let mut ctx = fieldscope::context::Context::new();
    /// let v = ctx.constant(3.0);
    /// assert_eq!(ctx.eval_xyt(v, 0.0, 0.0, 0.0).unwrap(), 3.0);
    /// ```
    pub fn constant(&mut self, f: f64) -> Node {
        self.ops.insert(Op::Const(OrderedFloat(f)))
    }

    ////////////////////////////////////////////////////////////////////////////
    // Node construction with constant folding

    /// Find or create a [`Node`] for the given unary operation
    pub fn unary<A: IntoNode>(
        &mut self,
        op: UnaryOpcode,
        a: A,
    ) -> Result<Node, Error> {
        let a = a.into_node(self)?;
        Ok(match self.const_value(a)? {
            Some(v) => self.constant(op.apply(v)),
            None => self.ops.insert(Op::Unary(op, a)),
        })
    }

    /// Find or create a [`Node`] for the given binary operation
    ///
    /// Arguments of commutative operations are sorted, so that `x + y` and
    /// `y + x` share a node.
    pub fn binary<A: IntoNode, B: IntoNode>(
        &mut self,
        op: BinaryOpcode,
        a: A,
        b: B,
    ) -> Result<Node, Error> {
        let a = a.into_node(self)?;
        let b = b.into_node(self)?;
        let (a, b) = if op.is_commutative() {
            (a.min(b), a.max(b))
        } else {
            (a, b)
        };
        Ok(match (self.const_value(a)?, self.const_value(b)?) {
            (Some(va), Some(vb)) => self.constant(op.apply(va, vb)),
            _ => self.ops.insert(Op::Binary(op, a, b)),
        })
    }

    /// Builds an addition node
    /// ```
    /// # let mut ctx = fieldscope::context::Context::new();
    /// let x = ctx.x();
    /// let op = ctx.add(x, 1.0).unwrap();
    /// let v = ctx.eval_xyt(op, 1.0, 0.0, 0.0).unwrap();
    /// assert_eq!(v, 2.0);
    /// ```
    pub fn add<A: IntoNode, B: IntoNode>(
        &mut self,
        a: A,
        b: B,
    ) -> Result<Node, Error> {
        self.binary(BinaryOpcode::Add, a, b)
    }

    /// Builds a subtraction node
    pub fn sub<A: IntoNode, B: IntoNode>(
        &mut self,
        a: A,
        b: B,
    ) -> Result<Node, Error> {
        self.binary(BinaryOpcode::Sub, a, b)
    }

    /// Builds a multiplication node
    /// ```
    /// # let mut ctx = fieldscope::context::Context::new();
    /// let x = ctx.x();
    /// let op = ctx.mul(x, 5.0).unwrap();
    /// let v = ctx.eval_xyt(op, 2.0, 0.0, 0.0).unwrap();
    /// assert_eq!(v, 10.0);
    /// ```
    pub fn mul<A: IntoNode, B: IntoNode>(
        &mut self,
        a: A,
        b: B,
    ) -> Result<Node, Error> {
        self.binary(BinaryOpcode::Mul, a, b)
    }

    /// Builds a division node
    pub fn div<A: IntoNode, B: IntoNode>(
        &mut self,
        a: A,
        b: B,
    ) -> Result<Node, Error> {
        self.binary(BinaryOpcode::Div, a, b)
    }

    /// Builds an exponentiation node (`a ^ b`)
    /// ```
    /// # let mut ctx = fieldscope::context::Context::new();
    /// let x = ctx.x();
    /// let op = ctx.pow(x, 3.0).unwrap();
    /// let v = ctx.eval_xyt(op, 2.0, 0.0, 0.0).unwrap();
    /// assert_eq!(v, 8.0);
    /// ```
    pub fn pow<A: IntoNode, B: IntoNode>(
        &mut self,
        a: A,
        b: B,
    ) -> Result<Node, Error> {
        self.binary(BinaryOpcode::Pow, a, b)
    }

    /// Builds a unary negation node
    pub fn neg<A: IntoNode>(&mut self, a: A) -> Result<Node, Error> {
        self.unary(UnaryOpcode::Neg, a)
    }

    /// Builds a reciprocal node
    pub fn recip<A: IntoNode>(&mut self, a: A) -> Result<Node, Error> {
        self.unary(UnaryOpcode::Recip, a)
    }

    ////////////////////////////////////////////////////////////////////////////

    /// Flattens a subtree of the graph into straight-line code.
    ///
    /// This should always succeed unless the `root` is from a different
    /// `Context`, in which case `Error::BadNode` will be returned.
    pub fn get_tape(&self, root: Node) -> Result<Tape, Error> {
        Tape::new(self, root)
    }

    /// Evaluates the given node with the provided values for `x`, `y`, `t`.
    ///
    /// This flattens the graph on every call; build a
    /// [`Field`](crate::Field) for repeated evaluation instead.
    ///
    /// ```
    /// # let mut ctx = fieldscope::context::Context::new();
    /// let x = ctx.x();
    /// let y = ctx.y();
    /// let t = ctx.t();
    /// let op = ctx.mul(x, y).unwrap();
    /// let op = ctx.div(op, t).unwrap();
    /// let v = ctx.eval_xyt(op, 3.0, 5.0, 2.0).unwrap();
    /// assert_eq!(v, 7.5); // (3.0 * 5.0) / 2.0
    /// ```
    pub fn eval_xyt(
        &self,
        root: Node,
        x: f64,
        y: f64,
        t: f64,
    ) -> Result<f64, Error> {
        let tape = self.get_tape(root)?;
        Ok(tape.new_eval().eval(&tape, x, y, t))
    }

    /// Converts the subtree rooted at `root` into a GraphViz drawing
    pub fn dot(&self, root: Node) -> Result<String, Error> {
        let tape = self.get_tape(root)?;
        let mut out = "digraph mygraph{\n".to_owned();
        for (i, op) in tape.ops().iter().enumerate() {
            write!(out, r#"n{i} [label = "{}"]"#, op.label()).unwrap();
            out += "\n";
            for c in op.args() {
                writeln!(out, "n{i} -> n{c}").unwrap();
            }
        }
        out += "}\n";
        Ok(out)
    }
}

////////////////////////////////////////////////////////////////////////////////
/// Helper trait for things that can be converted into a [`Node`] given a
/// [`Context`].
///
/// This trait allows you to write
/// ```
/// # let mut ctx = fieldscope::context::Context::new();
/// let x = ctx.x();
/// let sum = ctx.add(x, 1.0).unwrap();
/// ```
/// instead of the more verbose
/// ```
/// # let mut ctx = fieldscope::context::Context::new();
/// let x = ctx.x();
/// let num = ctx.constant(1.0);
/// let sum = ctx.add(x, num).unwrap();
/// ```
pub trait IntoNode {
    /// Converts the given values into a node
    fn into_node(self, ctx: &mut Context) -> Result<Node, Error>;
}

impl IntoNode for Node {
    fn into_node(self, ctx: &mut Context) -> Result<Node, Error> {
        ctx.check_node(self)?;
        Ok(self)
    }
}

impl IntoNode for f64 {
    fn into_node(self, ctx: &mut Context) -> Result<Node, Error> {
        Ok(ctx.constant(self))
    }
}

impl IntoNode for Var {
    fn into_node(self, ctx: &mut Context) -> Result<Node, Error> {
        Ok(ctx.input(self))
    }
}

////////////////////////////////////////////////////////////////////////////////
