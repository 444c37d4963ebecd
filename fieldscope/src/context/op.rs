use crate::context::Node;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// A declared input variable
#[derive(
    Copy,
    Clone,
    Debug,
    Hash,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Serialize,
    Deserialize,
    strum::Display,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum Var {
    X,
    Y,
    T,
}

/// A one-argument math operation
#[derive(
    Copy,
    Clone,
    Debug,
    Hash,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Serialize,
    Deserialize,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "UPPERCASE")]
#[allow(missing_docs)]
pub enum UnaryOpcode {
    Neg,
    Abs,
    Recip,
    Sqrt,
    Cbrt,
    Square,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Exp,
    Ln,
    Log10,
    Log2,
    Floor,
    Ceil,
    Round,
    Trunc,
    Sign,
}

impl UnaryOpcode {
    /// Applies the operation to a single value
    ///
    /// Out-of-domain inputs produce NaN rather than an error.
    #[inline]
    pub fn apply(self, a: f64) -> f64 {
        match self {
            UnaryOpcode::Neg => -a,
            UnaryOpcode::Abs => a.abs(),
            UnaryOpcode::Recip => 1.0 / a,
            UnaryOpcode::Sqrt => a.sqrt(),
            UnaryOpcode::Cbrt => a.cbrt(),
            UnaryOpcode::Square => a * a,
            UnaryOpcode::Sin => a.sin(),
            UnaryOpcode::Cos => a.cos(),
            UnaryOpcode::Tan => a.tan(),
            UnaryOpcode::Asin => a.asin(),
            UnaryOpcode::Acos => a.acos(),
            UnaryOpcode::Atan => a.atan(),
            UnaryOpcode::Sinh => a.sinh(),
            UnaryOpcode::Cosh => a.cosh(),
            UnaryOpcode::Tanh => a.tanh(),
            UnaryOpcode::Asinh => a.asinh(),
            UnaryOpcode::Acosh => a.acosh(),
            UnaryOpcode::Atanh => a.atanh(),
            UnaryOpcode::Exp => a.exp(),
            UnaryOpcode::Ln => a.ln(),
            UnaryOpcode::Log10 => a.log10(),
            UnaryOpcode::Log2 => a.log2(),
            UnaryOpcode::Floor => a.floor(),
            UnaryOpcode::Ceil => a.ceil(),
            UnaryOpcode::Round => a.round(),
            UnaryOpcode::Trunc => a.trunc(),
            // `f64::signum` maps zero to one, which is not what users expect
            UnaryOpcode::Sign => {
                if a > 0.0 {
                    1.0
                } else if a < 0.0 {
                    -1.0
                } else {
                    a
                }
            }
        }
    }
}

/// A two-argument math operation
#[derive(
    Copy,
    Clone,
    Debug,
    Hash,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Serialize,
    Deserialize,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[strum(serialize_all = "UPPERCASE")]
#[allow(missing_docs)]
pub enum BinaryOpcode {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Min,
    Max,
    Atan2,
    Mod,
    Hypot,
}

impl BinaryOpcode {
    /// Applies the operation to a pair of values
    #[inline]
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOpcode::Add => a + b,
            BinaryOpcode::Sub => a - b,
            BinaryOpcode::Mul => a * b,
            BinaryOpcode::Div => a / b,
            BinaryOpcode::Pow => a.powf(b),
            // NaN-propagating, unlike `f64::min` / `f64::max`
            BinaryOpcode::Min => {
                if a.is_nan() || b.is_nan() {
                    f64::NAN
                } else {
                    a.min(b)
                }
            }
            BinaryOpcode::Max => {
                if a.is_nan() || b.is_nan() {
                    f64::NAN
                } else {
                    a.max(b)
                }
            }
            BinaryOpcode::Atan2 => a.atan2(b),
            // Floored modulo: the result takes the sign of the divisor
            BinaryOpcode::Mod => {
                if b == 0.0 {
                    f64::NAN
                } else {
                    a - b * (a / b).floor()
                }
            }
            BinaryOpcode::Hypot => a.hypot(b),
        }
    }

    /// Checks whether `op(a, b) == op(b, a)`
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOpcode::Add
                | BinaryOpcode::Mul
                | BinaryOpcode::Min
                | BinaryOpcode::Max
                | BinaryOpcode::Hypot
        )
    }
}

/// Represents an operation in a math expression.
///
/// `Op`s should be constructed by calling functions on
/// [`Context`](crate::context::Context), e.g.
/// [`Context::add`](crate::context::Context::add) will generate an
/// `Op::Binary(BinaryOpcode::Add, .., ..)` node and return an opaque handle.
///
/// Each `Op` is tightly coupled to the [`Context`](crate::context::Context)
/// which generated it, and will not be valid for a different `Context`.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[allow(missing_docs)]
pub enum Op {
    Input(Var),
    Const(OrderedFloat<f64>),
    Binary(BinaryOpcode, Node, Node),
    Unary(UnaryOpcode, Node),
}

impl Op {
    /// Iterates over children, producing 0, 1, or 2 values
    pub fn iter_children(&self) -> impl DoubleEndedIterator<Item = Node> {
        let out = match self {
            Op::Binary(_, a, b) => [Some(*a), Some(*b)],
            Op::Unary(_, a) => [Some(*a), None],
            Op::Input(..) | Op::Const(..) => [None, None],
        };
        out.into_iter().flatten()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sign_of_zero() {
        assert_eq!(UnaryOpcode::Sign.apply(0.0), 0.0);
        assert_eq!(UnaryOpcode::Sign.apply(-3.0), -1.0);
        assert_eq!(UnaryOpcode::Sign.apply(0.1), 1.0);
        assert!(UnaryOpcode::Sign.apply(f64::NAN).is_nan());
    }

    #[test]
    fn min_max_propagate_nan() {
        assert!(BinaryOpcode::Min.apply(f64::NAN, 1.0).is_nan());
        assert!(BinaryOpcode::Max.apply(1.0, f64::NAN).is_nan());
        assert_eq!(BinaryOpcode::Max.apply(1.0, 2.0), 2.0);
    }

    #[test]
    fn floored_mod() {
        assert_eq!(BinaryOpcode::Mod.apply(7.0, 3.0), 1.0);
        assert_eq!(BinaryOpcode::Mod.apply(-7.0, 3.0), 2.0);
        assert_eq!(BinaryOpcode::Mod.apply(7.0, -3.0), -2.0);
        assert!(BinaryOpcode::Mod.apply(1.0, 0.0).is_nan());
    }

    #[test]
    fn children() {
        let mut ctx = crate::context::Context::new();
        let x = ctx.x();
        let y = ctx.y();
        let diff = ctx.sub(x, y).unwrap();
        let neg = ctx.neg(diff).unwrap();

        let op = ctx.get_op(diff).unwrap();
        assert_eq!(op.iter_children().collect::<Vec<_>>(), vec![x, y]);
        assert_eq!(op.iter_children().rev().collect::<Vec<_>>(), vec![y, x]);
        let op = ctx.get_op(neg).unwrap();
        assert_eq!(op.iter_children().collect::<Vec<_>>(), vec![diff]);
        assert_eq!(ctx.get_op(x).unwrap().iter_children().count(), 0);
    }

    #[test]
    fn opcode_names() {
        let s: &'static str = UnaryOpcode::Log10.into();
        assert_eq!(s, "LOG10");
        let s: &'static str = BinaryOpcode::Atan2.into();
        assert_eq!(s, "ATAN2");
        assert_eq!(Var::T.to_string(), "t");
    }
}
