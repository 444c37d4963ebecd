//! Function and constant vocabulary
use crate::{
    Error,
    context::{BinaryOpcode, Context, Node, UnaryOpcode},
};

/// Function callable from a formula
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum Function {
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
    Log,
    Log10,
    Log2,
    Sqrt,
    Cbrt,
    Abs,
    Floor,
    Ceil,
    Round,
    Trunc,
    Sign,
    Cot,
    Sec,
    Csc,
    Coth,
    Sech,
    Csch,
    Acot,
    Pow,
    Atan2,
    Mod,
    Hypot,
    Min,
    Max,
}

/// Number of arguments accepted by a [`Function`]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ArgCount {
    /// Exactly one argument
    One,
    /// One or two arguments
    OneOrTwo,
    /// Exactly two arguments
    Two,
    /// Two or more arguments
    AtLeastTwo,
}

impl ArgCount {
    /// Checks whether `n` arguments are accepted
    pub fn accepts(self, n: usize) -> bool {
        match self {
            ArgCount::One => n == 1,
            ArgCount::OneOrTwo => n == 1 || n == 2,
            ArgCount::Two => n == 2,
            ArgCount::AtLeastTwo => n >= 2,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            ArgCount::One => "1",
            ArgCount::OneOrTwo => "1 or 2",
            ArgCount::Two => "2",
            ArgCount::AtLeastTwo => "at least 2",
        }
    }
}

impl Function {
    /// Looks up a function by (lowercase) name or alias
    pub fn from_name(name: &str) -> Option<Self> {
        canonical(name).parse().ok()
    }

    /// Returns the canonical name of this function
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Returns the number of arguments accepted by this function
    pub fn arg_count(self) -> ArgCount {
        match self {
            Function::Log => ArgCount::OneOrTwo,
            Function::Pow
            | Function::Atan2
            | Function::Mod
            | Function::Hypot => ArgCount::Two,
            Function::Min | Function::Max => ArgCount::AtLeastTwo,
            _ => ArgCount::One,
        }
    }

    /// Returns the primitive opcode for single-opcode unary functions
    fn unary_opcode(self) -> Option<UnaryOpcode> {
        let op = match self {
            Function::Sin => UnaryOpcode::Sin,
            Function::Cos => UnaryOpcode::Cos,
            Function::Tan => UnaryOpcode::Tan,
            Function::Asin => UnaryOpcode::Asin,
            Function::Acos => UnaryOpcode::Acos,
            Function::Atan => UnaryOpcode::Atan,
            Function::Sinh => UnaryOpcode::Sinh,
            Function::Cosh => UnaryOpcode::Cosh,
            Function::Tanh => UnaryOpcode::Tanh,
            Function::Asinh => UnaryOpcode::Asinh,
            Function::Acosh => UnaryOpcode::Acosh,
            Function::Atanh => UnaryOpcode::Atanh,
            Function::Exp => UnaryOpcode::Exp,
            Function::Ln => UnaryOpcode::Ln,
            Function::Log10 => UnaryOpcode::Log10,
            Function::Log2 => UnaryOpcode::Log2,
            Function::Sqrt => UnaryOpcode::Sqrt,
            Function::Cbrt => UnaryOpcode::Cbrt,
            Function::Abs => UnaryOpcode::Abs,
            Function::Floor => UnaryOpcode::Floor,
            Function::Ceil => UnaryOpcode::Ceil,
            Function::Round => UnaryOpcode::Round,
            Function::Trunc => UnaryOpcode::Trunc,
            Function::Sign => UnaryOpcode::Sign,
            _ => return None,
        };
        Some(op)
    }

    /// Builds the graph for a call to this function
    ///
    /// Derived functions (`cot`, `sec`, ...) are expanded into primitives.
    pub fn build(
        self,
        ctx: &mut Context,
        args: &[Node],
    ) -> Result<Node, Error> {
        if !self.arg_count().accepts(args.len()) {
            return Err(Error::BadArgCount {
                name: self.name(),
                expected: self.arg_count().describe(),
                got: args.len(),
            });
        }
        if let Some(op) = self.unary_opcode() {
            return ctx.unary(op, args[0]);
        }
        let a = args[0];
        match self {
            Function::Log => match args.get(1) {
                None => ctx.unary(UnaryOpcode::Ln, a),
                Some(&b) => {
                    let num = ctx.unary(UnaryOpcode::Ln, a)?;
                    let den = ctx.unary(UnaryOpcode::Ln, b)?;
                    ctx.div(num, den)
                }
            },
            Function::Cot => reciprocal_of(ctx, UnaryOpcode::Tan, a),
            Function::Sec => reciprocal_of(ctx, UnaryOpcode::Cos, a),
            Function::Csc => reciprocal_of(ctx, UnaryOpcode::Sin, a),
            Function::Coth => reciprocal_of(ctx, UnaryOpcode::Tanh, a),
            Function::Sech => reciprocal_of(ctx, UnaryOpcode::Cosh, a),
            Function::Csch => reciprocal_of(ctx, UnaryOpcode::Sinh, a),
            Function::Acot => {
                let r = ctx.recip(a)?;
                ctx.unary(UnaryOpcode::Atan, r)
            }
            Function::Pow => ctx.binary(BinaryOpcode::Pow, a, args[1]),
            Function::Atan2 => ctx.binary(BinaryOpcode::Atan2, a, args[1]),
            Function::Mod => ctx.binary(BinaryOpcode::Mod, a, args[1]),
            Function::Hypot => ctx.binary(BinaryOpcode::Hypot, a, args[1]),
            Function::Min | Function::Max => {
                let op = if self == Function::Min {
                    BinaryOpcode::Min
                } else {
                    BinaryOpcode::Max
                };
                args[1..]
                    .iter()
                    .try_fold(a, |acc, &b| ctx.binary(op, acc, b))
            }
            _ => unreachable!("unary function {self:?} has no opcode"),
        }
    }
}

fn reciprocal_of(
    ctx: &mut Context,
    op: UnaryOpcode,
    a: Node,
) -> Result<Node, Error> {
    let v = ctx.unary(op, a)?;
    ctx.recip(v)
}

/// Maps localized and alternate spellings onto canonical function names
pub fn canonical(name: &str) -> &str {
    match name {
        "sen" => "sin",
        "tg" => "tan",
        "ctg" | "cotg" => "cot",
        "arcsin" => "asin",
        "arccos" => "acos",
        "arctan" | "arctg" => "atan",
        "arsinh" | "arcsinh" => "asinh",
        "arcosh" | "arccosh" => "acosh",
        "artanh" | "arctanh" => "atanh",
        "sh" => "sinh",
        "ch" => "cosh",
        "th" => "tanh",
        "lg" => "log10",
        "ld" => "log2",
        "raiz" | "wurzel" => "sqrt",
        "betrag" => "abs",
        "power" => "pow",
        "sgn" => "sign",
        "ceiling" => "ceil",
        "int" => "trunc",
        s => s,
    }
}

/// Looks up a named constant
pub fn constant(name: &str) -> Option<f64> {
    use std::f64::consts;
    let v = match name {
        "pi" => consts::PI,
        "tau" => consts::TAU,
        "phi" => (1.0 + 5f64.sqrt()) / 2.0,
        "e" => consts::E,
        "deg" => consts::PI / 180.0,
        "rad" => 1.0,
        _ => return None,
    };
    Some(v)
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn aliases() {
        assert_eq!(Function::from_name("sen"), Some(Function::Sin));
        assert_eq!(Function::from_name("arctg"), Some(Function::Atan));
        assert_eq!(Function::from_name("wurzel"), Some(Function::Sqrt));
        assert_eq!(Function::from_name("lg"), Some(Function::Log10));
        assert_eq!(Function::from_name("log10"), Some(Function::Log10));
        assert_eq!(Function::from_name("atan2"), Some(Function::Atan2));
        assert_eq!(Function::from_name("frobnicate"), None);
    }

    #[test]
    fn every_function_builds() {
        let mut ctx = Context::new();
        let x = ctx.x();
        let y = ctx.y();
        for f in Function::iter() {
            assert_eq!(Function::from_name(f.name()), Some(f));
            let args: &[Node] = match f.arg_count() {
                ArgCount::One | ArgCount::OneOrTwo => &[x],
                ArgCount::Two | ArgCount::AtLeastTwo => &[x, y],
            };
            assert!(f.build(&mut ctx, args).is_ok(), "{f:?} failed");
            assert!(matches!(
                f.build(&mut ctx, &[]),
                Err(Error::BadArgCount { got: 0, .. })
            ));
        }
    }

    #[test]
    fn derived_functions() {
        let mut ctx = Context::new();
        let x = ctx.x();
        let cot = Function::Cot.build(&mut ctx, &[x]).unwrap();
        let v = ctx.eval_xyt(cot, 0.5, 0.0, 0.0).unwrap();
        assert!((v - 1.0 / 0.5f64.tan()).abs() < 1e-12);

        // Intermediate infinities are allowed
        let acot = Function::Acot.build(&mut ctx, &[x]).unwrap();
        let v = ctx.eval_xyt(acot, 0.0, 0.0, 0.0).unwrap();
        assert_eq!(v, std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn constants() {
        assert_eq!(constant("pi"), Some(std::f64::consts::PI));
        assert_eq!(constant("rad"), Some(1.0));
        assert!((constant("phi").unwrap() - 1.618033988749895).abs() < 1e-15);
        assert_eq!(constant("x"), None);
    }
}
