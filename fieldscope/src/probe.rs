//! Finite-difference analysis at a single point
//!
//! All derivatives use central differences with step `h`:
//!
//! ```text
//! fx  = (f(x+h, y) - f(x-h, y)) / 2h
//! fxx = (f(x+h, y) - 2 f(x, y) + f(x-h, y)) / h²
//! fxy = (f(x+h, y+h) - f(x+h, y-h) - f(x-h, y+h) + f(x-h, y-h)) / 4h²
//! ```
//!
//! (and likewise for `fy` and `fyy`).  A derivative is `None` if any sample it
//! needs is invalid.
use crate::{Field, FieldEval};
use nalgebra::{Matrix2, Point2, Vector2};

/// Returns the default finite-difference step for a view of half-width `range`
///
/// ```
/// # use fieldscope::probe::default_step;
/// assert_eq!(default_step(5.0), 0.005);
/// assert_eq!(default_step(0.01), 1e-4);
/// ```
pub fn default_step(range: f64) -> f64 {
    (range / 1000.0).max(1e-4)
}

/// Classification of a stationary point
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum CriticalKind {
    Max,
    Min,
    Saddle,
}

/// Second-derivative test on Hessian entries
///
/// Returns `None` when the discriminant `D = fxx·fyy − fxy²` is too close
/// to zero to decide, i.e. `|D| ≤ 1e-6·(1 + fxx² + fyy² + 2fxy²)`.
///
/// ```
/// # use fieldscope::probe::{classify, CriticalKind};
/// assert_eq!(classify(2.0, 2.0, 0.0), Some(CriticalKind::Min));
/// assert_eq!(classify(2.0, -2.0, 0.0), Some(CriticalKind::Saddle));
/// assert_eq!(classify(1.0, 0.0, 0.0), None);
/// ```
pub fn classify(fxx: f64, fyy: f64, fxy: f64) -> Option<CriticalKind> {
    let d = fxx * fyy - fxy * fxy;
    let scale = 1.0 + fxx * fxx + fyy * fyy + 2.0 * fxy * fxy;
    if !d.is_finite() || d.abs() <= 1e-6 * scale {
        None
    } else if d < 0.0 {
        Some(CriticalKind::Saddle)
    } else if fxx < 0.0 {
        Some(CriticalKind::Max)
    } else {
        Some(CriticalKind::Min)
    }
}

/// First and second partial derivatives at a point
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[allow(missing_docs)]
pub struct Derivatives {
    pub fx: Option<f64>,
    pub fy: Option<f64>,
    pub fxx: Option<f64>,
    pub fyy: Option<f64>,
    pub fxy: Option<f64>,
}

impl Derivatives {
    /// Returns `(fx, fy)` if both are defined
    pub fn gradient(&self) -> Option<Vector2<f64>> {
        Some(Vector2::new(self.fx?, self.fy?))
    }

    /// Returns the Hessian matrix if all of its entries are defined
    pub fn hessian(&self) -> Option<Matrix2<f64>> {
        let (fxx, fyy, fxy) = (self.fxx?, self.fyy?, self.fxy?);
        Some(Matrix2::new(fxx, fxy, fxy, fyy))
    }

    /// Returns the discriminant `D = fxx·fyy − fxy²`
    pub fn discriminant(&self) -> Option<f64> {
        let d = self.fxx? * self.fyy? - self.fxy? * self.fxy?;
        d.is_finite().then_some(d)
    }

    /// Classifies the point with the second-derivative test
    ///
    /// This does not check that the gradient vanishes.
    pub fn kind(&self) -> Option<CriticalKind> {
        classify(self.fxx?, self.fyy?, self.fxy?)
    }
}

/// Result of the multi-path limit check
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LimitEstimate {
    /// Number of valid samples
    pub samples: usize,
    /// Mean of the valid samples
    pub mean: Option<f64>,
    /// Sample variance (`n − 1` denominator), if there are 2 or more samples
    pub variance: Option<f64>,
    /// Whether the samples agree within `1e-4·(1 + |mean|)`
    pub consistent: bool,
}

/// Directions along which the limit check approaches a point
///
/// Axis, diagonal, and slope-2 / slope-½ directions, with both signs; each is
/// normalized before use.
const DIRECTIONS: [(f64, f64); 12] = [
    (1.0, 0.0),
    (-1.0, 0.0),
    (0.0, 1.0),
    (0.0, -1.0),
    (1.0, 1.0),
    (-1.0, -1.0),
    (1.0, -1.0),
    (-1.0, 1.0),
    (1.0, 2.0),
    (-2.0, -1.0),
    (2.0, -1.0),
    (-1.0, 2.0),
];

/// Number of halving radii used by the limit check (`h, h/2, ... h/16`)
const RADII: usize = 5;

/// Full report of a probe at one point
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ProbePoint {
    /// Probed position
    pub position: Point2<f64>,
    /// Field value at the position
    pub value: Option<f64>,
    /// Partial derivatives
    pub derivatives: Derivatives,
    /// Limit-consistency estimate
    pub limit: LimitEstimate,
}

impl ProbePoint {
    /// Returns the gradient, if defined
    pub fn gradient(&self) -> Option<Vector2<f64>> {
        self.derivatives.gradient()
    }

    /// Returns the Hessian, if defined
    pub fn hessian(&self) -> Option<Matrix2<f64>> {
        self.derivatives.hessian()
    }

    /// Returns the discriminant, if defined
    pub fn discriminant(&self) -> Option<f64> {
        self.derivatives.discriminant()
    }

    /// Classifies the point by the second-derivative test
    pub fn kind(&self) -> Option<CriticalKind> {
        self.derivatives.kind()
    }
}

/// Lagrange-multiplier estimate against a constraint `g(x, y) = 0`
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LagrangeEstimate {
    /// `λ = (∇f·∇g) / ‖∇g‖²`, if both gradients exist and `‖∇g‖²` is
    /// positive
    pub lambda: Option<f64>,
    /// Value of the constraint at the probed point
    pub constraint: Option<f64>,
    /// Gradient of the objective
    pub grad_f: Option<Vector2<f64>>,
    /// Gradient of the constraint
    pub grad_g: Option<Vector2<f64>>,
}

/// Bundle of everything shown when hovering over a point
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Inspection {
    /// Probe of the surface field
    pub probe: ProbePoint,
    /// Lagrange estimate, if a constraint was supplied
    pub lagrange: Option<LagrangeEstimate>,
}

////////////////////////////////////////////////////////////////////////////////

/// Evaluation handle bound to one field and time
pub(crate) struct Stencil<'a> {
    field: &'a Field,
    eval: &'a mut FieldEval,
    t: f64,
}

impl<'a> Stencil<'a> {
    pub fn new(field: &'a Field, eval: &'a mut FieldEval, t: f64) -> Self {
        Self { field, eval, t }
    }

    fn f(&mut self, x: f64, y: f64) -> Option<f64> {
        self.eval.eval(self.field, x, y, self.t)
    }

    /// Computes central-difference gradient only
    pub fn gradient(
        &mut self,
        p: Point2<f64>,
        h: f64,
    ) -> Option<Vector2<f64>> {
        let xp = self.f(p.x + h, p.y)?;
        let xm = self.f(p.x - h, p.y)?;
        let yp = self.f(p.x, p.y + h)?;
        let ym = self.f(p.x, p.y - h)?;
        let fx = finite((xp - xm) / (2.0 * h))?;
        let fy = finite((yp - ym) / (2.0 * h))?;
        Some(Vector2::new(fx, fy))
    }

    /// Computes the value and all partial derivatives
    pub fn derivatives(
        &mut self,
        p: Point2<f64>,
        h: f64,
    ) -> (Option<f64>, Derivatives) {
        let (x, y) = (p.x, p.y);
        let c = self.f(x, y);
        let xp = self.f(x + h, y);
        let xm = self.f(x - h, y);
        let yp = self.f(x, y + h);
        let ym = self.f(x, y - h);
        let pp = self.f(x + h, y + h);
        let pm = self.f(x + h, y - h);
        let mp = self.f(x - h, y + h);
        let mm = self.f(x - h, y - h);

        let h2 = h * h;
        let d = Derivatives {
            fx: xp.zip(xm).and_then(|(a, b)| finite((a - b) / (2.0 * h))),
            fy: yp.zip(ym).and_then(|(a, b)| finite((a - b) / (2.0 * h))),
            fxx: second(xp, c, xm, h2),
            fyy: second(yp, c, ym, h2),
            fxy: cross(pp, pm, mp, mm, h2),
        };
        (c, d)
    }

    /// Samples the field along every direction at halving radii
    pub fn limit(&mut self, p: Point2<f64>, h: f64) -> LimitEstimate {
        let mut values = Vec::with_capacity(DIRECTIONS.len() * RADII);
        for (dx, dy) in DIRECTIONS {
            let d = Vector2::new(dx, dy).normalize();
            let mut r = h;
            for _ in 0..RADII {
                let q = p + d * r;
                values.extend(self.f(q.x, q.y));
                r /= 2.0;
            }
        }
        limit_stats(&values)
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn second(
    plus: Option<f64>,
    center: Option<f64>,
    minus: Option<f64>,
    h2: f64,
) -> Option<f64> {
    finite((plus? - 2.0 * center? + minus?) / h2)
}

fn cross(
    pp: Option<f64>,
    pm: Option<f64>,
    mp: Option<f64>,
    mm: Option<f64>,
    h2: f64,
) -> Option<f64> {
    finite((pp? - pm? - mp? + mm?) / (4.0 * h2))
}

/// Computes mean, sample variance and consistency of a set of samples
fn limit_stats(values: &[f64]) -> LimitEstimate {
    let n = values.len();
    if n == 0 {
        return LimitEstimate::default();
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = (n >= 2).then(|| {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
            / (n - 1) as f64
    });
    let mean = finite(mean);
    let variance = variance.and_then(finite);
    let consistent = match (mean, variance) {
        (Some(m), Some(v)) => v < 1e-4 * (1.0 + m.abs()),
        _ => false,
    };
    LimitEstimate {
        samples: n,
        mean,
        variance,
        consistent,
    }
}

/// Normalizes a step size, returning `None` if it is unusable
fn check_step(h: f64) -> Option<f64> {
    let h = h.abs();
    (h.is_finite() && h > 0.0).then_some(h)
}

/// Probes a field at a single point
///
/// A step `h` which is zero or not finite produces a probe with only the
/// value filled in.
///
/// ```
/// use fieldscope::{Arity, Field, probe::{probe, CriticalKind}};
///
/// let f = Field::compile("x^2 + y^2", Arity::Two);
/// let p = probe(&f, 0.0, 0.0, 0.0, 1e-3);
/// assert_eq!(p.kind(), Some(CriticalKind::Min));
/// assert!(p.gradient().unwrap().norm() < 1e-9);
/// assert!(p.limit.consistent);
/// ```
pub fn probe(field: &Field, x: f64, y: f64, t: f64, h: f64) -> ProbePoint {
    let mut eval = field.new_eval();
    let mut s = Stencil::new(field, &mut eval, t);
    let position = Point2::new(x, y);
    let Some(h) = check_step(h) else {
        return ProbePoint {
            position,
            value: s.f(x, y),
            derivatives: Derivatives::default(),
            limit: LimitEstimate::default(),
        };
    };
    let (value, derivatives) = s.derivatives(position, h);
    let limit = s.limit(position, h);
    ProbePoint {
        position,
        value,
        derivatives,
        limit,
    }
}

/// Runs only the multi-path limit check at a point
pub fn limit(field: &Field, x: f64, y: f64, t: f64, h: f64) -> LimitEstimate {
    let Some(h) = check_step(h) else {
        return LimitEstimate::default();
    };
    let mut eval = field.new_eval();
    Stencil::new(field, &mut eval, t).limit(Point2::new(x, y), h)
}

/// Estimates the Lagrange multiplier of `f` against the constraint `g`
///
/// ```
/// use fieldscope::{Arity, Field, probe::lagrange};
///
/// // Maximize x + y on the unit circle: optimum at (1/√2, 1/√2)
/// let f = Field::compile("x + y", Arity::Two);
/// let g = Field::compile("x^2 + y^2 - 1", Arity::Two);
/// let s = std::f64::consts::FRAC_1_SQRT_2;
/// let est = lagrange(&f, &g, s, s, 0.0, 1e-4);
/// assert!((est.lambda.unwrap() - s).abs() < 1e-6);
/// assert!(est.constraint.unwrap().abs() < 1e-12);
/// ```
pub fn lagrange(
    f: &Field,
    g: &Field,
    x: f64,
    y: f64,
    t: f64,
    h: f64,
) -> LagrangeEstimate {
    let p = Point2::new(x, y);
    let mut eval_f = f.new_eval();
    let mut eval_g = g.new_eval();
    let constraint = eval_g.eval(g, x, y, t);
    let (grad_f, grad_g) = match check_step(h) {
        Some(h) => (
            Stencil::new(f, &mut eval_f, t).gradient(p, h),
            Stencil::new(g, &mut eval_g, t).gradient(p, h),
        ),
        None => (None, None),
    };
    let lambda = grad_f.zip(grad_g).and_then(|(df, dg)| {
        let n2 = dg.norm_squared();
        (n2 > 0.0).then(|| df.dot(&dg) / n2).and_then(finite)
    });
    LagrangeEstimate {
        lambda,
        constraint,
        grad_f,
        grad_g,
    }
}

/// Probes a point and, if a constraint is given, estimates its multiplier
pub fn inspect(
    field: &Field,
    constraint: Option<&Field>,
    x: f64,
    y: f64,
    t: f64,
    h: f64,
) -> Inspection {
    Inspection {
        probe: probe(field, x, y, t, h),
        lagrange: constraint.map(|g| lagrange(field, g, x, y, t, h)),
    }
}
