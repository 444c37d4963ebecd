//! Grid scan for stationary points
//!
//! The scan visits every interior node of the sampling grid, keeps nodes
//! whose finite-difference gradient is nearly zero, and classifies them with
//! the second-derivative test.  It is a dense, resolution-dependent scan and
//! not a root isolator: a single true extremum usually shows up as a cluster
//! of neighbouring nodes, which are all reported.
use crate::{
    Field, FieldEval,
    config::{ThreadPool, map_rows},
    probe::{CriticalKind, Stencil, default_step},
    sample::MAX_RESOLUTION,
};
use log::trace;
use nalgebra::{Point2, Point3};

/// Classified stationary point found by a scan
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CriticalPoint {
    /// Grid node position and field value
    pub position: Point3<f64>,
    /// Classification from the second-derivative test
    pub kind: CriticalKind,
}

/// Settings for a critical point scan
pub struct ScanConfig<'a> {
    /// Half-width of the scanned square `[-range, range]²`
    pub range: f64,

    /// Number of grid cells along each axis; clamped to `1..=MAX_RESOLUTION`
    pub resolution: usize,

    /// Value of the `t` variable
    pub t: f64,

    /// Finite-difference step, or `None` to use
    /// [`default_step(range)`](default_step)
    pub step: Option<f64>,

    /// Thread pool to use for scanning
    ///
    /// If this is `None`, then scanning is done in a single thread; otherwise,
    /// the provided pool is used.
    pub threads: Option<&'a ThreadPool>,
}

impl Default for ScanConfig<'_> {
    fn default() -> Self {
        Self {
            range: 5.0,
            resolution: 100,
            t: 0.0,
            step: None,
            threads: Some(&ThreadPool::Global),
        }
    }
}

impl ScanConfig<'_> {
    /// Gradient-norm threshold below which a node is considered stationary
    pub fn tolerance(&self) -> f64 {
        1e-2 * self.range.max(1.0)
    }

    /// Scans a field, optionally restricted to the admissible region of a
    /// domain mask (`h(x, y) ≤ 0`)
    ///
    /// Results are in row-major node order.
    pub fn run(
        &self,
        field: &Field,
        mask: Option<&Field>,
    ) -> Vec<CriticalPoint> {
        if !(self.range.is_finite() && self.range > 0.0) {
            return vec![];
        }
        let start = std::time::Instant::now();
        let n = self.resolution.clamp(1, MAX_RESOLUTION);
        let r = self.range;
        let step = 2.0 * r / n as f64;
        let h = self.step.unwrap_or_else(|| default_step(r)).abs();
        if !(h.is_finite() && h > 0.0) {
            return vec![];
        }
        let eps = self.tolerance();

        let rows = map_rows(
            n.saturating_sub(1),
            self.threads,
            || (field.new_eval(), mask.map(|m| m.new_eval())),
            |(eval, mask_eval): &mut (FieldEval, Option<FieldEval>), row| {
                let j = row + 1;
                let y = -r + j as f64 * step;
                let mut out = vec![];
                for i in 1..n {
                    let x = -r + i as f64 * step;
                    if let (Some(m), Some(e)) = (mask, mask_eval.as_mut()) {
                        let v = e.eval(m, x, y, self.t);
                        if !v.is_some_and(|v| v <= 0.0) {
                            continue;
                        }
                    }
                    let p = Point2::new(x, y);
                    let mut s = Stencil::new(field, eval, self.t);
                    if !s.gradient(p, h).is_some_and(|g| g.norm() <= eps) {
                        continue;
                    }
                    let (value, d) = s.derivatives(p, h);
                    if let (Some(z), Some(kind)) = (value, d.kind()) {
                        out.push(CriticalPoint {
                            position: Point3::new(x, y, z),
                            kind,
                        });
                    }
                }
                out
            },
        );
        let out: Vec<_> = rows.into_iter().flatten().collect();
        trace!(
            "scanned {n}×{n} grid in {:?}, found {} points",
            start.elapsed(),
            out.len()
        );
        out
    }
}

/// Scans `[-range, range]²` at `resolution` cells per side
///
/// Only grid nodes are tested, so an extremum between nodes may be missed
/// when the gradient there exceeds [`ScanConfig::tolerance`].  For example,
/// with an odd `resolution` the origin is not a node, and a steep minimum at
/// `(0, 0)` can produce no results at all.
///
/// ```
/// use fieldscope::{Arity, Field, probe::CriticalKind, scan};
///
/// let f = Field::compile("x^2 + y^2", Arity::Two);
/// let points = scan(&f, 4.0, 60, None);
/// assert!(points.iter().any(|p| p.kind == CriticalKind::Min));
/// ```
pub fn scan(
    field: &Field,
    range: f64,
    resolution: usize,
    mask: Option<&Field>,
) -> Vec<CriticalPoint> {
    ScanConfig {
        range,
        resolution,
        ..Default::default()
    }
    .run(field, mask)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Arity;

    fn field(s: &str) -> Field {
        Field::compile(s, Arity::Two)
    }

    #[test]
    fn finds_min_at_origin() {
        let cell = 8.0 / 60.0;
        let points = scan(&field("x^2 + y^2"), 4.0, 60, None);
        assert!(!points.is_empty());
        assert!(points.iter().all(|p| p.kind == CriticalKind::Min));
        assert!(
            points
                .iter()
                .any(|p| p.position.xy().coords.norm() < cell)
        );
    }

    #[test]
    fn clusters_are_kept() {
        // Every interior node of a shallow bowl is nearly stationary
        let points = scan(&field("0.001 * (x^2 + y^2)"), 1.0, 40, None);
        assert_eq!(points.len(), 39 * 39);
        assert!(points.iter().all(|p| p.kind == CriticalKind::Min));
        let cell = 2.0 / 40.0;
        let near = points
            .iter()
            .filter(|p| p.position.xy().coords.norm() < 1.5 * cell)
            .count();
        assert_eq!(near, 9);
    }

    #[test]
    fn finds_saddle_and_max() {
        let points = scan(&field("x^2 - y^2"), 2.0, 40, None);
        assert!(!points.is_empty());
        assert!(points.iter().all(|p| p.kind == CriticalKind::Saddle));

        let points = scan(&field("-(x^2 + y^2)"), 2.0, 40, None);
        assert!(points.iter().all(|p| p.kind == CriticalKind::Max));
        assert!(!points.is_empty());
    }

    #[test]
    fn several_extrema() {
        // Minima at x = ±1, sharp enough that only nearby nodes qualify
        let f = field("(x^2 - 1)^2 + y^2");
        let points = scan(&f, 2.0, 80, None);
        let near = |x0: f64| {
            points.iter().any(|p| {
                (p.position.x - x0).abs() < 0.1 && p.kind == CriticalKind::Min
            })
        };
        assert!(near(1.0));
        assert!(near(-1.0));
        assert!(points.iter().any(|p| {
            p.position.x.abs() < 0.1 && p.kind == CriticalKind::Saddle
        }));
    }

    #[test]
    fn row_major_order() {
        // Stationary points on every integer and half-integer node
        let f = field("cos(pi*x) * cos(pi*y)");
        let points = scan(&f, 2.0, 40, None);
        assert_eq!(points.len(), 25);
        for w in points.windows(2) {
            let (a, b) = (w[0].position, w[1].position);
            assert!(a.y < b.y || (a.y == b.y && a.x < b.x));
        }
    }

    #[test]
    fn mask_excludes() {
        let f = field("x^2 + y^2");
        let away = field("(x - 3)^2 + y^2 - 1");
        assert!(scan(&f, 4.0, 60, Some(&away)).is_empty());

        let invalid = field("sqrt(-1)");
        assert!(scan(&f, 4.0, 60, Some(&invalid)).is_empty());

        let around = field("x^2 + y^2 - 1");
        assert!(!scan(&f, 4.0, 60, Some(&around)).is_empty());
    }

    #[test]
    fn parallel_matches_serial() {
        let pool = ThreadPool::Custom(
            rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap(),
        );
        let f = field("sin(x) * sin(y)");
        let cfg = ScanConfig {
            range: 6.0,
            resolution: 120,
            threads: Some(&pool),
            ..Default::default()
        };
        let a = cfg.run(&f, None);
        let b = ScanConfig { threads: None, ..cfg }.run(&f, None);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn degenerate_inputs() {
        let f = field("x^2 + y^2");
        assert!(scan(&f, 0.0, 60, None).is_empty());
        assert!(scan(&f, f64::NAN, 60, None).is_empty());
        assert!(scan(&f, 4.0, 1, None).is_empty());
        assert!(scan(&field("(("), 4.0, 60, None).is_empty());
        // Flat fields are inconclusive everywhere
        assert!(scan(&field("3"), 4.0, 20, None).is_empty());
    }
}
