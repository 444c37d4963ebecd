//! Domain-masked integrals over a surface
//!
//! Integrals use the midpoint rule on an `M × M` grid of cells covering
//! `[-range, range]²`.  Each admissible cell with a finite height `z`
//! contributes a column of height `max(0, z)`:
//!
//! ```text
//! volume += h dA
//! mass   += σ h dA
//! mx     += x σ h dA
//! my     += y σ h dA
//! mz     += ½ h² σ dA
//! ```
//!
//! Cells where the density `σ` is invalid still count towards the height
//! range and volume, but not towards mass or moments.  A sum which overflows
//! is reported as `None`.
use crate::{
    Field, FieldEval,
    config::{ThreadPool, map_rows},
};
use log::trace;
use nalgebra::Point3;

/// Largest supported number of integration cells along each axis
pub const MAX_CELLS: usize = 200;

/// Aggregate statistics over the admissible part of a domain
///
/// The default value describes an empty domain, with zero volume and mass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GlobalStats {
    /// Smallest height among admissible cells
    pub z_min: Option<f64>,
    /// Largest height among admissible cells
    pub z_max: Option<f64>,
    /// Volume between the base plane and the positive part of the surface,
    /// or `None` if it is too large to represent
    pub volume: Option<f64>,
    /// Density-weighted volume, or `None` if it is too large to represent
    pub mass: Option<f64>,
    /// Centre of mass, if the mass is positive and finite
    pub centroid: Option<Point3<f64>>,
    /// Number of admissible cells with a finite height
    pub cells: usize,
}

impl Default for GlobalStats {
    fn default() -> Self {
        Self {
            z_min: None,
            z_max: None,
            volume: Some(0.0),
            mass: Some(0.0),
            centroid: None,
            cells: 0,
        }
    }
}

/// Running sums for one row of cells
#[derive(Copy, Clone, Debug, Default)]
struct Partial {
    z_min: Option<f64>,
    z_max: Option<f64>,
    volume: f64,
    mass: f64,
    mx: f64,
    my: f64,
    mz: f64,
    cells: usize,
}

impl Partial {
    fn merge(self, other: Partial) -> Partial {
        let pick = |a: Option<f64>, b: Option<f64>, f: fn(f64, f64) -> f64| {
            match (a, b) {
                (Some(a), Some(b)) => Some(f(a, b)),
                (a, b) => a.or(b),
            }
        };
        Partial {
            z_min: pick(self.z_min, other.z_min, f64::min),
            z_max: pick(self.z_max, other.z_max, f64::max),
            volume: self.volume + other.volume,
            mass: self.mass + other.mass,
            mx: self.mx + other.mx,
            my: self.my + other.my,
            mz: self.mz + other.mz,
            cells: self.cells + other.cells,
        }
    }

    fn finish(self) -> GlobalStats {
        let finite = |v: f64| Some(v).filter(|v| v.is_finite());
        let mass = finite(self.mass);
        let centroid = mass
            .filter(|m| *m > 0.0)
            .map(|m| Point3::new(self.mx, self.my, self.mz) / m)
            .filter(|c| c.iter().all(|v| v.is_finite()));
        GlobalStats {
            z_min: self.z_min,
            z_max: self.z_max,
            volume: finite(self.volume),
            mass,
            centroid,
            cells: self.cells,
        }
    }
}

/// Settings for integrating a surface over a square domain
pub struct IntegrateConfig<'a> {
    /// Half-width of the integrated square `[-range, range]²`
    pub range: f64,

    /// Number of cells along each axis; clamped to `1..=MAX_CELLS`
    pub resolution: usize,

    /// Value of the `t` variable
    pub t: f64,

    /// Thread pool to use for integration
    ///
    /// If this is `None`, then integration is done in a single thread;
    /// otherwise, the provided pool is used.
    pub threads: Option<&'a ThreadPool>,
}

impl Default for IntegrateConfig<'_> {
    fn default() -> Self {
        Self {
            range: 5.0,
            resolution: 100,
            t: 0.0,
            threads: Some(&ThreadPool::Global),
        }
    }
}

impl IntegrateConfig<'_> {
    /// Integrates `field` with density `density`, optionally restricted to
    /// the admissible region of a domain mask (`h(x, y) ≤ 0`)
    ///
    /// Rows are summed independently and combined in row order, so the
    /// result does not depend on the thread pool.
    pub fn run(
        &self,
        field: &Field,
        density: &Field,
        mask: Option<&Field>,
    ) -> GlobalStats {
        if !(self.range.is_finite() && self.range > 0.0) {
            return GlobalStats::default();
        }
        let start = std::time::Instant::now();
        let m = self.resolution.clamp(1, MAX_CELLS);
        let r = self.range;
        let step = 2.0 * r / m as f64;
        let da = step * step;
        let t = self.t;

        let init = || {
            (
                field.new_eval(),
                density.new_eval(),
                mask.map(|m| m.new_eval()),
            )
        };
        type Evals = (FieldEval, FieldEval, Option<FieldEval>);
        let rows = map_rows(
            m,
            self.threads,
            init,
            |(fe, de, me): &mut Evals, j| {
                let y = -r + (j as f64 + 0.5) * step;
                let mut p = Partial::default();
                for i in 0..m {
                    let x = -r + (i as f64 + 0.5) * step;
                    if let (Some(mask), Some(me)) = (mask, me.as_mut()) {
                        let v = me.eval(mask, x, y, t);
                        if !v.is_some_and(|v| v <= 0.0) {
                            continue;
                        }
                    }
                    let Some(z) = fe.eval(field, x, y, t) else {
                        continue;
                    };
                    p.cells += 1;
                    p.z_min = Some(p.z_min.map_or(z, |v| v.min(z)));
                    p.z_max = Some(p.z_max.map_or(z, |v| v.max(z)));
                    let h = z.max(0.0);
                    p.volume += h * da;
                    if let Some(sigma) = de.eval(density, x, y, t) {
                        let w = sigma * h * da;
                        p.mass += w;
                        p.mx += x * w;
                        p.my += y * w;
                        p.mz += 0.5 * h * w;
                    }
                }
                p
            },
        );
        let out = rows
            .into_iter()
            .fold(Partial::default(), Partial::merge)
            .finish();
        trace!("integrated {m}×{m} cells in {:?}", start.elapsed());
        out
    }
}

/// Integrates over `[-range, range]²` with `resolution` cells per side
///
/// ```
/// use fieldscope::{Arity, Field, integrate};
///
/// let f = Field::compile("1", Arity::Two);
/// let sigma = Field::constant(1.0);
/// let stats = integrate(&f, &sigma, 2.0, 50, None);
/// assert!((stats.volume.unwrap() - 16.0).abs() < 1e-9);
/// assert!((stats.centroid.unwrap().z - 0.5).abs() < 1e-9);
/// ```
pub fn integrate(
    field: &Field,
    density: &Field,
    range: f64,
    resolution: usize,
    mask: Option<&Field>,
) -> GlobalStats {
    IntegrateConfig {
        range,
        resolution,
        ..Default::default()
    }
    .run(field, density, mask)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Arity;
    use approx::assert_relative_eq;

    fn field(s: &str) -> Field {
        Field::compile(s, Arity::Two)
    }

    #[test]
    fn unit_slab() {
        let one = Field::constant(1.0);
        let stats = integrate(&field("1"), &one, 3.0, 60, None);
        assert_relative_eq!(stats.volume.unwrap(), 36.0, epsilon = 1e-9);
        assert_relative_eq!(stats.mass.unwrap(), 36.0, epsilon = 1e-9);
        let c = stats.centroid.unwrap();
        assert_relative_eq!(c.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(c.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(c.z, 0.5, epsilon = 1e-9);
        assert_eq!(stats.cells, 3600);
        assert_eq!(stats.z_min, Some(1.0));
        assert_eq!(stats.z_max, Some(1.0));
    }

    #[test]
    fn below_base_plane() {
        let one = Field::constant(1.0);
        let stats = integrate(&field("-1 - x^2"), &one, 2.0, 40, None);
        assert_eq!(stats.volume, Some(0.0));
        assert_eq!(stats.mass, Some(0.0));
        assert_eq!(stats.centroid, None);
        assert!(stats.z_max.unwrap() < -1.0);
        assert_eq!(stats.cells, 1600);
    }

    #[test]
    fn density_shifts_centroid() {
        // Heavier on the right-hand side
        let stats =
            integrate(&field("1"), &field("1 + x / 2"), 1.0, 100, None);
        assert_relative_eq!(stats.volume.unwrap(), 4.0, epsilon = 1e-9);
        assert_relative_eq!(stats.mass.unwrap(), 4.0, epsilon = 1e-9);
        let c = stats.centroid.unwrap();
        assert!(c.x > 0.1);
        assert_relative_eq!(c.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn invalid_density_skips_mass_only() {
        let sigma = field("sqrt(x)");
        let stats = integrate(&field("1"), &sigma, 1.0, 10, None);
        assert_relative_eq!(stats.volume.unwrap(), 4.0, epsilon = 1e-9);
        assert!(stats.mass.unwrap() > 0.0);
        // Mass comes from the right half only
        assert!(stats.centroid.unwrap().x > 0.0);
    }

    #[test]
    fn masked_disk() {
        let one = Field::constant(1.0);
        let disk = field("x^2 + y^2 - 1");
        let stats = integrate(&field("1"), &one, 1.0, 200, Some(&disk));
        let pi = std::f64::consts::PI;
        assert_relative_eq!(stats.volume.unwrap(), pi, epsilon = 0.02);
    }

    #[test]
    fn nothing_admissible() {
        let one = Field::constant(1.0);
        let stats = integrate(&field("sqrt(-1 - x^2)"), &one, 1.0, 10, None);
        assert_eq!(stats, GlobalStats::default());

        let stats =
            integrate(&field("x"), &one, 1.0, 10, Some(&field("1")));
        assert_eq!(stats.z_min, None);
        assert_eq!(stats.z_max, None);
        assert_eq!(stats.cells, 0);

        assert_eq!(
            integrate(&field("x"), &one, -1.0, 10, None),
            GlobalStats::default()
        );
    }

    #[test]
    fn overflowing_sums() {
        let one = Field::constant(1.0);
        let stats = integrate(&field("1e308"), &one, 5.0, 200, None);
        assert_eq!(stats.volume, None);
        assert_eq!(stats.mass, None);
        assert_eq!(stats.centroid, None);
        assert_eq!(stats.z_max, Some(1e308));
        assert_eq!(stats.cells, 200 * 200);

        // Only the density overflows
        let heavy = field("1e308");
        let stats = integrate(&field("1"), &heavy, 5.0, 200, None);
        assert_relative_eq!(stats.volume.unwrap(), 100.0, epsilon = 1e-9);
        assert_eq!(stats.mass, None);
        assert_eq!(stats.centroid, None);
    }

    #[test]
    fn resolution_is_clamped() {
        let one = Field::constant(1.0);
        let stats = integrate(&field("1"), &one, 1.0, 10_000, None);
        assert_eq!(stats.cells, MAX_CELLS * MAX_CELLS);
        let stats = integrate(&field("1"), &one, 1.0, 0, None);
        assert_eq!(stats.cells, 1);
    }

    #[test]
    fn deterministic_across_pools() {
        let pool = ThreadPool::Custom(
            rayon::ThreadPoolBuilder::new().num_threads(5).build().unwrap(),
        );
        let f = field("exp(-x^2 - y^2) + 0.1 sin(5x)");
        let sigma = field("2 + cos(y)");
        let cfg = IntegrateConfig {
            range: 2.5,
            resolution: 150,
            t: 0.0,
            threads: Some(&pool),
        };
        let a = cfg.run(&f, &sigma, None);
        let b = IntegrateConfig { threads: None, ..cfg }.run(&f, &sigma, None);
        assert_eq!(a, b);
    }
}
