//! Sampling fields on regular grids
use crate::{Field, config::ThreadPool, config::map_rows};
use log::trace;
use nalgebra::Point2;

/// Largest supported number of grid cells along each axis
pub const MAX_RESOLUTION: usize = 1024;

/// Regular 2D grid of optional values
///
/// Node `(i, j)` sits at `origin + (i, j) * step`; `i` runs along the x axis
/// and `j` along the y axis.  Values are stored in row-major order (one row
/// per `j`).  Invalid nodes store a height of `0.0` and are flagged in the
/// validity mask.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleGrid {
    width: usize,
    height: usize,
    origin: Point2<f64>,
    step: f64,
    heights: Vec<f64>,
    valid: Vec<bool>,
}

impl SampleGrid {
    /// Builds a grid from row-major values
    ///
    /// Non-finite values are stored as invalid.
    ///
    /// # Panics
    /// If `values.len() != width * height`
    pub fn from_values(
        width: usize,
        height: usize,
        origin: Point2<f64>,
        step: f64,
        values: &[Option<f64>],
    ) -> Self {
        assert_eq!(values.len(), width * height, "invalid grid size");
        let mut heights = Vec::with_capacity(values.len());
        let mut valid = Vec::with_capacity(values.len());
        for v in values {
            match v.filter(|v| v.is_finite()) {
                Some(v) => {
                    heights.push(v);
                    valid.push(true);
                }
                None => {
                    heights.push(0.0);
                    valid.push(false);
                }
            }
        }
        Self {
            width,
            height,
            origin,
            step,
            heights,
            valid,
        }
    }

    /// Builds a grid with a single invalid node at the origin
    fn degenerate() -> Self {
        Self::from_values(1, 1, Point2::origin(), 0.0, &[None])
    }

    /// Number of nodes along the x axis
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of nodes along the y axis
    pub fn height(&self) -> usize {
        self.height
    }

    /// Position of node `(0, 0)`
    pub fn origin(&self) -> Point2<f64> {
        self.origin
    }

    /// Distance between neighbouring nodes
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Node heights in row-major order (`0.0` at invalid nodes)
    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    /// Validity mask in row-major order
    pub fn mask(&self) -> &[bool] {
        &self.valid
    }

    /// Returns the value at node `(i, j)`, or `None` if it is invalid or out
    /// of bounds
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i >= self.width || j >= self.height {
            return None;
        }
        let k = j * self.width + i;
        self.valid[k].then_some(self.heights[k])
    }

    /// Returns the position of node `(i, j)`
    pub fn position(&self, i: usize, j: usize) -> Point2<f64> {
        Point2::new(
            self.origin.x + i as f64 * self.step,
            self.origin.y + j as f64 * self.step,
        )
    }

    /// Returns the node nearest to the given position, if it lies in the grid
    pub fn nearest(&self, p: Point2<f64>) -> Option<(usize, usize)> {
        if !(self.step > 0.0) {
            return (self.width == 1 && self.height == 1).then_some((0, 0));
        }
        let i = ((p.x - self.origin.x) / self.step).round();
        let j = ((p.y - self.origin.y) / self.step).round();
        let inside = |v: f64, n: usize| v >= 0.0 && v < n as f64;
        (inside(i, self.width) && inside(j, self.height))
            .then_some((i as usize, j as usize))
    }

    /// Checks whether node `(i, j)` is admissible when this grid holds a
    /// domain mask `h(x, y)`
    ///
    /// A node is admissible when `h ≤ 0`; an invalid `h` is not admissible.
    pub fn is_admissible(&self, i: usize, j: usize) -> bool {
        self.get(i, j).is_some_and(|h| h <= 0.0)
    }

    /// Iterates over `(i, j, value)` for every node, in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Option<f64>)> {
        (0..self.height).flat_map(move |j| {
            (0..self.width).map(move |i| (i, j, self.get(i, j)))
        })
    }

    /// Returns the smallest and largest valid values
    ///
    /// If a mask grid with the same shape is provided, only admissible nodes
    /// are considered.  Returns `None` if no node qualifies.
    pub fn z_range(&self, mask: Option<&SampleGrid>) -> Option<(f64, f64)> {
        self.iter()
            .filter(|(i, j, _)| mask.is_none_or(|m| m.is_admissible(*i, *j)))
            .filter_map(|(_, _, v)| v)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
            })
    }
}

/// Settings for sampling a field on a square grid
pub struct SampleConfig<'a> {
    /// Half-width of the sampled square `[-range, range]²`
    pub range: f64,

    /// Number of cells along each axis (the grid has `resolution + 1` nodes
    /// per side); clamped to `1..=MAX_RESOLUTION`
    pub resolution: usize,

    /// Value of the `t` variable
    pub t: f64,

    /// Thread pool to use for sampling
    ///
    /// If this is `None`, then sampling is done in a single thread; otherwise,
    /// the provided pool is used.
    pub threads: Option<&'a ThreadPool>,
}

impl Default for SampleConfig<'_> {
    fn default() -> Self {
        Self {
            range: 5.0,
            resolution: 100,
            t: 0.0,
            threads: Some(&ThreadPool::Global),
        }
    }
}

impl SampleConfig<'_> {
    /// Samples the given field
    ///
    /// A range which is not finite and positive produces a grid with a single
    /// invalid node.
    pub fn run(&self, field: &Field) -> SampleGrid {
        if !(self.range.is_finite() && self.range > 0.0) {
            return SampleGrid::degenerate();
        }
        let start = std::time::Instant::now();
        let n = self.resolution.clamp(1, MAX_RESOLUTION);
        let size = n + 1;
        let r = self.range;
        let step = 2.0 * r / n as f64;

        let rows = map_rows(
            size,
            self.threads,
            || field.new_eval(),
            |eval, j| {
                let y = -r + j as f64 * step;
                (0..size)
                    .map(|i| eval.eval(field, -r + i as f64 * step, y, self.t))
                    .collect::<Vec<_>>()
            },
        );
        let values: Vec<Option<f64>> = rows.into_iter().flatten().collect();
        trace!("sampled {size}×{size} grid in {:?}", start.elapsed());
        SampleGrid::from_values(
            size,
            size,
            Point2::new(-r, -r),
            step,
            &values,
        )
    }
}

/// Samples a field on `[-range, range]²` with `resolution` cells per side
///
/// ```
/// use fieldscope::{Arity, Field, sample};
///
/// let f = Field::compile("x + y", Arity::Two);
/// let grid = sample(&f, 1.0, 2, 0.0);
/// assert_eq!(grid.width(), 3);
/// assert_eq!(grid.get(0, 0), Some(-2.0));
/// assert_eq!(grid.get(2, 1), Some(1.0));
/// ```
pub fn sample(
    field: &Field,
    range: f64,
    resolution: usize,
    t: f64,
) -> SampleGrid {
    SampleConfig {
        range,
        resolution,
        t,
        ..Default::default()
    }
    .run(field)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Arity;

    #[test]
    fn node_positions() {
        let f = Field::compile("x", Arity::Two);
        let g = sample(&f, 2.0, 4, 0.0);
        assert_eq!(g.width(), 5);
        assert_eq!(g.height(), 5);
        assert_eq!(g.step(), 1.0);
        for i in 0..5 {
            assert_eq!(g.get(i, 3), Some(-2.0 + i as f64));
            assert_eq!(g.position(i, 3), Point2::new(-2.0 + i as f64, 1.0));
        }
        assert_eq!(g.get(5, 0), None);
    }

    #[test]
    fn invalid_nodes() {
        let f = Field::compile("sqrt(x)", Arity::Two);
        let g = sample(&f, 1.0, 2, 0.0);
        assert_eq!(g.get(0, 0), None);
        assert_eq!(g.heights()[0], 0.0);
        assert!(!g.mask()[0]);
        assert_eq!(g.get(1, 0), Some(0.0));
        assert_eq!(g.get(2, 0), Some(1.0));
    }

    #[test]
    fn clamping() {
        let f = Field::compile("x", Arity::Two);
        assert_eq!(sample(&f, 1.0, 0, 0.0).width(), 2);
        assert_eq!(sample(&f, 1.0, 1_000_000, 0.0).width(), 1025);
        for r in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let g = sample(&f, r, 10, 0.0);
            assert_eq!(g.width(), 1);
            assert_eq!(g.get(0, 0), None);
        }
    }

    #[test]
    fn idempotent() {
        let pool = ThreadPool::Custom(
            rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap(),
        );
        let f = Field::compile("sin(3x) * cos(2y) + t", Arity::Three);
        let cfg = SampleConfig {
            range: 3.0,
            resolution: 50,
            t: 0.25,
            threads: Some(&pool),
        };
        let a = cfg.run(&f);
        let b = cfg.run(&f);
        let c = SampleConfig { threads: None, ..cfg }.run(&f);
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn z_range_with_mask() {
        let f = Field::compile("x", Arity::Two);
        let g = sample(&f, 2.0, 4, 0.0);
        assert_eq!(g.z_range(None), Some((-2.0, 2.0)));

        // Only the left half of the domain is admissible
        let h = Field::compile("x + 0.5", Arity::Two);
        let m = sample(&h, 2.0, 4, 0.0);
        assert_eq!(g.z_range(Some(&m)), Some((-2.0, -1.0)));

        let nothing = sample(&Field::compile("1", Arity::Two), 2.0, 4, 0.0);
        assert_eq!(g.z_range(Some(&nothing)), None);
    }

    #[test]
    fn nearest_node() {
        let f = Field::compile("x", Arity::Two);
        let g = sample(&f, 2.0, 4, 0.0);
        assert_eq!(g.nearest(Point2::new(0.1, -0.4)), Some((2, 2)));
        assert_eq!(g.nearest(Point2::new(-2.0, 2.0)), Some((0, 4)));
        assert_eq!(g.nearest(Point2::new(3.0, 0.0)), None);
    }
}
