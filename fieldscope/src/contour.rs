//! Iso-line extraction with marching squares
//!
//! Each 2×2 cell of grid nodes is handled independently.  Corners are
//! numbered counter-clockwise from the lower-left:
//!
//! ```text
//!  3 ---- 2
//!  |      |
//!  |      |
//!  0 ---- 1
//! ```
//!
//! A corner is *above* the level when `value - level > 0`.  Edges are tested
//! in the order `0-1`, `1-2`, `2-3`, `3-0`; each edge whose ends are both
//! valid and on opposite sides yields a crossing, and crossings are paired in
//! the order they were found (first with second, third with fourth).  This
//! also decides the two ambiguous saddle patterns, deterministically but
//! without looking at the cell centre.
//!
//! Crossings are interpolated along each edge in a fixed direction (left to
//! right, bottom to top), so the cells on either side of an edge produce
//! bit-identical points; [`polylines`] relies on this to stitch segments.
use crate::{
    config::{ThreadPool, map_rows},
    sample::SampleGrid,
};
use arrayvec::ArrayVec;
use nalgebra::Point2;
use ordered_float::OrderedFloat;
use std::collections::{HashMap, VecDeque};

/// Piece of an iso-line within one grid cell
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Segment {
    /// First endpoint
    pub a: Point2<f64>,
    /// Second endpoint
    pub b: Point2<f64>,
}

impl Segment {
    /// Checks whether both endpoints are the same point
    pub fn is_degenerate(&self) -> bool {
        self.a == self.b
    }
}

/// Crossing point on the edge from `pa` to `pb`, given offsets from the level
fn crossing(
    pa: Point2<f64>,
    pb: Point2<f64>,
    da: f64,
    db: f64,
) -> Point2<f64> {
    let t = if da == db { 0.5 } else { da / (da - db) };
    if t <= 0.0 {
        pa
    } else if t >= 1.0 {
        pb
    } else {
        pa + (pb - pa) * t
    }
}

/// Extracts the iso-line at `level` as a list of segments
///
/// Cells touching invalid nodes only produce crossings on their fully-valid
/// edges, so contours never cross an invalid region.
///
/// ```
/// use fieldscope::{Arity, Field, contours, sample};
///
/// let f = Field::compile("x^2 + y^2 - 1", Arity::Two);
/// let grid = sample(&f, 2.0, 40, 0.0);
/// let segments = contours(&grid, 0.0);
/// for s in &segments {
///     assert!((s.a.coords.norm() - 1.0).abs() < 0.01);
/// }
/// ```
pub fn contours(grid: &SampleGrid, level: f64) -> Vec<Segment> {
    let mut out = vec![];
    if !level.is_finite() || grid.width() < 2 || grid.height() < 2 {
        return out;
    }
    for j in 0..grid.height() - 1 {
        for i in 0..grid.width() - 1 {
            let corners = [(i, j), (i + 1, j), (i + 1, j + 1), (i, j + 1)];
            let d = corners.map(|(i, j)| grid.get(i, j).map(|v| v - level));
            let p = corners.map(|(i, j)| grid.position(i, j));

            // Edges 0-1, 1-2, 2-3, 3-0, each listed in canonical direction
            let mut found: ArrayVec<Point2<f64>, 4> = ArrayVec::new();
            for (a, b) in [(0, 1), (1, 2), (3, 2), (0, 3)] {
                let (Some(da), Some(db)) = (d[a], d[b]) else {
                    continue;
                };
                if (da > 0.0) != (db > 0.0) {
                    found.push(crossing(p[a], p[b], da, db));
                }
            }
            // A corner lying exactly on the level is found on both of its
            // edges, which would give a point-sized segment
            out.extend(
                found
                    .chunks_exact(2)
                    .map(|pair| Segment {
                        a: pair[0],
                        b: pair[1],
                    })
                    .filter(|s| !s.is_degenerate()),
            );
        }
    }
    out
}

/// Returns `count` evenly spaced levels strictly between `min` and `max`
///
/// ```
/// # use fieldscope::contour::iso_levels;
/// assert_eq!(iso_levels(0.0, 4.0, 3), vec![1.0, 2.0, 3.0]);
/// assert!(iso_levels(1.0, 1.0, 3).is_empty());
/// ```
pub fn iso_levels(min: f64, max: f64, count: usize) -> Vec<f64> {
    if !(min.is_finite() && max.is_finite() && min < max) {
        return vec![];
    }
    // Blending the endpoints stays finite even when `max - min` overflows
    let n = (count + 1) as f64;
    (1..=count)
        .map(|k| {
            let s = k as f64 / n;
            min * (1.0 - s) + max * s
        })
        .collect()
}

/// Iso-line at a single level
#[derive(Clone, Debug, PartialEq)]
pub struct IsoLine {
    /// Contour level
    pub level: f64,
    /// Segments making up the contour
    pub segments: Vec<Segment>,
}

/// Extracts `count` iso-lines spread over the grid's observed value range
///
/// Levels are contoured independently (in parallel, if a thread pool is
/// given) and returned in increasing order.
pub fn iso_lines(
    grid: &SampleGrid,
    count: usize,
    threads: Option<&ThreadPool>,
) -> Vec<IsoLine> {
    let Some((lo, hi)) = grid.z_range(None) else {
        return vec![];
    };
    let levels = iso_levels(lo, hi, count);
    map_rows(
        levels.len(),
        threads,
        || (),
        |_, k| IsoLine {
            level: levels[k],
            segments: contours(grid, levels[k]),
        },
    )
}

/// Extracts the boundary `h(x, y) = 0` of a sampled domain mask
pub fn boundary(mask: &SampleGrid) -> Vec<Segment> {
    contours(mask, 0.0)
}

/// Connected piece of a contour
#[derive(Clone, Debug, PartialEq)]
pub struct Polyline {
    /// Vertices in order
    ///
    /// For a closed polyline, the first vertex is not repeated at the end.
    pub points: Vec<Point2<f64>>,
    /// Whether the last vertex connects back to the first
    pub closed: bool,
}

type Key = (OrderedFloat<f64>, OrderedFloat<f64>);

fn key(p: Point2<f64>) -> Key {
    (OrderedFloat(p.x), OrderedFloat(p.y))
}

/// Joins segments that share endpoints into polylines
///
/// Degenerate (zero-length) segments are ignored.  Segment direction is not
/// significant.
pub fn polylines(segments: &[Segment]) -> Vec<Polyline> {
    let mut ends: HashMap<Key, Vec<usize>> = HashMap::new();
    for (i, s) in segments.iter().enumerate() {
        if !s.is_degenerate() {
            ends.entry(key(s.a)).or_default().push(i);
            ends.entry(key(s.b)).or_default().push(i);
        }
    }
    let mut used: Vec<bool> =
        segments.iter().map(|s| s.is_degenerate()).collect();

    // Finds an unused segment touching `p`, returning its other end
    let take = |p: Point2<f64>, used: &mut Vec<bool>| {
        let i = *ends.get(&key(p))?.iter().find(|i| !used[**i])?;
        used[i] = true;
        let s = segments[i];
        Some(if key(s.a) == key(p) { s.b } else { s.a })
    };

    let mut out = vec![];
    for i in 0..segments.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let s = segments[i];
        let mut points = VecDeque::from([s.a, s.b]);

        while let Some(next) =
            points.back().and_then(|p| take(*p, &mut used))
        {
            points.push_back(next);
        }
        let closed = points.len() > 3
            && points.front().map(|p| key(*p))
                == points.back().map(|p| key(*p));
        if closed {
            points.pop_back();
        } else {
            while let Some(prev) =
                points.front().and_then(|p| take(*p, &mut used))
            {
                points.push_front(prev);
            }
        }
        out.push(Polyline {
            points: points.into(),
            closed,
        });
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Arity, Field, sample::sample};

    fn grid(width: usize, values: &[Option<f64>]) -> SampleGrid {
        let height = values.len() / width;
        SampleGrid::from_values(width, height, Point2::origin(), 1.0, values)
    }

    #[test]
    fn single_crossing_edge() {
        // Lower-left corner above, others below
        let g = grid(2, &[Some(1.0), Some(-1.0), Some(-1.0), Some(-1.0)]);
        let s = contours(&g, 0.0);
        assert_eq!(
            s,
            vec![Segment {
                a: Point2::new(0.5, 0.0),
                b: Point2::new(0.0, 0.5),
            }]
        );
    }

    #[test]
    fn interpolation() {
        let g = grid(2, &[Some(0.0), Some(4.0), Some(0.0), Some(4.0)]);
        let s = contours(&g, 1.0);
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].a, Point2::new(0.25, 0.0));
        assert_eq!(s[0].b, Point2::new(0.25, 1.0));
    }

    #[test]
    fn ambiguous_saddle() {
        // 0 and 2 above, 1 and 3 below
        let g = grid(2, &[Some(1.0), Some(-1.0), Some(-1.0), Some(1.0)]);
        let s = contours(&g, 0.0);
        assert_eq!(
            s,
            vec![
                Segment {
                    a: Point2::new(0.5, 0.0),
                    b: Point2::new(1.0, 0.5),
                },
                Segment {
                    a: Point2::new(0.5, 1.0),
                    b: Point2::new(0.0, 0.5),
                },
            ]
        );
    }

    #[test]
    fn uniform_cells() {
        let g = grid(2, &[Some(1.0); 4]);
        assert!(contours(&g, 0.0).is_empty());
        assert!(contours(&g, 2.0).is_empty());
        // `value - level > 0` is strict
        assert!(contours(&g, 1.0).is_empty());
        assert!(contours(&g, f64::NAN).is_empty());
    }

    #[test]
    fn invalid_nodes() {
        // Only edge 0-1 is fully valid and crosses; the leftover is dropped
        let g = grid(2, &[Some(1.0), Some(-1.0), None, Some(-1.0)]);
        assert!(contours(&g, 0.0).is_empty());

        // Edges 0-1 and 3-0 are valid and cross
        let g = grid(2, &[Some(1.0), Some(-1.0), Some(-1.0), None]);
        assert_eq!(contours(&g, 0.0).len(), 1);

        let g = grid(2, &[None; 4]);
        assert!(contours(&g, 0.0).is_empty());
    }

    #[test]
    fn shared_points_are_identical() {
        let f = Field::compile("sin(2x) + cos(3y)", Arity::Two);
        let g = sample(&f, 2.0, 37, 0.0);
        let segments = contours(&g, 0.3);
        let mut counts: HashMap<Key, usize> = HashMap::new();
        for s in &segments {
            *counts.entry(key(s.a)).or_default() += 1;
            *counts.entry(key(s.b)).or_default() += 1;
        }
        // Interior crossings are shared by exactly two segments
        let shared = counts.values().filter(|c| **c == 2).count();
        assert!(shared > counts.len() / 2);
    }

    #[test]
    fn unit_circle() {
        let f = Field::compile("x^2 + y^2 - 1", Arity::Two);
        let g = sample(&f, 2.0, 40, 0.0);
        let lines = polylines(&contours(&g, 0.0));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].closed);
        assert!(lines[0].points.len() > 20);
        for p in &lines[0].points {
            assert!((p.coords.norm() - 1.0).abs() < 0.01, "{p:?}");
        }
    }

    #[test]
    fn open_line() {
        let f = Field::compile("x - 0.05", Arity::Two);
        let g = sample(&f, 2.0, 40, 0.0);
        let lines = polylines(&contours(&g, 0.0));
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].closed);
        assert_eq!(lines[0].points.len(), 41);
        let ys: Vec<f64> = lines[0].points.iter().map(|p| p.y).collect();
        let (lo, hi) = (ys[0].min(ys[40]), ys[0].max(ys[40]));
        assert_eq!((lo, hi), (-2.0, g.position(0, 40).y));
    }

    #[test]
    fn levels() {
        assert_eq!(iso_levels(0.0, 1.0, 1), vec![0.5]);
        assert!(iso_levels(0.0, 1.0, 0).is_empty());
        assert!(iso_levels(1.0, 0.0, 3).is_empty());
        assert!(iso_levels(f64::NAN, 1.0, 3).is_empty());
        for l in iso_levels(-3.0, 7.0, 9) {
            assert!(l > -3.0 && l < 7.0);
        }
    }

    #[test]
    fn levels_span_full_float_range() {
        let levels = iso_levels(-f64::MAX, f64::MAX, 3);
        assert_eq!(levels.len(), 3);
        assert!(levels.iter().all(|l| l.is_finite()));
        assert_eq!(levels[1], 0.0);
        assert!(levels.windows(2).all(|w| w[0] < w[1]));

        let f = Field::compile("x * 1e308", Arity::Two);
        let g = sample(&f, 1.7, 10, 0.0);
        let lines = iso_lines(&g, 3, None);
        assert_eq!(lines.len(), 3);
        for l in &lines {
            assert!(l.level.is_finite(), "{}", l.level);
            assert!(!l.segments.is_empty());
        }
    }

    #[test]
    fn corner_on_level() {
        // The level passes exactly through grid nodes, and touches the
        // corner of the upper-right cell without crossing it
        let f = Field::compile("x + y", Arity::Two);
        let g = sample(&f, 1.0, 2, 0.0);
        let segments = contours(&g, 0.0);
        assert!(segments.iter().all(|s| !s.is_degenerate()));
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn iso_lines_in_order() {
        let pool = ThreadPool::Custom(
            rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap(),
        );
        let f = Field::compile("x^2 + y^2", Arity::Two);
        let g = sample(&f, 2.0, 40, 0.0);
        let lines = iso_lines(&g, 5, Some(&pool));
        assert_eq!(lines.len(), 5);
        assert!(lines.windows(2).all(|w| w[0].level < w[1].level));
        assert!(lines.iter().all(|l| !l.segments.is_empty()));
        assert_eq!(lines, iso_lines(&g, 5, None));

        let empty = sample(&Field::compile("((", Arity::Two), 2.0, 4, 0.0);
        assert!(iso_lines(&empty, 5, None).is_empty());
    }

    #[test]
    fn domain_boundary() {
        let h = Field::compile("abs(x) + abs(y) - 1", Arity::Two);
        let g = sample(&h, 2.0, 41, 0.0);
        let lines = polylines(&boundary(&g));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].closed);
    }
}
