//! Fieldscope is a library for numerically analysing user-typed scalar fields
//! `z = f(x, y, t)`.
//!
//! A **field** is compiled from a formula written in a small, closed algebraic
//! grammar: the variables `x`, `y` (and optionally `t`), numeric literals,
//! named constants, arithmetic operators, and a fixed vocabulary of elementary
//! functions.  Nothing else is reachable from a formula, so untrusted text can
//! be compiled safely, and evaluation always terminates.
//!
//! Evaluation is **total**: every call returns either a finite value or
//! `None`.  Points outside a formula's analytic domain (e.g. `sqrt(x)` at
//! `x < 0`) are reported as invalid, and a formula which does not parse
//! produces a field that is invalid everywhere.
//!
//! # Compiling formulas
//! ```
//! use fieldscope::{Arity, Field};
//!
//! let f = Field::compile("x^2 + y^2", Arity::Two);
//! assert_eq!(f.eval(2.0, 0.0, 0.0), Some(4.0));
//!
//! let bad = Field::compile("sin(x", Arity::Two);
//! assert!(bad.error().is_some());
//! assert_eq!(bad.eval(0.0, 0.0, 0.0), None);
//! ```
//!
//! Under the hood, a formula is parsed into a [`Context`](context::Context),
//! an arena which deduplicates subexpressions and folds constants, then
//! flattened into a [`Tape`](tape::Tape) of SSA instructions:
//! ```
//! use fieldscope::{context::Context, parse::{compile, Arity}};
//!
//! let mut ctx = Context::new();
//! let root = compile(&mut ctx, "x + y", Arity::Two)?;
//! let tape = ctx.get_tape(root)?;
//! assert_eq!(tape.len(), 3); // x, y, and (x + y)
//! # Ok::<(), fieldscope::Error>(())
//! ```
//!
//! # Analyses
//! Every analysis works on the square domain `[-range, range]²`:
//!
//! - [`sample`] evaluates a field on a regular grid of nodes
//! - [`probe`] computes finite-difference derivatives, a multi-path limit
//!   estimate and (with [`lagrange`]) a Lagrange multiplier at one point
//! - [`scan`] classifies grid nodes as maxima, minima, or saddles
//! - [`integrate`] computes volume, mass, and centroid over a domain mask
//! - [`contours`] extracts iso-lines from a sampled grid
//!
//! ```
//! use fieldscope::{Arity, Field, contours, integrate, sample, scan};
//!
//! let f = Field::compile("1 - x^2 - y^2", Arity::Two);
//! let grid = sample(&f, 2.0, 40, 0.0);
//! assert_eq!(grid.z_range(None), Some((-7.0, 1.0)));
//!
//! let points = scan(&f, 2.0, 40, None);
//! assert!(points.iter().all(|p| p.kind.to_string() == "max"));
//!
//! let sigma = Field::constant(1.0);
//! let stats = integrate(&f, &sigma, 2.0, 100, None);
//! let volume = stats.volume.unwrap();
//! assert!((volume - std::f64::consts::FRAC_PI_2).abs() < 0.01);
//!
//! let rim = contours(&grid, 0.0);
//! assert!(!rim.is_empty());
//! ```
//!
//! Heavy analyses are parallelised with [Rayon](https://docs.rs/rayon); each
//! has a configuration struct (e.g. [`SampleConfig`]) whose `threads` field
//! selects a [`ThreadPool`] or runs on the calling thread.  Results never
//! depend on the choice of pool.
//!
//! A [`Scene`] groups together the surface, density, constraint and domain
//! formulas of an interactive session.
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod contour;
pub mod field;
pub mod integrate;
pub mod parse;
pub mod probe;
pub mod sample;
pub mod scan;
pub mod scene;
pub mod tape;

mod error;
pub use error::Error;

pub use config::ThreadPool;
pub use contour::{
    IsoLine, Polyline, Segment, boundary, contours, iso_lines, polylines,
};
pub use field::{Field, FieldEval};
pub use integrate::{GlobalStats, IntegrateConfig, integrate};
pub use parse::Arity;
pub use probe::{CriticalKind, ProbePoint, inspect, lagrange, probe};
pub use sample::{SampleConfig, SampleGrid, sample};
pub use scan::{CriticalPoint, ScanConfig, scan};
pub use scene::{Frame, FrameConfig, Scene, SceneSource};
