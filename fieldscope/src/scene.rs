//! Bundles of formulas analysed together
//!
//! A session supplies up to four formulas: the surface `z = f(x, y, t)`, a
//! density `σ(x, y)`, a constraint curve `g(x, y) = 0` and a domain mask
//! `h(x, y) ≤ 0`.  A [`Scene`] compiles them once and runs the per-change
//! analyses ([`Scene::frame`]) as well as the on-demand ones
//! ([`Scene::inspect`], [`Scene::scan`]).
use crate::{
    Error, Field,
    config::ThreadPool,
    contour::{self, IsoLine, Segment},
    integrate::{GlobalStats, IntegrateConfig},
    parse::Arity,
    probe::{self, Inspection},
    sample::{SampleConfig, SampleGrid},
    scan::{CriticalPoint, ScanConfig},
};

/// Formula text for each field of a scene
///
/// Empty strings (or whitespace) mean "not supplied": the density defaults to
/// a constant `1`, and the constraint and domain are absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneSource {
    /// Surface `z = f(x, y, t)`
    pub surface: String,
    /// Density `σ(x, y)`
    pub density: String,
    /// Constraint `g(x, y)`, whose zero set is the constraint curve
    pub constraint: String,
    /// Domain mask `h(x, y)`; points with `h ≤ 0` are admissible
    pub domain: String,
}

/// Which field of a scene a diagnostic refers to
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum Role {
    Surface,
    Density,
    Constraint,
    Domain,
}

/// Compiled fields of a scene
#[derive(Clone, Debug)]
pub struct Scene {
    surface: Field,
    density: Field,
    constraint: Option<Field>,
    domain: Option<Field>,
}

fn optional(s: &str) -> Option<Field> {
    let s = s.trim();
    (!s.is_empty()).then(|| Field::compile(s, Arity::Two))
}

impl Scene {
    /// Compiles every formula of a scene
    ///
    /// This never fails; see [`Scene::diagnostics`] for compile errors.
    pub fn new(src: &SceneSource) -> Self {
        Self {
            surface: Field::compile(&src.surface, Arity::Three),
            density: optional(&src.density)
                .unwrap_or_else(|| Field::constant(1.0)),
            constraint: optional(&src.constraint),
            domain: optional(&src.domain),
        }
    }

    /// Returns the surface field
    pub fn surface(&self) -> &Field {
        &self.surface
    }

    /// Returns the density field
    pub fn density(&self) -> &Field {
        &self.density
    }

    /// Returns the constraint field, if one was supplied
    pub fn constraint(&self) -> Option<&Field> {
        self.constraint.as_ref()
    }

    /// Returns the domain mask, if one was supplied
    pub fn domain(&self) -> Option<&Field> {
        self.domain.as_ref()
    }

    /// Lists the compile errors of every supplied formula
    pub fn diagnostics(&self) -> Vec<(Role, &Error)> {
        [
            (Role::Surface, Some(&self.surface)),
            (Role::Density, Some(&self.density)),
            (Role::Constraint, self.constraint.as_ref()),
            (Role::Domain, self.domain.as_ref()),
        ]
        .into_iter()
        .filter_map(|(role, f)| Some((role, f?.error()?)))
        .collect()
    }

    /// Runs the analyses that are refreshed whenever an input changes
    pub fn frame(&self, cfg: &FrameConfig) -> Frame {
        let grid = SampleConfig {
            range: cfg.range,
            resolution: cfg.resolution,
            t: cfg.t,
            threads: cfg.threads,
        }
        .run(&self.surface);
        let iso_lines = contour::iso_lines(&grid, cfg.levels, cfg.threads);

        let mask = self.domain.as_ref().map(|h| {
            SampleConfig {
                range: cfg.range,
                resolution: cfg.resolution,
                t: cfg.t,
                threads: cfg.threads,
            }
            .run(h)
        });
        let boundary =
            mask.as_ref().map(contour::boundary).unwrap_or_default();

        let stats = IntegrateConfig {
            range: cfg.range,
            resolution: cfg.cells,
            t: cfg.t,
            threads: cfg.threads,
        }
        .run(&self.surface, &self.density, self.domain.as_ref());

        Frame {
            grid,
            mask,
            iso_lines,
            boundary,
            stats,
        }
    }

    /// Probes the surface at a point, using the frame's time and the
    /// default step for its range
    pub fn inspect(&self, x: f64, y: f64, cfg: &FrameConfig) -> Inspection {
        probe::inspect(
            &self.surface,
            self.constraint.as_ref(),
            x,
            y,
            cfg.t,
            probe::default_step(cfg.range),
        )
    }

    /// Scans the surface for critical points within the domain mask
    pub fn scan(&self, cfg: &FrameConfig) -> Vec<CriticalPoint> {
        ScanConfig {
            range: cfg.range,
            resolution: cfg.resolution,
            t: cfg.t,
            step: None,
            threads: cfg.threads,
        }
        .run(&self.surface, self.domain.as_ref())
    }
}

/// Settings shared by the analyses of a [`Scene`]
pub struct FrameConfig<'a> {
    /// Half-width of the analysed square `[-range, range]²`
    pub range: f64,

    /// Sampling (and scanning) resolution, in cells per side
    pub resolution: usize,

    /// Integration resolution, in cells per side
    pub cells: usize,

    /// Number of z-level iso-lines
    pub levels: usize,

    /// Value of the `t` variable
    pub t: f64,

    /// Thread pool to use for every analysis
    pub threads: Option<&'a ThreadPool>,
}

impl Default for FrameConfig<'_> {
    fn default() -> Self {
        Self {
            range: 5.0,
            resolution: 100,
            cells: 100,
            levels: 10,
            t: 0.0,
            threads: Some(&ThreadPool::Global),
        }
    }
}

/// Results of [`Scene::frame`]
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Sampled surface heights
    pub grid: SampleGrid,
    /// Sampled domain mask, if the scene has one
    pub mask: Option<SampleGrid>,
    /// Z-level iso-lines, in increasing level order
    pub iso_lines: Vec<IsoLine>,
    /// Zero-level contour of the domain mask
    pub boundary: Vec<Segment>,
    /// Integrals over the admissible domain
    pub stats: GlobalStats,
}
