use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;

use fieldscope::{
    Arity, Field, GlobalStats, IntegrateConfig, SampleConfig, SampleGrid,
    ScanConfig, ThreadPool, contour, probe,
};

/// Command-line front end for analysing scalar fields `z = f(x, y, t)`
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    cmd: Command,

    /// Surface formula, e.g. "x^2 - y^2 + t"
    #[clap(short, long)]
    formula: String,

    /// Value of the `t` variable
    #[clap(short, long, default_value_t = 0.0)]
    #[clap(allow_negative_numbers = true)]
    t: f64,

    /// Half-width of the analysed square `[-range, range]²`
    #[clap(short, long, default_value_t = 5.0)]
    range: f64,

    /// Number of threads to use
    #[clap(long)]
    threads: Option<NonZeroUsize>,

    /// Number of times to run (for benchmarking)
    #[clap(short = 'N', default_value_t = 1)]
    n: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluates the surface at a single point
    Eval {
        #[clap(allow_negative_numbers = true)]
        x: f64,
        #[clap(allow_negative_numbers = true)]
        y: f64,
    },

    /// Prints derivatives, a limit estimate and a Lagrange multiplier
    Probe {
        #[clap(allow_negative_numbers = true)]
        x: f64,
        #[clap(allow_negative_numbers = true)]
        y: f64,

        /// Finite-difference step (defaults to a fraction of the range)
        #[clap(short, long)]
        step: Option<f64>,

        /// Constraint `g(x, y)`, whose zero set is the constraint curve
        #[clap(short, long)]
        constraint: Option<String>,
    },

    /// Scans the grid for maxima, minima and saddles
    Scan {
        #[clap(flatten)]
        grid: GridSettings,
    },

    /// Computes volume, mass and centroid
    Integrate {
        /// Number of integration cells per side
        #[clap(short, long, default_value_t = 100)]
        cells: usize,

        /// Density `σ(x, y)` (defaults to 1)
        #[clap(short, long)]
        density: Option<String>,

        /// Domain mask `h(x, y)`; points with `h ≤ 0` are admissible
        #[clap(long)]
        domain: Option<String>,
    },

    /// Extracts iso-lines and prints them as polylines
    Contour {
        #[clap(flatten)]
        grid: GridSettings,

        /// Number of evenly spaced levels
        #[clap(short, long, default_value_t = 10)]
        levels: usize,

        /// Prints every vertex, not just a summary
        #[clap(short, long)]
        verbose: bool,
    },

    /// Writes the sampled heights as a grayscale image
    Heightmap {
        #[clap(flatten)]
        grid: GridSettings,

        /// Name of a `.png` file to write
        #[clap(short, long)]
        out: PathBuf,
    },
}

#[derive(Parser)]
struct GridSettings {
    /// Number of grid cells per side
    #[clap(short = 's', long, default_value_t = 100)]
    resolution: usize,

    /// Domain mask `h(x, y)`; points with `h ≤ 0` are admissible
    #[clap(long)]
    domain: Option<String>,
}

////////////////////////////////////////////////////////////////////////////////

fn compile(formula: &str, arity: Arity) -> Result<Field> {
    let f = Field::compile(formula, arity);
    match f.error() {
        Some(e) => Err(anyhow!("invalid formula {formula:?}: {e}")),
        None => Ok(f),
    }
}

fn compile_optional(s: Option<&str>) -> Result<Option<Field>> {
    s.map(|s| compile(s, Arity::Two)).transpose()
}

fn thread_pool(threads: Option<NonZeroUsize>) -> Result<Option<ThreadPool>> {
    Ok(match threads {
        Some(n) if n.get() == 1 => None,
        Some(n) => Some(ThreadPool::Custom(
            rayon::ThreadPoolBuilder::new()
                .num_threads(n.get())
                .build()?,
        )),
        None => Some(ThreadPool::Global),
    })
}

fn show(v: Option<f64>) -> String {
    v.map_or_else(|| "invalid".to_owned(), |v| format!("{v}"))
}

fn print_stats(stats: &GlobalStats) {
    println!("z_min    {}", show(stats.z_min));
    println!("z_max    {}", show(stats.z_max));
    println!("volume   {}", show(stats.volume));
    println!("mass     {}", show(stats.mass));
    match stats.centroid {
        Some(c) => println!("centroid ({}, {}, {})", c.x, c.y, c.z),
        None => println!("centroid undefined"),
    }
    println!("cells    {}", stats.cells);
}

/// Converts a grid into RGBA pixels, top row first
///
/// Invalid nodes and nodes outside the mask are transparent.
fn heightmap(grid: &SampleGrid, mask: Option<&SampleGrid>) -> Vec<u8> {
    let (lo, hi) = grid.z_range(mask).unwrap_or((0.0, 1.0));
    let scale = if hi > lo { 255.0 / (hi - lo) } else { 0.0 };
    (0..grid.height())
        .rev()
        .flat_map(|j| (0..grid.width()).map(move |i| (i, j)))
        .flat_map(|(i, j)| {
            let admissible = mask.is_none_or(|m| m.is_admissible(i, j));
            match grid.get(i, j) {
                Some(z) if admissible => {
                    let v = ((z - lo) * scale).round() as u8;
                    [v, v, v, 255]
                }
                _ => [0, 0, 0, 0],
            }
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .init();

    let args = Args::parse();
    let now = Instant::now();
    let field = compile(&args.formula, Arity::Three)?;
    info!("Compiled formula in {:?}", now.elapsed());

    let pool = thread_pool(args.threads)?;
    let threads = pool.as_ref();
    let start = Instant::now();

    match args.cmd {
        Command::Eval { x, y } => {
            let mut v = None;
            for _ in 0..args.n {
                v = field.eval(x, y, args.t);
            }
            println!("{}", show(v));
        }
        Command::Probe {
            x,
            y,
            step,
            constraint,
        } => {
            let g = compile_optional(constraint.as_deref())?;
            let h = step.unwrap_or_else(|| probe::default_step(args.range));
            let run = || probe::inspect(&field, g.as_ref(), x, y, args.t, h);
            let mut out = run();
            for _ in 1..args.n {
                out = run();
            }
            let p = &out.probe;
            let d = &p.derivatives;
            println!("value        {}", show(p.value));
            println!("fx, fy       {}, {}", show(d.fx), show(d.fy));
            println!(
                "fxx, fyy, fxy {}, {}, {}",
                show(d.fxx),
                show(d.fyy),
                show(d.fxy)
            );
            println!("discriminant {}", show(p.discriminant()));
            match p.kind() {
                Some(k) => println!("kind         {k}"),
                None => println!("kind         inconclusive"),
            }
            println!(
                "limit        {} (variance {}, {} samples, {})",
                show(p.limit.mean),
                show(p.limit.variance),
                p.limit.samples,
                if p.limit.consistent {
                    "consistent"
                } else {
                    "inconsistent"
                }
            );
            if let Some(l) = out.lagrange {
                println!("lambda       {}", show(l.lambda));
                println!("g(x, y)      {}", show(l.constraint));
            }
        }
        Command::Scan { grid } => {
            let mask = compile_optional(grid.domain.as_deref())?;
            let cfg = ScanConfig {
                range: args.range,
                resolution: grid.resolution,
                t: args.t,
                threads,
                ..Default::default()
            };
            let mut points = vec![];
            for _ in 0..args.n {
                points = cfg.run(&field, mask.as_ref());
            }
            for p in &points {
                let q = p.position;
                let kind = p.kind.to_string();
                println!("{kind:<7} ({}, {}, {})", q.x, q.y, q.z);
            }
            info!("Found {} points", points.len());
        }
        Command::Integrate {
            cells,
            density,
            domain,
        } => {
            let sigma = compile_optional(density.as_deref())?
                .unwrap_or_else(|| Field::constant(1.0));
            let mask = compile_optional(domain.as_deref())?;
            let cfg = IntegrateConfig {
                range: args.range,
                resolution: cells,
                t: args.t,
                threads,
            };
            let mut stats = GlobalStats::default();
            for _ in 0..args.n {
                stats = cfg.run(&field, &sigma, mask.as_ref());
            }
            print_stats(&stats);
        }
        Command::Contour {
            grid,
            levels,
            verbose,
        } => {
            let mask = compile_optional(grid.domain.as_deref())?;
            let cfg = SampleConfig {
                range: args.range,
                resolution: grid.resolution,
                t: args.t,
                threads,
            };
            let mut lines = vec![];
            let mut edge = vec![];
            for _ in 0..args.n {
                let g = cfg.run(&field);
                lines = contour::iso_lines(&g, levels, threads);
                edge = mask
                    .as_ref()
                    .map(|m| contour::boundary(&cfg.run(m)))
                    .unwrap_or_default();
            }
            let named = lines
                .iter()
                .map(|l| (format!("z = {}", l.level), &l.segments))
                .chain(
                    mask.is_some().then(|| ("boundary".to_owned(), &edge)),
                );
            for (name, segments) in named {
                let polylines = contour::polylines(segments);
                println!(
                    "{name}: {} segments, {} polylines",
                    segments.len(),
                    polylines.len()
                );
                if verbose {
                    for p in &polylines {
                        let pts: Vec<String> = p
                            .points
                            .iter()
                            .map(|v| format!("({}, {})", v.x, v.y))
                            .collect();
                        let end = if p.closed { " (closed)" } else { "" };
                        println!("  {}{end}", pts.join(" "));
                    }
                }
            }
        }
        Command::Heightmap { grid, out } => {
            let mask = compile_optional(grid.domain.as_deref())?;
            let cfg = SampleConfig {
                range: args.range,
                resolution: grid.resolution,
                t: args.t,
                threads,
            };
            let mut buffer = vec![];
            let mut size = (0, 0);
            for _ in 0..args.n {
                let g = cfg.run(&field);
                let m = mask.as_ref().map(|m| cfg.run(m));
                buffer = heightmap(&g, m.as_ref());
                size = (g.width(), g.height());
            }
            info!("Writing image to {out:?}");
            image::save_buffer(
                out,
                &buffer,
                u32::try_from(size.0)?,
                u32::try_from(size.1)?,
                image::ColorType::Rgba8,
            )?;
        }
    }

    info!(
        "Ran {}x at {:?} ms/iter",
        args.n,
        start.elapsed().as_micros() as f64 / 1000.0 / (args.n as f64)
    );
    Ok(())
}
