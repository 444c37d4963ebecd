//! Types used in configuration structures

/// Thread pool to use for multithreaded analyses
///
/// Most users will use the global Rayon pool, but it's possible to provide your
/// own as well.
pub enum ThreadPool {
    /// User-provided pool
    Custom(rayon::ThreadPool),
    /// Global Rayon pool
    Global,
}

impl ThreadPool {
    /// Runs a function across the thread pool
    pub fn run<F: FnOnce() -> V + Send, V: Send>(&self, f: F) -> V {
        match self {
            ThreadPool::Custom(p) => p.install(f),
            ThreadPool::Global => f(),
        }
    }

    /// Returns the number of threads in the pool
    pub fn thread_count(&self) -> usize {
        match self {
            ThreadPool::Custom(p) => p.current_num_threads(),
            ThreadPool::Global => rayon::current_num_threads(),
        }
    }
}

/// Computes one value per row, optionally in parallel
///
/// `init` builds per-worker scratch data (typically a
/// [`FieldEval`](crate::FieldEval)); results are returned in row order
/// regardless of how the work was scheduled.
pub(crate) fn map_rows<T, S, I, F>(
    rows: usize,
    threads: Option<&ThreadPool>,
    init: I,
    f: F,
) -> Vec<T>
where
    T: Send,
    I: Fn() -> S + Sync + Send,
    F: Fn(&mut S, usize) -> T + Sync + Send,
{
    use rayon::prelude::*;
    match threads {
        None => {
            let mut s = init();
            (0..rows).map(|j| f(&mut s, j)).collect()
        }
        Some(p) => p.run(|| {
            (0..rows).into_par_iter().map_init(&init, |s, j| f(s, j)).collect()
        }),
    }
}
