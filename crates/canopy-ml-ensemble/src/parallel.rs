//! Parallel execution policy for ensemble fits.
//!
//! Thread counts follow the convention `0` = all cores, `1` = sequential,
//! `n` = exactly `n` worker threads.

use rayon::iter::{IntoParallelIterator, ParallelIterator};

/// Whether parallel execution is allowed inside the current fit call.
///
/// The flag is decided once at the model API level and passed down; inner
/// components never manage thread pools themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    Sequential,
    Parallel,
}

impl Parallelism {
    /// Interprets a thread-count parameter.
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    /// Maps `f` over `iter`, on the rayon pool when parallel. Output order
    /// matches input order in both modes.
    #[inline]
    pub fn maybe_par_map<T, B, I, F>(self, iter: I, f: F) -> Vec<B>
    where
        T: Send,
        B: Send,
        I: IntoIterator<Item = T> + IntoParallelIterator<Item = T>,
        F: Fn(T) -> B + Sync + Send,
    {
        if self.is_parallel() {
            iter.into_par_iter().map(f).collect()
        } else {
            iter.into_iter().map(f).collect()
        }
    }
}

/// Runs `f` under a thread pool sized per `n_threads`.
///
/// Members are seeded before dispatch, so sequential execution produces the
/// same model; a failed pool build falls back to it rather than aborting.
pub fn run_with_threads<T: Send>(n_threads: usize, f: impl FnOnce(Parallelism) -> T + Send) -> T {
    match Parallelism::from_threads(n_threads) {
        Parallelism::Sequential => f(Parallelism::Sequential),
        Parallelism::Parallel => {
            match rayon::ThreadPoolBuilder::new().num_threads(n_threads).build() {
                Ok(pool) => pool.install(|| f(Parallelism::Parallel)),
                Err(_) => f(Parallelism::Sequential),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_threads() {
        assert!(!Parallelism::from_threads(1).is_parallel());
        assert!(Parallelism::from_threads(2).is_parallel());
        assert!(Parallelism::from_threads(8).is_parallel());
    }

    #[test]
    fn test_maybe_par_map_preserves_order() {
        let seq = Parallelism::Sequential.maybe_par_map(0..64usize, |i| i * i);
        let par = Parallelism::Parallel.maybe_par_map(0..64usize, |i| i * i);
        assert_eq!(seq, par);
    }

    #[test]
    fn test_run_with_threads_returns_value() {
        assert_eq!(run_with_threads(1, |_| 7), 7);
        assert_eq!(run_with_threads(2, |_| 7), 7);
    }
}
