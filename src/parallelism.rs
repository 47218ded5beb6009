//! Parallelism hints for split scoring and ensemble construction.

use std::time::{Duration, Instant};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Result, TreeError};

/// How much parallel work a build step may use.
///
/// `Parallel(n)` runs on a bounded rayon pool of `n` workers. `Parallel(0)` and
/// `Parallel(1)` behave like `Sequential`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Parallelism {
    #[default]
    Sequential,
    Parallel(usize),
}

impl Parallelism {
    /// - `0` → rayon's current thread count
    /// - `1` → sequential
    /// - `n > 1` → parallel with n threads
    pub fn from_threads(n_threads: usize) -> Self {
        match n_threads {
            0 => Self::Parallel(rayon::current_num_threads()),
            1 => Self::Sequential,
            n => Self::Parallel(n),
        }
    }

    #[inline]
    pub fn allows_parallel(self) -> bool {
        matches!(self, Self::Parallel(n) if n > 1)
    }

    #[inline]
    pub fn n_threads(self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Parallel(n) => n.max(1),
        }
    }

    /// A dedicated pool sized to this hint, or `None` when sequential.
    ///
    /// Every call builds a fresh pool; callers build once and share it.
    pub fn pool(self) -> Result<Option<ThreadPool>> {
        if !self.allows_parallel() {
            return Ok(None);
        }
        ThreadPoolBuilder::new()
            .num_threads(self.n_threads())
            .build()
            .map(Some)
            .map_err(|e| TreeError::ThreadPool(e.to_string()))
    }
}

/// Point in time after which a build gives up with [`TreeError::Timeout`].
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn after(limit: Duration) -> Self {
        Deadline {
            at: Instant::now() + limit,
            limit,
        }
    }

    pub fn check(&self) -> Result<()> {
        if Instant::now() >= self.at {
            return Err(TreeError::Timeout { limit: self.limit });
        }
        Ok(())
    }
}
