//! Fixed pool of worker threads that record command lists in parallel.

use crate::error::GraphicsError;

/// A fixed-size pool of recording workers.
///
/// # Example
///
/// ```
/// use deferred_graphics::WorkerPool;
///
/// let pool = WorkerPool::new(4).unwrap();
///
/// let mut results = vec![0u32; 4];
/// pool.scope(|s| {
///     for (i, slot) in results.iter_mut().enumerate() {
///         s.spawn(move || {
///             *slot = (i as u32) * 10;
///         });
///     }
/// });
/// assert_eq!(results, vec![0, 10, 20, 30]);
/// ```
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    num_threads: usize,
}

impl WorkerPool {
    /// Creates a pool with the given number of worker threads (at least 1).
    pub fn new(num_threads: usize) -> Result<Self, GraphicsError> {
        let num_threads = num_threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("recorder-worker-{i}"))
            .build()
            .map_err(|e| {
                GraphicsError::InitializationFailed(format!("failed to build worker pool: {e}"))
            })?;

        log::debug!("Worker pool started with {} threads", num_threads);

        Ok(Self { pool, num_threads })
    }

    /// Creates a pool sized to the number of available CPU cores.
    pub fn default_threads() -> Result<Self, GraphicsError> {
        Self::new(default_thread_count())
    }

    /// Number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Executes tasks within a scoped context.
    ///
    /// All tasks spawned within the closure complete before this method
    /// returns, so tasks can borrow local variables.
    pub fn scope<'scope, F>(&self, f: F)
    where
        F: for<'a> FnOnce(&Scope<'a, 'scope>) + Send,
    {
        self.pool.scope(|s| {
            let scope = Scope { inner: s };
            f(&scope);
        });
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.num_threads)
            .finish()
    }
}

/// A scope for spawning tasks that may borrow from the enclosing stack frame.
pub struct Scope<'a, 'scope> {
    inner: &'a rayon::Scope<'scope>,
}

impl<'scope> Scope<'_, 'scope> {
    /// Spawns a task on a worker thread.
    pub fn spawn<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'scope,
    {
        self.inner.spawn(move |_| f());
    }
}

/// Number of available CPU cores, at least 1.
pub fn default_thread_count() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}
