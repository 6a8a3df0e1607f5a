// Fan-out of independent deferred units over a worker pool.

use super::deferred::{Deferred, TaskHandle};
use crate::error::{KpmError, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

/// Runs deferred units on a dedicated `rayon` pool (inline without the `rayon` feature).
///
/// Each unit gets its own result channel; handles come back in submission order. Cancelling
/// makes units that have not started yet resolve to [`KpmError::Cancelled`]; finished results
/// are kept.
pub struct ParallelDispatcher {
    #[cfg(feature = "rayon")]
    pool: rayon::ThreadPool,
    cancelled: Arc<AtomicBool>,
    next_id: AtomicUsize,
}

impl ParallelDispatcher {
    /// Pool with `num_threads` workers, one per logical CPU when `None`.
    pub fn new(num_threads: Option<usize>) -> Result<Self> {
        #[cfg(feature = "rayon")]
        {
            let threads = num_threads.unwrap_or_else(num_cpus::get).max(1);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("kpm-worker-{}", i))
                .panic_handler(|_| log::error!("deferred kpm unit panicked"))
                .build()
                .map_err(|e| KpmError::InvalidConfig(format!("cannot start worker pool: {}", e)))?;
            Ok(Self {
                pool,
                cancelled: Arc::new(AtomicBool::new(false)),
                next_id: AtomicUsize::new(0),
            })
        }
        #[cfg(not(feature = "rayon"))]
        {
            let _ = num_threads;
            Ok(Self {
                cancelled: Arc::new(AtomicBool::new(false)),
                next_id: AtomicUsize::new(0),
            })
        }
    }

    pub fn num_threads(&self) -> usize {
        #[cfg(feature = "rayon")]
        {
            self.pool.current_num_threads()
        }
        #[cfg(not(feature = "rayon"))]
        {
            1
        }
    }

    /// Queue one unit.
    pub fn submit<T: Send + 'static>(&self, unit: Deferred<T>) -> TaskHandle<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let label = unit.label().to_string();
        let (sender, receiver) = mpsc::channel();
        let cancelled = Arc::clone(&self.cancelled);
        let run = move || {
            let outcome = if cancelled.load(Ordering::Acquire) {
                Err(KpmError::Cancelled)
            } else {
                unit.compute()
            };
            // The handle may already be gone; nobody is waiting then.
            let _ = sender.send(outcome);
        };
        #[cfg(feature = "rayon")]
        self.pool.spawn(run);
        #[cfg(not(feature = "rayon"))]
        run();
        TaskHandle::new(id, label, receiver)
    }

    pub fn submit_all<T: Send + 'static>(&self, units: Vec<Deferred<T>>) -> Vec<TaskHandle<T>> {
        units.into_iter().map(|u| self.submit(u)).collect()
    }

    /// Submit every unit and wait for all of them; results are in submission order.
    pub fn run_all<T: Send + 'static>(&self, units: Vec<Deferred<T>>) -> Vec<Result<T>> {
        let count = units.len();
        let handles = self.submit_all(units);
        log::debug!("dispatched {} units on {} threads", count, self.num_threads());
        handles.into_iter().map(TaskHandle::wait).collect()
    }

    /// Units that have not started resolve to `Cancelled`.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Accept work again after [`ParallelDispatcher::cancel`].
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}
