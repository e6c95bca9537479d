//! Caller-owned worker pool for metadata fetches.
//!
//! Workers are scoped to one [`WorkerPool::run`] call, so nothing outlives
//! the load that spawned it. The first failing task stops the others from
//! picking up more work; running tasks see the stop through their
//! [`CancelToken`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tessera_common::error::{MetadataError, TesseraError, TesseraResult};

static NEVER_CANCELLED: AtomicBool = AtomicBool::new(false);

/// Cooperative stop signal handed to every task.
#[derive(Debug, Clone, Copy)]
pub struct CancelToken<'a> {
    pool: &'a AtomicBool,
    load: &'a AtomicBool,
    deadline: Option<Instant>,
}

impl CancelToken<'static> {
    /// A token that never fires, for fetches outside a pool.
    pub fn detached() -> Self {
        Self {
            pool: &NEVER_CANCELLED,
            load: &NEVER_CANCELLED,
            deadline: None,
        }
    }
}

impl CancelToken<'_> {
    pub fn is_cancelled(&self) -> bool {
        self.pool.load(Ordering::Acquire)
            || self.load.load(Ordering::Acquire)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// `Err(Cancelled)` once the token has fired.
    pub fn check(&self) -> TesseraResult<()> {
        if self.is_cancelled() {
            Err(MetadataError::Cancelled.into())
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
pub struct WorkerPool {
    size: usize,
    cancelled: AtomicBool,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Ask running and future loads to stop. Tasks already running finish
    /// their current step.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Accept work again after [`cancel`](Self::cancel).
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }

    /// Run `tasks` on up to `size` workers and return their results in task
    /// order. The first task error is returned as is; a stop without one is
    /// `Cancelled` or `Timeout`.
    pub fn run<T, F>(&self, tasks: Vec<F>, timeout: Option<Duration>) -> TesseraResult<Vec<T>>
    where
        T: Send,
        F: FnOnce(&CancelToken<'_>) -> TesseraResult<T> + Send,
    {
        if self.is_cancelled() {
            return Err(MetadataError::Cancelled.into());
        }
        let total = tasks.len();
        if total == 0 {
            return Ok(Vec::new());
        }
        let deadline = timeout.map(|t| Instant::now() + t);
        let queue: Mutex<VecDeque<(usize, F)>> = Mutex::new(tasks.into_iter().enumerate().collect());
        let results: Mutex<Vec<Option<T>>> = Mutex::new((0..total).map(|_| None).collect());
        let first_error: Mutex<Option<TesseraError>> = Mutex::new(None);
        let failed = AtomicBool::new(false);
        let workers = self.size.min(total);

        let (queue, results_ref, first_error_ref, failed_ref) =
            (&queue, &results, &first_error, &failed);
        let pool_cancelled = &self.cancelled;
        let panicked = thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    s.spawn(move || {
                        let token = CancelToken {
                            pool: pool_cancelled,
                            load: failed_ref,
                            deadline,
                        };
                        while !token.is_cancelled() {
                            let Some((index, task)) = queue.lock().pop_front() else {
                                break;
                            };
                            match task(&token) {
                                Ok(value) => results_ref.lock()[index] = Some(value),
                                Err(e) => {
                                    first_error_ref.lock().get_or_insert(e);
                                    failed_ref.store(true, Ordering::Release);
                                    break;
                                }
                            }
                        }
                    })
                })
                .collect();
            handles
                .into_iter()
                .filter_map(|h| h.join().err())
                .map(|payload| panic_message(payload.as_ref()))
                .next()
        });

        if let Some(message) = panicked {
            return Err(MetadataError::WorkerPanicked(message).into());
        }
        let timed_out = || {
            !self.is_cancelled() && deadline.is_some_and(|d| Instant::now() >= d)
        };
        let timeout_ms = timeout.map(|t| t.as_millis() as u64).unwrap_or_default();
        match first_error.into_inner() {
            Some(TesseraError::Metadata(MetadataError::Cancelled)) if timed_out() => {
                return Err(MetadataError::Timeout(timeout_ms).into());
            }
            Some(e) => return Err(e),
            None => {}
        }
        let results = results.into_inner();
        if results.iter().any(Option::is_none) {
            if timed_out() {
                return Err(MetadataError::Timeout(timeout_ms).into());
            }
            return Err(MetadataError::Cancelled.into());
        }
        Ok(results.into_iter().flatten().collect())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
