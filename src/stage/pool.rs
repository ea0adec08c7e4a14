//! Bounded parallel map over OS threads.
//!
//! Items are queued on a crossbeam channel and pulled by at most `limit`
//! scoped workers. Under [`FailurePolicy::FailFast`] the first error stops
//! further dispatch; items already running are allowed to finish.

use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// What a failed item does to the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop dispatching new items after the first failure.
    #[default]
    FailFast,
    /// Run every item and report failures individually.
    KeepGoing,
}

/// Results of a [`parallel_map`] run.
#[derive(Debug)]
pub struct PoolResults<R> {
    /// `(item index, result)` in completion order.
    pub completed: Vec<(usize, Result<R>)>,
    /// Items never started because the batch halted.
    pub not_started: usize,
}

impl<R> PoolResults<R> {
    /// Successful values sorted by item index.
    pub fn into_ordered(self) -> Result<Vec<R>> {
        let mut completed = self.completed;
        completed.sort_by_key(|(index, _)| *index);
        completed.into_iter().map(|(_, result)| result).collect()
    }
}

/// Apply `op` to every item with at most `limit` running at once.
///
/// `op` receives the item's index in `items`. A panic in `op` propagates to
/// the caller once all workers have stopped.
pub fn parallel_map<T, R, F>(
    items: Vec<T>,
    limit: usize,
    policy: FailurePolicy,
    op: F,
) -> PoolResults<R>
where
    T: Send,
    R: Send,
    F: Fn(usize, T) -> Result<R> + Sync,
{
    let total = items.len();
    if total == 0 {
        return PoolResults {
            completed: Vec::new(),
            not_started: 0,
        };
    }

    let (job_tx, job_rx) = crossbeam_channel::bounded(total);
    for job in items.into_iter().enumerate() {
        if job_tx.send(job).is_err() {
            break;
        }
    }
    drop(job_tx);

    let (result_tx, result_rx) = crossbeam_channel::unbounded();
    let halted = AtomicBool::new(false);
    let workers = limit.clamp(1, total);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let halted = &halted;
            let op = &op;
            scope.spawn(move || {
                while let Ok((index, item)) = job_rx.recv() {
                    if halted.load(Ordering::SeqCst) {
                        break;
                    }
                    let result = op(index, item);
                    if result.is_err() && policy == FailurePolicy::FailFast {
                        halted.store(true, Ordering::SeqCst);
                    }
                    if result_tx.send((index, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let completed: Vec<(usize, Result<R>)> = result_rx.try_iter().collect();
    let not_started = total - completed.len();
    PoolResults {
        completed,
        not_started,
    }
}
