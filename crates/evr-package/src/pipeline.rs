//! Parallel work with in-order delivery
//!
//! A dispatcher thread walks the jobs, creating a one-shot result channel per
//! job and queueing its receiver *before* spawning the work on the rayon
//! pool. The calling thread drains that queue in FIFO order, blocking on
//! each receiver in turn, so results reach `collect` in job order whatever
//! order the tasks finish in. The queue's bound limits how far the
//! dispatcher runs ahead of the collector.

use crate::error::{PackageError, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, mpsc};

/// Run `work` over `jobs` in parallel and feed the results to `collect` in
/// job order.
///
/// The first error from a task or from `collect` stops dispatching and is
/// returned. Tasks already spawned run to completion and their results are
/// dropped.
pub(crate) fn run_ordered<I, J, T, W, C>(
    jobs: I,
    lookahead: usize,
    work: W,
    mut collect: C,
) -> Result<()>
where
    I: IntoIterator<Item = J>,
    I::IntoIter: Send,
    J: Send + 'static,
    T: Send + 'static,
    W: Fn(J) -> Result<T> + Send + Sync + 'static,
    C: FnMut(T) -> Result<()>,
{
    let work = Arc::new(work);
    let (queue_tx, queue_rx) = mpsc::sync_channel::<mpsc::Receiver<Result<T>>>(lookahead.max(1));
    let jobs = jobs.into_iter();

    std::thread::scope(|scope| {
        scope.spawn(move || {
            for job in jobs {
                let (tx, rx) = mpsc::sync_channel(1);
                if queue_tx.send(rx).is_err() {
                    // Collector stopped
                    break;
                }
                let work = Arc::clone(&work);
                rayon::spawn(move || {
                    // A panicking task drops `tx` unsent
                    if let Ok(result) = panic::catch_unwind(AssertUnwindSafe(|| work(job))) {
                        let _ = tx.send(result);
                    }
                });
            }
        });

        // Owned here so an early return unblocks the dispatcher
        let queue_rx = queue_rx;
        for (position, rx) in queue_rx.iter().enumerate() {
            let result = rx
                .recv()
                .map_err(|_| PackageError::WorkerLost(position as u32))?;
            collect(result?)?;
        }
        Ok(())
    })
}
