// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{errors::TestRunnerBuildError, reporter::ProgressSink};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::time::Duration;
use tracing::error;

/// Builds the thread pool that test cases run on.
///
/// A panicking unit of work is logged and doesn't bring down the process. Its result is simply
/// missing from [`WorkerPool::collect_all`].
pub fn build_thread_pool(jobs: usize) -> Result<ThreadPool, TestRunnerBuildError> {
    ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .thread_name(|idx| format!("run-test-cases-worker-{idx}"))
        .panic_handler(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("(non-string payload)");
            error!("worker panicked: {message}");
        })
        .build()
        .map_err(TestRunnerBuildError::ThreadPool)
}

/// Fans units of work out to a thread pool and collects their results.
///
/// Each unit of work sends its result back over a channel. Only the thread calling
/// [`collect_all`](Self::collect_all) ever sees the results, so no state is shared between
/// workers.
#[derive(Debug)]
pub struct WorkerPool<'pool, T> {
    pool: &'pool ThreadPool,
    sender: Sender<T>,
    receiver: Receiver<T>,
    submitted: usize,
}

impl<'pool, T: Send + 'static> WorkerPool<'pool, T> {
    /// Creates a new worker pool backed by `pool`.
    pub fn new(pool: &'pool ThreadPool) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            pool,
            sender,
            receiver,
            submitted: 0,
        }
    }

    /// Queues a unit of work. It runs as soon as a worker is idle.
    pub fn submit<F>(&mut self, work: F)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let sender = self.sender.clone();
        self.pool.spawn(move || {
            // The receiver only goes away once collect_all has returned, at which point nobody
            // is interested in the result.
            let _ = sender.send(work());
        });
        self.submitted += 1;
    }

    /// Returns the number of units of work submitted so far.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Blocks until every submitted unit of work has finished, returning their results in
    /// completion order.
    ///
    /// `progress` is ticked every `poll_interval` while waiting.
    pub fn collect_all(self, progress: &dyn ProgressSink, poll_interval: Duration) -> Vec<T> {
        let Self {
            sender,
            receiver,
            submitted,
            ..
        } = self;
        // Once every worker is done with its clone, the channel disconnects.
        drop(sender);

        let mut results = Vec::with_capacity(submitted);
        loop {
            match receiver.recv_timeout(poll_interval) {
                Ok(result) => results.push(result),
                Err(RecvTimeoutError::Timeout) => progress.tick(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        results
    }
}
