// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::{
    io::IsTerminal,
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

/// Receives progress updates while test cases are running.
///
/// Implementations are shared between worker threads, so every method takes `&self`.
pub trait ProgressSink: Send + Sync {
    /// Records that a retry was scheduled, adding one unit of work that wasn't known in advance.
    fn record_extra_unit(&self);

    /// Records that an attempt finished, and names the item as `label`.
    fn record_current(&self, label: &str);

    /// Returns the instant at which the run started.
    fn start(&self) -> Instant;

    /// Called periodically while waiting for results.
    fn tick(&self) {}

    /// Called once all results have been collected.
    fn finish(&self) {}
}

/// A [`ProgressSink`] that counts updates and displays nothing.
#[derive(Debug)]
pub struct NoopProgress {
    start: Instant,
    extra_units: AtomicUsize,
    completed: AtomicUsize,
}

impl NoopProgress {
    /// Creates a new sink, starting the clock now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            extra_units: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    /// Returns the number of times [`ProgressSink::record_extra_unit`] was called.
    pub fn extra_units(&self) -> usize {
        self.extra_units.load(Ordering::Relaxed)
    }

    /// Returns the number of times [`ProgressSink::record_current`] was called.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }
}

impl Default for NoopProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for NoopProgress {
    fn record_extra_unit(&self) {
        self.extra_units.fetch_add(1, Ordering::Relaxed);
    }

    fn record_current(&self, _label: &str) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    fn start(&self) -> Instant {
        self.start
    }
}

/// A [`ProgressSink`] that draws a progress bar on stderr.
///
/// The bar starts out with one unit per test case and grows as retries are scheduled. It is
/// hidden if stderr isn't a terminal, or if running under CI.
#[derive(Debug)]
pub struct ProgressBarSink {
    bar: ProgressBar,
    start: Instant,
}

impl ProgressBarSink {
    /// Creates a new progress bar for `test_count` test cases.
    pub fn new(test_count: usize) -> Self {
        let bar = ProgressBar::new(test_count as u64);
        // NOTE: set_draw_target must be called before enable_steady_tick to avoid a
        // spurious extra line from being printed as the draw target changes.
        if is_ci::uncached() || !std::io::stderr().is_terminal() {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            // The refresh rate is double the steady tick rate.
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(20));
        }

        bar.set_style(
            ProgressStyle::default_bar()
                .progress_chars("=> ")
                .template("{prefix:>12} [{elapsed_precise:>9}] [{wide_bar}] {pos}/{len}: {msg}")
                .expect("template is known to be valid"),
        );
        bar.set_prefix("Running");
        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            start: Instant::now(),
        }
    }

    /// Creates a progress bar that is never drawn.
    pub fn hidden(test_count: usize) -> Self {
        let bar =
            ProgressBar::with_draw_target(Some(test_count as u64), ProgressDrawTarget::hidden());
        Self {
            bar,
            start: Instant::now(),
        }
    }

    /// Returns the current position and length of the bar.
    pub fn position(&self) -> (u64, Option<u64>) {
        (self.bar.position(), self.bar.length())
    }
}

impl ProgressSink for ProgressBarSink {
    fn record_extra_unit(&self) {
        self.bar.inc_length(1);
    }

    fn record_current(&self, label: &str) {
        self.bar.inc(1);
        self.bar.set_message(label.to_owned());
    }

    fn start(&self) -> Instant {
        self.start
    }

    fn tick(&self) {
        self.bar.tick();
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
