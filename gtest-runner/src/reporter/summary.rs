// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    helpers::{percentage, plural},
    list::TestCaseId,
    runner::{ResultTable, Verdict},
};
use owo_colors::{OwoColorize, Style};
use std::{io, time::Duration};

/// Aggregate statistics for a finished run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunStats {
    /// Test cases that passed on the first attempt, sorted.
    pub success: Vec<TestCaseId>,

    /// Test cases that failed at least once and then passed, sorted.
    pub flaky: Vec<TestCaseId>,

    /// Test cases that failed on every attempt, sorted.
    pub fail: Vec<TestCaseId>,

    /// The number of attempts across all test cases.
    pub total_attempts: usize,

    /// The wall-clock time the run took.
    pub elapsed: Duration,
}

impl RunStats {
    /// Classifies every test case in `table`.
    pub fn new(table: &ResultTable, elapsed: Duration) -> Self {
        let mut stats = Self {
            success: Vec::new(),
            flaky: Vec::new(),
            fail: Vec::new(),
            total_attempts: 0,
            elapsed,
        };

        // BTreeMap iteration is sorted, so each list is too.
        for (test_case, attempts) in table {
            stats.total_attempts += attempts.attempt_count();
            let bucket = match attempts.verdict() {
                Verdict::Success => &mut stats.success,
                Verdict::Flaky => &mut stats.flaky,
                Verdict::Fail => &mut stats.fail,
            };
            bucket.push(test_case.clone());
        }

        stats
    }

    /// Returns the number of test cases that produced results.
    pub fn total(&self) -> usize {
        self.success.len() + self.flaky.len() + self.fail.len()
    }

    /// Returns the number of attempts per second of wall-clock time.
    pub fn attempts_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_attempts as f64 / secs
        } else {
            0.0
        }
    }

    /// Writes the counts and percentages of each verdict, followed by the timing line.
    pub fn write_summary(
        &self,
        writer: &mut dyn io::Write,
        styles: &SummaryStyles,
    ) -> io::Result<()> {
        let total = self.total();
        for (heading, count, style) in [
            ("Success:", self.success.len(), styles.success),
            ("Flaky:  ", self.flaky.len(), styles.flaky),
            ("Fail:   ", self.fail.len(), styles.fail),
        ] {
            writeln!(
                writer,
                "{} {count:4} {:5.2}%",
                heading.style(style),
                percentage(count, total),
            )?;
        }

        writeln!(
            writer,
            "{:.1}s Done running {} tests with {} executions. {:.1} test/s",
            self.elapsed.as_secs_f64(),
            total,
            self.total_attempts,
            self.attempts_per_second(),
        )
    }

    /// Writes the output of the last attempt of every failed test case, then a line for each
    /// flaky test case.
    pub fn write_failure_dump(
        &self,
        table: &ResultTable,
        writer: &mut dyn io::Write,
        styles: &SummaryStyles,
    ) -> io::Result<()> {
        for test_case in &self.fail {
            if let Some(attempts) = table.get(test_case) {
                writeln!(writer, "{}", attempts.last().output)?;
            }
        }

        for test_case in &self.flaky {
            if let Some(attempts) = table.get(test_case) {
                let count = attempts.attempt_count();
                writeln!(
                    writer,
                    "{} is flaky (tried {count} {})",
                    test_case.style(styles.flaky),
                    plural::times_str(count),
                )?;
            }
        }

        Ok(())
    }
}

/// Styles used when writing the summary.
#[derive(Clone, Debug, Default)]
pub struct SummaryStyles {
    success: Style,
    flaky: Style,
    fail: Style,
}

impl SummaryStyles {
    /// Returns styles that produce plain, uncolored output.
    pub fn plain() -> Self {
        Self::default()
    }

    /// Enables colors.
    pub fn colorize(&mut self) {
        self.success = Style::new().green().bold();
        self.flaky = Style::new().magenta().bold();
        self.fail = Style::new().red().bold();
    }
}
