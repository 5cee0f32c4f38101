// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{Attempt, AttemptSequence, RetryPolicy};
use crate::{
    list::TestCaseId,
    reporter::ProgressSink,
    test_command::{StderrMode, TestCommand},
};
use camino::Utf8PathBuf;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

/// Runs a single test case, retrying it on failure.
///
/// A `CaseRunner` is shared between all workers in a run.
pub struct CaseRunner {
    executable: Utf8PathBuf,
    filter_flag: String,
    current_dir: Option<Utf8PathBuf>,
    deadline: Option<Duration>,
    stderr: StderrMode,
    retry_policy: RetryPolicy,
    progress: Arc<dyn ProgressSink>,
}

impl CaseRunner {
    /// Creates a new runner for test cases in `executable`.
    ///
    /// Each attempt runs `<executable> <filter_flag>=<test case>`.
    pub fn new(
        executable: impl Into<Utf8PathBuf>,
        filter_flag: impl Into<String>,
        retry_policy: RetryPolicy,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            executable: executable.into(),
            filter_flag: filter_flag.into(),
            current_dir: None,
            deadline: None,
            stderr: StderrMode::default(),
            retry_policy,
            progress,
        }
    }

    /// Sets the working directory for every attempt.
    pub fn set_current_dir(&mut self, dir: impl Into<Utf8PathBuf>) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Sets the deadline for each attempt.
    pub fn set_deadline(&mut self, deadline: Option<Duration>) -> &mut Self {
        self.deadline = deadline;
        self
    }

    /// Sets where standard error from each attempt goes.
    pub fn set_stderr(&mut self, stderr: StderrMode) -> &mut Self {
        self.stderr = stderr;
        self
    }

    /// Runs `test_case` until it passes, or until the retry policy runs out.
    ///
    /// Progress is reported after every attempt. A failed attempt that will be retried also
    /// reports one extra unit of work.
    pub fn run_case(&self, test_case: TestCaseId) -> AttemptSequence {
        let retry_count = self.retry_policy.count();
        let mut attempts = Vec::with_capacity(retry_count);

        for retry in 0..retry_count {
            let attempt = self.run_attempt(&test_case);
            let passed = attempt.is_success();
            debug!(
                %test_case,
                retry,
                return_code = ?attempt.return_code,
                timed_out = attempt.timed_out,
                "attempt finished",
            );
            attempts.push(attempt);

            if !passed && retry + 1 != retry_count {
                self.progress.record_extra_unit();
            }
            if retry > 0 {
                self.progress.record_current(&format!("{test_case} - {retry}"));
            } else {
                self.progress.record_current(test_case.as_str());
            }

            if passed {
                break;
            }
        }

        // The retry policy always allows at least one attempt.
        AttemptSequence::new(attempts).expect("at least one attempt was made")
    }

    fn run_attempt(&self, test_case: &TestCaseId) -> Attempt {
        let mut command = TestCommand::new(
            &self.executable,
            [format!("{}={test_case}", self.filter_flag)],
        );
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command.stderr(self.stderr);
        let command_line = command.display().to_string();

        let start = Instant::now();
        let result = command.run_with_deadline(self.deadline);
        let duration = start.elapsed();

        match result {
            Ok(output) => Attempt {
                test_case: test_case.clone(),
                return_code: output.return_code,
                duration,
                output: String::from_utf8_lossy(&output.output).into_owned(),
                timed_out: output.timed_out,
            },
            Err(error) => {
                // Recorded as a failed attempt so that it's retried and reported like any other.
                warn!("failed to run `{command_line}`: {error}");
                Attempt {
                    test_case: test_case.clone(),
                    return_code: None,
                    duration,
                    output: format!("failed to run `{command_line}`: {error}"),
                    timed_out: false,
                }
            }
        }
    }
}
