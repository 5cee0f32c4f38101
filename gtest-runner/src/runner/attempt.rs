// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{errors::RetryCountParseError, list::TestCaseId};
use gtest_metadata::AttemptSummary;
use serde::Deserialize;
use std::{fmt, str::FromStr, time::Duration};

/// A single execution of a test case.
#[derive(Clone, Debug, PartialEq)]
pub struct Attempt {
    /// The test case that was run.
    pub test_case: TestCaseId,

    /// The exit code, or `None` if the process was killed or terminated by a signal.
    pub return_code: Option<i32>,

    /// The wall-clock time the attempt took.
    pub duration: Duration,

    /// The captured output. Invalid UTF-8 is replaced.
    pub output: String,

    /// True if the process was killed after running past its deadline.
    pub timed_out: bool,
}

impl Attempt {
    /// Returns true if the attempt exited with code 0.
    pub fn is_success(&self) -> bool {
        self.return_code == Some(0)
    }

    /// Converts this attempt into its serializable form.
    pub fn to_summary(&self) -> AttemptSummary {
        AttemptSummary {
            test_case: self.test_case.to_string(),
            return_code: self.return_code,
            duration: self.duration.as_secs_f64(),
            output: self.output.clone(),
            timed_out: self.timed_out,
        }
    }

    /// Converts a deserialized attempt back.
    ///
    /// Negative or non-finite durations are treated as zero.
    pub fn from_summary(summary: &AttemptSummary) -> Self {
        Self {
            test_case: TestCaseId::new(summary.test_case.clone()),
            return_code: summary.return_code,
            duration: Duration::try_from_secs_f64(summary.duration).unwrap_or_default(),
            output: summary.output.clone(),
            timed_out: summary.timed_out,
        }
    }
}

/// How a test case behaved across its attempts.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Verdict {
    /// Passed on the only attempt.
    Success,

    /// Failed at least once, then passed.
    Flaky,

    /// Failed on every attempt.
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Flaky => write!(f, "flaky"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// The attempts made for one test case, in the order they ran. Never empty.
#[derive(Clone, Debug, PartialEq)]
pub struct AttemptSequence {
    attempts: Vec<Attempt>,
}

impl AttemptSequence {
    /// Creates a new sequence, returning `None` if `attempts` is empty.
    pub fn new(attempts: Vec<Attempt>) -> Option<Self> {
        (!attempts.is_empty()).then_some(Self { attempts })
    }

    /// Returns the test case these attempts are for.
    pub fn test_case(&self) -> &TestCaseId {
        &self.last().test_case
    }

    /// Returns all attempts.
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Returns the number of attempts.
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// Returns the final attempt.
    pub fn last(&self) -> &Attempt {
        self.attempts
            .last()
            .expect("attempt sequences are never empty")
    }

    /// Classifies the sequence.
    ///
    /// Retries stop at the first pass, so a test case that passes on its first attempt is a
    /// success even if it would have failed on a rerun.
    pub fn verdict(&self) -> Verdict {
        let passed = self.attempts.iter().any(Attempt::is_success);
        match (self.attempts.len(), passed) {
            (0, _) => unreachable!("attempt sequences are never empty"),
            (_, false) => Verdict::Fail,
            (1, true) => Verdict::Success,
            (_, true) => Verdict::Flaky,
        }
    }

    /// Converts the attempts into their serializable form.
    pub fn to_summaries(&self) -> Vec<AttemptSummary> {
        self.attempts.iter().map(Attempt::to_summary).collect()
    }
}

/// The default maximum number of attempts per test case.
pub const DEFAULT_RETRY_COUNT: usize = 3;

/// The maximum number of attempts made for each test case.
///
/// Despite the name, which `run-test-cases` has always used, this counts the first attempt too:
/// a retry count of 1 runs each test case once.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(try_from = "usize")]
pub struct RetryPolicy {
    retry_count: usize,
}

impl RetryPolicy {
    /// Creates a new policy, which must allow at least one attempt.
    pub fn new(retry_count: usize) -> Result<Self, RetryCountParseError> {
        if retry_count == 0 {
            return Err(RetryCountParseError::new(
                retry_count.to_string(),
                "must be at least 1",
            ));
        }
        Ok(Self { retry_count })
    }

    /// Returns the maximum number of attempts.
    pub fn count(&self) -> usize {
        self.retry_count
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
        }
    }
}

impl TryFrom<usize> for RetryPolicy {
    type Error = RetryCountParseError;

    fn try_from(retry_count: usize) -> Result<Self, Self::Error> {
        Self::new(retry_count)
    }
}

impl FromStr for RetryPolicy {
    type Err = RetryCountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let retry_count = s
            .parse::<usize>()
            .map_err(|err| RetryCountParseError::new(s, err.to_string()))?;
        Self::new(retry_count)
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.retry_count)
    }
}
