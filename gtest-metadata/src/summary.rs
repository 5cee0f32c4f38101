// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One execution of a single test case, as recorded in a results file.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AttemptSummary {
    /// The test case that was executed, in the form `Fixture.Case`.
    pub test_case: String,

    /// The exit code of the process.
    ///
    /// `None` if the process was killed because it ran past its deadline, or if it was
    /// terminated by a signal.
    #[serde(rename = "returncode")]
    pub return_code: Option<i32>,

    /// The wall-clock duration of the execution, in seconds.
    pub duration: f64,

    /// The captured output of the process.
    pub output: String,

    /// True if the process was killed because it ran past its deadline.
    #[serde(default)]
    pub timed_out: bool,
}

impl AttemptSummary {
    /// Returns true if this execution exited with code 0.
    pub fn is_success(&self) -> bool {
        self.return_code == Some(0)
    }
}

/// The full set of results for a run, keyed by test case.
///
/// Each value lists every execution of that test case, in the order they happened.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ResultTableSummary {
    /// Attempts by test case.
    pub test_cases: BTreeMap<String, Vec<AttemptSummary>>,
}

impl ResultTableSummary {
    /// Parse JSON output from a results file.
    pub fn parse_json(json: impl AsRef<str>) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json.as_ref())
    }

    /// Serializes this summary as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Returns the total number of attempts across all test cases.
    pub fn attempt_count(&self) -> usize {
        self.test_cases.values().map(|attempts| attempts.len()).sum()
    }
}
