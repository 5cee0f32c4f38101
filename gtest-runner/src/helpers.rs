// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for gtest-runner.

use std::process::ExitStatus;

/// Utilities for pluralizing various words based on count.
pub(crate) mod plural {
    /// Returns "test case" if `count` is 1, otherwise "test cases".
    pub(crate) fn test_cases_str(count: usize) -> &'static str {
        if count == 1 { "test case" } else { "test cases" }
    }

    /// Returns "time" if `count` is 1, otherwise "times".
    pub(crate) fn times_str(count: usize) -> &'static str {
        if count == 1 { "time" } else { "times" }
    }
}

/// Describes how a process exited, for error messages.
pub(crate) fn display_exit_status(exit_status: ExitStatus) -> String {
    match exit_status.code() {
        Some(code) => format!("exited with code {code}"),
        None => format!("terminated abnormally ({exit_status})"),
    }
}

/// Returns `part` as a percentage of `total`, or 0 if `total` is 0.
pub(crate) fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}
