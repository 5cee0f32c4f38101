// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `run-test-cases` failures.
///
/// The exit code does not depend on whether individual test cases passed: a run that produced
/// results always exits with [`OK`](Self::OK). Unknown/unexpected failures will always result in
/// exit code 1.
pub enum RunExitCode {}

impl RunExitCode {
    /// Test cases were run and results were collected, or there was nothing to run.
    pub const OK: i32 = 0;

    /// Test cases were discovered, but no results were collected from the worker pool.
    pub const NO_RESULTS: i32 = 1;

    /// A user issue happened while setting up a run, for example an invalid glob or config file.
    pub const SETUP_ERROR: i32 = 96;

    /// Listing the test cases of the executable produced an error.
    pub const TEST_LIST_CREATION_FAILED: i32 = 104;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
