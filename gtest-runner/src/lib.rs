// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for `run-test-cases`.
//!
//! The basic flow is:
//!
//! 1. [`list::TestList`] runs the test executable in its listing mode, parses the fixture/case
//!    tree, and filters the result.
//! 2. [`runner::TestRunner`] fans the surviving test cases out over a worker pool. Each worker
//!    runs a [`runner::CaseRunner`], which executes one test case in its own process (see
//!    [`test_command`]) and retries it on failure.
//! 3. The attempts are collected on the calling thread, classified as success, flaky, or fail,
//!    summarized, and handed to a [`record::ResultSink`].

pub mod config;
pub mod errors;
mod helpers;
pub mod list;
pub mod partition;
pub mod pipe;
pub mod record;
pub mod reporter;
pub mod runner;
pub mod test_command;
pub mod test_filter;
