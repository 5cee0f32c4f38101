// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to the machine-readable results written by `run-test-cases`.
//!
//! After every run, `run-test-cases` writes a `<executable>.run_test_cases` file next to the test
//! binary, unless `--no-dump` is passed. The file can be read back with
//! [`ResultTableSummary::parse_json`].

mod exit_codes;
mod summary;

pub use exit_codes::*;
pub use summary::*;
