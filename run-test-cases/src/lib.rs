// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs the test cases of a gtest executable in parallel.
//!
//! Every test case runs in its own process. Failing test cases are retried, so that flaky tests
//! can be told apart from consistently failing ones. The core of the runner lives in the
//! `gtest-runner` crate; this crate is the command-line interface on top of it.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{Color, OutputContext, StderrStyles};
