// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test runner.
//!
//! The main structure in this module is [`TestRunner`]. It submits one unit of work per test case
//! to a [`WorkerPool`], where a [`CaseRunner`] runs the test case until it passes or runs out of
//! attempts. Results come back to the calling thread as values, which is the only place the
//! [`ResultTable`] is built.

mod attempt;
mod executor;
mod imp;
mod pool;

pub use attempt::*;
pub use executor::*;
pub use imp::*;
pub use pool::*;
