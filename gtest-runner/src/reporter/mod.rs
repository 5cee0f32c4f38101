// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporting progress and results of a run.
//!
//! Progress is reported through a [`ProgressSink`], which workers update concurrently as attempts
//! finish. Once the run is over, [`RunStats`] classifies the collected results and writes the
//! human-readable summary.

mod progress;
mod summary;

pub use progress::*;
pub use summary::*;
