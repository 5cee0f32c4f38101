// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for `run-test-cases`.
//!
//! Configuration is layered: the embedded defaults in [`RunTestCasesConfig::DEFAULT_CONFIG`] come
//! first, followed by `.config/run-test-cases.toml` (or an explicitly passed file). Command-line
//! options are applied on top by the caller.

mod imp;
mod jobs;

pub use imp::*;
pub use jobs::*;
