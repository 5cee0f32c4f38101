// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support for discovering, parsing and filtering the test cases in a gtest executable.
//!
//! The main data structures in this module are:
//! * [`TestCaseId`], the `Fixture.Case` name of a single runnable test case
//! * [`TestListCommand`], which runs an executable in its listing mode
//! * [`TestList`], the ordered and filtered list of test cases to run

mod test_case_id;
mod test_list;

pub use test_case_id::*;
pub use test_list::*;
