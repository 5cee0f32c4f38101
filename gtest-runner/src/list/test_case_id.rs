// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, fmt};

/// The name of a single test case, in the form `Fixture.Case`.
///
/// The fixture part is stored exactly as the executable printed it, including its trailing `.`.
/// Parameterized fixtures may carry extra `/`-separated components.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TestCaseId(String);

impl TestCaseId {
    /// Creates a new test case ID from its full name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the full name of the test case.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the fixture name, without the separating `.`.
    ///
    /// If the name has no `.`, the whole name is returned.
    pub fn fixture(&self) -> &str {
        self.split().0
    }

    /// Returns the case name, after the first `.`.
    ///
    /// If the name has no `.`, this is empty.
    pub fn case(&self) -> &str {
        self.split().1
    }

    fn split(&self) -> (&str, &str) {
        self.0.split_once('.').unwrap_or((&self.0, ""))
    }
}

impl fmt::Display for TestCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TestCaseId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TestCaseId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TestCaseId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TestCaseId {
    fn from(name: String) -> Self {
        Self(name)
    }
}
