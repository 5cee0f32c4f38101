// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filtering the list of test cases.
//!
//! A [`TestFilterBuilder`] combines the three kinds of filtering applied to a discovered list:
//! shard partitioning, name prefix exclusion and glob whitelists/blacklists.

use crate::{errors::TestFilterBuildError, list::TestCaseId, partition::ShardSpec};

/// Prefixes that mark a fixture or case as disabled by default.
pub const DISABLED_PREFIX: &str = "DISABLED_";

/// Prefixes that mark a fixture or case as known to fail.
pub const FAILS_PREFIX: &str = "FAILS_";

/// Prefixes that mark a fixture or case as known to be flaky.
pub const FLAKY_PREFIX: &str = "FLAKY_";

/// Excludes test cases based on the gtest naming conventions for disabled, failing and flaky
/// tests.
///
/// A test case is excluded if either its fixture or its case name starts with one of the
/// prefixes, unless the corresponding `include_` flag is set. The default excludes all three.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NamePrefixFilter {
    /// Run tests prefixed with `DISABLED_`.
    pub include_disabled: bool,

    /// Run tests prefixed with `FAILS_`.
    pub include_fails: bool,

    /// Run tests prefixed with `FLAKY_`.
    pub include_flaky: bool,
}

impl NamePrefixFilter {
    /// Returns true if this test case should be dropped.
    pub fn is_excluded(&self, test_case: &TestCaseId) -> bool {
        let has_prefix = |prefix: &str| {
            test_case.fixture().starts_with(prefix) || test_case.case().starts_with(prefix)
        };

        (!self.include_disabled && has_prefix(DISABLED_PREFIX))
            || (!self.include_fails && has_prefix(FAILS_PREFIX))
            || (!self.include_flaky && has_prefix(FLAKY_PREFIX))
    }

    /// Drops excluded test cases, preserving the order of the rest.
    pub fn exclude_by_name_prefix(&self, tests: Vec<TestCaseId>) -> Vec<TestCaseId> {
        tests
            .into_iter()
            .filter(|test_case| !self.is_excluded(test_case))
            .collect()
    }
}

/// A shell-style glob matched against full test case names.
///
/// `*` and `?` match any character including `.` and `/`, and `[...]` is the only form of
/// escaping.
///
/// We do not use `globset::GlobMatcher` directly because it has path-like semantics, so we use
/// regexes directly.
#[derive(Clone, Debug)]
pub struct GlobPattern {
    glob_str: String,
    regex: regex::bytes::Regex,
}

impl GlobPattern {
    /// Compiles a new glob.
    pub fn new(glob_str: impl Into<String>) -> Result<Self, TestFilterBuildError> {
        let glob_str = glob_str.into();
        let glob = globset::GlobBuilder::new(&glob_str)
            // Only allow escapes via [].
            .backslash_escape(false)
            .empty_alternates(true)
            .build()
            .map_err(|error| TestFilterBuildError::InvalidGlob {
                pattern: glob_str.clone(),
                error,
            })?;

        let regex = regex::bytes::Regex::new(glob.regex()).map_err(|error| {
            TestFilterBuildError::RegexError {
                pattern: glob_str.clone(),
                message: error.to_string(),
            }
        })?;

        Ok(Self { glob_str, regex })
    }

    /// Returns the glob string.
    pub fn as_str(&self) -> &str {
        &self.glob_str
    }

    /// Returns true if this glob matches the whole of `s`.
    pub fn is_match(&self, s: &str) -> bool {
        self.regex.is_match(s.as_bytes())
    }
}

/// Drops test cases matching any blacklist glob then, if the whitelist is non-empty, keeps only
/// test cases matching at least one whitelist glob.
pub fn apply_glob_filters(
    tests: Vec<TestCaseId>,
    whitelist: &[GlobPattern],
    blacklist: &[GlobPattern],
) -> Vec<TestCaseId> {
    tests
        .into_iter()
        .filter(|test_case| {
            !blacklist
                .iter()
                .any(|glob| glob.is_match(test_case.as_str()))
        })
        .filter(|test_case| {
            whitelist.is_empty()
                || whitelist
                    .iter()
                    .any(|glob| glob.is_match(test_case.as_str()))
        })
        .collect()
}

/// A complete set of filters applied to a discovered list of test cases.
#[derive(Clone, Debug)]
pub struct TestFilterBuilder {
    whitelist: Vec<GlobPattern>,
    blacklist: Vec<GlobPattern>,
    prefix_filter: NamePrefixFilter,
    shard: Option<ShardSpec>,
}

impl TestFilterBuilder {
    /// Creates a new filter set, compiling the given globs.
    pub fn new(
        whitelist: impl IntoIterator<Item = impl Into<String>>,
        blacklist: impl IntoIterator<Item = impl Into<String>>,
        prefix_filter: NamePrefixFilter,
        shard: Option<ShardSpec>,
    ) -> Result<Self, TestFilterBuildError> {
        let whitelist = whitelist
            .into_iter()
            .map(GlobPattern::new)
            .collect::<Result<Vec<_>, _>>()?;
        let blacklist = blacklist
            .into_iter()
            .map(GlobPattern::new)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            whitelist,
            blacklist,
            prefix_filter,
            shard,
        })
    }

    /// Creates a filter set with no globs or sharding, and the default name prefix exclusions.
    pub fn default_set() -> Self {
        Self {
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            prefix_filter: NamePrefixFilter::default(),
            shard: None,
        }
    }

    /// Returns the shard this filter set selects, if any.
    pub fn shard(&self) -> Option<ShardSpec> {
        self.shard
    }

    /// Applies the blacklist and whitelist globs.
    pub fn apply_glob_filters(&self, tests: Vec<TestCaseId>) -> Vec<TestCaseId> {
        apply_glob_filters(tests, &self.whitelist, &self.blacklist)
    }

    /// Applies every filter in order: shard, then name prefixes, then globs.
    ///
    /// Sharding happens first so that every shard of a run sees the same partitioning regardless
    /// of the other filters.
    pub fn filter(&self, tests: Vec<TestCaseId>) -> FilteredTestCases {
        let discovered = tests.len();

        let tests = match self.shard {
            Some(shard) => shard.apply(tests),
            None => tests,
        };
        let after_shard = tests.len();

        let tests = self.prefix_filter.exclude_by_name_prefix(tests);
        let after_prefix = tests.len();

        let test_cases = self.apply_glob_filters(tests);

        FilteredTestCases {
            counts: FilterCounts {
                discovered,
                outside_shard: discovered - after_shard,
                name_prefix: after_shard - after_prefix,
                glob: after_prefix - test_cases.len(),
            },
            test_cases,
        }
    }
}

/// The result of [`TestFilterBuilder::filter`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FilteredTestCases {
    /// The test cases that passed every filter, in discovery order.
    pub test_cases: Vec<TestCaseId>,

    /// How many test cases each filter dropped.
    pub counts: FilterCounts,
}

/// How many test cases were dropped at each filtering stage.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FilterCounts {
    /// The number of test cases before filtering.
    pub discovered: usize,

    /// Dropped because they belong to a different shard.
    pub outside_shard: usize,

    /// Dropped because of a `DISABLED_`, `FAILS_` or `FLAKY_` prefix.
    pub name_prefix: usize,

    /// Dropped by the blacklist or whitelist.
    pub glob: usize,
}

impl FilterCounts {
    /// Returns the total number of test cases dropped.
    pub fn total_skipped(&self) -> usize {
        self.outside_shard + self.name_prefix + self.glob
    }
}
