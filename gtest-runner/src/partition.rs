// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Splitting a list of test cases into contiguous shards.
//!
//! Shards are 0-indexed: `0/3`, `1/3` and `2/3` together cover every test case exactly once.

use crate::errors::PartitionParseError;
use std::{fmt, ops::Range, str::FromStr};

/// Selects one of `shards` contiguous slices of an ordered list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ShardSpec {
    index: usize,
    shards: usize,
}

impl ShardSpec {
    /// Creates a new shard spec, checking that `index < shards`.
    pub fn new(index: usize, shards: usize) -> Result<Self, PartitionParseError> {
        if index >= shards {
            return Err(PartitionParseError::new(
                Some(EXPECTED_FORMAT),
                format!(
                    "shard index {index} must be less than the total number of shards {shards}"
                ),
            ));
        }
        Ok(Self { index, shards })
    }

    /// Returns the 0-based index of this shard.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the total number of shards.
    pub fn shards(&self) -> usize {
        self.shards
    }

    /// Returns the slice of a list of length `total` covered by this shard.
    ///
    /// The first `total % shards` shards get one extra element.
    pub fn range(&self, total: usize) -> Range<usize> {
        let quotient = total / self.shards;
        let remainder = total % self.shards;
        let start = quotient * self.index + self.index.min(remainder);
        let end = quotient * (self.index + 1) + (self.index + 1).min(remainder);
        start..end
    }

    /// Returns the elements of `tests` covered by this shard, in order.
    pub fn apply<T>(&self, mut tests: Vec<T>) -> Vec<T> {
        let range = self.range(tests.len());
        tests.truncate(range.end);
        tests.drain(..range.start);
        tests
    }
}

/// Returns shard `index` of `shards` from `tests`.
///
/// # Panics
///
/// Panics if `index >= shards`.
pub fn partition<T>(tests: Vec<T>, index: usize, shards: usize) -> Vec<T> {
    assert!(
        index < shards,
        "shard index {index} must be less than the total number of shards {shards}"
    );
    ShardSpec { index, shards }.apply(tests)
}

const EXPECTED_FORMAT: &str = "I/N";

impl FromStr for ShardSpec {
    type Err = PartitionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (index_str, shards_str) = s.split_once('/').ok_or_else(|| {
            PartitionParseError::new(
                Some(EXPECTED_FORMAT),
                format!("expected input '{s}' to be in the format I/N"),
            )
        })?;

        let index: usize = index_str.parse().map_err(|err| {
            PartitionParseError::new(
                Some(EXPECTED_FORMAT),
                format!("failed to parse shard index '{index_str}': {err}"),
            )
        })?;
        let shards: usize = shards_str.parse().map_err(|err| {
            PartitionParseError::new(
                Some(EXPECTED_FORMAT),
                format!("failed to parse total shards '{shards_str}': {err}"),
            )
        })?;

        Self::new(index, shards)
    }
}

impl fmt::Display for ShardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.shards)
    }
}
