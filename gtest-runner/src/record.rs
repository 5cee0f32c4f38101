// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisting the results of a run.
//!
//! By default, results are written next to the test executable as `<executable>.run_test_cases`,
//! a JSON object mapping each test case to the list of its attempts. The format is described by
//! [`gtest_metadata::ResultTableSummary`].

use crate::{
    errors::{LoadResultsError, PersistError},
    list::TestCaseId,
    runner::{Attempt, AttemptSequence, ResultTable},
};
use camino::{Utf8Path, Utf8PathBuf};
use gtest_metadata::ResultTableSummary;
use std::io::Write;
use tracing::debug;

/// Receives the full result table once a run is over.
pub trait ResultSink {
    /// Persists `table` for the test executable at `key`.
    fn persist(&self, key: &Utf8Path, table: &ResultTable) -> Result<(), PersistError>;
}

/// A [`ResultSink`] that discards results.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopResultSink;

impl ResultSink for NoopResultSink {
    fn persist(&self, _key: &Utf8Path, _table: &ResultTable) -> Result<(), PersistError> {
        Ok(())
    }
}

/// A [`ResultSink`] that writes results as JSON next to the test executable.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonResultStore;

impl JsonResultStore {
    /// The extension appended to the executable's path.
    pub const EXTENSION: &'static str = "run_test_cases";

    /// Creates a new store.
    pub fn new() -> Self {
        Self
    }

    /// Returns the path results for `executable` are written to.
    pub fn results_path(executable: &Utf8Path) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{executable}.{}", Self::EXTENSION))
    }

    /// Reads a results file back into a result table.
    ///
    /// Test cases with no recorded attempts are skipped.
    pub fn load(path: &Utf8Path) -> Result<ResultTable, LoadResultsError> {
        let json = std::fs::read_to_string(path).map_err(|error| LoadResultsError::Read {
            path: path.to_owned(),
            error,
        })?;
        let summary =
            ResultTableSummary::parse_json(&json).map_err(|error| LoadResultsError::Parse {
                path: path.to_owned(),
                error,
            })?;
        Ok(summary_to_table(&summary))
    }
}

impl ResultSink for JsonResultStore {
    fn persist(&self, key: &Utf8Path, table: &ResultTable) -> Result<(), PersistError> {
        let path = Self::results_path(key);
        let json = table_to_summary(table)
            .to_json_pretty()
            .map_err(|error| PersistError::Serialize {
                path: path.clone(),
                error,
            })?;

        atomicwrites::AtomicFile::new(&path, atomicwrites::AllowOverwrite)
            .write(|file| file.write_all(json.as_bytes()))
            .map_err(|error| PersistError::Write {
                path: path.clone(),
                error,
            })?;

        debug!(%path, test_cases = table.len(), "wrote results");
        Ok(())
    }
}

/// Converts a result table into its serializable form.
pub fn table_to_summary(table: &ResultTable) -> ResultTableSummary {
    ResultTableSummary {
        test_cases: table
            .iter()
            .map(|(test_case, attempts)| (test_case.to_string(), attempts.to_summaries()))
            .collect(),
    }
}

/// Converts a deserialized summary back into a result table.
pub fn summary_to_table(summary: &ResultTableSummary) -> ResultTable {
    summary
        .test_cases
        .iter()
        .filter_map(|(test_case, attempts)| {
            let attempts = attempts.iter().map(Attempt::from_summary).collect();
            Some((
                TestCaseId::new(test_case.clone()),
                AttemptSequence::new(attempts)?,
            ))
        })
        .collect()
}
