// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::TestCaseId;
use crate::{
    config::DiscoveryConfig,
    errors::{CreateTestListError, ParseTestListError},
    helpers::plural,
    test_filter::{FilterCounts, TestFilterBuilder},
};
use camino::{Utf8Path, Utf8PathBuf};
use owo_colors::{OwoColorize, Style};
use std::io;
use tracing::{debug, info};

/// The marker gtest prints after the list of test cases when some of them are disabled.
const TRAILER_MARKER: &str = "YOU HAVE";

/// Parses the output of `--gtest_list_tests` into a flat list of test case IDs.
///
/// The expected format is:
///
/// ```text
/// Fixture1.
///   Case1
///   Case2
/// Fixture2.
///   Case3
/// ```
///
/// A line without indentation starts a new fixture, and an indented line names a case within the
/// current fixture. Fixture names already end in a `.`, so IDs are formed by plain concatenation.
/// Parsing stops at the first empty line or at the `YOU HAVE N DISABLED TESTS` trailer.
pub fn parse_test_cases(list_output: &str) -> Result<Vec<TestCaseId>, ParseTestListError> {
    let mut test_cases = Vec::new();
    let mut fixture: Option<&str> = None;

    for (index, line) in list_output.lines().enumerate() {
        let line_number = index + 1;
        if line.is_empty() || line.trim_start().starts_with(TRAILER_MARKER) {
            break;
        }

        match line.strip_prefix("  ") {
            None => fixture = Some(line),
            Some(case) => {
                if case.contains(char::is_whitespace) {
                    return Err(ParseTestListError::new(
                        line_number,
                        line,
                        "test case name contains whitespace",
                    ));
                }
                let Some(fixture) = fixture else {
                    return Err(ParseTestListError::new(
                        line_number,
                        line,
                        "test case listed before any fixture",
                    ));
                };
                test_cases.push(TestCaseId::new(format!("{fixture}{case}")));
            }
        }
    }

    Ok(test_cases)
}

/// The command that makes a test executable list its test cases.
#[derive(Clone, Debug)]
pub struct TestListCommand<'a> {
    executable: &'a Utf8Path,
    list_flag: &'a str,
    benign_stderr: &'a [String],
}

impl<'a> TestListCommand<'a> {
    /// Creates a new listing command for `executable`.
    pub fn new(executable: &'a Utf8Path, config: &'a DiscoveryConfig) -> Self {
        Self {
            executable,
            list_flag: &config.list_flag,
            benign_stderr: &config.benign_stderr,
        }
    }

    /// Returns the command line that will be run.
    pub fn command_line(&self) -> Vec<String> {
        vec![self.executable.to_string(), self.list_flag.to_owned()]
    }

    /// Runs the executable in its listing mode and returns the raw standard output.
    ///
    /// Fails if the executable couldn't be run, exited non-zero, or wrote anything to standard
    /// error that doesn't start with one of the benign diagnostics.
    pub fn run(&self) -> Result<String, CreateTestListError> {
        debug!(command = ?self.command_line(), "listing test cases");
        let output = duct::cmd(self.executable.as_str(), [self.list_flag])
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|error| {
                CreateTestListError::command(self.executable, self.command_line(), error)
            })?;

        if !output.status.success() {
            return Err(CreateTestListError::CommandFail {
                executable: self.executable.to_owned(),
                command: self.command_line(),
                exit_status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !self.is_benign_stderr(&stderr) {
                return Err(CreateTestListError::UnexpectedStderr {
                    executable: self.executable.to_owned(),
                    command: self.command_line(),
                    stderr: stderr.into_owned(),
                });
            }
            debug!(%stderr, "ignoring known diagnostic on stderr");
        }

        String::from_utf8(output.stdout).map_err(|error| CreateTestListError::CommandNonUtf8 {
            executable: self.executable.to_owned(),
            command: self.command_line(),
            stdout: error.into_bytes(),
            stderr: output.stderr,
        })
    }

    /// Runs the executable in its listing mode and parses its output.
    pub fn discover(&self) -> Result<Vec<TestCaseId>, CreateTestListError> {
        let list_output = self.run()?;
        parse_test_cases(&list_output).map_err(|error| CreateTestListError::Parse {
            executable: self.executable.to_owned(),
            error,
        })
    }

    fn is_benign_stderr(&self, stderr: &str) -> bool {
        self.benign_stderr
            .iter()
            .any(|prefix| stderr.starts_with(prefix.as_str()))
    }
}

/// The ordered, filtered list of test cases to run from a single executable.
#[derive(Clone, Debug)]
pub struct TestList {
    executable: Utf8PathBuf,
    test_cases: Vec<TestCaseId>,
    counts: FilterCounts,
    styles: Box<Styles>,
}

impl TestList {
    /// Discovers the test cases in `executable` and filters them.
    pub fn new(
        executable: impl Into<Utf8PathBuf>,
        filter: &TestFilterBuilder,
        config: &DiscoveryConfig,
    ) -> Result<Self, CreateTestListError> {
        let executable = executable.into();
        let discovered = TestListCommand::new(&executable, config).discover()?;
        Ok(Self::new_with_test_cases(executable, discovered, filter))
    }

    /// Filters an already-parsed list of test cases.
    pub fn new_with_test_cases(
        executable: impl Into<Utf8PathBuf>,
        discovered: Vec<TestCaseId>,
        filter: &TestFilterBuilder,
    ) -> Self {
        let executable = executable.into();
        let filtered = filter.filter(discovered);

        let file_name = executable.file_name().unwrap_or(executable.as_str());
        info!(
            "Found {} {} in {file_name}",
            filtered.test_cases.len(),
            plural::test_cases_str(filtered.test_cases.len()),
        );
        debug!(counts = ?filtered.counts, "filtered test cases");

        Self {
            executable,
            test_cases: filtered.test_cases,
            counts: filtered.counts,
            styles: Box::default(),
        }
    }

    /// Colorizes output produced by [`Self::write_plain`].
    pub fn colorize(&mut self) {
        self.styles.colorize();
    }

    /// Returns the path to the test executable.
    pub fn executable(&self) -> &Utf8Path {
        &self.executable
    }

    /// Returns the test cases to run, in discovery order.
    pub fn test_cases(&self) -> &[TestCaseId] {
        &self.test_cases
    }

    /// Returns the number of test cases to run.
    pub fn len(&self) -> usize {
        self.test_cases.len()
    }

    /// Returns true if there's nothing to run.
    pub fn is_empty(&self) -> bool {
        self.test_cases.is_empty()
    }

    /// Returns how many test cases were dropped by each filter.
    pub fn filter_counts(&self) -> FilterCounts {
        self.counts
    }

    /// Writes the test cases to run, one per line.
    pub fn write_plain(&self, writer: &mut dyn io::Write) -> io::Result<()> {
        writeln!(
            writer,
            "{} ({} {}, {} skipped):",
            self.executable.style(self.styles.executable),
            self.test_cases.len(),
            plural::test_cases_str(self.test_cases.len()),
            self.counts.total_skipped(),
        )?;
        for test_case in &self.test_cases {
            writeln!(
                writer,
                "    {}{}{}",
                test_case.fixture().style(self.styles.fixture),
                if test_case.case().is_empty() { "" } else { "." },
                test_case.case().style(self.styles.case),
            )?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
struct Styles {
    executable: Style,
    fixture: Style,
    case: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.executable = Style::new().magenta().bold();
        self.fixture = Style::new().cyan();
        self.case = Style::new().blue().bold();
    }
}
