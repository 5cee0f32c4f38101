// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by `run-test-cases`.

use crate::helpers::display_exit_status;
use camino::{Utf8Path, Utf8PathBuf};
use config::ConfigError;
use std::{borrow::Cow, fmt, io, process::ExitStatus};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse run-test-cases config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigError) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }
}

/// An error that occurs while parsing a [`ShardSpec`](crate::partition::ShardSpec) from a string.
#[derive(Clone, Debug, Error)]
pub struct PartitionParseError {
    expected_format: Option<&'static str>,
    message: Cow<'static, str>,
}

impl PartitionParseError {
    pub(crate) fn new(
        expected_format: Option<&'static str>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            expected_format,
            message: message.into(),
        }
    }
}

impl fmt::Display for PartitionParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.expected_format {
            Some(format) => {
                write!(
                    f,
                    "partition must be in the format \"{}\":\n{}",
                    format, self.message
                )
            }
            None => write!(f, "{}", self.message),
        }
    }
}

/// An error that occurs while parsing a [`RetryPolicy`](crate::runner::RetryPolicy) from a string
/// or an integer.
#[derive(Clone, Debug, Error)]
#[error("invalid retry count `{input}`: {message}")]
pub struct RetryCountParseError {
    input: String,
    message: Cow<'static, str>,
}

impl RetryCountParseError {
    pub(crate) fn new(input: impl Into<String>, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            input: input.into(),
            message: message.into(),
        }
    }
}

/// An error that occurs while parsing a [`TestJobs`](crate::config::TestJobs) value from a string.
#[derive(Clone, Debug, Error)]
#[error("invalid value for jobs: {message}")]
pub struct JobsParseError {
    message: Cow<'static, str>,
}

impl JobsParseError {
    pub(crate) fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An error that occurs while compiling a whitelist or blacklist glob.
#[derive(Clone, Debug, Error)]
pub enum TestFilterBuildError {
    /// The glob could not be parsed.
    #[error("invalid glob `{pattern}`")]
    InvalidGlob {
        /// The glob that was provided.
        pattern: String,

        /// The underlying error.
        #[source]
        error: globset::Error,
    },

    /// The glob was parsed but the resulting regex could not be compiled.
    #[error("glob `{pattern}` could not be compiled to a regex: {message}")]
    RegexError {
        /// The glob that was provided.
        pattern: String,

        /// The error message returned by the regex engine.
        message: String,
    },
}

/// An error that occurs while parsing the output of a test executable's listing mode.
#[derive(Clone, Debug, Error)]
#[error("line {line_number}: {message}: `{line}`")]
pub struct ParseTestListError {
    line_number: usize,
    line: String,
    message: Cow<'static, str>,
}

impl ParseTestListError {
    pub(crate) fn new(
        line_number: usize,
        line: impl Into<String>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            line_number,
            line: line.into(),
            message: message.into(),
        }
    }

    /// The 1-based line number at which parsing failed.
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

/// An error that occurs while creating a [`TestList`](crate::list::TestList).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CreateTestListError {
    /// Running the listing command failed.
    #[error(
        "for `{executable}`, running command `{}` failed",
        shell_words::join(command)
    )]
    Command {
        /// The test executable.
        executable: Utf8PathBuf,

        /// The command that was run.
        command: Vec<String>,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The listing command exited with a non-zero code.
    #[error(
        "for `{executable}`, command `{}` {}\n--- stdout:\n{}\n--- stderr:\n{}\n---",
        shell_words::join(command),
        display_exit_status(*exit_status),
        String::from_utf8_lossy(stdout),
        String::from_utf8_lossy(stderr),
    )]
    CommandFail {
        /// The test executable.
        executable: Utf8PathBuf,

        /// The command that was run.
        command: Vec<String>,

        /// The exit status with which the command failed.
        exit_status: ExitStatus,

        /// Standard output for the command.
        stdout: Vec<u8>,

        /// Standard error for the command.
        stderr: Vec<u8>,
    },

    /// The listing command succeeded but wrote something unexpected to standard error.
    #[error(
        "for `{executable}`, command `{}` produced unexpected output on stderr:\n{stderr}",
        shell_words::join(command)
    )]
    UnexpectedStderr {
        /// The test executable.
        executable: Utf8PathBuf,

        /// The command that was run.
        command: Vec<String>,

        /// Standard error for the command.
        stderr: String,
    },

    /// The listing command produced output that wasn't valid UTF-8.
    #[error(
        "for `{executable}`, command `{}` produced non-UTF-8 output:\n\
         --- stdout:\n{}\n--- stderr:\n{}\n---",
        shell_words::join(command),
        String::from_utf8_lossy(stdout),
        String::from_utf8_lossy(stderr),
    )]
    CommandNonUtf8 {
        /// The test executable.
        executable: Utf8PathBuf,

        /// The command that was run.
        command: Vec<String>,

        /// Standard output for the command.
        stdout: Vec<u8>,

        /// Standard error for the command.
        stderr: Vec<u8>,
    },

    /// The listing output could not be parsed.
    #[error("for `{executable}`, failed to parse list of test cases")]
    Parse {
        /// The test executable.
        executable: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: ParseTestListError,
    },
}

impl CreateTestListError {
    pub(crate) fn command(
        executable: impl Into<Utf8PathBuf>,
        command: impl IntoIterator<Item = impl Into<String>>,
        error: io::Error,
    ) -> Self {
        Self::Command {
            executable: executable.into(),
            command: command.into_iter().map(|s| s.into()).collect(),
            error,
        }
    }
}

/// An error that occurs while building a [`TestRunner`](crate::runner::TestRunner).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestRunnerBuildError {
    /// The worker thread pool could not be created.
    #[error("error creating worker thread pool")]
    ThreadPool(#[source] rayon::ThreadPoolBuildError),
}

/// An error that occurs while persisting a result table.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistError {
    /// The result table could not be serialized.
    #[error("error serializing results for `{path}`")]
    Serialize {
        /// The path the results were going to be written to.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The results file could not be written.
    #[error("error writing results to `{path}`")]
    Write {
        /// The path the results were being written to.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: atomicwrites::Error<io::Error>,
    },
}

/// An error that occurs while loading a results file written by
/// [`JsonResultStore`](crate::record::JsonResultStore).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadResultsError {
    /// The results file could not be read.
    #[error("error reading results from `{path}`")]
    Read {
        /// The path to the results file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The results file was not valid.
    #[error("error parsing results from `{path}`")]
    Parse {
        /// The path to the results file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}
