// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    errors::Result,
    output::{OutputContext, OutputOpts},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, ValueEnum};
use gtest_metadata::RunExitCode;
use gtest_runner::{
    config::{RunTestCasesConfig, TestJobs},
    errors::TestFilterBuildError,
    list::TestList,
    partition::ShardSpec,
    record::{JsonResultStore, NoopResultSink, ResultSink},
    runner::{RetryPolicy, RunOutcome, TestRunnerBuilder},
    test_command::StderrMode,
    test_filter::{NamePrefixFilter, TestFilterBuilder},
};
use std::{io::Write, time::Duration};
use tracing::debug;

/// Runs the test cases of a gtest executable in parallel.
///
/// Each test case runs in its own process. Failing test cases are retried to tell flaky tests
/// apart from failing ones, and the results are written next to the executable as
/// `<EXECUTABLE>.run_test_cases`.
#[derive(Debug, Parser)]
#[command(
    version,
    max_term_width = 100,
    styles = crate::output::clap_styles::style()
)]
pub struct RunTestCasesApp {
    /// Path to the test executable
    #[arg(value_name = "EXECUTABLE")]
    executable: Utf8PathBuf,

    /// Config file [default: .config/run-test-cases.toml in the current directory]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Print the test cases that would be run, then exit
    #[arg(long)]
    list: bool,

    #[command(flatten)]
    filter_opts: TestFilterOpts,

    #[command(flatten)]
    runner_opts: TestRunnerOpts,

    #[command(flatten)]
    reporter_opts: TestReporterOpts,

    #[command(flatten)]
    output: OutputOpts,
}

impl RunTestCasesApp {
    /// Initializes logging and resolves color settings.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext, writer: &mut dyn Write) -> Result<i32> {
        let current_dir = current_dir()?;
        let config = RunTestCasesConfig::from_sources(&current_dir, self.config_file.as_deref())?;

        // Test cases may run in a different directory, so the executable is always absolute.
        let executable = current_dir.join(&self.executable);
        let filter = self.filter_opts.make_filter()?;
        let mut test_list = TestList::new(executable, &filter, config.discovery())?;

        if self.list {
            if output.colorize_stdout() {
                test_list.colorize();
            }
            test_list
                .write_plain(writer)
                .map_err(ExpectedError::write_output_error)?;
            return Ok(RunExitCode::OK);
        }

        let mut builder =
            TestRunnerBuilder::from_config(config.run(), &config.discovery().filter_flag);
        self.runner_opts.apply(&mut builder, &current_dir);
        builder.set_stats_only(self.reporter_opts.stats_only);
        if output.colorize_stdout() {
            builder.colorize();
        }
        let runner = builder.build()?;

        let sink: Box<dyn ResultSink> = if self.reporter_opts.no_dump {
            Box::new(NoopResultSink)
        } else {
            Box::new(JsonResultStore::new())
        };

        let outcome = runner
            .execute(&test_list, &*sink, writer)
            .map_err(ExpectedError::write_output_error)?;
        writer.flush().map_err(ExpectedError::write_output_error)?;

        match outcome {
            RunOutcome::NoTests => Ok(RunExitCode::OK),
            RunOutcome::Finished(stats) => {
                debug!(
                    success = stats.success.len(),
                    flaky = stats.flaky.len(),
                    fail = stats.fail.len(),
                    "run finished"
                );
                Ok(RunExitCode::OK)
            }
            RunOutcome::PoolFailure { expected } => {
                Err(ExpectedError::NoResultsCollected { expected })
            }
        }
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(|error| ExpectedError::CurrentDirFailed { error })?;
    Utf8PathBuf::try_from(dir).map_err(|error| ExpectedError::CurrentDirInvalidUtf8 { error })
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Filter options")]
struct TestFilterOpts {
    /// Run only test cases matching this glob; may be repeated [default: all test cases]
    #[arg(short = 'w', long, value_name = "GLOB")]
    whitelist: Vec<String>,

    /// Skip test cases matching this glob; may be repeated
    #[arg(short = 'b', long, value_name = "GLOB")]
    blacklist: Vec<String>,

    /// Run only one shard of the test cases, as INDEX/COUNT with a 0-based index
    #[arg(long, value_name = "I/N")]
    partition: Option<ShardSpec>,

    /// Also run test cases prefixed with DISABLED_
    #[arg(long)]
    include_disabled: bool,

    /// Also run test cases prefixed with FAILS_
    #[arg(long)]
    include_fails: bool,

    /// Also run test cases prefixed with FLAKY_
    #[arg(long)]
    include_flaky: bool,
}

impl TestFilterOpts {
    fn make_filter(&self) -> Result<TestFilterBuilder, TestFilterBuildError> {
        let prefix_filter = NamePrefixFilter {
            include_disabled: self.include_disabled,
            include_fails: self.include_fails,
            include_flaky: self.include_flaky,
        };
        TestFilterBuilder::new(
            &self.whitelist,
            &self.blacklist,
            prefix_filter,
            self.partition,
        )
    }
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Runner options")]
struct TestRunnerOpts {
    /// Number of test cases to run simultaneously [default: number of logical CPUs]
    ///
    /// A negative value is subtracted from the number of logical CPUs.
    #[arg(short = 'j', long, value_name = "N", allow_negative_numbers = true)]
    jobs: Option<TestJobs>,

    /// Timeout for a single attempt of a test case, in seconds; 0 disables the timeout
    #[arg(short = 't', long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Maximum number of attempts for each test case, including the first
    #[arg(long, value_name = "N")]
    retry_count: Option<RetryPolicy>,

    /// Where standard error from test cases goes
    #[arg(long, value_enum, value_name = "MODE")]
    stderr: Option<StderrOpt>,

    /// Directory to run test cases in [default: the current directory]
    #[arg(long, value_name = "DIR")]
    working_dir: Option<Utf8PathBuf>,
}

impl TestRunnerOpts {
    fn apply(&self, builder: &mut TestRunnerBuilder, current_dir: &Utf8Path) {
        if let Some(jobs) = self.jobs {
            builder.set_jobs(jobs);
        }
        if let Some(secs) = self.timeout {
            builder.set_timeout((secs > 0).then(|| Duration::from_secs(secs)));
        }
        if let Some(retry_policy) = self.retry_count {
            builder.set_retry_policy(retry_policy);
        }
        if let Some(stderr) = self.stderr {
            builder.set_stderr(stderr.into());
        }
        if let Some(dir) = &self.working_dir {
            builder.set_current_dir(current_dir.join(dir));
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StderrOpt {
    /// Capture standard error along with standard output
    Merge,

    /// Let standard error through to the terminal
    Inherit,
}

impl From<StderrOpt> for StderrMode {
    fn from(opt: StderrOpt) -> Self {
        match opt {
            StderrOpt::Merge => StderrMode::Merge,
            StderrOpt::Inherit => StderrMode::Inherit,
        }
    }
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Reporter options")]
struct TestReporterOpts {
    /// Only print the summary, not the output of failing test cases
    #[arg(short = 's', long = "stats")]
    stats_only: bool,

    /// Don't write results to <EXECUTABLE>.run_test_cases
    #[arg(long)]
    no_dump: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn verify_app() {
        RunTestCasesApp::command().debug_assert();
    }

    #[test]
    fn parse_all_options() {
        let app = RunTestCasesApp::try_parse_from([
            "run-test-cases",
            "-w",
            "Foo.*",
            "--whitelist",
            "Bar.*",
            "-b",
            "*.Slow*",
            "-j",
            "4",
            "-t",
            "30",
            "-s",
            "-vv",
            "--no-dump",
            "--partition",
            "1/3",
            "--include-flaky",
            "--retry-count",
            "5",
            "--stderr",
            "inherit",
            "--working-dir",
            "out",
            "--color",
            "never",
            "--list",
            "out/base_unittests",
        ])
        .expect("valid arguments");

        assert_eq!(app.executable, Utf8Path::new("out/base_unittests"));
        assert_eq!(app.filter_opts.whitelist, vec!["Foo.*", "Bar.*"]);
        assert_eq!(app.filter_opts.blacklist, vec!["*.Slow*"]);
        assert_eq!(app.filter_opts.partition, Some(ShardSpec::new(1, 3).unwrap()));
        assert!(!app.filter_opts.include_disabled);
        assert!(app.filter_opts.include_flaky);
        assert_eq!(app.runner_opts.jobs, Some(TestJobs::Count(4)));
        assert_eq!(app.runner_opts.timeout, Some(30));
        assert_eq!(app.runner_opts.retry_count, Some(RetryPolicy::new(5).unwrap()));
        assert_eq!(app.runner_opts.stderr, Some(StderrOpt::Inherit));
        assert_eq!(app.runner_opts.working_dir.as_deref(), Some(Utf8Path::new("out")));
        assert!(app.reporter_opts.stats_only);
        assert!(app.reporter_opts.no_dump);
        assert_eq!(app.output.verbose, 2);
        assert!(app.list);
    }

    #[test]
    fn defaults_leave_config_alone() {
        let app = RunTestCasesApp::try_parse_from(["run-test-cases", "./unit_tests"])
            .expect("valid arguments");

        assert_eq!(app.runner_opts.jobs, None);
        assert_eq!(app.runner_opts.timeout, None);
        assert_eq!(app.runner_opts.retry_count, None);
        assert_eq!(app.runner_opts.stderr, None);
        assert_eq!(app.runner_opts.working_dir, None);
        assert!(!app.reporter_opts.stats_only);
        assert!(!app.list);
        assert_eq!(app.output.verbose, 0);
    }

    #[test]
    fn negative_jobs() {
        let app = RunTestCasesApp::try_parse_from(["run-test-cases", "-j", "-2", "unit_tests"])
            .expect("negative jobs are allowed");
        assert!(matches!(app.runner_opts.jobs, Some(TestJobs::Count(_))));
    }

    #[test_case(&["--partition", "3/3"]; "shard index out of range")]
    #[test_case(&["--partition", "1"]; "partition without count")]
    #[test_case(&["--retry-count", "0"]; "zero retry count")]
    #[test_case(&["-j", "0"]; "zero jobs")]
    #[test_case(&["-t", "soon"]; "non-numeric timeout")]
    #[test_case(&["--stderr", "discard"]; "unknown stderr mode")]
    #[test_case(&[]; "missing executable")]
    fn invalid_arguments(args: &[&str]) {
        let mut argv = vec!["run-test-cases"];
        argv.extend_from_slice(args);
        if !args.is_empty() {
            argv.push("unit_tests");
        }

        RunTestCasesApp::try_parse_from(argv).expect_err("arguments should be rejected");
    }

    #[test]
    fn make_filter_rejects_bad_glob() {
        let opts = TestFilterOpts {
            whitelist: vec!["Foo.[".to_owned()],
            ..Default::default()
        };
        opts.make_filter().expect_err("unclosed character class");
    }
}
