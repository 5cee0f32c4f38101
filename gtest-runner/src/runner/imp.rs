// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{AttemptSequence, CaseRunner, RetryPolicy, WorkerPool, build_thread_pool};
use crate::{
    config::{RunConfig, TestJobs},
    errors::TestRunnerBuildError,
    list::{TestCaseId, TestList},
    record::ResultSink,
    reporter::{NoopProgress, ProgressBarSink, ProgressSink, RunStats, SummaryStyles},
    test_command::StderrMode,
};
use camino::Utf8PathBuf;
use rayon::ThreadPool;
use std::{collections::BTreeMap, io, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

/// The attempts made for every test case in a run, sorted by test case.
pub type ResultTable = BTreeMap<TestCaseId, AttemptSequence>;

/// The default interval at which progress is refreshed while waiting for results.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Whether to draw a progress bar.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ShowProgress {
    /// Draw a progress bar if stderr is a terminal and not running under CI.
    #[default]
    Auto,

    /// Never draw a progress bar.
    Never,
}

/// Test runner options.
#[derive(Clone, Debug)]
pub struct TestRunnerBuilder {
    jobs: Option<TestJobs>,
    timeout: Option<Duration>,
    retry_policy: RetryPolicy,
    filter_flag: String,
    current_dir: Option<Utf8PathBuf>,
    stderr: StderrMode,
    poll_interval: Duration,
    stats_only: bool,
    show_progress: ShowProgress,
    styles: SummaryStyles,
}

impl Default for TestRunnerBuilder {
    fn default() -> Self {
        Self {
            jobs: None,
            timeout: None,
            retry_policy: RetryPolicy::default(),
            filter_flag: "--gtest_filter".to_owned(),
            current_dir: None,
            stderr: StderrMode::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            stats_only: false,
            show_progress: ShowProgress::default(),
            styles: SummaryStyles::plain(),
        }
    }
}

impl TestRunnerBuilder {
    /// Creates a builder with settings taken from the `[run]` config table.
    pub fn from_config(run: &RunConfig, filter_flag: impl Into<String>) -> Self {
        Self {
            jobs: Some(run.jobs),
            timeout: run.timeout,
            retry_policy: run.retry_count,
            filter_flag: filter_flag.into(),
            stderr: run.stderr,
            poll_interval: run.poll_interval,
            ..Self::default()
        }
    }

    /// Sets the number of test cases to run simultaneously. The default is the number of
    /// logical CPUs.
    pub fn set_jobs(&mut self, jobs: TestJobs) -> &mut Self {
        self.jobs = Some(jobs);
        self
    }

    /// Sets the deadline for a single attempt.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum number of attempts per test case.
    pub fn set_retry_policy(&mut self, retry_policy: RetryPolicy) -> &mut Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Sets the working directory test cases run in. The default is the current directory.
    pub fn set_current_dir(&mut self, dir: impl Into<Utf8PathBuf>) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Sets where standard error from test cases goes.
    pub fn set_stderr(&mut self, stderr: StderrMode) -> &mut Self {
        self.stderr = stderr;
        self
    }

    /// Sets how often progress is refreshed while waiting for results.
    pub fn set_poll_interval(&mut self, poll_interval: Duration) -> &mut Self {
        self.poll_interval = poll_interval;
        self
    }

    /// If true, only the summary statistics are printed, not the output of failing test cases.
    pub fn set_stats_only(&mut self, stats_only: bool) -> &mut Self {
        self.stats_only = stats_only;
        self
    }

    /// Sets whether to draw a progress bar.
    pub fn set_show_progress(&mut self, show_progress: ShowProgress) -> &mut Self {
        self.show_progress = show_progress;
        self
    }

    /// Colorizes the summary.
    pub fn colorize(&mut self) -> &mut Self {
        self.styles.colorize();
        self
    }

    /// Creates a new test runner.
    pub fn build(&self) -> Result<TestRunner, TestRunnerBuildError> {
        let jobs = self.jobs.unwrap_or(TestJobs::NumCpus).compute();
        debug!(
            jobs,
            retry_count = self.retry_policy.count(),
            timeout = ?self.timeout,
            "building test runner",
        );

        Ok(TestRunner {
            opts: self.clone(),
            pool: build_thread_pool(jobs)?,
        })
    }
}

/// The outcome of [`TestRunner::execute`].
#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
    /// The test list was empty, so nothing was run.
    NoTests,

    /// Test cases were run and produced results. The content of the results doesn't change this:
    /// failing test cases are still a finished run.
    Finished(RunStats),

    /// Test cases were submitted, but no results came back.
    PoolFailure {
        /// The number of test cases that were submitted.
        expected: usize,
    },
}

/// Runs the test cases in a [`TestList`].
#[derive(Debug)]
pub struct TestRunner {
    opts: TestRunnerBuilder,
    pool: ThreadPool,
}

impl TestRunner {
    /// Runs every test case in `test_list`, hands the results to `sink`, and writes the
    /// failure dump and summary to `writer`.
    ///
    /// Errors persisting the results are logged and otherwise ignored. Errors writing to `writer`
    /// are returned.
    pub fn execute(
        &self,
        test_list: &TestList,
        sink: &dyn ResultSink,
        writer: &mut dyn io::Write,
    ) -> io::Result<RunOutcome> {
        if test_list.is_empty() {
            info!("no test cases to run");
            return Ok(RunOutcome::NoTests);
        }

        let progress: Arc<dyn ProgressSink> = match self.opts.show_progress {
            ShowProgress::Auto => Arc::new(ProgressBarSink::new(test_list.len())),
            ShowProgress::Never => Arc::new(NoopProgress::new()),
        };
        let table = self.run_all(test_list, progress.clone());
        let elapsed = progress.start().elapsed();
        progress.finish();

        if let Err(error) = sink.persist(test_list.executable(), &table) {
            warn!("failed to persist results: {}", DisplayErrorChain(&error));
        }

        if table.is_empty() {
            return Ok(RunOutcome::PoolFailure {
                expected: test_list.len(),
            });
        }

        let stats = RunStats::new(&table, elapsed);
        if !self.opts.stats_only {
            stats.write_failure_dump(&table, writer, &self.opts.styles)?;
        }
        stats.write_summary(writer, &self.opts.styles)?;

        Ok(RunOutcome::Finished(stats))
    }

    /// Runs every test case and collects the results, without reporting them.
    pub fn run_all(&self, test_list: &TestList, progress: Arc<dyn ProgressSink>) -> ResultTable {
        let mut case_runner = CaseRunner::new(
            test_list.executable(),
            &self.opts.filter_flag,
            self.opts.retry_policy,
            progress.clone(),
        );
        case_runner
            .set_deadline(self.opts.timeout)
            .set_stderr(self.opts.stderr);
        if let Some(dir) = &self.opts.current_dir {
            case_runner.set_current_dir(dir);
        }
        let case_runner = Arc::new(case_runner);

        let mut workers = WorkerPool::new(&self.pool);
        for test_case in test_list.test_cases() {
            let case_runner = case_runner.clone();
            let test_case = test_case.clone();
            workers.submit(move || case_runner.run_case(test_case));
        }

        workers
            .collect_all(&*progress, self.opts.poll_interval)
            .into_iter()
            .map(|sequence| (sequence.test_case().clone(), sequence))
            .collect()
    }
}

struct DisplayErrorChain<'a>(&'a dyn std::error::Error);

impl std::fmt::Display for DisplayErrorChain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(error) = source {
            write!(f, ": {error}")?;
            source = error.source();
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::{record::NoopResultSink, runner::Verdict, test_filter::TestFilterBuilder};
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::os::unix::fs::PermissionsExt;

    /// A script that passes `Suite.Pass`, fails `Suite.Fail`, and lists both.
    fn write_executable(dir: &Utf8TempDir) -> Utf8PathBuf {
        let path = dir.path().join("mixed_unittests");
        let script = indoc! {r#"
            #!/bin/sh
            case "$1" in
              --gtest_filter=Suite.Pass) echo "pass output" ;;
              --gtest_filter=Suite.Fail) echo "fail output"; exit 1 ;;
              *) exit 2 ;;
            esac
        "#};
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn runner(stats_only: bool) -> TestRunner {
        let mut builder = TestRunnerBuilder::default();
        builder
            .set_jobs(TestJobs::Count(2))
            .set_timeout(Some(Duration::from_secs(30)))
            .set_poll_interval(Duration::from_millis(10))
            .set_show_progress(ShowProgress::Never)
            .set_stats_only(stats_only);
        builder.build().expect("runner built")
    }

    fn test_list(executable: &Utf8PathBuf, names: &[&str]) -> TestList {
        TestList::new_with_test_cases(
            executable,
            names.iter().copied().map(TestCaseId::from).collect(),
            &TestFilterBuilder::default_set(),
        )
    }

    #[test]
    fn empty_list_runs_nothing() {
        let dir = Utf8TempDir::new().unwrap();
        let executable = write_executable(&dir);
        let mut out = Vec::new();
        let outcome = runner(false)
            .execute(&test_list(&executable, &[]), &NoopResultSink, &mut out)
            .unwrap();
        assert_eq!(outcome, RunOutcome::NoTests);
        assert!(out.is_empty());
    }

    #[test]
    fn classifies_and_reports() {
        let dir = Utf8TempDir::new().unwrap();
        let executable = write_executable(&dir);
        let mut out = Vec::new();
        let outcome = runner(false)
            .execute(
                &test_list(&executable, &["Suite.Pass", "Suite.Fail"]),
                &NoopResultSink,
                &mut out,
            )
            .unwrap();

        let RunOutcome::Finished(stats) = outcome else {
            panic!("expected a finished run, got {outcome:?}");
        };
        assert_eq!(stats.success, [TestCaseId::new("Suite.Pass")]);
        assert_eq!(stats.fail, [TestCaseId::new("Suite.Fail")]);
        assert_eq!(stats.total_attempts, 4);

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("fail output\n\n"), "failure dump first: {out}");
        assert!(out.contains("Success:    1 50.00%\n"), "summary: {out}");
        assert!(out.contains("Fail:       1 50.00%\n"), "summary: {out}");
        assert!(out.contains("Done running 2 tests with 4 executions."), "summary: {out}");
    }

    #[test]
    fn stats_only_skips_dump() {
        let dir = Utf8TempDir::new().unwrap();
        let executable = write_executable(&dir);
        let mut out = Vec::new();
        runner(true)
            .execute(&test_list(&executable, &["Suite.Fail"]), &NoopResultSink, &mut out)
            .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(!out.contains("fail output"), "no dump: {out}");
        assert!(out.starts_with("Success:"), "summary only: {out}");
    }

    #[test]
    fn result_table_is_keyed_by_test_case() {
        let dir = Utf8TempDir::new().unwrap();
        let executable = write_executable(&dir);
        let names = ["Suite.Pass", "Suite.Fail", "Suite.Other"];
        let table =
            runner(false).run_all(&test_list(&executable, &names), Arc::new(NoopProgress::new()));

        let keys: Vec<_> = table.keys().map(TestCaseId::as_str).collect();
        assert_eq!(keys, ["Suite.Fail", "Suite.Other", "Suite.Pass"]);
        assert_eq!(table["Suite.Other"].last().return_code, Some(2));
    }

    #[test]
    fn runs_in_working_dir() {
        let dir = Utf8TempDir::new().unwrap();
        let executable = dir.path().join("cwd_unittests");
        std::fs::write(&executable, "#!/bin/sh\n[ -f marker ]\n").unwrap();
        std::fs::set_permissions(&executable, std::fs::Permissions::from_mode(0o755)).unwrap();
        let working_dir = dir.path().join("work");
        std::fs::create_dir(&working_dir).unwrap();
        std::fs::write(working_dir.join("marker"), "").unwrap();

        let mut builder = TestRunnerBuilder::default();
        builder
            .set_current_dir(&working_dir)
            .set_show_progress(ShowProgress::Never);
        let runner_in_dir = builder.build().expect("runner built");
        let cases = test_list(&executable, &["Suite.Cwd"]);
        let table = runner_in_dir.run_all(&cases, Arc::new(NoopProgress::new()));
        assert_eq!(table["Suite.Cwd"].verdict(), Verdict::Success);

        // Without a working dir, test cases run in the current directory, which has no marker.
        let table = runner(false).run_all(&cases, Arc::new(NoopProgress::new()));
        assert_eq!(table["Suite.Cwd"].verdict(), Verdict::Fail);
    }
}
