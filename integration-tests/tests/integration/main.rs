// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests that run `run-test-cases` against `fake-gtest`.
//!
//! The CLI is invoked through `run-test-cases-dup`, a copy of the real binary that lives in this
//! package so that its path is available as `CARGO_BIN_EXE_run-test-cases-dup`.

use color_eyre::{Result, eyre::bail};
use gtest_metadata::{ResultTableSummary, RunExitCode};
use gtest_runner::{
    config::RunTestCasesConfig,
    list::{TestCaseId, TestList},
    record::JsonResultStore,
    runner::{RunOutcome, ShowProgress, TestRunnerBuilder, Verdict},
    test_filter::{NamePrefixFilter, TestFilterBuilder},
};
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

mod fixtures;

use fixtures::*;

#[test]
fn test_list_default_filters() -> Result<()> {
    let fake = FakeGtest::new()?;

    let output = cli().args(["--list", fake.exe().as_str()]).output();

    let stdout = output.stdout_as_str();
    assert_eq!(
        stdout.lines().next(),
        Some(format!("{} (6 test cases, 2 skipped):", fake.exe()).as_str()),
    );
    assert_eq!(
        listed_test_cases(&stdout),
        vec![
            "Math.PassAddition",
            "Math.PassSubtraction",
            "Math.FailDivision",
            "Math.FlakyOnceRounding",
            "Io.PassRead",
            "Io.HangBlockedRead",
        ],
    );
    assert!(
        !fake.results_path().exists(),
        "listing doesn't write results"
    );
    Ok(())
}

#[test]
fn test_list_include_prefixed() -> Result<()> {
    let fake = FakeGtest::new()?;

    let output = cli()
        .args([
            "--list",
            "--include-disabled",
            "--include-flaky",
            fake.exe().as_str(),
        ])
        .output();

    let listed = listed_test_cases(&output.stdout_as_str());
    assert_eq!(listed.len(), 8);
    assert!(listed.contains(&"Math.DISABLED_PassSkipped".to_owned()));
    assert!(listed.contains(&"FLAKY_Network.PassConnect".to_owned()));
    Ok(())
}

#[test]
fn test_list_partitions_cover_everything() -> Result<()> {
    let fake = FakeGtest::new()?;

    let output = cli().args(["--list", fake.exe().as_str()]).output();
    let all = listed_test_cases(&output.stdout_as_str());
    let mut combined = Vec::new();
    for shard in ["0/2", "1/2"] {
        let output = cli()
            .args(["--list", "--partition", shard, fake.exe().as_str()])
            .output();
        let listed = listed_test_cases(&output.stdout_as_str());
        assert!(!listed.is_empty(), "shard {shard} is not empty");
        combined.extend(listed);
    }

    assert_eq!(combined, all);
    Ok(())
}

#[test]
fn test_list_color_from_env() -> Result<()> {
    let fake = FakeGtest::new()?;

    let colored = cli()
        .args(["--list", fake.exe().as_str()])
        .env("RUN_TEST_CASES_COLOR", "always")
        .output();
    assert!(colored.stdout_as_str().contains("\x1b["), "{colored}");

    // Cargo's color setting doesn't apply to this tool.
    let plain = cli()
        .args(["--list", fake.exe().as_str()])
        .env("CARGO_TERM_COLOR", "always")
        .output();
    assert!(!plain.stdout_as_str().contains("\x1b["), "{plain}");
    Ok(())
}

#[test]
fn test_run_passing() -> Result<()> {
    let fake = FakeGtest::new()?;

    let output = cli()
        .args(["-w", "*.Pass*", "--no-dump", fake.exe().as_str()])
        .output();

    let stdout = output.stdout_as_str();
    assert!(stdout.contains("Success:    3 100.00%"), "{output}");
    assert!(stdout.contains("Done running 3 tests with 3 executions."), "{output}");
    assert!(!fake.results_path().exists(), "--no-dump skips the results file");
    Ok(())
}

#[test]
fn test_run_mixed() -> Result<()> {
    let fake = FakeGtest::new()?;

    let output = cli()
        .args(["-b", "*.Hang*", "-j", "2", fake.exe().as_str()])
        .env("FAKE_GTEST_STATE_DIR", fake.dir().as_str())
        .output();

    let stdout = output.stdout_as_str();
    // The output of the last attempt of the failing test, with stderr merged in.
    assert!(stdout.contains("fake_gtest.cc:42: Failure"), "{output}");
    assert!(stdout.contains("Expected: 4"), "{output}");
    assert!(
        stdout.contains("Math.FlakyOnceRounding is flaky (tried 2 times)"),
        "{output}"
    );
    assert!(stdout.contains("Success:    3 60.00%"), "{output}");
    assert!(stdout.contains("Flaky:      1 20.00%"), "{output}");
    assert!(stdout.contains("Fail:       1 20.00%"), "{output}");
    assert!(stdout.contains("Done running 5 tests with 8 executions."), "{output}");

    let json = std::fs::read_to_string(fake.results_path())?;
    let summary = ResultTableSummary::parse_json(json)?;
    assert_eq!(summary.test_cases.len(), 5);
    assert_eq!(summary.attempt_count(), 8);

    let fail = &summary.test_cases["Math.FailDivision"];
    assert_eq!(fail.len(), 3);
    assert!(fail.iter().all(|attempt| attempt.return_code == Some(1)));

    let flaky = &summary.test_cases["Math.FlakyOnceRounding"];
    assert_eq!(
        flaky
            .iter()
            .map(|attempt| attempt.is_success())
            .collect::<Vec<_>>(),
        vec![false, true],
    );
    Ok(())
}

#[test]
fn test_run_stats_only() -> Result<()> {
    let fake = FakeGtest::new()?;

    let output = cli()
        .args(["-w", "Math.Fail*", "-s", "--retry-count", "1", "--no-dump"])
        .arg(fake.exe().as_str())
        .output();

    let stdout = output.stdout_as_str();
    assert!(!stdout.contains("Expected: 4"), "{output}");
    assert!(stdout.contains("Fail:       1 100.00%"), "{output}");
    assert!(stdout.contains("Done running 1 tests with 1 executions."), "{output}");
    Ok(())
}

#[test]
fn test_run_timeout() -> Result<()> {
    let fake = FakeGtest::new()?;

    let start = Instant::now();
    let output = cli()
        .args([
            "-w",
            "Io.Hang*",
            "-t",
            "1",
            "--retry-count",
            "2",
            fake.exe().as_str(),
        ])
        .output();
    let elapsed = start.elapsed();

    let stdout = output.stdout_as_str();
    assert!(stdout.contains("Fail:       1 100.00%"), "{output}");
    // Output written before the kill is kept.
    assert!(stdout.contains("[ RUN      ] Io.HangBlockedRead"), "{output}");
    assert!(
        elapsed < Duration::from_secs(30),
        "hung test cases are killed (took {elapsed:?})"
    );

    let json = std::fs::read_to_string(fake.results_path())?;
    let summary = ResultTableSummary::parse_json(json)?;
    let attempts = &summary.test_cases["Io.HangBlockedRead"];
    assert_eq!(attempts.len(), 2);
    assert!(
        attempts
            .iter()
            .all(|attempt| attempt.timed_out && attempt.return_code.is_none())
    );
    Ok(())
}

#[test]
fn test_discovery_exit_failure() -> Result<()> {
    let fake = FakeGtest::new()?;

    let output = cli()
        .arg(fake.exe().as_str())
        .env("FAKE_GTEST_LIST_EXIT", "3")
        .unchecked(true)
        .output();

    assert_eq!(
        output.exit_status.code(),
        Some(RunExitCode::TEST_LIST_CREATION_FAILED),
        "{output}"
    );
    assert!(
        output.stderr_as_str().contains("creating test list failed"),
        "{output}"
    );
    Ok(())
}

#[test]
fn test_discovery_unexpected_stderr() -> Result<()> {
    let fake = FakeGtest::new()?;

    let output = cli()
        .arg(fake.exe().as_str())
        .env("FAKE_GTEST_LIST_STDERR", "something went wrong\n")
        .unchecked(true)
        .output();

    assert_eq!(
        output.exit_status.code(),
        Some(RunExitCode::TEST_LIST_CREATION_FAILED),
        "{output}"
    );
    assert!(
        output.stderr_as_str().contains("something went wrong"),
        "{output}"
    );
    Ok(())
}

#[test]
fn test_discovery_benign_stderr() -> Result<()> {
    let fake = FakeGtest::new()?;

    let output = cli()
        .args(["--list", fake.exe().as_str()])
        .env(
            "FAKE_GTEST_LIST_STDERR",
            "Xlib:  extension \"RANDR\" missing on display \":99\".\n",
        )
        .output();

    assert_eq!(listed_test_cases(&output.stdout_as_str()).len(), 6);
    Ok(())
}

#[test]
fn test_missing_config_file() -> Result<()> {
    let fake = FakeGtest::new()?;
    let config_file = fake.dir().join("does-not-exist.toml");

    let output = cli()
        .args([
            "--config-file",
            config_file.as_str(),
            fake.exe().as_str(),
        ])
        .unchecked(true)
        .output();

    assert_eq!(
        output.exit_status.code(),
        Some(RunExitCode::SETUP_ERROR),
        "{output}"
    );
    Ok(())
}

#[test]
fn test_config_file_overrides_defaults() -> Result<()> {
    let fake = FakeGtest::new()?;
    let config_file = fake.dir().join("run-test-cases.toml");
    std::fs::write(&config_file, "[run]\nretry-count = 1\n")?;

    let output = cli()
        .args([
            "--config-file",
            config_file.as_str(),
            "-w",
            "Math.Fail*",
            "--no-dump",
            fake.exe().as_str(),
        ])
        .output();

    assert!(
        output
            .stdout_as_str()
            .contains("Done running 1 tests with 1 executions."),
        "{output}"
    );
    Ok(())
}

#[test]
fn test_run_with_library() -> Result<()> {
    let fake = FakeGtest::new()?;
    let config = RunTestCasesConfig::default_config();

    let filter = TestFilterBuilder::new(
        Vec::<String>::new(),
        ["*.Hang*"],
        NamePrefixFilter::default(),
        None,
    )?;
    let test_list = TestList::new(fake.exe(), &filter, config.discovery())?;
    assert_eq!(test_list.len(), 5);
    assert_eq!(test_list.filter_counts().total_skipped(), 3);

    let runner = TestRunnerBuilder::from_config(config.run(), &config.discovery().filter_flag)
        .set_show_progress(ShowProgress::Never)
        .build()?;

    let mut out = Vec::new();
    let RunOutcome::Finished(stats) = runner.execute(&test_list, &JsonResultStore::new(), &mut out)?
    else {
        bail!("expected the run to finish");
    };

    let ids = |names: &[&str]| names.iter().map(|&name| TestCaseId::from(name)).collect::<Vec<_>>();
    assert_eq!(
        stats.success,
        ids(&["Io.PassRead", "Math.PassAddition", "Math.PassSubtraction"])
    );
    assert_eq!(stats.flaky, ids(&["Math.FlakyOnceRounding"]));
    assert_eq!(stats.fail, ids(&["Math.FailDivision"]));
    assert_eq!(stats.total_attempts, 8);

    let table = JsonResultStore::load(&fake.results_path())?;
    assert_eq!(table.len(), 5);
    assert_eq!(table["Math.FlakyOnceRounding"].verdict(), Verdict::Flaky);
    assert_eq!(table["Math.FlakyOnceRounding"].attempt_count(), 2);
    assert_eq!(table["Math.FailDivision"].verdict(), Verdict::Fail);
    assert_eq!(table["Io.PassRead"].verdict(), Verdict::Success);
    Ok(())
}
