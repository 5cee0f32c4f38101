// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::{Result, eyre::eyre};
use gtest_runner::record::JsonResultStore;
use integration_tests::RunTestCasesCli;

pub fn cli() -> RunTestCasesCli {
    RunTestCasesCli::new(env!("CARGO_BIN_EXE_run-test-cases-dup"))
}

/// A fake-gtest executable placed in its own temporary directory, so that results files and
/// flaky-test markers don't leak between tests.
pub struct FakeGtest {
    dir: Utf8TempDir,
    exe: Utf8PathBuf,
}

impl FakeGtest {
    pub fn new() -> Result<Self> {
        let dir = camino_tempfile::Builder::new()
            .prefix("run-test-cases-")
            .tempdir()?;
        let source = Utf8Path::new(env!("CARGO_BIN_EXE_fake-gtest"));
        let file_name = source
            .file_name()
            .ok_or_else(|| eyre!("fake-gtest path {source} has no file name"))?;
        let exe = dir.path().join(file_name);
        link_or_copy(source, &exe)?;

        Ok(Self { dir, exe })
    }

    pub fn exe(&self) -> &Utf8Path {
        &self.exe
    }

    pub fn dir(&self) -> &Utf8Path {
        self.dir.path()
    }

    pub fn results_path(&self) -> Utf8PathBuf {
        JsonResultStore::results_path(&self.exe)
    }
}

// A fresh copy of an executable can fail to run with ETXTBSY while other test threads are
// spawning processes, so link to it where possible.
#[cfg(unix)]
fn link_or_copy(source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    std::os::unix::fs::symlink(source, dest)?;
    Ok(())
}

#[cfg(windows)]
fn link_or_copy(source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    std::fs::copy(source, dest)?;
    Ok(())
}

/// Returns the test cases printed by `--list`, without the header.
pub fn listed_test_cases(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.strip_prefix("    "))
        .map(str::to_owned)
        .collect()
}
