// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::TestJobs;
use crate::{errors::ConfigParseError, runner::RetryPolicy, test_command::StderrMode};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{collections::BTreeSet, time::Duration};
use tracing::warn;

/// Overall configuration for `run-test-cases`.
#[derive(Clone, Debug)]
pub struct RunTestCasesConfig {
    run: RunConfig,
    discovery: DiscoveryConfig,
}

impl RunTestCasesConfig {
    /// The default location of the config within a working directory.
    pub const CONFIG_PATH: &'static str = ".config/run-test-cases.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// Reads the configuration from the given sources.
    ///
    /// If `config_file` is `None`, `.config/run-test-cases.toml` under `dir` is read if it
    /// exists. If `config_file` is specified it must exist, and is resolved relative to `dir`.
    pub fn from_sources(
        dir: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => {
                let file = dir.join(file);
                let source = File::new(file.as_str(), FileFormat::Toml);
                (file, source)
            }
            None => {
                let file = dir.join(Self::CONFIG_PATH);
                let source = File::new(file.as_str(), FileFormat::Toml).required(false);
                (file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (config, ignored) = Self::build_and_deserialize_config(&builder)
            .map_err(|error| ConfigParseError::new(config_file.clone(), error))?;

        if !ignored.is_empty() {
            warn!("ignoring unknown configuration keys in config file {config_file}:");
            for path in &ignored {
                warn!("  {path}");
            }
        }

        Ok(config.into_config())
    }

    /// Returns the default configuration, without reading any files.
    pub fn default_config() -> Self {
        let (config, _) = Self::build_and_deserialize_config(&Self::make_default_config())
            .expect("default config is always valid");
        config.into_config()
    }

    /// Returns settings for running test cases.
    pub fn run(&self) -> &RunConfig {
        &self.run
    }

    /// Returns settings for discovering test cases.
    pub fn discovery(&self) -> &DiscoveryConfig {
        &self.discovery
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(ConfigDeserialize, BTreeSet<String>), config::ConfigError> {
        let config = builder.build_cloned()?;

        let mut ignored = BTreeSet::new();
        let config: ConfigDeserialize =
            serde_ignored::deserialize(config, |path: serde_ignored::Path| {
                ignored.insert(path.to_string());
            })?;

        Ok((config, ignored))
    }
}

/// Settings for running test cases, from the `[run]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunConfig {
    /// The maximum number of attempts per test case.
    pub retry_count: RetryPolicy,

    /// The number of test cases to run at the same time.
    pub jobs: TestJobs,

    /// The deadline for a single attempt.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// How often the progress display is refreshed.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Where standard error from test cases goes.
    pub stderr: StderrMode,
}

/// Settings for talking to the test executable, from the `[discovery]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    /// The flag that lists test cases.
    pub list_flag: String,

    /// The flag that selects a single test case, passed as `<filter-flag>=<Fixture.Case>`.
    pub filter_flag: String,

    /// Prefixes of standard error output that don't fail discovery.
    pub benign_stderr: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConfigDeserialize {
    run: RunConfig,
    discovery: DiscoveryConfig,
}

impl ConfigDeserialize {
    fn into_config(self) -> RunTestCasesConfig {
        RunTestCasesConfig {
            run: self.run,
            discovery: self.discovery,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn write_config(dir: &Utf8TempDir, path: &str, contents: &str) -> Utf8PathBuf {
        let path = dir.path().join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn default_config_values() {
        let config = RunTestCasesConfig::default_config();
        let run = config.run();
        assert_eq!(run.retry_count, RetryPolicy::default());
        assert_eq!(run.jobs, TestJobs::NumCpus);
        assert_eq!(run.timeout, None);
        assert_eq!(run.poll_interval, Duration::from_millis(100));
        assert_eq!(run.stderr, StderrMode::Merge);

        let discovery = config.discovery();
        assert_eq!(discovery.list_flag, "--gtest_list_tests");
        assert_eq!(discovery.filter_flag, "--gtest_filter");
        assert_eq!(
            discovery.benign_stderr,
            ["Xlib:  extension \"RANDR\" missing on display "]
        );
    }

    #[test]
    fn missing_default_file_is_fine() {
        let dir = Utf8TempDir::new().unwrap();
        let config = RunTestCasesConfig::from_sources(dir.path(), None).expect("no file is valid");
        assert_eq!(config.run().retry_count.count(), 3);
    }

    #[test]
    fn repository_config_overrides_defaults() {
        let dir = Utf8TempDir::new().unwrap();
        write_config(
            &dir,
            RunTestCasesConfig::CONFIG_PATH,
            indoc! {r#"
                [run]
                retry-count = 5
                jobs = 2
                timeout = "30s"
                stderr = "inherit"

                [discovery]
                filter-flag = "--only"
            "#},
        );

        let config = RunTestCasesConfig::from_sources(dir.path(), None).expect("config is valid");
        let run = config.run();
        assert_eq!(run.retry_count.count(), 5);
        assert_eq!(run.jobs, TestJobs::Count(2));
        assert_eq!(run.timeout, Some(Duration::from_secs(30)));
        assert_eq!(run.stderr, StderrMode::Inherit);
        assert_eq!(run.poll_interval, Duration::from_millis(100), "default kept");
        assert_eq!(config.discovery().filter_flag, "--only");
        assert_eq!(config.discovery().list_flag, "--gtest_list_tests", "default kept");
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let dir = Utf8TempDir::new().unwrap();
        let error = RunTestCasesConfig::from_sources(dir.path(), Some("missing.toml".as_ref()))
            .expect_err("missing explicit config file is an error");
        assert_eq!(error.config_file(), dir.path().join("missing.toml"));
    }

    #[test]
    fn explicit_config_file_is_read() {
        let dir = Utf8TempDir::new().unwrap();
        write_config(&dir, "custom.toml", "[run]\nretry-count = 1\n");
        let config = RunTestCasesConfig::from_sources(dir.path(), Some("custom.toml".as_ref()))
            .expect("config is valid");
        assert_eq!(config.run().retry_count.count(), 1);
    }

    #[test]
    fn invalid_values_are_errors() {
        for contents in [
            "[run]\nretry-count = 0\n",
            "[run]\njobs = 0\n",
            "[run]\njobs = \"lots\"\n",
            "[run]\ntimeout = \"soon\"\n",
            "[run]\nstderr = \"discard\"\n",
        ] {
            let dir = Utf8TempDir::new().unwrap();
            write_config(&dir, RunTestCasesConfig::CONFIG_PATH, contents);
            RunTestCasesConfig::from_sources(dir.path(), None)
                .expect_err(&format!("config {contents:?} is invalid"));
        }
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let dir = Utf8TempDir::new().unwrap();
        write_config(
            &dir,
            RunTestCasesConfig::CONFIG_PATH,
            "[run]\nretry-count = 2\nshuffle = true\n\n[reporting]\nformat = \"xml\"\n",
        );
        let config =
            RunTestCasesConfig::from_sources(dir.path(), None).expect("unknown keys are ignored");
        assert_eq!(config.run().retry_count.count(), 2);
    }
}
