// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::JobsParseError;
use serde::Deserialize;
use std::{cmp::Ordering, fmt, str::FromStr, sync::LazyLock};
use tracing::warn;

/// Gets the number of available CPUs, falling back to 1 if it can't be determined.
pub fn get_num_cpus() -> usize {
    static NUM_CPUS: LazyLock<usize> =
        LazyLock::new(|| match std::thread::available_parallelism() {
            Ok(count) => count.into(),
            Err(err) => {
                warn!("unable to determine num-cpus ({err}), assuming 1 logical CPU");
                1
            }
        });

    *NUM_CPUS
}

/// Type for the jobs config key and the `--jobs` option.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TestJobs {
    /// Run test cases on a specified number of workers.
    Count(usize),

    /// Run test cases on as many workers as there are logical CPUs.
    NumCpus,
}

impl TestJobs {
    /// Gets the actual number of workers computed at runtime.
    pub fn compute(self) -> usize {
        match self {
            Self::Count(jobs) => jobs,
            Self::NumCpus => get_num_cpus(),
        }
    }

    fn from_signed(jobs: i64) -> Option<Self> {
        match jobs.cmp(&0) {
            Ordering::Greater => Some(Self::Count(jobs as usize)),
            Ordering::Less => Some(Self::Count((get_num_cpus() as i64 + jobs).max(1) as usize)),
            Ordering::Equal => None,
        }
    }
}

impl FromStr for TestJobs {
    type Err = JobsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "num-cpus" {
            return Ok(Self::NumCpus);
        }

        match s.parse::<i64>() {
            Err(e) => Err(JobsParseError::new(format!("Error: {e} parsing {s}"))),
            Ok(jobs) => {
                Self::from_signed(jobs).ok_or_else(|| JobsParseError::new("jobs may not be 0"))
            }
        }
    }
}

impl fmt::Display for TestJobs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(jobs) => write!(f, "{jobs}"),
            Self::NumCpus => write!(f, "num-cpus"),
        }
    }
}

impl<'de> Deserialize<'de> for TestJobs {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = TestJobs;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a non-zero integer or the string \"num-cpus\"")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v == "num-cpus" {
                    Ok(TestJobs::NumCpus)
                } else {
                    Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Str(v),
                        &self,
                    ))
                }
            }

            // Note that TOML uses i64, not u64.
            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                TestJobs::from_signed(v).ok_or_else(|| {
                    serde::de::Error::invalid_value(serde::de::Unexpected::Signed(v), &self)
                })
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match i64::try_from(v) {
                    Ok(v) => self.visit_i64(v),
                    Err(_) => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Unsigned(v),
                        &self,
                    )),
                }
            }
        }

        deserializer.deserialize_any(V)
    }
}
