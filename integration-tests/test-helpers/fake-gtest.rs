// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A stand-in for a gtest executable.
//!
//! It understands `--gtest_list_tests` and `--gtest_filter=<Fixture.Case>`. What a test case does
//! is decided by its case name, after any `DISABLED_` prefix:
//!
//! * `Pass*` passes.
//! * `Fail*` fails, writing to both stdout and stderr.
//! * `Hang*` prints a line and then sleeps for a minute.
//! * `FlakyOnce*` fails the first time and passes after that. A marker file is kept in
//!   `FAKE_GTEST_STATE_DIR`, or in the directory of the path this was invoked as (which may be a
//!   symlink) if that isn't set.
//!
//! Listing can be made to misbehave with `FAKE_GTEST_LIST_STDERR` (written to stderr) and
//! `FAKE_GTEST_LIST_EXIT` (the exit code).

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::{
    Result,
    eyre::{WrapErr, bail, eyre},
};
use std::{io::Write, time::Duration};

static CATALOG: &[(&str, &[&str])] = &[
    (
        "Math",
        &[
            "PassAddition",
            "PassSubtraction",
            "FailDivision",
            "FlakyOnceRounding",
            "DISABLED_PassSkipped",
        ],
    ),
    ("Io", &["PassRead", "HangBlockedRead"]),
    ("FLAKY_Network", &["PassConnect"]),
];

fn main() -> Result<()> {
    color_eyre::install()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "--gtest_list_tests") {
        list();
    }

    let Some(filter) = args
        .iter()
        .find_map(|arg| arg.strip_prefix("--gtest_filter="))
    else {
        bail!("expected --gtest_list_tests or --gtest_filter=<Fixture.Case>, got {args:?}");
    };

    let code = run(filter)?;
    std::process::exit(code);
}

fn list() -> ! {
    let mut stdout = std::io::stdout().lock();
    for (fixture, cases) in CATALOG {
        let _ = writeln!(stdout, "{fixture}.");
        for case in *cases {
            let _ = writeln!(stdout, "  {case}");
        }
    }
    let _ = stdout.flush();

    if let Ok(stderr) = std::env::var("FAKE_GTEST_LIST_STDERR") {
        eprint!("{stderr}");
    }
    let code = std::env::var("FAKE_GTEST_LIST_EXIT")
        .ok()
        .and_then(|code| code.parse().ok())
        .unwrap_or(0);
    std::process::exit(code);
}

fn run(filter: &str) -> Result<i32> {
    let known = CATALOG.iter().any(|(fixture, cases)| {
        cases
            .iter()
            .any(|case| format!("{fixture}.{case}") == filter)
    });
    if !known {
        println!("[==========] 0 tests from 0 test suites ran.");
        return Ok(0);
    }

    let (_, case) = filter
        .split_once('.')
        .ok_or_else(|| eyre!("filter {filter} is not of the form Fixture.Case"))?;
    let case = case.strip_prefix("DISABLED_").unwrap_or(case);

    println!("[ RUN      ] {filter}");
    let passed = if case.starts_with("Pass") {
        true
    } else if case.starts_with("Fail") {
        eprintln!("fake_gtest.cc:42: Failure");
        println!("Expected: 4\n  Actual: 5");
        false
    } else if case.starts_with("Hang") {
        std::io::stdout().flush()?;
        std::thread::sleep(Duration::from_secs(60));
        true
    } else if case.starts_with("FlakyOnce") {
        let marker = state_dir()?.join(format!("{filter}.ran"));
        if marker.exists() {
            true
        } else {
            std::fs::write(&marker, b"")
                .wrap_err_with(|| format!("failed to write marker {marker}"))?;
            println!("failed on the first try");
            false
        }
    } else {
        bail!("case {case} doesn't start with a known behavior");
    };

    if passed {
        println!("[       OK ] {filter} (0 ms)");
        Ok(0)
    } else {
        println!("[  FAILED  ] {filter} (0 ms)");
        Ok(1)
    }
}

fn state_dir() -> Result<Utf8PathBuf> {
    if let Ok(dir) = std::env::var("FAKE_GTEST_STATE_DIR") {
        return Ok(dir.into());
    }
    let invoked_as = std::env::args()
        .next()
        .ok_or_else(|| eyre!("no program name in arguments"))?;
    Ok(Utf8Path::new(&invoked_as)
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .map_or_else(|| Utf8PathBuf::from("."), Utf8Path::to_owned))
}
