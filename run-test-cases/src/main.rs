// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use color_eyre::Result;
use run_test_cases::RunTestCasesApp;
use std::io::{BufWriter, Write};

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = enable_ansi_support::enable_ansi_support();

    let opts = RunTestCasesApp::parse();
    let output = opts.init_output();

    let mut writer = BufWriter::new(std::io::stdout().lock());
    let result = opts.exec(output, &mut writer);
    // Anything buffered is part of the summary, so it goes out even if the run failed.
    let _ = writer.flush();

    match result {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr(&output.stderr_styles());
            std::process::exit(error.process_exit_code())
        }
    }
}
