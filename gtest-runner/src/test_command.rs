// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running a single process with a wall-clock deadline.
//!
//! [`TestCommand::run_with_deadline`] spawns the process with its output connected to a pipe,
//! polls that pipe through a [`PipeReader`] until the process exits or the deadline passes, kills
//! and reaps the process if it ran too long, and finally drains whatever output was still
//! buffered.

use crate::pipe::{PipeReader, ReadOutcome};
use serde::Deserialize;
use std::{
    ffi::{OsStr, OsString},
    fmt, io,
    path::PathBuf,
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};
use tracing::debug;

/// The smallest amount of time a single poll is allowed to wait for.
const EPSILON: Duration = Duration::from_millis(1);

/// How long to sleep between liveness checks once the output pipe has been closed but the process
/// hasn't exited yet.
const CLOSED_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The number of bytes read from the pipe at a time.
const READ_CHUNK: usize = 64 * 1024;

/// The most output read from the pipe after the process has exited or been killed. A grandchild
/// that inherited the pipe could otherwise keep the drain going forever.
const DRAIN_LIMIT: usize = 16 * READ_CHUNK;

/// Where a child process's standard error goes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StderrMode {
    /// Standard error is written to the same pipe as standard output, and is captured along with
    /// it.
    #[default]
    Merge,

    /// Standard error is inherited from the current process and is not captured.
    Inherit,
}

/// The result of running a [`TestCommand`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Everything the process wrote to its output pipe.
    pub output: Vec<u8>,

    /// The exit code of the process.
    ///
    /// This is `None` if the process was killed after running past its deadline, or if it was
    /// terminated by a signal.
    pub return_code: Option<i32>,

    /// True if the process was killed because it ran past its deadline.
    pub timed_out: bool,
}

impl CommandOutput {
    /// Returns true if the process exited with code 0.
    pub fn is_success(&self) -> bool {
        self.return_code == Some(0)
    }
}

/// A command to run with its output captured.
#[derive(Clone, Debug)]
pub struct TestCommand {
    program: OsString,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    stderr: StderrMode,
}

impl TestCommand {
    /// Creates a new command for `program` with the given arguments.
    pub fn new(
        program: impl AsRef<OsStr>,
        args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    ) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: args.into_iter().map(|arg| arg.as_ref().to_owned()).collect(),
            current_dir: None,
            stderr: StderrMode::default(),
        }
    }

    /// Sets the working directory for the process.
    pub fn current_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Sets where standard error goes.
    pub fn stderr(&mut self, mode: StderrMode) -> &mut Self {
        self.stderr = mode;
        self
    }

    /// Returns a displayable form of the command line.
    pub fn display(&self) -> DisplayCommand<'_> {
        DisplayCommand(self)
    }

    /// Runs the command to completion, or until `deadline` has passed.
    ///
    /// With no deadline, this blocks until the process closes its output and exits. With a
    /// deadline, a process still running once it has passed is killed and reaped, and the output
    /// reports `timed_out`. In both cases all output the process managed to write is returned.
    ///
    /// Returns an error if the process could not be spawned or waited on.
    pub fn run_with_deadline(self, deadline: Option<Duration>) -> io::Result<CommandOutput> {
        let (reader, writer) = io::pipe()?;

        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        match self.stderr {
            StderrMode::Merge => {
                command.stderr(writer.try_clone()?);
            }
            StderrMode::Inherit => {
                command.stderr(Stdio::inherit());
            }
        }
        command.stdout(writer);

        debug!(command = %self.display(), ?deadline, "spawning process");
        let child = command.spawn()?;
        // The command holds the parent's copies of the write end. They must be closed for the
        // reader to ever see the end of the stream.
        drop(command);

        let mut child = ChildGuard::new(child);
        let mut reader = PipeReader::new(reader);

        match deadline {
            None => run_to_completion(&mut child, &mut reader),
            Some(deadline) => run_until(&mut child, &mut reader, deadline),
        }
    }
}

/// A displayable form of a [`TestCommand`], returned by [`TestCommand::display`].
#[derive(Clone, Copy, Debug)]
pub struct DisplayCommand<'a>(&'a TestCommand);

impl fmt::Display for DisplayCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(&self.0.program)
            .chain(&self.0.args)
            .map(|word| word.to_string_lossy());
        write!(f, "{}", shell_words::join(words))
    }
}

fn run_to_completion(child: &mut ChildGuard, reader: &mut PipeReader) -> io::Result<CommandOutput> {
    let mut output = Vec::new();
    reader.read_to_end(&mut output)?;
    let status = child.wait()?;

    Ok(CommandOutput {
        output,
        return_code: status.code(),
        timed_out: false,
    })
}

fn run_until(
    child: &mut ChildGuard,
    reader: &mut PipeReader,
    deadline: Duration,
) -> io::Result<CommandOutput> {
    let start = Instant::now();
    let mut output = Vec::new();
    let mut closed = false;

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }

        let elapsed = start.elapsed();
        if elapsed >= deadline {
            break None;
        }
        let remaining = (deadline - elapsed).max(EPSILON);

        if closed {
            // The process closed its output but is still running. There's nothing to wait on, so
            // sleep instead of spinning.
            thread::sleep(remaining.min(CLOSED_POLL_INTERVAL));
            continue;
        }

        match reader.read_nonblocking(READ_CHUNK, Some(remaining))? {
            ReadOutcome::Data(data) => output.extend_from_slice(&data),
            ReadOutcome::Pending => {}
            ReadOutcome::Closed => closed = true,
        }
    };

    let timed_out = status.is_none();
    if timed_out {
        debug!(?deadline, "process ran past its deadline, killing it");
        child.kill_and_wait()?;
    }

    if !closed {
        drain(reader, &mut output, DRAIN_LIMIT)?;
    }

    Ok(CommandOutput {
        output,
        // A killed process is always reported without an exit code, even if it managed to exit on
        // its own between the last check and the kill.
        return_code: status.and_then(|status| status.code()),
        timed_out,
    })
}

/// Reads what's already buffered in the pipe, up to `limit` bytes, without waiting for more.
fn drain(reader: &mut PipeReader, output: &mut Vec<u8>, limit: usize) -> io::Result<()> {
    let mut drained = 0;
    while drained < limit {
        match reader.read_nonblocking(READ_CHUNK.min(limit - drained), None)? {
            ReadOutcome::Data(data) => {
                drained += data.len();
                output.extend_from_slice(&data);
            }
            ReadOutcome::Pending | ReadOutcome::Closed => break,
        }
    }
    debug!(bytes = drained, limit, "drained remaining output");
    Ok(())
}

/// A spawned child process that is killed and reaped when dropped, unless it was already waited
/// on.
#[derive(Debug)]
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        self.reaped |= status.is_some();
        Ok(status)
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait()?;
        self.reaped = true;
        Ok(status)
    }

    fn kill_and_wait(&mut self) -> io::Result<ExitStatus> {
        if let Err(error) = self.child.kill() {
            // The process may have exited on its own in the meantime.
            debug!(pid = self.child.id(), %error, "failed to kill process");
        }
        self.wait()
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.kill_and_wait();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;

    fn sh(script: &str) -> TestCommand {
        TestCommand::new("sh", ["-c", script])
    }

    #[test]
    fn no_deadline_captures_output_and_exit_code() {
        let output = sh("echo hello; exit 3")
            .run_with_deadline(None)
            .expect("command ran");
        assert_eq!(
            output,
            CommandOutput {
                output: b"hello\n".to_vec(),
                return_code: Some(3),
                timed_out: false,
            }
        );
    }

    #[test]
    fn merge_captures_stderr() {
        let output = sh("echo out; echo err >&2")
            .run_with_deadline(Some(Duration::from_secs(30)))
            .expect("command ran");
        assert_eq!(String::from_utf8_lossy(&output.output), "out\nerr\n");
        assert!(output.is_success());
    }

    #[test]
    fn inherit_does_not_capture_stderr() {
        let mut command = sh("echo out; echo err >&2");
        command.stderr(StderrMode::Inherit);
        let output = command.run_with_deadline(None).expect("command ran");
        assert_eq!(output.output, b"out\n");
    }

    #[test]
    fn exits_before_deadline() {
        let start = Instant::now();
        let output = sh("printf abc; exit 2")
            .run_with_deadline(Some(Duration::from_secs(30)))
            .expect("command ran");
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(output.output, b"abc");
        assert_eq!(output.return_code, Some(2));
        assert!(!output.timed_out);
    }

    #[test]
    fn hung_process_is_killed() {
        let start = Instant::now();
        let output = sh("exec sleep 60")
            .run_with_deadline(Some(Duration::from_millis(200)))
            .expect("command ran");
        let elapsed = start.elapsed();

        assert!(output.timed_out);
        assert_eq!(output.return_code, None);
        assert!(!output.is_success());
        assert!(
            elapsed >= Duration::from_millis(200),
            "ran for at least the deadline ({elapsed:?})"
        );
        assert!(
            elapsed < Duration::from_secs(10),
            "killed promptly ({elapsed:?})"
        );
    }

    #[test]
    fn killed_process_is_reaped() {
        let output = sh("echo $$; exec sleep 60")
            .run_with_deadline(Some(Duration::from_millis(200)))
            .expect("command ran");
        assert!(output.timed_out);

        let pid: libc::pid_t = String::from_utf8_lossy(&output.output)
            .trim()
            .parse()
            .expect("output is the pid");
        // SAFETY: signal 0 only checks whether the process exists.
        let ret = unsafe { libc::kill(pid, 0) };
        assert_eq!(ret, -1, "process {pid} no longer exists");
        assert_eq!(io::Error::last_os_error().raw_os_error(), Some(libc::ESRCH));
    }

    #[test]
    fn output_before_kill_is_kept() {
        let output = sh("echo before; exec sleep 60")
            .run_with_deadline(Some(Duration::from_millis(300)))
            .expect("command ran");
        assert!(output.timed_out);
        assert_eq!(output.output, b"before\n");
    }

    #[test]
    fn closed_output_with_live_process() {
        let start = Instant::now();
        let output = sh("echo gone; exec >&- 2>&- sleep 60")
            .run_with_deadline(Some(Duration::from_millis(300)))
            .expect("command ran");
        assert!(output.timed_out);
        assert_eq!(output.output, b"gone\n");
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn output_larger_than_pipe_buffer() {
        let output = sh("head -c 300000 /dev/zero")
            .run_with_deadline(Some(Duration::from_secs(30)))
            .expect("command ran");
        assert_eq!(output.output.len(), 300000);
        assert_eq!(output.return_code, Some(0));
    }

    #[test]
    fn killed_by_signal_has_no_exit_code() {
        let output = sh("kill -9 $$")
            .run_with_deadline(Some(Duration::from_secs(30)))
            .expect("command ran");
        assert_eq!(output.return_code, None);
        assert!(!output.timed_out);
    }

    #[test]
    fn runs_in_current_dir() {
        let dir = Utf8TempDir::new().expect("temp dir created");
        let mut command = TestCommand::new("pwd", std::iter::empty::<&str>());
        command.current_dir(dir.path());
        let output = command.run_with_deadline(None).expect("command ran");

        let printed = String::from_utf8(output.output).expect("pwd output is UTF-8");
        assert_eq!(
            std::fs::canonicalize(printed.trim()).unwrap(),
            std::fs::canonicalize(dir.path()).unwrap(),
        );
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let error = TestCommand::new("/nonexistent/run-test-cases-binary", ["--help"])
            .run_with_deadline(Some(Duration::from_secs(1)))
            .expect_err("spawning a missing binary fails");
        assert_eq!(error.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn display_quotes_arguments() {
        let command = TestCommand::new("bin/test", ["--gtest_filter=Suite.Case", "a b"]);
        assert_eq!(
            command.display().to_string(),
            "bin/test '--gtest_filter=Suite.Case' 'a b'"
        );
    }

    fn filled_pipe(len: usize) -> PipeReader {
        let (reader, mut writer) = io::pipe().expect("pipe created");
        io::Write::write_all(&mut writer, &vec![b'x'; len]).expect("fits in the pipe buffer");
        PipeReader::new(reader)
    }

    #[test]
    fn drain_stops_at_limit() {
        let mut reader = filled_pipe(16 * 1024);
        let mut output = Vec::new();
        drain(&mut reader, &mut output, 10_000).expect("drained");
        assert_eq!(output.len(), 10_000);
    }

    #[test]
    fn drain_stops_when_empty() {
        // The write end stays open, so the pipe is pending rather than closed once it's empty.
        let (reader, mut writer) = io::pipe().expect("pipe created");
        io::Write::write_all(&mut writer, b"leftover").expect("fits in the pipe buffer");
        let mut reader = PipeReader::new(reader);

        let mut output = Vec::new();
        drain(&mut reader, &mut output, DRAIN_LIMIT).expect("drained");
        assert_eq!(output, b"leftover");
        drop(writer);
    }
}
