// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Non-blocking reads from a child process's output pipe.
//!
//! The main structure in this module is [`PipeReader`]. On Unix it waits for readiness with
//! `poll(2)` and reads with the descriptor temporarily switched to non-blocking mode. On Windows,
//! where anonymous pipes can't be multiplexed, it peeks at the pipe and only reads what is
//! already available.

use std::{
    io::{self, Read},
    time::Duration,
};

#[cfg(unix)]
#[path = "unix.rs"]
mod os;

#[cfg(windows)]
#[path = "windows.rs"]
mod os;

/// The number of bytes read at a time if a caller doesn't have a preference.
pub const DEFAULT_MAX_BYTES: usize = 1024;

/// The result of a single [`PipeReader::read_nonblocking`] call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadOutcome {
    /// Some data was read. This is never empty.
    Data(Vec<u8>),

    /// No data was available before the timeout elapsed. The stream is still open.
    Pending,

    /// The write end of the pipe was closed and all data has been read.
    Closed,
}

/// The read end of a pipe connected to a child process.
#[derive(Debug)]
pub struct PipeReader {
    inner: io::PipeReader,
}

impl PipeReader {
    /// Wraps the read end of an anonymous pipe.
    pub fn new(inner: io::PipeReader) -> Self {
        Self { inner }
    }

    /// Reads up to `max_bytes` bytes without blocking past `timeout`.
    ///
    /// A `timeout` of `None` or zero polls once and returns immediately. The pipe is left in
    /// blocking mode once this returns.
    pub fn read_nonblocking(
        &mut self,
        max_bytes: usize,
        timeout: Option<Duration>,
    ) -> io::Result<ReadOutcome> {
        let mut buf = vec![0; max_bytes.max(1)];
        let timeout = timeout.unwrap_or(Duration::ZERO);

        match os::read_nonblocking(&self.inner, &mut buf, timeout)? {
            None => Ok(ReadOutcome::Pending),
            Some(0) => Ok(ReadOutcome::Closed),
            Some(n) => {
                buf.truncate(n);
                Ok(ReadOutcome::Data(buf))
            }
        }
    }

    /// Blocks until the write end is closed, appending everything read to `buf`.
    pub fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        self.inner.read_to_end(buf)
    }
}
