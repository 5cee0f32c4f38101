// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    io,
    os::windows::io::AsRawHandle,
    ptr, thread,
    time::{Duration, Instant},
};
use windows_sys::Win32::{
    Foundation::{ERROR_BROKEN_PIPE, HANDLE},
    Storage::FileSystem::ReadFile,
    System::Pipes::PeekNamedPipe,
};

const PEEK_INTERVAL: Duration = Duration::from_millis(1);

/// Returns `None` if no data is available yet, `Some(0)` at end of stream, and `Some(n)` if `n`
/// bytes were read into `buf`.
///
/// Anonymous pipes on Windows can't be waited on, so this peeks at the pipe every millisecond
/// until data shows up or `timeout` elapses. `ReadFile` is only called for bytes that are known
/// to be available, so it never blocks.
pub(super) fn read_nonblocking(
    pipe: &impl AsRawHandle,
    buf: &mut [u8],
    timeout: Duration,
) -> io::Result<Option<usize>> {
    let handle = pipe.as_raw_handle() as HANDLE;
    let start = Instant::now();

    loop {
        let available = match peek_available(handle) {
            Ok(available) => available,
            Err(error) if is_broken_pipe(&error) => return Ok(Some(0)),
            Err(error) => return Err(error),
        };

        if available > 0 {
            let max = u32::try_from(buf.len()).unwrap_or(u32::MAX);
            let to_read = available.min(max) as usize;
            return match read_file(handle, &mut buf[..to_read]) {
                Ok(n) => Ok(Some(n)),
                Err(error) if is_broken_pipe(&error) => Ok(Some(0)),
                Err(error) => Err(error),
            };
        }

        if timeout.is_zero() || start.elapsed() >= timeout {
            return Ok(None);
        }
        thread::sleep(PEEK_INTERVAL);
    }
}

fn peek_available(handle: HANDLE) -> io::Result<u32> {
    let mut available = 0u32;
    // SAFETY: handle is a valid pipe handle, and the only out-pointer is valid for writes.
    let ret = unsafe {
        PeekNamedPipe(
            handle,
            ptr::null_mut(),
            0,
            ptr::null_mut(),
            &mut available,
            ptr::null_mut(),
        )
    };
    if ret == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(available)
    }
}

fn read_file(handle: HANDLE, buf: &mut [u8]) -> io::Result<usize> {
    let mut read = 0u32;
    // SAFETY: buf is valid for writes of buf.len() bytes, which fits in a u32.
    let ret = unsafe {
        ReadFile(
            handle,
            buf.as_mut_ptr(),
            buf.len() as u32,
            &mut read,
            ptr::null_mut(),
        )
    };
    if ret == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(read as usize)
    }
}

fn is_broken_pipe(error: &io::Error) -> bool {
    error.raw_os_error() == Some(ERROR_BROKEN_PIPE as i32)
}
