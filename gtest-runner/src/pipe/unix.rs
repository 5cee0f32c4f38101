// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    io,
    os::fd::{AsRawFd, RawFd},
    time::Duration,
};

/// Returns `None` if no data is available yet, `Some(0)` at end of stream, and `Some(n)` if `n`
/// bytes were read into `buf`.
pub(super) fn read_nonblocking(
    pipe: &impl AsRawFd,
    buf: &mut [u8],
    timeout: Duration,
) -> io::Result<Option<usize>> {
    let fd = pipe.as_raw_fd();
    if !wait_readable(fd, timeout)? {
        return Ok(None);
    }

    let _guard = NonBlockingGuard::new(fd)?;
    // SAFETY: buf is valid for writes of buf.len() bytes.
    let ret = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    if ret < 0 {
        let error = io::Error::last_os_error();
        return match error.kind() {
            // Another reader got to the data first, or a signal arrived.
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(None),
            _ => Err(error),
        };
    }

    Ok(Some(ret as usize))
}

/// Waits until `fd` is readable or has hung up.
fn wait_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    // SAFETY: pollfd is a valid array of length 1.
    let ret = unsafe { libc::poll(&mut pollfd, 1, timeout_to_millis(timeout)) };
    if ret < 0 {
        let error = io::Error::last_os_error();
        if error.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(error);
    }

    // POLLHUP and POLLERR are reported even if not requested. In both cases the following read
    // returns immediately.
    Ok(ret > 0)
}

fn timeout_to_millis(timeout: Duration) -> libc::c_int {
    // Round up so a sub-millisecond timeout still waits rather than spinning.
    let millis = timeout.as_nanos().div_ceil(1_000_000);
    millis.min(libc::c_int::MAX as u128) as libc::c_int
}

/// Holds `O_NONBLOCK` on a descriptor, restoring the previous flags on drop.
struct NonBlockingGuard {
    fd: RawFd,
    flags: libc::c_int,
}

impl NonBlockingGuard {
    fn new(fd: RawFd) -> io::Result<Self> {
        // SAFETY: fcntl with F_GETFL has no memory safety requirements.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: as above.
        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd, flags })
    }
}

impl Drop for NonBlockingGuard {
    fn drop(&mut self) {
        // SAFETY: as above. An error here leaves the descriptor non-blocking, and the next read
        // handles WouldBlock.
        unsafe {
            libc::fcntl(self.fd, libc::F_SETFL, self.flags);
        }
    }
}
