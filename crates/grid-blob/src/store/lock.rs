//! Advisory byte-range locks on blob files.
//!
//! Writers lock `[tile_offset, tile_offset + bytes_per_tile)` around each
//! read-modify-write so that other processes sharing the blob see whole
//! tiles. POSIX record locks are per process; threads of one process are
//! kept apart by the writer's own mutex.

use crate::error::{GridBlobError, Result};
use crate::store::handle::Lease;

/// Exclusive lock on one tile's byte range. Holds the blob open and
/// unlocks on drop.
pub struct TileLock<'a> {
    lease: Lease<'a>,
    offset: u64,
    len: u64,
}

impl<'a> TileLock<'a> {
    /// Block until the range is locked.
    pub fn acquire(lease: Lease<'a>, offset: u64, len: u64) -> Result<Self> {
        sys::lock_range(lease.file(), offset, len).map_err(|e| GridBlobError::io(lease.path(), e))?;
        Ok(Self { lease, offset, len })
    }

    pub fn lease(&self) -> &Lease<'a> {
        &self.lease
    }
}

impl Drop for TileLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = sys::unlock_range(self.lease.file(), self.offset, self.len) {
            tracing::warn!(
                path = %self.lease.path().display(),
                offset = self.offset,
                error = %e,
                "Failed to release tile lock"
            );
        }
    }
}

#[cfg(unix)]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    fn set_lock(file: &File, kind: libc::c_short, offset: u64, len: u64) -> io::Result<()> {
        let mut fl: libc::flock = unsafe { std::mem::zeroed() };
        fl.l_type = kind as _;
        fl.l_whence = libc::SEEK_SET as _;
        fl.l_start = offset as libc::off_t;
        fl.l_len = len as libc::off_t;

        loop {
            let result = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_SETLKW, &fl as *const libc::flock) };
            if result == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    pub fn lock_range(file: &File, offset: u64, len: u64) -> io::Result<()> {
        set_lock(file, libc::F_WRLCK as _, offset, len)
    }

    pub fn unlock_range(file: &File, offset: u64, len: u64) -> io::Result<()> {
        set_lock(file, libc::F_UNLCK as _, offset, len)
    }
}

#[cfg(not(unix))]
mod sys {
    use std::fs::File;
    use std::io;

    // Only the in-process mutex applies on these platforms.
    pub fn lock_range(_file: &File, _offset: u64, _len: u64) -> io::Result<()> {
        Ok(())
    }

    pub fn unlock_range(_file: &File, _offset: u64, _len: u64) -> io::Result<()> {
        Ok(())
    }
}
