//! Lazily opened blob file handles.
//!
//! A [`BlobHandle`] owns the path of one blob and an optional open file.
//! The mutex only guards opening and closing; transfers run on a cloned
//! `Arc<File>` with positional I/O, so concurrent readers never serialize
//! on a shared cursor.
//!
//! The file is closed as soon as nobody uses it, unless it is pinned or the
//! handle was created with `leave_open`.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{GridBlobError, Result};

/// How a blob file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, read access only.
    Read,
    /// Read/write access, creating the file on first use.
    ReadWriteCreate,
}

#[derive(Debug, Default)]
struct Slot {
    file: Option<Arc<File>>,
    users: usize,
}

/// One blob file and its lazily opened handle.
#[derive(Debug)]
pub struct BlobHandle {
    path: PathBuf,
    mode: OpenMode,
    leave_open: bool,
    slot: Mutex<Slot>,
}

impl BlobHandle {
    pub fn new(path: impl Into<PathBuf>, mode: OpenMode, leave_open: bool) -> Self {
        Self {
            path: path.into(),
            mode,
            leave_open,
            slot: Mutex::new(Slot::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// True if the file is currently open.
    pub fn is_open(&self) -> bool {
        self.lock_slot().map(|slot| slot.file.is_some()).unwrap_or(false)
    }

    fn lock_slot(&self) -> Result<MutexGuard<'_, Slot>> {
        self.slot.lock().map_err(|_| {
            GridBlobError::io(
                &self.path,
                io::Error::new(io::ErrorKind::Other, "blob handle mutex poisoned"),
            )
        })
    }

    fn open_file(&self) -> Result<File> {
        let mut options = OpenOptions::new();
        match self.mode {
            OpenMode::Read => options.read(true),
            OpenMode::ReadWriteCreate => options.read(true).write(true).create(true),
        };
        let file = options.open(&self.path).map_err(|e| GridBlobError::io(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), mode = ?self.mode, "Opened blob");
        Ok(file)
    }

    /// Borrow the open file for one transfer, opening it if needed.
    pub fn lease(&self) -> Result<Lease<'_>> {
        let mut slot = self.lock_slot()?;
        let file = match &slot.file {
            Some(file) => Arc::clone(file),
            None => {
                let file = Arc::new(self.open_file()?);
                slot.file = Some(Arc::clone(&file));
                file
            }
        };
        slot.users += 1;
        Ok(Lease { handle: self, file })
    }

    /// Keep the file open until the returned guard drops.
    pub fn pin(&self) -> Result<PinGuard<'_>> {
        let lease = self.lease()?;
        Ok(PinGuard { _lease: lease })
    }

    /// Open the file now. With `leave_open` it stays open for the lifetime
    /// of the handle.
    pub fn open_now(&self) -> Result<()> {
        self.lease().map(drop)
    }

    fn release(&self) {
        let Ok(mut slot) = self.slot.lock() else {
            return;
        };
        slot.users = slot.users.saturating_sub(1);
        if slot.users == 0 && !self.leave_open && slot.file.take().is_some() {
            tracing::debug!(path = %self.path.display(), "Closed blob");
        }
    }

    /// Current file length, or 0 if a create-on-demand file does not exist yet.
    pub fn file_len(&self) -> Result<u64> {
        if self.mode == OpenMode::ReadWriteCreate && !self.is_open() && !self.path.exists() {
            return Ok(0);
        }
        let lease = self.lease()?;
        lease
            .file()
            .metadata()
            .map(|m| m.len())
            .map_err(|e| GridBlobError::io(&self.path, e))
    }

    /// Grow or shrink the file to `len` bytes.
    pub fn set_len(&self, len: u64) -> Result<()> {
        let lease = self.lease()?;
        lease
            .file()
            .set_len(len)
            .map_err(|e| GridBlobError::io(&self.path, e))
    }
}

/// Shared access to an open blob for the duration of one transfer.
pub struct Lease<'a> {
    handle: &'a BlobHandle,
    file: Arc<File>,
}

impl Lease<'_> {
    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn path(&self) -> &Path {
        &self.handle.path
    }

    /// Read into `buf` at `offset`. Bytes past the end of the file are
    /// zero-filled. Returns the number of bytes that came from the file.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match positional::read_at(&self.file, &mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf[filled..].fill(0);
        Ok(filled)
    }

    /// Write all of `buf` at `offset`.
    pub fn write_all_at(&self, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match positional::write_at(&self.file, buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole tile",
                    ))
                }
                Ok(n) => {
                    buf = &buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.handle.release();
    }
}

/// Keeps a blob open while alive.
pub struct PinGuard<'a> {
    _lease: Lease<'a>,
}

#[cfg(unix)]
mod positional {
    use std::fs::File;
    use std::io;
    use std::os::unix::fs::FileExt;

    pub fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        file.read_at(buf, offset)
    }

    pub fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
        file.write_at(buf, offset)
    }
}

#[cfg(windows)]
mod positional {
    use std::fs::File;
    use std::io;
    use std::os::windows::fs::FileExt;

    pub fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        file.seek_read(buf, offset)
    }

    pub fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
        file.seek_write(buf, offset)
    }
}
