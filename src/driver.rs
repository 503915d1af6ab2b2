//! Device Driver: the uniform capability-based interface every
//! descriptor's backing store implements.
//!
//! A process-wide device registry maps device id to trait object. Every
//! method defaults to `Error::Unsupported` so a concrete driver need
//! only override what it supports.

use crate::dir::{ReaddirCursor, ReaddirEntity};
use crate::error::Error;
use crate::file::Filestat;
use crate::rights::OFlags;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advice {
    Normal,
    Sequential,
    Random,
    WillNeed,
    DontNeed,
    NoReuse,
}

/// What `path_open` produced: either a regular file (anchored at an
/// inode) or a child directory (anchored at a resolved path).
pub enum PathOpenResult {
    File { inode_id: u64, size: u64 },
    Dir { inode_id: u64, path: std::path::PathBuf },
}

/// Every operation a descriptor's backing device may be asked to
/// perform. Unsupported operations return `nosys`-class errors by
/// default.
pub trait DeviceDriver {
    fn fd_advise(&self, _inode_id: u64, _offset: u64, _len: u64, _advice: Advice) -> Result<(), Error> {
        Err(Error::Unsupported("fd_advise"))
    }
    fn fd_allocate(&self, _inode_id: u64, _offset: u64, _len: u64) -> Result<(), Error> {
        Err(Error::Unsupported("fd_allocate"))
    }
    fn fd_datasync(&self, _inode_id: u64) -> Result<(), Error> {
        Err(Error::Unsupported("fd_datasync"))
    }
    fn fd_sync(&self, _inode_id: u64) -> Result<(), Error> {
        Err(Error::Unsupported("fd_sync"))
    }
    fn fd_filestat_get(&self, _inode_id: u64) -> Result<Filestat, Error> {
        Err(Error::Unsupported("fd_filestat_get"))
    }
    fn fd_filestat_set_size(&self, _inode_id: u64, _size: u64) -> Result<(), Error> {
        Err(Error::Unsupported("fd_filestat_set_size"))
    }
    fn fd_filestat_set_times(
        &self,
        _inode_id: u64,
        _atim: Option<u64>,
        _mtim: Option<u64>,
    ) -> Result<(), Error> {
        Err(Error::Unsupported("fd_filestat_set_times"))
    }
    fn fd_pread(&self, _inode_id: u64, _len: usize, _offset: u64) -> Result<Vec<u8>, Error> {
        Err(Error::Unsupported("fd_pread"))
    }
    fn fd_pwrite(&self, _inode_id: u64, _data: &[u8], _offset: u64) -> Result<usize, Error> {
        Err(Error::Unsupported("fd_pwrite"))
    }
    /// `cursor` is the descriptor's current position for regular files;
    /// character devices ignore it.
    fn fd_read(&self, _inode_id: u64, _len: usize, _cursor: u64) -> Result<Vec<u8>, Error> {
        Err(Error::Unsupported("fd_read"))
    }
    /// `append` moves the effective write position to end-of-file
    /// before writing. Returns the number of bytes written and the
    /// descriptor's new cursor, since append mode decides the write
    /// offset internally.
    fn fd_write(
        &self,
        _inode_id: u64,
        _data: &[u8],
        _cursor: u64,
        _append: bool,
    ) -> Result<(usize, u64), Error> {
        Err(Error::Unsupported("fd_write"))
    }
    fn fd_readdir(
        &self,
        _inode_id: u64,
        _cookie: ReaddirCursor,
    ) -> Result<Vec<(ReaddirEntity, String)>, Error> {
        Err(Error::Unsupported("fd_readdir"))
    }
    fn path_create_directory(&self, _base: &Path, _path: &str) -> Result<(), Error> {
        Err(Error::Unsupported("path_create_directory"))
    }
    fn path_filestat_get(&self, _base: &Path, _path: &str) -> Result<Filestat, Error> {
        Err(Error::Unsupported("path_filestat_get"))
    }
    fn path_filestat_set_times(
        &self,
        _base: &Path,
        _path: &str,
        _atim: Option<u64>,
        _mtim: Option<u64>,
    ) -> Result<(), Error> {
        // Timestamp updates on editor-backed paths are not supported.
        Err(Error::Unsupported("path_filestat_set_times"))
    }
    fn path_link(&self, _src_base: &Path, _src: &str, _dst_base: &Path, _dst: &str) -> Result<(), Error> {
        Err(Error::Unsupported("path_link"))
    }
    fn path_open(
        &self,
        _base: &Path,
        _path: &str,
        _oflags: OFlags,
        _want_directory: bool,
    ) -> Result<PathOpenResult, Error> {
        Err(Error::Unsupported("path_open"))
    }
    fn path_readlink(&self, _base: &Path, _path: &str) -> Result<String, Error> {
        Err(Error::Unsupported("path_readlink"))
    }
    fn path_remove_directory(&self, _base: &Path, _path: &str) -> Result<(), Error> {
        Err(Error::Unsupported("path_remove_directory"))
    }
    fn path_rename(&self, _src_base: &Path, _src: &str, _dst_base: &Path, _dst: &str) -> Result<(), Error> {
        Err(Error::Unsupported("path_rename"))
    }
    fn path_symlink(&self, _old_path: &str, _base: &Path, _new_path: &str) -> Result<(), Error> {
        Err(Error::Unsupported("path_symlink"))
    }
    fn path_unlink_file(&self, _base: &Path, _path: &str) -> Result<(), Error> {
        Err(Error::Unsupported("path_unlink_file"))
    }
    /// Used by the poll engine's `fd_read` event.
    fn fd_bytes_available(&self, _inode_id: u64) -> Result<u64, Error> {
        Ok(0)
    }
    /// Only the filesystem and terminal drivers mount pre-opens;
    /// returns the next one in registration order, or `None` when the
    /// worklist is drained.
    fn fd_prestat_get(&self) -> Option<String> {
        None
    }
}

/// The literal nosys default: every method uses the trait's default
/// body. Used for `sock_*` entries and unrecognised device kinds at
/// bootstrap.
pub struct NosysDriver;

impl DeviceDriver for NosysDriver {}
