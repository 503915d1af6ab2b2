//! Directory-entry types shared by the dispatcher and the filesystem
//! driver's `readdir` implementation.
//!
//! Directory listing goes through `HostFilesystem::read_directory` (an
//! injected RPC), never real OS directory iteration.

use crate::file::FileType;

/// An opaque offset into a directory's entry stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReaddirCursor(pub u64);

impl From<u64> for ReaddirCursor {
    fn from(c: u64) -> ReaddirCursor {
        ReaddirCursor(c)
    }
}

impl From<ReaddirCursor> for u64 {
    fn from(c: ReaddirCursor) -> u64 {
        c.0
    }
}

/// One directory entry as `fd_readdir` packs it into the dirent wire
/// format.
#[derive(Debug, Clone)]
pub struct ReaddirEntity {
    pub next: ReaddirCursor,
    pub inode: u64,
    pub filetype: FileType,
}
