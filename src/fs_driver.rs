//! Filesystem driver: backed by the editor's virtual filesystem RPC,
//! with content cached and aliased by `InodeCache`.
//!
//! Targets the injected `HostFilesystem` collaborator rather than any
//! real OS filesystem crate — this crate never opens a real OS file
//! descriptor (see DESIGN.md's dependency-drop note).

use crate::dir::{ReaddirCursor, ReaddirEntity};
use crate::driver::{Advice, DeviceDriver, PathOpenResult};
use crate::error::Error;
use crate::file::{FileType, Filestat};
use crate::inode::InodeCache;
use crate::rights::OFlags;
use std::path::Path;
use std::rc::Rc;

/// `stat(uri)` result.
#[derive(Debug, Clone)]
pub struct HostStat {
    pub filetype: FileType,
    pub size: u64,
    pub mtime: u64,
    pub ctime: u64,
}

/// The editor-provided virtual filesystem RPC this driver consumes.
/// Implementing the RPC transport itself is out of scope here; a
/// caller provides it.
pub trait HostFilesystem {
    fn stat(&self, uri: &str) -> Result<HostStat, Error>;
    fn read_file(&self, uri: &str) -> Result<Vec<u8>, Error>;
    fn write_file(&self, uri: &str, data: &[u8]) -> Result<(), Error>;
    fn read_directory(&self, uri: &str) -> Result<Vec<(String, FileType)>, Error>;
    fn create_directory(&self, uri: &str) -> Result<(), Error>;
    fn rename(&self, from: &str, to: &str, overwrite: bool) -> Result<(), Error>;
    fn delete(&self, uri: &str, recursive: bool) -> Result<(), Error>;
}

/// Joins a directory descriptor's anchor path with a guest-supplied
/// relative path into one host URI. A bare `/`-join is sufficient here:
/// the host RPC owns real path normalisation, and this crate never
/// walks symlinks.
fn join_uri(base: &Path, path: &str) -> String {
    let base = base.to_string_lossy();
    if base.ends_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

pub struct FsDriver {
    host: Rc<dyn HostFilesystem>,
    cache: InodeCache,
}

impl FsDriver {
    pub fn new(host: Rc<dyn HostFilesystem>) -> Self {
        FsDriver {
            cache: InodeCache::new(host.clone()),
            host,
        }
    }

    /// Anchors `uri` in the inode cache, taking a reference.
    pub fn open_inode(&self, uri: &str) -> u64 {
        self.cache.ref_path(uri, true)
    }

    pub fn release_inode(&self, inode_id: u64) {
        self.cache.unref(inode_id)
    }

    fn filestat_of(&self, inode_id: u64, stat: HostStat) -> Filestat {
        Filestat {
            device_id: 1,
            inode: inode_id,
            filetype: stat.filetype,
            nlink: 1,
            size: stat.size,
            atim: stat.mtime,
            mtim: stat.mtime,
            ctim: stat.ctime,
        }
    }
}

impl DeviceDriver for FsDriver {
    fn fd_datasync(&self, inode_id: u64) -> Result<(), Error> {
        // Content already round-trips through write_file on every
        // mutation; datasync is a no-op confirmation.
        let _ = inode_id;
        Ok(())
    }

    fn fd_sync(&self, inode_id: u64) -> Result<(), Error> {
        self.fd_datasync(inode_id)
    }

    fn fd_advise(&self, _inode_id: u64, _offset: u64, _len: u64, _advice: Advice) -> Result<(), Error> {
        Ok(())
    }

    fn fd_allocate(&self, inode_id: u64, offset: u64, len: u64) -> Result<(), Error> {
        let mut content = self.cache.resolve_content(inode_id)?;
        let needed = offset.checked_add(len).ok_or(Error::Overflow)? as usize;
        if needed > content.len() {
            content.resize(needed, 0);
            self.cache.write_content(inode_id, content)?;
        }
        Ok(())
    }

    fn fd_filestat_get(&self, inode_id: u64) -> Result<Filestat, Error> {
        let uri = self
            .cache
            .lookup_path_by_id(inode_id)
            .ok_or(Error::Badf)?;
        let stat = self.host.stat(&uri)?;
        Ok(self.filestat_of(inode_id, stat))
    }

    fn fd_filestat_set_size(&self, inode_id: u64, size: u64) -> Result<(), Error> {
        let mut content = self.cache.resolve_content(inode_id)?;
        content.resize(size as usize, 0);
        self.cache.write_content(inode_id, content)
    }

    fn fd_pread(&self, inode_id: u64, len: usize, offset: u64) -> Result<Vec<u8>, Error> {
        let content = self.cache.resolve_content(inode_id)?;
        let offset = offset as usize;
        if offset >= content.len() {
            return Ok(Vec::new());
        }
        let end = (offset + len).min(content.len());
        Ok(content[offset..end].to_vec())
    }

    fn fd_pwrite(&self, inode_id: u64, data: &[u8], offset: u64) -> Result<usize, Error> {
        let mut content = self.cache.resolve_content(inode_id)?;
        let offset = offset as usize;
        if offset > content.len() {
            content.resize(offset, 0);
        }
        let end = offset + data.len();
        if end > content.len() {
            content.resize(end, 0);
        }
        content[offset..end].copy_from_slice(data);
        self.cache.write_content(inode_id, content)?;
        Ok(data.len())
    }

    fn fd_read(&self, inode_id: u64, len: usize, cursor: u64) -> Result<Vec<u8>, Error> {
        self.fd_pread(inode_id, len, cursor)
    }

    fn fd_write(
        &self,
        inode_id: u64,
        data: &[u8],
        cursor: u64,
        append: bool,
    ) -> Result<(usize, u64), Error> {
        let mut content = self.cache.resolve_content(inode_id)?;
        // Append mode moves the cursor to end-of-file on every write.
        let offset = if append { content.len() as u64 } else { cursor } as usize;
        if offset > content.len() {
            content.resize(offset, 0);
        }
        let end = offset + data.len();
        if end > content.len() {
            content.resize(end, 0);
        }
        content[offset..end].copy_from_slice(data);
        self.cache.write_content(inode_id, content)?;
        Ok((data.len(), end as u64))
    }

    fn fd_readdir(
        &self,
        inode_id: u64,
        cookie: ReaddirCursor,
    ) -> Result<Vec<(ReaddirEntity, String)>, Error> {
        let uri = self
            .cache
            .lookup_path_by_id(inode_id)
            .ok_or(Error::Badf)?;
        let entries = self.host.read_directory(&uri)?;
        let start = u64::from(cookie) as usize;
        Ok(entries
            .into_iter()
            .enumerate()
            .skip(start)
            .map(|(ix, (name, filetype))| {
                let child_uri = join_uri(Path::new(&uri), &name);
                let child_id = self.cache.ref_path(&child_uri, false);
                (
                    ReaddirEntity {
                        next: ReaddirCursor::from(ix as u64 + 1),
                        inode: child_id,
                        filetype,
                    },
                    name,
                )
            })
            .collect())
    }

    fn path_create_directory(&self, base: &Path, path: &str) -> Result<(), Error> {
        self.host.create_directory(&join_uri(base, path))
    }

    fn path_filestat_get(&self, base: &Path, path: &str) -> Result<Filestat, Error> {
        let uri = join_uri(base, path);
        let stat = self.host.stat(&uri)?;
        let inode_id = self.cache.ref_path(&uri, false);
        Ok(self.filestat_of(inode_id, stat))
    }

    fn path_open(
        &self,
        base: &Path,
        path: &str,
        oflags: OFlags,
        want_directory: bool,
    ) -> Result<PathOpenResult, Error> {
        let uri = join_uri(base, path);
        let exists = self.host.stat(&uri).is_ok();

        if oflags.contains(OFlags::EXCLUSIVE | OFlags::CREATE) && exists {
            return Err(Error::Exist);
        }
        if !oflags.contains(OFlags::CREATE) && !exists {
            return Err(Error::Noent);
        }

        if want_directory {
            if exists {
                let stat = self.host.stat(&uri)?;
                if stat.filetype != FileType::Directory {
                    return Err(Error::Notdir);
                }
            }
            let inode_id = self.cache.ref_path(&uri, true);
            return Ok(PathOpenResult::Dir {
                inode_id,
                path: std::path::PathBuf::from(uri),
            });
        }

        if !exists {
            self.host.write_file(&uri, &[])?;
        } else {
            let stat = self.host.stat(&uri)?;
            if stat.filetype == FileType::Directory {
                return Err(Error::Isdir);
            }
        }

        if oflags.contains(OFlags::TRUNCATE) {
            self.host.write_file(&uri, &[])?;
        }

        let inode_id = self.cache.ref_path(&uri, true);
        let size = self.cache.resolve_content(inode_id)?.len() as u64;
        Ok(PathOpenResult::File { inode_id, size })
    }

    fn path_remove_directory(&self, base: &Path, path: &str) -> Result<(), Error> {
        let uri = join_uri(base, path);
        self.host.delete(&uri, false)?;
        self.cache.mark_deleted(&uri);
        Ok(())
    }

    fn path_rename(&self, src_base: &Path, src: &str, dst_base: &Path, dst: &str) -> Result<(), Error> {
        let src_uri = join_uri(src_base, src);
        let dst_uri = join_uri(dst_base, dst);
        self.host.rename(&src_uri, &dst_uri, true)?;
        self.cache.mark_deleted(&src_uri);
        Ok(())
    }

    fn path_unlink_file(&self, base: &Path, path: &str) -> Result<(), Error> {
        let uri = join_uri(base, path);
        self.host.delete(&uri, false)?;
        self.cache.mark_deleted(&uri);
        Ok(())
    }

    fn fd_bytes_available(&self, inode_id: u64) -> Result<u64, Error> {
        Ok(self.cache.resolve_content(inode_id)?.len() as u64)
    }
}
