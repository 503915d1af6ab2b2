//! File-Descriptor Table: allocates, stores, and retrieves
//! descriptors; links each to a device and inode; owns pre-open
//! dirnames.
//!
//! A `RefCell`-guarded map plus monotonic id allocator, holding one
//! concrete `Descriptor` type with a variant-tagged payload instead of
//! `Any`-downcasted heterogeneous entries, since every descriptor this
//! crate manages shares the same header.

use crate::error::Error;
use crate::file::FileType;
use crate::rights::{FdFlags, Rights};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

/// Fields common to every descriptor variant.
pub struct DescriptorHeader {
    pub device_id: u64,
    pub filetype: FileType,
    pub rights_base: Rights,
    pub rights_inheriting: Rights,
    pub fdflags: FdFlags,
    pub inode_id: u64,
}

/// Variant-specific payload: a tagged enum, since only the
/// regular-file variant carries a cursor.
pub enum DescriptorPayload {
    RegularFile { cursor: u64 },
    Directory { path: PathBuf },
    CharacterDevice,
}

pub struct Descriptor {
    pub header: DescriptorHeader,
    pub payload: DescriptorPayload,
}

impl Descriptor {
    pub fn is_directory(&self) -> bool {
        matches!(self.payload, DescriptorPayload::Directory { .. })
    }

    pub fn is_regular_file(&self) -> bool {
        matches!(self.payload, DescriptorPayload::RegularFile { .. })
    }

    pub fn cursor(&self) -> Result<u64, Error> {
        match &self.payload {
            DescriptorPayload::RegularFile { cursor } => Ok(*cursor),
            _ => Err(Error::Badf),
        }
    }

    pub fn set_cursor(&mut self, new_cursor: u64) -> Result<(), Error> {
        match &mut self.payload {
            DescriptorPayload::RegularFile { cursor } => {
                *cursor = new_cursor;
                Ok(())
            }
            _ => Err(Error::Badf),
        }
    }

    pub fn directory_path(&self) -> Result<&PathBuf, Error> {
        match &self.payload {
            DescriptorPayload::Directory { path } => Ok(path),
            _ => Err(Error::Notdir),
        }
    }

    /// Asserts the descriptor's `rights_base` is a superset of `want`.
    /// Every syscall entry runs this guard before touching a driver.
    pub fn require(&self, want: Rights) -> Result<(), Error> {
        if self.header.rights_base.contains(want) {
            Ok(())
        } else {
            Err(Error::FileNotCapable {
                desired: want,
                has: self.header.rights_base,
            })
        }
    }
}

/// One in-flight `fd_readdir` continuation: the entries that didn't fit
/// in the caller's last buffer.
pub type PendingReaddir = VecDeque<(crate::dir::ReaddirEntity, String)>;

pub struct FdTable {
    entries: HashMap<u32, RefCell<Descriptor>>,
    next_fd: u32,
    prestat_names: HashMap<u32, String>,
    pending_readdir: RefCell<HashMap<u32, PendingReaddir>>,
}

impl FdTable {
    pub fn new() -> Self {
        FdTable {
            entries: HashMap::new(),
            next_fd: 3, // 0, 1, 2 reserved for stdio
            prestat_names: HashMap::new(),
            pending_readdir: RefCell::new(HashMap::new()),
        }
    }

    pub fn insert_at(&mut self, fd: u32, d: Descriptor) {
        self.entries.insert(fd, RefCell::new(d));
    }

    /// Inserts a pre-open directory descriptor, reserving the next fd
    /// in the contiguous prefix just above stdio. `fd_prestat_get`
    /// drains the worklist implicitly: the guest calls it with fds
    /// starting just above stdio and stops at the first `badf`, which
    /// `prestat_name` naturally produces once the contiguous run of
    /// pre-opens ends.
    pub fn insert_preopen(&mut self, d: Descriptor, mount_name: String) -> u32 {
        let fd = self.next_fd;
        self.next_fd += 1;
        self.entries.insert(fd, RefCell::new(d));
        self.prestat_names.insert(fd, mount_name);
        fd
    }

    pub fn push(&mut self, d: Descriptor) -> Result<u32, Error> {
        loop {
            let fd = self.next_fd;
            self.next_fd = self.next_fd.checked_add(1).ok_or(Error::TableOverflow)?;
            if self.entries.contains_key(&fd) {
                continue;
            }
            self.entries.insert(fd, RefCell::new(d));
            return Ok(fd);
        }
    }

    pub fn contains(&self, fd: u32) -> bool {
        self.entries.contains_key(&fd)
    }

    pub fn get(&self, fd: u32) -> Result<Ref<Descriptor>, Error> {
        self.entries
            .get(&fd)
            .ok_or(Error::Badf)?
            .try_borrow()
            .map_err(|_| Error::Badf)
    }

    pub fn get_mut(&self, fd: u32) -> Result<RefMut<Descriptor>, Error> {
        self.entries
            .get(&fd)
            .ok_or(Error::Badf)?
            .try_borrow_mut()
            .map_err(|_| Error::Badf)
    }

    /// Removes a descriptor; any later syscall on this fd must then
    /// fail with `badf`.
    pub fn close(&mut self, fd: u32) -> Result<Descriptor, Error> {
        self.pending_readdir.borrow_mut().remove(&fd);
        self.prestat_names.remove(&fd);
        self.entries
            .remove(&fd)
            .map(RefCell::into_inner)
            .ok_or(Error::Badf)
    }

    pub fn prestat_name(&self, fd: u32) -> Option<&str> {
        self.prestat_names.get(&fd).map(|s| s.as_str())
    }

    /// Returns the buffered continuation for `fd` only if it still
    /// starts at `cookie` — otherwise the caller should re-fetch from
    /// the driver and the stale buffer is discarded.
    pub fn take_pending_readdir(&self, fd: u32, cookie: u64) -> Option<PendingReaddir> {
        let mut map = self.pending_readdir.borrow_mut();
        let starts_at = map
            .get(&fd)
            .and_then(|q| q.front())
            .map(|(entity, _)| u64::from(entity.next) - 1);
        if starts_at == Some(cookie) {
            map.remove(&fd)
        } else {
            map.remove(&fd);
            None
        }
    }

    pub fn store_pending_readdir(&self, fd: u32, pending: PendingReaddir) {
        if !pending.is_empty() {
            self.pending_readdir.borrow_mut().insert(fd, pending);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileType;

    fn char_device(rights: Rights) -> Descriptor {
        Descriptor {
            header: DescriptorHeader {
                device_id: 1,
                filetype: FileType::CharacterDevice,
                rights_base: rights,
                rights_inheriting: Rights::empty(),
                fdflags: FdFlags::empty(),
                inode_id: 1,
            },
            payload: DescriptorPayload::CharacterDevice,
        }
    }

    #[test]
    fn badf_after_close() {
        let mut table = FdTable::new();
        let fd = table.push(char_device(Rights::FD_READ)).unwrap();
        assert!(table.get(fd).is_ok());
        table.close(fd).unwrap();
        assert!(table.get(fd).is_err());
        assert!(table.close(fd).is_err());
    }

    #[test]
    fn prestat_get_badf_after_preopen_run_ends() {
        let mut table = FdTable::new();
        let a = table.insert_preopen(char_device(Rights::empty()), "/a".into());
        let b = table.insert_preopen(char_device(Rights::empty()), "/b".into());
        assert_eq!(b, a + 1);
        assert!(table.prestat_name(a).is_some());
        assert!(table.prestat_name(b).is_some());
        assert!(table.prestat_name(b + 1).is_none());
    }

    #[test]
    fn fd_allocation_starts_above_stdio() {
        let mut table = FdTable::new();
        let fd = table.push(char_device(Rights::empty())).unwrap();
        assert!(fd >= 3);
    }

    #[test]
    fn require_violation_maps_to_perm_not_notcapable() {
        let d = char_device(Rights::FD_WRITE);
        let err = d.require(Rights::FD_READ).unwrap_err();
        assert_eq!(crate::error::Errno::from(err), crate::error::Errno::Perm);
    }
}
