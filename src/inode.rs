//! Inode Cache: maps host URIs to stable inode ids, lazily loads
//! content, tracks references and deletion tombstones.
//!
//! A single `RefCell`-guarded map with a monotonic id allocator, keyed
//! on a single concrete inode value rather than `Any`-downcasted
//! heterogeneous entries.

use crate::error::Error;
use crate::fs_driver::HostFilesystem;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A single cached resource. Content is `None` until the first byte
/// read materialises it.
pub struct Inode {
    pub id: u64,
    pub uri: String,
    pub refcount: u32,
    pub content: Option<Vec<u8>>,
}

pub struct InodeCache {
    host: Rc<dyn HostFilesystem>,
    path_to_id: RefCell<HashMap<String, u64>>,
    live: RefCell<HashMap<u64, Inode>>,
    tombstones: RefCell<HashMap<u64, Inode>>,
    next_id: RefCell<u64>,
}

impl InodeCache {
    /// `device_id` 1 is reserved for the filesystem driver's own
    /// system/inode namespace; inode ids themselves start just above it
    /// and are never reused.
    pub fn new(host: Rc<dyn HostFilesystem>) -> Self {
        InodeCache {
            host,
            path_to_id: RefCell::new(HashMap::new()),
            live: RefCell::new(HashMap::new()),
            tombstones: RefCell::new(HashMap::new()),
            next_id: RefCell::new(2),
        }
    }

    /// Returns or creates the inode anchoring `uri`. `increment` is
    /// optional so that `readdir` can mint ids for entries it merely
    /// observes without pinning them open.
    pub fn ref_path(&self, uri: &str, increment: bool) -> u64 {
        let existing = self.path_to_id.borrow().get(uri).copied();
        let id = if let Some(id) = existing {
            id
        } else {
            let mut next_id = self.next_id.borrow_mut();
            let id = *next_id;
            *next_id += 1;
            self.path_to_id
                .borrow_mut()
                .insert(uri.to_string(), id);
            self.live.borrow_mut().insert(
                id,
                Inode {
                    id,
                    uri: uri.to_string(),
                    refcount: 0,
                    content: None,
                },
            );
            id
        };
        if increment {
            if let Some(inode) = self.live.borrow_mut().get_mut(&id) {
                inode.refcount += 1;
            }
        }
        id
    }

    /// Drops a reference; on zero, releases content and any tombstone.
    pub fn unref(&self, id: u64) {
        let should_drop = {
            let mut live = self.live.borrow_mut();
            if let Some(inode) = live.get_mut(&id) {
                inode.refcount = inode.refcount.saturating_sub(1);
                inode.refcount == 0 && !self.path_to_id_contains(id)
            } else {
                false
            }
        };
        if should_drop {
            self.live.borrow_mut().remove(&id);
        }
        let tomb_should_drop = {
            let mut tombstones = self.tombstones.borrow_mut();
            if let Some(inode) = tombstones.get_mut(&id) {
                inode.refcount = inode.refcount.saturating_sub(1);
                inode.refcount == 0
            } else {
                false
            }
        };
        if tomb_should_drop {
            self.tombstones.borrow_mut().remove(&id);
        }
    }

    fn path_to_id_contains(&self, id: u64) -> bool {
        self.path_to_id.borrow().values().any(|v| *v == id)
    }

    /// Returns the inode's content, loading it from the host on first
    /// access. Checks the live map, then the tombstone map, so
    /// tombstoned entries keep resolving and open descriptors keep
    /// functioning.
    pub fn resolve_content(&self, id: u64) -> Result<Vec<u8>, Error> {
        if let Some(inode) = self.live.borrow().get(&id) {
            if let Some(content) = &inode.content {
                return Ok(content.clone());
            }
        } else if let Some(inode) = self.tombstones.borrow().get(&id) {
            if let Some(content) = &inode.content {
                return Ok(content.clone());
            }
        } else {
            return Err(Error::Noent);
        }

        let uri = self.uri_of(id)?;
        let bytes = self.host.read_file(&uri)?;
        self.set_content(id, bytes.clone());
        Ok(bytes)
    }

    fn uri_of(&self, id: u64) -> Result<String, Error> {
        if let Some(inode) = self.live.borrow().get(&id) {
            return Ok(inode.uri.clone());
        }
        if let Some(inode) = self.tombstones.borrow().get(&id) {
            return Ok(inode.uri.clone());
        }
        Err(Error::Noent)
    }

    fn set_content(&self, id: u64, content: Vec<u8>) {
        if let Some(inode) = self.live.borrow_mut().get_mut(&id) {
            inode.content = Some(content);
            return;
        }
        if let Some(inode) = self.tombstones.borrow_mut().get_mut(&id) {
            inode.content = Some(content);
        }
    }

    /// Writes new content for an inode, flushing it to the host before
    /// returning — writes become visible to host storage before the
    /// syscall reports success.
    pub fn write_content(&self, id: u64, content: Vec<u8>) -> Result<(), Error> {
        let uri = self.uri_of(id)?;
        self.host.write_file(&uri, &content)?;
        self.set_content(id, content);
        Ok(())
    }

    /// Moves a live entry to the tombstone map; subsequent lookups by
    /// path return `None` while lookups by id keep resolving
    /// (POSIX-style unlink semantics).
    pub fn mark_deleted(&self, uri: &str) {
        if let Some(id) = self.path_to_id.borrow_mut().remove(uri) {
            if let Some(inode) = self.live.borrow_mut().remove(&id) {
                if inode.refcount > 0 {
                    self.tombstones.borrow_mut().insert(id, inode);
                }
            }
        }
    }

    pub fn lookup_path(&self, uri: &str) -> Option<u64> {
        self.path_to_id.borrow().get(uri).copied()
    }

    /// Reverse of `lookup_path`: the uri an inode id was last anchored
    /// at, whether or not it's since been deleted.
    pub fn lookup_path_by_id(&self, id: u64) -> Option<String> {
        self.uri_of(id).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockFilesystem;

    #[test]
    fn ref_path_is_stable_and_unique() {
        let fs = Rc::new(MockFilesystem::new());
        let cache = InodeCache::new(fs);
        let a = cache.ref_path("/x", true);
        let b = cache.ref_path("/x", true);
        assert_eq!(a, b);
        let c = cache.ref_path("/y", true);
        assert_ne!(a, c);
    }

    #[test]
    fn mark_deleted_hides_path_but_keeps_id_resolvable() {
        let fs = Rc::new(MockFilesystem::new());
        fs.write_file("/x", b"hi").unwrap();
        let cache = InodeCache::new(fs);
        let id = cache.ref_path("/x", true);
        cache.resolve_content(id).unwrap();
        cache.mark_deleted("/x");
        assert!(cache.lookup_path("/x").is_none());
        // id still resolves because refcount > 0 moved it to tombstones.
        assert_eq!(cache.resolve_content(id).unwrap(), b"hi".to_vec());
    }

    #[test]
    fn content_lazily_materialised_and_written_back() {
        let fs = Rc::new(MockFilesystem::new());
        fs.write_file("/a", b"abc").unwrap();
        let cache = InodeCache::new(fs.clone());
        let id = cache.ref_path("/a", true);
        assert_eq!(cache.resolve_content(id).unwrap(), b"abc".to_vec());
        cache.write_content(id, b"xyz".to_vec()).unwrap();
        assert_eq!(fs.read_file("/a").unwrap(), b"xyz".to_vec());
    }
}
