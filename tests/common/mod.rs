//! Test doubles for the host collaborator traits, shared across the
//! integration tests in this directory. Integration tests compile
//! against the crate's public API only, so these mocks are separate
//! from (but grounded the same way as) `src/testutil.rs`'s in-crate
//! unit-test mocks.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use wasi_edge::{
    Error, FileType, HostClock, HostFilesystem, HostStat, HostTimer, WasiCtx, WasiCtxBuilder,
};

enum MockEntry {
    File(Vec<u8>),
    Dir,
}

pub struct MockFilesystem {
    entries: RefCell<BTreeMap<String, MockEntry>>,
}

impl MockFilesystem {
    pub fn new() -> Self {
        MockFilesystem {
            entries: RefCell::new(BTreeMap::new()),
        }
    }
}

impl HostFilesystem for MockFilesystem {
    fn stat(&self, uri: &str) -> Result<HostStat, Error> {
        match self.entries.borrow().get(uri) {
            Some(MockEntry::File(bytes)) => Ok(HostStat {
                filetype: FileType::RegularFile,
                size: bytes.len() as u64,
                mtime: 0,
                ctime: 0,
            }),
            Some(MockEntry::Dir) => Ok(HostStat {
                filetype: FileType::Directory,
                size: 0,
                mtime: 0,
                ctime: 0,
            }),
            None => Err(Error::Noent),
        }
    }

    fn read_file(&self, uri: &str) -> Result<Vec<u8>, Error> {
        match self.entries.borrow().get(uri) {
            Some(MockEntry::File(bytes)) => Ok(bytes.clone()),
            Some(MockEntry::Dir) => Err(Error::Isdir),
            None => Err(Error::Noent),
        }
    }

    fn write_file(&self, uri: &str, data: &[u8]) -> Result<(), Error> {
        self.entries
            .borrow_mut()
            .insert(uri.to_string(), MockEntry::File(data.to_vec()));
        Ok(())
    }

    fn read_directory(&self, uri: &str) -> Result<Vec<(String, FileType)>, Error> {
        let prefix = format!("{uri}/");
        let entries = self.entries.borrow();
        if !matches!(entries.get(uri), Some(MockEntry::Dir)) && uri != "/" {
            return Err(Error::Notdir);
        }
        Ok(entries
            .iter()
            .filter_map(|(path, entry)| {
                let rest = path.strip_prefix(&prefix)?;
                if rest.contains('/') {
                    return None;
                }
                let filetype = match entry {
                    MockEntry::File(_) => FileType::RegularFile,
                    MockEntry::Dir => FileType::Directory,
                };
                Some((rest.to_string(), filetype))
            })
            .collect())
    }

    fn create_directory(&self, uri: &str) -> Result<(), Error> {
        self.entries
            .borrow_mut()
            .insert(uri.to_string(), MockEntry::Dir);
        Ok(())
    }

    fn rename(&self, from: &str, to: &str, overwrite: bool) -> Result<(), Error> {
        let mut entries = self.entries.borrow_mut();
        if !overwrite && entries.contains_key(to) {
            return Err(Error::Exist);
        }
        let entry = entries.remove(from).ok_or(Error::Noent)?;
        entries.insert(to.to_string(), entry);
        Ok(())
    }

    fn delete(&self, uri: &str, _recursive: bool) -> Result<(), Error> {
        self.entries
            .borrow_mut()
            .remove(uri)
            .map(|_| ())
            .ok_or(Error::Noent)
    }
}

/// Records every `sleep` call instead of actually blocking the test.
pub struct RecordingTimer {
    calls: RefCell<Vec<u64>>,
}

impl RecordingTimer {
    pub fn new() -> Self {
        RecordingTimer { calls: RefCell::new(Vec::new()) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl HostTimer for RecordingTimer {
    fn sleep(&self, milliseconds: u64) {
        self.calls.borrow_mut().push(milliseconds);
    }
}

/// A clock that always reports the same instant unless advanced.
pub struct FixedClock(Cell<u64>);

impl FixedClock {
    pub fn new(now: u64) -> Self {
        FixedClock(Cell::new(now))
    }
}

impl HostClock for FixedClock {
    fn realtime(&self) -> u64 {
        self.0.get()
    }
    fn monotonic(&self) -> u64 {
        self.0.get()
    }
}

/// Builds a `WasiCtx` with a single filesystem pre-open mounted at
/// `/<mount>`, no stdio wired up.
pub fn ctx_with_preopen(fs: Rc<MockFilesystem>, mount: &str) -> WasiCtx {
    WasiCtxBuilder::new()
        .preopen_dir(fs, mount)
        .build()
        .expect("preopened filesystem should mount")
}
