//! In-memory stand-ins for the host collaborator traits, used only by
//! `#[cfg(test)]` modules across the crate.
//!
//! A shared in-memory buffer behind interior mutability, standing in
//! for a real OS resource in tests.

use crate::console_driver::HostConsole;
use crate::error::Error;
use crate::file::FileType;
use crate::fs_driver::{HostFilesystem, HostStat};
use crate::terminal_driver::HostTerminal;
use std::cell::RefCell;
use std::collections::BTreeMap;

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

pub struct MockTerminal {
    remaining: RefCell<Vec<u8>>,
    written: RefCell<Vec<u8>>,
}

impl MockTerminal {
    pub fn new(input: Vec<u8>) -> Self {
        MockTerminal {
            remaining: RefCell::new(input),
            written: RefCell::new(Vec::new()),
        }
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.borrow().clone()
    }
}

impl HostTerminal for MockTerminal {
    fn read(&self, _uri: &str) -> Result<Vec<u8>, Error> {
        Ok(std::mem::take(&mut self.remaining.borrow_mut()))
    }

    fn write(&self, _uri: &str, data: &[u8]) -> Result<(), Error> {
        self.written.borrow_mut().extend_from_slice(data);
        Ok(())
    }
}

pub struct MockConsole {
    log: RefCell<Vec<u8>>,
    error: RefCell<Vec<u8>>,
}

impl MockConsole {
    pub fn new() -> Self {
        MockConsole {
            log: RefCell::new(Vec::new()),
            error: RefCell::new(Vec::new()),
        }
    }

    pub fn logged(&self) -> Vec<u8> {
        self.log.borrow().clone()
    }

    pub fn errored(&self) -> Vec<u8> {
        self.error.borrow().clone()
    }
}

impl HostConsole for MockConsole {
    fn log(&self, bytes: &[u8]) -> Result<(), Error> {
        self.log.borrow_mut().extend_from_slice(bytes);
        Ok(())
    }

    fn error(&self, bytes: &[u8]) -> Result<(), Error> {
        self.error.borrow_mut().extend_from_slice(bytes);
        Ok(())
    }
}
