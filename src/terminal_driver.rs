//! Terminal driver: a character device backed by an injected
//! line/byte-oriented host collaborator, used for a guest's stdin when
//! the host wires up an interactive terminal rather than the plain
//! console sink.
//!
//! Buffers left-over bytes from a short host read in an
//! `Rc<RefCell<VecDeque<u8>>>`, since this crate's engine is
//! single-threaded and cooperative — no need for `Arc`/`RwLock`.

use crate::driver::DeviceDriver;
use crate::error::Error;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// The editor-provided interactive terminal: reads return whatever
/// bytes are currently available, writes are flushed immediately.
pub trait HostTerminal {
    fn read(&self, uri: &str) -> Result<Vec<u8>, Error>;
    fn write(&self, uri: &str, data: &[u8]) -> Result<(), Error>;
}

/// One open terminal channel. Unlike the filesystem driver, a terminal
/// has no stable inode content — `inode_id` here is only used as a key
/// into `buffers` so repeated short reads drain a single byte stream in
/// order.
pub struct TerminalDriver {
    host: Rc<dyn HostTerminal>,
    uri: String,
    buffers: RefCell<std::collections::HashMap<u64, VecDeque<u8>>>,
}

impl TerminalDriver {
    pub fn new(host: Rc<dyn HostTerminal>, uri: String) -> Self {
        TerminalDriver {
            host,
            uri,
            buffers: RefCell::new(std::collections::HashMap::new()),
        }
    }

    fn fill(&self, inode_id: u64) -> Result<(), Error> {
        let mut buffers = self.buffers.borrow_mut();
        let buf = buffers.entry(inode_id).or_default();
        if buf.is_empty() {
            let bytes = self.host.read(&self.uri)?;
            buf.extend(bytes);
        }
        Ok(())
    }
}

impl DeviceDriver for TerminalDriver {
    fn fd_read(&self, inode_id: u64, len: usize, _cursor: u64) -> Result<Vec<u8>, Error> {
        self.fill(inode_id)?;
        let mut buffers = self.buffers.borrow_mut();
        let buf = buffers.entry(inode_id).or_default();
        let n = len.min(buf.len());
        Ok(buf.drain(..n).collect())
    }

    fn fd_write(
        &self,
        _inode_id: u64,
        data: &[u8],
        cursor: u64,
        _append: bool,
    ) -> Result<(usize, u64), Error> {
        self.host.write(&self.uri, data)?;
        Ok((data.len(), cursor + data.len() as u64))
    }

    fn fd_bytes_available(&self, inode_id: u64) -> Result<u64, Error> {
        self.fill(inode_id)?;
        Ok(self
            .buffers
            .borrow()
            .get(&inode_id)
            .map(VecDeque::len)
            .unwrap_or(0) as u64)
    }
}
