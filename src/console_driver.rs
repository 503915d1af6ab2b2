//! Console driver: the fallback device for stdout/stderr when the host
//! has no interactive terminal, routing writes to the editor's output
//! panel/log instead.
//!
//! A write-only `DeviceDriver` backed by an injected sink rather than
//! an in-memory buffer.

use crate::driver::DeviceDriver;
use crate::error::Error;

/// The editor-provided console surface: `log` backs stdout, `error`
/// backs stderr.
pub trait HostConsole {
    fn log(&self, bytes: &[u8]) -> Result<(), Error>;
    fn error(&self, bytes: &[u8]) -> Result<(), Error>;
}

/// A generic byte sink, used when a console driver is asked to back a
/// descriptor other than fd 1/2 (additional preopened output channels
/// configured by the host).
pub trait HostByteSink {
    fn write(&self, uri: &str, bytes: &[u8]) -> Result<(), Error>;
}

pub enum ConsoleChannel {
    Stdout,
    Stderr,
    Sink { host: std::rc::Rc<dyn HostByteSink>, uri: String },
}

pub struct ConsoleDriver {
    console: std::rc::Rc<dyn HostConsole>,
    channel: ConsoleChannel,
}

impl ConsoleDriver {
    pub fn stdout(console: std::rc::Rc<dyn HostConsole>) -> Self {
        ConsoleDriver {
            console,
            channel: ConsoleChannel::Stdout,
        }
    }

    pub fn stderr(console: std::rc::Rc<dyn HostConsole>) -> Self {
        ConsoleDriver {
            console,
            channel: ConsoleChannel::Stderr,
        }
    }

    pub fn sink(console: std::rc::Rc<dyn HostConsole>, host: std::rc::Rc<dyn HostByteSink>, uri: String) -> Self {
        ConsoleDriver {
            console,
            channel: ConsoleChannel::Sink { host, uri },
        }
    }
}

impl DeviceDriver for ConsoleDriver {
    fn fd_write(
        &self,
        _inode_id: u64,
        data: &[u8],
        cursor: u64,
        _append: bool,
    ) -> Result<(usize, u64), Error> {
        match &self.channel {
            ConsoleChannel::Stdout => self.console.log(data)?,
            ConsoleChannel::Stderr => self.console.error(data)?,
            ConsoleChannel::Sink { host, uri } => host.write(uri, data)?,
        }
        Ok((data.len(), cursor + data.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockConsole;

    #[test]
    fn stdout_routes_to_log_not_error() {
        let console = std::rc::Rc::new(MockConsole::new());
        let driver = ConsoleDriver::stdout(console.clone());
        driver.fd_write(1, b"hi", 0, false).unwrap();
        assert_eq!(console.logged(), b"hi".to_vec());
        assert!(console.errored().is_empty());
    }

    #[test]
    fn stderr_routes_to_error_not_log() {
        let console = std::rc::Rc::new(MockConsole::new());
        let driver = ConsoleDriver::stderr(console.clone());
        driver.fd_write(2, b"oops", 0, false).unwrap();
        assert_eq!(console.errored(), b"oops".to_vec());
        assert!(console.logged().is_empty());
    }

    #[test]
    fn fd_read_is_unsupported() {
        let console = std::rc::Rc::new(MockConsole::new());
        let driver = ConsoleDriver::stdout(console);
        assert!(driver.fd_read(1, 10, 0).is_err());
    }
}
