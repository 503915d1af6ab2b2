//! Host-side WASI preview-1 engine for sandboxed editor filesystems:
//! a capability-checked syscall surface over injected host
//! collaborators, with no dependency on a real OS filesystem,
//! terminal, or clock.
//!
//! `ctx`/`dir`/`error`/`file`/`table`/`stdio` form the process context
//! and descriptor bookkeeping; `rights` is the unified capability
//! algebra; `memory` is the hand-written guest memory view;
//! `inode`/`driver`/`fs_driver`/`terminal_driver`/`console_driver` make
//! up the device layer; `sched` is the poll engine; `dispatch` holds
//! the syscall entry points themselves.

mod console_driver;
mod dir;
mod dispatch;
mod driver;
mod error;
mod file;
mod fs_driver;
mod inode;
mod memory;
mod rights;
mod sched;
pub mod stdio;
mod table;
mod terminal_driver;

#[cfg(test)]
mod testutil;

mod ctx;

pub use console_driver::{ConsoleDriver, HostByteSink, HostConsole};
pub use ctx::{HostCrypto, WasiCtx, WasiCtxBuilder};
pub use driver::{Advice, DeviceDriver, NosysDriver, PathOpenResult};
pub use error::{Errno, Error};
pub use file::{FileType, Filestat};
pub use fs_driver::{FsDriver, HostFilesystem, HostStat};
pub use memory::GuestMemory;
pub use rights::{FdFlags, FstFlags, LookupFlags, OFlags, Rights, SubClockFlags};
pub use sched::{ClockId, HostClock, HostTimer, Poll, Subscription, SubscriptionClock, Userdata};
pub use terminal_driver::{HostTerminal, TerminalDriver};
