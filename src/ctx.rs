//! Process Context & Bootstrap: owns the FD table, the device
//! registry, and the process-scope configuration fixed at bootstrap.
//!
//! A builder accumulates args/env/preopens and produces an
//! immutable-after-`build()` context holding the table behind a
//! shared, interior-mutable handle. Descriptors don't hold driver
//! trait objects directly; the indirection runs through a device
//! registry keyed by device id, since several descriptors can share
//! one backing driver instance.

use crate::console_driver::{ConsoleDriver, HostConsole};
use crate::driver::{DeviceDriver, NosysDriver, PathOpenResult};
use crate::error::Error;
use crate::file::FileType;
use crate::fs_driver::{FsDriver, HostFilesystem};
use crate::rights::{FdFlags, OFlags, Rights};
use crate::sched::{HostClock, HostTimer};
use crate::table::{Descriptor, DescriptorHeader, DescriptorPayload, FdTable};
use crate::terminal_driver::{HostTerminal, TerminalDriver};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

/// Backs `random_get`: returns `len` bytes of host-sourced randomness.
pub trait HostCrypto {
    fn random_get(&self, len: usize) -> Vec<u8>;
}

/// A pre-open directory not yet mounted into the FD table: recorded at
/// `builder` time, drained into the table in `build()`.
struct PendingPreopen {
    device_id: u64,
    guest_path: PathBuf,
}

pub struct WasiCtx {
    table: Rc<RefCell<FdTable>>,
    devices: RefCell<std::collections::HashMap<u64, Rc<dyn DeviceDriver>>>,
    pub(crate) args: Vec<String>,
    pub(crate) env: Vec<(String, String)>,
    crypto: Rc<dyn HostCrypto>,
    pub(crate) timer: Rc<dyn HostTimer>,
    pub(crate) clock: Rc<dyn HostClock>,
    exit_handler: RefCell<Option<Box<dyn FnOnce(u32)>>>,
}

impl WasiCtx {
    pub fn table(&self) -> Rc<RefCell<FdTable>> {
        self.table.clone()
    }

    pub fn driver_for(&self, device_id: u64) -> Rc<dyn DeviceDriver> {
        self.devices
            .borrow()
            .get(&device_id)
            .cloned()
            .unwrap_or_else(|| Rc::new(NosysDriver))
    }

    pub fn random_bytes(&self, len: usize) -> Vec<u8> {
        self.crypto.random_get(len)
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn timer(&self) -> Rc<dyn HostTimer> {
        self.timer.clone()
    }

    pub fn clock(&self) -> Rc<dyn HostClock> {
        self.clock.clone()
    }

    /// Invokes the registered exit callback exactly once, as required
    /// by `proc_exit`. A second call is a programming error in the
    /// dispatcher, not a guest-observable one, so it's silently a
    /// no-op.
    pub fn fire_exit(&self, rval: u32) {
        if let Some(handler) = self.exit_handler.borrow_mut().take() {
            handler(rval);
        }
    }
}

pub struct WasiCtxBuilder {
    args: Vec<String>,
    env: Vec<(String, String)>,
    next_device_id: u64,
    devices: std::collections::HashMap<u64, Rc<dyn DeviceDriver>>,
    preopens: Vec<PendingPreopen>,
    stdio: [Option<(u64, Rights)>; 3],
    crypto: Option<Rc<dyn HostCrypto>>,
    timer: Option<Rc<dyn HostTimer>>,
    clock: Option<Rc<dyn HostClock>>,
    exit_handler: Option<Box<dyn FnOnce(u32)>>,
}

impl WasiCtxBuilder {
    pub fn new() -> Self {
        WasiCtxBuilder {
            args: Vec::new(),
            env: Vec::new(),
            next_device_id: 2, // device_id 1 is reserved for the inode cache's own namespace
            devices: std::collections::HashMap::new(),
            preopens: Vec::new(),
            stdio: [None, None, None],
            crypto: None,
            timer: None,
            clock: None,
            exit_handler: None,
        }
    }

    pub fn on_exit(mut self, handler: impl FnOnce(u32) + 'static) -> Self {
        self.exit_handler = Some(Box::new(handler));
        self
    }

    pub fn timer(mut self, timer: Rc<dyn HostTimer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn clock(mut self, clock: Rc<dyn HostClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn crypto(mut self, crypto: Rc<dyn HostCrypto>) -> Self {
        self.crypto = Some(crypto);
        self
    }

    fn register(&mut self, driver: Rc<dyn DeviceDriver>) -> u64 {
        let id = self.next_device_id;
        self.next_device_id += 1;
        self.devices.insert(id, driver);
        id
    }

    /// Mounts a filesystem-backed pre-open directory. `guest_path` is
    /// the path the guest will see via `fd_prestat_dir_name`.
    pub fn preopen_dir(mut self, host: Rc<dyn HostFilesystem>, guest_path: impl Into<PathBuf>) -> Self {
        let device_id = self.register(Rc::new(FsDriver::new(host)));
        self.preopens.push(PendingPreopen {
            device_id,
            guest_path: guest_path.into(),
        });
        self
    }

    pub fn stdin_terminal(mut self, host: Rc<dyn HostTerminal>, uri: impl Into<String>) -> Self {
        let device_id = self.register(Rc::new(TerminalDriver::new(host, uri.into())));
        self.stdio[0] = Some((device_id, Rights::stdin_base()));
        self
    }

    pub fn stdout_console(mut self, console: Rc<dyn HostConsole>) -> Self {
        let device_id = self.register(Rc::new(ConsoleDriver::stdout(console)));
        self.stdio[1] = Some((device_id, Rights::stdout_base()));
        self
    }

    pub fn stderr_console(mut self, console: Rc<dyn HostConsole>) -> Self {
        let device_id = self.register(Rc::new(ConsoleDriver::stderr(console)));
        self.stdio[2] = Some((device_id, Rights::stdout_base()));
        self
    }

    /// Finishes bootstrap: wires stdio into fds 0/1/2, mounts every
    /// registered pre-open in registration order, and hands the fd
    /// counter off to the table starting just above stdio.
    pub fn build(self) -> Result<WasiCtx, Error> {
        let mut table = FdTable::new();

        for (fd, slot) in self.stdio.iter().enumerate() {
            if let Some((device_id, rights)) = slot {
                table.insert_at(
                    fd as u32,
                    Descriptor {
                        header: DescriptorHeader {
                            device_id: *device_id,
                            filetype: FileType::CharacterDevice,
                            rights_base: *rights,
                            rights_inheriting: Rights::empty(),
                            fdflags: FdFlags::empty(),
                            inode_id: 0,
                        },
                        payload: DescriptorPayload::CharacterDevice,
                    },
                );
            }
        }

        for preopen in &self.preopens {
            let driver = self
                .devices
                .get(&preopen.device_id)
                .expect("preopen device registered at preopen_dir time")
                .clone();
            let path_str = preopen.guest_path.to_string_lossy().into_owned();
            let opened = driver.path_open(&PathBuf::from("/"), &path_str, OFlags::DIRECTORY, true)?;
            let (inode_id, path) = match opened {
                PathOpenResult::Dir { inode_id, path } => (inode_id, path),
                PathOpenResult::File { .. } => return Err(Error::Notdir),
            };
            table.insert_preopen(
                Descriptor {
                    header: DescriptorHeader {
                        device_id: preopen.device_id,
                        filetype: FileType::Directory,
                        rights_base: Rights::directory_base(),
                        rights_inheriting: Rights::directory_inheriting(),
                        fdflags: FdFlags::empty(),
                        inode_id,
                    },
                    payload: DescriptorPayload::Directory { path },
                },
                preopen.guest_path.to_string_lossy().into_owned(),
            );
        }

        Ok(WasiCtx {
            table: Rc::new(RefCell::new(table)),
            devices: RefCell::new(self.devices),
            args: if self.args.is_empty() {
                vec!["prog".to_string()]
            } else {
                self.args
            },
            env: self.env,
            crypto: self.crypto.unwrap_or_else(|| Rc::new(NullCrypto)),
            timer: self.timer.unwrap_or_else(|| Rc::new(NullTimer)),
            clock: self.clock.unwrap_or_else(|| Rc::new(NullClock)),
            exit_handler: RefCell::new(self.exit_handler),
        })
    }
}

impl Default for WasiCtxBuilder {
    fn default() -> Self {
        WasiCtxBuilder::new()
    }
}

/// Fallback crypto source when the host doesn't register one: always
/// zero bytes. Never used outside tests that don't exercise
/// `random_get`.
struct NullCrypto;
impl HostCrypto for NullCrypto {
    fn random_get(&self, len: usize) -> Vec<u8> {
        vec![0u8; len]
    }
}

/// Fallback timer: never actually sleeps. Only reached if the host
/// forgot to register a real one and the guest calls `poll_oneoff` with
/// a clock subscription that needs a sleep.
struct NullTimer;
impl HostTimer for NullTimer {
    fn sleep(&self, _milliseconds: u64) {}
}

/// Fallback clock: always reports time zero. Absolute-timeout clock
/// subscriptions degrade to "already expired" without a registered
/// clock.
struct NullClock;
impl HostClock for NullClock {
    fn realtime(&self) -> u64 {
        0
    }
    fn monotonic(&self) -> u64 {
        0
    }
}
