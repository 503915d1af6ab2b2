//! The internal error type and its mapping onto WASI errno values.
//!
//! Driver methods and the inode cache signal failure through [`Error`];
//! the dispatcher is the single place that converts an `Error` into the
//! numeric `Errno` a guest observes.

use crate::rights::{DirCaps, FileCaps};
use std::fmt;

/// A WASI preview-1 errno, numbered exactly as specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Errno {
    Success = 0,
    Badmsg = 9,
    Exist = 20,
    Isdir = 31,
    Inval = 28,
    Noent = 44,
    Notdir = 54,
    Nosys = 52,
    Perm = 63,
    Badf = 8,
    Ilseq = 138,
    Overflow = 61,
    Notempty = 55,
    Notcapable = 76,
    Fault = 21,
    Io = 29,
    Nomem = 48,
    Nospc = 51,
    Spipe = 70,
    Pipe = 64,
    Acces = 2,
    Busy = 16,
    Fbig = 22,
    Loop = 32,
    Mfile = 33,
    Mlink = 34,
    Nametoolong = 37,
    Nfile = 41,
    Range = 68,
    Notsup = 58,
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, *self as u16)
    }
}

/// Internal error type. Every syscall-reachable failure is one of these
/// variants; `From<Error> for Errno` is total — every error is
/// surfaced as a numeric return, with no fatal path from the core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not supported: {0}")]
    Unsupported(&'static str),
    #[error("bad file descriptor")]
    Badf,
    #[error("not a directory")]
    Notdir,
    #[error("is a directory")]
    Isdir,
    #[error("no such file or directory")]
    Noent,
    #[error("file exists")]
    Exist,
    #[error("invalid argument")]
    Inval,
    #[error("bad message")]
    Badmsg,
    #[error("directory not empty")]
    Notempty,
    #[error("value too large / count overflow")]
    Overflow,
    #[error("illegal byte sequence")]
    Ilseq,
    #[error("permission denied")]
    Perm,
    #[error("access denied")]
    Acces,
    #[error("resource busy")]
    Busy,
    #[error("file too large")]
    Fbig,
    #[error("symlink loop")]
    Loop,
    #[error("too many open files (process)")]
    Mfile,
    #[error("too many links")]
    Mlink,
    #[error("name too long")]
    Nametoolong,
    #[error("too many open files (system)")]
    Nfile,
    #[error("no space left on device")]
    Nospc,
    #[error("out of memory")]
    Nomem,
    #[error("illegal seek")]
    Spipe,
    #[error("broken pipe")]
    Pipe,
    #[error("result out of range")]
    Range,
    #[error("i/o error")]
    Io,
    #[error("bad guest pointer: {0}")]
    Fault(&'static str),
    #[error("file descriptor table overflow")]
    TableOverflow,
    #[error("descriptor lacks required file rights: wanted {desired:?}, has {has:?}")]
    FileNotCapable { desired: FileCaps, has: FileCaps },
    #[error("descriptor lacks required directory rights: wanted {desired:?}, has {has:?}")]
    DirNotCapable { desired: DirCaps, has: DirCaps },
    #[error("rights cannot be raised, only narrowed")]
    NotCapable,
    #[error("unexpected host failure: {0}")]
    UnexpectedHost(String),
}

impl From<std::num::TryFromIntError> for Error {
    fn from(_: std::num::TryFromIntError) -> Error {
        Error::Overflow
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(_: std::string::FromUtf8Error) -> Error {
        Error::Ilseq
    }
}

impl From<Error> for Errno {
    fn from(e: Error) -> Errno {
        use Error::*;
        match e {
            Unsupported(_) => Errno::Nosys,
            Badf => Errno::Badf,
            Notdir => Errno::Notdir,
            Isdir => Errno::Isdir,
            Noent => Errno::Noent,
            Exist => Errno::Exist,
            Inval => Errno::Inval,
            Badmsg => Errno::Badmsg,
            Notempty => Errno::Notempty,
            Overflow => Errno::Overflow,
            Ilseq => Errno::Ilseq,
            Perm => Errno::Perm,
            Acces => Errno::Acces,
            Busy => Errno::Busy,
            Fbig => Errno::Fbig,
            Loop => Errno::Loop,
            Mfile => Errno::Mfile,
            Mlink => Errno::Mlink,
            Nametoolong => Errno::Nametoolong,
            Nfile => Errno::Nfile,
            Nospc => Errno::Nospc,
            Nomem => Errno::Nomem,
            Spipe => Errno::Spipe,
            Pipe => Errno::Pipe,
            Range => Errno::Range,
            Io => Errno::Io,
            Fault(_) => Errno::Fault,
            TableOverflow => Errno::Overflow,
            // A rights-guard violation is a capability denial, not the
            // distinct "rights cannot be raised" WASI errno — §7 maps
            // it to `perm`.
            FileNotCapable { .. } => Errno::Perm,
            DirNotCapable { .. } => Errno::Perm,
            NotCapable => Errno::Perm,
            UnexpectedHost(_) => Errno::Badf,
        }
    }
}
