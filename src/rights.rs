//! Rights & flags algebra: bitmask capabilities and the decoded flag
//! types every syscall entry gates on.
//!
//! Each bitmask is a newtype around an integer with `pub const` named
//! values and `contains`/`intersection`/`BitOr`, rather than a
//! `bitflags!` macro. A single 64-bit `Rights` space covers both
//! directory and file capabilities, since `rights_inheriting` on a
//! directory and `rights_base` on a file share one bit layout.

macro_rules! bitmask_type {
    ($name:ident, $int:ty) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name(pub $int);

        impl $name {
            pub const fn empty() -> Self {
                $name(0)
            }

            pub fn contains(&self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn intersection(&self, rhs: Self) -> Self {
                $name(self.0 & rhs.0)
            }

            pub fn is_empty(&self) -> bool {
                self.0 == 0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0;
            }
        }
    };
}

bitmask_type!(Rights, u64);

impl Rights {
    pub const FD_DATASYNC: Rights = Rights(1 << 0);
    pub const FD_READ: Rights = Rights(1 << 1);
    pub const FD_SEEK: Rights = Rights(1 << 2);
    pub const FD_FDSTAT_SET_FLAGS: Rights = Rights(1 << 3);
    pub const FD_SYNC: Rights = Rights(1 << 4);
    pub const FD_TELL: Rights = Rights(1 << 5);
    pub const FD_WRITE: Rights = Rights(1 << 6);
    pub const FD_ADVISE: Rights = Rights(1 << 7);
    pub const FD_ALLOCATE: Rights = Rights(1 << 8);
    pub const PATH_CREATE_DIRECTORY: Rights = Rights(1 << 9);
    pub const PATH_CREATE_FILE: Rights = Rights(1 << 10);
    pub const PATH_LINK_SOURCE: Rights = Rights(1 << 11);
    pub const PATH_LINK_TARGET: Rights = Rights(1 << 12);
    pub const PATH_OPEN: Rights = Rights(1 << 13);
    pub const FD_READDIR: Rights = Rights(1 << 14);
    pub const PATH_READLINK: Rights = Rights(1 << 15);
    pub const PATH_RENAME_SOURCE: Rights = Rights(1 << 16);
    pub const PATH_RENAME_TARGET: Rights = Rights(1 << 17);
    pub const PATH_FILESTAT_GET: Rights = Rights(1 << 18);
    pub const PATH_FILESTAT_SET_SIZE: Rights = Rights(1 << 19);
    pub const PATH_FILESTAT_SET_TIMES: Rights = Rights(1 << 20);
    pub const FD_FILESTAT_GET: Rights = Rights(1 << 21);
    pub const FD_FILESTAT_SET_SIZE: Rights = Rights(1 << 22);
    pub const FD_FILESTAT_SET_TIMES: Rights = Rights(1 << 23);
    pub const PATH_SYMLINK: Rights = Rights(1 << 24);
    pub const PATH_REMOVE_DIRECTORY: Rights = Rights(1 << 25);
    pub const PATH_UNLINK_FILE: Rights = Rights(1 << 26);
    pub const POLL_FD_READWRITE: Rights = Rights(1 << 27);
    pub const SOCK_SHUTDOWN: Rights = Rights(1 << 28);
    pub const SOCK_ACCEPT: Rights = Rights(1 << 29);

    /// Bits that only make sense on a directory descriptor; stripped
    /// from a freshly `path_open`ed regular file.
    pub fn directory_only() -> Rights {
        Self::PATH_CREATE_DIRECTORY
            | Self::PATH_CREATE_FILE
            | Self::PATH_LINK_SOURCE
            | Self::PATH_LINK_TARGET
            | Self::PATH_OPEN
            | Self::FD_READDIR
            | Self::PATH_READLINK
            | Self::PATH_RENAME_SOURCE
            | Self::PATH_RENAME_TARGET
            | Self::PATH_FILESTAT_GET
            | Self::PATH_FILESTAT_SET_SIZE
            | Self::PATH_FILESTAT_SET_TIMES
            | Self::PATH_SYMLINK
            | Self::PATH_REMOVE_DIRECTORY
            | Self::PATH_UNLINK_FILE
    }

    /// Bits that only make sense on a regular file; stripped from a
    /// freshly `path_open`ed directory.
    pub fn file_only() -> Rights {
        Self::FD_DATASYNC
            | Self::FD_READ
            | Self::FD_SEEK
            | Self::FD_TELL
            | Self::FD_WRITE
            | Self::FD_ADVISE
            | Self::FD_ALLOCATE
    }

    pub fn file_base() -> Rights {
        Self::file_only() | Self::FD_FDSTAT_SET_FLAGS | Self::FD_SYNC | Self::FD_FILESTAT_GET
            | Self::FD_FILESTAT_SET_SIZE
            | Self::FD_FILESTAT_SET_TIMES
            | Self::POLL_FD_READWRITE
    }

    pub fn directory_base() -> Rights {
        Self::directory_only()
            | Self::FD_FDSTAT_SET_FLAGS
            | Self::FD_SYNC
            | Self::FD_ADVISE
            | Self::FD_FILESTAT_GET
            | Self::FD_FILESTAT_SET_TIMES
    }

    pub fn directory_inheriting() -> Rights {
        Self::directory_base() | Self::file_base()
    }

    pub fn character_device_base() -> Rights {
        Self::FD_READ
            | Self::FD_WRITE
            | Self::FD_FDSTAT_SET_FLAGS
            | Self::FD_FILESTAT_GET
            | Self::POLL_FD_READWRITE
    }

    pub fn stdin_base() -> Rights {
        Self::FD_READ | Self::FD_FDSTAT_SET_FLAGS | Self::FD_FILESTAT_GET | Self::POLL_FD_READWRITE
    }

    pub fn stdout_base() -> Rights {
        Self::FD_WRITE | Self::FD_FDSTAT_SET_FLAGS | Self::FD_FILESTAT_GET | Self::POLL_FD_READWRITE
    }
}

/// Alias kept for readability at call sites that only ever narrow
/// directory-shaped capabilities (path_open's child-caps derivation).
pub type DirCaps = Rights;
pub type FileCaps = Rights;

bitmask_type!(FdFlags, u32);
impl FdFlags {
    pub const APPEND: FdFlags = FdFlags(1 << 0);
    pub const DSYNC: FdFlags = FdFlags(1 << 1);
    pub const NONBLOCK: FdFlags = FdFlags(1 << 2);
    pub const RSYNC: FdFlags = FdFlags(1 << 3);
    pub const SYNC: FdFlags = FdFlags(1 << 4);
}

bitmask_type!(OFlags, u32);
impl OFlags {
    pub const CREATE: OFlags = OFlags(1 << 0);
    pub const DIRECTORY: OFlags = OFlags(1 << 1);
    pub const EXCLUSIVE: OFlags = OFlags(1 << 2);
    pub const TRUNCATE: OFlags = OFlags(1 << 3);
}

bitmask_type!(LookupFlags, u32);
impl LookupFlags {
    pub const SYMLINK_FOLLOW: LookupFlags = LookupFlags(1 << 0);
}

bitmask_type!(FstFlags, u32);
impl FstFlags {
    pub const ATIM: FstFlags = FstFlags(1 << 0);
    pub const ATIM_NOW: FstFlags = FstFlags(1 << 1);
    pub const MTIM: FstFlags = FstFlags(1 << 2);
    pub const MTIM_NOW: FstFlags = FstFlags(1 << 3);
}

bitmask_type!(SubClockFlags, u32);
impl SubClockFlags {
    pub const ABSTIME: SubClockFlags = SubClockFlags(1 << 0);
}
