//! Memory View: typed accessors over the guest's linear memory.
//!
//! `GuestMemory` is a borrow of the guest's `memory.buffer` for the
//! duration of one syscall, bounds checked on every access, never
//! caching a raw pointer across a call that could trigger
//! `memory.grow` — every dispatcher entry re-borrows fresh from the
//! caller.

use crate::error::Error;

/// A borrowed view of the guest's linear memory for the duration of a
/// single syscall.
pub struct GuestMemory<'a> {
    bytes: &'a mut [u8],
}

fn fault(what: &'static str) -> Error {
    Error::Fault(what)
}

impl<'a> GuestMemory<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        GuestMemory { bytes }
    }

    pub fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    fn check(&self, ptr: u32, len: u32) -> Result<(), Error> {
        let end = ptr.checked_add(len).ok_or(fault("pointer overflow"))?;
        if (end as u64) > self.bytes.len() as u64 {
            return Err(fault("pointer out of bounds"));
        }
        Ok(())
    }

    pub fn read_bytes(&self, ptr: u32, len: u32) -> Result<&[u8], Error> {
        self.check(ptr, len)?;
        Ok(&self.bytes[ptr as usize..(ptr + len) as usize])
    }

    pub fn write_bytes(&mut self, ptr: u32, data: &[u8]) -> Result<(), Error> {
        let len = data.len() as u32;
        self.check(ptr, len)?;
        self.bytes[ptr as usize..(ptr + len) as usize].copy_from_slice(data);
        Ok(())
    }

    pub fn read_u8(&self, ptr: u32) -> Result<u8, Error> {
        Ok(self.read_bytes(ptr, 1)?[0])
    }

    pub fn write_u8(&mut self, ptr: u32, v: u8) -> Result<(), Error> {
        self.write_bytes(ptr, &[v])
    }

    pub fn read_u16(&self, ptr: u32) -> Result<u16, Error> {
        let b = self.read_bytes(ptr, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn write_u16(&mut self, ptr: u32, v: u16) -> Result<(), Error> {
        self.write_bytes(ptr, &v.to_le_bytes())
    }

    pub fn read_u32(&self, ptr: u32) -> Result<u32, Error> {
        let b = self.read_bytes(ptr, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn write_u32(&mut self, ptr: u32, v: u32) -> Result<(), Error> {
        self.write_bytes(ptr, &v.to_le_bytes())
    }

    pub fn read_u64(&self, ptr: u32) -> Result<u64, Error> {
        let b = self.read_bytes(ptr, 8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn write_u64(&mut self, ptr: u32, v: u64) -> Result<(), Error> {
        self.write_bytes(ptr, &v.to_le_bytes())
    }

    pub fn read_i64(&self, ptr: u32) -> Result<i64, Error> {
        Ok(self.read_u64(ptr)? as i64)
    }

    pub fn write_i64(&mut self, ptr: u32, v: i64) -> Result<(), Error> {
        self.write_u64(ptr, v as u64)
    }

    pub fn read_string(&self, ptr: u32, len: u32) -> Result<String, Error> {
        let bytes = self.read_bytes(ptr, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::Ilseq)
    }

    /// Decodes `n` adjacent `(buf: u32, buf_len: u32)` pairs at `ptr`
    /// into owned copies of the referenced spans. Owned copies rather
    /// than borrowed slices, since several spans may alias the same
    /// underlying buffer and Rust's borrow checker cannot see that
    /// guest memory accesses are safe the way the guest's own code
    /// assumes.
    pub fn read_iovec_descriptors(&self, ptr: u32, n: u32) -> Result<Vec<(u32, u32)>, Error> {
        let mut out = Vec::with_capacity(n as usize);
        for i in 0..n {
            let entry_ptr = ptr
                .checked_add(i.checked_mul(8).ok_or(fault("iovec array overflow"))?)
                .ok_or(fault("iovec array overflow"))?;
            let buf = self.read_u32(entry_ptr)?;
            let buf_len = self.read_u32(entry_ptr + 4)?;
            // Validate the span is in bounds up front.
            self.check(buf, buf_len)?;
            out.push((buf, buf_len));
        }
        Ok(out)
    }

    /// Reads the bytes named by a decoded iovec/ciovec descriptor.
    pub fn read_span(&self, desc: (u32, u32)) -> Result<&[u8], Error> {
        self.read_bytes(desc.0, desc.1)
    }

    pub fn write_span(&mut self, desc: (u32, u32), data: &[u8]) -> Result<(), Error> {
        let take = data.len().min(desc.1 as usize) as u32;
        self.write_bytes(desc.0, &data[..take as usize])
    }
}

/// Wire struct layout offsets, kept textually adjacent to the table
/// they transcribe so the two never drift apart silently.
pub mod layout {
    /// `filestat`: 64 bytes.
    pub mod filestat {
        pub const SIZE: u32 = 64;
        pub const DEV: u32 = 0;
        pub const INO: u32 = 8;
        pub const FILETYPE: u32 = 16;
        pub const NLINK: u32 = 24;
        pub const SIZE_FIELD: u32 = 32;
        pub const ATIM: u32 = 40;
        pub const MTIM: u32 = 48;
        pub const CTIM: u32 = 56;
    }
    /// `fdstat`: 24 bytes.
    pub mod fdstat {
        pub const SIZE: u32 = 24;
        pub const FILETYPE: u32 = 0;
        pub const FLAGS: u32 = 2;
        pub const RIGHTS_BASE: u32 = 8;
        pub const RIGHTS_INHERITING: u32 = 16;
    }
    /// `prestat`: 8 bytes.
    pub mod prestat {
        pub const SIZE: u32 = 8;
        pub const TAG: u32 = 0;
        pub const LEN: u32 = 4;
    }
    /// `dirent`: 24 bytes.
    pub mod dirent {
        pub const SIZE: u32 = 24;
        pub const D_NEXT: u32 = 0;
        pub const D_INO: u32 = 8;
        pub const D_NAMLEN: u32 = 16;
        pub const D_TYPE: u32 = 20;
    }
    /// `event`: 32 bytes.
    pub mod event {
        pub const SIZE: u32 = 32;
        pub const USERDATA: u32 = 0;
        pub const ERROR: u32 = 8;
        pub const TYPE: u32 = 10;
        pub const NBYTES: u32 = 16;
        pub const RWFLAGS: u32 = 24;
    }
    /// `subscription`: 48 bytes.
    pub mod subscription {
        pub const SIZE: u32 = 48;
        pub const USERDATA: u32 = 0;
        pub const TAG: u32 = 8;
        pub const PAYLOAD: u32 = 16;
    }
    /// `subscription_clock`: 32 bytes (offset within the union payload).
    pub mod subscription_clock {
        pub const ID: u32 = 0;
        pub const TIMEOUT: u32 = 8;
        pub const PRECISION: u32 = 16;
        pub const FLAGS: u32 = 24;
    }
    /// `subscription_fd_readwrite`: 4 bytes.
    pub mod subscription_fd_readwrite {
        pub const FD: u32 = 0;
    }
}
