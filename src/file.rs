//! Types shared by every descriptor variant: filetype tags and the
//! filestat record.
//!
//! This crate never touches real OS file descriptors (see DESIGN.md);
//! these types describe the inode model the device drivers report
//! through, not any real filesystem metadata struct.

/// WASI `filetype` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Unknown,
    BlockDevice,
    CharacterDevice,
    Directory,
    RegularFile,
    SocketDgram,
    SocketStream,
    SymbolicLink,
}

impl FileType {
    pub fn wasi_tag(self) -> u8 {
        match self {
            FileType::Unknown => 0,
            FileType::BlockDevice => 1,
            FileType::CharacterDevice => 2,
            FileType::Directory => 3,
            FileType::RegularFile => 4,
            FileType::SocketDgram => 5,
            FileType::SocketStream => 6,
            FileType::SymbolicLink => 7,
        }
    }
}

/// `filestat`: 64 bytes, one instance per file or directory
/// descriptor's backing inode.
#[derive(Debug, Clone)]
pub struct Filestat {
    pub device_id: u64,
    pub inode: u64,
    pub filetype: FileType,
    pub nlink: u64,
    pub size: u64,
    pub atim: u64,
    pub mtim: u64,
    pub ctim: u64,
}
