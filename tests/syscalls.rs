//! Integration tests for the args/environ, filesystem, and path_open
//! syscall entry points, driven against `WasiCtx`'s public dispatch
//! methods the way a guest's libc would call them: raw little-endian
//! buffers in, `Errno` out.

mod common;

use common::{ctx_with_preopen, MockFilesystem};
use std::rc::Rc;
use wasi_edge::{Errno, GuestMemory, HostFilesystem, OFlags, Rights, WasiCtxBuilder};

fn guest_memory(size: usize) -> Vec<u8> {
    vec![0u8; size]
}

#[test]
fn args_and_environ_round_trip() {
    let ctx = WasiCtxBuilder::new()
        .arg("prog")
        .arg("hello")
        .env("GREETING", "hi")
        .build()
        .unwrap();

    let mut buf = guest_memory(256);
    let mut mem = GuestMemory::new(&mut buf);

    let count_ptr = 0u32;
    let buf_size_ptr = 4u32;
    assert_eq!(ctx.args_sizes_get(&mut mem, count_ptr, buf_size_ptr), Errno::Success);
    assert_eq!(mem.read_u32(count_ptr).unwrap(), 2);
    assert_eq!(
        mem.read_u32(buf_size_ptr).unwrap(),
        "prog".len() as u32 + 1 + "hello".len() as u32 + 1
    );

    let argv_ptr = 16u32;
    let argv_buf_ptr = 64u32;
    assert_eq!(ctx.args_get(&mut mem, argv_ptr, argv_buf_ptr), Errno::Success);
    let arg0_ptr = mem.read_u32(argv_ptr).unwrap();
    let arg1_ptr = mem.read_u32(argv_ptr + 4).unwrap();
    assert_eq!(mem.read_string(arg0_ptr, 4).unwrap(), "prog");
    assert_eq!(mem.read_string(arg1_ptr, 5).unwrap(), "hello");

    let env_count_ptr = 120u32;
    let env_buf_size_ptr = 124u32;
    assert_eq!(
        ctx.environ_sizes_get(&mut mem, env_count_ptr, env_buf_size_ptr),
        Errno::Success
    );
    assert_eq!(mem.read_u32(env_count_ptr).unwrap(), 1);
    assert_eq!(mem.read_u32(env_buf_size_ptr).unwrap(), "GREETING=hi".len() as u32 + 1);

    let environ_ptr = 128u32;
    let environ_buf_ptr = 160u32;
    assert_eq!(
        ctx.environ_get(&mut mem, environ_ptr, environ_buf_ptr),
        Errno::Success
    );
    let pair_ptr = mem.read_u32(environ_ptr).unwrap();
    assert_eq!(mem.read_string(pair_ptr, "GREETING=hi".len() as u32).unwrap(), "GREETING=hi");
}

#[test]
fn path_open_write_seek_read_round_trip() {
    let fs = Rc::new(MockFilesystem::new());
    fs.create_directory("/workspace").unwrap();
    let ctx = ctx_with_preopen(fs, "workspace");

    let mut buf = guest_memory(512);
    let mut mem = GuestMemory::new(&mut buf);

    let path = b"a.txt";
    let path_ptr = 0u32;
    mem.write_bytes(path_ptr, path).unwrap();

    let fd_ptr = 16u32;
    let oflags = (OFlags::CREATE | OFlags::TRUNCATE).0 as u16;
    let errno = ctx.path_open(
        &mut mem,
        3,
        0,
        path_ptr,
        path.len() as u32,
        oflags,
        Rights::file_base().0,
        0,
        0,
        fd_ptr,
    );
    assert_eq!(errno, Errno::Success);
    let new_fd = mem.read_u32(fd_ptr).unwrap();
    assert!(new_fd >= 4);

    let data_ptr = 32u32;
    mem.write_bytes(data_ptr, b"hello").unwrap();
    let iovs_ptr = 64u32;
    mem.write_u32(iovs_ptr, data_ptr).unwrap();
    mem.write_u32(iovs_ptr + 4, 5).unwrap();
    let nwritten_ptr = 80u32;
    assert_eq!(
        ctx.fd_write(&mut mem, new_fd, iovs_ptr, 1, nwritten_ptr),
        Errno::Success
    );
    assert_eq!(mem.read_u32(nwritten_ptr).unwrap(), 5);

    let newoffset_ptr = 88u32;
    assert_eq!(ctx.fd_seek(&mut mem, new_fd, 0, 0, newoffset_ptr), Errno::Success);
    assert_eq!(mem.read_u64(newoffset_ptr).unwrap(), 0);

    let read_buf_ptr = 96u32;
    let read_iovs_ptr = 112u32;
    mem.write_u32(read_iovs_ptr, read_buf_ptr).unwrap();
    mem.write_u32(read_iovs_ptr + 4, 16).unwrap();
    let nread_ptr = 128u32;
    assert_eq!(
        ctx.fd_read(&mut mem, new_fd, read_iovs_ptr, 1, nread_ptr),
        Errno::Success
    );
    assert_eq!(mem.read_u32(nread_ptr).unwrap(), 5);
    assert_eq!(mem.read_string(read_buf_ptr, 5).unwrap(), "hello");
}

#[test]
fn fd_seek_end_anchors_on_file_size() {
    let fs = Rc::new(MockFilesystem::new());
    fs.create_directory("/workspace").unwrap();
    let ctx = ctx_with_preopen(fs, "workspace");

    let mut buf = guest_memory(512);
    let mut mem = GuestMemory::new(&mut buf);

    let path = b"a.txt";
    mem.write_bytes(0, path).unwrap();
    let fd_ptr = 16u32;
    let oflags = (OFlags::CREATE | OFlags::TRUNCATE).0 as u16;
    assert_eq!(
        ctx.path_open(&mut mem, 3, 0, 0, path.len() as u32, oflags, Rights::file_base().0, 0, 0, fd_ptr),
        Errno::Success
    );
    let new_fd = mem.read_u32(fd_ptr).unwrap();

    let data_ptr = 32u32;
    mem.write_bytes(data_ptr, b"hello").unwrap();
    let iovs_ptr = 64u32;
    mem.write_u32(iovs_ptr, data_ptr).unwrap();
    mem.write_u32(iovs_ptr + 4, 5).unwrap();
    let nwritten_ptr = 80u32;
    assert_eq!(ctx.fd_write(&mut mem, new_fd, iovs_ptr, 1, nwritten_ptr), Errno::Success);

    // whence=2 (end) with offset=-2 should land two bytes before EOF.
    let newoffset_ptr = 88u32;
    assert_eq!(ctx.fd_seek(&mut mem, new_fd, -2, 2, newoffset_ptr), Errno::Success);
    assert_eq!(mem.read_u64(newoffset_ptr).unwrap(), 3);
}

#[test]
fn path_open_excl_create_on_existing_path_is_exist() {
    let fs = Rc::new(MockFilesystem::new());
    fs.create_directory("/workspace").unwrap();
    let ctx = ctx_with_preopen(fs, "workspace");

    let mut buf = guest_memory(256);
    let mut mem = GuestMemory::new(&mut buf);
    let path = b"a.txt";
    let path_ptr = 0u32;
    mem.write_bytes(path_ptr, path).unwrap();

    let fd_ptr = 16u32;
    assert_eq!(
        ctx.path_open(
            &mut mem,
            3,
            0,
            path_ptr,
            path.len() as u32,
            OFlags::CREATE.0 as u16,
            Rights::file_base().0,
            0,
            0,
            fd_ptr,
        ),
        Errno::Success
    );

    let fd_ptr2 = 20u32;
    let excl_oflags = (OFlags::CREATE | OFlags::EXCLUSIVE).0 as u16;
    let errno = ctx.path_open(
        &mut mem,
        3,
        0,
        path_ptr,
        path.len() as u32,
        excl_oflags,
        Rights::file_base().0,
        0,
        0,
        fd_ptr2,
    );
    assert_eq!(errno, Errno::Exist);
}

#[test]
fn fd_close_then_any_call_is_badf() {
    let fs = Rc::new(MockFilesystem::new());
    fs.create_directory("/workspace").unwrap();
    let ctx = ctx_with_preopen(fs, "workspace");

    let mut buf = guest_memory(256);
    let mut mem = GuestMemory::new(&mut buf);
    let path = b"a.txt";
    mem.write_bytes(0, path).unwrap();
    let fd_ptr = 16u32;
    ctx.path_open(
        &mut mem,
        3,
        0,
        0,
        path.len() as u32,
        OFlags::CREATE.0 as u16,
        Rights::file_base().0,
        0,
        0,
        fd_ptr,
    );
    let new_fd = mem.read_u32(fd_ptr).unwrap();

    assert_eq!(ctx.fd_close(new_fd), Errno::Success);
    assert_eq!(ctx.fd_tell(&mut mem, new_fd, 32), Errno::Badf);
}
