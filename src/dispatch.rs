//! Syscall Dispatcher: the ~45 WASI preview-1 host imports, implemented
//! directly against [`GuestMemory`], [`FdTable`] and the
//! [`DeviceDriver`] registry.
//!
//! Every entry follows the same
//! `table().get(fd)?.require(RIGHT)?.op(...)` call-site idiom, hand
//! written end to end rather than generated from a WIT/witx interface
//! description.

use crate::ctx::WasiCtx;
use crate::dir::ReaddirCursor;
use crate::driver::{Advice, DeviceDriver, PathOpenResult};
use crate::error::{Errno, Error};
use crate::file::FileType;
use crate::memory::{layout, GuestMemory};
use crate::rights::{FdFlags, FstFlags, OFlags, Rights, SubClockFlags};
use crate::sched::{ClockId, Poll, PollSource, Subscription, SubscriptionClock, Userdata};
use crate::table::{Descriptor, DescriptorPayload, FdTable, PendingReaddir};
use std::cell::Ref;

fn run(f: impl FnOnce() -> Result<(), Error>) -> Errno {
    match f() {
        Ok(()) => Errno::Success,
        Err(e) => {
            tracing::debug!(error = %e, "syscall failed");
            e.into()
        }
    }
}

fn filetype_tag(ft: FileType) -> u8 {
    ft.wasi_tag()
}

impl WasiCtx {
    fn with_descriptor<T>(
        &self,
        fd: u32,
        want: Rights,
        f: impl FnOnce(&Descriptor, &dyn DeviceDriver) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let table_rc = self.table();
        let table = table_rc.borrow();
        let desc = table.get(fd)?;
        desc.require(want)?;
        let driver = self.driver_for(desc.header.device_id);
        f(&desc, driver.as_ref())
    }

    fn with_descriptor_mut<T>(
        &self,
        fd: u32,
        want: Rights,
        f: impl FnOnce(&mut Descriptor, &dyn DeviceDriver) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let table_rc = self.table();
        let table = table_rc.borrow();
        let mut desc = table.get_mut(fd)?;
        desc.require(want)?;
        let driver = self.driver_for(desc.header.device_id);
        f(&mut desc, driver.as_ref())
    }

    // --- args / environ --------------------------------------------

    pub fn args_sizes_get(&self, memory: &mut GuestMemory, count_ptr: u32, buf_size_ptr: u32) -> Errno {
        run(|| {
            let size: usize = self.args().iter().map(|s| s.len() + 1).sum();
            memory.write_u32(count_ptr, self.args().len() as u32)?;
            memory.write_u32(buf_size_ptr, u32::try_from(size)?)?;
            Ok(())
        })
    }

    pub fn args_get(&self, memory: &mut GuestMemory, argv_ptr: u32, argv_buf_ptr: u32) -> Errno {
        run(|| write_string_array(memory, self.args(), argv_ptr, argv_buf_ptr))
    }

    pub fn environ_sizes_get(&self, memory: &mut GuestMemory, count_ptr: u32, buf_size_ptr: u32) -> Errno {
        run(|| {
            let size: usize = self
                .env()
                .iter()
                .map(|(k, v)| k.len() + 1 + v.len() + 1)
                .sum();
            memory.write_u32(count_ptr, self.env().len() as u32)?;
            memory.write_u32(buf_size_ptr, u32::try_from(size)?)?;
            Ok(())
        })
    }

    pub fn environ_get(&self, memory: &mut GuestMemory, environ_ptr: u32, environ_buf_ptr: u32) -> Errno {
        run(|| {
            let pairs: Vec<String> = self.env().iter().map(|(k, v)| format!("{k}={v}")).collect();
            write_string_array(memory, &pairs, environ_ptr, environ_buf_ptr)
        })
    }

    // --- clocks ------------------------------------------------------

    pub fn clock_res_get(&self, memory: &mut GuestMemory, id: u32, ts_ptr: u32) -> Errno {
        run(|| {
            clockid_from_u32(id)?;
            memory.write_u64(ts_ptr, 1)
        })
    }

    pub fn clock_time_get(&self, memory: &mut GuestMemory, id: u32, _precision: u64, ts_ptr: u32) -> Errno {
        run(|| {
            let now = match clockid_from_u32(id)? {
                ClockId::Realtime => self.clock().realtime(),
                ClockId::Monotonic => self.clock().monotonic(),
            };
            memory.write_u64(ts_ptr, now)
        })
    }

    // --- fd_* ----------------------------------------------------------

    pub fn fd_advise(&self, fd: u32, offset: u64, len: u64, advice: u8) -> Errno {
        run(|| {
            let advice = advice_from_u8(advice)?;
            self.with_descriptor(fd, Rights::FD_ADVISE, |d, drv| {
                drv.fd_advise(d.header.inode_id, offset, len, advice)
            })
        })
    }

    pub fn fd_allocate(&self, fd: u32, offset: u64, len: u64) -> Errno {
        run(|| {
            self.with_descriptor(fd, Rights::FD_ALLOCATE, |d, drv| {
                drv.fd_allocate(d.header.inode_id, offset, len)
            })
        })
    }

    pub fn fd_close(&self, fd: u32) -> Errno {
        run(|| {
            let table_rc = self.table();
            let mut table = table_rc.borrow_mut();
            table.close(fd)?;
            Ok(())
        })
    }

    pub fn fd_datasync(&self, fd: u32) -> Errno {
        run(|| {
            self.with_descriptor(fd, Rights::FD_DATASYNC, |d, drv| drv.fd_datasync(d.header.inode_id))
        })
    }

    pub fn fd_sync(&self, fd: u32) -> Errno {
        run(|| self.with_descriptor(fd, Rights::FD_SYNC, |d, drv| drv.fd_sync(d.header.inode_id)))
    }

    pub fn fd_fdstat_get(&self, memory: &mut GuestMemory, fd: u32, stat_ptr: u32) -> Errno {
        run(|| {
            let table_rc = self.table();
            let table = table_rc.borrow();
            let d = table.get(fd)?;
            memory.write_u8(stat_ptr + layout::fdstat::FILETYPE, filetype_tag(d.header.filetype))?;
            memory.write_u16(stat_ptr + layout::fdstat::FLAGS, d.header.fdflags.0 as u16)?;
            memory.write_u64(stat_ptr + layout::fdstat::RIGHTS_BASE, d.header.rights_base.0)?;
            memory.write_u64(stat_ptr + layout::fdstat::RIGHTS_INHERITING, d.header.rights_inheriting.0)?;
            Ok(())
        })
    }

    pub fn fd_fdstat_set_flags(&self, fd: u32, flags: u16) -> Errno {
        run(|| {
            let table_rc = self.table();
            let table = table_rc.borrow();
            let mut d = table.get_mut(fd)?;
            d.require(Rights::FD_FDSTAT_SET_FLAGS)?;
            d.header.fdflags = FdFlags(flags as u32);
            Ok(())
        })
    }

    pub fn fd_filestat_get(&self, memory: &mut GuestMemory, fd: u32, stat_ptr: u32) -> Errno {
        run(|| {
            let stat = self.with_descriptor(fd, Rights::FD_FILESTAT_GET, |d, drv| {
                drv.fd_filestat_get(d.header.inode_id)
            })?;
            write_filestat(memory, stat_ptr, &stat)
        })
    }

    pub fn fd_filestat_set_size(&self, fd: u32, size: u64) -> Errno {
        run(|| {
            self.with_descriptor(fd, Rights::FD_FILESTAT_SET_SIZE, |d, drv| {
                drv.fd_filestat_set_size(d.header.inode_id, size)
            })
        })
    }

    pub fn fd_filestat_set_times(&self, fd: u32, atim: u64, mtim: u64, fst_flags: u16) -> Errno {
        run(|| {
            let flags = FstFlags(fst_flags as u32);
            if flags.contains(FstFlags::ATIM | FstFlags::ATIM_NOW) || flags.contains(FstFlags::MTIM | FstFlags::MTIM_NOW) {
                return Err(Error::Inval);
            }
            let atim = if flags.contains(FstFlags::ATIM) { Some(atim) } else { None };
            let mtim = if flags.contains(FstFlags::MTIM) { Some(mtim) } else { None };
            self.with_descriptor(fd, Rights::FD_FILESTAT_SET_TIMES, |d, drv| {
                drv.fd_filestat_set_times(d.header.inode_id, atim, mtim)
            })
        })
    }

    pub fn fd_pread(&self, memory: &mut GuestMemory, fd: u32, iovs_ptr: u32, iovs_len: u32, offset: u64, nread_ptr: u32) -> Errno {
        run(|| {
            let descs = memory.read_iovec_descriptors(iovs_ptr, iovs_len)?;
            let total: u32 = descs.iter().map(|(_, len)| *len).sum();
            let bytes = self.with_descriptor(fd, Rights::FD_READ, |d, drv| {
                drv.fd_pread(d.header.inode_id, total as usize, offset)
            })?;
            let n = scatter(memory, &descs, &bytes)?;
            memory.write_u32(nread_ptr, n as u32)
        })
    }

    pub fn fd_pwrite(&self, memory: &mut GuestMemory, fd: u32, iovs_ptr: u32, iovs_len: u32, offset: u64, nwritten_ptr: u32) -> Errno {
        run(|| {
            let descs = memory.read_iovec_descriptors(iovs_ptr, iovs_len)?;
            let data = gather(memory, &descs)?;
            let n = self.with_descriptor(fd, Rights::FD_WRITE, |d, drv| drv.fd_pwrite(d.header.inode_id, &data, offset))?;
            memory.write_u32(nwritten_ptr, n as u32)
        })
    }

    pub fn fd_prestat_get(&self, memory: &mut GuestMemory, fd: u32, prestat_ptr: u32) -> Errno {
        run(|| {
            let table_rc = self.table();
            let table = table_rc.borrow();
            let name = table.prestat_name(fd).ok_or(Error::Badf)?;
            memory.write_u8(prestat_ptr + layout::prestat::TAG, 0)?;
            memory.write_u32(prestat_ptr + layout::prestat::LEN, name.len() as u32)
        })
    }

    pub fn fd_prestat_dir_name(&self, memory: &mut GuestMemory, fd: u32, path_ptr: u32, path_len: u32) -> Errno {
        run(|| {
            let table_rc = self.table();
            let table = table_rc.borrow();
            let name = table.prestat_name(fd).ok_or(Error::Badf)?;
            if name.len() > path_len as usize {
                return Err(Error::Inval);
            }
            memory.write_bytes(path_ptr, name.as_bytes())
        })
    }

    pub fn fd_read(&self, memory: &mut GuestMemory, fd: u32, iovs_ptr: u32, iovs_len: u32, nread_ptr: u32) -> Errno {
        run(|| {
            let descs = memory.read_iovec_descriptors(iovs_ptr, iovs_len)?;
            let total: u32 = descs.iter().map(|(_, len)| *len).sum();
            let bytes = self.with_descriptor_mut(fd, Rights::FD_READ, |d, drv| {
                let cursor = d.cursor().unwrap_or(0);
                let bytes = drv.fd_read(d.header.inode_id, total as usize, cursor)?;
                if d.is_regular_file() {
                    d.set_cursor(cursor + bytes.len() as u64)?;
                }
                Ok(bytes)
            })?;
            let n = scatter(memory, &descs, &bytes)?;
            memory.write_u32(nread_ptr, n as u32)
        })
    }

    pub fn fd_write(&self, memory: &mut GuestMemory, fd: u32, iovs_ptr: u32, iovs_len: u32, nwritten_ptr: u32) -> Errno {
        run(|| {
            let descs = memory.read_iovec_descriptors(iovs_ptr, iovs_len)?;
            let data = gather(memory, &descs)?;
            let n = self.with_descriptor_mut(fd, Rights::FD_WRITE, |d, drv| {
                let cursor = d.cursor().unwrap_or(0);
                let append = d.header.fdflags.contains(FdFlags::APPEND);
                let (n, new_cursor) = drv.fd_write(d.header.inode_id, &data, cursor, append)?;
                if d.is_regular_file() {
                    d.set_cursor(new_cursor)?;
                }
                Ok(n)
            })?;
            memory.write_u32(nwritten_ptr, n as u32)
        })
    }

    pub fn fd_readdir(&self, memory: &mut GuestMemory, fd: u32, buf_ptr: u32, buf_len: u32, cookie: u64, buf_used_ptr: u32) -> Errno {
        run(|| {
            let (inode_id, device_id) = self.with_descriptor(fd, Rights::FD_READDIR, |d, _drv| {
                Ok((d.header.inode_id, d.header.device_id))
            })?;
            let driver = self.driver_for(device_id);

            let table_rc = self.table();
            let mut entries: PendingReaddir = {
                let table = table_rc.borrow();
                table.take_pending_readdir(fd, cookie).unwrap_or_default()
            };
            if entries.is_empty() {
                entries = driver.fd_readdir(inode_id, ReaddirCursor(cookie))?.into();
            }

            let mut written = 0u32;
            while let Some((entity, name)) = entries.pop_front() {
                let name_bytes = name.as_bytes();
                let total = layout::dirent::SIZE + name_bytes.len() as u32;
                let remaining = buf_len - written;
                if remaining == 0 {
                    entries.push_front((entity, name));
                    break;
                }
                let mut record = Vec::with_capacity(total as usize);
                record.extend_from_slice(&u64::from(entity.next).to_le_bytes());
                record.extend_from_slice(&entity.inode.to_le_bytes());
                record.extend_from_slice(&(name_bytes.len() as u32).to_le_bytes());
                record.push(filetype_tag(entity.filetype));
                record.extend_from_slice(&[0u8; 3]); // padding to dirent::SIZE
                record.extend_from_slice(name_bytes);

                let take = remaining.min(total) as usize;
                memory.write_bytes(buf_ptr + written, &record[..take])?;
                written += take as u32;
                if (take as u32) < total {
                    break;
                }
            }

            {
                let table = table_rc.borrow();
                table.store_pending_readdir(fd, entries);
            }
            memory.write_u32(buf_used_ptr, written)
        })
    }

    pub fn fd_seek(&self, memory: &mut GuestMemory, fd: u32, offset: i64, whence: u8, newoffset_ptr: u32) -> Errno {
        run(|| {
            // cur,0 is a tell disguised as a seek; FD_TELL alone covers it.
            let is_tell = whence == 1 && offset == 0;
            let new_pos = self.with_descriptor_mut(fd, Rights::empty(), |d, drv| {
                let has_right = if is_tell {
                    d.header.rights_base.contains(Rights::FD_TELL) || d.header.rights_base.contains(Rights::FD_SEEK)
                } else {
                    d.header.rights_base.contains(Rights::FD_SEEK)
                };
                if !has_right {
                    return Err(Error::Perm);
                }
                let cur = d.cursor()?;
                let base = match whence {
                    0 => 0i64,
                    1 => cur as i64,
                    2 => {
                        let stat = drv.fd_filestat_get(d.header.inode_id)?;
                        stat.size as i64
                    }
                    _ => return Err(Error::Inval),
                };
                let new_pos = base.checked_add(offset).ok_or(Error::Inval)?;
                if new_pos < 0 {
                    return Err(Error::Inval);
                }
                d.set_cursor(new_pos as u64)?;
                Ok(new_pos as u64)
            })?;
            memory.write_u64(newoffset_ptr, new_pos)
        })
    }

    pub fn fd_tell(&self, memory: &mut GuestMemory, fd: u32, offset_ptr: u32) -> Errno {
        run(|| {
            let pos = self.with_descriptor(fd, Rights::FD_TELL, |d, _drv| d.cursor())?;
            memory.write_u64(offset_ptr, pos)
        })
    }

    // --- path_* ----------------------------------------------------------

    fn resolve_dir<'a>(&self, table: &'a FdTable, fd: u32, want: Rights) -> Result<Ref<'a, Descriptor>, Error> {
        let d = table.get(fd)?;
        d.require(want)?;
        if !d.is_directory() {
            return Err(Error::Notdir);
        }
        Ok(d)
    }

    pub fn path_create_directory(&self, memory: &GuestMemory, fd: u32, path_ptr: u32, path_len: u32) -> Errno {
        run(|| {
            let path = memory.read_string(path_ptr, path_len)?;
            let table_rc = self.table();
            let table = table_rc.borrow();
            let d = self.resolve_dir(&table, fd, Rights::PATH_CREATE_DIRECTORY)?;
            let driver = self.driver_for(d.header.device_id);
            driver.path_create_directory(d.directory_path()?, &path)
        })
    }

    pub fn path_filestat_get(&self, memory: &mut GuestMemory, fd: u32, _lookupflags: u32, path_ptr: u32, path_len: u32, stat_ptr: u32) -> Errno {
        run(|| {
            let path = memory.read_string(path_ptr, path_len)?;
            let stat = {
                let table_rc = self.table();
                let table = table_rc.borrow();
                let d = self.resolve_dir(&table, fd, Rights::PATH_FILESTAT_GET)?;
                let driver = self.driver_for(d.header.device_id);
                driver.path_filestat_get(d.directory_path()?, &path)?
            };
            write_filestat(memory, stat_ptr, &stat)
        })
    }

    pub fn path_filestat_set_times(&self, fd: u32, _path_ptr: u32, _path_len: u32, _atim: u64, _mtim: u64, _fst_flags: u16) -> Errno {
        run(|| {
            // Timestamp updates on editor-backed paths are not supported.
            let table_rc = self.table();
            let table = table_rc.borrow();
            self.resolve_dir(&table, fd, Rights::PATH_FILESTAT_SET_TIMES)?;
            Err(Error::Unsupported("path_filestat_set_times"))
        })
    }

    pub fn path_link(&self, _src_fd: u32, _src_path_ptr: u32, _src_path_len: u32, _dst_fd: u32, _dst_path_ptr: u32, _dst_path_len: u32) -> Errno {
        run(|| Err(Error::Unsupported("path_link")))
    }

    pub fn path_readlink(&self, _fd: u32, _path_ptr: u32, _path_len: u32, _buf_ptr: u32, _buf_len: u32, _bufused_ptr: u32) -> Errno {
        run(|| Err(Error::Unsupported("path_readlink")))
    }

    pub fn path_symlink(&self, _old_path_ptr: u32, _fd: u32, _new_path_ptr: u32, _new_path_len: u32) -> Errno {
        run(|| Err(Error::Unsupported("path_symlink")))
    }

    pub fn path_open(
        &self,
        memory: &mut GuestMemory,
        dirfd: u32,
        _dirflags: u32,
        path_ptr: u32,
        path_len: u32,
        oflags: u16,
        fs_rights_base: u64,
        fs_rights_inheriting: u64,
        fdflags: u16,
        fd_ptr: u32,
    ) -> Errno {
        run(|| {
            let path = memory.read_string(path_ptr, path_len)?;
            let oflags = OFlags(oflags as u32);
            let want_directory = oflags.contains(OFlags::DIRECTORY);

            let table_rc = self.table();
            let (device_id, base_path, dir_inheriting) = {
                let table = table_rc.borrow();
                let d = self.resolve_dir(&table, dirfd, Rights::PATH_OPEN)?;
                (d.header.device_id, d.directory_path()?.clone(), d.header.rights_inheriting)
            };
            let driver = self.driver_for(device_id);
            let opened = driver.path_open(&base_path, &path, oflags, want_directory)?;

            let requested_base = Rights(fs_rights_base).intersection(dir_inheriting);
            let requested_inheriting = Rights(fs_rights_inheriting).intersection(dir_inheriting);

            let new_desc = match opened {
                PathOpenResult::File { inode_id, size } => {
                    let _ = size;
                    Descriptor {
                        header: crate::table::DescriptorHeader {
                            device_id,
                            filetype: FileType::RegularFile,
                            rights_base: requested_base.intersection(Rights::file_base()),
                            rights_inheriting: Rights::empty(),
                            fdflags: FdFlags(fdflags as u32),
                            inode_id,
                        },
                        payload: DescriptorPayload::RegularFile { cursor: 0 },
                    }
                }
                PathOpenResult::Dir { inode_id, path } => Descriptor {
                    header: crate::table::DescriptorHeader {
                        device_id,
                        filetype: FileType::Directory,
                        rights_base: requested_base.intersection(Rights::directory_base()),
                        rights_inheriting: requested_inheriting,
                        fdflags: FdFlags(fdflags as u32),
                        inode_id,
                    },
                    payload: DescriptorPayload::Directory { path },
                },
            };

            let mut table = table_rc.borrow_mut();
            let fd = table.push(new_desc)?;
            drop(table);
            memory.write_u32(fd_ptr, fd)
        })
    }

    pub fn path_remove_directory(&self, memory: &GuestMemory, fd: u32, path_ptr: u32, path_len: u32) -> Errno {
        run(|| {
            let path = memory.read_string(path_ptr, path_len)?;
            let table_rc = self.table();
            let table = table_rc.borrow();
            let d = self.resolve_dir(&table, fd, Rights::PATH_REMOVE_DIRECTORY)?;
            let driver = self.driver_for(d.header.device_id);
            driver.path_remove_directory(d.directory_path()?, &path)
        })
    }

    pub fn path_rename(&self, memory: &GuestMemory, src_fd: u32, src_path_ptr: u32, src_path_len: u32, dst_fd: u32, dst_path_ptr: u32, dst_path_len: u32) -> Errno {
        run(|| {
            let src_path = memory.read_string(src_path_ptr, src_path_len)?;
            let dst_path = memory.read_string(dst_path_ptr, dst_path_len)?;
            let table_rc = self.table();
            let table = table_rc.borrow();
            let src = self.resolve_dir(&table, src_fd, Rights::PATH_RENAME_SOURCE)?;
            let dst = self.resolve_dir(&table, dst_fd, Rights::PATH_RENAME_TARGET)?;
            let driver = self.driver_for(src.header.device_id);
            driver.path_rename(src.directory_path()?, &src_path, dst.directory_path()?, &dst_path)
        })
    }

    pub fn path_unlink_file(&self, memory: &GuestMemory, fd: u32, path_ptr: u32, path_len: u32) -> Errno {
        run(|| {
            let path = memory.read_string(path_ptr, path_len)?;
            let table_rc = self.table();
            let table = table_rc.borrow();
            let d = self.resolve_dir(&table, fd, Rights::PATH_UNLINK_FILE)?;
            let driver = self.driver_for(d.header.device_id);
            driver.path_unlink_file(d.directory_path()?, &path)
        })
    }

    // --- poll / proc / misc ----------------------------------------------

    pub fn poll_oneoff(&self, memory: &mut GuestMemory, in_ptr: u32, out_ptr: u32, n: u32, result_size_ptr: u32) -> Errno {
        run(|| {
            let mut poll = Poll::new();
            let mut tags = Vec::with_capacity(n as usize);
            for i in 0..n {
                let base = in_ptr + i * layout::subscription::SIZE;
                let userdata = memory.read_u64(base + layout::subscription::USERDATA)?;
                let tag = memory.read_u8(base + layout::subscription::TAG)?;
                let payload = base + layout::subscription::PAYLOAD;
                let sub = match tag {
                    0 => {
                        let id = memory.read_u32(payload + layout::subscription_clock::ID)?;
                        let timeout = memory.read_u64(payload + layout::subscription_clock::TIMEOUT)?;
                        let precision = memory.read_u64(payload + layout::subscription_clock::PRECISION)?;
                        let flags = memory.read_u16(payload + layout::subscription_clock::FLAGS)?;
                        Subscription::Clock(SubscriptionClock {
                            id: clockid_from_u32(id)?,
                            timeout,
                            precision,
                            abstime: SubClockFlags(flags as u32).contains(SubClockFlags::ABSTIME),
                        })
                    }
                    1 => Subscription::FdRead(memory.read_u32(payload + layout::subscription_fd_readwrite::FD)?),
                    2 => Subscription::FdWrite(memory.read_u32(payload + layout::subscription_fd_readwrite::FD)?),
                    _ => return Err(Error::Inval),
                };
                tags.push(tag);
                poll.push(sub, Userdata(userdata));
            }

            let source = CtxPollSource { ctx: self };
            let results = crate::sched::poll_oneoff(&poll, &source, self.clock().as_ref(), self.timer().as_ref());

            for (i, (result, ud)) in results.iter().enumerate() {
                let base = out_ptr + i as u32 * layout::event::SIZE;
                memory.write_u64(base + layout::event::USERDATA, u64::from(*ud))?;
                let errno: u16 = result.error.as_ref().map(|e| errno_of(e) as u16).unwrap_or(0);
                memory.write_u16(base + layout::event::ERROR, errno)?;
                memory.write_u8(base + layout::event::TYPE, tags[i])?;
                memory.write_u64(base + layout::event::NBYTES, result.nbytes)?;
                memory.write_u16(base + layout::event::RWFLAGS, 0)?;
            }
            memory.write_u32(result_size_ptr, results.len() as u32)
        })
    }

    pub fn proc_exit(&self, rval: u32) {
        self.fire_exit(rval);
    }

    pub fn sched_yield(&self) -> Errno {
        run(|| crate::sched::sched_yield())
    }

    pub fn random_get(&self, memory: &mut GuestMemory, buf_ptr: u32, len: u32) -> Errno {
        run(|| {
            let bytes = self.random_bytes(len as usize);
            memory.write_bytes(buf_ptr, &bytes)
        })
    }

    pub fn sock_accept(&self, _fd: u32, _flags: u16) -> Errno {
        Errno::Nosys
    }
    pub fn sock_recv(&self, _fd: u32, _ri_data_ptr: u32, _ri_data_len: u32, _ri_flags: u16) -> Errno {
        Errno::Nosys
    }
    pub fn sock_send(&self, _fd: u32, _si_data_ptr: u32, _si_data_len: u32, _si_flags: u16) -> Errno {
        Errno::Nosys
    }
    pub fn sock_shutdown(&self, _fd: u32, _how: u8) -> Errno {
        Errno::Nosys
    }
}

struct CtxPollSource<'a> {
    ctx: &'a WasiCtx,
}

impl<'a> PollSource for CtxPollSource<'a> {
    fn bytes_available(&self, fd: u32) -> Result<u64, Error> {
        self.ctx
            .with_descriptor(fd, Rights::POLL_FD_READWRITE, |d, drv| drv.fd_bytes_available(d.header.inode_id))
    }

    fn write_ready(&self, fd: u32) -> Result<(), Error> {
        self.ctx.with_descriptor(fd, Rights::POLL_FD_READWRITE, |_d, _drv| Ok(()))
    }
}

fn clockid_from_u32(id: u32) -> Result<ClockId, Error> {
    match id {
        0 => Ok(ClockId::Realtime),
        1 => Ok(ClockId::Monotonic),
        2 | 3 => Err(Error::Unsupported("cputime clocks")),
        _ => Err(Error::Inval),
    }
}

fn advice_from_u8(advice: u8) -> Result<Advice, Error> {
    match advice {
        0 => Ok(Advice::Normal),
        1 => Ok(Advice::Sequential),
        2 => Ok(Advice::Random),
        3 => Ok(Advice::WillNeed),
        4 => Ok(Advice::DontNeed),
        5 => Ok(Advice::NoReuse),
        _ => Err(Error::Inval),
    }
}

/// Maps a borrowed `Error` to its `Errno` discriminant. `poll_oneoff`
/// only has `&Error` (via `SubscriptionResult`, which isn't `Clone`
/// since `Error` isn't), so this mirrors `From<Error> for Errno`
/// without consuming the error.
fn errno_of(e: &Error) -> Errno {
    match e {
        Error::Unsupported(_) => Errno::Nosys,
        Error::Badf => Errno::Badf,
        Error::Notdir => Errno::Notdir,
        Error::Isdir => Errno::Isdir,
        Error::Noent => Errno::Noent,
        Error::Exist => Errno::Exist,
        Error::Inval => Errno::Inval,
        Error::Badmsg => Errno::Badmsg,
        Error::Notempty => Errno::Notempty,
        Error::Overflow => Errno::Overflow,
        Error::Ilseq => Errno::Ilseq,
        Error::Perm => Errno::Perm,
        Error::Acces => Errno::Acces,
        Error::Busy => Errno::Busy,
        Error::Fbig => Errno::Fbig,
        Error::Loop => Errno::Loop,
        Error::Mfile => Errno::Mfile,
        Error::Mlink => Errno::Mlink,
        Error::Nametoolong => Errno::Nametoolong,
        Error::Nfile => Errno::Nfile,
        Error::Nospc => Errno::Nospc,
        Error::Nomem => Errno::Nomem,
        Error::Spipe => Errno::Spipe,
        Error::Pipe => Errno::Pipe,
        Error::Range => Errno::Range,
        Error::Io => Errno::Io,
        Error::Fault(_) => Errno::Fault,
        Error::TableOverflow => Errno::Overflow,
        Error::FileNotCapable { .. } => Errno::Perm,
        Error::DirNotCapable { .. } => Errno::Perm,
        Error::NotCapable => Errno::Perm,
        Error::UnexpectedHost(_) => Errno::Badf,
    }
}

fn write_string_array(memory: &mut GuestMemory, items: &[String], ptr_array: u32, buf: u32) -> Result<(), Error> {
    let mut offset = buf;
    for (i, item) in items.iter().enumerate() {
        memory.write_u32(ptr_array + i as u32 * 4, offset)?;
        memory.write_bytes(offset, item.as_bytes())?;
        memory.write_u8(offset + item.len() as u32, 0)?;
        offset += item.len() as u32 + 1;
    }
    Ok(())
}

fn write_filestat(memory: &mut GuestMemory, ptr: u32, stat: &crate::file::Filestat) -> Result<(), Error> {
    memory.write_u64(ptr + layout::filestat::DEV, stat.device_id)?;
    memory.write_u64(ptr + layout::filestat::INO, stat.inode)?;
    memory.write_u8(ptr + layout::filestat::FILETYPE, filetype_tag(stat.filetype))?;
    memory.write_u64(ptr + layout::filestat::NLINK, stat.nlink)?;
    memory.write_u64(ptr + layout::filestat::SIZE_FIELD, stat.size)?;
    memory.write_u64(ptr + layout::filestat::ATIM, stat.atim)?;
    memory.write_u64(ptr + layout::filestat::MTIM, stat.mtim)?;
    memory.write_u64(ptr + layout::filestat::CTIM, stat.ctim)?;
    Ok(())
}

fn scatter(memory: &mut GuestMemory, descs: &[(u32, u32)], bytes: &[u8]) -> Result<usize, Error> {
    let mut written = 0usize;
    for desc in descs {
        if written >= bytes.len() {
            break;
        }
        let take = (bytes.len() - written).min(desc.1 as usize);
        memory.write_bytes(desc.0, &bytes[written..written + take])?;
        written += take;
    }
    Ok(written)
}

fn gather(memory: &GuestMemory, descs: &[(u32, u32)]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    for desc in descs {
        out.extend_from_slice(memory.read_span(*desc)?);
    }
    Ok(out)
}
