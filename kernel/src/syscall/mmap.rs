// SPDX-License-Identifier: MPL-2.0

use align_ext::AlignExt;

use super::fget;
use crate::{
    config::{addr_to_pn, page_aligned, pn_to_addr, USER_MEM_HIGH, USER_MEM_LOW},
    fs::{
        file::{File, FileMode},
        file_table::FileDesc,
    },
    prelude::*,
    vm::vmmap::{MapFlags, VmProt, VmmapDir},
};

/// Map `len` bytes into the current address space.
///
/// With `addr == 0` the kernel picks a range from the top of user memory
/// down; otherwise the mapping lands at `addr`, replacing any overlap.
/// Without a usable descriptor the mapping must be anonymous. Returns the
/// mapped address.
pub fn do_mmap(
    addr: usize,
    len: usize,
    prot: VmProt,
    flags: MapFlags,
    fd: FileDesc,
    off: usize,
) -> Result<usize> {
    debug!(
        "mmap addr = {:#x}, len = {:#x}, prot = {:?}, flags = {:?}, fd = {}, off = {:#x}",
        addr, len, prot, flags, fd, off
    );
    let shared = flags.contains(MapFlags::MAP_SHARED);
    let private = flags.contains(MapFlags::MAP_PRIVATE);
    if shared == private {
        return_errno_with_message!(
            Errno::EINVAL,
            "exactly one of MAP_SHARED and MAP_PRIVATE is required"
        );
    }

    let current = current!();
    if current.file_table().lock().next_free().is_none() {
        return_errno_with_message!(Errno::ENFILE, "file table exhausted");
    }

    let file: Option<Arc<File>> = if fd == -1 { None } else { fget(fd).ok() };
    if file.is_none() && !flags.contains(MapFlags::MAP_ANON) {
        return_errno_with_message!(Errno::EBADF, "no usable descriptor and MAP_ANON not set");
    }
    if let Some(file) = &file {
        let mode = file.mode();
        let denied = (private && !mode.readable())
            || (shared
                && prot.contains(VmProt::PROT_WRITE)
                && !mode.contains(FileMode::READ | FileMode::WRITE))
            || (prot.contains(VmProt::PROT_WRITE) && mode.contains(FileMode::APPEND));
        if denied {
            return_errno_with_message!(Errno::EACCES, "descriptor mode denies the mapping");
        }
    }

    if !page_aligned(off)
        || !page_aligned(addr)
        || len == 0
        || len > USER_MEM_HIGH - USER_MEM_LOW
        || addr >= USER_MEM_HIGH
        || (addr < USER_MEM_LOW && addr != 0)
    {
        return_errno_with_message!(Errno::EINVAL, "bad addr, length or offset");
    }

    let npages = len.align_up(PAGE_SIZE) / PAGE_SIZE;
    let lopage = addr_to_pn(addr);
    let vnode = file.as_ref().map(|f| f.vnode().clone());

    let start = current.vmmap().lock().map(
        vnode.as_ref(),
        lopage,
        npages,
        prot,
        flags,
        addr_to_pn(off),
        VmmapDir::HiLo,
    )?;

    let ret = pn_to_addr(start);
    current
        .page_dir()
        .unmap_range(ret, ret + npages * PAGE_SIZE);
    Ok(ret)
}

/// Unmap `[addr, addr + len)`.
pub fn do_munmap(addr: usize, len: usize) -> Result<()> {
    debug!("munmap addr = {:#x}, len = {:#x}", addr, len);
    if len == 0
        || len > USER_MEM_HIGH - USER_MEM_LOW
        || addr >= USER_MEM_HIGH
        || (addr < USER_MEM_LOW && addr != 0)
    {
        return_errno_with_message!(Errno::EINVAL, "bad addr or length");
    }

    let npages = len.align_up(PAGE_SIZE) / PAGE_SIZE;
    let lopage = addr_to_pn(addr);
    let current = current!();
    current.vmmap().lock().remove(lopage, npages);
    current
        .page_dir()
        .unmap_range(pn_to_addr(lopage), pn_to_addr(lopage + npages));
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        fs::file::{O_CREAT, O_RDONLY, O_RDWR},
        process, syscall, test_env,
        vm::vmmap::{read_bytes, write_bytes},
    };

    const RW: VmProt = VmProt::from_bits_truncate(
        VmProt::PROT_READ.bits() | VmProt::PROT_WRITE.bits(),
    );

    #[test]
    fn anonymous_private_mapping_is_zero_filled_and_writable() {
        test_env::run(|| {
            let addr = do_mmap(
                0,
                PAGE_SIZE,
                RW,
                MapFlags::MAP_PRIVATE | MapFlags::MAP_ANON,
                -1,
                0,
            )
            .unwrap();
            assert!(addr >= USER_MEM_LOW && addr < USER_MEM_HIGH);

            let current = current!();
            let mut buf = [0xffu8; 8];
            read_bytes(current.vmmap(), addr, &mut buf).unwrap();
            assert_eq!(buf, [0u8; 8]);

            write_bytes(current.vmmap(), addr, b"written").unwrap();
            read_bytes(current.vmmap(), addr, &mut buf).unwrap();
            assert_eq!(&buf[..7], b"written");

            do_munmap(addr, PAGE_SIZE).unwrap();
            assert_eq!(
                read_bytes(current.vmmap(), addr, &mut buf)
                    .unwrap_err()
                    .error(),
                Errno::EFAULT
            );
        });
    }

    #[test]
    fn flag_and_argument_validation() {
        test_env::run(|| {
            let both = MapFlags::MAP_PRIVATE | MapFlags::MAP_SHARED | MapFlags::MAP_ANON;
            for flags in [MapFlags::MAP_ANON, both] {
                assert_eq!(
                    do_mmap(0, PAGE_SIZE, RW, flags, -1, 0).unwrap_err().error(),
                    Errno::EINVAL
                );
            }
            let anon = MapFlags::MAP_PRIVATE | MapFlags::MAP_ANON;
            // Zero and oversized lengths.
            assert_eq!(
                do_mmap(0, 0, RW, anon, -1, 0).unwrap_err().error(),
                Errno::EINVAL
            );
            assert_eq!(
                do_mmap(0, USER_MEM_HIGH, RW, anon, -1, 0).unwrap_err().error(),
                Errno::EINVAL
            );
            // Misaligned hint and offset.
            assert_eq!(
                do_mmap(USER_MEM_LOW + 1, PAGE_SIZE, RW, anon, -1, 0)
                    .unwrap_err()
                    .error(),
                Errno::EINVAL
            );
            assert_eq!(
                do_mmap(0, PAGE_SIZE, RW, anon, -1, 3).unwrap_err().error(),
                Errno::EINVAL
            );
            // File mapping without a descriptor.
            assert_eq!(
                do_mmap(0, PAGE_SIZE, RW, MapFlags::MAP_PRIVATE, -1, 0)
                    .unwrap_err()
                    .error(),
                Errno::EBADF
            );
        });
    }

    #[test]
    fn private_file_mapping_needs_a_readable_fd() {
        test_env::run(|| {
            let fd = syscall::do_open("/f", O_CREAT | O_RDWR).unwrap();
            syscall::do_write(fd, &[7u8; 64]).unwrap();
            syscall::do_close(fd).unwrap();

            let fd = syscall::do_open("/f", crate::fs::file::O_WRONLY).unwrap();
            assert_eq!(
                do_mmap(0, PAGE_SIZE, RW, MapFlags::MAP_PRIVATE, fd, 0)
                    .unwrap_err()
                    .error(),
                Errno::EACCES
            );
            syscall::do_close(fd).unwrap();
        });
    }

    #[test]
    fn private_file_store_does_not_reach_the_file() {
        test_env::run(|| {
            let fd = syscall::do_open("/data", O_CREAT | O_RDWR).unwrap();
            syscall::do_write(fd, &[0xaau8; 16]).unwrap();

            let addr = do_mmap(0, PAGE_SIZE, RW, MapFlags::MAP_PRIVATE, fd, 0).unwrap();
            let current = current!();

            let mut buf = [0u8; 16];
            read_bytes(current.vmmap(), addr, &mut buf).unwrap();
            assert_eq!(buf, [0xaau8; 16]);

            write_bytes(current.vmmap(), addr, &[0x55u8; 16]).unwrap();
            read_bytes(current.vmmap(), addr, &mut buf).unwrap();
            assert_eq!(buf, [0x55u8; 16]);

            // The backing file still holds the original bytes.
            syscall::do_lseek(fd, 0, syscall::SEEK_SET).unwrap();
            syscall::do_read(fd, &mut buf).unwrap();
            assert_eq!(buf, [0xaau8; 16]);
            syscall::do_close(fd).unwrap();

            do_munmap(addr, PAGE_SIZE).unwrap();
        });
    }

    #[test]
    fn fixed_address_hints_are_honored() {
        test_env::run(|| {
            let hint = USER_MEM_LOW + 16 * PAGE_SIZE;
            let anon = MapFlags::MAP_PRIVATE | MapFlags::MAP_ANON | MapFlags::MAP_FIXED;
            let addr = do_mmap(hint, 2 * PAGE_SIZE, RW, anon, -1, 0).unwrap();
            assert_eq!(addr, hint);

            // Mapping over the same range replaces the old mapping.
            let current = current!();
            write_bytes(current.vmmap(), hint, &[1u8; 4]).unwrap();
            let addr = do_mmap(hint, 2 * PAGE_SIZE, RW, anon, -1, 0).unwrap();
            assert_eq!(addr, hint);
            let mut buf = [0xffu8; 4];
            read_bytes(current.vmmap(), hint, &mut buf).unwrap();
            assert_eq!(buf, [0u8; 4]);
            do_munmap(hint, 2 * PAGE_SIZE).unwrap();
        });
    }

    #[test]
    fn fork_cow_keeps_parent_and_child_apart() {
        test_env::run(|| {
            let addr = do_mmap(
                0,
                PAGE_SIZE,
                RW,
                MapFlags::MAP_PRIVATE | MapFlags::MAP_ANON,
                -1,
                0,
            )
            .unwrap();
            let current = current!();
            write_bytes(current.vmmap(), addr, &[0xaa]).unwrap();

            let pid = process::do_fork(move || {
                let me = current!();
                let mut byte = [0u8];
                read_bytes(me.vmmap(), addr, &mut byte).unwrap();
                assert_eq!(byte[0], 0xaa, "child must inherit the parent's store");

                write_bytes(me.vmmap(), addr, &[0x55]).unwrap();
                read_bytes(me.vmmap(), addr, &mut byte).unwrap();
                assert_eq!(byte[0], 0x55);
                process::do_exit(0);
            })
            .unwrap();

            let (_, status) = process::do_waitpid(pid, 0).unwrap();
            assert_eq!(status, 0);

            // The child's store must not be visible here.
            let mut byte = [0u8];
            read_bytes(current.vmmap(), addr, &mut byte).unwrap();
            assert_eq!(byte[0], 0xaa);
        });
    }

    #[test]
    fn shared_anonymous_mapping_is_visible_across_children() {
        test_env::run(|| {
            let addr = do_mmap(
                0,
                PAGE_SIZE,
                RW,
                MapFlags::MAP_SHARED | MapFlags::MAP_ANON,
                -1,
                0,
            )
            .unwrap();

            let writer = process::do_fork(move || {
                let me = current!();
                write_bytes(me.vmmap(), addr, b"ping").unwrap();
                process::do_exit(0);
            })
            .unwrap();
            process::do_waitpid(writer, 0).unwrap();

            let reader = process::do_fork(move || {
                let me = current!();
                let mut buf = [0u8; 4];
                read_bytes(me.vmmap(), addr, &mut buf).unwrap();
                assert_eq!(&buf, b"ping", "siblings must share the region");
                process::do_exit(0);
            })
            .unwrap();
            let (_, status) = process::do_waitpid(reader, 0).unwrap();
            assert_eq!(status, 0);

            // The parent sees the store as well.
            let mut buf = [0u8; 4];
            read_bytes(current!().vmmap(), addr, &mut buf).unwrap();
            assert_eq!(&buf, b"ping");
        });
    }

    #[test]
    fn shared_file_mapping_aliases_the_same_pages() {
        test_env::run(|| {
            let fd = syscall::do_open("/shared", O_CREAT | O_RDWR).unwrap();
            syscall::do_write(fd, &[0u8; 64]).unwrap();

            let a = do_mmap(0, PAGE_SIZE, RW, MapFlags::MAP_SHARED, fd, 0).unwrap();
            let b = do_mmap(0, PAGE_SIZE, RW, MapFlags::MAP_SHARED, fd, 0).unwrap();
            assert_ne!(a, b);

            let current = current!();
            write_bytes(current.vmmap(), a, b"via-a").unwrap();
            let mut buf = [0u8; 5];
            read_bytes(current.vmmap(), b, &mut buf).unwrap();
            assert_eq!(&buf, b"via-a");

            do_munmap(a, PAGE_SIZE).unwrap();
            do_munmap(b, PAGE_SIZE).unwrap();
            syscall::do_close(fd).unwrap();
            let _ = syscall::do_open("/shared", O_RDONLY).unwrap();
        });
    }
}
