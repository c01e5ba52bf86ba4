// SPDX-License-Identifier: MPL-2.0

use super::fget;
use crate::{
    fs::{file::FileMode, file_table::FileDesc},
    prelude::*,
};

/// Write to `fd` at its current position. Append-mode files seek to the
/// end of the file first.
pub fn do_write(fd: FileDesc, buf: &[u8]) -> Result<usize> {
    let file = fget(fd)?;
    if !file.mode().writable() {
        return_errno_with_message!(Errno::EBADF, "file is not open for writing");
    }
    if file.mode().contains(FileMode::APPEND) {
        file.set_pos(file.vnode().len());
    }
    let n = file.vnode().write_at(file.pos(), buf)?;
    file.advance_pos(n);
    debug_assert!(
        file.vnode().vtype().is_device() || file.pos() <= file.vnode().len()
    );
    Ok(n)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        fs::file::{O_APPEND, O_CREAT, O_RDONLY, O_RDWR},
        syscall, test_env,
    };

    #[test]
    fn write_requires_a_writable_fd() {
        test_env::run(|| {
            assert_eq!(do_write(-1, b"x").unwrap_err().error(), Errno::EBADF);

            let fd = syscall::do_open("/ro", O_CREAT | O_RDWR).unwrap();
            syscall::do_close(fd).unwrap();
            let fd = syscall::do_open("/ro", O_RDONLY).unwrap();
            assert_eq!(do_write(fd, b"x").unwrap_err().error(), Errno::EBADF);
            syscall::do_close(fd).unwrap();
        });
    }

    #[test]
    fn append_always_writes_at_the_end() {
        test_env::run(|| {
            let fd = syscall::do_open("/log", O_CREAT | O_RDWR).unwrap();
            syscall::do_write(fd, b"first").unwrap();
            syscall::do_close(fd).unwrap();

            let fd = syscall::do_open("/log", O_RDWR | O_APPEND).unwrap();
            // Position starts at zero, but append seeks to the end.
            do_write(fd, b"+second").unwrap();
            syscall::do_close(fd).unwrap();

            let fd = syscall::do_open("/log", O_RDONLY).unwrap();
            let mut buf = [0u8; 32];
            let n = syscall::do_read(fd, &mut buf).unwrap();
            assert_eq!(&buf[..n], b"first+second");
            syscall::do_close(fd).unwrap();
        });
    }
}
