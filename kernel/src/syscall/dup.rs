// SPDX-License-Identifier: MPL-2.0

use super::fget;
use crate::{config::NFILES, fs::file_table::FileDesc, prelude::*};

/// Duplicate `fd` into the lowest free descriptor.
pub fn do_dup(fd: FileDesc) -> Result<FileDesc> {
    let file = fget(fd)?;
    current!().file_table().lock().install(file)
}

/// Duplicate `ofd` into `nfd`, closing whatever `nfd` held. Duplicating
/// a descriptor onto itself is a no-op.
pub fn do_dup2(ofd: FileDesc, nfd: FileDesc) -> Result<FileDesc> {
    if !(0..NFILES as FileDesc).contains(&nfd) {
        return_errno_with_message!(Errno::EBADF, "new descriptor out of range");
    }
    let file = fget(ofd)?;
    if ofd == nfd {
        return Ok(nfd);
    }
    let replaced = current!().file_table().lock().install_at(nfd, file);
    drop(replaced);
    Ok(nfd)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        fs::file::{O_CREAT, O_RDWR},
        syscall, test_env,
    };

    #[test]
    fn dup_shares_the_file_position() {
        test_env::run(|| {
            let fd = syscall::do_open("/f", O_CREAT | O_RDWR).unwrap();
            syscall::do_write(fd, b"abcdef").unwrap();
            syscall::do_lseek(fd, 0, syscall::SEEK_SET).unwrap();

            let dup = do_dup(fd).unwrap();
            assert_ne!(fd, dup);

            let mut buf = [0u8; 3];
            syscall::do_read(fd, &mut buf).unwrap();
            assert_eq!(&buf, b"abc");

            // Closing one copy leaves the other usable, at the shared
            // offset.
            syscall::do_close(fd).unwrap();
            syscall::do_read(dup, &mut buf).unwrap();
            assert_eq!(&buf, b"def");
            syscall::do_close(dup).unwrap();
        });
    }

    #[test]
    fn dup2_closes_the_target_first() {
        test_env::run(|| {
            let a = syscall::do_open("/a", O_CREAT | O_RDWR).unwrap();
            let b = syscall::do_open("/b", O_CREAT | O_RDWR).unwrap();
            syscall::do_write(a, b"from-a").unwrap();

            assert_eq!(do_dup2(a, b).unwrap(), b);
            syscall::do_lseek(b, 0, syscall::SEEK_SET).unwrap();
            let mut buf = [0u8; 6];
            syscall::do_read(b, &mut buf).unwrap();
            assert_eq!(&buf, b"from-a");

            syscall::do_close(a).unwrap();
            syscall::do_close(b).unwrap();
        });
    }

    #[test]
    fn dup2_onto_itself_is_a_no_op() {
        test_env::run(|| {
            let fd = syscall::do_open("/same", O_CREAT | O_RDWR).unwrap();
            assert_eq!(do_dup2(fd, fd).unwrap(), fd);
            // Still open.
            syscall::do_write(fd, b"x").unwrap();
            syscall::do_close(fd).unwrap();
        });
    }

    #[test]
    fn dup2_range_checks_the_target() {
        test_env::run(|| {
            let fd = syscall::do_open("/r", O_CREAT | O_RDWR).unwrap();
            assert_eq!(do_dup2(fd, -2).unwrap_err().error(), Errno::EBADF);
            assert_eq!(
                do_dup2(fd, NFILES as FileDesc).unwrap_err().error(),
                Errno::EBADF
            );
            syscall::do_close(fd).unwrap();
        });
    }
}
