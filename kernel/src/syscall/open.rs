// SPDX-License-Identifier: MPL-2.0

use crate::{
    fs::{
        dev,
        file::{File, FileMode, O_TRUNC},
        file_table::FileDesc,
        namev::open_namev,
        vnode::VnodeType,
    },
    prelude::*,
};

/// Open `path` and return a new file descriptor for it.
pub fn do_open(path: &str, oflags: u32) -> Result<FileDesc> {
    debug!("open path = {:?}, oflags = {:#x}", path, oflags);
    let mode = FileMode::from_oflags(oflags)?;
    let current = current!();

    if current.file_table().lock().next_free().is_none() {
        return_errno_with_message!(Errno::EMFILE, "too many open files");
    }

    let vnode = open_namev(path, oflags, None)?;

    if vnode.is_dir() && mode.writable() {
        return_errno_with_message!(Errno::EISDIR, "directories cannot be opened for writing");
    }
    match vnode.vtype() {
        VnodeType::CharDev if dev::bytedev_lookup(vnode.devid()).is_none() => {
            return_errno_with_message!(Errno::ENXIO, "no such character device");
        }
        VnodeType::BlockDev if dev::blockdev_lookup(vnode.devid()).is_none() => {
            return_errno_with_message!(Errno::ENXIO, "no such block device");
        }
        _ => {}
    }

    if oflags & O_TRUNC != 0 && mode.writable() {
        vnode.truncate(0)?;
    }

    let file = File::new(mode, vnode);
    let fd = current.file_table().lock().install(file);
    fd
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::NFILES,
        fs::file::{O_CREAT, O_RDONLY, O_RDWR, O_WRONLY},
        syscall, test_env,
    };

    #[test]
    fn create_then_reopen() {
        test_env::run(|| {
            let fd = do_open("/file", O_CREAT | O_RDWR).unwrap();
            assert_eq!(syscall::do_write(fd, b"payload").unwrap(), 7);
            syscall::do_close(fd).unwrap();

            let fd = do_open("/file", O_RDONLY).unwrap();
            let mut buf = [0u8; 16];
            assert_eq!(syscall::do_read(fd, &mut buf).unwrap(), 7);
            assert_eq!(&buf[..7], b"payload");
            syscall::do_close(fd).unwrap();
        });
    }

    #[test]
    fn missing_file_without_creat_is_enoent() {
        test_env::run(|| {
            let err = do_open("/nope", O_RDONLY).unwrap_err();
            assert_eq!(err.error(), Errno::ENOENT);
        });
    }

    #[test]
    fn bad_access_mode_is_einval() {
        test_env::run(|| {
            let err = do_open("/whatever", 0x3).unwrap_err();
            assert_eq!(err.error(), Errno::EINVAL);
        });
    }

    #[test]
    fn directory_opened_writable_is_eisdir() {
        test_env::run(|| {
            syscall::do_mkdir("/d").unwrap();
            let err = do_open("/d", O_WRONLY).unwrap_err();
            assert_eq!(err.error(), Errno::EISDIR);
            // Read-only opens of directories are fine.
            let fd = do_open("/d", O_RDONLY).unwrap();
            syscall::do_close(fd).unwrap();
        });
    }

    #[test]
    fn fd_exhaustion_is_emfile() {
        test_env::run(|| {
            let mut fds = Vec::new();
            loop {
                match do_open("/spam", O_CREAT | O_RDWR) {
                    Ok(fd) => fds.push(fd),
                    Err(e) => {
                        assert_eq!(e.error(), Errno::EMFILE);
                        break;
                    }
                }
            }
            assert_eq!(fds.len(), NFILES);
            for fd in fds {
                syscall::do_close(fd).unwrap();
            }
        });
    }

    #[test]
    fn trunc_resets_length() {
        test_env::run(|| {
            let fd = do_open("/t", O_CREAT | O_RDWR).unwrap();
            syscall::do_write(fd, b"0123456789").unwrap();
            syscall::do_close(fd).unwrap();
            assert_eq!(syscall::do_stat("/t").unwrap().size, 10);

            let fd = do_open("/t", O_RDWR | O_TRUNC).unwrap();
            assert_eq!(syscall::do_stat("/t").unwrap().size, 0);
            syscall::do_close(fd).unwrap();
        });
    }

    #[test]
    fn unregistered_device_is_enxio() {
        test_env::run(|| {
            use crate::fs::vnode::DevId;
            syscall::do_mknod("/ghost", VnodeType::CharDev, DevId::new(9, 9)).unwrap();
            let err = do_open("/ghost", O_RDONLY).unwrap_err();
            assert_eq!(err.error(), Errno::ENXIO);
        });
    }
}
