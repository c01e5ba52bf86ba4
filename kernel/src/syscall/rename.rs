// SPDX-License-Identifier: MPL-2.0

use super::{do_link, do_unlink};
use crate::prelude::*;

/// Rename by linking then unlinking.
///
/// This is weaker than POSIX rename: it is not atomic, and if the unlink
/// fails the file is left with both names.
pub fn do_rename(oldname: &str, newname: &str) -> Result<()> {
    debug!("rename {:?} -> {:?}", oldname, newname);
    do_link(oldname, newname)?;
    do_unlink(oldname)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        fs::file::{O_CREAT, O_RDONLY, O_RDWR},
        syscall, test_env,
    };

    #[test]
    fn rename_moves_the_data() {
        test_env::run(|| {
            let fd = syscall::do_open("/old", O_CREAT | O_RDWR).unwrap();
            syscall::do_write(fd, b"contents").unwrap();
            syscall::do_close(fd).unwrap();

            do_rename("/old", "/new").unwrap();
            assert_eq!(
                syscall::do_stat("/old").unwrap_err().error(),
                Errno::ENOENT
            );
            let fd = syscall::do_open("/new", O_RDONLY).unwrap();
            let mut buf = [0u8; 8];
            syscall::do_read(fd, &mut buf).unwrap();
            assert_eq!(&buf, b"contents");
            syscall::do_close(fd).unwrap();
        });
    }

    #[test]
    fn rename_onto_an_existing_name_fails() {
        test_env::run(|| {
            for p in ["/x", "/y"] {
                let fd = syscall::do_open(p, O_CREAT | O_RDWR).unwrap();
                syscall::do_close(fd).unwrap();
            }
            assert_eq!(do_rename("/x", "/y").unwrap_err().error(), Errno::EEXIST);
            // The failed rename left the source alone.
            syscall::do_stat("/x").unwrap();
        });
    }
}
