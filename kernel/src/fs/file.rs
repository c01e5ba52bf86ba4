// SPDX-License-Identifier: MPL-2.0

//! Open-file descriptions.

use super::vnode::Vnode;
use crate::prelude::*;

// Flags accepted by `do_open`. The low bits select the access mode; the
// rest are independent bits.
pub const O_RDONLY: u32 = 0x000;
pub const O_WRONLY: u32 = 0x001;
pub const O_RDWR: u32 = 0x002;
pub const O_CREAT: u32 = 0x100;
pub const O_TRUNC: u32 = 0x200;
pub const O_APPEND: u32 = 0x400;

const ACCESS_MASK: u32 = 0x00f;

bitflags! {
    /// Access mode of an open file.
    pub struct FileMode: u32 {
        const READ   = 1;
        const WRITE  = 2;
        const APPEND = 4;
    }
}

impl FileMode {
    /// Classify the access bits of `oflags`; anything but RDONLY, WRONLY
    /// and RDWR is rejected.
    pub fn from_oflags(oflags: u32) -> Result<FileMode> {
        let mut mode = match oflags & ACCESS_MASK {
            O_RDONLY => FileMode::READ,
            O_WRONLY => FileMode::WRITE,
            O_RDWR => FileMode::READ | FileMode::WRITE,
            _ => return_errno_with_message!(Errno::EINVAL, "bad access mode"),
        };
        if oflags & O_APPEND != 0 {
            mode |= FileMode::APPEND;
        }
        Ok(mode)
    }

    pub fn readable(&self) -> bool {
        self.contains(FileMode::READ)
    }

    pub fn writable(&self) -> bool {
        self.contains(FileMode::WRITE)
    }
}

/// An open-file description: (mode, position, vnode). Shared by every fd
/// that refers to it, across dup and fork.
pub struct File {
    mode: FileMode,
    pos: SpinLock<usize>,
    vnode: Arc<dyn Vnode>,
}

impl File {
    pub fn new(mode: FileMode, vnode: Arc<dyn Vnode>) -> Arc<File> {
        Arc::new(File {
            mode,
            pos: SpinLock::new(0),
            vnode,
        })
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn vnode(&self) -> &Arc<dyn Vnode> {
        &self.vnode
    }

    pub fn pos(&self) -> usize {
        *self.pos.lock()
    }

    pub fn set_pos(&self, pos: usize) {
        *self.pos.lock() = pos;
    }

    pub fn advance_pos(&self, delta: usize) {
        *self.pos.lock() += delta;
    }
}

impl Debug for File {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("File")
            .field("mode", &self.mode)
            .field("pos", &self.pos())
            .finish()
    }
}
