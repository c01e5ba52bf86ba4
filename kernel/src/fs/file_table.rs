// SPDX-License-Identifier: MPL-2.0

use cygnet_slot_vec::SlotVec;

use super::file::File;
use crate::{config::NFILES, prelude::*};

pub type FileDesc = i32;

/// The per-process file-descriptor table: at most `NFILES` slots, each
/// holding a shared open-file description.
pub struct FileTable {
    table: SlotVec<Arc<File>>,
}

impl FileTable {
    pub const fn new() -> Self {
        Self {
            table: SlotVec::new(),
        }
    }

    fn valid(fd: FileDesc) -> bool {
        (0..NFILES as FileDesc).contains(&fd)
    }

    /// Look up `fd`, taking a new reference on its file.
    pub fn get(&self, fd: FileDesc) -> Option<Arc<File>> {
        if !Self::valid(fd) {
            return None;
        }
        self.table.get(fd as usize).cloned()
    }

    /// The lowest free descriptor, if any.
    pub fn next_free(&self) -> Option<FileDesc> {
        self.table.first_free_within(NFILES).map(|fd| fd as FileDesc)
    }

    /// Install `file` in the lowest free slot.
    pub fn install(&mut self, file: Arc<File>) -> Result<FileDesc> {
        match self.table.put_within(file, NFILES) {
            Some(fd) => Ok(fd as FileDesc),
            None => return_errno_with_message!(Errno::EMFILE, "file descriptor table is full"),
        }
    }

    /// Install `file` at `fd`, returning whatever was there before.
    pub fn install_at(&mut self, fd: FileDesc, file: Arc<File>) -> Option<Arc<File>> {
        debug_assert!(Self::valid(fd));
        self.table.put_at(fd as usize, file)
    }

    /// Clear `fd`, dropping the table's reference on its file.
    pub fn remove(&mut self, fd: FileDesc) -> Option<Arc<File>> {
        if !Self::valid(fd) {
            return None;
        }
        self.table.remove(fd as usize)
    }

    pub fn close_all(&mut self) {
        let fds: Vec<usize> = self.table.idxes_and_items().map(|(idx, _)| idx).collect();
        for fd in fds {
            self.table.remove(fd);
        }
    }

    pub fn fds_and_files(&self) -> impl Iterator<Item = (FileDesc, &'_ Arc<File>)> {
        self.table
            .idxes_and_items()
            .map(|(idx, file)| (idx as FileDesc, file))
    }
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for FileTable {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}
