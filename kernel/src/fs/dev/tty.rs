// SPDX-License-Identifier: MPL-2.0

use super::ByteDevice;
use crate::prelude::*;

/// A virtual terminal backed by an in-memory byte queue. Writes append;
/// reads drain whatever is pending and return 0 when nothing is.
pub struct Tty {
    buf: SpinLock<VecDeque<u8>>,
}

impl Tty {
    pub fn new() -> Tty {
        Tty {
            buf: SpinLock::new(VecDeque::new()),
        }
    }

    pub fn pending(&self) -> usize {
        self.buf.lock().len()
    }
}

impl Default for Tty {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteDevice for Tty {
    fn read(&self, _off: usize, buf: &mut [u8]) -> Result<usize> {
        let mut queue = self.buf.lock();
        let mut n = 0;
        while n < buf.len() {
            let Some(byte) = queue.pop_front() else {
                break;
            };
            buf[n] = byte;
            n += 1;
        }
        Ok(n)
    }

    fn write(&self, _off: usize, buf: &[u8]) -> Result<usize> {
        self.buf.lock().extend(buf.iter().copied());
        Ok(buf.len())
    }
}
