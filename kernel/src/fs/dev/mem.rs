// SPDX-License-Identifier: MPL-2.0

use super::ByteDevice;
use crate::prelude::*;

/// `/dev/null`: reads hit end-of-file, writes are swallowed.
pub struct NullDev;

impl ByteDevice for NullDev {
    fn read(&self, _off: usize, _buf: &mut [u8]) -> Result<usize> {
        Ok(0)
    }

    fn write(&self, _off: usize, buf: &[u8]) -> Result<usize> {
        Ok(buf.len())
    }
}

/// `/dev/zero`: reads produce zeros, writes are swallowed.
pub struct ZeroDev;

impl ByteDevice for ZeroDev {
    fn read(&self, _off: usize, buf: &mut [u8]) -> Result<usize> {
        buf.fill(0);
        Ok(buf.len())
    }

    fn write(&self, _off: usize, buf: &[u8]) -> Result<usize> {
        Ok(buf.len())
    }
}
