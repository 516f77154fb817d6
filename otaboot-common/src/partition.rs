// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Named, length-bounded storage regions.

use crate::error::Error;

/// An erasable, byte-writable storage region identified by name.
///
/// Offsets are relative to the start of the partition. `read` and `write`
/// return the number of bytes transferred; a zero-length result is treated as
/// a failure by every caller.
#[allow(clippy::len_without_is_empty)]
pub trait Partition {
    fn name(&self) -> &str;
    fn len(&self) -> u32;
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, Error>;
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<usize, Error>;
    fn erase_all(&mut self) -> Result<(), Error>;
}

impl<P: Partition + ?Sized> Partition for &mut P {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn len(&self) -> u32 {
        (**self).len()
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, Error> {
        (**self).read(offset, buf)
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<usize, Error> {
        (**self).write(offset, data)
    }

    fn erase_all(&mut self) -> Result<(), Error> {
        (**self).erase_all()
    }
}

/// Value of a freshly erased byte.
pub const ERASED_BYTE: u8 = 0xFF;

/// A partition backed by memory, e.g. a `Vec<u8>` on the host or an array.
pub struct RamPartition<B> {
    name: &'static str,
    storage: B,
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> RamPartition<B> {
    pub fn new(name: &'static str, storage: B) -> Self {
        Self { name, storage }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.storage.as_ref()
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.storage.as_mut()
    }

    pub fn into_inner(self) -> B {
        self.storage
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Partition for RamPartition<B> {
    fn name(&self) -> &str {
        self.name
    }

    fn len(&self) -> u32 {
        self.storage.as_ref().len() as u32
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, Error> {
        let bytes = self.storage.as_ref();
        let start = offset as usize;
        if start > bytes.len() {
            return Err(Error::Read);
        }
        let n = buf.len().min(bytes.len() - start);
        buf[..n].copy_from_slice(&bytes[start..start + n]);
        Ok(n)
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<usize, Error> {
        let bytes = self.storage.as_mut();
        let start = offset as usize;
        let end = start.checked_add(data.len()).ok_or(Error::Write)?;
        if end > bytes.len() {
            return Err(Error::Write);
        }
        bytes[start..end].copy_from_slice(data);
        Ok(data.len())
    }

    fn erase_all(&mut self) -> Result<(), Error> {
        self.storage.as_mut().fill(ERASED_BYTE);
        Ok(())
    }
}
