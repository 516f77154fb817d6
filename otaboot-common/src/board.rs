// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Hardware seams consumed by the orchestrator and its services.

use crate::error::Error;
use crate::partition::Partition;

/// Half-duplex byte link to the host.
pub trait SerialLink {
    /// Fill `buf` with received bytes.
    ///
    /// Returns once `buf` is full, or once no byte has arrived for
    /// `idle_timeout_ms`. Returning `Ok(0)` means the line stayed quiet.
    /// Errors (typically [`Error::TransportTimeout`]) mean the link itself
    /// is gone; the orchestrator stops serving IAP when it sees one.
    fn receive(&mut self, buf: &mut [u8], idle_timeout_ms: u32) -> Result<usize, Error>;

    fn send(&mut self, data: &[u8]) -> Result<(), Error>;
}

/// Removable storage holding firmware files (SD card).
pub trait FirmwareStorage {
    /// Card present in the slot.
    fn detect(&mut self) -> bool;
    fn mount(&mut self) -> Result<(), Error>;
    /// Size of the file at `path`.
    fn stat(&mut self, path: &str) -> Result<u32, Error>;
    fn open(&mut self, path: &str) -> Result<(), Error>;
    /// Read from the open file. `Ok(0)` at end of file.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error>;
    fn close(&mut self);
}

/// Storage for boards without a card slot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStorage;

impl FirmwareStorage for NoStorage {
    fn detect(&mut self) -> bool {
        false
    }

    fn mount(&mut self) -> Result<(), Error> {
        Err(Error::StorageUnavailable)
    }

    fn stat(&mut self, _path: &str) -> Result<u32, Error> {
        Err(Error::StorageUnavailable)
    }

    fn open(&mut self, _path: &str) -> Result<(), Error> {
        Err(Error::StorageUnavailable)
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Error> {
        Err(Error::StorageUnavailable)
    }

    fn close(&mut self) {}
}

/// Everything the bootloader needs from the board.
pub trait Board {
    type Partition: Partition;
    type Serial: SerialLink;
    type Storage: FirmwareStorage;

    /// Bring up the partition table.
    fn init_partitions(&mut self) -> Result<(), Error>;

    /// Handle to the partition called `name`.
    fn find_partition(&mut self, name: &str) -> Option<Self::Partition>;

    /// The IAP link. Opened on first use.
    fn serial(&mut self) -> Result<&mut Self::Serial, Error>;

    /// The card slot, when the board has one.
    fn storage(&mut self) -> Option<&mut Self::Storage>;

    /// Monotonic milliseconds since power-up.
    fn now_ms(&self) -> u64;

    fn delay_ms(&mut self, ms: u32);

    /// Raw level of the boot key, `true` while held down.
    fn key_pressed(&mut self) -> bool;

    /// Leave the boot magic in the persistent register and reset into the
    /// application. Never returns on hardware.
    fn boot_application(&mut self);

    /// Plain reset. Never returns on hardware.
    fn system_reset(&mut self);
}
