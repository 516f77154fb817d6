// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Staging firmware from an SD card into the "download" partition.

use core::cell::Cell;

use crate::board::{Board, FirmwareStorage};
use crate::config::SDCARD_BUF_SIZE;
use crate::error::Error;
use crate::package::FirmwareHeader;
use crate::partition::Partition;
use crate::service::{Service, ServiceContext};
use crate::upgrade::log_progress;
use crate::verify::verify_partition;

/// Card detection progress. A failed mount is not retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MountState {
    Find,
    Mounted,
    MountFailed,
}

pub struct SdCardService {
    state: Cell<MountState>,
}

impl SdCardService {
    pub const fn new() -> Self {
        Self {
            state: Cell::new(MountState::Find),
        }
    }

    pub fn mount_state(&self) -> MountState {
        self.state.get()
    }

    pub fn is_mounted(&self) -> bool {
        self.state.get() == MountState::Mounted
    }

    /// Copy the firmware file into "download" and validate it.
    ///
    /// On success the header is cached in the shared state.
    pub fn stage<B: Board>(&self, ctx: &mut ServiceContext<B>) -> Result<FirmwareHeader, Error> {
        if !self.is_mounted() {
            warn!("sdcard is not mounted.");
            return Err(Error::StorageUnavailable);
        }

        let path = ctx.config.sdcard_firmware_path;
        let storage = ctx.board.storage().ok_or(Error::StorageUnavailable)?;
        let part = ctx
            .state
            .download_part
            .as_mut()
            .ok_or(Error::PartitionNotFound)?;

        let size = storage.stat(path).inspect_err(|_| {
            warn!("get file information failed.");
        })?;
        if size == 0 {
            warn!("{} is a empty file.", path);
            return Err(Error::EmptyImage);
        }
        if size > part.len() {
            warn!("firm size ({}) is greater than ({})", size, part.len());
            return Err(Error::SizeExceeded);
        }
        info!("firm file {} size: {}", path, size);

        storage.open(path).inspect_err(|_| {
            warn!("open {} file failed.", path);
        })?;
        let copied = copy_file(storage, part, size);
        storage.close();
        copied?;

        let header = verify_partition(part)?;
        ctx.state.download_header = Some(header);
        Ok(header)
    }
}

impl Default for SdCardService {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_file<S, P>(storage: &mut S, part: &mut P, size: u32) -> Result<(), Error>
where
    S: FirmwareStorage + ?Sized,
    P: Partition + ?Sized,
{
    info!("The partition '{}' is erasing.", part.name());
    part.erase_all()?;
    info!("The partition '{}' erase success.", part.name());

    let mut buf = [0u8; SDCARD_BUF_SIZE];
    let mut done = 0u32;
    while done < size {
        let want = ((size - done) as usize).min(SDCARD_BUF_SIZE);
        let n = storage.read(&mut buf[..want])?;
        if n == 0 {
            return Err(Error::Read);
        }
        if part.write(done, &buf[..n])? == 0 {
            return Err(Error::Write);
        }
        done += n as u32;
        log_progress(done, size);
    }
    Ok(())
}

impl<B: Board> Service<B> for SdCardService {
    /// Advance card detection and mounting by one step.
    fn process(&self, ctx: &mut ServiceContext<B>) -> Result<(), Error> {
        if self.state.get() != MountState::Find {
            return Ok(());
        }
        let Some(storage) = ctx.board.storage() else {
            return Ok(());
        };
        if !storage.detect() {
            return Ok(());
        }

        match storage.mount() {
            Ok(()) => {
                info!("sd card mounted");
                self.state.set(MountState::Mounted);
            }
            Err(e) => {
                warn!("sd card mount failed: {}", e);
                self.state.set(MountState::MountFailed);
            }
        }
        Ok(())
    }
}
