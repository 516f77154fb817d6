// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Copy a validated package from a staging partition into the application
//! partition.
//!
//! The destination is erased, the body is copied to offset 0 in chunks, and
//! the header is written to the tail last. Until that final write lands the
//! destination fails validation, so a power loss mid-copy never leaves a
//! bootable half image.

use crate::config::FIRM_BUF_SIZE;
use crate::error::Error;
use crate::package::{FirmwareHeader, PackageLayout, HEADER_SIZE};
use crate::partition::Partition;
use crate::verify::verify_partition;

/// Result of a successful [`upgrade`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The image was installed and re-validated.
    Installed(FirmwareHeader),
    /// The image does not fit the destination; nothing was touched.
    Skipped,
}

/// Log the copy progress as a percentage.
pub(crate) fn log_progress(done: u32, total: u32) {
    let per = if total == 0 {
        100
    } else {
        (u64::from(done) * 100 / u64::from(total)).min(100)
    };
    info!("OTA write: {}%", per);
}

/// Install the package described by `header` from `src` into `dst`.
pub fn upgrade<S, D>(src: &mut S, header: &FirmwareHeader, dst: &mut D) -> Result<UpgradeOutcome, Error>
where
    S: Partition + ?Sized,
    D: Partition + ?Sized,
{
    let need = u64::from(header.raw_size) + HEADER_SIZE as u64;
    if need > u64::from(dst.len()) {
        warn!(
            "The partition '{}' length is ({}), need ({})!",
            dst.name(),
            dst.len(),
            need
        );
        return Ok(UpgradeOutcome::Skipped);
    }

    match verify_partition(dst) {
        Ok(current) => info!(
            "OTA firmware({}) upgrade({}->{}) startup.",
            dst.name(),
            current.version(),
            header.version()
        ),
        Err(_) => info!("OTA firmware({}) upgrade startup.", dst.name()),
    }

    info!("The partition '{}' is erasing.", dst.name());
    dst.erase_all().map_err(|_| Error::Erase)?;
    info!("The partition '{}' erase success.", dst.name());

    let src_body = PackageLayout::of(&*src)?.body_offset;
    let mut buf = [0u8; FIRM_BUF_SIZE];
    let mut done = 0u32;
    while done < header.raw_size {
        let want = ((header.raw_size - done) as usize).min(FIRM_BUF_SIZE);
        let n = src.read(src_body + done, &mut buf[..want])?;
        if n == 0 {
            return Err(Error::Read);
        }
        let written = dst.write(done, &buf[..n])?;
        if written != n {
            return Err(Error::Write);
        }
        done += n as u32;
        log_progress(done, header.raw_size);
    }

    let trailer = dst.len() - HEADER_SIZE as u32;
    let written = dst.write(trailer, &header.to_bytes())?;
    if written != HEADER_SIZE {
        return Err(Error::Write);
    }

    verify_partition(dst).map(UpgradeOutcome::Installed)
}
