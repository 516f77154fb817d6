// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! In-place validation of a firmware package stored in a partition.

use crate::config::FIRM_BUF_SIZE;
use crate::crc32::Crc32;
use crate::error::Error;
use crate::package::{FirmwareHeader, PackageLayout, HEADER_SIZE};
use crate::partition::Partition;

/// Read the header at `offset` and apply the header-only checks.
pub fn read_header<P: Partition + ?Sized>(
    part: &mut P,
    offset: u32,
) -> Result<FirmwareHeader, Error> {
    let mut raw = [0u8; HEADER_SIZE];
    let n = part.read(offset, &mut raw).inspect_err(|_| {
        error!("Partition[{}] read head error!", part.name());
    })?;
    if n != HEADER_SIZE {
        error!("Partition[{}] read head error!", part.name());
        return Err(Error::Read);
    }

    let header = FirmwareHeader::from_bytes(&raw);
    if let Err(e) = header.check() {
        match e {
            Error::HeaderCrcMismatch => error!("Partition[{}] head CRC32 error!", part.name()),
            Error::UnsupportedType => error!(
                "Partition[{}] type[{}] not supported.",
                part.name(),
                header.type_str()
            ),
            Error::UnsupportedCrypto => error!("Not support crypt!"),
            Error::UnsupportedCompression => error!("Not support compress!"),
            _ => {}
        }
        return Err(e);
    }
    Ok(header)
}

/// Stream `len` bytes starting at `offset` through CRC32.
///
/// An empty body, or one running past the end of the partition, fails with
/// [`Error::Read`].
pub fn body_crc32<P: Partition + ?Sized>(part: &mut P, offset: u32, len: u32) -> Result<u32, Error> {
    if len == 0 {
        error!("Partition[{}] firmware body is empty!", part.name());
        return Err(Error::Read);
    }
    let mut buf = [0u8; FIRM_BUF_SIZE];
    let mut crc = Crc32::new();
    let mut done = 0u32;
    while done < len {
        let want = ((len - done) as usize).min(FIRM_BUF_SIZE);
        let at = offset.checked_add(done).ok_or(Error::Read)?;
        let n = part.read(at, &mut buf[..want])?;
        if n == 0 {
            return Err(Error::Read);
        }
        crc.update(&buf[..n]);
        done += n as u32;
    }
    Ok(crc.finalize())
}

/// Validate the package held by `part` and return its header.
///
/// Header and body offsets come from the partition's identity (see
/// [`PackageLayout`]), so the same call works for the staging partition, the
/// application partition and anything staged from external storage. Nothing
/// is written.
pub fn verify_partition<P: Partition + ?Sized>(part: &mut P) -> Result<FirmwareHeader, Error> {
    let layout = PackageLayout::of(&*part)?;
    let header = read_header(part, layout.header_offset)?;

    let calc_crc = body_crc32(part, layout.body_offset, header.raw_size)?;
    if calc_crc != header.body_crc32 {
        error!(
            "Firmware body CRC32 (calc 0x{:08x} != hdr 0x{:08x}) error on '{}' partition!",
            calc_crc,
            header.body_crc32,
            part.name()
        );
        return Err(Error::BodyCrcMismatch);
    }

    info!(
        "Verify '{}' partition (fw ver: {}, timestamp: {}) success.",
        part.name(),
        header.version(),
        header.timestamp
    );
    Ok(header)
}
