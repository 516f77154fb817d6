// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! RBL firmware package header.
//!
//! A package is a 96-byte packed little-endian header plus a raw body. In the
//! staging ("download") partition the header comes first and the body follows;
//! in the application partition the body starts at offset 0 so it can execute
//! in place, and the header trails at the very end of the partition.
//!
//! ```text
//! off  len  field
//!   0    4  type          "RBL\0"
//!   4    2  algo          crypt bits [3:0], compression bits [11:8]
//!   6    2  algo2
//!   8    4  time_stamp
//!  12   16  app_part_name
//!  28   24  version_name
//!  52   24  reserved
//!  76    4  body_crc32
//!  80    4  hash_code
//!  84    4  raw_size
//!  88    4  pkg_size
//!  92    4  hdr_crc32     CRC32 of bytes 0..92
//! ```

use crate::config::APP_PART_NAME;
use crate::crc32;
use crate::error::Error;
use crate::partition::Partition;

pub const HEADER_SIZE: usize = 96;

/// Type tag written by the packer. Only the first three bytes are compared.
pub const PACKAGE_TYPE: [u8; 4] = *b"RBL\0";

const HDR_CRC_OFFSET: usize = HEADER_SIZE - 4;
const CRYPT_MASK: u16 = 0x000F;
const CMPRS_MASK: u16 = 0x0F00;

/// Encryption applied to the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CryptAlgo {
    None,
    Xor,
    Aes256,
    Other(u8),
}

/// Compression applied to the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompressAlgo {
    None,
    Gzip,
    QuickLz,
    FastLz,
    Other(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareHeader {
    pub kind: [u8; 4],
    pub algo: u16,
    pub algo2: u16,
    pub timestamp: u32,
    pub app_part_name: [u8; 16],
    pub version_name: [u8; 24],
    pub reserved: [u8; 24],
    pub body_crc32: u32,
    pub hash_code: u32,
    pub raw_size: u32,
    /// Header plus body. Carried for the packing tools, never validated.
    pub pkg_size: u32,
    pub hdr_crc32: u32,
}

fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn array<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[at..at + N]);
    out
}

/// Text of a NUL-padded field, cut at the first NUL or invalid UTF-8 byte.
fn field_str(field: &[u8]) -> &str {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    match core::str::from_utf8(&field[..end]) {
        Ok(s) => s,
        Err(e) => core::str::from_utf8(&field[..e.valid_up_to()]).unwrap_or_default(),
    }
}

/// Copy `s` into a NUL-padded field, always leaving room for a terminator.
fn set_field_str(field: &mut [u8], s: &str) {
    field.fill(0);
    let n = s.len().min(field.len() - 1);
    field[..n].copy_from_slice(&s.as_bytes()[..n]);
}

impl FirmwareHeader {
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            kind: array(bytes, 0),
            algo: le_u16(bytes, 4),
            algo2: le_u16(bytes, 6),
            timestamp: le_u32(bytes, 8),
            app_part_name: array(bytes, 12),
            version_name: array(bytes, 28),
            reserved: array(bytes, 52),
            body_crc32: le_u32(bytes, 76),
            hash_code: le_u32(bytes, 80),
            raw_size: le_u32(bytes, 84),
            pkg_size: le_u32(bytes, 88),
            hdr_crc32: le_u32(bytes, 92),
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.kind);
        out[4..6].copy_from_slice(&self.algo.to_le_bytes());
        out[6..8].copy_from_slice(&self.algo2.to_le_bytes());
        out[8..12].copy_from_slice(&self.timestamp.to_le_bytes());
        out[12..28].copy_from_slice(&self.app_part_name);
        out[28..52].copy_from_slice(&self.version_name);
        out[52..76].copy_from_slice(&self.reserved);
        out[76..80].copy_from_slice(&self.body_crc32.to_le_bytes());
        out[80..84].copy_from_slice(&self.hash_code.to_le_bytes());
        out[84..88].copy_from_slice(&self.raw_size.to_le_bytes());
        out[88..92].copy_from_slice(&self.pkg_size.to_le_bytes());
        out[92..96].copy_from_slice(&self.hdr_crc32.to_le_bytes());
        out
    }

    /// Build a sealed header describing `body`.
    pub fn for_body(body: &[u8], version: &str, app_part: &str, timestamp: u32) -> Self {
        let mut header = Self {
            kind: PACKAGE_TYPE,
            algo: 0,
            algo2: 0,
            timestamp,
            app_part_name: [0; 16],
            version_name: [0; 24],
            reserved: [0; 24],
            body_crc32: crc32::checksum(body),
            hash_code: 0,
            raw_size: body.len() as u32,
            pkg_size: (HEADER_SIZE + body.len()) as u32,
            hdr_crc32: 0,
        };
        set_field_str(&mut header.app_part_name, app_part);
        set_field_str(&mut header.version_name, version);
        header.seal();
        header
    }

    /// Recompute `hdr_crc32` after editing fields.
    pub fn seal(&mut self) {
        self.hdr_crc32 = self.computed_crc32();
    }

    /// CRC32 of every header byte preceding `hdr_crc32`.
    pub fn computed_crc32(&self) -> u32 {
        crc32::checksum(&self.to_bytes()[..HDR_CRC_OFFSET])
    }

    pub fn crypt_algo(&self) -> CryptAlgo {
        match self.algo & CRYPT_MASK {
            0 => CryptAlgo::None,
            1 => CryptAlgo::Xor,
            2 => CryptAlgo::Aes256,
            other => CryptAlgo::Other(other as u8),
        }
    }

    pub fn compress_algo(&self) -> CompressAlgo {
        match (self.algo & CMPRS_MASK) >> 8 {
            0 => CompressAlgo::None,
            1 => CompressAlgo::Gzip,
            2 => CompressAlgo::QuickLz,
            3 => CompressAlgo::FastLz,
            other => CompressAlgo::Other(other as u8),
        }
    }

    pub fn type_str(&self) -> &str {
        field_str(&self.kind)
    }

    pub fn version(&self) -> &str {
        field_str(&self.version_name)
    }

    pub fn app_part(&self) -> &str {
        field_str(&self.app_part_name)
    }

    /// Header-only policy checks: CRC, type tag and algorithms, in that order.
    pub fn check(&self) -> Result<(), Error> {
        if self.computed_crc32() != self.hdr_crc32 {
            return Err(Error::HeaderCrcMismatch);
        }
        if self.kind[..3] != PACKAGE_TYPE[..3] {
            return Err(Error::UnsupportedType);
        }
        if self.crypt_algo() != CryptAlgo::None {
            return Err(Error::UnsupportedCrypto);
        }
        if self.compress_algo() != CompressAlgo::None {
            return Err(Error::UnsupportedCompression);
        }
        Ok(())
    }
}

/// Where header and body live inside a given partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageLayout {
    pub header_offset: u32,
    pub body_offset: u32,
}

impl PackageLayout {
    /// Layout derived from the partition's identity: trailing header for the
    /// application partition, leading header for any other.
    pub fn of<P: Partition + ?Sized>(part: &P) -> Result<Self, Error> {
        if part.name() == APP_PART_NAME {
            let header_offset = part
                .len()
                .checked_sub(HEADER_SIZE as u32)
                .ok_or(Error::Read)?;
            Ok(Self {
                header_offset,
                body_offset: 0,
            })
        } else {
            Ok(Self {
                header_offset: 0,
                body_offset: HEADER_SIZE as u32,
            })
        }
    }
}
