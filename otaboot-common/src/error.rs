// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

use core::fmt;

/// Errors raised by storage, package validation and the IAP transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A partition or file read failed or came back short.
    Read,
    /// A partition write failed or was short.
    Write,
    /// Erasing a partition failed.
    Erase,
    /// The stored header CRC32 does not match the header bytes.
    HeaderCrcMismatch,
    /// The body CRC32 does not match the declared body.
    BodyCrcMismatch,
    /// The package type tag is not `RBL`.
    UnsupportedType,
    /// The package is encrypted.
    UnsupportedCrypto,
    /// The package is compressed.
    UnsupportedCompression,
    /// The image does not fit its destination.
    SizeExceeded,
    /// The serial link stopped answering.
    ///
    /// Raised by [`SerialLink`](crate::board::SerialLink) implementations
    /// whose link can fail outright (a detached USB bridge, a closed host
    /// port). A quiet UART line is not a failure and reads as `Ok(0)`.
    TransportTimeout,
    /// Bytes on the serial link could not be framed.
    TransportDesync,
    /// A WRITE packet older than the last accepted one.
    StaleSequence,
    /// A required partition is missing from the partition table.
    PartitionNotFound,
    /// No SD card (or filesystem) is available.
    StorageUnavailable,
    /// The image to stage is empty.
    EmptyImage,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Read => "partition read error",
            Self::Write => "partition write error",
            Self::Erase => "partition erase error",
            Self::HeaderCrcMismatch => "firmware header CRC32 mismatch",
            Self::BodyCrcMismatch => "firmware body CRC32 mismatch",
            Self::UnsupportedType => "unsupported firmware package type",
            Self::UnsupportedCrypto => "encrypted firmware is not supported",
            Self::UnsupportedCompression => "compressed firmware is not supported",
            Self::SizeExceeded => "firmware does not fit the partition",
            Self::TransportTimeout => "serial transport timeout",
            Self::TransportDesync => "serial transport lost frame sync",
            Self::StaleSequence => "stale packet sequence number",
            Self::PartitionNotFound => "partition not found",
            Self::StorageUnavailable => "firmware storage unavailable",
            Self::EmptyImage => "firmware image is empty",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for Error {}
