// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! IAP commands carried by Modbus function code 0x50.
//!
//! Request and response share one shape:
//!
//! ```text
//! address | 0x50 | cmd (u16 BE) | len (u16 BE) | data[len] | crc16 (LE)
//! ```

use crate::config::IAP_FUNCTION_CODE;
use crate::error::Error;
use crate::iap::rtu::{self, FrameLayout, MsgType, CHECKSUM_LENGTH, EXCEPTION_FLAG, HEADER_LENGTH};

/// Bytes from the slave address up to the IAP data.
pub const IAP_HEADER_LENGTH: usize = HEADER_LENGTH + 1 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum IapCommand {
    Sync = 1,
    Check = 2,
    Start = 3,
    Write = 4,
    Update = 5,
}

impl IapCommand {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Sync),
            2 => Some(Self::Check),
            3 => Some(Self::Start),
            4 => Some(Self::Write),
            5 => Some(Self::Update),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Modbus exception codes returned by the slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Exception {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    ServerDeviceFailure = 0x04,
}

/// Frame lengths for function 0x50; other unknown codes carry no payload.
pub struct IapLayout;

impl FrameLayout for IapLayout {
    fn meta_length(&self, function: u8, msg_type: MsgType) -> usize {
        match (function, msg_type) {
            (IAP_FUNCTION_CODE, _) => 4,
            (_, MsgType::Indication) => 0,
            (_, MsgType::Confirmation) => 1,
        }
    }

    fn data_length(&self, msg: &[u8], _msg_type: MsgType) -> usize {
        if msg[HEADER_LENGTH] != IAP_FUNCTION_CODE {
            return 0;
        }
        usize::from(u16::from_be_bytes([
            msg[HEADER_LENGTH + 3],
            msg[HEADER_LENGTH + 4],
        ]))
    }
}

/// Append a complete request frame for `command` to `out`.
///
/// Fails with [`Error::SizeExceeded`] when `data` does not fit the 16-bit
/// length field.
pub fn encode_request<E: Extend<u8>>(
    out: &mut E,
    address: u8,
    command: IapCommand,
    data: &[u8],
) -> Result<(), Error> {
    let len = u16::try_from(data.len()).map_err(|_| Error::SizeExceeded)?;
    let cmd = command.code().to_be_bytes();
    let len = len.to_be_bytes();
    let head = [address, IAP_FUNCTION_CODE, cmd[0], cmd[1], len[0], len[1]];

    let mut crc = rtu::digest();
    crc.update(&head);
    crc.update(data);

    out.extend(head);
    out.extend(data.iter().copied());
    out.extend(crc.finalize().to_le_bytes());
    Ok(())
}

/// A decoded slave reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply<'a> {
    Response {
        address: u8,
        command: u16,
        data: &'a [u8],
    },
    Exception {
        address: u8,
        function: u8,
        code: u8,
    },
}

/// Decode one complete reply frame, as cut by [`rtu::frame_length`] with
/// [`MsgType::Confirmation`].
pub fn decode_reply(frame: &[u8]) -> Result<Reply<'_>, Error> {
    if frame.len() < HEADER_LENGTH + 1 + 1 + CHECKSUM_LENGTH {
        return Err(Error::TransportDesync);
    }
    let body = frame.len() - CHECKSUM_LENGTH;
    let stored = u16::from_le_bytes([frame[body], frame[body + 1]]);
    if rtu::checksum(&frame[..body]) != stored {
        return Err(Error::TransportDesync);
    }

    let address = frame[0];
    let function = frame[HEADER_LENGTH];
    if function & EXCEPTION_FLAG != 0 {
        return Ok(Reply::Exception {
            address,
            function: function & !EXCEPTION_FLAG,
            code: frame[HEADER_LENGTH + 1],
        });
    }
    if function != IAP_FUNCTION_CODE || body < IAP_HEADER_LENGTH {
        return Err(Error::TransportDesync);
    }

    let command = u16::from_be_bytes([frame[2], frame[3]]);
    let len = usize::from(u16::from_be_bytes([frame[4], frame[5]]));
    if IAP_HEADER_LENGTH + len != body {
        return Err(Error::TransportDesync);
    }
    Ok(Reply::Response {
        address,
        command,
        data: &frame[IAP_HEADER_LENGTH..body],
    })
}
