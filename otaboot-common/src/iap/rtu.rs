// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Modbus RTU frame boundaries and checksum.
//!
//! An RTU frame is `address | function | meta | data | crc16`, where the
//! meta and data lengths depend on the function code and on the direction of
//! the message. Standard function codes use the lengths defined by the Modbus
//! application protocol; anything else is described by a [`FrameLayout`].

use crc::{Crc, CRC_16_MODBUS};

use crate::error::Error;

static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Bytes before the function code (the slave address).
pub const HEADER_LENGTH: usize = 1;
/// Trailing CRC-16 bytes.
pub const CHECKSUM_LENGTH: usize = 2;
/// Address every slave accepts and none answers.
pub const BROADCAST_ADDRESS: u8 = 0;
/// Set on the function code of an exception response.
pub const EXCEPTION_FLAG: u8 = 0x80;

const FC_WRITE_SINGLE_COIL: u8 = 0x05;
const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;
const FC_READ_INPUT_REGISTERS: u8 = 0x04;
const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;
const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;
const FC_REPORT_SLAVE_ID: u8 = 0x11;
const FC_MASK_WRITE_REGISTER: u8 = 0x16;
const FC_WRITE_AND_READ_REGISTERS: u8 = 0x17;

/// Direction of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    /// Request, as seen by a slave.
    Indication,
    /// Response, as seen by a master.
    Confirmation,
}

/// Lengths of non-standard function codes.
pub trait FrameLayout {
    /// Bytes between the function code and the variable data.
    fn meta_length(&self, function: u8, msg_type: MsgType) -> usize;

    /// Variable data length. `msg` holds at least the header, function code
    /// and meta bytes.
    fn data_length(&self, msg: &[u8], msg_type: MsgType) -> usize;
}

/// Why no frame could be cut from the front of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// More bytes are needed.
    Incomplete,
    /// The frame is complete but its CRC does not match.
    Checksum,
}

impl From<FrameError> for Error {
    fn from(_: FrameError) -> Self {
        Error::TransportDesync
    }
}

fn meta_length<L: FrameLayout + ?Sized>(layout: &L, function: u8, msg_type: MsgType) -> usize {
    match msg_type {
        MsgType::Indication => match function {
            0..=FC_WRITE_SINGLE_REGISTER => 4,
            FC_WRITE_MULTIPLE_COILS | FC_WRITE_MULTIPLE_REGISTERS => 5,
            FC_MASK_WRITE_REGISTER => 6,
            FC_WRITE_AND_READ_REGISTERS => 9,
            _ => layout.meta_length(function, msg_type),
        },
        MsgType::Confirmation => match function {
            FC_WRITE_SINGLE_COIL
            | FC_WRITE_SINGLE_REGISTER
            | FC_WRITE_MULTIPLE_COILS
            | FC_WRITE_MULTIPLE_REGISTERS => 4,
            FC_MASK_WRITE_REGISTER => 6,
            _ => layout.meta_length(function, msg_type),
        },
    }
}

fn byte_at(msg: &[u8], at: usize) -> usize {
    msg.get(at).copied().map_or(0, usize::from)
}

fn data_length<L: FrameLayout + ?Sized>(layout: &L, msg: &[u8], msg_type: MsgType) -> usize {
    let function = msg[HEADER_LENGTH];
    match msg_type {
        MsgType::Indication => match function {
            FC_WRITE_MULTIPLE_COILS | FC_WRITE_MULTIPLE_REGISTERS => {
                byte_at(msg, HEADER_LENGTH + 5)
            }
            FC_WRITE_AND_READ_REGISTERS => byte_at(msg, HEADER_LENGTH + 9),
            _ => layout.data_length(msg, msg_type),
        },
        MsgType::Confirmation => match function {
            0..=FC_READ_INPUT_REGISTERS | FC_REPORT_SLAVE_ID | FC_WRITE_AND_READ_REGISTERS => {
                byte_at(msg, HEADER_LENGTH + 1)
            }
            _ => layout.data_length(msg, msg_type),
        },
    }
}

/// Length of the frame at the front of `msg`, CRC included.
///
/// The CRC is checked once the whole frame is available. Bytes after the
/// frame are ignored.
pub fn frame_length<L: FrameLayout + ?Sized>(
    layout: &L,
    msg: &[u8],
    msg_type: MsgType,
) -> Result<usize, FrameError> {
    if msg.len() < HEADER_LENGTH + 1 {
        return Err(FrameError::Incomplete);
    }
    let function = msg[HEADER_LENGTH];
    let fixed = HEADER_LENGTH + 1 + meta_length(layout, function, msg_type);
    if msg.len() < fixed {
        return Err(FrameError::Incomplete);
    }
    let total = fixed + data_length(layout, &msg[..fixed], msg_type) + CHECKSUM_LENGTH;
    if msg.len() < total {
        return Err(FrameError::Incomplete);
    }

    let body = total - CHECKSUM_LENGTH;
    let stored = u16::from_le_bytes([msg[body], msg[body + 1]]);
    if checksum(&msg[..body]) != stored {
        return Err(FrameError::Checksum);
    }
    Ok(total)
}

/// CRC-16/MODBUS of `data`. Sent low byte first.
pub fn checksum(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Digest for building a frame piecewise.
pub fn digest() -> crc::Digest<'static, u16> {
    CRC16.digest()
}
