// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Progress of one IAP download.

use crate::error::Error;

/// Session progress. Only moves forward until the device resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IapStep {
    #[default]
    Null,
    /// Destination erased, nothing written yet.
    Start,
    Write,
    Update,
}

/// What to do with an incoming WRITE packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDisposition {
    /// Same number as the last accepted packet: acknowledge, write nothing.
    Duplicate,
    /// The declared size has been reached: acknowledge, write nothing.
    Complete,
    /// Write `len` bytes at [`IapSession::write_len`].
    Accept { len: usize },
}

#[derive(Debug, Clone, Default)]
pub struct IapSession {
    step: IapStep,
    total_len: u32,
    write_len: u32,
    write_packet: u16,
}

impl IapSession {
    pub const fn new() -> Self {
        Self {
            step: IapStep::Null,
            total_len: 0,
            write_len: 0,
            write_packet: 0,
        }
    }

    pub fn step(&self) -> IapStep {
        self.step
    }

    pub fn total_len(&self) -> u32 {
        self.total_len
    }

    pub fn write_len(&self) -> u32 {
        self.write_len
    }

    pub fn write_packet(&self) -> u16 {
        self.write_packet
    }

    /// Declare a new image size and rewind the write progress.
    pub fn begin(&mut self, total_len: u32) {
        self.total_len = total_len;
        self.write_len = 0;
        self.write_packet = 0;
    }

    /// Record that the destination has been erased.
    pub fn mark_erased(&mut self) {
        self.step = IapStep::Start;
    }

    /// Decide what to do with packet `packet` carrying `len` bytes.
    ///
    /// Packets older than the last accepted one fail with
    /// [`Error::StaleSequence`]. An accepted packet is truncated to the
    /// declared size and moves the session to [`IapStep::Write`]; progress
    /// only advances once [`commit`](Self::commit) confirms the write.
    pub fn admit(&mut self, packet: u16, len: usize) -> Result<PacketDisposition, Error> {
        if packet == self.write_packet {
            return Ok(PacketDisposition::Duplicate);
        }
        if packet < self.write_packet {
            return Err(Error::StaleSequence);
        }
        if self.write_len >= self.total_len {
            self.write_packet = packet;
            return Ok(PacketDisposition::Complete);
        }

        let remaining = (self.total_len - self.write_len) as usize;
        self.step = IapStep::Write;
        Ok(PacketDisposition::Accept {
            len: len.min(remaining),
        })
    }

    /// Record a successful write of `len` bytes for `packet`.
    pub fn commit(&mut self, packet: u16, len: usize) {
        self.write_packet = packet;
        self.write_len += len as u32;
    }

    /// The host asked to install the image.
    pub fn finish(&mut self) {
        self.step = IapStep::Update;
    }
}
