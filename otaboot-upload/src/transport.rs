// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! IAP master side of the serial link.

use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serialport::SerialPort;

use otaboot_common::iap::rtu::{frame_length, FrameError, MsgType};
use otaboot_common::iap::{decode_reply, encode_request, IapCommand, IapLayout, Reply};

/// Default time to wait for a reply.
pub const REPLY_TIMEOUT_MS: u64 = 1000;
/// Gap between SYNC bursts during the handshake.
const SYNC_INTERVAL_MS: u64 = 20;
/// Wait for the CHECK reply that confirms the handshake.
const SYNC_CHECK_TIMEOUT_MS: u64 = 60;
/// SYNC frames per burst, enough to latch the slave in one go.
const SYNC_BURST: usize = 3;
const READ_POLL_MS: u64 = 5;

/// Bytes gathered from the port until one reply frame can be cut.
#[derive(Default)]
struct ReplyBuffer {
    buf: Vec<u8>,
}

impl ReplyBuffer {
    fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    fn clear(&mut self) {
        self.buf.clear();
    }

    /// Cut the first complete frame, skipping bytes that cannot start one.
    fn take_frame(&mut self) -> Option<Vec<u8>> {
        while !self.buf.is_empty() {
            match frame_length(&IapLayout, &self.buf, MsgType::Confirmation) {
                Ok(n) => return Some(self.buf.drain(..n).collect()),
                Err(FrameError::Incomplete) => return None,
                Err(FrameError::Checksum) => {
                    self.buf.remove(0);
                }
            }
        }
        None
    }
}

/// A decoded reply with owned data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyData {
    pub command: u16,
    pub data: Vec<u8>,
}

/// IAP master over any byte stream (a serial port in practice).
pub struct Transport<P = Box<dyn SerialPort>> {
    port: P,
    name: String,
    address: u8,
    rx: ReplyBuffer,
}

impl Transport {
    /// Open a serial port. 8N1, short read timeout so polling stays responsive.
    pub fn open(port_name: &str, baud: u32, address: u8) -> Result<Self> {
        let port = serialport::new(port_name, baud)
            .timeout(Duration::from_millis(READ_POLL_MS))
            .open()
            .with_context(|| format!("Failed to open {port_name}"))?;
        Ok(Self::new(port, port_name, address))
    }
}

impl<P: Read + Write> Transport<P> {
    pub fn new(port: P, name: &str, address: u8) -> Self {
        Self {
            port,
            name: name.to_string(),
            address,
            rx: ReplyBuffer::default(),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Send a request without waiting for an answer.
    pub fn send(&mut self, command: IapCommand, data: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(data.len() + 8);
        encode_request(&mut frame, self.address, command, data)
            .map_err(|e| anyhow::anyhow!("cannot encode {command:?}: {e}"))?;
        self.port.write_all(&frame)?;
        self.port.flush()?;
        Ok(())
    }

    /// Wait for the next reply frame addressed from our slave.
    fn recv(&mut self, timeout: Duration) -> Result<ReplyData> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 256];

        loop {
            while let Some(frame) = self.rx.take_frame() {
                match decode_reply(&frame) {
                    Ok(Reply::Response {
                        address,
                        command,
                        data,
                    }) if address == self.address => {
                        return Ok(ReplyData {
                            command,
                            data: data.to_vec(),
                        });
                    }
                    Ok(Reply::Exception { address, code, .. }) if address == self.address => {
                        bail!("slave answered with exception code 0x{code:02x}");
                    }
                    // Other slaves, or a frame of a standard function code.
                    _ => {}
                }
            }

            if Instant::now() >= deadline {
                bail!("timed out waiting for a reply on {}", self.name);
            }
            match self.port.read(&mut chunk) {
                Ok(0) => thread::sleep(Duration::from_millis(READ_POLL_MS)),
                Ok(n) => self.rx.extend(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e).context("serial read failed"),
            }
        }
    }

    /// Send a request and wait for the reply carrying the same command.
    pub fn request(&mut self, command: IapCommand, data: &[u8], timeout_ms: u64) -> Result<Vec<u8>> {
        self.rx.clear();
        self.send(command, data)?;
        let reply = self.recv(Duration::from_millis(timeout_ms))?;
        if reply.command != command.code() {
            bail!(
                "reply to {:?} carries command {} instead of {}",
                command,
                reply.command,
                command.code()
            );
        }
        Ok(reply.data)
    }

    /// Keep the slave in the bootloader: send SYNC bursts until it answers
    /// CHECK, for at most `wait`.
    pub fn handshake(&mut self, wait: Duration) -> Result<()> {
        let deadline = Instant::now() + wait;
        while Instant::now() < deadline {
            for _ in 0..SYNC_BURST {
                self.send(IapCommand::Sync, &[])?;
            }
            if self
                .request(IapCommand::Check, &[], SYNC_CHECK_TIMEOUT_MS)
                .is_ok()
            {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(SYNC_INTERVAL_MS));
        }
        bail!("no handshake with slave {} on {}", self.address, self.name)
    }
}
