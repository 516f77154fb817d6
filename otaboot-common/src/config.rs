// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Well-known names, buffer sizes and runtime knobs.

// --- Partition table ---

/// Partition holding the running image (body at offset 0, header at the tail).
pub const APP_PART_NAME: &str = "app";
/// Staging partition (header at offset 0, body right after it).
pub const DOWNLOAD_PART_NAME: &str = "download";

// --- Scratch buffers ---

/// Chunk size used when streaming partitions through CRC32 or copying them.
pub const FIRM_BUF_SIZE: usize = 4096;
/// Chunk size used when pulling an image off the SD card.
pub const SDCARD_BUF_SIZE: usize = 512;

// --- IAP transport ---

/// Custom Modbus function code carrying IAP commands.
pub const IAP_FUNCTION_CODE: u8 = 0x50;
/// Capacity of the receive window the framer parses frames out of.
pub const IAP_RX_BUF_SIZE: usize = 5000;
/// Bytes requested from the serial link per poll.
pub const IAP_RX_CHUNK_SIZE: usize = 100;
/// Unparseable bytes tolerated before resyncing, until the host has synced.
pub const MAX_GARBAGE_IDLE: usize = 50;
/// Unparseable bytes tolerated before resyncing once synced (fits a WRITE frame).
pub const MAX_GARBAGE_ARMED: usize = 4200;

// --- Boot commit ---

/// Value left in the persistent register to request a jump into the application.
pub const BOOT_APP_MAGIC: u32 = 0xA5A5;

/// Runtime configuration of the bootloader state machine.
#[derive(Debug, Clone, Copy)]
pub struct BootConfig {
    /// Modbus slave address answered by the IAP slave.
    pub slave_address: u8,
    /// Number of SYNC commands needed before other commands are accepted.
    pub sync_threshold: u32,
    /// How long to wait for a host handshake before booting normally.
    pub handshake_timeout_ms: u64,
    /// Line idle time that ends one serial receive.
    pub receive_timeout_ms: u32,
    /// How long the key must be held to stay in the bootloader.
    pub key_press_ms: u64,
    /// Delay between log lines in the error state.
    pub error_delay_ms: u32,
    /// File staged from the SD card when one is mounted.
    pub sdcard_firmware_path: &'static str,
}

impl BootConfig {
    pub const fn new() -> Self {
        Self {
            slave_address: 1,
            sync_threshold: 3,
            handshake_timeout_ms: 500,
            receive_timeout_ms: 15,
            key_press_ms: 100,
            error_delay_ms: 1000,
            sdcard_firmware_path: "/firmware.rbl",
        }
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::new()
    }
}
