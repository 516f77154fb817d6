// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Core of the otaboot bootloader.
//!
//! This crate supports both `no_std` (embedded) and `std` (host) environments:
//! - Default: `no_std` mode for embedded targets
//! - `std` feature: Enables `std` support for host tools
//! - `defmt` / `log` features: select the logging backend (at most one)
//!
//! Everything that touches hardware goes through the traits in [`board`] and
//! [`partition`], so the package validator, the upgrade engine, the IAP slave
//! and the system state machine all run unchanged on a host.

#![cfg_attr(not(feature = "std"), no_std)]

// This mod MUST go first, so that the others see its macros.
#[macro_use]
mod fmt;

pub mod board;
pub mod config;
pub mod crc32;
pub mod error;
pub mod iap;
pub mod package;
pub mod partition;
pub mod service;
pub mod services;
pub mod system;
pub mod upgrade;
pub mod upload;
pub mod verify;

// Re-export commonly used types
pub use board::{Board, FirmwareStorage, NoStorage, SerialLink};
pub use config::{BootConfig, APP_PART_NAME, DOWNLOAD_PART_NAME};
pub use error::Error;
pub use package::{FirmwareHeader, HEADER_SIZE};
pub use partition::{Partition, RamPartition};
pub use system::{Handoff, System, SystemState, SystemStep};
pub use upgrade::{upgrade, UpgradeOutcome};
pub use verify::verify_partition;
