// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Service implementations for the bootloader.

pub mod iap;
pub mod key;
pub mod sdcard;

pub use iap::IapService;
pub use key::KeyService;
pub use sdcard::SdCardService;
