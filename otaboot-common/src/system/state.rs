// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

use crate::package::FirmwareHeader;

/// How control leaves the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Handoff {
    /// Boot magic written and reset issued; the application runs next.
    Application,
    /// Plain reset after a failed install; the next boot starts over.
    Reset,
}

/// Orchestrator steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemStep {
    #[default]
    Init,
    VerifyDownload,
    /// Waiting for a host handshake since `since_ms`.
    WaitSync {
        since_ms: u64,
    },
    BootProcess,
    SdCard,
    Update,
    Error,
    /// Terminal. Only observable where the handoff returns (host doubles).
    Handoff(Handoff),
}

/// State shared by the orchestrator and the services it drives.
pub struct SystemState<P> {
    pub app_part: Option<P>,
    pub download_part: Option<P>,
    /// Header of the last successful "download" validation.
    pub download_header: Option<FirmwareHeader>,
    /// SYNC commands seen so far.
    pub sync_count: u32,
    /// Latched: stay in the bootloader and serve IAP commands.
    pub stay_in_boot: bool,
    /// Latched: the session is over, install and boot.
    pub quit: bool,
    pub step: SystemStep,
}

impl<P> SystemState<P> {
    pub const fn new() -> Self {
        Self {
            app_part: None,
            download_part: None,
            download_header: None,
            sync_count: 0,
            stay_in_boot: false,
            quit: false,
            step: SystemStep::Init,
        }
    }
}

impl<P> Default for SystemState<P> {
    fn default() -> Self {
        Self::new()
    }
}
