// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Cooperative services polled by the orchestrator.

use crate::board::Board;
use crate::config::BootConfig;
use crate::error::Error;
use crate::system::SystemState;

/// Shared context passed to all services
pub struct ServiceContext<'a, B: Board> {
    pub board: &'a mut B,
    pub state: &'a mut SystemState<B::Partition>,
    pub config: &'a BootConfig,
}

/// Trait for services that run in the main loop
pub trait Service<B: Board> {
    /// Process this service's logic for one poll cycle.
    /// Uses interior mutability (Cell/RefCell) for state changes
    fn process(&self, ctx: &mut ServiceContext<B>) -> Result<(), Error>;
}
