// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Boot decision state machine.

mod orchestrator;
mod state;

pub use orchestrator::System;
pub use state::{Handoff, SystemState, SystemStep};
