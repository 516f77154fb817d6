// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Boot key: holding it down keeps the device in the bootloader.

use core::cell::Cell;

use crate::board::Board;
use crate::error::Error;
use crate::service::{Service, ServiceContext};

/// Latches the stay-in-boot flag once the key has been held long enough.
pub struct KeyService {
    was_pressed: Cell<bool>,
    deadline_ms: Cell<u64>,
}

impl KeyService {
    pub const fn new() -> Self {
        Self {
            was_pressed: Cell::new(false),
            deadline_ms: Cell::new(0),
        }
    }
}

impl Default for KeyService {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Board> Service<B> for KeyService {
    fn process(&self, ctx: &mut ServiceContext<B>) -> Result<(), Error> {
        let pressed = ctx.board.key_pressed();
        if pressed {
            let now = ctx.board.now_ms();
            if !self.was_pressed.get() {
                self.deadline_ms.set(now + ctx.config.key_press_ms);
            }
            if !ctx.state.stay_in_boot && now >= self.deadline_ms.get() {
                info!("will enter boot");
                ctx.state.stay_in_boot = true;
            }
        }
        self.was_pressed.set(pressed);
        Ok(())
    }
}
