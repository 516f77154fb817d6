// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial framer feeding the IAP slave.
//!
//! Each poll appends what the link delivers to a fixed receive window, cuts
//! as many frames as possible from its front and answers them one by one.
//! An incomplete tail is moved to the head of the window for the next poll.
//! Bytes that cannot start a frame are dropped one at a time when the window
//! holds more than a frame's worth of them, or when the line went quiet.

use core::cell::RefCell;

use crate::board::{Board, SerialLink};
use crate::config::{
    IAP_RX_BUF_SIZE, IAP_RX_CHUNK_SIZE, MAX_GARBAGE_ARMED, MAX_GARBAGE_IDLE,
};
use crate::error::Error;
use crate::iap::commands::IapLayout;
use crate::iap::rtu::{frame_length, MsgType};
use crate::iap::session::IapSession;
use crate::iap::slave::handle_frame;
use crate::service::{Service, ServiceContext};

struct Framer {
    buf: [u8; IAP_RX_BUF_SIZE],
    pending: usize,
    session: IapSession,
}

pub struct IapService {
    inner: RefCell<Framer>,
}

impl IapService {
    pub const fn new() -> Self {
        Self {
            inner: RefCell::new(Framer {
                buf: [0; IAP_RX_BUF_SIZE],
                pending: 0,
                session: IapSession::new(),
            }),
        }
    }

    /// Bytes held over from earlier polls.
    pub fn pending(&self) -> usize {
        self.inner.borrow().pending
    }

    pub fn session(&self) -> IapSession {
        self.inner.borrow().session.clone()
    }
}

impl Default for IapService {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Board> Service<B> for IapService {
    fn process(&self, ctx: &mut ServiceContext<B>) -> Result<(), Error> {
        let mut inner = self.inner.borrow_mut();
        let framer = &mut *inner;

        let mut chunk = [0u8; IAP_RX_CHUNK_SIZE];
        let received = ctx
            .board
            .serial()?
            .receive(&mut chunk, ctx.config.receive_timeout_ms)?;
        let read_len = received.min(IAP_RX_BUF_SIZE - framer.pending);
        framer.buf[framer.pending..framer.pending + read_len].copy_from_slice(&chunk[..read_len]);

        let idle = framer.pending > 0 && read_len == 0;
        let mut start = 0;
        let end = framer.pending + read_len;

        while start < end {
            match frame_length(&IapLayout, &framer.buf[start..end], MsgType::Indication) {
                Ok(len) => {
                    let rsp = handle_frame(
                        &framer.buf[start..start + len],
                        &mut framer.session,
                        ctx.state,
                        ctx.config,
                    );
                    start += len;
                    if !rsp.is_empty() {
                        ctx.board.serial()?.send(&rsp)?;
                    }
                }
                Err(e) => {
                    let max_garbage = if ctx.state.stay_in_boot {
                        MAX_GARBAGE_ARMED
                    } else {
                        MAX_GARBAGE_IDLE
                    };
                    if end - start > max_garbage || idle {
                        trace!("Dropping byte 0x{:02x} ({:?})", framer.buf[start], e);
                        start += 1;
                        continue;
                    }
                    break;
                }
            }
        }

        framer.buf.copy_within(start..end, 0);
        framer.pending = end - start;
        Ok(())
    }
}
