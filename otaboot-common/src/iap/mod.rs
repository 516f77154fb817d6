// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! In-application programming over a Modbus RTU serial link.

pub mod commands;
pub mod rtu;
pub mod session;
pub mod slave;

pub use commands::{decode_reply, encode_request, Exception, IapCommand, IapLayout, Reply};
pub use session::{IapSession, IapStep, PacketDisposition};
pub use slave::{handle_frame, Response};
