// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! IAP command interpreter.
//!
//! Takes one complete, CRC-checked request frame and produces the response
//! frame, or nothing. Every command other than SYNC is ignored until the
//! handshake latch is set, either by enough SYNC commands or by the boot key.

use heapless::Vec;

use crate::config::{BootConfig, IAP_FUNCTION_CODE};
use crate::iap::commands::{Exception, IapCommand, IAP_HEADER_LENGTH};
use crate::iap::rtu::{self, BROADCAST_ADDRESS, EXCEPTION_FLAG, HEADER_LENGTH};
use crate::iap::session::{IapSession, IapStep, PacketDisposition};
use crate::partition::Partition;
use crate::system::SystemState;

/// Longest frame the slave ever sends (a WRITE acknowledgement).
pub const MAX_RESPONSE_LENGTH: usize = 16;

/// Response frame. Empty when nothing is to be sent.
pub type Response = Vec<u8, MAX_RESPONSE_LENGTH>;

/// Length field plus data following the echoed command code.
type Body = Vec<u8, 8>;

enum Outcome {
    Silent,
    Reply(Body),
    Exception(Exception),
}

fn body(bytes: &[u8]) -> Body {
    // Bodies are at most 5 bytes.
    Vec::from_slice(bytes).unwrap_or_default()
}

fn handle_sync<P>(state: &mut SystemState<P>, config: &BootConfig) -> Outcome {
    state.sync_count = state.sync_count.saturating_add(1);
    if state.sync_count >= config.sync_threshold && !state.stay_in_boot {
        info!("Handshake complete after {} SYNC commands.", state.sync_count);
        state.stay_in_boot = true;
    }
    Outcome::Silent
}

fn handle_start<P: Partition>(
    data: &[u8],
    session: &mut IapSession,
    state: &mut SystemState<P>,
) -> Outcome {
    let Ok(raw) = <[u8; 4]>::try_from(data) else {
        return Outcome::Exception(Exception::IllegalDataValue);
    };
    let firm_len = u32::from_be_bytes(raw);
    let Some(app) = state.app_part.as_mut() else {
        return Outcome::Exception(Exception::ServerDeviceFailure);
    };
    if firm_len > app.len() {
        return Outcome::Exception(Exception::IllegalDataValue);
    }

    session.begin(firm_len);
    info!("start iap, frm_size:{}", firm_len);

    if session.step() == IapStep::Start {
        info!("has been erased.");
        return Outcome::Reply(body(&[0, 1, 1]));
    }

    match app.erase_all() {
        Ok(()) => {
            info!("erase success.");
            session.mark_erased();
            Outcome::Reply(body(&[0, 1, 1]))
        }
        Err(e) => {
            error!("erase {} partition failed: {}", app.name(), e);
            Outcome::Reply(body(&[0, 1, 0]))
        }
    }
}

fn handle_write<P: Partition>(
    data: &[u8],
    session: &mut IapSession,
    state: &mut SystemState<P>,
) -> Outcome {
    if data.len() < 4 {
        return Outcome::Exception(Exception::IllegalDataValue);
    }
    let packet = u16::from_be_bytes([data[0], data[1]]);
    if packet == 0 {
        return Outcome::Exception(Exception::IllegalDataValue);
    }
    let firm_len = usize::from(u16::from_be_bytes([data[2], data[3]]));
    if data.len() != 4 + firm_len {
        return Outcome::Exception(Exception::IllegalDataValue);
    }
    let firm = &data[4..];
    let Some(app) = state.app_part.as_mut() else {
        return Outcome::Exception(Exception::ServerDeviceFailure);
    };

    let ok = match session.admit(packet, firm_len) {
        Ok(PacketDisposition::Duplicate) => {
            warn!("packet_num({}) has been written.", packet);
            true
        }
        Err(_) => {
            error!(
                "packet_num({}) is less than write_packet({})",
                packet,
                session.write_packet()
            );
            false
        }
        Ok(PacketDisposition::Complete) => {
            warn!(
                "write_len({}) is >= total_len({})",
                session.write_len(),
                session.total_len()
            );
            true
        }
        Ok(PacketDisposition::Accept { len }) => {
            if len < firm_len {
                warn!(
                    "write_len({}) + firm_len({}) is greater than total_len({})",
                    session.write_len(),
                    firm_len,
                    session.total_len()
                );
            }
            match app.write(session.write_len(), &firm[..len]) {
                Ok(n) if n == len => {
                    session.commit(packet, len);
                    true
                }
                _ => {
                    error!("write {} partition failed.", app.name());
                    false
                }
            }
        }
    };

    let [hi, lo] = session.write_packet().to_be_bytes();
    Outcome::Reply(body(&[0, 3, hi, lo, u8::from(ok)]))
}

fn handle_update<P>(session: &mut IapSession, state: &mut SystemState<P>) -> Outcome {
    info!("IAP update requested.");
    state.quit = true;
    session.finish();
    Outcome::Reply(body(&[0, 0]))
}

fn seal(mut frame: Response) -> Response {
    let crc = rtu::checksum(&frame).to_le_bytes();
    // Frames are built well under MAX_RESPONSE_LENGTH.
    let _ = frame.extend_from_slice(&crc);
    frame
}

/// Interpret one request frame.
///
/// `frame` must be a whole frame as cut by [`rtu::frame_length`]. Frames for
/// other slaves, other function codes and broadcasts produce no response.
pub fn handle_frame<P: Partition>(
    frame: &[u8],
    session: &mut IapSession,
    state: &mut SystemState<P>,
    config: &BootConfig,
) -> Response {
    let mut rsp = Response::new();

    let address = frame[0];
    if address != config.slave_address && address != BROADCAST_ADDRESS {
        return rsp;
    }
    let function = frame[HEADER_LENGTH];
    if function != IAP_FUNCTION_CODE || frame.len() < IAP_HEADER_LENGTH + rtu::CHECKSUM_LENGTH {
        return rsp;
    }

    let cmd = u16::from_be_bytes([frame[2], frame[3]]);
    let data = &frame[IAP_HEADER_LENGTH..frame.len() - rtu::CHECKSUM_LENGTH];
    let command = IapCommand::from_code(cmd);

    if !state.stay_in_boot && command != Some(IapCommand::Sync) {
        return rsp;
    }

    let outcome = match command {
        Some(IapCommand::Sync) => handle_sync(state, config),
        Some(IapCommand::Check) => Outcome::Reply(body(&[0, 0])),
        Some(IapCommand::Start) => handle_start(data, session, state),
        Some(IapCommand::Write) => handle_write(data, session, state),
        Some(IapCommand::Update) => handle_update(session, state),
        None => Outcome::Silent,
    };

    if address == BROADCAST_ADDRESS {
        return rsp;
    }

    // Capacity is never exceeded: 2 + 2 + 5 bytes at most before the CRC.
    match outcome {
        Outcome::Silent => return rsp,
        Outcome::Reply(body) => {
            let _ = rsp.extend_from_slice(&[address, function]);
            let _ = rsp.extend_from_slice(&cmd.to_be_bytes());
            let _ = rsp.extend_from_slice(&body);
        }
        Outcome::Exception(code) => {
            warn!("IAP command {} rejected with exception {}", cmd, code as u8);
            let _ = rsp.extend_from_slice(&[address, function | EXCEPTION_FLAG, code as u8]);
        }
    }
    seal(rsp)
}
