// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for RTU frame cutting and the serial framer service.

mod common;

use common::{request, start_data, write_data, MockBoard, SharedPartition, SLAVE};
use otaboot_common::iap::rtu::{self, frame_length, FrameError, MsgType};
use otaboot_common::iap::{decode_reply, IapCommand, IapLayout, Reply};
use otaboot_common::service::{Service, ServiceContext};
use otaboot_common::services::IapService;
use otaboot_common::{BootConfig, Error, SystemState};

struct Link {
    board: MockBoard,
    state: SystemState<SharedPartition>,
    config: BootConfig,
    service: IapService,
}

impl Link {
    fn new() -> Self {
        let board = MockBoard::new();
        let mut state = SystemState::new();
        state.app_part = Some(board.app.clone());
        Self {
            board,
            state,
            config: BootConfig::default(),
            service: IapService::new(),
        }
    }

    fn poll(&mut self) -> Result<(), Error> {
        let mut ctx = ServiceContext {
            board: &mut self.board,
            state: &mut self.state,
            config: &self.config,
        };
        self.service.process(&mut ctx)
    }

    fn push(&mut self, bytes: &[u8]) {
        self.board.serial.push(bytes);
    }

    fn arm(&mut self) {
        for _ in 0..3 {
            self.push(&request(SLAVE, IapCommand::Sync, &[]));
            self.poll().unwrap();
        }
        assert!(self.state.stay_in_boot);
    }

    fn replies(&self) -> Vec<u16> {
        self.board
            .serial
            .tx
            .iter()
            .map(|frame| match decode_reply(frame).unwrap() {
                Reply::Response { command, .. } => command,
                Reply::Exception { code, .. } => 0xEE00 | u16::from(code),
            })
            .collect()
    }
}

fn with_crc(mut frame: Vec<u8>) -> Vec<u8> {
    let crc = rtu::checksum(&frame).to_le_bytes();
    frame.extend_from_slice(&crc);
    frame
}

#[test]
fn test_frame_length_iap_request() {
    let frame = request(SLAVE, IapCommand::Start, &start_data(10));
    assert_eq!(frame.len(), 12);
    assert_eq!(frame_length(&IapLayout, &frame, MsgType::Indication), Ok(12));

    let mut longer = frame.clone();
    longer.extend_from_slice(&[1, 2, 3]);
    assert_eq!(frame_length(&IapLayout, &longer, MsgType::Indication), Ok(12));

    for cut in 0..frame.len() {
        assert_eq!(
            frame_length(&IapLayout, &frame[..cut], MsgType::Indication),
            Err(FrameError::Incomplete)
        );
    }
}

#[test]
fn test_frame_length_bad_checksum() {
    let mut frame = request(SLAVE, IapCommand::Check, &[]);
    frame[7] ^= 0xFF;
    assert_eq!(
        frame_length(&IapLayout, &frame, MsgType::Indication),
        Err(FrameError::Checksum)
    );
    assert_eq!(Error::from(FrameError::Checksum), Error::TransportDesync);
}

#[test]
fn test_frame_length_standard_functions() {
    // Read holding registers request: fixed 8 bytes.
    let read = with_crc(vec![1, 0x03, 0x00, 0x10, 0x00, 0x02]);
    assert_eq!(frame_length(&IapLayout, &read, MsgType::Indication), Ok(8));

    // Write multiple registers request: byte count at offset 6.
    let write = with_crc(vec![1, 0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 1, 2, 3, 4]);
    assert_eq!(frame_length(&IapLayout, &write, MsgType::Indication), Ok(13));

    // Read holding registers response: byte count at offset 2.
    let rsp = with_crc(vec![1, 0x03, 0x04, 1, 2, 3, 4]);
    assert_eq!(frame_length(&IapLayout, &rsp, MsgType::Confirmation), Ok(9));

    // Exception response.
    let exc = with_crc(vec![1, 0xD0, 0x03]);
    assert_eq!(frame_length(&IapLayout, &exc, MsgType::Confirmation), Ok(5));
}

#[test]
fn test_frame_length_iap_response() {
    let rsp = with_crc(vec![1, 0x50, 0x00, 0x04, 0x00, 0x03, 0x00, 0x07, 0x01]);
    assert_eq!(frame_length(&IapLayout, &rsp, MsgType::Confirmation), Ok(11));
    assert_eq!(
        decode_reply(&rsp),
        Ok(Reply::Response {
            address: 1,
            command: 4,
            data: &[0x00, 0x07, 0x01],
        })
    );
}

#[test]
fn test_frame_split_across_polls() {
    let mut link = Link::new();
    link.arm();
    let frame = request(SLAVE, IapCommand::Check, &[]);

    link.push(&frame[..3]);
    link.poll().unwrap();
    assert_eq!(link.service.pending(), 3);
    assert!(link.board.serial.tx.is_empty());

    link.push(&frame[3..]);
    link.poll().unwrap();
    assert_eq!(link.service.pending(), 0);
    assert_eq!(link.replies(), vec![IapCommand::Check.code()]);
}

#[test]
fn test_burst_of_frames_answered_in_order() {
    let mut link = Link::new();
    link.arm();

    let mut burst = request(SLAVE, IapCommand::Check, &[]);
    burst.extend(request(SLAVE, IapCommand::Start, &start_data(8)));
    burst.extend(request(SLAVE, IapCommand::Write, &write_data(1, b"abcdefgh")));
    burst.extend(request(SLAVE, IapCommand::Update, &[]));
    assert!(burst.len() <= 100);

    link.push(&burst);
    link.poll().unwrap();

    assert_eq!(link.replies(), vec![2, 3, 4, 5]);
    assert_eq!(link.service.pending(), 0);
    assert_eq!(&link.board.app.bytes()[..8], b"abcdefgh");
    assert!(link.state.quit);
}

#[test]
fn test_large_write_spans_many_polls() {
    let mut link = Link::new();
    link.arm();
    link.push(&request(SLAVE, IapCommand::Start, &start_data(1024)));
    link.poll().unwrap();

    let chunk = common::body(1024);
    link.push(&request(SLAVE, IapCommand::Write, &write_data(1, &chunk)));

    let mut polls = 0;
    while link.board.serial.tx.len() < 2 {
        link.poll().unwrap();
        polls += 1;
        assert!(polls <= 11, "write frame never completed");
    }

    assert_eq!(polls, 11);
    assert_eq!(&link.board.app.bytes()[..1024], &chunk[..]);
}

#[test]
fn test_stale_partial_frame_dropped_when_idle() {
    let mut link = Link::new();
    let frame = request(SLAVE, IapCommand::Sync, &[]);

    link.push(&frame[..4]);
    link.poll().unwrap();
    assert_eq!(link.service.pending(), 4);

    // Nothing more arrives: the leftovers are discarded.
    link.poll().unwrap();
    assert_eq!(link.service.pending(), 0);
    assert_eq!(link.state.sync_count, 0);
}

#[test]
fn test_resync_after_leading_garbage() {
    let mut link = Link::new();
    link.arm();

    let mut bytes = vec![0xAA, 0x55, 0x13];
    bytes.extend(request(SLAVE, IapCommand::Check, &[]));
    link.push(&bytes);

    link.poll().unwrap();
    link.poll().unwrap();

    assert_eq!(link.replies(), vec![IapCommand::Check.code()]);
    assert_eq!(link.service.pending(), 0);
}

#[test]
fn test_garbage_beyond_limit_skipped_before_handshake() {
    let mut link = Link::new();

    let mut bytes = vec![0x77; 60];
    bytes.extend(request(SLAVE, IapCommand::Sync, &[]));
    link.push(&bytes);
    link.poll().unwrap();

    // At most a frame's worth of unparsed bytes is kept.
    assert!(link.service.pending() <= 50);

    link.poll().unwrap();
    assert_eq!(link.state.sync_count, 1);
    assert_eq!(link.service.pending(), 0);
}

#[test]
fn test_frames_for_other_slaves_consumed() {
    let mut link = Link::new();
    link.arm();

    let mut bytes = request(9, IapCommand::Check, &[]);
    bytes.extend(request(SLAVE, IapCommand::Check, &[]));
    link.push(&bytes);
    link.poll().unwrap();

    assert_eq!(link.replies(), vec![IapCommand::Check.code()]);
    assert_eq!(link.service.pending(), 0);
}

#[test]
fn test_serial_error_propagates() {
    let mut link = Link::new();
    link.board.serial.fail = true;
    assert_eq!(link.poll(), Err(Error::TransportTimeout));
}
