// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Host doubles shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use otaboot_common::iap::{encode_request, IapCommand};
use otaboot_common::{
    Board, Error, FirmwareHeader, FirmwareStorage, Partition, APP_PART_NAME, DOWNLOAD_PART_NAME,
};

pub const SLAVE: u8 = 1;
pub const APP_LEN: u32 = 8 * 1024;
pub const DOWNLOAD_LEN: u32 = 8 * 1024;

/// Fault switches for a [`SharedPartition`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Faults {
    pub fail_erase: bool,
    pub fail_read: bool,
    /// Writes starting at or after this offset fail.
    pub fail_write_from: Option<u32>,
}

/// Partition whose bytes stay visible to the test after being handed out.
#[derive(Clone)]
pub struct SharedPartition {
    name: &'static str,
    data: Rc<RefCell<Vec<u8>>>,
    faults: Rc<RefCell<Faults>>,
    pub erase_count: Rc<RefCell<u32>>,
}

impl SharedPartition {
    pub fn new(name: &'static str, len: u32) -> Self {
        Self {
            name,
            data: Rc::new(RefCell::new(vec![0xFF; len as usize])),
            faults: Rc::new(RefCell::new(Faults::default())),
            erase_count: Rc::new(RefCell::new(0)),
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.data.borrow().clone()
    }

    pub fn load(&self, offset: u32, bytes: &[u8]) {
        let start = offset as usize;
        self.data.borrow_mut()[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn set_faults(&self, faults: Faults) {
        *self.faults.borrow_mut() = faults;
    }

    pub fn erases(&self) -> u32 {
        *self.erase_count.borrow()
    }

    pub fn is_erased(&self) -> bool {
        self.data.borrow().iter().all(|&b| b == 0xFF)
    }
}

impl Partition for SharedPartition {
    fn name(&self) -> &str {
        self.name
    }

    fn len(&self) -> u32 {
        self.data.borrow().len() as u32
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, Error> {
        if self.faults.borrow().fail_read {
            return Err(Error::Read);
        }
        let data = self.data.borrow();
        let start = offset as usize;
        if start > data.len() {
            return Err(Error::Read);
        }
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<usize, Error> {
        if matches!(self.faults.borrow().fail_write_from, Some(at) if offset >= at) {
            return Err(Error::Write);
        }
        let mut data = self.data.borrow_mut();
        let start = offset as usize;
        if start + bytes.len() > data.len() {
            return Err(Error::Write);
        }
        data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(bytes.len())
    }

    fn erase_all(&mut self) -> Result<(), Error> {
        if self.faults.borrow().fail_erase {
            return Err(Error::Erase);
        }
        *self.erase_count.borrow_mut() += 1;
        self.data.borrow_mut().fill(0xFF);
        Ok(())
    }
}

/// Serial link fed from a queue of chunks; every `receive` delivers at most
/// one queued chunk.
#[derive(Default)]
pub struct MockSerial {
    pub rx: VecDeque<Vec<u8>>,
    pub tx: Vec<Vec<u8>>,
    pub fail: bool,
}

impl MockSerial {
    pub fn push(&mut self, bytes: &[u8]) {
        self.rx.push_back(bytes.to_vec());
    }
}

impl otaboot_common::SerialLink for MockSerial {
    fn receive(&mut self, buf: &mut [u8], _idle_timeout_ms: u32) -> Result<usize, Error> {
        if self.fail {
            return Err(Error::TransportTimeout);
        }
        let Some(mut chunk) = self.rx.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.rx.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        self.tx.push(data.to_vec());
        Ok(())
    }
}

/// SD card holding named files.
#[derive(Default)]
pub struct MockStorage {
    pub present: bool,
    pub mount_ok: bool,
    pub mount_calls: u32,
    pub files: HashMap<String, Vec<u8>>,
    pub closed: u32,
    open: Option<(Vec<u8>, usize)>,
}

impl MockStorage {
    pub fn with_file(path: &str, bytes: Vec<u8>) -> Self {
        let mut files = HashMap::new();
        files.insert(path.to_string(), bytes);
        Self {
            present: true,
            mount_ok: true,
            files,
            ..Self::default()
        }
    }
}

impl FirmwareStorage for MockStorage {
    fn detect(&mut self) -> bool {
        self.present
    }

    fn mount(&mut self) -> Result<(), Error> {
        self.mount_calls += 1;
        if self.mount_ok {
            Ok(())
        } else {
            Err(Error::StorageUnavailable)
        }
    }

    fn stat(&mut self, path: &str) -> Result<u32, Error> {
        self.files
            .get(path)
            .map(|f| f.len() as u32)
            .ok_or(Error::StorageUnavailable)
    }

    fn open(&mut self, path: &str) -> Result<(), Error> {
        let file = self.files.get(path).ok_or(Error::StorageUnavailable)?;
        self.open = Some((file.clone(), 0));
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let (file, pos) = self.open.as_mut().ok_or(Error::Read)?;
        let n = buf.len().min(file.len() - *pos);
        buf[..n].copy_from_slice(&file[*pos..*pos + n]);
        *pos += n;
        Ok(n)
    }

    fn close(&mut self) {
        self.open = None;
        self.closed += 1;
    }
}

/// Board double with a manual clock.
pub struct MockBoard {
    pub app: SharedPartition,
    pub download: SharedPartition,
    pub has_download: bool,
    pub init_ok: bool,
    pub serial: MockSerial,
    pub storage: Option<MockStorage>,
    pub now: u64,
    pub key_down: bool,
    pub boots: u32,
    pub resets: u32,
    pub delays: Vec<u32>,
}

impl MockBoard {
    pub fn new() -> Self {
        Self {
            app: SharedPartition::new(APP_PART_NAME, APP_LEN),
            download: SharedPartition::new(DOWNLOAD_PART_NAME, DOWNLOAD_LEN),
            has_download: true,
            init_ok: true,
            serial: MockSerial::default(),
            storage: None,
            now: 0,
            key_down: false,
            boots: 0,
            resets: 0,
            delays: Vec::new(),
        }
    }

    pub fn advance(&mut self, ms: u64) {
        self.now += ms;
    }
}

impl Board for MockBoard {
    type Partition = SharedPartition;
    type Serial = MockSerial;
    type Storage = MockStorage;

    fn init_partitions(&mut self) -> Result<(), Error> {
        if self.init_ok {
            Ok(())
        } else {
            Err(Error::PartitionNotFound)
        }
    }

    fn find_partition(&mut self, name: &str) -> Option<SharedPartition> {
        match name {
            APP_PART_NAME => Some(self.app.clone()),
            DOWNLOAD_PART_NAME if self.has_download => Some(self.download.clone()),
            _ => None,
        }
    }

    fn serial(&mut self) -> Result<&mut MockSerial, Error> {
        Ok(&mut self.serial)
    }

    fn storage(&mut self) -> Option<&mut MockStorage> {
        self.storage.as_mut()
    }

    fn now_ms(&self) -> u64 {
        self.now
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
        self.now += u64::from(ms);
    }

    fn key_pressed(&mut self) -> bool {
        self.key_down
    }

    fn boot_application(&mut self) {
        self.boots += 1;
    }

    fn system_reset(&mut self) {
        self.resets += 1;
    }
}

/// Deterministic, non-repeating body bytes.
pub fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

/// Header followed by body, as found in "download".
pub fn package(body: &[u8], version: &str) -> (FirmwareHeader, Vec<u8>) {
    let header = FirmwareHeader::for_body(body, version, APP_PART_NAME, 1_700_000_000);
    let mut bytes = header.to_bytes().to_vec();
    bytes.extend_from_slice(body);
    (header, bytes)
}

/// A complete IAP request frame.
pub fn request(address: u8, command: IapCommand, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::new();
    encode_request(&mut frame, address, command, data).unwrap();
    frame
}

pub fn start_data(len: u32) -> Vec<u8> {
    len.to_be_bytes().to_vec()
}

pub fn write_data(packet: u16, chunk: &[u8]) -> Vec<u8> {
    let mut data = packet.to_be_bytes().to_vec();
    data.extend_from_slice(&(chunk.len() as u16).to_be_bytes());
    data.extend_from_slice(chunk);
    data
}
