// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Partition sink for firmware uploaded over HTTP.
//!
//! The web server is outside this crate. It calls [`UploadSink::open`] with
//! the uploaded file name, [`UploadSink::write`] for each body chunk and
//! [`UploadSink::finish`] at the end, then sends the JSON report back.

use core::fmt::Write;

use crate::error::Error;
use crate::partition::Partition;
use crate::system::SystemState;

/// Which partition an upload lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UploadTarget {
    /// Raw image (`.bin`), written straight into "app".
    App,
    /// RBL package (`.rbl`), staged in "download".
    Download,
}

impl UploadTarget {
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.contains(".bin") {
            Some(Self::App)
        } else if name.contains(".rbl") {
            Some(Self::Download)
        } else {
            None
        }
    }
}

/// File name without any directory part, for both separator styles.
pub fn base_name(path: &str) -> &str {
    let path = path.rsplit('\\').next().unwrap_or(path);
    path.rsplit('/').next().unwrap_or(path)
}

fn partition<P>(state: &mut SystemState<P>, target: UploadTarget) -> Option<&mut P> {
    match target {
        UploadTarget::App => state.app_part.as_mut(),
        UploadTarget::Download => state.download_part.as_mut(),
    }
}

/// Outcome sent back to the uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReport {
    pub ok: bool,
    pub file_size: u32,
}

impl UploadReport {
    /// `{"code":0,"filesize":N}`, or code -1 on failure.
    pub fn to_json(&self) -> heapless::String<48> {
        let mut out = heapless::String::new();
        let code = if self.ok { 0 } else { -1 };
        // Longest output is 34 bytes.
        let _ = write!(out, "{{\"code\":{},\"filesize\":{}}}", code, self.file_size);
        out
    }
}

/// One upload in progress. Once a step fails the rest is ignored.
#[derive(Debug)]
pub struct UploadSink {
    target: Option<UploadTarget>,
    file_size: u32,
    ok: bool,
}

impl UploadSink {
    /// Pick and erase the partition for `file_name`.
    pub fn open<P: Partition>(file_name: &str, state: &mut SystemState<P>) -> Self {
        let mut sink = Self {
            target: None,
            file_size: 0,
            ok: false,
        };

        let name = base_name(file_name);
        debug!("Upload FileName: {}", name);
        let Some(target) = UploadTarget::from_file_name(name) else {
            warn!("Unsupported file type.");
            return sink;
        };
        let Some(part) = partition(state, target) else {
            warn!("using partition NULL");
            return sink;
        };

        info!("The partition '{}' is erasing.", part.name());
        if let Err(e) = part.erase_all() {
            warn!("The partition '{}' erase failed: {}", part.name(), e);
            return sink;
        }
        info!("The partition '{}' erase success.", part.name());

        sink.target = Some(target);
        sink.ok = true;
        sink
    }

    pub fn target(&self) -> Option<UploadTarget> {
        self.target
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// Append `data`. Returns the bytes taken, 0 once the upload has failed.
    pub fn write<P: Partition>(&mut self, state: &mut SystemState<P>, data: &[u8]) -> usize {
        match self.try_write(state, data) {
            Ok(n) => n,
            Err(e) => {
                warn!("upload write error: {}", e);
                self.ok = false;
                0
            }
        }
    }

    fn try_write<P: Partition>(&mut self, state: &mut SystemState<P>, data: &[u8]) -> Result<usize, Error> {
        if !self.ok {
            return Ok(0);
        }
        let target = self.target.ok_or(Error::PartitionNotFound)?;
        let part = partition(state, target).ok_or(Error::PartitionNotFound)?;

        if u64::from(self.file_size) + data.len() as u64 > u64::from(part.len()) {
            return Err(Error::SizeExceeded);
        }
        if part.write(self.file_size, data)? == 0 && !data.is_empty() {
            return Err(Error::Write);
        }
        self.file_size += data.len() as u32;
        Ok(data.len())
    }

    /// Close the upload and let the orchestrator move on to install and boot.
    pub fn finish<P>(self, state: &mut SystemState<P>) -> UploadReport {
        info!("Upload done.");
        state.quit = true;
        UploadReport {
            ok: self.ok,
            file_size: self.file_size,
        }
    }
}
