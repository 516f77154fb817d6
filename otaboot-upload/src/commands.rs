// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use otaboot_common::iap::IapCommand;
use otaboot_common::{
    verify_partition, FirmwareHeader, RamPartition, DOWNLOAD_PART_NAME, HEADER_SIZE,
};

use crate::transport::{Transport, REPLY_TIMEOUT_MS};

/// START erases the whole application partition before answering.
const START_TIMEOUT_MS: u64 = 30_000;
/// Longest text field in the header, leaving room for the terminator.
const MAX_NAME_LEN: usize = 15;
const MAX_VERSION_LEN: usize = 23;

/// Build the package bytes for `body`.
pub fn build_package(body: &[u8], version: &str, part: &str, timestamp: u32) -> Result<Vec<u8>> {
    if version.len() > MAX_VERSION_LEN {
        bail!("version '{version}' is longer than {MAX_VERSION_LEN} bytes");
    }
    if part.is_empty() || part.len() > MAX_NAME_LEN {
        bail!("partition name '{part}' must be 1 to {MAX_NAME_LEN} bytes");
    }
    if body.is_empty() {
        bail!("image is empty");
    }
    let header = FirmwareHeader::for_body(body, version, part, timestamp);
    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(body);
    Ok(out)
}

/// Wrap a raw image into an RBL package.
pub fn pack(input: &Path, output: &Path, version: &str, part: &str, timestamp: Option<u32>) -> Result<()> {
    let body = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let timestamp = match timestamp {
        Some(ts) => ts,
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0),
    };

    let package = build_package(&body, version, part, timestamp)?;
    fs::write(output, &package).with_context(|| format!("Failed to write {}", output.display()))?;

    let header = FirmwareHeader::from_bytes(
        package[..HEADER_SIZE]
            .try_into()
            .context("package shorter than its header")?,
    );
    println!(
        "Package: {} ({} bytes, body CRC32: 0x{:08x}, version {})",
        output.display(),
        package.len(),
        header.body_crc32,
        header.version()
    );
    Ok(())
}

/// Outcome of validating a package file.
#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub file_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderInfo>,
}

#[derive(Debug, Serialize)]
pub struct HeaderInfo {
    pub kind: String,
    pub version: String,
    pub app_part: String,
    pub timestamp: u32,
    pub raw_size: u32,
    pub pkg_size: u32,
    pub body_crc32: u32,
    pub hdr_crc32: u32,
}

impl From<&FirmwareHeader> for HeaderInfo {
    fn from(header: &FirmwareHeader) -> Self {
        Self {
            kind: header.type_str().to_string(),
            version: header.version().to_string(),
            app_part: header.app_part().to_string(),
            timestamp: header.timestamp,
            raw_size: header.raw_size,
            pkg_size: header.pkg_size,
            body_crc32: header.body_crc32,
            hdr_crc32: header.hdr_crc32,
        }
    }
}

/// Validate package bytes the way the bootloader validates its staging
/// partition.
pub fn inspect_bytes(bytes: Vec<u8>) -> InspectReport {
    let file_size = bytes.len();
    let header = bytes
        .get(..HEADER_SIZE)
        .and_then(|raw| raw.try_into().ok())
        .map(|raw| HeaderInfo::from(&FirmwareHeader::from_bytes(raw)));

    let mut part = RamPartition::new(DOWNLOAD_PART_NAME, bytes);
    match verify_partition(&mut part) {
        Ok(_) => InspectReport {
            valid: true,
            error: None,
            file_size,
            header,
        },
        Err(e) => InspectReport {
            valid: false,
            error: Some(e.to_string()),
            file_size,
            header,
        },
    }
}

/// Validate an RBL package and print its header.
pub fn inspect(file: &Path, json: bool) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let report = inspect_bytes(bytes);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Package: {} ({} bytes)", file.display(), report.file_size);
        if let Some(h) = &report.header {
            println!("  Type:       {}", h.kind);
            println!("  Version:    {}", h.version);
            println!("  Partition:  {}", h.app_part);
            println!("  Timestamp:  {}", h.timestamp);
            println!("  Body size:  {}", h.raw_size);
            println!("  Pkg size:   {}", h.pkg_size);
            println!("  Body CRC32: 0x{:08x}", h.body_crc32);
            println!("  Hdr CRC32:  0x{:08x}", h.hdr_crc32);
        }
        match &report.error {
            None => println!("  Status:     valid"),
            Some(e) => println!("  Status:     INVALID ({e})"),
        }
    }

    if !report.valid {
        bail!("{} is not a valid package", file.display());
    }
    Ok(())
}

/// Handshake with the bootloader.
pub fn ping<P: Read + Write>(transport: &mut Transport<P>, wait: u64) -> Result<()> {
    print!("Waiting for slave {} on {}... ", transport.address(), transport.port_name());
    std::io::stdout().flush()?;
    transport.handshake(Duration::from_secs(wait))?;
    println!("OK");
    Ok(())
}

/// The bytes IAP writes to the application partition: the body of a valid
/// package, or the file as-is.
pub fn iap_image(file: Vec<u8>) -> (Vec<u8>, Option<FirmwareHeader>) {
    let mut part = RamPartition::new(DOWNLOAD_PART_NAME, file);
    match verify_partition(&mut part) {
        Ok(header) => {
            let body_end = HEADER_SIZE + header.raw_size as usize;
            let mut bytes = part.into_inner();
            bytes.truncate(body_end);
            bytes.drain(..HEADER_SIZE);
            (bytes, Some(header))
        }
        Err(_) => (part.into_inner(), None),
    }
}

fn write_packet<P: Read + Write>(
    transport: &mut Transport<P>,
    packet: u16,
    chunk: &[u8],
    retries: u32,
) -> Result<()> {
    let mut data = Vec::with_capacity(chunk.len() + 4);
    data.extend_from_slice(&packet.to_be_bytes());
    data.extend_from_slice(&(chunk.len() as u16).to_be_bytes());
    data.extend_from_slice(chunk);

    let mut last_err = None;
    for _ in 0..retries.max(1) {
        match transport.request(IapCommand::Write, &data, REPLY_TIMEOUT_MS) {
            Ok(rsp) if rsp.len() == 3 && rsp[2] == 1 => {
                let acked = u16::from_be_bytes([rsp[0], rsp[1]]);
                if acked == packet {
                    return Ok(());
                }
                last_err = Some(anyhow::anyhow!("packet {packet} acknowledged as {acked}"));
            }
            Ok(rsp) => last_err = Some(anyhow::anyhow!("packet {packet} rejected: {rsp:?}")),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("packet {packet} not sent")))
}

/// Push an image over IAP and boot it.
pub fn upload<P: Read + Write>(
    transport: &mut Transport<P>,
    file: &Path,
    packet_size: u16,
    retries: u32,
    wait: u64,
) -> Result<()> {
    let bytes = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let (image, header) = iap_image(bytes);
    if image.is_empty() {
        bail!("{} is empty", file.display());
    }
    let size = u32::try_from(image.len()).context("image larger than 4 GiB")?;

    println!("Image:    {} ({} bytes)", file.display(), size);
    if let Some(h) = &header {
        println!("Package:  version {}, sending the body only", h.version());
    }
    println!();

    print!("Handshake... ");
    std::io::stdout().flush()?;
    transport.handshake(Duration::from_secs(wait))?;
    println!("OK");

    print!("Starting update (erasing application)... ");
    std::io::stdout().flush()?;
    let rsp = transport.request(IapCommand::Start, &size.to_be_bytes(), START_TIMEOUT_MS)?;
    if rsp != [1] {
        bail!("START failed: {:?}", rsp);
    }
    println!("OK");

    let pb = ProgressBar::new(size as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    for (i, chunk) in image.chunks(packet_size as usize).enumerate() {
        let packet = u16::try_from(i + 1).context("image needs more than 65535 packets")?;
        if let Err(e) = write_packet(transport, packet, chunk, retries) {
            pb.abandon();
            return Err(e).context(format!("WRITE failed at packet {packet}"));
        }
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("Upload complete");
    println!();

    print!("Booting... ");
    std::io::stdout().flush()?;
    transport.request(IapCommand::Update, &[], REPLY_TIMEOUT_MS)?;
    println!("OK");

    Ok(())
}
