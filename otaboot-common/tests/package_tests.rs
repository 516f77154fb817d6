// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for the CRC32 engine, the RBL header and partition validation.

mod common;

use common::{body, package};
use otaboot_common::crc32::{self, Crc32};
use otaboot_common::package::{CompressAlgo, CryptAlgo, PackageLayout, PACKAGE_TYPE};
use otaboot_common::{
    verify_partition, Error, FirmwareHeader, RamPartition, APP_PART_NAME, DOWNLOAD_PART_NAME,
    HEADER_SIZE,
};

fn download_with(bytes: &[u8], len: usize) -> RamPartition<Vec<u8>> {
    let mut storage = vec![0xFF; len];
    storage[..bytes.len()].copy_from_slice(bytes);
    RamPartition::new(DOWNLOAD_PART_NAME, storage)
}

fn app_with(header: &FirmwareHeader, body: &[u8], len: usize) -> RamPartition<Vec<u8>> {
    let mut storage = vec![0xFF; len];
    storage[..body.len()].copy_from_slice(body);
    storage[len - HEADER_SIZE..].copy_from_slice(&header.to_bytes());
    RamPartition::new(APP_PART_NAME, storage)
}

#[test]
fn test_crc32_check_value() {
    assert_eq!(crc32::checksum(b"123456789"), 0xCBF4_3926);
    assert_eq!(crc32::checksum(&[]), 0);
}

#[test]
fn test_crc32_streaming_matches_one_shot() {
    let data = body(10_000);
    let mut crc = Crc32::new();
    for chunk in data.chunks(333) {
        crc.update(chunk);
    }
    assert_eq!(crc.finalize(), crc32::checksum(&data));
}

#[test]
fn test_header_wire_layout() {
    let data = body(1024);
    let header = FirmwareHeader::for_body(&data, "v1.2.3", APP_PART_NAME, 0x1122_3344);
    let bytes = header.to_bytes();

    assert_eq!(&bytes[0..4], &PACKAGE_TYPE);
    assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
    assert_eq!(&bytes[8..12], &0x1122_3344u32.to_le_bytes());
    assert_eq!(&bytes[12..16], b"app\0");
    assert_eq!(&bytes[28..35], b"v1.2.3\0");
    assert_eq!(&bytes[76..80], &crc32::checksum(&data).to_le_bytes());
    assert_eq!(&bytes[84..88], &1024u32.to_le_bytes());
    assert_eq!(&bytes[88..92], &(1024u32 + 96).to_le_bytes());
    assert_eq!(&bytes[92..96], &crc32::checksum(&bytes[..92]).to_le_bytes());

    assert_eq!(FirmwareHeader::from_bytes(&bytes), header);
    assert_eq!(header.version(), "v1.2.3");
    assert_eq!(header.app_part(), "app");
    assert_eq!(header.type_str(), "RBL");
}

#[test]
fn test_algo_fields_decode() {
    let (mut header, _) = package(&body(16), "v1");
    header.algo = 0x0201;
    assert_eq!(header.crypt_algo(), CryptAlgo::Xor);
    assert_eq!(header.compress_algo(), CompressAlgo::QuickLz);

    header.algo = 0x0F0E;
    assert_eq!(header.crypt_algo(), CryptAlgo::Other(0x0E));
    assert_eq!(header.compress_algo(), CompressAlgo::Other(0x0F));
}

#[test]
fn test_layout_depends_on_partition_name() {
    let app = RamPartition::new(APP_PART_NAME, vec![0u8; 4096]);
    let layout = PackageLayout::of(&app).unwrap();
    assert_eq!(layout.header_offset, 4096 - 96);
    assert_eq!(layout.body_offset, 0);

    let download = RamPartition::new(DOWNLOAD_PART_NAME, vec![0u8; 4096]);
    let layout = PackageLayout::of(&download).unwrap();
    assert_eq!(layout.header_offset, 0);
    assert_eq!(layout.body_offset, 96);
}

#[test]
fn test_validate_download_partition() {
    let data = body(1024);
    let (header, bytes) = package(&data, "v2.0.0");
    let mut part = download_with(&bytes, 4096);

    assert_eq!(verify_partition(&mut part), Ok(header));
}

#[test]
fn test_validate_app_partition() {
    let data = body(5000);
    let (header, _) = package(&data, "v2.0.0");
    let mut part = app_with(&header, &data, 8192);

    assert_eq!(verify_partition(&mut part), Ok(header));
}

#[test]
fn test_validate_body_spanning_many_chunks() {
    let data = body(3 * 4096 + 17);
    let (header, bytes) = package(&data, "big");
    let mut part = download_with(&bytes, 16 * 1024);

    assert_eq!(verify_partition(&mut part), Ok(header));
}

#[test]
fn test_validate_is_idempotent() {
    let (_, bytes) = package(&body(700), "v1");
    let mut part = download_with(&bytes, 2048);
    let before = part.as_bytes().to_vec();

    let first = verify_partition(&mut part);
    let second = verify_partition(&mut part);

    assert_eq!(first, second);
    assert_eq!(part.as_bytes(), &before[..]);
}

#[test]
fn test_body_bit_flip_is_detected() {
    let data = body(300);
    let (_, bytes) = package(&data, "v1");

    for at in [0, 1, 150, 299] {
        let mut corrupt = bytes.clone();
        corrupt[HEADER_SIZE + at] ^= 0x10;
        let mut part = download_with(&corrupt, 1024);
        assert_eq!(verify_partition(&mut part), Err(Error::BodyCrcMismatch));
    }
}

#[test]
fn test_header_bit_flip_is_detected() {
    let (_, bytes) = package(&body(64), "v1");

    for at in 0..HEADER_SIZE - 4 {
        let mut corrupt = bytes.clone();
        corrupt[at] ^= 0x01;
        let mut part = download_with(&corrupt, 512);
        assert_eq!(
            verify_partition(&mut part),
            Err(Error::HeaderCrcMismatch),
            "flip at byte {at}"
        );
    }
}

#[test]
fn test_unsupported_type() {
    let data = body(64);
    let (mut header, _) = package(&data, "v1");
    header.kind = *b"XXX\0";
    header.seal();
    let mut bytes = header.to_bytes().to_vec();
    bytes.extend_from_slice(&data);
    let mut part = download_with(&bytes, 512);

    assert_eq!(verify_partition(&mut part), Err(Error::UnsupportedType));
}

#[test]
fn test_type_compares_first_three_bytes() {
    let data = body(64);
    let (mut header, _) = package(&data, "v1");
    header.kind = *b"RBLX";
    header.seal();
    let mut bytes = header.to_bytes().to_vec();
    bytes.extend_from_slice(&data);
    let mut part = download_with(&bytes, 512);

    assert_eq!(verify_partition(&mut part), Ok(header));
}

#[test]
fn test_encrypted_and_compressed_rejected() {
    let data = body(64);
    for (algo, expected) in [
        (0x0001, Error::UnsupportedCrypto),
        (0x0002, Error::UnsupportedCrypto),
        (0x0100, Error::UnsupportedCompression),
        (0x0101, Error::UnsupportedCrypto),
    ] {
        let (mut header, _) = package(&data, "v1");
        header.algo = algo;
        header.seal();
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(&data);
        let mut part = download_with(&bytes, 512);
        assert_eq!(verify_partition(&mut part), Err(expected));
    }
}

#[test]
fn test_pkg_size_is_not_validated() {
    let data = body(64);
    let (mut header, _) = package(&data, "v1");
    header.pkg_size = 1;
    header.seal();
    let mut bytes = header.to_bytes().to_vec();
    bytes.extend_from_slice(&data);
    let mut part = download_with(&bytes, 512);

    assert_eq!(verify_partition(&mut part), Ok(header));
}

#[test]
fn test_truncated_body_is_read_error() {
    let data = body(1000);
    let (_, bytes) = package(&data, "v1");
    // Partition ends in the middle of the declared body.
    let mut part = RamPartition::new(DOWNLOAD_PART_NAME, bytes[..600].to_vec());

    assert_eq!(verify_partition(&mut part), Err(Error::Read));
}

#[test]
fn test_empty_body_is_read_error() {
    let (header, bytes) = package(&[], "v0");
    assert_eq!(header.raw_size, 0);
    assert_eq!(header.check(), Ok(()));
    let mut part = download_with(&bytes, 4096);

    assert_eq!(verify_partition(&mut part), Err(Error::Read));
}

#[test]
fn test_erased_partition_is_invalid() {
    let mut part = RamPartition::new(DOWNLOAD_PART_NAME, vec![0xFF; 1024]);
    assert_eq!(verify_partition(&mut part), Err(Error::HeaderCrcMismatch));
}

#[test]
fn test_app_partition_smaller_than_header() {
    let mut part = RamPartition::new(APP_PART_NAME, vec![0xFF; 32]);
    assert_eq!(verify_partition(&mut part), Err(Error::Read));
}
