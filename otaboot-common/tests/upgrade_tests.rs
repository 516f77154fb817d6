// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Tests for the partition upgrade engine.

mod common;

use common::{body, package, Faults, SharedPartition};
use otaboot_common::{
    upgrade, verify_partition, Error, Partition, RamPartition, UpgradeOutcome, APP_PART_NAME,
    DOWNLOAD_PART_NAME, HEADER_SIZE,
};

fn staged(body_len: usize, part_len: usize) -> RamPartition<Vec<u8>> {
    let (_, bytes) = package(&body(body_len), "v9.9.9");
    let mut storage = vec![0xFF; part_len];
    storage[..bytes.len()].copy_from_slice(&bytes);
    RamPartition::new(DOWNLOAD_PART_NAME, storage)
}

#[test]
fn test_upgrade_installs_body_and_trailer() {
    let mut src = staged(1024, 4096);
    let header = verify_partition(&mut src).unwrap();
    let mut dst = RamPartition::new(APP_PART_NAME, vec![0u8; 4096]);

    let outcome = upgrade(&mut src, &header, &mut dst).unwrap();

    assert_eq!(outcome, UpgradeOutcome::Installed(header));
    let app = dst.as_bytes();
    assert_eq!(&app[..1024], &src.as_bytes()[HEADER_SIZE..HEADER_SIZE + 1024]);
    assert!(app[1024..4096 - HEADER_SIZE].iter().all(|&b| b == 0xFF));
    assert_eq!(&app[4096 - HEADER_SIZE..], &header.to_bytes());
    assert_eq!(verify_partition(&mut dst), Ok(header));
}

#[test]
fn test_upgrade_round_trip_various_sizes() {
    for len in [1, 95, 4096, 4097, 8000] {
        let mut src = staged(len, 16 * 1024);
        let header = verify_partition(&mut src).unwrap();
        let mut dst = RamPartition::new(APP_PART_NAME, vec![0u8; 8192]);

        upgrade(&mut src, &header, &mut dst).unwrap();

        let installed = verify_partition(&mut dst).unwrap();
        assert_eq!(installed.to_bytes(), header.to_bytes(), "body length {len}");
    }
}

#[test]
fn test_upgrade_exact_fit() {
    let dst_len = 2048;
    let mut src = staged(dst_len - HEADER_SIZE, 4096);
    let header = verify_partition(&mut src).unwrap();
    let mut dst = RamPartition::new(APP_PART_NAME, vec![0u8; dst_len]);

    let outcome = upgrade(&mut src, &header, &mut dst).unwrap();

    assert_eq!(outcome, UpgradeOutcome::Installed(header));
}

#[test]
fn test_upgrade_one_byte_too_large_is_noop() {
    let dst_len = 2048;
    let mut src = staged(dst_len - HEADER_SIZE + 1, 4096);
    let header = verify_partition(&mut src).unwrap();
    let mut dst = RamPartition::new(APP_PART_NAME, vec![0x5A; dst_len]);

    let outcome = upgrade(&mut src, &header, &mut dst).unwrap();

    assert_eq!(outcome, UpgradeOutcome::Skipped);
    assert!(dst.as_bytes().iter().all(|&b| b == 0x5A));
}

#[test]
fn test_upgrade_replaces_previous_image() {
    let mut old_src = staged(500, 4096);
    let old = verify_partition(&mut old_src).unwrap();
    let mut dst = RamPartition::new(APP_PART_NAME, vec![0u8; 4096]);
    upgrade(&mut old_src, &old, &mut dst).unwrap();

    let new_body: Vec<u8> = (0..300u32).map(|i| (i % 13) as u8).collect();
    let (_, bytes) = common::package(&new_body, "v2");
    let mut new_src = RamPartition::new(DOWNLOAD_PART_NAME, bytes);
    let new = verify_partition(&mut new_src).unwrap();

    upgrade(&mut new_src, &new, &mut dst).unwrap();

    assert_eq!(verify_partition(&mut dst), Ok(new));
    // Leftovers of the longer old body are erased.
    assert!(dst.as_bytes()[300..500].iter().all(|&b| b == 0xFF));
}

#[test]
fn test_upgrade_erase_failure() {
    let mut src = staged(256, 1024);
    let header = verify_partition(&mut src).unwrap();
    let mut dst = SharedPartition::new(APP_PART_NAME, 2048);
    dst.set_faults(Faults {
        fail_erase: true,
        ..Faults::default()
    });

    assert_eq!(upgrade(&mut src, &header, &mut dst), Err(Error::Erase));
}

#[test]
fn test_upgrade_write_failure_leaves_no_valid_image() {
    let mut src = staged(6000, 8192);
    let header = verify_partition(&mut src).unwrap();
    let mut dst = SharedPartition::new(APP_PART_NAME, 8192);
    dst.set_faults(Faults {
        fail_write_from: Some(4096),
        ..Faults::default()
    });

    assert_eq!(upgrade(&mut src, &header, &mut dst), Err(Error::Write));

    dst.set_faults(Faults::default());
    assert!(verify_partition(&mut dst).is_err());
    // The first chunk landed, the trailer never did.
    assert_ne!(&dst.bytes()[..16], &[0xFF; 16]);
    assert!(dst.bytes()[8192 - HEADER_SIZE..].iter().all(|&b| b == 0xFF));
}

#[test]
fn test_upgrade_source_read_failure() {
    let (_, bytes) = package(&body(256), "v1");
    let src = SharedPartition::new(DOWNLOAD_PART_NAME, 1024);
    src.load(0, &bytes);
    let mut src_handle = src.clone();
    let header = verify_partition(&mut src_handle).unwrap();
    src.set_faults(Faults {
        fail_read: true,
        ..Faults::default()
    });
    let mut dst = RamPartition::new(APP_PART_NAME, vec![0u8; 1024]);

    assert_eq!(upgrade(&mut src_handle, &header, &mut dst), Err(Error::Read));
    assert_eq!(src_handle.len(), 1024);
}
