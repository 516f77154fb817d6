// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! On-chip flash partitions backed by the RP2040 boot ROM routines.
//!
//! Erase and program need XIP torn down for their whole duration:
//!   1. connect_internal_flash()
//!   2. flash_exit_xip()
//!   3. flash_range_erase() or flash_range_program()
//!   4. flash_flush_cache()
//!   5. flash_enter_cmd_xip()
//!
//! Everything running between 1 and 5 must live in RAM, hence the
//! `.data` placement and the ROM pointers resolved up front by [`init`].

use core::sync::atomic::{AtomicUsize, Ordering};

use otaboot_common::{Error, Partition};

/// Start of the XIP window the flash is mapped at.
pub const FLASH_BASE: u32 = 0x1000_0000;
pub const FLASH_PAGE_SIZE: u32 = 256;
pub const FLASH_SECTOR_SIZE: u32 = 4096;
/// Block erase command understood by the boot ROM (64 KiB blocks).
const FLASH_BLOCK_ERASE_CMD: u8 = 0xD8;
const FLASH_BLOCK_SIZE: u32 = 1 << 16;

// Boot ROM lookup table (RP2040 datasheet 2.8.3)
const ROM_FUNC_TABLE_PTR: *const u16 = 0x0000_0014 as *const u16;
const ROM_TABLE_LOOKUP_PTR: *const u16 = 0x0000_0018 as *const u16;

type RomFnVoid = unsafe extern "C" fn();
type RomFnErase = unsafe extern "C" fn(u32, usize, u32, u8);
type RomFnProgram = unsafe extern "C" fn(u32, *const u8, usize);

static ROM_CONNECT_INTERNAL_FLASH: AtomicUsize = AtomicUsize::new(0);
static ROM_FLASH_EXIT_XIP: AtomicUsize = AtomicUsize::new(0);
static ROM_FLASH_RANGE_ERASE: AtomicUsize = AtomicUsize::new(0);
static ROM_FLASH_RANGE_PROGRAM: AtomicUsize = AtomicUsize::new(0);
static ROM_FLASH_FLUSH_CACHE: AtomicUsize = AtomicUsize::new(0);
static ROM_FLASH_ENTER_CMD_XIP: AtomicUsize = AtomicUsize::new(0);

unsafe fn rom_func_lookup(tag: &[u8; 2]) -> usize {
    let fn_table = *ROM_FUNC_TABLE_PTR as *const u16;
    let lookup: unsafe extern "C" fn(*const u16, u32) -> usize =
        core::mem::transmute::<usize, unsafe extern "C" fn(*const u16, u32) -> usize>(
            *ROM_TABLE_LOOKUP_PTR as usize,
        );

    lookup(fn_table, u16::from_le_bytes(*tag) as u32)
}

/// Resolve the ROM flash routines. Must run while XIP is still active.
pub fn init() {
    unsafe {
        ROM_CONNECT_INTERNAL_FLASH.store(rom_func_lookup(b"IF"), Ordering::Release);
        ROM_FLASH_EXIT_XIP.store(rom_func_lookup(b"EX"), Ordering::Release);
        ROM_FLASH_RANGE_ERASE.store(rom_func_lookup(b"RE"), Ordering::Release);
        ROM_FLASH_RANGE_PROGRAM.store(rom_func_lookup(b"RP"), Ordering::Release);
        ROM_FLASH_FLUSH_CACHE.store(rom_func_lookup(b"FC"), Ordering::Release);
        ROM_FLASH_ENTER_CMD_XIP.store(rom_func_lookup(b"CX"), Ordering::Release);
    }
}

fn is_initialized() -> bool {
    ROM_FLASH_RANGE_ERASE.load(Ordering::Acquire) != 0
        && ROM_FLASH_RANGE_PROGRAM.load(Ordering::Acquire) != 0
}

/// Erase `size` bytes at flash-relative `offset`. Both sector aligned.
///
/// # Safety
/// [`init`] must have been called first.
#[link_section = ".data"]
#[inline(never)]
unsafe fn flash_erase(offset: u32, size: u32) {
    let connect: RomFnVoid = core::mem::transmute(ROM_CONNECT_INTERNAL_FLASH.load(Ordering::Acquire));
    let exit_xip: RomFnVoid = core::mem::transmute(ROM_FLASH_EXIT_XIP.load(Ordering::Acquire));
    let erase: RomFnErase = core::mem::transmute(ROM_FLASH_RANGE_ERASE.load(Ordering::Acquire));
    let flush: RomFnVoid = core::mem::transmute(ROM_FLASH_FLUSH_CACHE.load(Ordering::Acquire));
    let enter_xip: RomFnVoid = core::mem::transmute(ROM_FLASH_ENTER_CMD_XIP.load(Ordering::Acquire));

    cortex_m::interrupt::disable();
    connect();
    exit_xip();
    erase(offset, size as usize, FLASH_BLOCK_SIZE, FLASH_BLOCK_ERASE_CMD);
    flush();
    enter_xip();
    cortex_m::interrupt::enable();
}

/// Program one page at flash-relative `offset`.
///
/// # Safety
/// [`init`] must have been called first, `offset` must be page aligned.
#[link_section = ".data"]
#[inline(never)]
unsafe fn flash_program(offset: u32, data: *const u8, len: usize) {
    let connect: RomFnVoid = core::mem::transmute(ROM_CONNECT_INTERNAL_FLASH.load(Ordering::Acquire));
    let exit_xip: RomFnVoid = core::mem::transmute(ROM_FLASH_EXIT_XIP.load(Ordering::Acquire));
    let program: RomFnProgram = core::mem::transmute(ROM_FLASH_RANGE_PROGRAM.load(Ordering::Acquire));
    let flush: RomFnVoid = core::mem::transmute(ROM_FLASH_FLUSH_CACHE.load(Ordering::Acquire));
    let enter_xip: RomFnVoid = core::mem::transmute(ROM_FLASH_ENTER_CMD_XIP.load(Ordering::Acquire));

    cortex_m::interrupt::disable();
    connect();
    exit_xip();
    program(offset, data, len);
    flush();
    enter_xip();
    cortex_m::interrupt::enable();
}

/// Read bytes from an absolute XIP address.
pub fn flash_read(abs_addr: u32, buf: &mut [u8]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = unsafe { ((abs_addr + i as u32) as *const u8).read_volatile() };
    }
}

/// A named window of on-chip flash.
#[derive(Debug, Clone, Copy)]
pub struct FlashPartition {
    name: &'static str,
    /// Flash-relative start, sector aligned.
    offset: u32,
    size: u32,
}

impl FlashPartition {
    pub const fn new(name: &'static str, offset: u32, size: u32) -> Self {
        Self { name, offset, size }
    }

    /// Absolute XIP address of the first byte.
    pub const fn base_address(&self) -> u32 {
        FLASH_BASE + self.offset
    }

    fn fits(&self, offset: u32, len: usize) -> bool {
        offset as u64 + len as u64 <= self.size as u64
    }
}

impl Partition for FlashPartition {
    fn name(&self) -> &str {
        self.name
    }

    fn len(&self) -> u32 {
        self.size
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, Error> {
        if offset >= self.size {
            return Err(Error::Read);
        }
        let n = buf.len().min((self.size - offset) as usize);
        flash_read(self.base_address() + offset, &mut buf[..n]);
        Ok(n)
    }

    /// Writes go out page by page. Bytes outside `data` are padded with the
    /// erased value, which leaves the flash underneath untouched.
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<usize, Error> {
        if !is_initialized() || !self.fits(offset, data.len()) {
            return Err(Error::Write);
        }

        let mut done = 0;
        while done < data.len() {
            let at = self.offset + offset + done as u32;
            let page_start = at & !(FLASH_PAGE_SIZE - 1);
            let in_page = (at - page_start) as usize;
            let n = (FLASH_PAGE_SIZE as usize - in_page).min(data.len() - done);

            let mut page = [0xFFu8; FLASH_PAGE_SIZE as usize];
            page[in_page..in_page + n].copy_from_slice(&data[done..done + n]);
            unsafe { flash_program(page_start, page.as_ptr(), page.len()) };

            done += n;
        }
        Ok(done)
    }

    fn erase_all(&mut self) -> Result<(), Error> {
        if !is_initialized()
            || self.offset % FLASH_SECTOR_SIZE != 0
            || self.size % FLASH_SECTOR_SIZE != 0
        {
            return Err(Error::Erase);
        }
        unsafe { flash_erase(self.offset, self.size) };
        Ok(())
    }
}
