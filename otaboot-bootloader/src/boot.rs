// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

use otaboot_common::config::BOOT_APP_MAGIC;

const RAM_START: u32 = 0x2000_0000;
const RAM_END: u32 = 0x2004_0000;

/// Watchdog SCRATCH0. Survives a system reset, cleared on power-up.
const WATCHDOG_SCRATCH0: *mut u32 = 0x4005_800C as *mut u32;

unsafe extern "C" {
    static __app_part_start: u32;
    static __app_part_size: u32;
    static __download_part_start: u32;
    static __download_part_size: u32;
}

macro_rules! linker_addr {
    ($sym:ident) => {
        unsafe { &$sym as *const u32 as u32 }
    };
}

/// Absolute XIP addresses of the two partitions, as placed by `memory.x`.
pub struct MemoryLayout {
    pub app: u32,
    pub app_size: u32,
    pub download: u32,
    pub download_size: u32,
}

impl MemoryLayout {
    pub fn from_linker() -> Self {
        Self {
            app: linker_addr!(__app_part_start),
            app_size: linker_addr!(__app_part_size),
            download: linker_addr!(__download_part_start),
            download_size: linker_addr!(__download_part_size),
        }
    }
}

struct VectorTable {
    initial_sp: u32,
    reset_vector: u32,
}

impl VectorTable {
    unsafe fn read_from(addr: u32) -> Self {
        Self {
            initial_sp: (addr as *const u32).read_volatile(),
            reset_vector: (addr as *const u32).offset(1).read_volatile(),
        }
    }

    /// The application executes in place, so its reset handler must sit
    /// inside its own partition while the stack lives in RAM.
    fn is_valid_for_xip(&self, base: u32, size: u32) -> bool {
        let reset = self.reset_vector & !1;
        (RAM_START..=RAM_END).contains(&self.initial_sp)
            && (base..base.saturating_add(size)).contains(&reset)
    }
}

fn take_boot_request() -> bool {
    unsafe {
        let requested = WATCHDOG_SCRATCH0.read_volatile() == BOOT_APP_MAGIC;
        WATCHDOG_SCRATCH0.write_volatile(0);
        requested
    }
}

/// Leave the boot request for the next reset.
pub fn request_application_boot() {
    unsafe { WATCHDOG_SCRATCH0.write_volatile(BOOT_APP_MAGIC) };
}

/// Drop any pending boot request.
pub fn clear_boot_request() {
    unsafe { WATCHDOG_SCRATCH0.write_volatile(0) };
}

/// First thing on reset: when the previous run asked for it, hand the core
/// to the application before any peripheral is touched.
///
/// Returns when no request is pending or the image does not look bootable.
pub fn start_application_if_requested() {
    if !take_boot_request() {
        return;
    }

    let layout = MemoryLayout::from_linker();
    let vt = unsafe { VectorTable::read_from(layout.app) };
    if !vt.is_valid_for_xip(layout.app, layout.app_size) {
        defmt::warn!(
            "Boot request ignored, bad vector table at 0x{:08x} (SP 0x{:08x}, reset 0x{:08x})",
            layout.app,
            vt.initial_sp,
            vt.reset_vector
        );
        return;
    }

    defmt::println!("Jumping to application at 0x{:08x}", layout.app);
    unsafe {
        relocate_vector_table(layout.app);
        jump_to_firmware(vt.initial_sp, vt.reset_vector);
    }
}

unsafe fn relocate_vector_table(base: u32) {
    cortex_m::interrupt::disable();

    const SCB_VTOR: *mut u32 = 0xE000_ED08 as *mut u32;
    SCB_VTOR.write_volatile(base);

    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

unsafe fn jump_to_firmware(initial_sp: u32, reset_vector: u32) -> ! {
    core::arch::asm!(
        "msr msp, {sp}",
        "bx {reset}",
        sp = in(reg) initial_sp,
        reset = in(reg) reset_vector,
        options(noreturn)
    );
}
