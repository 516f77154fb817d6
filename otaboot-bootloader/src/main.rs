// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

#![no_std]
#![no_main]

mod board;
mod boot;
mod flash;

use defmt_rtt as _;
use panic_probe as _;

use otaboot_common::{BootConfig, Board, Handoff, System, SystemStep};

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;

#[unsafe(link_section = ".boot2")]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

#[entry]
fn main() -> ! {
    // A pending boot request jumps away from here.
    boot::start_application_if_requested();

    defmt::println!("Bootloader init");

    let mut board = board::Rp2040Board::init();
    let mut system = System::new(BootConfig::default());

    loop {
        if let SystemStep::Handoff(handoff) = system.process(&mut board) {
            // Both handoffs reset the core. Getting here means the reset
            // request was lost, so ask again.
            match handoff {
                Handoff::Application => defmt::warn!("Application handoff returned"),
                Handoff::Reset => defmt::warn!("Reset handoff returned"),
            }
            board.system_reset();
        }
    }
}
