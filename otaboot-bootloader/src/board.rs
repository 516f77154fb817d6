// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Raspberry Pi Pico wiring of the bootloader.
//!
//! - IAP link: UART0 on GP0 (TX) / GP1 (RX), 115200 8N1
//! - Boot key: GP2 to ground, internal pull-up
//! - No card slot

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;
use rp2040_hal as hal;

use hal::clocks::{init_clocks_and_plls, Clock};
use hal::fugit::RateExtU32;
use hal::gpio::{bank0, FunctionSioInput, FunctionUart, Pin, PullDown, PullUp};
use hal::pac;
use hal::uart::{DataBits, StopBits, UartConfig, UartPeripheral};
use hal::{Sio, Timer, Watchdog};

use otaboot_common::{
    Board, Error, NoStorage, Partition, SerialLink, APP_PART_NAME, DOWNLOAD_PART_NAME,
};

use crate::boot::{self, MemoryLayout};
use crate::flash::{self, FlashPartition, FLASH_BASE};

const XTAL_FREQ_HZ: u32 = 12_000_000;
const IAP_BAUD_RATE: u32 = 115_200;

type UartPins = (
    Pin<bank0::Gpio0, FunctionUart, PullDown>,
    Pin<bank0::Gpio1, FunctionUart, PullDown>,
);
type Uart0 = UartPeripheral<hal::uart::Enabled, pac::UART0, UartPins>;
type BootKey = Pin<bank0::Gpio2, FunctionSioInput, PullUp>;

/// UART0 with byte-idle detection on top of the hardware timer. The UART
/// cannot detach, so `receive` never fails.
pub struct UartLink {
    uart: Uart0,
    timer: Timer,
}

impl SerialLink for UartLink {
    fn receive(&mut self, buf: &mut [u8], idle_timeout_ms: u32) -> Result<usize, Error> {
        let idle_us = u64::from(idle_timeout_ms) * 1000;
        let mut received = 0;
        let mut last = self.timer.get_counter().ticks();

        while received < buf.len() {
            if self.uart.uart_is_readable() {
                // Framing and parity errors drop the byte, the framer resyncs.
                if let Ok(n) = self.uart.read_raw(&mut buf[received..]) {
                    received += n;
                }
                last = self.timer.get_counter().ticks();
            } else if self.timer.get_counter().ticks().wrapping_sub(last) >= idle_us {
                break;
            }
        }
        Ok(received)
    }

    fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        self.uart.write_full_blocking(data);
        Ok(())
    }
}

pub struct Rp2040Board {
    timer: Timer,
    link: UartLink,
    key: BootKey,
    app: FlashPartition,
    download: FlashPartition,
    flash_ready: bool,
}

impl Rp2040Board {
    pub fn init() -> Self {
        let mut pac = unsafe { pac::Peripherals::steal() };
        let mut watchdog = Watchdog::new(pac.WATCHDOG);

        let Ok(clocks) = init_clocks_and_plls(
            XTAL_FREQ_HZ,
            pac.XOSC,
            pac.CLOCKS,
            pac.PLL_SYS,
            pac.PLL_USB,
            &mut pac.RESETS,
            &mut watchdog,
        ) else {
            defmt::panic!("clock init failed");
        };

        let timer = Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
        let sio = Sio::new(pac.SIO);
        let pins = hal::gpio::Pins::new(
            pac.IO_BANK0,
            pac.PADS_BANK0,
            sio.gpio_bank0,
            &mut pac.RESETS,
        );

        let uart_pins = (
            pins.gpio0.into_function::<FunctionUart>(),
            pins.gpio1.into_function::<FunctionUart>(),
        );
        let Ok(uart) = UartPeripheral::new(pac.UART0, uart_pins, &mut pac.RESETS).enable(
            UartConfig::new(IAP_BAUD_RATE.Hz(), DataBits::Eight, None, StopBits::One),
            clocks.peripheral_clock.freq(),
        ) else {
            defmt::panic!("uart init failed");
        };

        let layout = MemoryLayout::from_linker();
        defmt::println!(
            "Partitions: app 0x{:08x} ({}KB), download 0x{:08x} ({}KB)",
            layout.app,
            layout.app_size / 1024,
            layout.download,
            layout.download_size / 1024
        );

        Self {
            timer,
            link: UartLink { uart, timer },
            key: pins.gpio2.into_pull_up_input(),
            app: FlashPartition::new(APP_PART_NAME, layout.app - FLASH_BASE, layout.app_size),
            download: FlashPartition::new(
                DOWNLOAD_PART_NAME,
                layout.download - FLASH_BASE,
                layout.download_size,
            ),
            flash_ready: false,
        }
    }
}

impl Board for Rp2040Board {
    type Partition = FlashPartition;
    type Serial = UartLink;
    type Storage = NoStorage;

    fn init_partitions(&mut self) -> Result<(), Error> {
        if !self.flash_ready {
            flash::init();
            self.flash_ready = true;
        }
        Ok(())
    }

    fn find_partition(&mut self, name: &str) -> Option<FlashPartition> {
        if !self.flash_ready {
            return None;
        }
        [self.app, self.download]
            .into_iter()
            .find(|part| part.name() == name)
    }

    fn serial(&mut self) -> Result<&mut UartLink, Error> {
        Ok(&mut self.link)
    }

    fn storage(&mut self) -> Option<&mut NoStorage> {
        None
    }

    fn now_ms(&self) -> u64 {
        self.timer.get_counter().ticks() / 1000
    }

    fn delay_ms(&mut self, ms: u32) {
        self.timer.delay_ms(ms);
    }

    fn key_pressed(&mut self) -> bool {
        self.key.is_low().unwrap_or(false)
    }

    fn boot_application(&mut self) {
        boot::request_application_boot();
        cortex_m::interrupt::disable();
        cortex_m::peripheral::SCB::sys_reset();
    }

    fn system_reset(&mut self) {
        boot::clear_boot_request();
        cortex_m::peripheral::SCB::sys_reset();
    }
}
