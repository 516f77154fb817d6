// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

use crate::board::Board;
use crate::config::{BootConfig, APP_PART_NAME, DOWNLOAD_PART_NAME};
use crate::package::HEADER_SIZE;
use crate::partition::Partition;
use crate::service::{Service, ServiceContext};
use crate::services::{IapService, KeyService, SdCardService};
use crate::system::state::{Handoff, SystemState, SystemStep};
use crate::upgrade::upgrade;
use crate::verify::verify_partition;

/// The bootloader main loop body.
///
/// Call [`process`](Self::process) repeatedly. Each call polls the key, the
/// IAP link while a host may be talking, and advances the boot decision by
/// one step. The loop ends when the board hands control to the application
/// or resets.
pub struct System<B: Board> {
    config: BootConfig,
    state: SystemState<B::Partition>,
    key: KeyService,
    iap: IapService,
    sdcard: SdCardService,
}

impl<B: Board> System<B> {
    pub fn new(config: BootConfig) -> Self {
        Self {
            config,
            state: SystemState::new(),
            key: KeyService::new(),
            iap: IapService::new(),
            sdcard: SdCardService::new(),
        }
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    pub fn state(&self) -> &SystemState<B::Partition> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SystemState<B::Partition> {
        &mut self.state
    }

    pub fn step(&self) -> SystemStep {
        self.state.step
    }

    pub fn iap(&self) -> &IapService {
        &self.iap
    }

    /// Run one poll cycle and return the step reached.
    pub fn process(&mut self, board: &mut B) -> SystemStep {
        let mut ctx = ServiceContext {
            board,
            state: &mut self.state,
            config: &self.config,
        };

        if let Err(e) = self.key.process(&mut ctx) {
            warn!("Key service error: {}", e);
        }

        if matches!(
            ctx.state.step,
            SystemStep::WaitSync { .. } | SystemStep::BootProcess
        ) {
            if let Err(e) = self.iap.process(&mut ctx) {
                error!("IAP transport error: {}", e);
                ctx.state.step = SystemStep::Error;
            }
        }

        let current = ctx.state.step;
        let next = match current {
            SystemStep::Init => init(&mut ctx),
            SystemStep::VerifyDownload => verify_download(&mut ctx),
            SystemStep::WaitSync { since_ms } => {
                if ctx.board.storage().is_some() {
                    // Mount failures are latched by the service and logged there.
                    let _ = self.sdcard.process(&mut ctx);
                }
                if self.sdcard.is_mounted() {
                    SystemStep::SdCard
                } else {
                    wait_sync(&mut ctx, since_ms)
                }
            }
            SystemStep::BootProcess => {
                if ctx.state.quit {
                    info!("sync cmd cnt:{}, will jump.", ctx.state.sync_count);
                    SystemStep::Update
                } else {
                    current
                }
            }
            SystemStep::SdCard => {
                match self.sdcard.stage(&mut ctx) {
                    Ok(header) => info!("SD card firmware {} staged.", header.version()),
                    Err(e) => warn!("SD card staging failed: {}", e),
                }
                SystemStep::Update
            }
            SystemStep::Update => update(&mut ctx),
            SystemStep::Error => {
                error!("init error.");
                ctx.board.delay_ms(ctx.config.error_delay_ms);
                current
            }
            SystemStep::Handoff(_) => current,
        };

        if next != current {
            debug!("System step {:?} -> {:?}", current, next);
        }
        ctx.state.step = next;
        next
    }
}

fn init<B: Board>(ctx: &mut ServiceContext<B>) -> SystemStep {
    if let Err(e) = ctx.board.init_partitions() {
        error!("Partition table init failed: {}", e);
        return SystemStep::Error;
    }

    let Some(app) = ctx.board.find_partition(APP_PART_NAME) else {
        error!("App partition not find.");
        return SystemStep::Error;
    };
    let Some(download) = ctx.board.find_partition(DOWNLOAD_PART_NAME) else {
        error!("Download partition not find.");
        return SystemStep::Error;
    };

    ctx.state.app_part = Some(app);
    ctx.state.download_part = Some(download);
    SystemStep::VerifyDownload
}

fn verify_download<B: Board>(ctx: &mut ServiceContext<B>) -> SystemStep {
    let now = ctx.board.now_ms();
    let state = &mut *ctx.state;
    state.download_header = None;
    let (Some(app), Some(download)) = (state.app_part.as_mut(), state.download_part.as_mut())
    else {
        return SystemStep::Error;
    };

    let header = match verify_partition(download) {
        Ok(header) => header,
        Err(_) => {
            error!("Get OTA \"{}\" partition firmware failed!", download.name());
            return SystemStep::WaitSync { since_ms: now };
        }
    };

    let need = u64::from(header.raw_size) + HEADER_SIZE as u64;
    if need > u64::from(app.len()) {
        error!(
            "The partition '{}' length is ({}), need ({})!",
            app.name(),
            app.len(),
            need
        );
        info!("The partition '{}' is erasing.", download.name());
        match download.erase_all() {
            Ok(()) => info!("The partition '{}' erase success.", download.name()),
            Err(e) => error!("The partition '{}' erase failed: {}", download.name(), e),
        }
        return SystemStep::WaitSync { since_ms: now };
    }

    state.download_header = Some(header);
    SystemStep::Update
}

fn wait_sync<B: Board>(ctx: &mut ServiceContext<B>, since_ms: u64) -> SystemStep {
    let elapsed = ctx.board.now_ms().saturating_sub(since_ms);
    if ctx.state.stay_in_boot {
        info!(
            "sync:{} ms, sync cmd cnt:{}, enter boot",
            elapsed,
            ctx.state.sync_count
        );
        return SystemStep::BootProcess;
    }
    if elapsed >= ctx.config.handshake_timeout_ms {
        warn!(
            "wait sync timeout:{} ms, sync cmd cnt:{}, will jump.",
            elapsed,
            ctx.state.sync_count
        );
        return SystemStep::Update;
    }
    SystemStep::WaitSync { since_ms }
}

fn update<B: Board>(ctx: &mut ServiceContext<B>) -> SystemStep {
    let state = &mut *ctx.state;
    let (Some(app), Some(download)) = (state.app_part.as_mut(), state.download_part.as_mut())
    else {
        return SystemStep::Error;
    };

    let header = match verify_partition(download) {
        Ok(header) => header,
        Err(_) => {
            if verify_partition(app).is_err() {
                warn!("Force the {} partition to run!", app.name());
            }
            ctx.board.boot_application();
            return SystemStep::Handoff(Handoff::Application);
        }
    };
    state.download_header = Some(header);

    match upgrade(download, &header, app) {
        Ok(_) => {
            info!("The partition '{}' is erasing.", download.name());
            match download.erase_all() {
                Ok(()) => info!("The partition '{}' erase success.", download.name()),
                Err(e) => error!("The partition '{}' erase failed: {}", download.name(), e),
            }
            ctx.board.boot_application();
            SystemStep::Handoff(Handoff::Application)
        }
        Err(e) => {
            error!("Firmware upgrade failed: {}", e);
            ctx.board.system_reset();
            SystemStep::Handoff(Handoff::Reset)
        }
    }
}
