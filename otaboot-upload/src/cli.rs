// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use otaboot_common::APP_PART_NAME;

use crate::commands;
use crate::transport::Transport;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "otaboot-upload")]
#[command(about = "Package builder and IAP upload tool for the otaboot bootloader")]
pub struct Cli {
    /// Serial port (e.g., /dev/ttyUSB0)
    #[arg(short, long)]
    pub port: Option<String>,

    /// Serial baud rate
    #[arg(short, long, default_value = "115200")]
    pub baud: u32,

    /// Modbus slave address of the bootloader
    #[arg(short, long, default_value = "1")]
    pub address: u8,

    /// Show validation diagnostics (-v: info, -vv: debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Wrap a raw image into an RBL package
    Pack {
        /// Raw application image
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output package (.rbl)
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Version string stored in the header (at most 23 bytes)
        #[arg(short, long)]
        version: String,

        /// Target partition name
        #[arg(long, default_value = APP_PART_NAME)]
        part: String,

        /// Header timestamp (defaults to now, seconds since the epoch)
        #[arg(short, long)]
        timestamp: Option<u32>,
    },

    /// Validate an RBL package and print its header
    Inspect {
        /// Package file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Perform the handshake and check the bootloader answers
    Ping {
        /// Give up after this many seconds
        #[arg(long, default_value = "10")]
        wait: u64,
    },

    /// Upload an image through IAP and boot it
    Upload {
        /// Raw image or RBL package (the body is sent)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Bytes per WRITE packet
        #[arg(long, default_value = "1024", value_parser = clap::value_parser!(u16).range(1..=4096))]
        packet_size: u16,

        /// Attempts per packet before giving up
        #[arg(long, default_value = "3")]
        retries: u32,

        /// Seconds to keep trying the handshake (reset the board meanwhile)
        #[arg(long, default_value = "10")]
        wait: u64,
    },
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    SimpleLogger::new()
        .with_level(log_level(cli.verbose))
        .init()
        .context("failed to install the logger")?;

    match cli.command {
        Commands::Pack {
            input,
            output,
            version,
            part,
            timestamp,
        } => commands::pack(&input, &output, &version, &part, timestamp),
        Commands::Inspect { file, json } => commands::inspect(&file, json),

        cmd => {
            let port = cli
                .port
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("--port is required for this command"))?;
            let mut transport = Transport::open(port, cli.baud, cli.address)?;

            match cmd {
                Commands::Ping { wait } => commands::ping(&mut transport, wait),
                Commands::Upload {
                    file,
                    packet_size,
                    retries,
                    wait,
                } => commands::upload(&mut transport, &file, packet_size, retries, wait),
                Commands::Pack { .. } | Commands::Inspect { .. } => bail!("unreachable"),
            }
        }
    }
}
