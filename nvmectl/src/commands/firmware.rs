// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Firmware slot activation and image download.

use super::parse_u32;
use super::parse_u8;
use crate::device::DeviceContext;
use crate::encode;
use crate::ioctl;
use crate::ioctl::CommandError;
use crate::xfer;
use anyhow::Context;
use nvme_defs::AdminOpcode;
use std::fs;
use std::path::PathBuf;

#[derive(clap::Args)]
pub struct FwActivateArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Firmware slot to act on.
    #[clap(long, short = 's', value_parser = parse_u8, default_value = "0")]
    pub slot: u8,
    /// Commit action (0 store, 1 store and activate, 2 activate, 3
    /// activate immediately).
    #[clap(long, short = 'a', value_parser = parse_u8, default_value = "1")]
    pub action: u8,
}

pub fn fw_activate(args: &FwActivateArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    let fields = encode::firmware_commit(args.slot, args.action)?;

    match ioctl::submit_admin(dev.file(), AdminOpcode::FIRMWARE_COMMIT, &mut [], &fields) {
        Ok(_) => {
            println!(
                "Success activating firmware action:{} slot:{}",
                args.action, args.slot
            );
            Ok(0)
        }
        Err(CommandError::Device(status)) => {
            eprintln!("NVME Admin command error:{}", status.name());
            Ok(status.0 as i32)
        }
        Err(CommandError::Os(errno)) => {
            Err(anyhow::Error::new(errno).context("firmware commit ioctl"))
        }
    }
}

#[derive(clap::Args)]
pub struct FwDownloadArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Firmware image file.
    #[clap(long, short = 'f')]
    pub fw: PathBuf,
    /// Per-command transfer size in bytes; coerced up to whole pages.
    #[clap(long, short = 'x', value_parser = parse_u32, default_value = "4096")]
    pub xfer: u32,
}

pub fn fw_download(args: &FwDownloadArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    let image = fs::read(&args.fw)
        .with_context(|| format!("failed to read firmware image {}", args.fw.display()))?;

    match xfer::download(&dev, &image, args.xfer as usize) {
        Ok(()) => {
            println!("Firmware download success");
            Ok(0)
        }
        Err(err @ xfer::DownloadError::Encode(_)) => Err(err.into()),
        Err(xfer::DownloadError::Chunk { offset, err }) => match err {
            CommandError::Device(status) => {
                eprintln!(
                    "NVME Admin command error:{} at offset {offset:#x}",
                    status.name()
                );
                Ok(status.0 as i32)
            }
            CommandError::Os(errno) => {
                Err(anyhow::Error::new(errno).context("firmware download ioctl"))
            }
        },
    }
}
