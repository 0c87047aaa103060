// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Format NVM.

use super::parse_u32;
use super::parse_u8;
use crate::device::DeviceContext;
use crate::encode;
use crate::encode::FormatParams;
use crate::ioctl;
use crate::ioctl::CommandError;
use nvme_defs::AdminOpcode;
use std::path::PathBuf;

#[derive(clap::Args)]
pub struct FormatArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Namespace to format; a block device reports its own.
    #[clap(long, short = 'n', value_parser = parse_u32, default_value = "0")]
    pub namespace_id: u32,
    /// LBA format index to apply.
    #[clap(long, short = 'l', value_parser = parse_u8, default_value = "0")]
    pub lbaf: u8,
    /// Secure erase settings.
    #[clap(long, short = 's', value_parser = parse_u8, default_value = "0")]
    pub ses: u8,
    /// Protection information location flag.
    #[clap(long, short = 'p', value_parser = parse_u8, default_value = "0")]
    pub pil: u8,
    /// Protection information type.
    #[clap(long, short = 'i', value_parser = parse_u8, default_value = "0")]
    pub pi: u8,
    /// Metadata location flag.
    #[clap(long, short = 'm', value_parser = parse_u8, default_value = "0")]
    pub ms: u8,
}

pub fn format(args: &FormatArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    let nsid = dev.resolve_nsid(args.namespace_id)?;
    let fields = encode::format_nvm(
        nsid,
        &FormatParams {
            lbaf: args.lbaf,
            mset: args.ms,
            pi: args.pi,
            pil: args.pil,
            ses: args.ses,
        },
    )?;

    match ioctl::submit_admin(dev.file(), AdminOpcode::FORMAT_NVM, &mut [], &fields) {
        Ok(_) => {
            println!("Success formatting namespace:{nsid:x}");
            if dev.is_block() {
                // The block layout may have changed under the kernel.
                if let Err(errno) = ioctl::reread_partitions(dev.file()) {
                    tracing::debug!(%errno, "partition reread after format");
                }
            }
            Ok(0)
        }
        Err(CommandError::Device(status)) => {
            eprintln!(
                "NVME Admin command error:{}({:#x})",
                status.name(),
                status.0
            );
            Ok(status.0 as i32)
        }
        Err(CommandError::Os(errno)) => Err(anyhow::Error::new(errno).context("format ioctl")),
    }
}
