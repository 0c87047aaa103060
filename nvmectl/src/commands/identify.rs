// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Identify Controller / Identify Namespace / namespace list queries.

use super::parse_u32;
use super::report_status;
use crate::device::DeviceContext;
use crate::dump;
use crate::encode;
use crate::ioctl;
use crate::ioctl::CommandError;
use crate::ioctl::PAGE_SIZE;
use crate::render;
use anyhow::Context;
use nvme_defs::AdminOpcode;
use nvme_defs::Cns;
use nvme_defs::IdentifyController;
use nvme_defs::nvm::IdentifyNamespace;
use std::io;
use std::path::PathBuf;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

fn identify_page(
    dev: &DeviceContext,
    nsid: u32,
    cns: Cns,
) -> Result<Box<[ioctl::Page]>, CommandError> {
    let mut buf = ioctl::alloc_pages(PAGE_SIZE);
    let fields = encode::identify(nsid, cns);
    ioctl::submit_admin(dev.file(), AdminOpcode::IDENTIFY, buf.as_mut_bytes(), &fields)?;
    Ok(buf.into_boxed_slice())
}

#[derive(clap::Args)]
pub struct IdCtrlArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Also dump the vendor specific region.
    #[clap(long, short = 'v')]
    pub vendor_specific: bool,
    /// Emit the raw structure instead of decoded fields.
    #[clap(long, short = 'b')]
    pub raw_binary: bool,
}

pub fn id_ctrl(args: &IdCtrlArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    match identify_page(&dev, 0, Cns::CONTROLLER) {
        Ok(buf) => {
            let buf = buf.as_bytes();
            let mut out = io::stdout().lock();
            if args.raw_binary {
                dump::raw(buf, &mut out)?;
            } else {
                let ctrl = IdentifyController::read_from_prefix(buf).unwrap().0;
                render::id_ctrl(&mut out, &ctrl, args.vendor_specific)?;
            }
            Ok(0)
        }
        Err(CommandError::Device(status)) => Ok(report_status(status)),
        Err(CommandError::Os(errno)) => {
            Err(anyhow::Error::new(errno).context("identify controller ioctl"))
        }
    }
}

#[derive(clap::Args)]
pub struct IdNsArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Namespace to identify; a block device reports its own.
    #[clap(long, short = 'n', value_parser = parse_u32, default_value = "0")]
    pub namespace_id: u32,
    /// Also dump the vendor specific region.
    #[clap(long, short = 'v')]
    pub vendor_specific: bool,
    /// Emit the raw structure instead of decoded fields.
    #[clap(long, short = 'b')]
    pub raw_binary: bool,
}

pub fn id_ns(args: &IdNsArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    let nsid = dev.resolve_nsid(args.namespace_id)?;
    match identify_page(&dev, nsid, Cns::NAMESPACE) {
        Ok(buf) => {
            let buf = buf.as_bytes();
            let mut out = io::stdout().lock();
            if args.raw_binary {
                dump::raw(buf, &mut out)?;
            } else {
                let ns = IdentifyNamespace::read_from_prefix(buf).unwrap().0;
                render::id_ns(&mut out, &ns, nsid, args.vendor_specific)?;
            }
            Ok(0)
        }
        Err(CommandError::Device(status)) => {
            eprintln!("NVMe Status: {} NSID:{nsid}", status.name());
            Ok(status.0 as i32)
        }
        Err(CommandError::Os(errno)) => {
            Err(anyhow::Error::new(errno).context("identify namespace ioctl"))
        }
    }
}

#[derive(clap::Args)]
pub struct ListNsArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Report namespace ids greater than this one.
    #[clap(long, short = 'n', value_parser = parse_u32, default_value = "0")]
    pub namespace_id: u32,
}

pub fn list_ns(args: &ListNsArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    match identify_page(&dev, args.namespace_id, Cns::ACTIVE_NAMESPACES) {
        Ok(buf) => {
            for (i, id) in buf
                .as_bytes()
                .chunks_exact(4)
                .map(|b| u32::from_le_bytes(b.try_into().unwrap()))
                .enumerate()
            {
                if id != 0 {
                    println!("[{i:4}]:{id:#x}");
                }
            }
            Ok(0)
        }
        Err(CommandError::Device(status)) => {
            eprintln!(
                "NVMe Status: {} NSID:{}",
                status.name(),
                args.namespace_id
            );
            Ok(status.0 as i32)
        }
        Err(CommandError::Os(errno)) => {
            Err(anyhow::Error::new(errno).context("identify namespace list ioctl"))
        }
    }
}

#[derive(clap::Args)]
pub struct GetNsIdArgs {
    /// Block device node (/dev/nvmeXnY).
    pub device: PathBuf,
}

pub fn get_ns_id(args: &GetNsIdArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    if !dev.is_block() {
        anyhow::bail!("{}: requesting nsid from non-block device", dev.name());
    }
    let nsid = dev
        .namespace_id()
        .with_context(|| format!("{}: failed to return namespace id", dev.name()))?;
    println!("{}: namespace-id:{nsid}", dev.name());
    Ok(0)
}
