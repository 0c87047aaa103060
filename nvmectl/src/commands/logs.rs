// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Log page retrieval: generic, SMART, firmware slot, and error logs.

use super::parse_u32;
use super::parse_u8;
use super::report_status;
use crate::device::DeviceContext;
use crate::dump;
use crate::encode;
use crate::encode::NSID_ALL;
use crate::ioctl;
use crate::ioctl::CommandError;
use crate::render;
use nvme_defs::AdminOpcode;
use nvme_defs::ErrorLogEntry;
use nvme_defs::FirmwareLog;
use nvme_defs::LogPage;
use nvme_defs::SmartLog;
use std::io;
use std::path::PathBuf;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

fn get_log(
    dev: &DeviceContext,
    nsid: u32,
    lid: u8,
    len: u32,
) -> anyhow::Result<Result<Vec<ioctl::Page>, CommandError>> {
    let fields = encode::get_log_page(nsid, lid, len)?;
    let mut buf = ioctl::alloc_pages(len as usize);
    let data = &mut buf.as_mut_bytes()[..len as usize];
    Ok(
        match ioctl::submit_admin(dev.file(), AdminOpcode::GET_LOG_PAGE, data, &fields) {
            Ok(_) => Ok(buf),
            Err(err) => Err(err),
        },
    )
}

#[derive(clap::Args)]
pub struct GetLogArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Log page identifier.
    #[clap(long, short = 'i', value_parser = parse_u8)]
    pub log_id: u8,
    /// Log length in bytes; must be a nonzero multiple of 4.
    #[clap(long, short = 'l', value_parser = parse_u32)]
    pub log_len: u32,
    /// Namespace the log applies to.
    #[clap(long, short = 'n', value_parser = parse_u32, default_value = "0xffffffff")]
    pub namespace_id: u32,
    /// Emit the raw log instead of a hex table.
    #[clap(long, short = 'b')]
    pub raw_binary: bool,
}

pub fn get_log_cmd(args: &GetLogArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    match get_log(&dev, args.namespace_id, args.log_id, args.log_len)? {
        Ok(buf) => {
            let data = &buf.as_bytes()[..args.log_len as usize];
            let mut out = io::stdout().lock();
            if args.raw_binary {
                dump::raw(data, &mut out)?;
            } else {
                use io::Write;
                writeln!(
                    out,
                    "Device:{} log-id:{} namespace-id:{:#x}",
                    dev.name(),
                    args.log_id,
                    args.namespace_id
                )?;
                dump::hex(data, &mut out)?;
            }
            Ok(0)
        }
        Err(CommandError::Device(status)) => Ok(report_status(status)),
        Err(CommandError::Os(errno)) => Err(anyhow::Error::new(errno).context("get log ioctl")),
    }
}

#[derive(clap::Args)]
pub struct SmartLogArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Namespace the log applies to.
    #[clap(long, short = 'n', value_parser = parse_u32, default_value = "0xffffffff")]
    pub namespace_id: u32,
    /// Emit the raw structure instead of decoded fields.
    #[clap(long, short = 'b')]
    pub raw_binary: bool,
}

pub fn smart_log(args: &SmartLogArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    let len = size_of::<SmartLog>() as u32;
    match get_log(
        &dev,
        args.namespace_id,
        LogPage::HEALTH_INFORMATION.0,
        len,
    )? {
        Ok(buf) => {
            let data = &buf.as_bytes()[..len as usize];
            let mut out = io::stdout().lock();
            if args.raw_binary {
                dump::raw(data, &mut out)?;
            } else {
                let log = SmartLog::read_from_prefix(data).unwrap().0;
                render::smart_log(&mut out, &log, args.namespace_id, &dev.name())?;
            }
            Ok(0)
        }
        Err(CommandError::Device(status)) => Ok(report_status(status)),
        Err(CommandError::Os(errno)) => Err(anyhow::Error::new(errno).context("smart log ioctl")),
    }
}

#[derive(clap::Args)]
pub struct FwLogArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Emit the raw structure instead of decoded fields.
    #[clap(long, short = 'b')]
    pub raw_binary: bool,
}

pub fn fw_log(args: &FwLogArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    let len = size_of::<FirmwareLog>() as u32;
    match get_log(&dev, NSID_ALL, LogPage::FIRMWARE_SLOT_INFORMATION.0, len)? {
        Ok(buf) => {
            let data = &buf.as_bytes()[..len as usize];
            let mut out = io::stdout().lock();
            if args.raw_binary {
                dump::raw(data, &mut out)?;
            } else {
                let log = FirmwareLog::read_from_prefix(data).unwrap().0;
                render::fw_log(&mut out, &log, &dev.name())?;
            }
            Ok(0)
        }
        Err(CommandError::Device(status)) => Ok(report_status(status)),
        Err(CommandError::Os(errno)) => {
            Err(anyhow::Error::new(errno).context("firmware log ioctl"))
        }
    }
}

#[derive(clap::Args)]
pub struct ErrorLogArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Number of 64-byte entries to fetch.
    #[clap(long, short = 'e', value_parser = parse_u32, default_value = "64")]
    pub log_entries: u32,
    /// Namespace the log applies to.
    #[clap(long, short = 'n', value_parser = parse_u32, default_value = "0xffffffff")]
    pub namespace_id: u32,
    /// Emit the raw log instead of decoded entries.
    #[clap(long, short = 'b')]
    pub raw_binary: bool,
}

pub fn error_log(args: &ErrorLogArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    if args.log_entries == 0 {
        anyhow::bail!("non-zero --log-entries is required");
    }
    let len = args.log_entries * size_of::<ErrorLogEntry>() as u32;
    match get_log(&dev, args.namespace_id, LogPage::ERROR_INFORMATION.0, len)? {
        Ok(buf) => {
            let data = &buf.as_bytes()[..len as usize];
            let mut out = io::stdout().lock();
            if args.raw_binary {
                dump::raw(data, &mut out)?;
            } else {
                let entries: Vec<ErrorLogEntry> = data
                    .chunks_exact(size_of::<ErrorLogEntry>())
                    .map(|chunk| ErrorLogEntry::read_from_bytes(chunk).unwrap())
                    .collect();
                render::error_log(&mut out, &entries, &dev.name())?;
            }
            Ok(0)
        }
        Err(CommandError::Device(status)) => Ok(report_status(status)),
        Err(CommandError::Os(errno)) => Err(anyhow::Error::new(errno).context("error log ioctl")),
    }
}
