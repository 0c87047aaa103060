// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Read/write/compare through the user-io interface, plus flush.

use super::parse_u16;
use super::parse_u32;
use super::parse_u64;
use super::parse_u8;
use super::report_status;
use crate::device::DeviceContext;
use crate::encode;
use crate::encode::IoParams;
use crate::ioctl;
use crate::ioctl::CommandError;
use anyhow::Context;
use nvme_defs::nvm::NvmOpcode;
use std::fs;
use std::io;
use std::io::Read;
use std::io::Write;
use std::path::PathBuf;
use zerocopy::IntoBytes;

#[derive(clap::Args)]
pub struct SubmitIoArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Starting logical block address.
    #[clap(long, short = 's', value_parser = parse_u64, default_value = "0")]
    pub start_block: u64,
    /// Number of blocks, zero based.
    #[clap(long, short = 'c', value_parser = parse_u16, default_value = "0")]
    pub block_count: u16,
    /// Transfer size in bytes.
    #[clap(long, short = 'z', value_parser = parse_u32)]
    pub data_size: u32,
    /// Data file; defaults to stdin for writes and stdout for reads.
    #[clap(long, short = 'd')]
    pub data: Option<PathBuf>,
    /// Protection information check/strip flags.
    #[clap(long, short = 'p', value_parser = parse_u8, default_value = "0")]
    pub prinfo: u8,
    /// Expected initial reference tag.
    #[clap(long, short = 'r', value_parser = parse_u32, default_value = "0")]
    pub ref_tag: u32,
    /// Expected application tag.
    #[clap(long, short = 'a', value_parser = parse_u16, default_value = "0")]
    pub app_tag: u16,
    /// Application tag mask.
    #[clap(long, short = 'm', value_parser = parse_u16, default_value = "0")]
    pub app_tag_mask: u16,
    /// Limited retry.
    #[clap(long, short = 'l')]
    pub limited_retry: bool,
    /// Force unit access.
    #[clap(long, short = 'f')]
    pub force_unit_access: bool,
    /// Print the descriptor before submitting.
    #[clap(long, short = 'v')]
    pub show_command: bool,
    /// Print the descriptor and stop without submitting.
    #[clap(long, short = 'w')]
    pub dry_run: bool,
}

fn show_io(io: &ioctl::UserIo) {
    println!("opcode       : {:02x}", io.opcode);
    println!("flags        : {:02x}", io.flags);
    println!("control      : {:04x}", io.control);
    println!("nblocks      : {:04x}", io.nblocks);
    println!("metadata     : {:x}", io.metadata);
    println!("addr         : {:x}", io.addr);
    println!("slba         : {:x}", io.slba);
    println!("dsmgmt       : {:08x}", io.dsmgmt);
    println!("reftag       : {:08x}", io.reftag);
    println!("apptag       : {:04x}", io.apptag);
    println!("appmask      : {:04x}", io.appmask);
}

fn submit(opcode: NvmOpcode, name: &str, args: &SubmitIoArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    if args.data_size == 0 {
        anyhow::bail!("data size not provided");
    }
    let len = args.data_size as usize;
    let mut buf = ioctl::alloc_pages(len);
    let data = &mut buf.as_mut_bytes()[..len];

    // Write and compare (odd opcodes) move data toward the controller.
    let host_to_controller = opcode.0 & 1 != 0;
    if host_to_controller {
        match &args.data {
            Some(path) => fs::File::open(path)
                .and_then(|mut f| f.read_exact(data))
                .with_context(|| format!("failed to read buffer from {}", path.display()))?,
            None => io::stdin()
                .read_exact(data)
                .context("failed to read buffer from stdin")?,
        }
    }

    let mut user_io = encode::user_io(
        opcode,
        &IoParams {
            slba: args.start_block,
            nblocks: args.block_count,
            prinfo: args.prinfo,
            fua: args.force_unit_access,
            lr: args.limited_retry,
            reftag: args.ref_tag,
            apptag: args.app_tag,
            appmask: args.app_tag_mask,
        },
    )?;
    user_io.addr = data.as_mut_ptr() as u64;

    if args.show_command || args.dry_run {
        show_io(&user_io);
        if args.dry_run {
            return Ok(0);
        }
    }

    match ioctl::submit_user_io(dev.file(), &user_io) {
        Ok(()) => {
            if !host_to_controller {
                match &args.data {
                    Some(path) => fs::write(path, &*data)
                        .with_context(|| format!("failed to write buffer to {}", path.display()))?,
                    None => io::stdout()
                        .lock()
                        .write_all(data)
                        .context("failed to write buffer to stdout")?,
                }
            }
            println!("{name}: success");
            Ok(0)
        }
        Err(CommandError::Device(status)) => {
            eprintln!("{name}:{}({:04x})", status.name(), status.0);
            Ok(status.0 as i32)
        }
        Err(CommandError::Os(errno)) => Err(anyhow::Error::new(errno).context("submit io ioctl")),
    }
}

pub fn read(args: &SubmitIoArgs) -> anyhow::Result<i32> {
    submit(NvmOpcode::READ, "read", args)
}

pub fn write(args: &SubmitIoArgs) -> anyhow::Result<i32> {
    submit(NvmOpcode::WRITE, "write", args)
}

pub fn compare(args: &SubmitIoArgs) -> anyhow::Result<i32> {
    submit(NvmOpcode::COMPARE, "compare", args)
}

#[derive(clap::Args)]
pub struct FlushArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Namespace to flush.
    #[clap(long, short = 'n', value_parser = parse_u32, default_value = "0xffffffff")]
    pub namespace_id: u32,
}

pub fn flush(args: &FlushArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    let fields = ioctl::CommandFields {
        nsid: args.namespace_id,
        ..Default::default()
    };
    match ioctl::submit_io(dev.file(), NvmOpcode::FLUSH, &mut [], &fields) {
        Ok(_) => {
            println!("NVMe Flush: success");
            Ok(0)
        }
        Err(CommandError::Device(status)) => Ok(report_status(status)),
        Err(CommandError::Os(errno)) => Err(anyhow::Error::new(errno).context("flush ioctl")),
    }
}
