// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Security Send / Security Receive.
//!
//! Like the reservation family, OS errors become the exit code without
//! extra output.

use super::parse_u16;
use super::parse_u32;
use super::parse_u8;
use crate::device::DeviceContext;
use crate::dump;
use crate::encode;
use crate::ioctl;
use crate::ioctl::CommandError;
use anyhow::Context;
use nvme_defs::AdminOpcode;
use std::fs;
use std::io;
use std::path::PathBuf;
use zerocopy::IntoBytes;

#[derive(clap::Args)]
pub struct SecuritySendArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// File holding the security payload.
    #[clap(long, short = 'f')]
    pub file: PathBuf,
    /// Security protocol.
    #[clap(long, short = 'p', value_parser = parse_u8, default_value = "0")]
    pub secp: u8,
    /// Security protocol specific value.
    #[clap(long, short = 's', value_parser = parse_u16, default_value = "0")]
    pub spsp: u16,
    /// Transfer length override; defaults to the payload size.
    #[clap(long, short = 't', value_parser = parse_u32, default_value = "0")]
    pub tl: u32,
}

pub fn send(args: &SecuritySendArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    let payload = fs::read(&args.file)
        .with_context(|| format!("failed to read security file {}", args.file.display()))?;

    let mut buf = ioctl::alloc_pages(payload.len());
    let data = &mut buf.as_mut_bytes()[..payload.len()];
    data.copy_from_slice(&payload);

    let tl = if args.tl != 0 {
        args.tl
    } else {
        payload.len() as u32
    };
    let fields = encode::security(args.secp, args.spsp, tl);

    match ioctl::submit_admin(dev.file(), AdminOpcode::SECURITY_SEND, data, &fields) {
        Ok(result) => {
            println!("NVME Security Send Command Success:{result}");
            Ok(0)
        }
        Err(CommandError::Device(status)) => {
            eprintln!("NVME Security Send Command Error:{}", status.0);
            Ok(status.0 as i32)
        }
        // Quiet by policy: the errno is the exit code.
        Err(err @ CommandError::Os(_)) => Ok(err.exit_code()),
    }
}

#[derive(clap::Args)]
pub struct SecurityRecvArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Receive buffer size in bytes.
    #[clap(long, short = 'x', value_parser = parse_u32, default_value = "0")]
    pub size: u32,
    /// Security protocol.
    #[clap(long, short = 'p', value_parser = parse_u8, default_value = "0")]
    pub secp: u8,
    /// Security protocol specific value.
    #[clap(long, short = 's', value_parser = parse_u16, default_value = "0")]
    pub spsp: u16,
    /// Allocation length placed in cdw11.
    #[clap(long, short = 't', value_parser = parse_u32, default_value = "0")]
    pub al: u32,
    /// Emit the raw buffer instead of a hex table.
    #[clap(long, short = 'b')]
    pub raw_binary: bool,
}

pub fn recv(args: &SecurityRecvArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    let size = args.size as usize;
    let mut buf = ioctl::alloc_pages(size);
    let data = &mut buf.as_mut_bytes()[..size];
    let fields = encode::security(args.secp, args.spsp, args.al);

    match ioctl::submit_admin(dev.file(), AdminOpcode::SECURITY_RECEIVE, data, &fields) {
        Ok(result) => {
            let mut out = io::stdout().lock();
            if args.raw_binary {
                dump::raw(data, &mut out)?;
            } else {
                println!("NVME Security Receive Command Success:{result}");
                dump::hex(data, &mut out)?;
            }
            Ok(0)
        }
        Err(CommandError::Device(status)) => {
            eprintln!("NVME Security Receive Command Error:{}", status.0);
            Ok(status.0 as i32)
        }
        // Quiet by policy: the errno is the exit code.
        Err(err @ CommandError::Os(_)) => Ok(err.exit_code()),
    }
}
