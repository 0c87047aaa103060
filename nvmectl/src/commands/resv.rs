// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Reservation acquire/register/release/report.
//!
//! Per-operation failure policy: a device-reported status is printed and
//! becomes the exit code; an OS error becomes the exit code without extra
//! output. Unlike the other command families, these never abort through
//! the error reporter.

use super::parse_u32;
use super::parse_u64;
use super::parse_u8;
use crate::device::DeviceContext;
use crate::dump;
use crate::encode;
use crate::ioctl;
use crate::ioctl::CommandError;
use crate::render;
use nvme_defs::nvm;
use nvme_defs::nvm::NvmOpcode;
use std::io;
use std::path::PathBuf;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

fn report_outcome(name: &str, result: Result<u32, CommandError>) -> i32 {
    match result {
        Ok(_) => {
            println!("NVME Reservation {name} success");
            0
        }
        Err(CommandError::Device(status)) => {
            eprintln!("NVME IO command error:{:04x}", status.0);
            status.0 as i32
        }
        // Quiet by policy: the errno is the exit code.
        Err(err @ CommandError::Os(_)) => err.exit_code(),
    }
}

#[derive(clap::Args)]
pub struct ResvAcquireArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Namespace to act on; a block device reports its own.
    #[clap(long, short = 'n', value_parser = parse_u32, default_value = "0")]
    pub namespace_id: u32,
    /// Current reservation key.
    #[clap(long, short = 'c', value_parser = parse_u64, default_value = "0")]
    pub crkey: u64,
    /// Preempt reservation key.
    #[clap(long, short = 'p', value_parser = parse_u64, default_value = "0")]
    pub prkey: u64,
    /// Reservation type.
    #[clap(long, short = 't', value_parser = parse_u8, default_value = "0")]
    pub rtype: u8,
    /// Acquire action (0 acquire, 1 preempt, 2 preempt and abort).
    #[clap(long, short = 'a', value_parser = parse_u8, default_value = "0")]
    pub racqa: u8,
    /// Ignore existing key.
    #[clap(long, short = 'i')]
    pub iekey: bool,
}

pub fn acquire(args: &ResvAcquireArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    let nsid = dev.resolve_nsid(args.namespace_id)?;
    let fields = encode::resv_acquire(nsid, args.rtype, args.racqa, args.iekey)?;

    let mut payload = nvm::ReservationAcquire {
        crkey: args.crkey,
        prkey: args.prkey,
    };
    let result = ioctl::submit_io(
        dev.file(),
        NvmOpcode::RESERVATION_ACQUIRE,
        payload.as_mut_bytes(),
        &fields,
    );
    Ok(report_outcome("Acquire", result))
}

#[derive(clap::Args)]
pub struct ResvRegisterArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Namespace to act on; a block device reports its own.
    #[clap(long, short = 'n', value_parser = parse_u32, default_value = "0")]
    pub namespace_id: u32,
    /// Current reservation key.
    #[clap(long, short = 'c', value_parser = parse_u64, default_value = "0")]
    pub crkey: u64,
    /// New reservation key.
    #[clap(long, short = 'k', value_parser = parse_u64, default_value = "0")]
    pub nrkey: u64,
    /// Register action (0 register, 1 unregister, 2 replace).
    #[clap(long, short = 'r', value_parser = parse_u8, default_value = "0")]
    pub rrega: u8,
    /// Change the persist-through-power-loss state.
    #[clap(long, short = 'p', value_parser = parse_u8, default_value = "0")]
    pub cptpl: u8,
    /// Ignore existing key.
    #[clap(long, short = 'i', value_parser = parse_u8, default_value = "0")]
    pub iekey: u8,
}

pub fn register(args: &ResvRegisterArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    let nsid = dev.resolve_nsid(args.namespace_id)?;
    let fields = encode::resv_register(nsid, args.rrega, args.iekey, args.cptpl)?;

    let mut payload = nvm::ReservationRegister {
        crkey: args.crkey,
        nrkey: args.nrkey,
    };
    let result = ioctl::submit_io(
        dev.file(),
        NvmOpcode::RESERVATION_REGISTER,
        payload.as_mut_bytes(),
        &fields,
    );
    Ok(report_outcome("Register", result))
}

#[derive(clap::Args)]
pub struct ResvReleaseArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Namespace to act on; a block device reports its own.
    #[clap(long, short = 'n', value_parser = parse_u32, default_value = "0")]
    pub namespace_id: u32,
    /// Current reservation key.
    #[clap(long, short = 'c', value_parser = parse_u64, default_value = "0")]
    pub crkey: u64,
    /// Reservation type.
    #[clap(long, short = 't', value_parser = parse_u8, default_value = "0")]
    pub rtype: u8,
    /// Release action (0 release, 1 clear).
    #[clap(long, short = 'a', value_parser = parse_u8, default_value = "0")]
    pub rrela: u8,
    /// Ignore existing key.
    #[clap(long, short = 'i', value_parser = parse_u8, default_value = "0")]
    pub iekey: u8,
}

pub fn release(args: &ResvReleaseArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    let nsid = dev.resolve_nsid(args.namespace_id)?;
    let fields = encode::resv_release(nsid, args.rtype, args.rrela, args.iekey)?;

    let mut payload = nvm::ReservationRelease { crkey: args.crkey };
    let result = ioctl::submit_io(
        dev.file(),
        NvmOpcode::RESERVATION_RELEASE,
        payload.as_mut_bytes(),
        &fields,
    );
    Ok(report_outcome("Release", result))
}

#[derive(clap::Args)]
pub struct ResvReportArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Namespace to report on; a block device reports its own.
    #[clap(long, short = 'n', value_parser = parse_u32, default_value = "0")]
    pub namespace_id: u32,
    /// Requested report size in dwords, clamped to one page.
    #[clap(long, short = 'd', value_parser = parse_u32, default_value = "0")]
    pub numd: u32,
    /// Emit the raw report instead of decoded fields.
    #[clap(long, short = 'b')]
    pub raw_binary: bool,
}

pub fn report(args: &ResvReportArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    let nsid = dev.resolve_nsid(args.namespace_id)?;
    let (fields, len) = encode::resv_report(nsid, args.numd);

    let mut buf = ioctl::alloc_pages(len);
    let data = &mut buf.as_mut_bytes()[..len];
    match ioctl::submit_io(dev.file(), NvmOpcode::RESERVATION_REPORT, data, &fields) {
        Ok(_) => {
            let mut out = io::stdout().lock();
            if args.raw_binary {
                dump::raw(data, &mut out)?;
            } else {
                println!("NVME Reservation Report success");
                let status = nvm::ReservationStatus::read_from_prefix(&*data).unwrap().0;
                let registrants = read_registrants(&status, data);
                render::resv_status(&mut out, &status, &registrants)?;
            }
            Ok(0)
        }
        Err(CommandError::Device(status)) => {
            eprintln!("NVME IO command error:{:04x}", status.0);
            Ok(status.0 as i32)
        }
        Err(err @ CommandError::Os(_)) => Ok(err.exit_code()),
    }
}

/// Walks the registrant descriptors following the fixed header. The count
/// comes from `regctl`; descriptors that would run past the buffer are
/// dropped.
fn read_registrants(
    status: &nvm::ReservationStatus,
    data: &[u8],
) -> Vec<nvm::RegisteredController> {
    let count = status.regctl.get() as usize;
    let mut registrants = Vec::new();
    let mut source = size_of::<nvm::ReservationStatus>();
    let step = size_of::<nvm::RegisteredController>();
    for _ in 0..count {
        if source + step > data.len() {
            break;
        }
        let controller = nvm::RegisteredController::read_from_prefix(&data[source..])
            .unwrap()
            .0;
        registrants.push(controller);
        source += step;
    }
    registrants
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::FromZeros;

    #[test]
    fn registrant_walk_follows_regctl() {
        let mut data = vec![0u8; 4096];
        let mut status = nvm::ReservationStatus::new_zeroed();
        status.regctl.set(2);
        data[..size_of::<nvm::ReservationStatus>()].copy_from_slice(status.as_bytes());

        let mut reg = nvm::RegisteredController::new_zeroed();
        reg.cntlid = 7;
        reg.rkey = 0xdead;
        let base = size_of::<nvm::ReservationStatus>();
        let step = size_of::<nvm::RegisteredController>();
        data[base..base + step].copy_from_slice(reg.as_bytes());

        let registrants = read_registrants(&status, &data);
        assert_eq!(registrants.len(), 2);
        assert_eq!(registrants[0].cntlid, 7);
        assert_eq!(registrants[0].rkey, 0xdead);
        assert_eq!(registrants[1].cntlid, 0);
    }

    #[test]
    fn registrant_walk_never_leaves_the_buffer() {
        let mut status = nvm::ReservationStatus::new_zeroed();
        status.regctl.set(u16::MAX);
        // Header-sized buffer: the claimed count cannot be honored.
        let data = vec![0u8; size_of::<nvm::ReservationStatus>()];
        assert!(read_registrants(&status, &data).is_empty());
    }
}
