// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Generic admin/io passthrough: every descriptor field comes from the
//! caller, with only the data-direction rule enforced.

use super::parse_u16;
use super::parse_u32;
use super::parse_u8;
use crate::device::DeviceContext;
use crate::dump;
use crate::encode;
use crate::ioctl;
use crate::ioctl::CommandError;
use crate::ioctl::PassthruCmd;
use crate::ioctl::Queue;
use anyhow::Context;
use std::fs;
use std::io;
use std::io::Read;
use std::path::PathBuf;
use zerocopy::IntoBytes;

#[derive(clap::Args)]
pub struct PassthruArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Command opcode.
    #[clap(long, short = 'o', value_parser = parse_u8, default_value = "0")]
    pub opcode: u8,
    /// Command flags.
    #[clap(long, short = 'f', value_parser = parse_u8, default_value = "0")]
    pub flags: u8,
    /// Reserved field value.
    #[clap(long, short = 'R', value_parser = parse_u16, default_value = "0")]
    pub rsvd: u16,
    /// Namespace id.
    #[clap(long, short = 'n', value_parser = parse_u32, default_value = "0")]
    pub namespace_id: u32,
    /// Data buffer length.
    #[clap(long, short = 'l', value_parser = parse_u32, default_value = "0")]
    pub data_len: u32,
    /// Metadata buffer length.
    #[clap(long, short = 'm', value_parser = parse_u32, default_value = "0")]
    pub metadata_len: u32,
    /// Command timeout in milliseconds.
    #[clap(long, short = 't', value_parser = parse_u32, default_value = "0")]
    pub timeout: u32,
    #[clap(long = "cdw2", value_parser = parse_u32, default_value = "0")]
    pub cdw2: u32,
    #[clap(long = "cdw3", value_parser = parse_u32, default_value = "0")]
    pub cdw3: u32,
    #[clap(long = "cdw10", value_parser = parse_u32, default_value = "0")]
    pub cdw10: u32,
    #[clap(long = "cdw11", value_parser = parse_u32, default_value = "0")]
    pub cdw11: u32,
    #[clap(long = "cdw12", value_parser = parse_u32, default_value = "0")]
    pub cdw12: u32,
    #[clap(long = "cdw13", value_parser = parse_u32, default_value = "0")]
    pub cdw13: u32,
    #[clap(long = "cdw14", value_parser = parse_u32, default_value = "0")]
    pub cdw14: u32,
    #[clap(long = "cdw15", value_parser = parse_u32, default_value = "0")]
    pub cdw15: u32,
    /// The command reads data from the controller.
    #[clap(long, short = 'r')]
    pub read: bool,
    /// The command writes data to the controller.
    #[clap(long, short = 'w')]
    pub write: bool,
    /// File supplying the write payload; defaults to stdin.
    #[clap(long, short = 'i')]
    pub input_file: Option<PathBuf>,
    /// Emit read data raw instead of a hex table.
    #[clap(long, short = 'b')]
    pub raw_binary: bool,
    /// Print the descriptor before submitting.
    #[clap(long, short = 's')]
    pub show_command: bool,
    /// Print the descriptor and stop without submitting.
    #[clap(long, short = 'd')]
    pub dry_run: bool,
}

fn show_cmd(cmd: &PassthruCmd) {
    println!("opcode       : {:02x}", cmd.opcode);
    println!("flags        : {:02x}", cmd.flags);
    println!("rsvd1        : {:04x}", cmd.rsvd1);
    println!("nsid         : {:08x}", cmd.nsid);
    println!("cdw2         : {:08x}", cmd.cdw2);
    println!("cdw3         : {:08x}", cmd.cdw3);
    println!("data_len     : {:08x}", cmd.data_len);
    println!("metadata_len : {:08x}", cmd.metadata_len);
    println!("addr         : {:x}", cmd.addr);
    println!("metadata     : {:x}", cmd.metadata);
    println!("cdw10        : {:08x}", cmd.cdw10);
    println!("cdw11        : {:08x}", cmd.cdw11);
    println!("cdw12        : {:08x}", cmd.cdw12);
    println!("cdw13        : {:08x}", cmd.cdw13);
    println!("cdw14        : {:08x}", cmd.cdw14);
    println!("cdw15        : {:08x}", cmd.cdw15);
    println!("timeout_ms   : {:08x}", cmd.timeout_ms);
}

fn passthru(queue: Queue, args: &PassthruArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    encode::check_direction(args.data_len != 0, args.read, args.write)?;

    let data_len = args.data_len as usize;
    let mut data_buf = ioctl::alloc_pages(data_len);
    let data = &mut data_buf.as_mut_bytes()[..data_len];
    let metadata_len = args.metadata_len as usize;
    let mut metadata_buf = ioctl::alloc_pages(metadata_len);
    let metadata = &mut metadata_buf.as_mut_bytes()[..metadata_len];

    if args.write && !data.is_empty() {
        match &args.input_file {
            Some(path) => fs::File::open(path)
                .and_then(|mut f| f.read_exact(data))
                .with_context(|| format!("failed to read write buffer from {}", path.display()))?,
            None => io::stdin()
                .read_exact(data)
                .context("failed to read write buffer from stdin")?,
        }
    }

    let mut cmd = PassthruCmd {
        opcode: args.opcode,
        flags: args.flags,
        rsvd1: args.rsvd,
        nsid: args.namespace_id,
        cdw2: args.cdw2,
        cdw3: args.cdw3,
        metadata: if metadata.is_empty() {
            0
        } else {
            metadata.as_mut_ptr() as u64
        },
        addr: if data.is_empty() {
            0
        } else {
            data.as_mut_ptr() as u64
        },
        metadata_len: args.metadata_len,
        data_len: args.data_len,
        cdw10: args.cdw10,
        cdw11: args.cdw11,
        cdw12: args.cdw12,
        cdw13: args.cdw13,
        cdw14: args.cdw14,
        cdw15: args.cdw15,
        timeout_ms: args.timeout,
        result: !0,
    };

    if args.show_command || args.dry_run {
        show_cmd(&cmd);
        if args.dry_run {
            return Ok(0);
        }
    }

    match ioctl::submit_passthru(dev.file(), queue, &mut cmd) {
        Ok(result) => {
            let mut out = io::stdout().lock();
            if args.raw_binary {
                if args.read && !data.is_empty() {
                    dump::raw(data, &mut out)?;
                }
            } else {
                println!("NVMe Status:SUCCESS Command Result:{result:08x}");
                if args.read && !data.is_empty() {
                    dump::hex(data, &mut out)?;
                }
            }
            Ok(0)
        }
        Err(CommandError::Device(status)) => {
            println!(
                "NVMe Status:{} Command Result:{:08x}",
                status.name(),
                cmd.result
            );
            Ok(status.0 as i32)
        }
        Err(CommandError::Os(errno)) => Err(anyhow::Error::new(errno).context("passthru ioctl")),
    }
}

pub fn admin(args: &PassthruArgs) -> anyhow::Result<i32> {
    passthru(Queue::Admin, args)
}

pub fn io(args: &PassthruArgs) -> anyhow::Result<i32> {
    passthru(Queue::Io, args)
}
