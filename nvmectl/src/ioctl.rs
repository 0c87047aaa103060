// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Linux NVMe passthrough ioctls and the tri-state submission contract.
//!
//! The kernel returns a negative value for an OS-level failure, zero for a
//! command that completed with SUCCESS status, and a positive completion
//! status code for a command that reached the device and failed. Callers
//! must branch on [`CommandError`], never on truthiness.

use nvme_defs::AdminOpcode;
use nvme_defs::Status;
use nvme_defs::nvm::NvmOpcode;
use std::fs;
use std::os::unix::io::AsRawFd;
use thiserror::Error;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

/// `struct nvme_passthru_cmd` from nvme_ioctl.h.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct PassthruCmd {
    pub opcode: u8,
    pub flags: u8,
    pub rsvd1: u16,
    pub nsid: u32,
    pub cdw2: u32,
    pub cdw3: u32,
    pub metadata: u64,
    pub addr: u64,
    pub metadata_len: u32,
    pub data_len: u32,
    pub cdw10: u32,
    pub cdw11: u32,
    pub cdw12: u32,
    pub cdw13: u32,
    pub cdw14: u32,
    pub cdw15: u32,
    pub timeout_ms: u32,
    pub result: u32,
}

/// `struct nvme_user_io` from nvme_ioctl.h.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct UserIo {
    pub opcode: u8,
    pub flags: u8,
    pub control: u16,
    pub nblocks: u16,
    pub rsvd: u16,
    pub metadata: u64,
    pub addr: u64,
    pub slba: u64,
    pub dsmgmt: u32,
    pub reftag: u32,
    pub apptag: u16,
    pub appmask: u16,
}

mod ioc {
    use nix::ioctl_none;
    use nix::ioctl_none_bad;
    use nix::ioctl_readwrite;
    use nix::ioctl_write_ptr;
    use nix::request_code_none;

    const NVME_IOC_MAGIC: u8 = b'N';

    // #define NVME_IOCTL_ID _IO('N', 0x40)
    ioctl_none!(nvme_ioctl_id, NVME_IOC_MAGIC, 0x40);

    // #define NVME_IOCTL_ADMIN_CMD _IOWR('N', 0x41, struct nvme_admin_cmd)
    ioctl_readwrite!(nvme_ioctl_admin_cmd, NVME_IOC_MAGIC, 0x41, super::PassthruCmd);

    // #define NVME_IOCTL_SUBMIT_IO _IOW('N', 0x42, struct nvme_user_io)
    ioctl_write_ptr!(nvme_ioctl_submit_io, NVME_IOC_MAGIC, 0x42, super::UserIo);

    // #define NVME_IOCTL_IO_CMD _IOWR('N', 0x43, struct nvme_passthru_cmd)
    ioctl_readwrite!(nvme_ioctl_io_cmd, NVME_IOC_MAGIC, 0x43, super::PassthruCmd);

    // #define BLKRRPART _IO(0x12, 95)
    const BLK_IOC_MAGIC: u8 = 0x12;
    ioctl_none_bad!(blk_reread_partitions, request_code_none!(BLK_IOC_MAGIC, 95));
}

/// A failed submission: either the command never reached the device, or the
/// device completed it with a non-success status.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("NVMe status: {}", .0.name())]
    Device(Status),
    #[error(transparent)]
    Os(#[from] nix::errno::Errno),
}

impl CommandError {
    /// Exit code for orchestrators that report the raw failure: the status
    /// code for device failures, the errno for OS failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Device(status) => status.0 as i32,
            CommandError::Os(errno) => *errno as i32,
        }
    }
}

/// Maps a non-negative ioctl return to the success/device-status half of
/// the contract. Negative returns never reach here; nix already converted
/// them to [`nix::errno::Errno`].
fn check_status(ret: i32) -> Result<(), CommandError> {
    if ret == 0 {
        Ok(())
    } else {
        Err(CommandError::Device(Status(ret as u16)))
    }
}

/// Which passthrough queue a [`PassthruCmd`] is submitted to.
#[derive(Debug, Copy, Clone)]
pub enum Queue {
    Admin,
    Io,
}

/// Command-specific fields of one submission; the opcode and data buffer
/// are supplied at the call site.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct CommandFields {
    pub nsid: u32,
    pub cdw2: u32,
    pub cdw3: u32,
    pub cdw10: u32,
    pub cdw11: u32,
    pub cdw12: u32,
    pub cdw13: u32,
    pub cdw14: u32,
    pub cdw15: u32,
    pub timeout_ms: u32,
}

fn submit(
    file: &fs::File,
    queue: Queue,
    opcode: u8,
    data: &mut [u8],
    fields: &CommandFields,
) -> Result<u32, CommandError> {
    let mut cmd = PassthruCmd {
        opcode,
        nsid: fields.nsid,
        cdw2: fields.cdw2,
        cdw3: fields.cdw3,
        addr: if data.is_empty() {
            0
        } else {
            data.as_mut_ptr() as u64
        },
        data_len: data.len() as u32,
        cdw10: fields.cdw10,
        cdw11: fields.cdw11,
        cdw12: fields.cdw12,
        cdw13: fields.cdw13,
        cdw14: fields.cdw14,
        cdw15: fields.cdw15,
        timeout_ms: fields.timeout_ms,
        result: !0,
        ..Default::default()
    };

    // SAFETY: The FD is owned by the corresponding File, and these IOCTLs
    //         are legal to call on any valid FD. The data buffer outlives
    //         the call and its length is passed alongside its address.
    let ret = unsafe {
        match queue {
            Queue::Admin => ioc::nvme_ioctl_admin_cmd(file.as_raw_fd(), &mut cmd),
            Queue::Io => ioc::nvme_ioctl_io_cmd(file.as_raw_fd(), &mut cmd),
        }
    }?;

    tracing::debug!(opcode, ret, result = cmd.result, "nvme passthru");
    check_status(ret)?;
    Ok(cmd.result)
}

/// Submits one admin command and returns its result dword.
pub fn submit_admin(
    file: &fs::File,
    opcode: AdminOpcode,
    data: &mut [u8],
    fields: &CommandFields,
) -> Result<u32, CommandError> {
    submit(file, Queue::Admin, opcode.0, data, fields)
}

/// Submits one NVM command and returns its result dword.
pub fn submit_io(
    file: &fs::File,
    opcode: NvmOpcode,
    data: &mut [u8],
    fields: &CommandFields,
) -> Result<u32, CommandError> {
    submit(file, Queue::Io, opcode.0, data, fields)
}

/// Submits a fully caller-specified passthrough command. The result dword
/// is written back into `cmd.result`.
pub fn submit_passthru(
    file: &fs::File,
    queue: Queue,
    cmd: &mut PassthruCmd,
) -> Result<u32, CommandError> {
    // SAFETY: See `submit`; the caller owns any buffers referenced by
    //         `cmd.addr`/`cmd.metadata` for the duration of the call.
    let ret = unsafe {
        match queue {
            Queue::Admin => ioc::nvme_ioctl_admin_cmd(file.as_raw_fd(), cmd),
            Queue::Io => ioc::nvme_ioctl_io_cmd(file.as_raw_fd(), cmd),
        }
    }?;

    tracing::debug!(opcode = cmd.opcode, ret, result = cmd.result, "nvme passthru");
    check_status(ret)?;
    Ok(cmd.result)
}

/// Submits a read/write/compare through the dedicated user-io interface.
pub fn submit_user_io(file: &fs::File, io: &UserIo) -> Result<(), CommandError> {
    // SAFETY: The FD is owned by the corresponding File; the data buffer
    //         referenced by `io.addr` outlives the call.
    let ret = unsafe { ioc::nvme_ioctl_submit_io(file.as_raw_fd(), io) }?;

    tracing::debug!(opcode = io.opcode, ret, "nvme user io");
    check_status(ret)
}

/// Queries the namespace id implied by an open block-device handle.
pub fn query_namespace_id(file: &fs::File) -> Result<u32, CommandError> {
    // SAFETY: The FD is owned by the corresponding File; this IOCTL takes
    //         no argument and returns the namespace id.
    let ret = unsafe { ioc::nvme_ioctl_id(file.as_raw_fd()) }?;
    if ret <= 0 {
        return Err(nix::errno::Errno::ENODEV.into());
    }
    Ok(ret as u32)
}

/// Asks the kernel to re-read the partition table after a format.
pub fn reread_partitions(file: &fs::File) -> Result<(), nix::errno::Errno> {
    // SAFETY: The FD is owned by the corresponding File, and this IOCTL is
    //         legal to call on any block device FD.
    unsafe { ioc::blk_reread_partitions(file.as_raw_fd()) }?;
    Ok(())
}

pub const PAGE_SIZE: usize = 4096;

/// Page-sized, page-aligned building block for DMA-targeted buffers.
#[repr(C, align(4096))]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct Page(pub [u8; PAGE_SIZE]);

pub const ZERO_PAGE: Page = Page([0; PAGE_SIZE]);

/// Allocates a zeroed, page-aligned buffer of at least `len` bytes.
pub fn alloc_pages(len: usize) -> Vec<Page> {
    vec![ZERO_PAGE; len.div_ceil(PAGE_SIZE).max(1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_success_not_error() {
        assert_eq!(check_status(0), Ok(()));
    }

    #[test]
    fn positive_is_device_status_not_success() {
        assert_eq!(
            check_status(0x286),
            Err(CommandError::Device(Status::ACCESS_DENIED))
        );
        assert_eq!(
            check_status(0x82),
            Err(CommandError::Device(Status::NS_NOT_READY))
        );
    }

    #[test]
    fn os_errors_never_reach_the_status_taxonomy() {
        // A negative ioctl return surfaces as an errno, classified apart
        // from any device status.
        let err = CommandError::from(nix::errno::Errno::EFAULT);
        assert!(matches!(err, CommandError::Os(_)));
        assert_eq!(err.exit_code(), nix::errno::Errno::EFAULT as i32);
    }

    #[test]
    fn device_status_exit_code_is_the_code() {
        let err = CommandError::Device(Status(0x107));
        assert_eq!(err.exit_code(), 0x107);
        assert_eq!(err.to_string(), "NVMe status: FIRMWARE_IMAGE");
    }

    #[test]
    fn page_buffers_are_aligned_and_sized() {
        let pages = alloc_pages(5000);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages.as_ptr() as usize % PAGE_SIZE, 0);
        let pages = alloc_pages(0);
        assert_eq!(pages.len(), 1);
    }
}
