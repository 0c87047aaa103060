// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Wire-format definitions for the NVM Express admin command set, as used by
//! the Linux passthrough interface.
//!
//! Layouts follow NVM Express Base 1.4 and stay byte-compatible with older
//! controllers, which zero-fill fields they do not implement.

#![no_std]

pub mod nvm;

mod macros;

use bitfield_struct::bitfield;
use macros::open_enum;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

type U16LE = zerocopy::U16<zerocopy::LE>;
type U64LE = zerocopy::U64<zerocopy::LE>;
type U128LE = zerocopy::U128<zerocopy::LE>;

/// Snapshot of the controller register bank at the start of BAR0.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct RegisterBank {
    pub cap: u64,
    pub vs: u32,
    pub intms: u32,
    pub intmc: u32,
    pub cc: u32,
    pub rsvd: u32,
    pub csts: u32,
    pub nssr: u32,
    pub aqa: u32,
    pub asq: u64,
    pub acq: u64,
    pub cmbloc: u32,
    pub cmbsz: u32,
}

const _: () = assert!(size_of::<RegisterBank>() == 64);

open_enum! {
    pub enum AdminOpcode: u8 {
        GET_LOG_PAGE = 0x02,
        IDENTIFY = 0x06,
        SET_FEATURES = 0x09,
        GET_FEATURES = 0x0a,
        FIRMWARE_COMMIT = 0x10,
        FIRMWARE_IMAGE_DOWNLOAD = 0x11,
        FORMAT_NVM = 0x80,
        SECURITY_SEND = 0x81,
        SECURITY_RECEIVE = 0x82,
    }
}

open_enum! {
    /// Completion status codes: the status code type in bits 9:8 and the
    /// status code in bits 7:0.
    pub enum Status: u16 {
        SUCCESS = 0x0,
        INVALID_OPCODE = 0x1,
        INVALID_FIELD = 0x2,
        CMDID_CONFLICT = 0x3,
        DATA_XFER_ERROR = 0x4,
        POWER_LOSS = 0x5,
        INTERNAL = 0x6,
        ABORT_REQ = 0x7,
        ABORT_QUEUE = 0x8,
        FUSED_FAIL = 0x9,
        FUSED_MISSING = 0xa,
        INVALID_NS = 0xb,
        CMD_SEQ_ERROR = 0xc,

        LBA_RANGE = 0x80,
        CAP_EXCEEDED = 0x81,
        NS_NOT_READY = 0x82,

        CQ_INVALID = 0x100,
        QID_INVALID = 0x101,
        QUEUE_SIZE = 0x102,
        ABORT_LIMIT = 0x103,
        ABORT_MISSING = 0x104,
        ASYNC_LIMIT = 0x105,
        FIRMWARE_SLOT = 0x106,
        FIRMWARE_IMAGE = 0x107,
        INVALID_VECTOR = 0x108,
        INVALID_LOG_PAGE = 0x109,
        INVALID_FORMAT = 0x10a,

        BAD_ATTRIBUTES = 0x180,

        WRITE_FAULT = 0x280,
        READ_ERROR = 0x281,
        GUARD_CHECK = 0x282,
        APPTAG_CHECK = 0x283,
        REFTAG_CHECK = 0x284,
        COMPARE_FAILED = 0x285,
        ACCESS_DENIED = 0x286,
    }
}

impl Status {
    /// Only the low ten bits carry the status code; the kernel returns the
    /// completion status field with phase and retry bits stripped, but mask
    /// anyway so every input maps somewhere.
    pub const CODE_MASK: u16 = 0x3ff;

    /// Symbolic name for diagnostics. Total over all inputs; codes outside
    /// the table render as "Unknown".
    pub fn name(self) -> &'static str {
        match Self(self.0 & Self::CODE_MASK) {
            Self::SUCCESS => "SUCCESS",
            Self::INVALID_OPCODE => "INVALID_OPCODE",
            Self::INVALID_FIELD => "INVALID_FIELD",
            Self::CMDID_CONFLICT => "CMDID_CONFLICT",
            Self::DATA_XFER_ERROR => "DATA_XFER_ERROR",
            Self::POWER_LOSS => "POWER_LOSS",
            Self::INTERNAL => "INTERNAL",
            Self::ABORT_REQ => "ABORT_REQ",
            Self::ABORT_QUEUE => "ABORT_QUEUE",
            Self::FUSED_FAIL => "FUSED_FAIL",
            Self::FUSED_MISSING => "FUSED_MISSING",
            Self::INVALID_NS => "INVALID_NS",
            Self::CMD_SEQ_ERROR => "CMD_SEQ_ERROR",
            Self::LBA_RANGE => "LBA_RANGE",
            Self::CAP_EXCEEDED => "CAP_EXCEEDED",
            Self::NS_NOT_READY => "NS_NOT_READY",
            Self::CQ_INVALID => "CQ_INVALID",
            Self::QID_INVALID => "QID_INVALID",
            Self::QUEUE_SIZE => "QUEUE_SIZE",
            Self::ABORT_LIMIT => "ABORT_LIMIT",
            Self::ABORT_MISSING => "ABORT_MISSING",
            Self::ASYNC_LIMIT => "ASYNC_LIMIT",
            Self::FIRMWARE_SLOT => "FIRMWARE_SLOT",
            Self::FIRMWARE_IMAGE => "FIRMWARE_IMAGE",
            Self::INVALID_VECTOR => "INVALID_VECTOR",
            Self::INVALID_LOG_PAGE => "INVALID_LOG_PAGE",
            Self::INVALID_FORMAT => "INVALID_FORMAT",
            Self::BAD_ATTRIBUTES => "BAD_ATTRIBUTES",
            Self::WRITE_FAULT => "WRITE_FAULT",
            Self::READ_ERROR => "READ_ERROR",
            Self::GUARD_CHECK => "GUARD_CHECK",
            Self::APPTAG_CHECK => "APPTAG_CHECK",
            Self::REFTAG_CHECK => "REFTAG_CHECK",
            Self::COMPARE_FAILED => "COMPARE_FAILED",
            Self::ACCESS_DENIED => "ACCESS_DENIED",
            _ => "Unknown",
        }
    }
}

// Identify

#[bitfield(u32)]
pub struct Cdw10Identify {
    pub cns: u8,
    pub rsvd: u8,
    pub cntid: u16,
}

open_enum! {
    pub enum Cns: u8 {
        NAMESPACE = 0x0,
        CONTROLLER = 0x1,
        ACTIVE_NAMESPACES = 0x2,
    }
}

// Get Log Page

#[bitfield(u32)]
pub struct Cdw10GetLogPage {
    /// Log page identifier
    pub lid: u8,
    #[bits(7)]
    pub lsp: u8,
    /// Retain asynchronous event
    pub rae: bool,
    /// Number of dwords, zero based (low 16 bits)
    pub numdl_z: u16,
}

open_enum! {
    pub enum LogPage: u8 {
        ERROR_INFORMATION = 0x1,
        HEALTH_INFORMATION = 0x2,
        FIRMWARE_SLOT_INFORMATION = 0x3,
    }
}

// Features

#[bitfield(u32)]
pub struct Cdw10GetFeatures {
    pub fid: u8,
    #[bits(3)]
    pub sel: u8,
    #[bits(21)]
    _rsvd: u32,
}

#[bitfield(u32)]
pub struct Cdw10SetFeatures {
    pub fid: u8,
    #[bits(23)]
    _rsvd: u32,
    pub save: bool,
}

open_enum! {
    pub enum Feature: u8 {
        ARBITRATION = 0x01,
        POWER_MANAGEMENT = 0x02,
        LBA_RANGE = 0x03,
        TEMPERATURE_THRESHOLD = 0x04,
        ERROR_RECOVERY = 0x05,
        VOLATILE_WRITE_CACHE = 0x06,
        NUMBER_OF_QUEUES = 0x07,
        INTERRUPT_COALESCING = 0x08,
        INTERRUPT_VECTOR_CONFIG = 0x09,
        WRITE_ATOMICITY = 0x0a,
        ASYNC_EVENT_CONFIG = 0x0b,
        SOFTWARE_PROGRESS_MARKER = 0x80,
    }
}

// Format NVM

#[bitfield(u32)]
pub struct Cdw10Format {
    /// LBA format index
    #[bits(4)]
    pub lbaf: u8,
    /// Metadata transferred inband
    pub mset: bool,
    /// Protection information type
    #[bits(3)]
    pub pi: u8,
    /// Protection information in the first eight metadata bytes
    pub pil: bool,
    /// Secure erase settings
    #[bits(3)]
    pub ses: u8,
    #[bits(20)]
    _rsvd: u32,
}

// Firmware

#[bitfield(u32)]
pub struct Cdw10FirmwareCommit {
    /// Firmware slot
    #[bits(3)]
    pub fs: u8,
    /// Commit action
    #[bits(2)]
    pub ca: u8,
    #[bits(27)]
    _rsvd: u32,
}

#[bitfield(u32)]
pub struct Cdw10FirmwareDownload {
    /// Number of dwords in this portion, zero based.
    pub numd_z: u32,
}

#[bitfield(u32)]
pub struct Cdw11FirmwareDownload {
    /// Offset of this portion, in dwords.
    pub ofst: u32,
}

// Security Send / Security Receive

#[bitfield(u32)]
pub struct Cdw10SecurityProtocol {
    pub nssf: u8,
    /// Security protocol specific field
    pub spsp: u16,
    /// Security protocol
    pub secp: u8,
}

/// Identify Controller data structure (CNS 01h), one page.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct IdentifyController {
    pub vid: u16,
    pub ssvid: u16,
    /// Serial number, ASCII, space padded.
    pub sn: [u8; 20],
    /// Model number, ASCII, space padded.
    pub mn: [u8; 40],
    /// Firmware revision, ASCII, space padded.
    pub fr: [u8; 8],
    pub rab: u8,
    pub ieee: [u8; 3],
    pub cmic: u8,
    /// Maximum data transfer size (in minimum page size units, as power of
    /// two).
    pub mdts: u8,
    pub cntlid: u16,
    pub ver: u32,
    pub rtd3r: u32,
    pub rtd3e: u32,
    pub oaes: u32,
    pub ctratt: u32,
    pub rrls: u16,
    pub rsvd1: [u8; 9],
    pub cntrltype: u8,
    pub fguid: [u8; 16],
    pub crdt1: u16,
    pub crdt2: u16,
    pub crdt3: u16,
    pub rsvd2: [u8; 122],
    pub oacs: u16,
    pub acl: u8,
    pub aerl: u8,
    pub frmw: u8,
    pub lpa: u8,
    pub elpe: u8,
    pub npss: u8,
    pub avscc: u8,
    pub apsta: u8,
    pub wctemp: u16,
    pub cctemp: u16,
    pub mtfa: u16,
    pub hmpre: u32,
    pub hmmin: u32,
    pub tnvmcap: U128LE,
    pub unvmcap: U128LE,
    pub rpmbs: u32,
    pub edstt: u16,
    pub dsto: u8,
    pub fwug: u8,
    pub kas: u16,
    pub hctma: u16,
    pub mntmt: u16,
    pub mxtmt: u16,
    pub sanicap: u32,
    pub rsvd3: [u8; 180],
    pub sqes: u8,
    pub cqes: u8,
    pub maxcmd: u16,
    pub nn: u32,
    pub oncs: u16,
    pub fuses: u16,
    pub fna: u8,
    pub vwc: u8,
    pub awun: u16,
    pub awupf: u16,
    pub icsvscc: u8,
    pub nwpc: u8,
    pub acwu: u16,
    pub rsvd4: [u8; 2],
    pub sgls: u32,
    pub mnan: u32,
    pub rsvd5: [u8; 224],
    pub subnqn: [u8; 256],
    pub rsvd6: [u8; 1024],
    /// Power state descriptors 0..=npss.
    pub psd: [PowerState; 32],
    /// Vendor specific region, opaque.
    pub vs: [u8; 1024],
}

const _: () = assert!(size_of::<IdentifyController>() == 4096);

impl IdentifyController {
    /// Power state descriptors declared by the controller; `npss` is zero
    /// based.
    pub fn power_states(&self) -> &[PowerState] {
        &self.psd[..(self.npss as usize + 1).min(self.psd.len())]
    }
}

/// Power state descriptor, 32 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct PowerState {
    /// Maximum power, centiwatts.
    pub mp: u16,
    pub rsvd1: u8,
    pub flags: u8,
    pub enlat: u32,
    pub exlat: u32,
    pub rrt: u8,
    pub rrl: u8,
    pub rwt: u8,
    pub rwl: u8,
    pub idlp: u16,
    pub ips: u8,
    pub rsvd2: u8,
    pub actp: u16,
    pub apws: u8,
    pub rsvd3: [u8; 9],
}

const _: () = assert!(size_of::<PowerState>() == 32);

/// SMART / Health Information log page (LID 02h).
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct SmartLog {
    pub critical_warning: u8,
    /// Composite temperature, Kelvin.
    pub temperature: U16LE,
    pub avail_spare: u8,
    pub spare_thresh: u8,
    pub percent_used: u8,
    pub rsvd1: [u8; 26],
    pub data_units_read: [u8; 16],
    pub data_units_written: [u8; 16],
    pub host_reads: [u8; 16],
    pub host_writes: [u8; 16],
    pub ctrl_busy_time: [u8; 16],
    pub power_cycles: [u8; 16],
    pub power_on_hours: [u8; 16],
    pub unsafe_shutdowns: [u8; 16],
    pub media_errors: [u8; 16],
    pub num_err_log_entries: [u8; 16],
    pub rsvd2: [u8; 320],
}

const _: () = assert!(size_of::<SmartLog>() == 512);

/// Firmware Slot Information log page (LID 03h).
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct FirmwareLog {
    /// Active firmware info: active slot in bits 2:0, next-reset slot in
    /// bits 6:4.
    pub afi: u8,
    pub rsvd1: [u8; 7],
    /// Firmware revision per slot, eight ASCII bytes each.
    pub frs: [U64LE; 7],
    pub rsvd2: [u8; 448],
}

const _: () = assert!(size_of::<FirmwareLog>() == 512);

/// One Error Information log entry (LID 01h), 64 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ErrorLogEntry {
    pub error_count: u64,
    pub sqid: u16,
    pub cmdid: u16,
    pub status_field: u16,
    pub parm_error_location: u16,
    pub lba: u64,
    pub nsid: u32,
    pub vs: u8,
    pub rsvd: [u8; 35],
}

const _: () = assert!(size_of::<ErrorLogEntry>() == 64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_are_total() {
        for code in 0..=u16::MAX {
            // Must never panic, whatever the device returns.
            let _ = Status(code).name();
        }
        assert_eq!(Status(0x3ff).name(), "Unknown");
        assert_eq!(Status(0x187).name(), "Unknown");
    }

    #[test]
    fn status_names_match_table() {
        assert_eq!(Status::SUCCESS.name(), "SUCCESS");
        assert_eq!(Status(0x1).name(), "INVALID_OPCODE");
        assert_eq!(Status(0x82).name(), "NS_NOT_READY");
        assert_eq!(Status(0x107).name(), "FIRMWARE_IMAGE");
        assert_eq!(Status(0x285).name(), "COMPARE_FAILED");
        assert_eq!(Status(0x286).name(), "ACCESS_DENIED");
        // High bits beyond the code are ignored.
        assert_eq!(Status(0x8285).name(), "COMPARE_FAILED");
    }

    #[test]
    fn format_cdw10_field_offsets() {
        let cdw10: u32 = Cdw10Format::new()
            .with_lbaf(5)
            .with_mset(true)
            .with_pi(3)
            .with_pil(true)
            .with_ses(2)
            .into();
        assert_eq!(cdw10, 5 | 1 << 4 | 3 << 5 | 1 << 8 | 2 << 9);
    }

    #[test]
    fn firmware_commit_cdw10_field_offsets() {
        let cdw10: u32 = Cdw10FirmwareCommit::new().with_fs(7).with_ca(2).into();
        assert_eq!(cdw10, 7 | 2 << 3);
    }

    #[test]
    fn security_cdw10_field_offsets() {
        let cdw10: u32 = Cdw10SecurityProtocol::new()
            .with_secp(0xea)
            .with_spsp(0x0102)
            .into();
        assert_eq!(cdw10, 0xea << 24 | 0x0102 << 8);
    }

    #[test]
    fn get_log_page_cdw10_field_offsets() {
        let cdw10: u32 = Cdw10GetLogPage::new()
            .with_lid(LogPage::HEALTH_INFORMATION.0)
            .with_numdl_z((512 / 4 - 1) as u16)
            .into();
        assert_eq!(cdw10, 0x2 | (512 / 4 - 1) << 16);
    }

    #[test]
    fn get_features_cdw10_field_offsets() {
        let cdw10: u32 = Cdw10GetFeatures::new()
            .with_fid(Feature::LBA_RANGE.0)
            .with_sel(4)
            .into();
        assert_eq!(cdw10, 4 << 8 | 3);
    }
}
