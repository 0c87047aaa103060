// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! NVM command set definitions: namespace identify data, I/O control
//! fields, and reservations.

use crate::U128LE;
use crate::macros::open_enum;
use bitfield_struct::bitfield;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::LE;
use zerocopy::U16;

open_enum! {
    pub enum NvmOpcode: u8 {
        FLUSH = 0x00,
        WRITE = 0x01,
        READ = 0x02,
        COMPARE = 0x05,

        RESERVATION_REGISTER = 0x0d,
        RESERVATION_REPORT = 0x0e,
        RESERVATION_ACQUIRE = 0x11,
        RESERVATION_RELEASE = 0x15,
    }
}

/// Control word of a read/write/compare submission (the high half of
/// cdw12).
#[bitfield(u16)]
pub struct IoControl {
    #[bits(10)]
    _rsvd: u16,
    /// Protection information check/strip flags
    #[bits(4)]
    pub prinfo: u8,
    /// Force unit access
    pub fua: bool,
    /// Limited retry
    pub lr: bool,
}

/// Identify Namespace data structure (CNS 00h), one page.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct IdentifyNamespace {
    pub nsze: u64,
    pub ncap: u64,
    pub nuse: u64,
    pub nsfeat: u8,
    /// Number of LBA formats. Zero based.
    pub nlbaf: u8,
    pub flbas: Flbas,
    pub mc: u8,
    pub dpc: u8,
    pub dps: u8,
    pub nmic: u8,
    pub rescap: u8,
    pub fpi: u8,
    pub dlfeat: u8,
    pub nawun: u16,
    pub nawupf: u16,
    pub nacwu: u16,
    pub nabsn: u16,
    pub nabo: u16,
    pub nabspf: u16,
    pub noiob: u16,
    pub nvmcap: U128LE,
    pub npwg: u16,
    pub npwa: u16,
    pub npdg: u16,
    pub npda: u16,
    pub nows: u16,
    pub mssrl: u16,
    pub mcl: u32,
    pub msrc: u8,
    pub rsvd1: [u8; 11],
    pub anagrpid: u32,
    pub rsvd2: [u8; 3],
    pub nsattr: u8,
    pub nvmsetid: u16,
    pub endgid: u16,
    pub nguid: [u8; 16],
    pub eui64: [u8; 8],
    pub lbaf: [Lbaf; 16],
    pub rsvd3: [u8; 192],
    /// Vendor specific region, opaque.
    pub vs: [u8; 3712],
}

const _: () = assert!(size_of::<IdentifyNamespace>() == 4096);

impl IdentifyNamespace {
    /// LBA formats declared by the namespace. The bound comes from the
    /// zero-based `nlbaf` count, never from the fixed table size.
    pub fn formats(&self) -> &[Lbaf] {
        &self.lbaf[..(self.nlbaf as usize + 1).min(self.lbaf.len())]
    }
}

/// LBA format descriptor.
#[bitfield(u32)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct Lbaf {
    /// Metadata size
    pub ms: u16,
    /// LBA data size (as power of two)
    pub lbads: u8,
    /// Relative performance
    #[bits(2)]
    pub rp: u8,
    #[bits(6)]
    _rsvd: u8,
}

/// Formatted LBA size
#[bitfield(u8)]
#[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct Flbas {
    #[bits(4)]
    pub low_index: u8,
    pub inband_metadata: bool,
    #[bits(3)]
    _rsvd: u8,
}

/// LBA Range Type feature entry (FID 03h), 64 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct LbaRangeType {
    pub range_type: u8,
    pub attributes: u8,
    pub rsvd1: [u8; 14],
    pub slba: u64,
    pub nlb: u64,
    pub guid: [u8; 16],
    pub rsvd2: [u8; 16],
}

const _: () = assert!(size_of::<LbaRangeType>() == 64);

// Reservations

#[bitfield(u32)]
pub struct Cdw10ReservationRegister {
    /// Reservation register action
    #[bits(3)]
    pub rrega: u8,
    /// Ignore existing key
    pub iekey: bool,
    #[bits(26)]
    _rsvd: u32,
    /// Change "persist through power loss" state
    #[bits(2)]
    pub cptpl: u8,
}

open_enum! {
    pub enum ReservationRegisterAction: u8 {
        REGISTER = 0,
        UNREGISTER = 1,
        REPLACE = 2,
    }
}

/// Reservation Register payload.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ReservationRegister {
    /// Current reservation key
    pub crkey: u64,
    /// New reservation key
    pub nrkey: u64,
}

#[bitfield(u32)]
pub struct Cdw10ReservationAcquire {
    /// Reservation acquire action
    #[bits(3)]
    pub racqa: u8,
    /// Ignore existing key
    pub iekey: bool,
    #[bits(4)]
    _rsvd: u8,
    pub rtype: u8,
    _rsvd2: u16,
}

open_enum! {
    pub enum ReservationAcquireAction: u8 {
        ACQUIRE = 0,
        PREEMPT = 1,
        PREEMPT_AND_ABORT = 2,
    }
}

open_enum! {
    #[derive(IntoBytes, Immutable, KnownLayout, FromBytes)]
    pub enum ReservationType: u8 {
        WRITE_EXCLUSIVE = 1,
        EXCLUSIVE_ACCESS = 2,
        WRITE_EXCLUSIVE_REGISTRANTS_ONLY = 3,
        EXCLUSIVE_ACCESS_REGISTRANTS_ONLY = 4,
        WRITE_EXCLUSIVE_ALL_REGISTRANTS = 5,
        EXCLUSIVE_ACCESS_ALL_REGISTRANTS = 6,
    }
}

/// Reservation Acquire payload.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ReservationAcquire {
    /// Current reservation key
    pub crkey: u64,
    /// Preempt reservation key
    pub prkey: u64,
}

#[bitfield(u32)]
pub struct Cdw10ReservationRelease {
    /// Reservation release action
    #[bits(3)]
    pub rrela: u8,
    /// Ignore existing key
    pub iekey: bool,
    #[bits(4)]
    _rsvd: u8,
    pub rtype: u8,
    _rsvd2: u16,
}

open_enum! {
    pub enum ReservationReleaseAction: u8 {
        RELEASE = 0,
        CLEAR = 1,
    }
}

/// Reservation Release payload.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ReservationRelease {
    /// Current reservation key
    pub crkey: u64,
}

#[bitfield(u32)]
pub struct Cdw10ReservationReport {
    /// Number of report dwords, zero based.
    pub numd_z: u32,
}

/// Reservation Status header. Followed on the wire by `regctl` registrant
/// descriptors.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct ReservationStatus {
    /// Generation
    pub generation: u32,
    /// Reservation type
    pub rtype: ReservationType,
    /// Number of registered controllers. Unaligned 16-bit little-endian
    /// field split across bytes 5 and 6.
    pub regctl: U16<LE>,
    pub rsvd1: [u8; 2],
    /// Persist through power loss state
    pub ptpls: u8,
    pub rsvd2: [u8; 14],
}

const _: () = assert!(size_of::<ReservationStatus>() == 24);

/// One registrant descriptor in a Reservation Status payload.
#[repr(C)]
#[derive(Debug, Copy, Clone, IntoBytes, Immutable, KnownLayout, FromBytes)]
pub struct RegisteredController {
    /// Controller ID
    pub cntlid: u16,
    /// Reservation status: bit 0 set if this registrant holds the
    /// reservation.
    pub rcsts: u8,
    pub rsvd: [u8; 5],
    /// Host ID
    pub hostid: [u8; 8],
    /// Reservation key
    pub rkey: u64,
}

const _: () = assert!(size_of::<RegisteredController>() == 24);

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::FromZeros;

    #[test]
    fn identify_namespace_format_count_follows_nlbaf() {
        let mut ns = IdentifyNamespace::new_zeroed();
        ns.nlbaf = 3;
        // Populate an entry past the declared count; it must not be
        // returned.
        ns.lbaf[7] = Lbaf::new().with_lbads(12);
        assert_eq!(ns.formats().len(), 4);

        ns.nlbaf = 0;
        assert_eq!(ns.formats().len(), 1);

        // A corrupt count cannot run past the table.
        ns.nlbaf = 0xff;
        assert_eq!(ns.formats().len(), 16);
    }

    #[test]
    fn reservation_register_cdw10_field_offsets() {
        let cdw10: u32 = Cdw10ReservationRegister::new()
            .with_rrega(ReservationRegisterAction::REPLACE.0)
            .with_iekey(true)
            .with_cptpl(3)
            .into();
        assert_eq!(cdw10, 2 | 1 << 3 | 3 << 30);
    }

    #[test]
    fn reservation_acquire_cdw10_field_offsets() {
        let cdw10: u32 = Cdw10ReservationAcquire::new()
            .with_racqa(ReservationAcquireAction::PREEMPT.0)
            .with_iekey(true)
            .with_rtype(ReservationType::EXCLUSIVE_ACCESS.0)
            .into();
        assert_eq!(cdw10, 1 | 1 << 3 | 2 << 8);
    }

    #[test]
    fn io_control_field_offsets() {
        let control: u16 = IoControl::new()
            .with_prinfo(0xf)
            .with_fua(true)
            .with_lr(true)
            .into();
        assert_eq!(control, 0xf << 10 | 1 << 14 | 1 << 15);
    }

    #[test]
    fn reservation_status_regctl_is_split_le() {
        let mut raw = [0u8; 24];
        raw[5] = 0x34;
        raw[6] = 0x12;
        let (status, _) = ReservationStatus::read_from_prefix(&raw).unwrap();
        assert_eq!(status.regctl.get(), 0x1234);
    }
}
