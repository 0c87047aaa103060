// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Validated encoding of semantic command parameters into packed
//! command-specific doublewords.
//!
//! Every builder range-checks its inputs before packing, so an
//! out-of-range field is rejected before any device access.

use crate::ioctl::CommandFields;
use crate::ioctl::PAGE_SIZE;
use crate::ioctl::UserIo;
use nvme_defs::Cdw10FirmwareCommit;
use nvme_defs::Cdw10FirmwareDownload;
use nvme_defs::Cdw10Format;
use nvme_defs::Cdw10GetFeatures;
use nvme_defs::Cdw10GetLogPage;
use nvme_defs::Cdw10Identify;
use nvme_defs::Cdw10SecurityProtocol;
use nvme_defs::Cdw10SetFeatures;
use nvme_defs::Cdw11FirmwareDownload;
use nvme_defs::Cns;
use nvme_defs::nvm;
use nvme_defs::nvm::IoControl;
use nvme_defs::nvm::NvmOpcode;
use thiserror::Error;

/// Namespace id meaning "all namespaces / not namespace specific".
pub const NSID_ALL: u32 = 0xffffffff;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("invalid {field}: {value} (max {max})")]
    FieldRange {
        field: &'static str,
        value: u32,
        max: u32,
    },
    #[error("log length must be a nonzero multiple of 4 bytes, got {0}")]
    BadLogLength(u32),
    #[error("firmware image size {0:#x} is not a multiple of 4 bytes")]
    BadImageSize(u64),
    #[error("data direction not given")]
    MissingDirection,
    #[error("command can't be both read and write")]
    BothDirections,
}

fn check_range(field: &'static str, value: u32, max: u32) -> Result<(), EncodeError> {
    if value > max {
        return Err(EncodeError::FieldRange { field, value, max });
    }
    Ok(())
}

/// Identify; the caller picks the CNS selector and a 4096-byte buffer.
pub fn identify(nsid: u32, cns: Cns) -> CommandFields {
    CommandFields {
        nsid,
        cdw10: Cdw10Identify::new().with_cns(cns.0).into(),
        ..Default::default()
    }
}

/// Get Log Page. `len` is the destination length in bytes and becomes the
/// zero-based dword count in the high half of cdw10.
pub fn get_log_page(nsid: u32, lid: u8, len: u32) -> Result<CommandFields, EncodeError> {
    if len == 0 || len % 4 != 0 {
        return Err(EncodeError::BadLogLength(len));
    }
    Ok(CommandFields {
        nsid,
        cdw10: Cdw10GetLogPage::new()
            .with_lid(lid)
            .with_numdl_z((len / 4 - 1) as u16)
            .into(),
        ..Default::default()
    })
}

/// Get Features; `sel` picks current/default/saved/supported.
pub fn get_features(nsid: u32, fid: u8, sel: u8, cdw11: u32) -> Result<CommandFields, EncodeError> {
    check_range("sel", sel.into(), 7)?;
    Ok(CommandFields {
        nsid,
        cdw10: Cdw10GetFeatures::new().with_fid(fid).with_sel(sel).into(),
        cdw11,
        ..Default::default()
    })
}

/// Set Features with the raw feature value in cdw11.
pub fn set_features(nsid: u32, fid: u8, value: u32) -> CommandFields {
    CommandFields {
        nsid,
        cdw10: Cdw10SetFeatures::new().with_fid(fid).into(),
        cdw11: value,
        ..Default::default()
    }
}

/// The LBA Range Type feature always transfers one page, whatever length
/// the caller asked for.
pub fn feature_data_len(fid: u8, requested: u32) -> u32 {
    if fid == nvme_defs::Feature::LBA_RANGE.0 {
        PAGE_SIZE as u32
    } else {
        requested
    }
}

#[derive(Debug, Default, Copy, Clone)]
pub struct FormatParams {
    pub lbaf: u8,
    pub mset: u8,
    pub pi: u8,
    pub pil: u8,
    pub ses: u8,
}

/// Format NVM. Every sub-field is range checked before packing.
pub fn format_nvm(nsid: u32, p: &FormatParams) -> Result<CommandFields, EncodeError> {
    check_range("lbaf", p.lbaf.into(), 15)?;
    check_range("ms", p.mset.into(), 1)?;
    check_range("pi", p.pi.into(), 7)?;
    check_range("pil", p.pil.into(), 1)?;
    check_range("ses", p.ses.into(), 7)?;
    Ok(CommandFields {
        nsid,
        cdw10: Cdw10Format::new()
            .with_lbaf(p.lbaf)
            .with_mset(p.mset != 0)
            .with_pi(p.pi)
            .with_pil(p.pil != 0)
            .with_ses(p.ses)
            .into(),
        ..Default::default()
    })
}

/// Firmware Commit (activate): 3-bit slot, 2-bit action.
pub fn firmware_commit(slot: u8, action: u8) -> Result<CommandFields, EncodeError> {
    check_range("slot", slot.into(), 7)?;
    check_range("action", action.into(), 3)?;
    Ok(CommandFields {
        cdw10: Cdw10FirmwareCommit::new().with_fs(slot).with_ca(action).into(),
        ..Default::default()
    })
}

/// Firmware Image Download for one chunk: zero-based dword count in cdw10,
/// dword offset in cdw11.
pub fn firmware_download(chunk_len: u32, offset: u32) -> CommandFields {
    CommandFields {
        cdw10: Cdw10FirmwareDownload::new()
            .with_numd_z((chunk_len >> 2) - 1)
            .into(),
        cdw11: Cdw11FirmwareDownload::new().with_ofst(offset >> 2).into(),
        ..Default::default()
    }
}

/// Security Send / Security Receive: protocol and protocol-specific value
/// in cdw10, transfer/allocation length in cdw11.
pub fn security(secp: u8, spsp: u16, len: u32) -> CommandFields {
    CommandFields {
        cdw10: Cdw10SecurityProtocol::new()
            .with_spsp(spsp)
            .with_secp(secp)
            .into(),
        cdw11: len,
        ..Default::default()
    }
}

pub fn resv_acquire(
    nsid: u32,
    rtype: u8,
    racqa: u8,
    iekey: bool,
) -> Result<CommandFields, EncodeError> {
    check_range("racqa", racqa.into(), 7)?;
    Ok(CommandFields {
        nsid,
        cdw10: nvm::Cdw10ReservationAcquire::new()
            .with_racqa(racqa)
            .with_iekey(iekey)
            .with_rtype(rtype)
            .into(),
        ..Default::default()
    })
}

pub fn resv_register(
    nsid: u32,
    rrega: u8,
    iekey: u8,
    cptpl: u8,
) -> Result<CommandFields, EncodeError> {
    check_range("rrega", rrega.into(), 7)?;
    check_range("iekey", iekey.into(), 1)?;
    check_range("cptpl", cptpl.into(), 3)?;
    Ok(CommandFields {
        nsid,
        cdw10: nvm::Cdw10ReservationRegister::new()
            .with_rrega(rrega)
            .with_iekey(iekey != 0)
            .with_cptpl(cptpl)
            .into(),
        ..Default::default()
    })
}

pub fn resv_release(
    nsid: u32,
    rtype: u8,
    rrela: u8,
    iekey: u8,
) -> Result<CommandFields, EncodeError> {
    check_range("rrela", rrela.into(), 7)?;
    check_range("iekey", iekey.into(), 1)?;
    Ok(CommandFields {
        nsid,
        cdw10: nvm::Cdw10ReservationRelease::new()
            .with_rrela(rrela)
            .with_iekey(iekey != 0)
            .with_rtype(rtype)
            .into(),
        ..Default::default()
    })
}

/// Reservation Report. Clamps the requested dword count to one page and
/// never below the fixed header; returns the fields and the buffer length
/// in bytes.
pub fn resv_report(nsid: u32, numd: u32) -> (CommandFields, usize) {
    let max = (PAGE_SIZE / 4) as u32;
    let numd = if numd == 0 || numd > max { max } else { numd };
    let len = (numd as usize * 4).max(size_of::<nvm::ReservationStatus>());
    let fields = CommandFields {
        nsid,
        cdw10: nvm::Cdw10ReservationReport::new()
            .with_numd_z(len as u32 / 4 - 1)
            .into(),
        ..Default::default()
    };
    (fields, len)
}

#[derive(Debug, Default, Copy, Clone)]
pub struct IoParams {
    pub slba: u64,
    /// Zero-based block count.
    pub nblocks: u16,
    pub prinfo: u8,
    pub fua: bool,
    pub lr: bool,
    pub reftag: u32,
    pub apptag: u16,
    pub appmask: u16,
}

/// Read/Write/Compare descriptor for the dedicated user-io submission
/// path. The data buffer address and namespace binding come from the
/// handle, not the descriptor.
pub fn user_io(opcode: NvmOpcode, p: &IoParams) -> Result<UserIo, EncodeError> {
    check_range("prinfo", p.prinfo.into(), 0xf)?;
    let control: u16 = IoControl::new()
        .with_prinfo(p.prinfo)
        .with_fua(p.fua)
        .with_lr(p.lr)
        .into();
    Ok(UserIo {
        opcode: opcode.0,
        control,
        nblocks: p.nblocks,
        slba: p.slba,
        reftag: p.reftag,
        apptag: p.apptag,
        appmask: p.appmask,
        ..Default::default()
    })
}

/// Passthrough direction rule: a data buffer needs exactly one of read or
/// write.
pub fn check_direction(has_data: bool, read: bool, write: bool) -> Result<(), EncodeError> {
    if !has_data {
        return Ok(());
    }
    match (read, write) {
        (false, false) => Err(EncodeError::MissingDirection),
        (true, true) => Err(EncodeError::BothDirections),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_packs_each_field_at_its_offset() {
        let fields = format_nvm(
            1,
            &FormatParams {
                lbaf: 5,
                mset: 1,
                pi: 3,
                pil: 1,
                ses: 2,
            },
        )
        .unwrap();
        assert_eq!(fields.cdw10, 5 | 1 << 4 | 3 << 5 | 1 << 8 | 2 << 9);
        assert_eq!(fields.nsid, 1);
    }

    #[test]
    fn format_rejects_out_of_range_before_packing() {
        let p = FormatParams {
            lbaf: 16,
            ..Default::default()
        };
        assert_eq!(
            format_nvm(1, &p),
            Err(EncodeError::FieldRange {
                field: "lbaf",
                value: 16,
                max: 15
            })
        );
        assert!(format_nvm(1, &FormatParams { pi: 8, ..Default::default() }).is_err());
        assert!(format_nvm(1, &FormatParams { ses: 8, ..Default::default() }).is_err());
    }

    #[test]
    fn get_log_page_rejects_bad_lengths() {
        assert_eq!(
            get_log_page(NSID_ALL, 2, 0),
            Err(EncodeError::BadLogLength(0))
        );
        assert_eq!(
            get_log_page(NSID_ALL, 2, 510),
            Err(EncodeError::BadLogLength(510))
        );
        let fields = get_log_page(NSID_ALL, 2, 512).unwrap();
        assert_eq!(fields.cdw10, 0x2 | 127 << 16);
        assert_eq!(fields.nsid, NSID_ALL);
    }

    #[test]
    fn get_features_rejects_bad_select() {
        assert!(get_features(0, 1, 8, 0).is_err());
        let fields = get_features(0, 0x0b, 3, 0).unwrap();
        assert_eq!(fields.cdw10, 3 << 8 | 0x0b);
    }

    #[test]
    fn lba_range_feature_forces_one_page() {
        assert_eq!(feature_data_len(nvme_defs::Feature::LBA_RANGE.0, 64), 4096);
        assert_eq!(feature_data_len(nvme_defs::Feature::ARBITRATION.0, 64), 64);
    }

    #[test]
    fn firmware_commit_packs_action_over_slot() {
        let fields = firmware_commit(2, 1).unwrap();
        assert_eq!(fields.cdw10, 2 | 1 << 3);
        assert!(firmware_commit(8, 0).is_err());
        assert!(firmware_commit(0, 4).is_err());
    }

    #[test]
    fn firmware_download_counts_dwords() {
        let fields = firmware_download(0x1000, 0x2000);
        assert_eq!(fields.cdw10, 0x1000 / 4 - 1);
        assert_eq!(fields.cdw11, 0x2000 / 4);
    }

    #[test]
    fn security_packs_protocol_fields() {
        let fields = security(0xea, 0x0102, 0x40);
        assert_eq!(fields.cdw10, 0xea << 24 | 0x0102 << 8);
        assert_eq!(fields.cdw11, 0x40);
    }

    #[test]
    fn resv_register_packs_cptpl_high() {
        let fields = resv_register(1, 2, 1, 3).unwrap();
        assert_eq!(fields.cdw10, 2 | 1 << 3 | 3 << 30);
        assert!(resv_register(1, 8, 0, 0).is_err());
        assert!(resv_register(1, 0, 2, 0).is_err());
        assert!(resv_register(1, 0, 0, 4).is_err());
    }

    #[test]
    fn resv_report_clamps_to_one_page() {
        let (fields, len) = resv_report(1, 0);
        assert_eq!(len, 4096);
        assert_eq!(fields.cdw10, 4096 / 4 - 1);

        let (fields, len) = resv_report(1, 2048);
        assert_eq!(len, 4096);
        assert_eq!(fields.cdw10, 1023);

        // Tiny requests still cover the fixed header.
        let (_, len) = resv_report(1, 2);
        assert_eq!(len, size_of::<nvm::ReservationStatus>());
    }

    #[test]
    fn user_io_rejects_bad_prinfo() {
        assert!(
            user_io(
                NvmOpcode::READ,
                &IoParams {
                    prinfo: 0x10,
                    ..Default::default()
                }
            )
            .is_err()
        );
        let io = user_io(
            NvmOpcode::WRITE,
            &IoParams {
                slba: 8,
                nblocks: 1,
                prinfo: 0x8,
                fua: true,
                lr: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(io.opcode, 0x01);
        assert_eq!(io.control, 0x8 << 10 | 1 << 14);
        assert_eq!(io.slba, 8);
    }

    #[test]
    fn passthru_direction_must_be_exactly_one() {
        assert_eq!(
            check_direction(true, false, false),
            Err(EncodeError::MissingDirection)
        );
        assert_eq!(
            check_direction(true, true, true),
            Err(EncodeError::BothDirections)
        );
        assert_eq!(check_direction(true, true, false), Ok(()));
        assert_eq!(check_direction(false, false, false), Ok(()));
    }
}
