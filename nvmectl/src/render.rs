// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Labeled `field : value` renderers for the structured payloads.

use crate::dump;
use nvme_defs::ErrorLogEntry;
use nvme_defs::FirmwareLog;
use nvme_defs::IdentifyController;
use nvme_defs::RegisterBank;
use nvme_defs::SmartLog;
use nvme_defs::nvm::IdentifyNamespace;
use nvme_defs::nvm::LbaRangeType;
use nvme_defs::nvm::RegisteredController;
use nvme_defs::nvm::ReservationStatus;
use std::io;
use std::io::Write;

/// Human name for a feature id, for get/set-feature output.
pub fn feature_name(fid: u8) -> &'static str {
    match nvme_defs::Feature(fid) {
        nvme_defs::Feature::ARBITRATION => "Arbitration",
        nvme_defs::Feature::POWER_MANAGEMENT => "Power Management",
        nvme_defs::Feature::LBA_RANGE => "LBA Range",
        nvme_defs::Feature::TEMPERATURE_THRESHOLD => "Temperature Threshold",
        nvme_defs::Feature::ERROR_RECOVERY => "Error Recovery",
        nvme_defs::Feature::VOLATILE_WRITE_CACHE => "Volatile Write Cache",
        nvme_defs::Feature::NUMBER_OF_QUEUES => "Number of Queues",
        nvme_defs::Feature::INTERRUPT_COALESCING => "IRQ Coalescing",
        nvme_defs::Feature::INTERRUPT_VECTOR_CONFIG => "IRQ Configuration",
        nvme_defs::Feature::WRITE_ATOMICITY => "Write Atomicity",
        nvme_defs::Feature::ASYNC_EVENT_CONFIG => "Async Event",
        nvme_defs::Feature::SOFTWARE_PROGRESS_MARKER => "Software Progress",
        _ => "Unknown",
    }
}

pub fn id_ctrl(
    out: &mut impl Write,
    ctrl: &IdentifyController,
    vendor_specific: bool,
) -> io::Result<()> {
    writeln!(out, "NVME Identify Controller:")?;
    writeln!(out, "vid     : {:#x}", ctrl.vid)?;
    writeln!(out, "ssvid   : {:#x}", ctrl.ssvid)?;
    writeln!(out, "sn      : {}", dump::fixed_str(&ctrl.sn))?;
    writeln!(out, "mn      : {}", dump::fixed_str(&ctrl.mn))?;
    writeln!(out, "fr      : {}", dump::fixed_str(&ctrl.fr))?;
    writeln!(out, "rab     : {}", ctrl.rab)?;
    writeln!(
        out,
        "ieee    : {:02x}{:02x}{:02x}",
        ctrl.ieee[0], ctrl.ieee[1], ctrl.ieee[2]
    )?;
    writeln!(out, "cmic    : {:#x}", ctrl.cmic)?;
    writeln!(out, "mdts    : {}", ctrl.mdts)?;
    writeln!(out, "cntlid  : {:x}", ctrl.cntlid)?;
    writeln!(out, "ver     : {:x}", ctrl.ver)?;
    writeln!(out, "rtd3r   : {:x}", ctrl.rtd3r)?;
    writeln!(out, "rtd3e   : {:x}", ctrl.rtd3e)?;
    writeln!(out, "oacs    : {:#x}", ctrl.oacs)?;
    writeln!(out, "acl     : {}", ctrl.acl)?;
    writeln!(out, "aerl    : {}", ctrl.aerl)?;
    writeln!(out, "frmw    : {:#x}", ctrl.frmw)?;
    writeln!(out, "lpa     : {:#x}", ctrl.lpa)?;
    writeln!(out, "elpe    : {}", ctrl.elpe)?;
    writeln!(out, "npss    : {}", ctrl.npss)?;
    writeln!(out, "avscc   : {:#x}", ctrl.avscc)?;
    writeln!(out, "apsta   : {:#x}", ctrl.apsta)?;
    writeln!(out, "wctemp  : {}", ctrl.wctemp)?;
    writeln!(out, "cctemp  : {}", ctrl.cctemp)?;
    writeln!(out, "mtfa    : {}", ctrl.mtfa)?;
    writeln!(out, "hmpre   : {}", ctrl.hmpre)?;
    writeln!(out, "hmmin   : {}", ctrl.hmmin)?;
    writeln!(out, "tnvmcap : {}", ctrl.tnvmcap.get())?;
    writeln!(out, "unvmcap : {}", ctrl.unvmcap.get())?;
    writeln!(out, "rpmbs   : {:#x}", ctrl.rpmbs)?;
    writeln!(out, "sqes    : {:#x}", ctrl.sqes)?;
    writeln!(out, "cqes    : {:#x}", ctrl.cqes)?;
    writeln!(out, "nn      : {}", ctrl.nn)?;
    writeln!(out, "oncs    : {:#x}", ctrl.oncs)?;
    writeln!(out, "fuses   : {:#x}", ctrl.fuses)?;
    writeln!(out, "fna     : {:#x}", ctrl.fna)?;
    writeln!(out, "vwc     : {:#x}", ctrl.vwc)?;
    writeln!(out, "awun    : {}", ctrl.awun)?;
    writeln!(out, "awupf   : {}", ctrl.awupf)?;
    writeln!(out, "icsvscc : {}", ctrl.icsvscc)?;
    writeln!(out, "acwu    : {}", ctrl.acwu)?;
    writeln!(out, "sgls    : {}", ctrl.sgls)?;

    for (i, ps) in ctrl.power_states().iter().enumerate() {
        writeln!(
            out,
            "ps {i:4} : mp:{} flags:{:x} enlat:{} exlat:{} rrt:{} rrl:{}",
            ps.mp, ps.flags, ps.enlat, ps.exlat, ps.rrt, ps.rrl
        )?;
        writeln!(
            out,
            "          rwt:{} rwl:{} idlp:{} ips:{:x} actp:{:x} apws:{:x}",
            ps.rwt, ps.rwl, ps.idlp, ps.ips, ps.actp, ps.apws
        )?;
    }
    if vendor_specific {
        writeln!(out, "vs[]:")?;
        dump::hex(&ctrl.vs, out)?;
    }
    Ok(())
}

pub fn id_ns(
    out: &mut impl Write,
    ns: &IdentifyNamespace,
    nsid: u32,
    vendor_specific: bool,
) -> io::Result<()> {
    writeln!(out, "NVME Identify Namespace {nsid}:")?;
    writeln!(out, "nsze    : {:#x}", ns.nsze)?;
    writeln!(out, "ncap    : {:#x}", ns.ncap)?;
    writeln!(out, "nuse    : {:#x}", ns.nuse)?;
    writeln!(out, "nsfeat  : {:#x}", ns.nsfeat)?;
    writeln!(out, "nlbaf   : {}", ns.nlbaf)?;
    writeln!(out, "flbas   : {:#x}", u8::from(ns.flbas))?;
    writeln!(out, "mc      : {:#x}", ns.mc)?;
    writeln!(out, "dpc     : {:#x}", ns.dpc)?;
    writeln!(out, "dps     : {:#x}", ns.dps)?;
    writeln!(out, "nmic    : {:#x}", ns.nmic)?;
    writeln!(out, "rescap  : {:#x}", ns.rescap)?;
    writeln!(out, "fpi     : {:#x}", ns.fpi)?;
    writeln!(out, "nawun   : {}", ns.nawun)?;
    writeln!(out, "nawupf  : {}", ns.nawupf)?;
    writeln!(out, "nacwu   : {}", ns.nacwu)?;
    writeln!(out, "nabsn   : {}", ns.nabsn)?;
    writeln!(out, "nabo    : {}", ns.nabo)?;
    writeln!(out, "nabspf  : {}", ns.nabspf)?;
    writeln!(out, "nvmcap  : {}", ns.nvmcap.get())?;

    write!(out, "nguid   : ")?;
    for b in ns.nguid {
        write!(out, "{b:02x}")?;
    }
    writeln!(out)?;

    write!(out, "eui64   : ")?;
    for b in ns.eui64 {
        write!(out, "{b:02x}")?;
    }
    writeln!(out)?;

    for (i, f) in ns.formats().iter().enumerate() {
        let in_use = if i == ns.flbas.low_index() as usize {
            "(in use)"
        } else {
            ""
        };
        writeln!(
            out,
            "lbaf {i:2} : ms:{:<3} ds:{:<2} rp:{:#x} {in_use}",
            f.ms(),
            f.lbads(),
            f.rp()
        )?;
    }
    if vendor_specific {
        writeln!(out, "vs[]:")?;
        dump::hex(&ns.vs, out)?;
    }
    Ok(())
}

pub fn smart_log(
    out: &mut impl Write,
    smart: &SmartLog,
    nsid: u32,
    device: &str,
) -> io::Result<()> {
    // Composite temperature is reported in Kelvin.
    let temperature = smart.temperature.get() as i32 - 273;

    writeln!(out, "Smart Log for NVME device:{device} namespace-id:{nsid:x}")?;
    writeln!(out, "critical_warning          : {:#x}", smart.critical_warning)?;
    writeln!(out, "temperature               : {temperature} C")?;
    writeln!(out, "available_spare           : {}%", smart.avail_spare)?;
    writeln!(out, "available_spare_threshold : {}%", smart.spare_thresh)?;
    writeln!(out, "percentage_used           : {}%", smart.percent_used)?;
    let counters = [
        ("data_units_read", smart.data_units_read),
        ("data_units_written", smart.data_units_written),
        ("host_read_commands", smart.host_reads),
        ("host_write_commands", smart.host_writes),
        ("controller_busy_time", smart.ctrl_busy_time),
        ("power_cycles", smart.power_cycles),
        ("power_on_hours", smart.power_on_hours),
        ("unsafe_shutdowns", smart.unsafe_shutdowns),
        ("media_errors", smart.media_errors),
        ("num_err_log_entries", smart.num_err_log_entries),
    ];
    for (label, value) in counters {
        writeln!(out, "{label:<25} : {}", dump::u128_decimal(value))?;
    }
    Ok(())
}

pub fn fw_log(out: &mut impl Write, log: &FirmwareLog, device: &str) -> io::Result<()> {
    writeln!(out, "Firmware Log for device:{device}")?;
    writeln!(out, "afi  : {:#x}", log.afi)?;
    for (i, frs) in log.frs.iter().enumerate() {
        let frs = frs.get();
        if frs != 0 {
            writeln!(
                out,
                "frs{} : {:#018x} ({})",
                i + 1,
                frs,
                dump::fw_revision(frs)
            )?;
        }
    }
    Ok(())
}

pub fn error_log(out: &mut impl Write, entries: &[ErrorLogEntry], device: &str) -> io::Result<()> {
    writeln!(
        out,
        "Error Log Entries for device:{device} entries:{}",
        entries.len()
    )?;
    writeln!(out, ".................")?;
    for (i, entry) in entries.iter().enumerate() {
        writeln!(out, " Entry[{i:2}]")?;
        writeln!(out, ".................")?;
        writeln!(out, "error_count  : {}", entry.error_count)?;
        writeln!(out, "sqid         : {}", entry.sqid)?;
        writeln!(out, "cmdid        : {:#x}", entry.cmdid)?;
        writeln!(out, "status_field : {:#x}", entry.status_field)?;
        writeln!(out, "parm_err_loc : {:#x}", entry.parm_error_location)?;
        writeln!(out, "lba          : {:#x}", entry.lba)?;
        writeln!(out, "nsid         : {}", entry.nsid)?;
        writeln!(out, "vs           : {}", entry.vs)?;
        writeln!(out, ".................")?;
    }
    Ok(())
}

pub fn lba_ranges(out: &mut impl Write, ranges: &[LbaRangeType]) -> io::Result<()> {
    for range in ranges {
        writeln!(out, "type       : {:#x}", range.range_type)?;
        writeln!(out, "attributes : {:#x}", range.attributes)?;
        writeln!(out, "slba       : {:#x}", range.slba)?;
        writeln!(out, "nlb        : {:#x}", range.nlb)?;
        write!(out, "guid       : ")?;
        for b in range.guid {
            write!(out, "{b:02x}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn resv_status(
    out: &mut impl Write,
    status: &ReservationStatus,
    registrants: &[RegisteredController],
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "NVME Reservation status:")?;
    writeln!(out)?;
    writeln!(out, "gen       : {}", status.generation)?;
    writeln!(out, "regctl    : {}", status.regctl.get())?;
    writeln!(out, "rtype     : {}", status.rtype.0)?;
    writeln!(out, "ptpls     : {}", status.ptpls)?;
    for (i, reg) in registrants.iter().enumerate() {
        writeln!(out, "regctl[{i}] :")?;
        writeln!(out, "  cntlid  : {:x}", reg.cntlid)?;
        writeln!(out, "  rcsts   : {:x}", reg.rcsts)?;
        writeln!(out, "  hostid  : {:x}", u64::from_le_bytes(reg.hostid))?;
        writeln!(out, "  rkey    : {:x}", reg.rkey)?;
    }
    writeln!(out)?;
    Ok(())
}

pub fn registers(out: &mut impl Write, bank: &RegisterBank) -> io::Result<()> {
    writeln!(out, "cap     : {:x}", bank.cap)?;
    writeln!(out, "version : {:x}", bank.vs)?;
    writeln!(out, "intms   : {:x}", bank.intms)?;
    writeln!(out, "intmc   : {:x}", bank.intmc)?;
    writeln!(out, "cc      : {:x}", bank.cc)?;
    writeln!(out, "csts    : {:x}", bank.csts)?;
    writeln!(out, "nssr    : {:x}", bank.nssr)?;
    writeln!(out, "aqa     : {:x}", bank.aqa)?;
    writeln!(out, "asq     : {:x}", bank.asq)?;
    writeln!(out, "acq     : {:x}", bank.acq)?;
    writeln!(out, "cmbloc  : {:x}", bank.cmbloc)?;
    writeln!(out, "cmbsz   : {:x}", bank.cmbsz)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::FromBytes;
    use zerocopy::FromZeros;
    use zerocopy::IntoBytes;

    /// Encode-then-decode round trip through the wire layout: padded ASCII
    /// fields come back exactly trimmed, and the vendor region renders
    /// non-printables as dots.
    #[test]
    fn identify_controller_round_trip() {
        let mut ctrl = IdentifyController::new_zeroed();
        ctrl.sn[..8].copy_from_slice(b"S3RIAL42");
        ctrl.sn[8..].fill(b' ');
        ctrl.mn[..7].copy_from_slice(b"Model-X");
        ctrl.mn[7..].fill(b' ');
        ctrl.fr.copy_from_slice(b"1.0a    ");
        ctrl.vs[0] = b'V';
        ctrl.vs[1] = 0x01;

        let wire = ctrl.as_bytes().to_vec();
        assert_eq!(wire.len(), 4096);
        let (decoded, rest) = IdentifyController::read_from_prefix(&wire).unwrap();
        assert!(rest.is_empty());

        assert_eq!(dump::fixed_str(&decoded.sn), "S3RIAL42");
        assert_eq!(dump::fixed_str(&decoded.mn), "Model-X");
        assert_eq!(dump::fixed_str(&decoded.fr), "1.0a");

        let mut dumped = Vec::new();
        dump::hex(&decoded.vs[..16], &mut dumped).unwrap();
        let text = String::from_utf8(dumped).unwrap();
        assert!(text.contains("\"V...............\""), "{text}");
    }

    #[test]
    fn power_state_count_follows_npss() {
        let mut ctrl = IdentifyController::new_zeroed();
        ctrl.npss = 2;
        assert_eq!(ctrl.power_states().len(), 3);
        ctrl.npss = 0xff;
        assert_eq!(ctrl.power_states().len(), 32);
    }

    #[test]
    fn feature_names_default_to_unknown() {
        assert_eq!(feature_name(0x06), "Volatile Write Cache");
        assert_eq!(feature_name(0x80), "Software Progress");
        assert_eq!(feature_name(0x55), "Unknown");
    }

    #[test]
    fn smart_log_renders_celsius_and_counters() {
        let mut smart = SmartLog::new_zeroed();
        smart.temperature.set(300);
        smart.data_units_written[8] = 1; // 2^64

        let mut out = Vec::new();
        smart_log(&mut out, &smart, 1, "/dev/nvme0n1").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("temperature               : 27 C"), "{text}");
        assert!(
            text.contains("data_units_written        : 18446744073709551616"),
            "{text}"
        );
    }

    #[test]
    fn fw_log_skips_empty_slots() {
        let mut log = FirmwareLog::new_zeroed();
        log.frs[1] = zerocopy::U64::new(u64::from_le_bytes(*b"2.1b\0\0\0\0"));
        let mut out = Vec::new();
        fw_log(&mut out, &log, "/dev/nvme0").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("frs2"), "{text}");
        assert!(text.contains("(2.1b....)"), "{text}");
        assert!(!text.contains("frs1 :"), "{text}");
    }
}
