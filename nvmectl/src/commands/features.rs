// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Get/Set Features.

use super::parse_u32;
use super::parse_u8;
use super::report_status;
use crate::device::DeviceContext;
use crate::dump;
use crate::encode;
use crate::ioctl;
use crate::ioctl::CommandError;
use crate::render;
use nvme_defs::AdminOpcode;
use nvme_defs::Feature;
use nvme_defs::nvm::LbaRangeType;
use std::io;
use std::path::PathBuf;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

/// Renders the data buffer attached to a feature: LBA ranges decode into
/// fields, anything else goes through the generic dumper.
fn show_feature_data(
    out: &mut impl io::Write,
    fid: u8,
    result: u32,
    data: &[u8],
    raw: bool,
) -> io::Result<()> {
    if raw {
        return dump::raw(data, out);
    }
    if fid == Feature::LBA_RANGE.0 {
        // The result dword carries the range count; never walk past the
        // buffer whatever it claims.
        let max = data.len() / size_of::<LbaRangeType>();
        let count = (result as usize).min(max);
        let ranges: Vec<LbaRangeType> = (0..count)
            .map(|i| {
                LbaRangeType::read_from_prefix(&data[i * size_of::<LbaRangeType>()..])
                    .unwrap()
                    .0
            })
            .collect();
        render::lba_ranges(out, &ranges)
    } else {
        dump::hex(data, out)
    }
}

#[derive(clap::Args)]
pub struct GetFeatureArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Feature identifier.
    #[clap(long, short = 'f', value_parser = parse_u8)]
    pub feature_id: u8,
    /// Select: 0 current, 1 default, 2 saved, 3 supported.
    #[clap(long, short = 's', value_parser = parse_u8, default_value = "0")]
    pub sel: u8,
    /// Raw cdw11 value for features that take one.
    #[clap(long, value_parser = parse_u32, default_value = "0")]
    pub cdw11: u32,
    /// Data buffer length for features that return one.
    #[clap(long, short = 'l', value_parser = parse_u32, default_value = "0")]
    pub data_len: u32,
    /// Namespace the feature applies to.
    #[clap(long, short = 'n', value_parser = parse_u32, default_value = "0")]
    pub namespace_id: u32,
    /// Emit the raw data buffer instead of decoding it.
    #[clap(long, short = 'b')]
    pub raw_binary: bool,
}

pub fn get_feature(args: &GetFeatureArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    if args.feature_id == 0 {
        anyhow::bail!("--feature-id is a required param");
    }
    let fields = encode::get_features(args.namespace_id, args.feature_id, args.sel, args.cdw11)?;
    let data_len = encode::feature_data_len(args.feature_id, args.data_len) as usize;
    let mut buf = ioctl::alloc_pages(data_len);
    let data = &mut buf.as_mut_bytes()[..data_len];

    match ioctl::submit_admin(dev.file(), AdminOpcode::GET_FEATURES, data, &fields) {
        Ok(result) => {
            println!(
                "get-feature:{}({}), value:{:#010x}",
                args.feature_id,
                render::feature_name(args.feature_id),
                result
            );
            if data_len > 0 {
                let mut out = io::stdout().lock();
                show_feature_data(&mut out, args.feature_id, result, data, args.raw_binary)?;
            }
            Ok(0)
        }
        Err(CommandError::Device(status)) => Ok(report_status(status)),
        Err(CommandError::Os(errno)) => {
            Err(anyhow::Error::new(errno).context("get features ioctl"))
        }
    }
}

#[derive(clap::Args)]
pub struct SetFeatureArgs {
    /// Device node (/dev/nvme0 or /dev/nvme0n1).
    pub device: PathBuf,
    /// Feature identifier.
    #[clap(long, short = 'f', value_parser = parse_u8)]
    pub feature_id: u8,
    /// Feature value, placed in cdw10's companion dword.
    #[clap(long, short = 'v', value_parser = parse_u32)]
    pub value: u32,
    /// Data buffer length for features that carry one.
    #[clap(long, short = 'l', value_parser = parse_u32, default_value = "0")]
    pub data_len: u32,
    /// Namespace the feature applies to.
    #[clap(long, short = 'n', value_parser = parse_u32, default_value = "0")]
    pub namespace_id: u32,
}

pub fn set_feature(args: &SetFeatureArgs) -> anyhow::Result<i32> {
    let dev = DeviceContext::open(&args.device)?;
    if args.feature_id == 0 {
        anyhow::bail!("--feature-id is a required param");
    }
    let fields = encode::set_features(args.namespace_id, args.feature_id, args.value);
    // TODO: accept a payload file for features that carry a data buffer.
    let data_len = encode::feature_data_len(args.feature_id, args.data_len) as usize;
    let mut buf = ioctl::alloc_pages(data_len);
    let data = &mut buf.as_mut_bytes()[..data_len];

    match ioctl::submit_admin(dev.file(), AdminOpcode::SET_FEATURES, data, &fields) {
        Ok(result) => {
            println!(
                "set-feature:{}({}), value:{:#010x}",
                args.feature_id,
                render::feature_name(args.feature_id),
                result
            );
            if data_len > 0 {
                let mut out = io::stdout().lock();
                show_feature_data(&mut out, args.feature_id, result, data, false)?;
            }
            Ok(0)
        }
        Err(CommandError::Device(status)) => Ok(report_status(status)),
        Err(CommandError::Os(errno)) => {
            Err(anyhow::Error::new(errno).context("set features ioctl"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::FromZeros;

    #[test]
    fn lba_range_count_is_clipped_to_the_buffer() {
        let mut range = LbaRangeType::new_zeroed();
        range.range_type = 1;
        range.slba = 0x1000;
        let mut data = vec![0u8; 2 * size_of::<LbaRangeType>()];
        data[..size_of::<LbaRangeType>()].copy_from_slice(range.as_bytes());

        // The device claims 64 ranges but the buffer only holds two.
        let mut out = Vec::new();
        show_feature_data(&mut out, Feature::LBA_RANGE.0, 64, &data, false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("type       :").count(), 2);
        assert!(text.contains("slba       : 0x1000"), "{text}");
    }
}
