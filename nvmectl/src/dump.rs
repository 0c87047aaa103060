// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Byte-level rendering: hex+ASCII tables, raw streams, and fixed-width
//! ASCII fields.

use std::io;
use std::io::Write;

/// Decimal rendering of a 16-byte little-endian counter. Lifetime counters
/// such as bytes-written exceed 64 bits.
pub fn u128_decimal(raw: [u8; 16]) -> String {
    u128::from_le_bytes(raw).to_string()
}

/// Printable ASCII passes through, everything else becomes a dot.
pub fn printable(b: u8) -> char {
    if (b'!'..=b'~').contains(&b) {
        b as char
    } else {
        '.'
    }
}

/// A fixed-width ASCII field (serial, model, firmware revision), trimmed of
/// trailing space and NUL padding.
pub fn fixed_str(field: &[u8]) -> String {
    let text: String = field.iter().map(|&b| b as char).collect();
    text.trim_end_matches([' ', '\0']).to_string()
}

/// Eight firmware revision bytes as printable ASCII.
pub fn fw_revision(frs: u64) -> String {
    frs.to_le_bytes().iter().map(|&b| printable(b)).collect()
}

/// Hex+ASCII table: `width` bytes per row with an offset column, bytes in
/// `group`-sized clusters, and the printable projection in a trailing
/// gutter.
pub fn hex_table(buf: &[u8], width: usize, group: usize, out: &mut impl Write) -> io::Result<()> {
    write!(out, "     ")?;
    for i in 0..width {
        write!(out, "{i:3x}")?;
    }
    for (offset, row) in buf.chunks(width).enumerate() {
        write!(out, "\n{:04x}:", offset * width)?;
        for (i, b) in row.iter().enumerate() {
            if i % group == 0 {
                write!(out, " {b:02x}")?;
            } else {
                write!(out, "{b:02x}")?;
            }
        }
        // Pad a short final row so the ASCII gutter lines up.
        let missing = width - row.len();
        if missing > 0 {
            let pad = 2 * missing + missing / group + usize::from(missing % group != 0);
            write!(out, "{:pad$}", "")?;
        }
        let ascii: String = row.iter().map(|&b| printable(b)).collect();
        write!(out, " \"{ascii}\"")?;
    }
    writeln!(out)?;
    Ok(())
}

/// Hex+ASCII with the usual 16-wide, 1-byte grouping.
pub fn hex(buf: &[u8], out: &mut impl Write) -> io::Result<()> {
    hex_table(buf, 16, 1, out)
}

/// Raw byte stream, for piping into other tools.
pub fn raw(buf: &[u8], out: &mut impl Write) -> io::Result<()> {
    out.write_all(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u128_decimal_is_exact() {
        let mut one = [0u8; 16];
        one[0] = 1;
        assert_eq!(u128_decimal(one), "1");
        assert_eq!(
            u128_decimal([0xff; 16]),
            "340282366920938463463374607431768211455"
        );
        let mut two_pow_64 = [0u8; 16];
        two_pow_64[8] = 1;
        assert_eq!(u128_decimal(two_pow_64), "18446744073709551616");
    }

    #[test]
    fn printable_filters_to_dots() {
        assert_eq!(printable(b'A'), 'A');
        assert_eq!(printable(b'!'), '!');
        assert_eq!(printable(b'~'), '~');
        assert_eq!(printable(b' '), '.');
        assert_eq!(printable(0x00), '.');
        assert_eq!(printable(0x7f), '.');
    }

    #[test]
    fn fixed_str_trims_padding() {
        assert_eq!(fixed_str(b"SN1234              "), "SN1234");
        assert_eq!(fixed_str(b"FW1.0\0\0\0"), "FW1.0");
        assert_eq!(fixed_str(b""), "");
    }

    #[test]
    fn fw_revision_is_printable_ascii() {
        let frs = u64::from_le_bytes(*b"1.0a\0\0\0\0");
        assert_eq!(fw_revision(frs), "1.0a....");
    }

    #[test]
    fn hex_table_rows_and_gutter() {
        let mut out = Vec::new();
        let buf: Vec<u8> = (b'a'..=b'p').chain([0u8, b'q']).collect();
        hex(&buf, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "       0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f"
        );
        assert_eq!(
            lines.next().unwrap(),
            "0000: 61 62 63 64 65 66 67 68 69 6a 6b 6c 6d 6e 6f 70 \"abcdefghijklmnop\""
        );
        // Final short row: padded columns, non-printable rendered as '.'.
        let short = lines.next().unwrap();
        assert!(short.starts_with("0010: 00 71"), "{short:?}");
        assert!(short.ends_with(" \".q\""), "{short:?}");
        // The gutter stays aligned: offset column + 16 three-char cells.
        assert_eq!(short.len(), "0010:".len() + 16 * 3 + " \".q\"".len());
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn raw_passes_bytes_through() {
        let mut out = Vec::new();
        raw(&[0, 1, 2, 0xff], &mut out).unwrap();
        assert_eq!(out, [0, 1, 2, 0xff]);
    }
}
