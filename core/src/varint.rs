//! Integer codecs for the on-disk index.
//!
//! Two encodings live here:
//!
//! * fixed-width little-endian, used for the 4-byte offsets in the pointer file;
//! * a nibble-packed variable-length form, used for posting counts and document
//!   ordinals. Every byte carries up to two 3-bit groups, low bits first:
//!
//! ```text
//!   bit  7    6 5 4    3    2 1 0
//!      [more][ hi   ][has_hi][ lo ]
//! ```
//!
//!   `has_hi` is set when the high group is present in this byte and `more` is
//!   set when another byte follows. Zero is a single `0x00` byte.
//!
//! All encoders report how many nibbles they emitted; fixed-width bytes count
//! as two nibbles each.

use std::io::{self, Write};

const GROUP_BITS: u32 = 3;
const GROUP_MASK: u64 = 0x07;
const HAS_HI: u8 = 0x08;
const MORE: u8 = 0x80;

/// Appends `value` as exactly `width` little-endian bytes. Bits above
/// `8 * width` are dropped.
pub fn encode_fixed(mut value: u64, width: usize, out: &mut Vec<u8>) -> usize {
    for _ in 0..width {
        out.push((value & 0xff) as u8);
        value >>= 8;
    }
    width * 2
}

/// Reads a `width`-byte little-endian integer from the front of `bytes`.
pub fn decode_fixed(bytes: &[u8], width: usize) -> Option<u64> {
    if width > 8 || bytes.len() < width {
        return None;
    }
    Some(bytes[..width].iter().rev().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

/// Appends the variable-length form of `value` and returns the nibble count.
pub fn encode(mut value: u64, out: &mut Vec<u8>) -> usize {
    if value == 0 {
        out.push(0);
        return 1;
    }
    let mut nibbles = 0;
    while value != 0 {
        let mut byte = (value & GROUP_MASK) as u8;
        nibbles += 1;
        value >>= GROUP_BITS;
        if value != 0 {
            byte |= HAS_HI | (((value & GROUP_MASK) as u8) << 4);
            nibbles += 1;
            value >>= GROUP_BITS;
            if value != 0 {
                byte |= MORE;
            }
        }
        out.push(byte);
    }
    nibbles
}

/// Decodes one variable-length integer from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed, or `None` when the
/// input is truncated, a byte claims continuation without a high group, or the
/// value does not fit in a `u64`.
pub fn decode(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (i, &byte) in bytes.iter().enumerate() {
        push_group(&mut value, byte & 0x07, &mut shift)?;
        if byte & HAS_HI != 0 {
            push_group(&mut value, (byte >> 4) & 0x07, &mut shift)?;
        } else if byte & MORE != 0 {
            return None;
        }
        if byte & MORE == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

fn push_group(value: &mut u64, group: u8, shift: &mut u32) -> Option<()> {
    if group != 0 {
        if *shift >= u64::BITS {
            return None;
        }
        let part = (group as u64) << *shift;
        if part >> *shift != group as u64 {
            return None;
        }
        *value |= part;
    }
    *shift += GROUP_BITS;
    Some(())
}

/// Number of bytes `encode` would emit for `value`.
pub fn encoded_len(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let bits = (u64::BITS - value.leading_zeros()) as usize;
    bits.div_ceil(2 * GROUP_BITS as usize)
}

/// Writes `value` fixed-width to `w`, returning the nibble count.
pub fn write_fixed<W: Write + ?Sized>(w: &mut W, value: u64, width: usize) -> io::Result<usize> {
    let mut buf = Vec::with_capacity(width);
    let nibbles = encode_fixed(value, width, &mut buf);
    w.write_all(&buf)?;
    Ok(nibbles)
}

/// Writes the variable-length form of `value` to `w`, returning the nibble count.
pub fn write_varint<W: Write + ?Sized>(w: &mut W, value: u64) -> io::Result<usize> {
    let mut buf = Vec::with_capacity(encoded_len(value));
    let nibbles = encode(value, &mut buf);
    w.write_all(&buf)?;
    Ok(nibbles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(x: u64) -> Vec<u8> {
        let mut v = Vec::new();
        encode(x, &mut v);
        v
    }

    #[test]
    fn zero_is_one_zero_byte() {
        assert_eq!(enc(0), vec![0u8]);
        let mut v = Vec::new();
        assert_eq!(encode(0, &mut v), 1);
    }

    #[test]
    fn known_byte_layouts() {
        assert_eq!(enc(7), vec![0x07]);
        assert_eq!(enc(8), vec![0x18]);
        assert_eq!(enc(63), vec![0x7f]);
        assert_eq!(enc(64), vec![0x88, 0x01]);
        assert_eq!(enc(511), vec![0xff, 0x07]);
        assert_eq!(enc(512), vec![0x88, 0x18]);
    }

    #[test]
    fn representative_values_round_trip() {
        for x in [0u64, 7, 8, 63, 64, 511, 512, 4095, 4096, u32::MAX as u64, u64::MAX] {
            let bytes = enc(x);
            assert_eq!(decode(&bytes), Some((x, bytes.len())), "value {x}");
        }
    }

    #[test]
    fn length_steps_at_powers_of_64() {
        for k in 1..10u32 {
            let boundary = 1u64 << (6 * k);
            assert_eq!(enc(boundary - 1).len(), k as usize);
            assert_eq!(enc(boundary).len(), k as usize + 1);
            assert_eq!(encoded_len(boundary), k as usize + 1);
        }
    }

    #[test]
    fn nibble_counts() {
        let mut v = Vec::new();
        assert_eq!(encode(7, &mut v), 1);
        assert_eq!(encode(8, &mut v), 2);
        assert_eq!(encode(64, &mut v), 3);
        assert_eq!(encode_fixed(1, 4, &mut v), 8);
    }

    #[test]
    fn decode_stops_after_first_value() {
        let mut v = Vec::new();
        encode(300, &mut v);
        let first_len = v.len();
        encode(5, &mut v);
        assert_eq!(decode(&v), Some((300, first_len)));
        assert_eq!(decode(&v[first_len..]), Some((5, 1)));
    }

    #[test]
    fn decode_rejects_truncated_and_overlong() {
        assert_eq!(decode(&[]), None);
        assert_eq!(decode(&[0x88]), None);
        assert_eq!(decode(&[0x80, 0x01]), None);
        assert_eq!(decode(&[0xff; 12]), None);
    }

    #[test]
    fn fixed_width_is_little_endian() {
        let mut v = Vec::new();
        encode_fixed(0x0102_0304, 4, &mut v);
        assert_eq!(v, vec![0x04, 0x03, 0x02, 0x01]);
        assert_eq!(decode_fixed(&v, 4), Some(0x0102_0304));
        assert_eq!(decode_fixed(&v[..3], 4), None);
    }

    #[test]
    fn writers_emit_same_bytes() {
        let mut out = Vec::new();
        assert_eq!(write_varint(&mut out, 64).unwrap(), 3);
        assert_eq!(write_fixed(&mut out, 9, 4).unwrap(), 8);
        assert_eq!(out, vec![0x88, 0x01, 0x09, 0, 0, 0]);
    }
}
