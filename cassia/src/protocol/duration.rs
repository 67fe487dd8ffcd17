//! Cassandra's variable-length integer ("vint"), used by the `duration` type.
//!
//! Distinct from the two's-complement [`super::varint`] encoding used by the
//! `varint`/`decimal` types: a vint packs its length into unary-coded leading
//! bits of the first byte, and signed values are zig-zag encoded.
use bytes::{Buf, BufMut};

use crate::error::ErrorKind;

fn unsigned_size(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let bits = 64 - value.leading_zeros() as usize;
    for extra in 0..=8usize {
        let capacity = if extra == 8 { 64 } else { 7 + 7 * extra };
        if bits <= capacity {
            return 1 + extra;
        }
    }
    9
}

pub fn encode_unsigned(value: u64, out: &mut impl BufMut) {
    let extra = unsigned_size(value) - 1;
    if extra == 0 {
        out.put_u8(value as u8);
        return;
    }
    if extra < 8 {
        let data_bits = 7 - extra;
        let mask: u8 = 0xFFu8 << (8 - extra);
        let high = ((value >> (8 * extra)) as u8) & ((1u8 << data_bits) - 1);
        out.put_u8(mask | high);
        for i in (0..extra).rev() {
            out.put_u8((value >> (8 * i)) as u8);
        }
    } else {
        out.put_u8(0xFF);
        for i in (0..8).rev() {
            out.put_u8((value >> (8 * i)) as u8);
        }
    }
}

pub fn decode_unsigned(buf: &mut impl Buf) -> crate::Result<u64> {
    if !buf.has_remaining() {
        return Err(ErrorKind::TruncatedFrame { expected: 1, got: 0 }.into());
    }
    let first = buf.get_u8();
    let extra = first.leading_ones() as usize;
    if extra == 0 {
        return Ok(first as u64);
    }
    if buf.remaining() < extra {
        return Err(ErrorKind::TruncatedFrame { expected: extra, got: buf.remaining() }.into());
    }
    let data_bits = if extra < 8 { 7 - extra } else { 0 };
    let mask: u8 = if data_bits == 0 { 0 } else { (1u8 << data_bits) - 1 };
    let mut value = (first & mask) as u64;
    for _ in 0..extra {
        value = (value << 8) | buf.get_u8() as u64;
    }
    Ok(value)
}

pub fn encode_signed(value: i64, out: &mut impl BufMut) {
    let zigzag = ((value << 1) ^ (value >> 63)) as u64;
    encode_unsigned(zigzag, out);
}

pub fn decode_signed(buf: &mut impl Buf) -> crate::Result<i64> {
    let zigzag = decode_unsigned(buf)?;
    Ok(((zigzag >> 1) as i64) ^ -((zigzag & 1) as i64))
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::BytesMut;

    fn roundtrip_signed(v: i64) {
        let mut buf = BytesMut::new();
        encode_signed(v, &mut buf);
        let mut read = buf.freeze();
        assert_eq!(decode_signed(&mut read).unwrap(), v, "roundtrip failed for {v}");
    }

    #[test]
    fn roundtrips_small_and_large_values() {
        for v in [0i64, 1, -1, 63, 64, -64, -65, 127, -127, i32::MAX as i64, i32::MIN as i64, i64::MAX, i64::MIN] {
            roundtrip_signed(v);
        }
    }

    #[test]
    fn single_byte_for_small_unsigned() {
        let mut buf = BytesMut::new();
        encode_unsigned(100, &mut buf);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn nine_bytes_for_max_u64() {
        let mut buf = BytesMut::new();
        encode_unsigned(u64::MAX, &mut buf);
        assert_eq!(buf.len(), 9);
        let mut read = buf.freeze();
        assert_eq!(decode_unsigned(&mut read).unwrap(), u64::MAX);
    }
}
