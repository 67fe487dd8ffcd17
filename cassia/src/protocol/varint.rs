//! Two's-complement, minimum-length big-endian integers.
//!
//! Used by the `varint` CQL type directly and as the unscaled-value encoding
//! inside `decimal`. Distinct from the zig-zag `vint` encoding CQL uses for
//! the `duration` type (see [`crate::value::encode_duration`]).
use bytes::{BufMut, Bytes};
use num_bigint::BigInt;

/// Encode `v` as the shortest two's-complement big-endian byte string that
/// round-trips through [`decode`].
pub fn encode(v: &BigInt) -> Vec<u8> {
    let (sign, mut bytes) = v.to_bytes_be();
    use num_bigint::Sign;
    match sign {
        Sign::NoSign => vec![0],
        Sign::Plus => {
            // to_bytes_be never includes a sign bit; reinsert a 0x00 byte if
            // the high bit is set so the value doesn't read back as negative.
            if bytes.first().is_some_and(|b| b & 0x80 != 0) {
                bytes.insert(0, 0);
            }
            bytes
        }
        Sign::Minus => {
            // two's complement of the magnitude, at minimal width
            let nbytes = bytes.len();
            let mut carry = true;
            for b in bytes.iter_mut().rev() {
                *b = !*b;
                if carry {
                    let (sum, overflow) = b.overflowing_add(1);
                    *b = sum;
                    carry = overflow;
                }
            }
            if bytes.first().is_some_and(|b| b & 0x80 == 0) {
                bytes.insert(0, 0xFF);
            }
            debug_assert!(nbytes <= bytes.len());
            bytes
        }
    }
}

/// Decode a two's-complement big-endian byte string. An empty slice decodes to zero.
pub fn decode(bytes: &[u8]) -> BigInt {
    if bytes.is_empty() {
        return BigInt::from(0);
    }
    BigInt::from_signed_bytes_be(bytes)
}

pub(crate) fn put(buf: &mut impl BufMut, v: &BigInt) {
    buf.put_slice(&encode(v));
}

pub(crate) fn decode_bytes(bytes: Bytes) -> BigInt {
    decode(&bytes)
}

#[cfg(test)]
mod test {
    use super::*;

    fn roundtrip(v: i128) {
        let big = BigInt::from(v);
        let encoded = encode(&big);
        assert_eq!(decode(&encoded), big, "roundtrip failed for {v}");
    }

    #[test]
    fn roundtrips_spec_boundary_values() {
        for v in [0i128, 1, -1, 127, 128, -128, -129] {
            roundtrip(v);
        }
        roundtrip(i64::MAX as i128);
        roundtrip(i64::MIN as i128);
    }

    #[test]
    fn roundtrips_2_pow_63_and_negation() {
        let two_pow_63 = BigInt::from(1u64) << 63;
        assert_eq!(decode(&encode(&two_pow_63)), two_pow_63);
        let neg = -two_pow_63.clone();
        assert_eq!(decode(&encode(&neg)), neg);
    }

    #[test]
    fn roundtrips_10_pow_40() {
        let v: BigInt = "10000000000000000000000000000000000000000".parse().unwrap();
        assert_eq!(decode(&encode(&v)), v);
        let neg = -v;
        assert_eq!(decode(&encode(&neg)), neg);
    }

    #[test]
    fn zero_encodes_to_single_byte() {
        assert_eq!(encode(&BigInt::from(0)), vec![0]);
    }
}
