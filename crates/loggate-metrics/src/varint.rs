//! Hex-pair zigzag varint codec.
//!
//! Integers on the wire are standard little-endian base-128 varints with
//! zigzag sign folding, but each encoded byte arrives as two ASCII hex
//! characters. All offsets returned here are therefore in characters, not
//! bytes: one encoded byte advances the cursor by 2.

use crate::wire::WireError;

/// Decode one wire byte from two ASCII hex characters.
///
/// Returns the byte and the cursor advance (always 2).
pub fn decode_byte(input: &[u8]) -> Result<(u8, usize), WireError> {
    let pair = input.get(0..2).ok_or(WireError::MalformedHex)?;
    let mut out = [0u8; 1];
    hex::decode_to_slice(pair, &mut out).map_err(|_| WireError::MalformedHex)?;
    Ok((out[0], 2))
}

/// Decode a zigzag varint from the front of `input`.
///
/// Reads bytes while the continuation bit is set and at least one full
/// encoded byte (two characters) remains. A sequence cut off mid-varint is
/// tolerated: the cursor stops at the end of the input and the value
/// decodes to 0, matching the wire producer's defined boundary behavior.
pub fn decode_varint(input: &[u8]) -> Result<(i64, usize), WireError> {
    let (mut b, mut consumed) = decode_byte(input)?;
    let mut u = u64::from(b & 0x7f);
    let mut shift = 7u32;

    while b & 0x80 != 0 && consumed + 2 <= input.len() {
        let (next, adv) = decode_byte(&input[consumed..])?;
        b = next;
        consumed += adv;
        if shift < 64 {
            u |= u64::from(b & 0x7f) << shift;
        }
        shift += 7;
    }

    // Continuation still pending at end of input: incomplete sequence.
    if b & 0x80 != 0 {
        return Ok((0, consumed));
    }

    let value = ((u >> 1) as i64) ^ -((u & 1) as i64);
    Ok((value, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Vectors taken from real agent traffic.
    #[test]
    fn decode_varint_vectors() {
        let cases: &[(&str, i64, usize)] = &[
            ("02", 1, 2),
            ("0202", 1, 2),
            ("01", -1, 2),
            ("00", 0, 2),
            ("46", 35, 2),
            ("44c401", 34, 2),
            ("c401", 98, 4),
            ("c401ff", 98, 4),
            ("feff7f", 1_048_575, 6),
            ("ffff7f", -1_048_576, 6),
            ("feff7f01", 1_048_575, 6),
            ("ffff7f01", -1_048_576, 6),
        ];
        for &(input, value, consumed) in cases {
            let got = decode_varint(input.as_bytes()).unwrap();
            assert_eq!(got, (value, consumed), "input {input:?}");
        }
    }

    #[test]
    fn truncated_continuation_yields_zero() {
        // Continuation bit set on the last available byte: the sequence is
        // incomplete and decodes to 0, consuming what was there.
        assert_eq!(decode_varint(b"ffff").unwrap(), (0, 4));
        assert_eq!(decode_varint(b"c4").unwrap(), (0, 2));
    }

    #[test]
    fn malformed_hex_rejected() {
        assert_eq!(decode_byte(b"zz").unwrap_err(), WireError::MalformedHex);
        assert_eq!(decode_varint(b"0g").unwrap_err(), WireError::MalformedHex);
        // A continuation that runs into a bad pair fails too.
        assert_eq!(decode_varint(b"ffzz").unwrap_err(), WireError::MalformedHex);
    }

    #[test]
    fn short_input_rejected() {
        assert_eq!(decode_byte(b"").unwrap_err(), WireError::MalformedHex);
        assert_eq!(decode_byte(b"f").unwrap_err(), WireError::MalformedHex);
    }
}
