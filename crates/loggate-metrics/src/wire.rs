//! Opcode scanner for the client-metrics payload.
//!
//! A payload is a left-to-right sequence of single-character opcodes with
//! opcode-specific operands. Integer operands are hex-pair varints
//! ([`crate::varint`]); metric names are literal characters. The scanner
//! switches interpretation per opcode rather than normalizing the buffer
//! up front.

use thiserror::Error;

use crate::varint::decode_varint;

/// A malformed or unrecognized wire payload.
///
/// Scanning aborts at the first error; whatever the caller applied from
/// earlier events stays applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("malformed hex pair in payload")]
    MalformedHex,

    /// The wire producer defines no opcode outside `N`, `S`, `I`. Aborting
    /// here keeps the scan finite on garbage input.
    #[error("unknown opcode {0:?} in payload")]
    UnknownOpcode(char),

    #[error("metric name length {0} runs past the end of the payload")]
    BadNameLength(i64),

    #[error("metric name is not valid UTF-8")]
    InvalidName,
}

/// One decoded payload event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent<'a> {
    /// `N`: declare a metric name, awaiting a wire-id binding.
    Define { name: &'a str },
    /// `S`: bind or overwrite the value for a wire id.
    Set { wire_id: i64, value: i64 },
    /// `I`: add a delta to the value for a wire id.
    Increment { wire_id: i64, delta: i64 },
}

/// Iterator over the events of one payload.
pub struct PayloadScanner<'a> {
    payload: &'a str,
    pos: usize,
}

impl<'a> PayloadScanner<'a> {
    pub fn new(payload: &'a str) -> Self {
        Self { payload, pos: 0 }
    }

    fn scan_next(&mut self) -> Result<WireEvent<'a>, WireError> {
        let bytes = self.payload.as_bytes();
        let opcode = bytes[self.pos];
        self.pos += 1;
        match opcode {
            b'N' => {
                let (len, adv) = decode_varint(&bytes[self.pos..])?;
                self.pos += adv;
                let n = usize::try_from(len).map_err(|_| WireError::BadNameLength(len))?;
                let end = self
                    .pos
                    .checked_add(n)
                    .filter(|&end| end <= bytes.len())
                    .ok_or(WireError::BadNameLength(len))?;
                let name = self
                    .payload
                    .get(self.pos..end)
                    .ok_or(WireError::InvalidName)?;
                self.pos = end;
                Ok(WireEvent::Define { name })
            }
            b'S' => {
                let (wire_id, adv) = decode_varint(&bytes[self.pos..])?;
                self.pos += adv;
                let (value, adv) = decode_varint(&bytes[self.pos..])?;
                self.pos += adv;
                Ok(WireEvent::Set { wire_id, value })
            }
            b'I' => {
                let (wire_id, adv) = decode_varint(&bytes[self.pos..])?;
                self.pos += adv;
                let (delta, adv) = decode_varint(&bytes[self.pos..])?;
                self.pos += adv;
                Ok(WireEvent::Increment { wire_id, delta })
            }
            other => Err(WireError::UnknownOpcode(other as char)),
        }
    }
}

impl<'a> Iterator for PayloadScanner<'a> {
    type Item = Result<WireEvent<'a>, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.payload.len() {
            return None;
        }
        let result = self.scan_next();
        if result.is_err() {
            // Fuse: an error ends the scan.
            self.pos = self.payload.len();
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(payload: &str) -> Result<Vec<WireEvent<'_>>, WireError> {
        PayloadScanner::new(payload).collect()
    }

    #[test]
    fn define_then_set() {
        let events = scan("N2anetmon_link_change_eqS0202").unwrap();
        assert_eq!(
            events,
            vec![
                WireEvent::Define {
                    name: "netmon_link_change_eq"
                },
                WireEvent::Set {
                    wire_id: 1,
                    value: 1
                },
            ]
        );
    }

    #[test]
    fn multi_byte_operands() {
        let events = scan("N24magicsock_send_udpS44c401").unwrap();
        assert_eq!(
            events,
            vec![
                WireEvent::Define {
                    name: "magicsock_send_udp"
                },
                WireEvent::Set {
                    wire_id: 34,
                    value: 98
                },
            ]
        );
    }

    #[test]
    fn increments_with_signed_deltas() {
        let events = scan("S3802I3802I3803").unwrap();
        assert_eq!(
            events,
            vec![
                WireEvent::Set {
                    wire_id: 28,
                    value: 1
                },
                WireEvent::Increment {
                    wire_id: 28,
                    delta: 1
                },
                WireEvent::Increment {
                    wire_id: 28,
                    delta: -2
                },
            ]
        );
    }

    #[test]
    fn unknown_opcode_aborts() {
        let mut scanner = PayloadScanner::new("S0202X0202S0404");
        assert!(scanner.next().unwrap().is_ok());
        assert_eq!(
            scanner.next().unwrap().unwrap_err(),
            WireError::UnknownOpcode('X')
        );
        // The scan is fused after the error.
        assert!(scanner.next().is_none());
    }

    #[test]
    fn name_overrunning_payload_rejected() {
        // Declared name length 35 with only a few characters left.
        assert_eq!(scan("N46abc").unwrap_err(), WireError::BadNameLength(35));
    }

    #[test]
    fn negative_name_length_rejected() {
        // "01" decodes to -1.
        assert_eq!(scan("N01").unwrap_err(), WireError::BadNameLength(-1));
    }

    #[test]
    fn empty_payload_yields_nothing() {
        assert_eq!(scan("").unwrap(), vec![]);
    }
}
