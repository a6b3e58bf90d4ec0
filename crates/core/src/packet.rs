//! Command frame and data payload encoding.
//!
//! The device speaks two report formats:
//! - Command frames: 8-byte feature reports (opcode, 6 params, checksum)
//! - Data chunks: 32-byte output reports, zero-padded
//!
//! Checksum = (255 - sum(bytes[0..7])) mod 256, so a valid frame sums to
//! 0xFF mod 256.

use crate::error::{Error, Result};
use std::fmt;

/// Command frame length (feature report, excluding hidapi report ID).
pub const COMMAND_LEN: usize = 8;
/// Opcode plus parameters, the part covered by the checksum.
pub const COMMAND_BODY_LEN: usize = 7;
/// Maximum parameter bytes after the opcode.
pub const MAX_PARAMS: usize = COMMAND_BODY_LEN - 1;
/// Output report length for ordinary sectors.
pub const CHUNK_LEN: usize = 32;

/// Opcodes of checksummed commands.
pub mod opcodes {
    /// Active polling rate (runtime register).
    pub const POLLING_RATE: u8 = 0x01;
    /// Sensor lift and button debounce (runtime register).
    pub const DEBOUNCE: u8 = 0x04;
    /// Stop macro engine / halt.
    pub const STOP: u8 = 0x08;
    /// Unlock password.
    pub const UNLOCK_PASSWORD: u8 = 0x0A;
    /// X/Y sensitivity scale (runtime register).
    pub const SENSITIVITY: u8 = 0x0E;
    /// Handshake start and trigger family.
    pub const HANDSHAKE: u8 = 0x25;
    /// Addressed sector-write headers.
    pub const SECTOR: u8 = 0x27;
}

/// An 8-byte feature-report frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandFrame([u8; COMMAND_LEN]);

impl CommandFrame {
    /// Wrap a captured frame verbatim. No checksum is computed.
    pub const fn raw(bytes: [u8; COMMAND_LEN]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8; COMMAND_LEN] {
        &self.0
    }

    pub fn opcode(&self) -> u8 {
        self.0[0]
    }

    /// Whether the last byte matches the checksum of the first seven.
    pub fn has_valid_checksum(&self) -> bool {
        self.0[COMMAND_BODY_LEN] == checksum(&self.0[..COMMAND_BODY_LEN])
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_hex(&self.0))
    }
}

/// Checksum over a command body.
pub fn checksum(body: &[u8]) -> u8 {
    let sum = body.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    0xFFu8.wrapping_sub(sum)
}

/// Build a checksummed command frame.
///
/// Params shorter than 6 bytes are zero-extended before checksumming.
pub fn build_command(opcode: u8, params: &[u8]) -> Result<CommandFrame> {
    if params.len() > MAX_PARAMS {
        return Err(Error::OversizeInput {
            len: params.len() + 1,
            max: COMMAND_BODY_LEN,
        });
    }

    let mut buf = [0u8; COMMAND_LEN];
    buf[0] = opcode;
    buf[1..1 + params.len()].copy_from_slice(params);
    buf[COMMAND_BODY_LEN] = checksum(&buf[..COMMAND_BODY_LEN]);
    Ok(CommandFrame(buf))
}

/// Zero-pad `bytes` to exactly `chunk_size`.
///
/// Never truncates: oversize input is an error.
pub fn build_payload(bytes: &[u8], chunk_size: usize) -> Result<Vec<u8>> {
    if bytes.len() > chunk_size {
        return Err(Error::OversizeInput {
            len: bytes.len(),
            max: chunk_size,
        });
    }
    let mut buf = bytes.to_vec();
    buf.resize(chunk_size, 0);
    Ok(buf)
}

/// Pad `bytes` to `chunk_size * chunk_count` and split into chunks.
pub fn chunk_payload(bytes: &[u8], chunk_size: usize, chunk_count: usize) -> Result<Vec<Vec<u8>>> {
    let padded = build_payload(bytes, chunk_size * chunk_count)?;
    Ok(padded.chunks(chunk_size).map(<[u8]>::to_vec).collect())
}

/// Uppercase hex without separators, the form used in protocol captures.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

/// Parse a hex string (whitespace ignored) into bytes.
pub fn from_hex(s: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = s.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_sum(frame: &CommandFrame) -> u8 {
        frame.bytes().iter().fold(0u8, |a, &b| a.wrapping_add(b))
    }

    #[test]
    fn build_command_appends_checksum() {
        // Runtime polling rate command captured at 1000 Hz: 01 01 00.. FD
        let frame = build_command(opcodes::POLLING_RATE, &[0x01]).unwrap();
        assert_eq!(frame.bytes(), &[0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFD]);
        assert!(frame.has_valid_checksum());
    }

    #[test]
    fn checksum_invariant_holds_for_many_bodies() {
        // Exhaustive over the opcode, a sweep over two params; includes overflow cases.
        for opcode in 0..=255u8 {
            for p in [0x00u8, 0x01, 0x64, 0x80, 0xAA, 0xFF] {
                let frame = build_command(opcode, &[p, p, 0xFF, p, 0xEE, p]).unwrap();
                assert_eq!(frame_sum(&frame), 0xFF, "frame {frame}");
            }
        }
    }

    #[test]
    fn short_params_are_zero_extended() {
        let frame = build_command(opcodes::SENSITIVITY, &[0x64, 0x64]).unwrap();
        assert_eq!(&frame.bytes()[3..7], &[0, 0, 0, 0]);
        assert_eq!(frame.bytes()[7], 0xFFu8.wrapping_sub(0x0E + 0x64 + 0x64));
    }

    #[test]
    fn build_command_rejects_seven_params() {
        let err = build_command(0x01, &[0; 7]).unwrap_err();
        assert!(matches!(err, Error::OversizeInput { len: 8, max: 7 }));
    }

    #[test]
    fn raw_frames_are_not_rechecksummed() {
        let captured = CommandFrame::raw([0x27, 0x2A, 0x85, 0xFF, 0xF0, 0x65, 0x76, 0x36]);
        assert_eq!(captured.to_string(), "272A85FFF0657636");
        assert_eq!(captured.opcode(), opcodes::SECTOR);
    }

    #[test]
    fn build_payload_pads_to_chunk() {
        for len in [0usize, 1, 18, 31, 32] {
            let input: Vec<u8> = (1..=len as u8).collect();
            let out = build_payload(&input, CHUNK_LEN).unwrap();
            assert_eq!(out.len(), CHUNK_LEN);
            assert_eq!(&out[..len], &input[..]);
            assert!(out[len..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn build_payload_rejects_oversize() {
        let err = build_payload(&[0u8; 33], CHUNK_LEN).unwrap_err();
        assert!(matches!(err, Error::OversizeInput { len: 33, max: 32 }));
    }

    #[test]
    fn chunk_payload_splits_macro_blob() {
        let chunks = chunk_payload(&[0xAB; 40], CHUNK_LEN, 4).unwrap();
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.len() == CHUNK_LEN));
        assert_eq!(chunks[1][7], 0xAB);
        assert_eq!(chunks[1][8], 0x00);
        assert!(chunk_payload(&[0; 129], CHUNK_LEN, 4).is_err());
    }

    #[test]
    fn hex_helpers() {
        assert_eq!(from_hex("FF 00 55").unwrap(), vec![0xFF, 0x00, 0x55]);
        assert_eq!(from_hex("ff0055").unwrap(), vec![0xFF, 0x00, 0x55]);
        assert!(from_hex("F").is_none());
        assert!(from_hex("GG").is_none());
        assert_eq!(to_hex(&[0x04, 0x08, 0x0C]), "04080C");
    }
}
