//! Binary Dashboard Frame

use crate::error::CodecError;
use crate::{hex_only, split_id_payload};
use serde::{Deserialize, Serialize};

/// First byte of every frame on the wire
pub const FRAME_HEADER: u8 = 0xAA;
/// Last byte of every frame on the wire
pub const FRAME_TRAILER: u8 = 0x55;
/// Maximum payload bytes per frame
pub const MAX_PAYLOAD: usize = 8;

/// Lines with a higher share of removed characters are rejected
const MAX_JUNK_RATIO: f64 = 0.4;

/// A CAN observation in dashboard wire layout:
/// `[0xAA][ID_high][ID_low][LEN][payload..LEN][0x55]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryFrame {
    id: u16,
    len: u8,
    data: [u8; MAX_PAYLOAD],
}

impl BinaryFrame {
    /// Build a frame, rejecting payloads over [`MAX_PAYLOAD`] bytes
    pub fn new(id: u16, payload: &[u8]) -> Result<Self, CodecError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(CodecError::PayloadTooLong {
                bytes: payload.len(),
            });
        }
        let mut data = [0u8; MAX_PAYLOAD];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            id,
            len: payload.len() as u8,
            data,
        })
    }

    /// CAN identifier
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Value of the length byte
    pub fn len(&self) -> u8 {
        self.len
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Only frames carrying data are sent to the dashboard
    pub fn is_forwardable(&self) -> bool {
        self.len > 0
    }

    /// Size on the wire (5 + payload length)
    pub fn wire_len(&self) -> usize {
        5 + self.len as usize
    }

    /// Serialize to wire bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        out.push(FRAME_HEADER);
        out.extend_from_slice(&self.id.to_be_bytes());
        out.push(self.len);
        out.extend_from_slice(self.payload());
        out.push(FRAME_TRAILER);
        out
    }
}

/// Convert one monitor line to a binary frame.
///
/// Whitespace is collapsed before measuring noise: a line where more than
/// 40% of the remaining characters are not hex digits is rejected as a
/// diagnostic message or aborted frame.
pub fn encode_frame(raw: &str) -> Result<BinaryFrame, CodecError> {
    let collapsed: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();
    let total = collapsed.chars().count();
    if total == 0 {
        return Err(CodecError::Empty);
    }

    let hex = hex_only(&collapsed);
    if hex.len() < crate::ID_HEX_LEN {
        return Err(CodecError::TooShort { found: hex.len() });
    }

    let ratio = (total - hex.len()) as f64 / total as f64;
    if ratio > MAX_JUNK_RATIO {
        return Err(CodecError::Noisy {
            ratio,
            limit: MAX_JUNK_RATIO,
        });
    }

    let (id, data) = split_id_payload(&hex);
    let data = &data[..data.len().min(MAX_PAYLOAD * 2)];

    let id = u16::from_str_radix(id, 16).map_err(|_| CodecError::BadIdentifier(id.to_string()))?;
    let payload = data
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            // Both characters are ASCII hex digits at this point
            let pair = std::str::from_utf8(pair).unwrap_or("00");
            u8::from_str_radix(pair, 16).unwrap_or(0)
        })
        .collect::<Vec<u8>>();

    BinaryFrame::new(id, &payload)
}
