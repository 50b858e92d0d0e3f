//! Display Row Decoding

use crate::{hex_only, split_id_payload, ID_HEX_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A monitor line split into identifier and byte tokens for display.
///
/// Unlike [`crate::encode_frame`], decoding keeps every payload byte and
/// ignores the noise ratio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedRow {
    /// Three upper-case hex characters
    pub id: String,
    /// Payload bytes as two-character hex tokens, in order
    pub bytes: Vec<String>,
}

/// Decode a monitor line, or `None` if it has fewer than 3 hex characters
pub fn decode_row(raw: &str) -> Option<DecodedRow> {
    let hex = hex_only(raw);
    if hex.len() < ID_HEX_LEN {
        return None;
    }
    let (id, data) = split_id_payload(&hex);
    let bytes = data
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect();
    Some(DecodedRow {
        id: id.to_string(),
        bytes,
    })
}

impl fmt::Display for DecodedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID {} ", self.id)?;
        if self.bytes.is_empty() {
            write!(f, "-")
        } else {
            write!(f, "{}", self.bytes.join(" "))
        }
    }
}
