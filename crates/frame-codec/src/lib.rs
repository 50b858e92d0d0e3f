//! CAN Monitor Line Codec
//!
//! Converts the ASCII hex lines an ELM327 adapter prints in monitor mode
//! (`ATMA`) into the fixed binary frame the dashboard client consumes, and
//! into a display row for the live table.

mod error;
mod frame;
mod row;

pub use error::CodecError;
pub use frame::{encode_frame, BinaryFrame, FRAME_HEADER, FRAME_TRAILER, MAX_PAYLOAD};
pub use row::{decode_row, DecodedRow};

/// Number of hex characters forming the CAN identifier prefix
pub const ID_HEX_LEN: usize = 3;

/// Upper-case the line and keep only `[0-9A-F]`.
pub(crate) fn hex_only(text: &str) -> String {
    text.chars()
        .flat_map(char::to_uppercase)
        .filter(|c| c.is_ascii_hexdigit())
        .collect()
}

/// Split a cleaned hex string into identifier and even-length payload.
///
/// Callers guarantee at least [`ID_HEX_LEN`] characters.
pub(crate) fn split_id_payload(hex: &str) -> (&str, &str) {
    let (id, data) = hex.split_at(ID_HEX_LEN);
    let even = data.len() - data.len() % 2;
    (id, &data[..even])
}
