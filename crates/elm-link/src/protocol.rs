//! Adapter Bus Protocol Selection

use serde::{Deserialize, Serialize};

/// Bus protocol pinned with `ATSP<n>` when the command file is seeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObdProtocol {
    Auto,
    J1850Pwm,
    J1850Vpw,
    Iso9141_2,
    Iso14230_4Kwp,
    Iso14230_4KwpFast,
    #[default]
    Iso15765_4Can11bit500,
    Iso15765_4Can29bit500,
    Iso15765_4Can11bit250,
    Iso15765_4Can29bit250,
}

impl ObdProtocol {
    /// Protocol number the adapter uses for this bus
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Command that pins the adapter to this bus, e.g. `ATSP6`
    pub fn select_command(self) -> String {
        format!("ATSP{}", self.number())
    }

    /// Whether monitor lines start with a 3-hex-digit identifier, which is
    /// what the dashboard frame carries
    pub fn has_short_ids(self) -> bool {
        matches!(
            self,
            ObdProtocol::Iso15765_4Can11bit500 | ObdProtocol::Iso15765_4Can11bit250
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selects_11bit_500k() {
        let protocol = ObdProtocol::default();
        assert_eq!(protocol.select_command(), "ATSP6");
        assert!(protocol.has_short_ids());
    }

    #[test]
    fn test_numbering_follows_adapter_table() {
        assert_eq!(ObdProtocol::Auto.select_command(), "ATSP0");
        assert_eq!(ObdProtocol::Iso15765_4Can29bit250.number(), 9);
        assert!(!ObdProtocol::Iso15765_4Can29bit500.has_short_ids());
        assert!(!ObdProtocol::J1850Pwm.has_short_ids());
    }
}
