//! Protocol Tokens and Response Classification

use std::fmt;

/// Identification banner printed by the adapter on reset and `ATI`
const BANNER_MARKER: &str = "ELM327";

/// One unit of adapter output: a trimmed line or the `>` prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Non-empty line content, carriage returns removed and trimmed
    Line(String),
    /// The adapter is ready for the next command
    Prompt,
}

impl Token {
    /// Text of the prompt marker
    pub const PROMPT: &'static str = ">";

    /// Build a line token, or `None` if nothing remains after trimming
    pub fn line(raw: &str) -> Option<Self> {
        let cleaned = raw.replace('\r', "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            None
        } else {
            Some(Token::Line(cleaned.to_string()))
        }
    }

    /// Token text as received
    pub fn as_str(&self) -> &str {
        match self {
            Token::Line(text) => text,
            Token::Prompt => Self::PROMPT,
        }
    }

    /// Whether this is the prompt marker
    pub fn is_prompt(&self) -> bool {
        matches!(self, Token::Prompt)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adapter replies that settle a pending command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Ok,
    Error,
    NoData,
    Banner,
    Prompt,
}

impl ResponseClass {
    /// Classify a token, checking markers in fixed priority order.
    /// Returns `None` for ordinary data lines.
    pub fn classify(token: &Token) -> Option<Self> {
        let text = match token {
            Token::Prompt => return Some(ResponseClass::Prompt),
            Token::Line(text) => text,
        };

        if text.eq_ignore_ascii_case("OK") {
            Some(ResponseClass::Ok)
        } else if text.eq_ignore_ascii_case("ERROR") {
            Some(ResponseClass::Error)
        } else if text.eq_ignore_ascii_case("NO DATA") {
            Some(ResponseClass::NoData)
        } else if text.to_ascii_uppercase().contains(BANNER_MARKER) {
            Some(ResponseClass::Banner)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_trims_and_strips_cr() {
        assert_eq!(Token::line("  41 0C\r "), Some(Token::Line("41 0C".into())));
        assert_eq!(Token::line(" \r\t"), None);
        assert_eq!(Token::line(""), None);
    }

    #[test]
    fn test_classify_markers() {
        let classify = |s: &str| ResponseClass::classify(&Token::Line(s.into()));
        assert_eq!(classify("ok"), Some(ResponseClass::Ok));
        assert_eq!(classify("ERROR"), Some(ResponseClass::Error));
        assert_eq!(classify("No Data"), Some(ResponseClass::NoData));
        assert_eq!(classify("elm327 v1.5"), Some(ResponseClass::Banner));
        assert_eq!(classify("SEARCHING..."), None);
        assert_eq!(classify("OK?"), None);
        assert_eq!(
            ResponseClass::classify(&Token::Prompt),
            Some(ResponseClass::Prompt)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Token::Prompt.to_string(), ">");
        assert_eq!(Token::Line("7E8".into()).to_string(), "7E8");
    }
}
