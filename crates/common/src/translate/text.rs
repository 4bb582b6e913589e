// Transmission hygiene for caller-supplied strings.

use crate::error::ClientError;

/// Whether `text` may be sent to the server as is.
///
/// NUL and C0 control characters other than tab, LF and CR are refused, as
/// are the noncharacters U+FFFE and U+FFFF.
#[must_use]
pub fn clean_input_string(text: &str) -> bool {
    text.chars().all(|ch| match ch {
        '\t' | '\n' | '\r' => true,
        '\u{0}'..='\u{1f}' => false,
        '\u{fffe}' | '\u{ffff}' => false,
        _ => true,
    })
}

/// Checks `text`, failing with `message` as a 400 validation error.
pub fn require_clean(text: &str, message: &str) -> Result<(), ClientError> {
    if clean_input_string(text) { Ok(()) } else { Err(ClientError::validation(message)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_text_and_whitespace() {
        assert!(clean_input_string("Shipping to 221B Baker St.\n\tLondon\r\n"));
        assert!(clean_input_string("Łódź 東京"));
        assert!(clean_input_string(""));
    }

    #[test]
    fn rejects_control_and_noncharacters() {
        assert!(!clean_input_string("a\u{0}b"));
        assert!(!clean_input_string("bell\u{7}"));
        assert!(!clean_input_string("\u{fffe}"));
        assert!(!clean_input_string("\u{ffff}"));
    }

    #[test]
    fn require_clean_reports_field_message() {
        let err = require_clean("x\u{1}", "City must be encoded in UTF-8").expect_err("should fail");
        assert_eq!(err.to_string(), "400: City must be encoded in UTF-8");
    }
}
