use thiserror::Error;

use crate::models::{ShipClass, Side};

// ── ParseError ────────────────────────────────────────────────────────────────

/// What was wrong with a battle report document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The content is not a battle report at all.
    NotAReport,
    /// A required section is missing.
    MissingSection,
    /// The document declares a schema version we do not understand.
    UnsupportedVersion,
    /// A numeric field could not be read.
    InvalidNumber,
    /// A field holds a value of the wrong shape.
    InvalidValue,
}

/// Malformed or unsupported report content.
///
/// The message is built only from fixed wording and is shown to end users
/// verbatim, so it never carries source data, offsets or library errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    kind: ParseErrorKind,
    message: String,
}

impl ParseError {
    pub fn not_a_report() -> Self {
        Self {
            kind: ParseErrorKind::NotAReport,
            message: "The link does not point to a battle report.".to_string(),
        }
    }

    /// `section` is a plain-language name such as `"the attacker"`.
    pub fn missing_section(section: &'static str) -> Self {
        Self {
            kind: ParseErrorKind::MissingSection,
            message: format!("The battle report is incomplete: {} is missing.", section),
        }
    }

    pub fn unsupported_version() -> Self {
        Self {
            kind: ParseErrorKind::UnsupportedVersion,
            message: "This battle report uses a format version that is not supported.".to_string(),
        }
    }

    pub fn invalid_number(section: &'static str) -> Self {
        Self {
            kind: ParseErrorKind::InvalidNumber,
            message: format!(
                "The battle report contains an unreadable number in {}.",
                section
            ),
        }
    }

    pub fn invalid_value(section: &'static str) -> Self {
        Self {
            kind: ParseErrorKind::InvalidValue,
            message: format!(
                "The battle report contains an invalid entry in {}.",
                section
            ),
        }
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    /// Text safe for direct display to the end user.
    pub fn message(&self) -> &str {
        &self.message
    }
}

// ── InvariantViolation ────────────────────────────────────────────────────────

/// A report whose surviving tally exceeds its fighting tally.
///
/// Never shown to users; logged and surfaced as a generic failure.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("inconsistent tallies for {side:?}/{class:?}: surviving {metric} {surviving} exceeds fighting {fighting}")]
pub struct InvariantViolation {
    pub side: Side,
    pub class: ShipClass,
    pub metric: &'static str,
    pub fighting: f64,
    pub surviving: f64,
}

// ── RelayError ────────────────────────────────────────────────────────────────

/// Errors shared across the relay crates.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Report content did not match the expected structure.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Parsed tallies broke the destroyed = fighting − surviving rule.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    /// A format selector string is not one of `text`, `oneline`, `bargraph`.
    #[error("Unknown report format: {0}")]
    UnknownFormat(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the relay crates.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_messages_are_plain() {
        let err = ParseError::missing_section("the attacker");
        assert_eq!(
            err.to_string(),
            "The battle report is incomplete: the attacker is missing."
        );
        assert_eq!(err.kind(), ParseErrorKind::MissingSection);
        assert_eq!(err.message(), err.to_string());
    }

    #[test]
    fn test_parse_error_not_a_report() {
        let err = ParseError::not_a_report();
        assert_eq!(err.kind(), ParseErrorKind::NotAReport);
        assert!(err.message().starts_with("The link"));
    }

    #[test]
    fn test_parse_error_invalid_number() {
        let err = ParseError::invalid_number("the fleet overview");
        assert_eq!(
            err.to_string(),
            "The battle report contains an unreadable number in the fleet overview."
        );
    }

    #[test]
    fn test_invariant_display() {
        let err = InvariantViolation {
            side: Side::Attacker,
            class: ShipClass::Heavy,
            metric: "count",
            fighting: 2.0,
            surviving: 3.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("Attacker/Heavy"));
        assert!(msg.contains("surviving count 3 exceeds fighting 2"));
    }

    #[test]
    fn test_relay_error_from_parse_is_transparent() {
        let err: RelayError = ParseError::unsupported_version().into();
        assert_eq!(
            err.to_string(),
            "This battle report uses a format version that is not supported."
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = RelayError::Config("missing guild".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing guild");
    }

    #[test]
    fn test_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: RelayError = io.into();
        assert_eq!(err.to_string(), "denied");
    }
}
