use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Options passed to the reader when collecting a payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollectConfiguration {
    /// When `true` the reader does not prompt the customer for a tip.
    pub skip_tipping: bool,
}

impl CollectConfiguration {
    pub fn new(skip_tipping: bool) -> Self {
        Self { skip_tipping }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalErrorCode {
    ReaderNotConnected,
    ConnectionLost,
    CanceledByCustomer,
    CardReadFailed,
    Declined,
    Unexpected,
}

impl fmt::Display for TerminalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TerminalErrorCode::ReaderNotConnected => "reader_not_connected",
            TerminalErrorCode::ConnectionLost => "connection_lost",
            TerminalErrorCode::CanceledByCustomer => "canceled_by_customer",
            TerminalErrorCode::CardReadFailed => "card_read_failed",
            TerminalErrorCode::Declined => "declined",
            TerminalErrorCode::Unexpected => "unexpected",
        };
        f.write_str(name)
    }
}

/// Failure reported by the terminal SDK for a single call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct TerminalError {
    pub code: TerminalErrorCode,
    pub message: String,
}

impl TerminalError {
    pub fn new(code: TerminalErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A physical card reader known to the terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reader {
    pub serial_number: String,
    pub label: Option<String>,
}

impl Reader {
    pub fn new(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            label: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    NotConnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    NotReady,
    Ready,
    WaitingForInput,
    Processing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_error_display() {
        let err = TerminalError::new(TerminalErrorCode::ConnectionLost, "reader went away");
        assert_eq!(err.to_string(), "connection_lost: reader went away");
    }

    #[test]
    fn test_collect_configuration_defaults_to_tipping() {
        assert!(!CollectConfiguration::default().skip_tipping);
    }
}
