use crate::domain::terminal::TerminalError;
use thiserror::Error;

/// Failures reported by a merchant backend adapter.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
    #[error("{endpoint} returned a malformed response: {reason}")]
    MalformedResponse {
        endpoint: &'static str,
        reason: String,
    },
    #[error("payment intent {0} not found")]
    UnknownPaymentIntent(String),
    #[error("invalid backend configuration: {0}")]
    Config(String),
}

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Terminal error: {0}")]
    Terminal(#[from] TerminalError),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("checkout attempt was cancelled")]
    Cancelled,
}

impl CheckoutError {
    /// Message suitable for the failure callback of a UI trigger.
    ///
    /// Returns `None` when there is nothing worth showing, in which case the
    /// caller falls back to its own generic wording.
    pub fn user_message(&self) -> Option<String> {
        match self {
            CheckoutError::Cancelled => None,
            CheckoutError::Terminal(e) if e.message.trim().is_empty() => None,
            CheckoutError::Terminal(e) => Some(e.message.clone()),
            CheckoutError::Validation(msg) => Some(msg.clone()),
            CheckoutError::Backend(e) => Some(e.to_string()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CheckoutError::Cancelled)
    }
}

pub type Result<T, E = CheckoutError> = std::result::Result<T, E>;
