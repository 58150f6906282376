//! Adapters implementing the domain ports.

pub mod http_backend;
pub mod listener;
pub mod simulated;

use crate::config::CheckoutConfig;
use crate::domain::ports::PaymentBackendHandle;
use crate::error::BackendError;
use http_backend::HttpPaymentBackend;
use simulated::{InMemoryPaymentBackend, IntentLedger};
use std::sync::Arc;

/// Picks the backend adapter named by `config`.
///
/// Without a backend URL the in-memory backend is used, sharing `ledger` with
/// the simulated reader.
pub fn backend_from_config(
    config: &CheckoutConfig,
    ledger: &IntentLedger,
) -> Result<PaymentBackendHandle, BackendError> {
    match &config.backend {
        Some(backend) => Ok(Arc::new(HttpPaymentBackend::new(backend)?)),
        None => Ok(Arc::new(InMemoryPaymentBackend::new(ledger.clone()))),
    }
}
