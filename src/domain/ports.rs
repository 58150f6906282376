use super::payment::{
    ClientSecret, PaymentCreationRequest, PaymentIntent, PaymentIntentCreationResponse,
    PaymentIntentId, ReceiptUpdateRequest,
};
use super::terminal::{CollectConfiguration, ConnectionStatus, PaymentStatus, Reader, TerminalError};
use crate::error::BackendError;
use async_trait::async_trait;
use std::sync::Arc;

/// The merchant backend that owns payment intents server-side.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    async fn create_payment_intent(
        &self,
        request: &PaymentCreationRequest,
    ) -> Result<PaymentIntentCreationResponse, BackendError>;

    async fn update_payment_intent(
        &self,
        request: &ReceiptUpdateRequest,
    ) -> Result<PaymentIntentCreationResponse, BackendError>;

    async fn capture_payment_intent(&self, id: &PaymentIntentId) -> Result<(), BackendError>;
}

/// The payment-terminal SDK driving a connected reader.
///
/// Each call resolves once. Dropping the returned future abandons the call.
#[async_trait]
pub trait PaymentTerminal: Send + Sync {
    async fn retrieve_payment_intent(
        &self,
        secret: &ClientSecret,
    ) -> Result<PaymentIntent, TerminalError>;

    async fn collect_payment_method(
        &self,
        intent: PaymentIntent,
        config: &CollectConfiguration,
    ) -> Result<PaymentIntent, TerminalError>;

    async fn process_payment(&self, intent: PaymentIntent) -> Result<PaymentIntent, TerminalError>;
}

/// Receives reader and payment events pushed by the terminal.
pub trait TerminalListener: Send + Sync {
    fn on_unexpected_reader_disconnect(&self, reader: &Reader);
    fn on_connection_status_change(&self, status: ConnectionStatus);
    fn on_payment_status_change(&self, status: PaymentStatus);
}

pub type PaymentBackendHandle = Arc<dyn PaymentBackend>;
pub type PaymentTerminalHandle = Arc<dyn PaymentTerminal>;
pub type TerminalListenerHandle = Arc<dyn TerminalListener>;
