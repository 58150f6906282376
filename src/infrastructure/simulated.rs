use crate::domain::payment::{
    ClientSecret, PaymentCreationRequest, PaymentIntent, PaymentIntentCreationResponse,
    PaymentIntentId, PaymentIntentStatus, ReceiptUpdateRequest,
};
use crate::domain::ports::{PaymentBackend, PaymentTerminal, TerminalListenerHandle};
use crate::domain::terminal::{
    CollectConfiguration, ConnectionStatus, PaymentStatus, Reader, TerminalError,
    TerminalErrorCode,
};
use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Clone)]
struct StoredIntent {
    intent: PaymentIntent,
    secret: ClientSecret,
}

/// Shared record of payment intents used by the simulated adapters.
///
/// Uses `Arc<RwLock<HashMap<..>>>` so the in-memory backend and the simulated
/// reader see the same intents. Cloning shares the underlying map.
#[derive(Default, Clone)]
pub struct IntentLedger {
    intents: Arc<RwLock<HashMap<PaymentIntentId, StoredIntent>>>,
    sequence: Arc<AtomicU64>,
}

impl IntentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &PaymentIntentId) -> Option<PaymentIntent> {
        let intents = self.intents.read().await;
        intents.get(id).map(|stored| stored.intent.clone())
    }

    pub async fn len(&self) -> usize {
        self.intents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.intents.read().await.is_empty()
    }

    async fn create(&self, request: &PaymentCreationRequest) -> (PaymentIntentId, ClientSecret) {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let id = PaymentIntentId::from_raw(format!("pi_sim_{n}"));
        let secret = ClientSecret::new(format!("{id}_secret_{n:08x}"));
        let intent = PaymentIntent {
            id: id.clone(),
            amount: request.amount.minor_units(),
            currency: request.currency.to_string(),
            status: PaymentIntentStatus::RequiresPaymentMethod,
            receipt_email: None,
        };
        self.intents.write().await.insert(
            id.clone(),
            StoredIntent {
                intent,
                secret: secret.clone(),
            },
        );
        (id, secret)
    }

    async fn find_by_secret(&self, secret: &ClientSecret) -> Option<PaymentIntent> {
        let intents = self.intents.read().await;
        intents
            .values()
            .find(|stored| &stored.secret == secret)
            .map(|stored| stored.intent.clone())
    }

    async fn secret_of(&self, id: &PaymentIntentId) -> Option<ClientSecret> {
        let intents = self.intents.read().await;
        intents.get(id).map(|stored| stored.secret.clone())
    }

    async fn put(&self, intent: PaymentIntent, secret: &ClientSecret) {
        let mut intents = self.intents.write().await;
        intents.insert(
            intent.id.clone(),
            StoredIntent {
                intent,
                secret: secret.clone(),
            },
        );
    }

    async fn update<F>(&self, id: &PaymentIntentId, f: F) -> Option<PaymentIntent>
    where
        F: FnOnce(&mut PaymentIntent),
    {
        let mut intents = self.intents.write().await;
        let stored = intents.get_mut(id)?;
        f(&mut stored.intent);
        Some(stored.intent.clone())
    }
}

/// A merchant backend kept entirely in memory.
#[derive(Clone)]
pub struct InMemoryPaymentBackend {
    ledger: IntentLedger,
}

impl InMemoryPaymentBackend {
    pub fn new(ledger: IntentLedger) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl PaymentBackend for InMemoryPaymentBackend {
    async fn create_payment_intent(
        &self,
        request: &PaymentCreationRequest,
    ) -> Result<PaymentIntentCreationResponse, BackendError> {
        let (id, secret) = self.ledger.create(request).await;
        debug!(payment_intent = %id, "in-memory backend created payment intent");
        Ok(PaymentIntentCreationResponse {
            secret,
            intent: Some(id.to_string()),
        })
    }

    async fn update_payment_intent(
        &self,
        request: &ReceiptUpdateRequest,
    ) -> Result<PaymentIntentCreationResponse, BackendError> {
        let id = &request.payment_intent_id;
        let email = request.receipt_email.to_string();
        self.ledger
            .update(id, |intent| intent.receipt_email = Some(email))
            .await
            .ok_or_else(|| BackendError::UnknownPaymentIntent(id.to_string()))?;
        let secret = self
            .ledger
            .secret_of(id)
            .await
            .ok_or_else(|| BackendError::UnknownPaymentIntent(id.to_string()))?;
        Ok(PaymentIntentCreationResponse {
            secret,
            intent: Some(id.to_string()),
        })
    }

    async fn capture_payment_intent(&self, id: &PaymentIntentId) -> Result<(), BackendError> {
        let intent = self
            .ledger
            .get(id)
            .await
            .ok_or_else(|| BackendError::UnknownPaymentIntent(id.to_string()))?;
        if intent.status != PaymentIntentStatus::RequiresCapture {
            return Err(BackendError::Status {
                endpoint: "capture_payment_intent",
                status: 400,
                body: format!("payment intent {} is {:?}", id, intent.status),
            });
        }
        self.ledger
            .update(id, |intent| intent.status = PaymentIntentStatus::Succeeded)
            .await;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Step {
    Retrieve,
    Collect,
    Process,
}

/// A stand-in for the vendor terminal SDK and a connected reader.
///
/// Intents are looked up in the shared [`IntentLedger`]. A client secret the
/// ledger does not know is accepted when it has the `<id>_secret_<nonce>`
/// shape, so the reader also works against a remote backend.
pub struct SimulatedTerminal {
    ledger: IntentLedger,
    latency: Duration,
    reader: Mutex<Option<Reader>>,
    listener: Mutex<Option<TerminalListenerHandle>>,
    failures: Mutex<HashMap<Step, TerminalError>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedTerminal {
    pub fn new(ledger: IntentLedger) -> Self {
        Self {
            ledger,
            latency: Duration::ZERO,
            reader: Mutex::new(None),
            listener: Mutex::new(None),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Delay applied to every reader call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_listener(&self, listener: TerminalListenerHandle) {
        *lock(&self.listener) = Some(listener);
    }

    pub fn connect_reader(&self, reader: Reader) {
        self.notify_connection(ConnectionStatus::Connecting);
        *lock(&self.reader) = Some(reader);
        self.notify_connection(ConnectionStatus::Connected);
        self.notify_payment(PaymentStatus::Ready);
    }

    pub fn connected_reader(&self) -> Option<Reader> {
        lock(&self.reader).clone()
    }

    /// Simulates the reader dropping off without being asked to.
    pub fn disconnect_unexpectedly(&self) {
        let Some(reader) = lock(&self.reader).take() else {
            return;
        };
        if let Some(listener) = self.listener() {
            listener.on_unexpected_reader_disconnect(&reader);
        }
        self.notify_connection(ConnectionStatus::NotConnected);
        self.notify_payment(PaymentStatus::NotReady);
    }

    pub fn fail_next_retrieve(&self, code: TerminalErrorCode, message: &str) {
        self.fail_next(Step::Retrieve, code, message);
    }

    pub fn fail_next_collect(&self, code: TerminalErrorCode, message: &str) {
        self.fail_next(Step::Collect, code, message);
    }

    pub fn fail_next_process(&self, code: TerminalErrorCode, message: &str) {
        self.fail_next(Step::Process, code, message);
    }

    fn fail_next(&self, step: Step, code: TerminalErrorCode, message: &str) {
        lock(&self.failures).insert(step, TerminalError::new(code, message));
    }

    fn take_failure(&self, step: Step) -> Result<(), TerminalError> {
        match lock(&self.failures).remove(&step) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn listener(&self) -> Option<TerminalListenerHandle> {
        lock(&self.listener).clone()
    }

    fn notify_connection(&self, status: ConnectionStatus) {
        if let Some(listener) = self.listener() {
            listener.on_connection_status_change(status);
        }
    }

    fn notify_payment(&self, status: PaymentStatus) {
        if let Some(listener) = self.listener() {
            listener.on_payment_status_change(status);
        }
    }

    fn require_reader(&self) -> Result<(), TerminalError> {
        if lock(&self.reader).is_some() {
            Ok(())
        } else {
            Err(TerminalError::new(
                TerminalErrorCode::ReaderNotConnected,
                "No reader is connected",
            ))
        }
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    async fn transition(
        &self,
        intent: PaymentIntent,
        expected: PaymentIntentStatus,
        next: PaymentIntentStatus,
    ) -> Result<PaymentIntent, TerminalError> {
        if intent.status != expected {
            return Err(TerminalError::new(
                TerminalErrorCode::Unexpected,
                format!(
                    "payment intent {} is {:?}, expected {:?}",
                    intent.id, intent.status, expected
                ),
            ));
        }
        self.ledger
            .update(&intent.id, |stored| stored.status = next)
            .await
            .ok_or_else(|| {
                TerminalError::new(
                    TerminalErrorCode::Unexpected,
                    format!("payment intent {} is unknown to the reader", intent.id),
                )
            })
    }
}

#[async_trait]
impl PaymentTerminal for SimulatedTerminal {
    async fn retrieve_payment_intent(
        &self,
        secret: &ClientSecret,
    ) -> Result<PaymentIntent, TerminalError> {
        self.pause().await;
        self.take_failure(Step::Retrieve)?;

        if let Some(intent) = self.ledger.find_by_secret(secret).await {
            return Ok(intent);
        }

        let id = secret
            .intent_id()
            .and_then(|id| PaymentIntentId::new(id).ok())
            .ok_or_else(|| {
                TerminalError::new(
                    TerminalErrorCode::Unexpected,
                    "No such payment intent for the given client secret",
                )
            })?;
        debug!(payment_intent = %id, "reader resolved intent from client secret");
        let intent = match self.ledger.get(&id).await {
            Some(intent) => intent,
            None => PaymentIntent {
                id,
                amount: 0,
                currency: String::new(),
                status: PaymentIntentStatus::RequiresPaymentMethod,
                receipt_email: None,
            },
        };
        self.ledger.put(intent.clone(), secret).await;
        Ok(intent)
    }

    async fn collect_payment_method(
        &self,
        intent: PaymentIntent,
        config: &CollectConfiguration,
    ) -> Result<PaymentIntent, TerminalError> {
        self.require_reader()?;
        self.notify_payment(PaymentStatus::WaitingForInput);
        debug!(payment_intent = %intent.id, skip_tipping = config.skip_tipping, "waiting for card");
        self.pause().await;

        let result = match self.take_failure(Step::Collect) {
            Ok(()) => {
                self.transition(
                    intent,
                    PaymentIntentStatus::RequiresPaymentMethod,
                    PaymentIntentStatus::RequiresConfirmation,
                )
                .await
            }
            Err(e) => Err(e),
        };
        self.notify_payment(PaymentStatus::Ready);
        result
    }

    async fn process_payment(&self, intent: PaymentIntent) -> Result<PaymentIntent, TerminalError> {
        self.require_reader()?;
        self.notify_payment(PaymentStatus::Processing);
        self.pause().await;

        let result = match self.take_failure(Step::Process) {
            Ok(()) => {
                self.transition(
                    intent,
                    PaymentIntentStatus::RequiresConfirmation,
                    PaymentIntentStatus::RequiresCapture,
                )
                .await
            }
            Err(e) => Err(e),
        };
        self.notify_payment(PaymentStatus::Ready);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::TerminalListener;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<String>>,
    }

    impl TerminalListener for RecordingListener {
        fn on_unexpected_reader_disconnect(&self, reader: &Reader) {
            lock(&self.events).push(format!("disconnect:{}", reader.serial_number));
        }

        fn on_connection_status_change(&self, status: ConnectionStatus) {
            lock(&self.events).push(format!("connection:{:?}", status));
        }

        fn on_payment_status_change(&self, status: PaymentStatus) {
            lock(&self.events).push(format!("payment:{:?}", status));
        }
    }

    fn request() -> PaymentCreationRequest {
        PaymentCreationRequest::new(1000, "usd").unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_backend_creates_distinct_intents() {
        let ledger = IntentLedger::new();
        let backend = InMemoryPaymentBackend::new(ledger.clone());

        let first = backend.create_payment_intent(&request()).await.unwrap();
        let second = backend.create_payment_intent(&request()).await.unwrap();

        assert_ne!(first.intent, second.intent);
        assert_eq!(ledger.len().await, 2);
        assert_eq!(first.secret.intent_id(), first.intent.as_deref());
    }

    #[tokio::test]
    async fn test_capture_requires_processed_intent() {
        let ledger = IntentLedger::new();
        let backend = InMemoryPaymentBackend::new(ledger.clone());
        let response = backend.create_payment_intent(&request()).await.unwrap();
        let id = PaymentIntentId::new(response.intent.unwrap()).unwrap();

        let err = backend.capture_payment_intent(&id).await.unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 400, .. }));

        let unknown = PaymentIntentId::new("pi_missing").unwrap();
        let err = backend.capture_payment_intent(&unknown).await.unwrap_err();
        assert!(matches!(err, BackendError::UnknownPaymentIntent(_)));
    }

    #[tokio::test]
    async fn test_terminal_walks_intent_through_statuses() {
        let ledger = IntentLedger::new();
        let backend = InMemoryPaymentBackend::new(ledger.clone());
        let terminal = SimulatedTerminal::new(ledger.clone());
        terminal.connect_reader(Reader::new("SIM-0001"));

        let response = backend.create_payment_intent(&request()).await.unwrap();
        let intent = terminal.retrieve_payment_intent(&response.secret).await.unwrap();
        assert_eq!(intent.status, PaymentIntentStatus::RequiresPaymentMethod);
        assert_eq!(intent.amount, 1000);

        let intent = terminal
            .collect_payment_method(intent, &CollectConfiguration::default())
            .await
            .unwrap();
        assert_eq!(intent.status, PaymentIntentStatus::RequiresConfirmation);

        let intent = terminal.process_payment(intent).await.unwrap();
        assert_eq!(intent.status, PaymentIntentStatus::RequiresCapture);

        backend.capture_payment_intent(&intent.id).await.unwrap();
        assert_eq!(
            ledger.get(&intent.id).await.unwrap().status,
            PaymentIntentStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn test_collect_without_reader_fails() {
        let ledger = IntentLedger::new();
        let backend = InMemoryPaymentBackend::new(ledger.clone());
        let terminal = SimulatedTerminal::new(ledger);

        let response = backend.create_payment_intent(&request()).await.unwrap();
        let intent = terminal.retrieve_payment_intent(&response.secret).await.unwrap();
        let err = terminal
            .collect_payment_method(intent, &CollectConfiguration::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, TerminalErrorCode::ReaderNotConnected);
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let terminal = SimulatedTerminal::new(IntentLedger::new());
        terminal.fail_next_retrieve(TerminalErrorCode::ConnectionLost, "lost");

        let secret = ClientSecret::new("pi_remote_secret_1");
        let err = terminal.retrieve_payment_intent(&secret).await.unwrap_err();
        assert_eq!(err.code, TerminalErrorCode::ConnectionLost);

        let intent = terminal.retrieve_payment_intent(&secret).await.unwrap();
        assert_eq!(intent.id.as_str(), "pi_remote");
    }

    #[tokio::test]
    async fn test_unknown_opaque_secret_is_rejected() {
        let terminal = SimulatedTerminal::new(IntentLedger::new());
        let err = terminal
            .retrieve_payment_intent(&ClientSecret::new("opaque"))
            .await
            .unwrap_err();
        assert_eq!(err.code, TerminalErrorCode::Unexpected);
    }

    #[tokio::test]
    async fn test_listener_sees_reader_events() {
        let listener = Arc::new(RecordingListener::default());
        let terminal = SimulatedTerminal::new(IntentLedger::new());
        terminal.set_listener(listener.clone());

        terminal.connect_reader(Reader::new("SIM-0001"));
        terminal.disconnect_unexpectedly();
        terminal.disconnect_unexpectedly();

        let events = lock(&listener.events).clone();
        assert_eq!(
            events,
            vec![
                "connection:Connecting",
                "connection:Connected",
                "payment:Ready",
                "disconnect:SIM-0001",
                "connection:NotConnected",
                "payment:NotReady",
            ]
        );
        assert!(terminal.connected_reader().is_none());
    }
}
