use crate::domain::payment::{PaymentCreationRequest, PaymentIntentId, ReceiptUpdateRequest};
use crate::domain::ports::{PaymentBackendHandle, PaymentTerminalHandle};
use crate::domain::terminal::CollectConfiguration;
use crate::error::{CheckoutError, Result};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Clone)]
struct Attempt {
    id: u64,
    token: CancellationToken,
}

/// Runs the checkout sequences against an injected backend and terminal.
///
/// At most one `create_payment` and one `send_receipt` are in flight at a
/// time. Starting a new one cancels the previous call of the same kind: its
/// pending external call is dropped and it resolves with
/// [`CheckoutError::Cancelled`].
pub struct CheckoutOrchestrator {
    backend: PaymentBackendHandle,
    terminal: PaymentTerminalHandle,
    collect_config: CollectConfiguration,
    scope: CancellationToken,
    next_attempt: AtomicU64,
    create_attempt: Mutex<Option<Attempt>>,
    receipt_attempt: Mutex<Option<Attempt>>,
    payment_intent_id: Mutex<Option<PaymentIntentId>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CheckoutOrchestrator {
    pub fn new(backend: PaymentBackendHandle, terminal: PaymentTerminalHandle) -> Self {
        Self::with_collect_configuration(backend, terminal, CollectConfiguration::default())
    }

    pub fn with_collect_configuration(
        backend: PaymentBackendHandle,
        terminal: PaymentTerminalHandle,
        collect_config: CollectConfiguration,
    ) -> Self {
        Self {
            backend,
            terminal,
            collect_config,
            scope: CancellationToken::new(),
            next_attempt: AtomicU64::new(0),
            create_attempt: Mutex::new(None),
            receipt_attempt: Mutex::new(None),
            payment_intent_id: Mutex::new(None),
        }
    }

    /// Id of the last payment intent that was fully processed.
    pub fn last_payment_intent(&self) -> Option<PaymentIntentId> {
        lock(&self.payment_intent_id).clone()
    }

    /// Cancels everything in flight. Later calls resolve as cancelled.
    pub fn cancel_all(&self) {
        if !self.scope.is_cancelled() {
            info!("cancelling all checkout attempts");
        }
        self.scope.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.scope.is_cancelled()
    }

    /// Creates a payment intent and takes the payment on the reader.
    ///
    /// Steps: backend create, terminal retrieve, collect, process. Resolves
    /// with the intent id once processing succeeded.
    pub async fn create_payment(&self, request: PaymentCreationRequest) -> Result<PaymentIntentId> {
        let attempt = self.begin(&self.create_attempt);
        info!(
            attempt = attempt.id,
            amount = request.amount.minor_units(),
            currency = %request.currency,
            "creating payment"
        );

        let outcome = guarded(&attempt, self.create_and_process(&request)).await;
        self.finish(&self.create_attempt, &attempt);

        let id = self.settle(&attempt, outcome)?;
        self.remember(&attempt, &id)?;
        info!(attempt = attempt.id, payment_intent = %id, "payment processed");
        Ok(id)
    }

    /// Attaches a receipt email to the intent, then captures it.
    ///
    /// Both inputs are checked before any external call is made.
    pub async fn send_receipt(&self, payment_intent_id: &str, email: &str) -> Result<()> {
        let request = ReceiptUpdateRequest::new(PaymentIntentId::new(payment_intent_id)?, email)?;

        let attempt = self.begin(&self.receipt_attempt);
        info!(
            attempt = attempt.id,
            payment_intent = %request.payment_intent_id,
            "sending receipt"
        );

        let outcome = guarded(&attempt, self.update_and_capture(&request)).await;
        self.finish(&self.receipt_attempt, &attempt);

        self.settle(&attempt, outcome)?;
        info!(attempt = attempt.id, "receipt sent and payment captured");
        Ok(())
    }

    async fn create_and_process(
        &self,
        request: &PaymentCreationRequest,
    ) -> Result<PaymentIntentId> {
        let response = self.backend.create_payment_intent(request).await?;
        debug!("create_payment_intent succeeded");

        let intent = self.terminal.retrieve_payment_intent(&response.secret).await?;
        debug!(payment_intent = %intent.id, "retrieve_payment_intent succeeded");

        let intent = self
            .terminal
            .collect_payment_method(intent, &self.collect_config)
            .await?;
        debug!(payment_intent = %intent.id, "collect_payment_method succeeded");

        let intent = self.terminal.process_payment(intent).await?;
        debug!(payment_intent = %intent.id, status = ?intent.status, "process_payment succeeded");

        Ok(intent.id)
    }

    async fn update_and_capture(&self, request: &ReceiptUpdateRequest) -> Result<()> {
        let response = self.backend.update_payment_intent(request).await?;
        debug!("update_payment_intent succeeded");

        let intent = self.terminal.retrieve_payment_intent(&response.secret).await?;
        debug!(payment_intent = %intent.id, "retrieve_payment_intent succeeded");

        self.backend.capture_payment_intent(&intent.id).await?;
        debug!(payment_intent = %intent.id, "capture_payment_intent succeeded");
        Ok(())
    }

    fn begin(&self, slot: &Mutex<Option<Attempt>>) -> Attempt {
        let attempt = Attempt {
            id: self.next_attempt.fetch_add(1, Ordering::Relaxed),
            token: self.scope.child_token(),
        };
        if let Some(previous) = lock(slot).replace(attempt.clone()) {
            debug!(superseded = previous.id, by = attempt.id, "cancelling in-flight attempt");
            previous.token.cancel();
        }
        attempt
    }

    fn finish(&self, slot: &Mutex<Option<Attempt>>, attempt: &Attempt) {
        let mut current = lock(slot);
        if current.as_ref().is_some_and(|a| a.id == attempt.id) {
            *current = None;
        }
    }

    fn settle<T>(&self, attempt: &Attempt, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(_) if attempt.token.is_cancelled() => {
                debug!(attempt = attempt.id, "discarding result of cancelled attempt");
                Err(CheckoutError::Cancelled)
            }
            Ok(value) => Ok(value),
            Err(CheckoutError::Cancelled) => {
                debug!(attempt = attempt.id, "attempt cancelled");
                Err(CheckoutError::Cancelled)
            }
            Err(e) => {
                warn!(attempt = attempt.id, error = %e, "checkout step failed");
                Err(e)
            }
        }
    }

    /// Records `id` unless the attempt was superseded. The cancellation check
    /// holds the same lock as the write.
    fn remember(&self, attempt: &Attempt, id: &PaymentIntentId) -> Result<()> {
        let mut last = lock(&self.payment_intent_id);
        if attempt.token.is_cancelled() {
            debug!(attempt = attempt.id, "discarding result of cancelled attempt");
            return Err(CheckoutError::Cancelled);
        }
        *last = Some(id.clone());
        Ok(())
    }
}

impl Drop for CheckoutOrchestrator {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

async fn guarded<T>(attempt: &Attempt, work: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        _ = attempt.token.cancelled() => Err(CheckoutError::Cancelled),
        result = work => result,
    }
}
