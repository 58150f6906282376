use super::throttle::ClickThrottle;
use crate::application::checkout::CheckoutOrchestrator;
use crate::domain::email::EmailAddress;
use crate::domain::payment::{PaymentCreationRequest, PaymentIntentId};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

pub const RECEIPT_SENT_MESSAGE: &str = "Receipt email sent";

/// Callback-based trigger surface for a checkout screen.
///
/// Each accepted trigger runs on its own task and resolves exactly one of its
/// callbacks. A newer trigger of the same kind aborts the older task, and
/// closing the screen aborts everything; aborted triggers fire no callback.
pub struct CheckoutScreen {
    orchestrator: Arc<CheckoutOrchestrator>,
    create_throttle: ClickThrottle,
    receipt_throttle: ClickThrottle,
    create_task: Mutex<Option<AbortHandle>>,
    receipt_task: Mutex<Option<AbortHandle>>,
}

impl CheckoutScreen {
    pub fn new(orchestrator: Arc<CheckoutOrchestrator>) -> Self {
        Self {
            orchestrator,
            create_throttle: ClickThrottle::default(),
            receipt_throttle: ClickThrottle::default(),
            create_task: Mutex::new(None),
            receipt_task: Mutex::new(None),
        }
    }

    pub fn with_throttle_window(mut self, window: Duration) -> Self {
        self.create_throttle = ClickThrottle::new(window);
        self.receipt_throttle = ClickThrottle::new(window);
        self
    }

    /// Must be called from within a tokio runtime.
    pub fn create_payment_intent<S, F>(
        &self,
        request: PaymentCreationRequest,
        on_success: S,
        on_failure: F,
    ) -> Option<JoinHandle<()>>
    where
        S: FnOnce(PaymentIntentId) + Send + 'static,
        F: FnOnce(Option<String>) + Send + 'static,
    {
        if !self.create_throttle.try_acquire() {
            debug!("ignoring repeated payment trigger");
            return None;
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let handle = tokio::spawn(async move {
            match orchestrator.create_payment(request).await {
                Ok(id) => on_success(id),
                Err(e) if e.is_cancelled() => {}
                Err(e) => on_failure(e.user_message()),
            }
        });
        replace_task(&self.create_task, handle.abort_handle());
        Some(handle)
    }

    /// Must be called from within a tokio runtime.
    ///
    /// A blank intent id or an input that fails the email-shape check is
    /// reported straight to `on_failure` without starting a task.
    pub fn update_receipt_email<S, F>(
        &self,
        payment_intent_id: &str,
        raw_email: &str,
        on_success: S,
        on_failure: F,
    ) -> Option<JoinHandle<()>>
    where
        S: FnOnce(String) + Send + 'static,
        F: FnOnce(Option<String>) + Send + 'static,
    {
        let local_check = PaymentIntentId::new(payment_intent_id)
            .and_then(|_| EmailAddress::parse(raw_email));
        if let Err(e) = local_check {
            on_failure(e.user_message());
            return None;
        }
        if !self.receipt_throttle.try_acquire() {
            debug!("ignoring repeated receipt trigger");
            return None;
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let payment_intent_id = payment_intent_id.to_string();
        let email = raw_email.trim().to_string();
        let handle = tokio::spawn(async move {
            match orchestrator.send_receipt(&payment_intent_id, &email).await {
                Ok(()) => on_success(RECEIPT_SENT_MESSAGE.to_string()),
                Err(e) if e.is_cancelled() => {}
                Err(e) => on_failure(e.user_message()),
            }
        });
        replace_task(&self.receipt_task, handle.abort_handle());
        Some(handle)
    }

    /// Tears the screen down, cancelling every outstanding call.
    pub fn close(&self) {
        for slot in [&self.create_task, &self.receipt_task] {
            if let Some(task) = slot.lock().unwrap_or_else(PoisonError::into_inner).take() {
                task.abort();
            }
        }
        self.orchestrator.cancel_all();
    }
}

impl Drop for CheckoutScreen {
    fn drop(&mut self) {
        self.close();
    }
}

fn replace_task(slot: &Mutex<Option<AbortHandle>>, task: AbortHandle) {
    let previous = slot
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(task);
    if let Some(previous) = previous {
        previous.abort();
    }
}
