#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use terminal_checkout::application::checkout::CheckoutOrchestrator;
use terminal_checkout::domain::payment::{
    ClientSecret, PaymentCreationRequest, PaymentIntent, PaymentIntentCreationResponse,
    PaymentIntentId, PaymentIntentStatus, ReceiptUpdateRequest,
};
use terminal_checkout::domain::ports::{PaymentBackend, PaymentTerminal};
use terminal_checkout::domain::terminal::{CollectConfiguration, TerminalError, TerminalErrorCode};
use terminal_checkout::error::BackendError;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Create,
    Update,
    Capture,
    Retrieve,
    Collect,
    Process,
}

/// Lets a test hold a scripted call open until it decides to release it.
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Shared script and call log for the test doubles below.
///
/// Every external call is logged as `step:argument`. A blocked call that is
/// dropped before being released logs `dropped:step:argument`.
#[derive(Default)]
pub struct Scenario {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<Step>>,
    blocking: Mutex<HashMap<Step, Arc<Gate>>>,
    secrets: AtomicU64,
}

struct DropRecorder<'a> {
    scenario: &'a Scenario,
    label: String,
    armed: bool,
}

impl Drop for DropRecorder<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.scenario.record(format!("dropped:{}", self.label));
        }
    }
}

impl Scenario {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, step: Step) {
        self.failing.lock().unwrap().insert(step);
    }

    /// Blocks the next call of `step` until the returned gate is released.
    pub fn block_once(&self, step: Step) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.blocking.lock().unwrap().insert(step, gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, label: String) {
        self.calls.lock().unwrap().push(label);
    }

    fn next_secret(&self) -> ClientSecret {
        let n = self.secrets.fetch_add(1, Ordering::SeqCst) + 1;
        ClientSecret::new(format!("sec_{n}"))
    }

    async fn enter(&self, step: Step, label: String) -> bool {
        self.record(label.clone());
        let gate = self.blocking.lock().unwrap().remove(&step);
        if let Some(gate) = gate {
            let mut recorder = DropRecorder {
                scenario: self,
                label,
                armed: true,
            };
            gate.entered.notify_one();
            gate.release.notified().await;
            recorder.armed = false;
        }
        !self.failing.lock().unwrap().contains(&step)
    }
}

pub struct ScriptedBackend {
    scenario: Arc<Scenario>,
}

impl ScriptedBackend {
    pub fn new(scenario: Arc<Scenario>) -> Self {
        Self { scenario }
    }
}

fn backend_failure(endpoint: &'static str) -> BackendError {
    BackendError::Status {
        endpoint,
        status: 503,
        body: "network unreachable".to_string(),
    }
}

#[async_trait]
impl PaymentBackend for ScriptedBackend {
    async fn create_payment_intent(
        &self,
        _request: &PaymentCreationRequest,
    ) -> Result<PaymentIntentCreationResponse, BackendError> {
        if !self.scenario.enter(Step::Create, "create".to_string()).await {
            return Err(backend_failure("create_payment_intent"));
        }
        Ok(PaymentIntentCreationResponse {
            secret: self.scenario.next_secret(),
            intent: None,
        })
    }

    async fn update_payment_intent(
        &self,
        request: &ReceiptUpdateRequest,
    ) -> Result<PaymentIntentCreationResponse, BackendError> {
        let label = format!("update:{}", request.payment_intent_id);
        if !self.scenario.enter(Step::Update, label).await {
            return Err(backend_failure("update_payment_intent"));
        }
        Ok(PaymentIntentCreationResponse {
            secret: self.scenario.next_secret(),
            intent: None,
        })
    }

    async fn capture_payment_intent(&self, id: &PaymentIntentId) -> Result<(), BackendError> {
        if !self.scenario.enter(Step::Capture, format!("capture:{}", id)).await {
            return Err(backend_failure("capture_payment_intent"));
        }
        Ok(())
    }
}

pub struct ScriptedTerminal {
    scenario: Arc<Scenario>,
}

impl ScriptedTerminal {
    pub fn new(scenario: Arc<Scenario>) -> Self {
        Self { scenario }
    }
}

fn terminal_failure() -> TerminalError {
    TerminalError::new(TerminalErrorCode::ConnectionLost, "Reader connection lost")
}

#[async_trait]
impl PaymentTerminal for ScriptedTerminal {
    async fn retrieve_payment_intent(
        &self,
        secret: &ClientSecret,
    ) -> Result<PaymentIntent, TerminalError> {
        let label = format!("retrieve:{}", secret.expose());
        if !self.scenario.enter(Step::Retrieve, label).await {
            return Err(terminal_failure());
        }
        Ok(PaymentIntent {
            id: PaymentIntentId::new(secret.expose().replacen("sec_", "pi_", 1)).unwrap(),
            amount: 1000,
            currency: "usd".to_string(),
            status: PaymentIntentStatus::RequiresPaymentMethod,
            receipt_email: None,
        })
    }

    async fn collect_payment_method(
        &self,
        mut intent: PaymentIntent,
        _config: &CollectConfiguration,
    ) -> Result<PaymentIntent, TerminalError> {
        if !self.scenario.enter(Step::Collect, format!("collect:{}", intent.id)).await {
            return Err(terminal_failure());
        }
        intent.status = PaymentIntentStatus::RequiresConfirmation;
        Ok(intent)
    }

    async fn process_payment(
        &self,
        mut intent: PaymentIntent,
    ) -> Result<PaymentIntent, TerminalError> {
        if !self.scenario.enter(Step::Process, format!("process:{}", intent.id)).await {
            return Err(terminal_failure());
        }
        intent.status = PaymentIntentStatus::RequiresCapture;
        Ok(intent)
    }
}

pub fn orchestrator(scenario: &Arc<Scenario>) -> Arc<CheckoutOrchestrator> {
    Arc::new(CheckoutOrchestrator::new(
        Arc::new(ScriptedBackend::new(scenario.clone())),
        Arc::new(ScriptedTerminal::new(scenario.clone())),
    ))
}

pub fn usd(amount: u64) -> PaymentCreationRequest {
    PaymentCreationRequest::new(amount, "usd").unwrap()
}
