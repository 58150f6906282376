use crate::config::BackendConfig;
use crate::domain::payment::{
    PaymentCreationRequest, PaymentIntentCreationResponse, PaymentIntentId, ReceiptUpdateRequest,
};
use crate::domain::ports::PaymentBackend;
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

const CREATE_PAYMENT_INTENT: &str = "create_payment_intent";
const UPDATE_PAYMENT_INTENT: &str = "update_payment_intent";
const CAPTURE_PAYMENT_INTENT: &str = "capture_payment_intent";

#[derive(Serialize)]
struct CaptureRequest<'a> {
    payment_intent_id: &'a PaymentIntentId,
}

/// Talks to the merchant backend over HTTP.
///
/// Every endpoint is a JSON `POST` relative to the configured base URL.
#[derive(Clone)]
pub struct HttpPaymentBackend {
    base_url: Url,
    client: Client,
}

impl HttpPaymentBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: &BackendConfig, client: Client) -> Self {
        Self {
            base_url: config.base_url.clone(),
            client,
        }
    }

    async fn post<B: Serialize + Sync>(
        &self,
        endpoint: &'static str,
        body: &B,
    ) -> Result<String, BackendError> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| BackendError::Config(format!("invalid endpoint {}: {}", endpoint, e)))?;
        debug!(%url, "calling backend");

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| BackendError::Transport { endpoint, source })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| BackendError::Transport { endpoint, source })?;

        if !status.is_success() {
            return Err(BackendError::Status {
                endpoint,
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    async fn post_json<B, T>(&self, endpoint: &'static str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let text = self.post(endpoint, body).await?;
        serde_json::from_str(&text).map_err(|e| BackendError::MalformedResponse {
            endpoint,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl PaymentBackend for HttpPaymentBackend {
    async fn create_payment_intent(
        &self,
        request: &PaymentCreationRequest,
    ) -> Result<PaymentIntentCreationResponse, BackendError> {
        self.post_json(CREATE_PAYMENT_INTENT, request).await
    }

    async fn update_payment_intent(
        &self,
        request: &ReceiptUpdateRequest,
    ) -> Result<PaymentIntentCreationResponse, BackendError> {
        self.post_json(UPDATE_PAYMENT_INTENT, request).await
    }

    async fn capture_payment_intent(&self, id: &PaymentIntentId) -> Result<(), BackendError> {
        self.post(CAPTURE_PAYMENT_INTENT, &CaptureRequest { payment_intent_id: id })
            .await
            .map(|_| ())
    }
}
