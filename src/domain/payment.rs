use crate::domain::email::EmailAddress;
use crate::error::CheckoutError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A positive amount expressed in minor currency units (e.g. cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub fn new(minor_units: u64) -> Result<Self, CheckoutError> {
        if minor_units > 0 {
            Ok(Self(minor_units))
        } else {
            Err(CheckoutError::Validation(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn minor_units(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for Amount {
    type Error = CheckoutError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// ISO 4217 currency code, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self, CheckoutError> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_lowercase()))
        } else {
            Err(CheckoutError::Validation(format!(
                "Invalid currency code: {:?}",
                code
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentIntentId(String);

impl PaymentIntentId {
    pub fn new(id: impl Into<String>) -> Result<Self, CheckoutError> {
        let id = id.into();
        if id.trim().is_empty() {
            Err(CheckoutError::Validation(
                "Payment intent id is missing".to_string(),
            ))
        } else {
            Ok(Self(id))
        }
    }

    /// For ids minted by an adapter that are non-empty by construction.
    pub(crate) fn from_raw(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentIntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client secret handed out by the backend; redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientSecret(String);

impl ClientSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// The intent id a secret of the form `<id>_secret_<nonce>` belongs to.
    pub fn intent_id(&self) -> Option<&str> {
        self.0
            .split_once("_secret_")
            .map(|(id, _)| id)
            .filter(|id| !id.is_empty())
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClientSecret(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresCapture,
    Processing,
    Succeeded,
    Canceled,
}

/// A payment intent as seen through the terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: PaymentIntentId,
    pub amount: u64,
    pub currency: String,
    pub status: PaymentIntentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_email: Option<String>,
}

/// Parameters for creating a payment intent on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentCreationRequest {
    pub amount: Amount,
    pub currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl PaymentCreationRequest {
    pub fn new(amount: u64, currency: &str) -> Result<Self, CheckoutError> {
        Ok(Self {
            amount: Amount::new(amount)?,
            currency: Currency::new(currency)?,
            description: None,
            metadata: BTreeMap::new(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = (!description.trim().is_empty()).then_some(description);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Attaches a receipt email to an existing payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptUpdateRequest {
    pub payment_intent_id: PaymentIntentId,
    pub receipt_email: EmailAddress,
}

impl ReceiptUpdateRequest {
    pub fn new(
        payment_intent_id: PaymentIntentId,
        receipt_email: &str,
    ) -> Result<Self, CheckoutError> {
        Ok(Self {
            payment_intent_id,
            receipt_email: EmailAddress::parse(receipt_email)?,
        })
    }
}

/// Backend reply to create and update calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntentCreationResponse {
    pub secret: ClientSecret,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}
