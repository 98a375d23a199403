//! Payment provider types and data structures
//!
//! Requests and responses exchanged with the provider, and the payment
//! status vocabulary shared with the local records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Declining reason recorded when a user cancels a payment
pub const DECLINING_REASON_CANCELLATION: &str = "PAYMENT_CANCELLATION";

/// Provider-side payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Declined,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Declined => "DECLINED",
        }
    }

    /// PAID and DECLINED never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Declined)
    }

    /// Whether a record in `self` may move to `next`
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        *self == next || !self.is_terminal()
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown payment status '{0}'")]
pub struct UnknownPaymentStatus(pub String);

impl FromStr for PaymentStatus {
    type Err = UnknownPaymentStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNPAID" => Ok(PaymentStatus::Unpaid),
            "PAID" => Ok(PaymentStatus::Paid),
            "DECLINED" => Ok(PaymentStatus::Declined),
            other => Err(UnknownPaymentStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = UnknownPaymentStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Payment creation request handed to a provider
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub description: String,
}

/// Amount with its currency, as the provider reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonetaryValue {
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub amount: Decimal,
    pub currency: String,
}

/// Payer details reported once a payment is paid
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaidBy {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub iban: Option<String>,
}

/// Provider response to a payment creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPayment {
    pub payment_id: String,
    #[serde(default)]
    pub readable_code: Option<String>,
    #[serde(default)]
    pub qr_code: Option<String>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub personal_app_link: Option<String>,
    #[serde(default)]
    pub business_app_link: Option<String>,
    #[serde(default)]
    pub corporate_app_link: Option<String>,
}

/// Provider response to a status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPaymentStatus {
    #[serde(default)]
    pub payment_id: Option<String>,
    pub status: PaymentStatus,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub amount: Option<MonetaryValue>,
    #[serde(default)]
    pub declining_reason: Option<String>,
    #[serde(default)]
    pub declined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paid_by: Option<PaidBy>,
}

/// Body of the provider's status callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub id: String,
    pub status: PaymentStatus,
}
