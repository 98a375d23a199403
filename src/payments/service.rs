//! Payment orchestration
//!
//! Keeps the local `Payment` rows consistent with the provider. Rows change
//! on three triggers: a user creating a payment, a user polling its status,
//! and the provider calling back when the status changes. Polls and
//! callbacks share one overwrite path (`reconcile`), and in both cases the
//! provider's status endpoint is the source of truth.

use crate::database::{NewPayment, Page, PageRequest, Payment, PaymentStatusUpdate, PaymentStore};
use crate::error::{AppError, AppResult};
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{
    CallbackPayload, PaymentRequest, PaymentStatus, ProviderPaymentStatus,
    DECLINING_REASON_CANCELLATION,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Result of processing a provider callback. Only `UnknownPayment` is
/// answered with a non-success status; failures are logged and acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Local record re-synced from the provider
    Updated {
        payment_id: String,
        status: PaymentStatus,
    },
    /// No local record carries this provider id
    UnknownPayment { payment_id: String },
    /// Body was not a valid callback payload
    Malformed { reason: String },
    /// Re-sync failed; the error was logged
    Failed { payment_id: String, reason: String },
}

impl CallbackOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            CallbackOutcome::Updated { .. } => "Payment status updated successfully",
            CallbackOutcome::UnknownPayment { .. } => "Payment not found",
            CallbackOutcome::Malformed { .. } | CallbackOutcome::Failed { .. } => {
                "Error processing callback"
            }
        }
    }
}

fn min_amount() -> Decimal {
    Decimal::new(1, 2)
}

fn max_amount() -> Decimal {
    Decimal::new(9_999_999_999, 2)
}

/// Check a requested amount and normalize it to two decimal places
pub fn validate_amount(amount: Decimal) -> AppResult<Decimal> {
    if amount < min_amount() {
        return Err(AppError::validation("The amount must be at least 0.01."));
    }
    if amount > max_amount() {
        return Err(AppError::validation(
            "The amount may not be greater than 99999999.99.",
        ));
    }
    let mut normalized = amount.normalize();
    if normalized.scale() > 2 {
        return Err(AppError::validation(
            "The amount must have at most two decimal places.",
        ));
    }
    normalized.rescale(2);
    Ok(normalized)
}

/// Merge a provider status report into the fields stored for `current`.
///
/// Every status-dependent field is overwritten, except that a terminal
/// local status is never reversed and a missing amount keeps the stored one.
pub fn reconcile(current: &Payment, reported: &ProviderPaymentStatus) -> PaymentStatusUpdate {
    let status = if current.status.can_transition_to(reported.status) {
        reported.status
    } else {
        warn!(
            payment_id = %current.payment_id,
            local = %current.status,
            reported = %reported.status,
            "Provider reported a reversal of a terminal status, keeping local status"
        );
        current.status
    };

    let (amount, currency) = match &reported.amount {
        Some(value) => (value.amount, value.currency.clone()),
        None => (current.amount, current.currency.clone()),
    };
    let paid_by = reported.paid_by.clone().unwrap_or_default();

    PaymentStatusUpdate {
        status,
        valid_until: reported.valid_until,
        amount,
        currency,
        declining_reason: reported.declining_reason.clone(),
        declined_at: reported.declined_at,
        paid_by_name: paid_by.name,
        paid_by_iban: paid_by.iban,
    }
}

#[derive(Clone)]
pub struct PaymentService {
    provider: Arc<dyn PaymentProvider>,
    store: Arc<dyn PaymentStore>,
}

impl PaymentService {
    pub fn new(provider: Arc<dyn PaymentProvider>, store: Arc<dyn PaymentStore>) -> Self {
        Self { provider, store }
    }

    /// Create a payment with the provider and record it as UNPAID
    pub async fn create(
        &self,
        user_id: Uuid,
        amount: Decimal,
        description: Option<String>,
    ) -> AppResult<Payment> {
        let amount = validate_amount(amount)?;

        let request = PaymentRequest {
            amount,
            description: description.unwrap_or_default(),
        };
        let created = self.provider.create_payment(request).await.map_err(|e| {
            error!(user_id = %user_id, amount = %amount, error = %e, "Payment creation failed");
            e
        })?;

        let new_payment =
            NewPayment::from_created(user_id, amount, self.provider.currency(), created);
        let payment = self.store.insert(&new_payment).await.map_err(|e| {
            error!(
                user_id = %user_id,
                payment_id = %new_payment.payment_id,
                error = %e,
                "Failed to store created payment"
            );
            AppError::from(e)
        })?;

        info!(
            provider = self.provider.name(),
            user_id = %user_id,
            payment_id = %payment.payment_id,
            amount = %payment.amount,
            "Payment created"
        );
        Ok(payment)
    }

    /// Refresh a user's payment from the provider and return the merged row
    pub async fn status(&self, user_id: Uuid, payment_id: &str) -> AppResult<Payment> {
        let payment = self.owned_payment(user_id, payment_id).await?;
        self.sync_status(&payment).await.map_err(|e| {
            error!(
                user_id = %user_id,
                payment_id = %payment_id,
                error = %e,
                "Payment status check failed"
            );
            e
        })
    }

    /// Cancel an UNPAID payment with the provider and mark it DECLINED
    pub async fn cancel(&self, user_id: Uuid, payment_id: &str) -> AppResult<Payment> {
        let payment = self.owned_payment(user_id, payment_id).await?;

        match payment.status {
            PaymentStatus::Paid => return Err(AppError::conflict("Cannot cancel a paid payment")),
            PaymentStatus::Declined => {
                return Err(AppError::conflict("Payment is already declined"))
            }
            PaymentStatus::Unpaid => {}
        }

        self.provider.cancel_payment(payment_id).await.map_err(|e| {
            error!(
                user_id = %user_id,
                payment_id = %payment_id,
                error = %e,
                "Payment cancellation failed"
            );
            e
        })?;

        // A webhook may have settled the row while the provider call was in flight
        let cancelled = self
            .store
            .mark_declined(payment.id, DECLINING_REASON_CANCELLATION, Utc::now())
            .await?
            .ok_or_else(|| {
                warn!(
                    user_id = %user_id,
                    payment_id = %payment_id,
                    "Payment left UNPAID before the cancellation was recorded"
                );
                AppError::conflict("Payment is no longer unpaid")
            })?;

        info!(user_id = %user_id, payment_id = %payment_id, "Payment cancelled");
        Ok(cancelled)
    }

    /// Ask the provider to refund a PAID payment. The local row is left as
    /// is; the provider reports the outcome through its status endpoint.
    pub async fn refund(&self, user_id: Uuid, payment_id: &str) -> AppResult<()> {
        let payment = self.owned_payment(user_id, payment_id).await?;

        if payment.status != PaymentStatus::Paid {
            return Err(AppError::conflict("Only paid payments can be refunded"));
        }

        self.provider.refund_payment(payment_id).await.map_err(|e| {
            error!(
                user_id = %user_id,
                payment_id = %payment_id,
                error = %e,
                "Payment refund failed"
            );
            e
        })?;

        info!(user_id = %user_id, payment_id = %payment_id, "Payment refund requested");
        Ok(())
    }

    /// A user's payments, newest first
    pub async fn list(&self, user_id: Uuid, page: PageRequest) -> AppResult<Page<Payment>> {
        Ok(self.store.list_for_user(user_id, page).await?)
    }

    /// One of a user's payments by internal id
    pub async fn show(&self, user_id: Uuid, id: Uuid) -> AppResult<Payment> {
        self.store
            .find_for_user(id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Payment"))
    }

    /// Process a raw callback body. Errors are folded into the outcome so the
    /// HTTP layer can answer every callback.
    pub async fn handle_callback_body(&self, body: &[u8]) -> CallbackOutcome {
        match serde_json::from_slice::<CallbackPayload>(body) {
            Ok(payload) => self.handle_callback(payload).await,
            Err(e) => {
                error!(
                    body = %String::from_utf8_lossy(body),
                    error = %e,
                    "FIB callback payload rejected"
                );
                CallbackOutcome::Malformed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Re-sync the payment a callback refers to. The callback's own status
    /// is only logged; the provider is queried for the authoritative state.
    pub async fn handle_callback(&self, payload: CallbackPayload) -> CallbackOutcome {
        let payment_id = payload.id;

        let payment = match self.store.find_by_payment_id(&payment_id).await {
            Ok(Some(payment)) => payment,
            Ok(None) => {
                warn!(
                    payment_id = %payment_id,
                    status = %payload.status,
                    "FIB callback: Payment not found"
                );
                return CallbackOutcome::UnknownPayment { payment_id };
            }
            Err(e) => {
                error!(payment_id = %payment_id, error = %e, "FIB callback error");
                return CallbackOutcome::Failed {
                    payment_id,
                    reason: e.to_string(),
                };
            }
        };

        match self.sync_status(&payment).await {
            Ok(updated) => {
                info!(
                    payment_id = %payment_id,
                    callback_status = %payload.status,
                    status = %updated.status,
                    "FIB callback processed successfully"
                );
                CallbackOutcome::Updated {
                    payment_id,
                    status: updated.status,
                }
            }
            Err(e) => {
                error!(payment_id = %payment_id, error = %e, "FIB callback error");
                CallbackOutcome::Failed {
                    payment_id,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn owned_payment(&self, user_id: Uuid, payment_id: &str) -> AppResult<Payment> {
        self.store
            .find_by_payment_id_for_user(payment_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Payment"))
    }

    async fn sync_status(&self, payment: &Payment) -> AppResult<Payment> {
        let reported = self.provider.payment_status(&payment.payment_id).await?;
        let update = reconcile(payment, &reported);
        Ok(self.store.apply_status(payment.id, &update).await?)
    }
}
