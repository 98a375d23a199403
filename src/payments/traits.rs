//! Payment provider trait definitions
//!
//! Defines the interface the orchestration layer uses to talk to the
//! payment gateway.

use crate::error::AppResult;
use crate::payments::types::{CreatedPayment, PaymentRequest, ProviderPaymentStatus};
use async_trait::async_trait;

/// Trait for payment provider implementations
///
/// Implementations own their authentication. Callers never see bearer tokens
/// and never retry; any retry policy lives inside the provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Short provider name used in logs and errors
    fn name(&self) -> &str;

    /// Currency every payment is created in
    fn currency(&self) -> &str;

    /// Create a payment with the provider
    ///
    /// # Returns
    /// * `CreatedPayment` - provider payment id, readable code, QR payload,
    ///   expiry and app deep links
    async fn create_payment(&self, request: PaymentRequest) -> AppResult<CreatedPayment>;

    /// Fetch the current provider-side state of a payment
    async fn payment_status(&self, payment_id: &str) -> AppResult<ProviderPaymentStatus>;

    /// Cancel an unpaid payment
    async fn cancel_payment(&self, payment_id: &str) -> AppResult<()>;

    /// Ask the provider to refund a paid payment. Refunds are processed
    /// asynchronously on the provider side.
    async fn refund_payment(&self, payment_id: &str) -> AppResult<()>;
}
