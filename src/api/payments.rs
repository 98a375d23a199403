use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::api::response::ApiResponse;
use crate::database::{PageRequest, Payment};
use crate::error::{AppError, AppResult};
use crate::payments::types::PaymentStatus;
use crate::payments::CallbackOutcome;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentBody {
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
}

/// Response for a freshly created payment
#[derive(Debug, Serialize)]
pub struct CreatedPaymentView {
    pub payment_id: String,
    pub readable_code: Option<String>,
    pub qr_code: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub personal_app_link: Option<String>,
    pub business_app_link: Option<String>,
    pub corporate_app_link: Option<String>,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
}

impl From<Payment> for CreatedPaymentView {
    fn from(payment: Payment) -> Self {
        Self {
            payment_id: payment.payment_id,
            readable_code: payment.readable_code,
            qr_code: payment.qr_code,
            valid_until: payment.valid_until,
            personal_app_link: payment.personal_app_link,
            business_app_link: payment.business_app_link,
            corporate_app_link: payment.corporate_app_link,
            amount: payment.amount,
            currency: payment.currency,
            status: payment.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AmountView {
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct PaidByView {
    pub name: String,
    pub iban: Option<String>,
}

/// Response for a status refresh
#[derive(Debug, Serialize)]
pub struct PaymentStatusView {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub valid_until: Option<DateTime<Utc>>,
    pub amount: AmountView,
    pub declining_reason: Option<String>,
    pub declined_at: Option<DateTime<Utc>>,
    pub paid_by: Option<PaidByView>,
}

impl From<Payment> for PaymentStatusView {
    fn from(payment: Payment) -> Self {
        let paid_by = payment.paid_by_name.map(|name| PaidByView {
            name,
            iban: payment.paid_by_iban,
        });
        Self {
            payment_id: payment.payment_id,
            status: payment.status,
            valid_until: payment.valid_until,
            amount: AmountView {
                amount: payment.amount,
                currency: payment.currency,
            },
            declining_reason: payment.declining_reason,
            declined_at: payment.declined_at,
            paid_by,
        }
    }
}

/// List entry
#[derive(Debug, Serialize)]
pub struct PaymentSummaryView {
    pub id: Uuid,
    pub payment_id: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Payment> for PaymentSummaryView {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            payment_id: payment.payment_id,
            amount: payment.amount,
            currency: payment.currency,
            status: payment.status,
            valid_until: payment.valid_until,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentPageView {
    pub items: Vec<PaymentSummaryView>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}

/// Full payment record
#[derive(Debug, Serialize)]
pub struct PaymentDetailView {
    pub id: Uuid,
    pub payment_id: String,
    pub readable_code: Option<String>,
    pub qr_code: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub personal_app_link: Option<String>,
    pub business_app_link: Option<String>,
    pub corporate_app_link: Option<String>,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub declining_reason: Option<String>,
    pub declined_at: Option<DateTime<Utc>>,
    pub paid_by_name: Option<String>,
    pub paid_by_iban: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Payment> for PaymentDetailView {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            payment_id: payment.payment_id,
            readable_code: payment.readable_code,
            qr_code: payment.qr_code,
            valid_until: payment.valid_until,
            personal_app_link: payment.personal_app_link,
            business_app_link: payment.business_app_link,
            corporate_app_link: payment.corporate_app_link,
            amount: payment.amount,
            currency: payment.currency,
            status: payment.status,
            declining_reason: payment.declining_reason,
            declined_at: payment.declined_at,
            paid_by_name: payment.paid_by_name,
            paid_by_iban: payment.paid_by_iban,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}

/// Read the requested amount from a JSON number or numeric string
pub fn parse_amount(value: Option<&Value>) -> AppResult<Decimal> {
    let invalid = || AppError::validation("The amount must be a valid number.");
    let text = match value {
        None | Some(Value::Null) => {
            return Err(AppError::validation("The amount field is required."))
        }
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::String(text)) if !text.trim().is_empty() => text.trim().to_string(),
        Some(_) => return Err(invalid()),
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| invalid())
}

/// POST /api/payments
pub async fn create_payment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    body: Result<Json<CreatePaymentBody>, JsonRejection>,
) -> AppResult<ApiResponse<CreatedPaymentView>> {
    let Json(body) = body.map_err(|rejection| AppError::validation(rejection.body_text()))?;
    let amount = parse_amount(body.amount.as_ref())?;

    let payment = state
        .payments
        .create(user_id, amount, body.description)
        .await
        .map_err(|e| e.with_context("Failed to create payment"))?;

    Ok(ApiResponse::ok("Payment created successfully", payment.into())
        .with_status(StatusCode::CREATED))
}

/// GET /api/payments/:id/status, `id` being the provider payment id
pub async fn payment_status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(payment_id): Path<String>,
) -> AppResult<ApiResponse<PaymentStatusView>> {
    let payment = state
        .payments
        .status(user_id, &payment_id)
        .await
        .map_err(|e| e.with_context("Failed to fetch payment status"))?;

    Ok(ApiResponse::ok(
        "Payment status fetched successfully",
        payment.into(),
    ))
}

/// POST /api/payments/:id/cancel
pub async fn cancel_payment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(payment_id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state
        .payments
        .cancel(user_id, &payment_id)
        .await
        .map_err(|e| e.with_context("Failed to cancel payment"))?;

    Ok(ApiResponse::message("Payment cancelled successfully"))
}

/// POST /api/payments/:id/refund
pub async fn refund_payment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(payment_id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state
        .payments
        .refund(user_id, &payment_id)
        .await
        .map_err(|e| e.with_context("Failed to refund payment"))?;

    Ok(ApiResponse::message("Payment refund requested successfully")
        .with_status(StatusCode::ACCEPTED))
}

/// GET /api/payments?page=N
pub async fn list_payments(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<PaymentPageView>> {
    let page = state
        .payments
        .list(user_id, PageRequest::new(query.page))
        .await
        .map_err(|e| e.with_context("Failed to fetch payments"))?;

    let last_page = page.last_page();
    let page = page.map(PaymentSummaryView::from);

    Ok(ApiResponse::ok(
        "Payments fetched successfully",
        PaymentPageView {
            items: page.items,
            page: page.page,
            per_page: page.per_page,
            total: page.total,
            last_page,
        },
    ))
}

/// GET /api/payments/:id, `id` being the internal id
pub async fn show_payment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PaymentDetailView>> {
    // A malformed id cannot match any row
    let id = Uuid::parse_str(&id).map_err(|_| AppError::not_found("Payment"))?;

    let payment = state
        .payments
        .show(user_id, id)
        .await
        .map_err(|e| e.with_context("Failed to fetch payment"))?;

    Ok(ApiResponse::ok("Payment fetched successfully", payment.into()))
}

/// POST /api/webhooks/fib
///
/// Answers 200 for every outcome except an unknown payment id, which gets a
/// 404. Processing failures are logged, never surfaced as 5xx.
pub async fn fib_callback(State(state): State<AppState>, body: Bytes) -> ApiResponse<()> {
    let outcome = state.payments.handle_callback_body(&body).await;
    let status = match outcome {
        CallbackOutcome::UnknownPayment { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::OK,
    };
    info!(outcome = ?outcome, status = status.as_u16(), "FIB callback answered");
    ApiResponse::message(outcome.message()).with_status(status)
}
