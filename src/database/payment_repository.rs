use crate::database::error::{DatabaseError, DbResult};
use crate::database::repository::{Page, PageRequest, PaymentStore};
use crate::payments::types::{CreatedPayment, PaymentStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "id, user_id, payment_id, readable_code, qr_code, valid_until, \
     personal_app_link, business_app_link, corporate_app_link, amount, currency, status, \
     declining_reason, declined_at, paid_by_name, paid_by_iban, created_at, updated_at";

/// Local mirror of a provider payment
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Provider payment id, unique and immutable
    pub payment_id: String,
    pub readable_code: Option<String>,
    pub qr_code: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub personal_app_link: Option<String>,
    pub business_app_link: Option<String>,
    pub corporate_app_link: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    pub declining_reason: Option<String>,
    pub declined_at: Option<DateTime<Utc>>,
    pub paid_by_name: Option<String>,
    pub paid_by_iban: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a payment row at creation time
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub payment_id: String,
    pub readable_code: Option<String>,
    pub qr_code: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub personal_app_link: Option<String>,
    pub business_app_link: Option<String>,
    pub corporate_app_link: Option<String>,
    pub amount: Decimal,
    pub currency: String,
}

impl NewPayment {
    pub fn from_created(
        user_id: Uuid,
        amount: Decimal,
        currency: &str,
        created: CreatedPayment,
    ) -> Self {
        Self {
            user_id,
            payment_id: created.payment_id,
            readable_code: created.readable_code,
            qr_code: created.qr_code,
            valid_until: created.valid_until,
            personal_app_link: created.personal_app_link,
            business_app_link: created.business_app_link,
            corporate_app_link: created.corporate_app_link,
            amount,
            currency: currency.to_string(),
        }
    }
}

/// Status-dependent fields, overwritten together on every status sync
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentStatusUpdate {
    pub status: PaymentStatus,
    pub valid_until: Option<DateTime<Utc>>,
    pub amount: Decimal,
    pub currency: String,
    pub declining_reason: Option<String>,
    pub declined_at: Option<DateTime<Utc>>,
    pub paid_by_name: Option<String>,
    pub paid_by_iban: Option<String>,
}

/// Postgres-backed payment repository
#[derive(Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PaymentRepository {
    async fn insert(&self, payment: &NewPayment) -> DbResult<Payment> {
        let sql = format!(
            "INSERT INTO payments (user_id, payment_id, readable_code, qr_code, valid_until, \
             personal_app_link, business_app_link, corporate_app_link, amount, currency, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {}",
            PAYMENT_COLUMNS
        );

        sqlx::query_as::<_, Payment>(&sql)
            .bind(payment.user_id)
            .bind(&payment.payment_id)
            .bind(&payment.readable_code)
            .bind(&payment.qr_code)
            .bind(payment.valid_until)
            .bind(&payment.personal_app_link)
            .bind(&payment.business_app_link)
            .bind(&payment.corporate_app_link)
            .bind(payment.amount)
            .bind(&payment.currency)
            .bind(PaymentStatus::Unpaid.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> DbResult<Option<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE id = $1 AND user_id = $2",
            PAYMENT_COLUMNS
        );
        sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_payment_id_for_user(
        &self,
        payment_id: &str,
        user_id: Uuid,
    ) -> DbResult<Option<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE payment_id = $1 AND user_id = $2",
            PAYMENT_COLUMNS
        );
        sqlx::query_as::<_, Payment>(&sql)
            .bind(payment_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> DbResult<Option<Payment>> {
        let sql = format!("SELECT {} FROM payments WHERE payment_id = $1", PAYMENT_COLUMNS);
        sqlx::query_as::<_, Payment>(&sql)
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    async fn apply_status(&self, id: Uuid, update: &PaymentStatusUpdate) -> DbResult<Payment> {
        let sql = format!(
            "UPDATE payments \
             SET status = $1, valid_until = $2, amount = $3, currency = $4, \
                 declining_reason = $5, declined_at = $6, paid_by_name = $7, paid_by_iban = $8, \
                 updated_at = NOW() \
             WHERE id = $9 \
             RETURNING {}",
            PAYMENT_COLUMNS
        );

        sqlx::query_as::<_, Payment>(&sql)
            .bind(update.status.as_str())
            .bind(update.valid_until)
            .bind(update.amount)
            .bind(&update.currency)
            .bind(&update.declining_reason)
            .bind(update.declined_at)
            .bind(&update.paid_by_name)
            .bind(&update.paid_by_iban)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?
            .ok_or_else(|| DatabaseError::not_found("Payment", id.to_string()))
    }

    async fn mark_declined(
        &self,
        id: Uuid,
        reason: &str,
        declined_at: DateTime<Utc>,
    ) -> DbResult<Option<Payment>> {
        let sql = format!(
            "UPDATE payments \
             SET status = $1, declining_reason = $2, declined_at = $3, updated_at = NOW() \
             WHERE id = $4 AND status = $5 \
             RETURNING {}",
            PAYMENT_COLUMNS
        );

        sqlx::query_as::<_, Payment>(&sql)
            .bind(PaymentStatus::Declined.as_str())
            .bind(reason)
            .bind(declined_at)
            .bind(id)
            .bind(PaymentStatus::Unpaid.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    async fn list_for_user(&self, user_id: Uuid, page: PageRequest) -> DbResult<Page<Payment>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let sql = format!(
            "SELECT {} FROM payments WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            PAYMENT_COLUMNS
        );
        let items = sqlx::query_as::<_, Payment>(&sql)
            .bind(user_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        Ok(Page::new(items, page, u64::try_from(total).unwrap_or(0)))
    }
}
