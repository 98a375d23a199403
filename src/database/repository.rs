use crate::database::error::DbResult;
use crate::database::payment_repository::{NewPayment, Payment, PaymentStatusUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Storage for the local mirror of provider payments
///
/// Implementations perform each write as a single statement with
/// last-write-wins semantics; no version check guards concurrent updates.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert a freshly created payment with status UNPAID
    async fn insert(&self, payment: &NewPayment) -> DbResult<Payment>;

    /// Find a payment by internal id, only if `user_id` owns it
    async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> DbResult<Option<Payment>>;

    /// Find a payment by provider payment id, only if `user_id` owns it
    async fn find_by_payment_id_for_user(
        &self,
        payment_id: &str,
        user_id: Uuid,
    ) -> DbResult<Option<Payment>>;

    /// Find a payment by provider payment id regardless of owner
    async fn find_by_payment_id(&self, payment_id: &str) -> DbResult<Option<Payment>>;

    /// Overwrite every status-dependent field
    async fn apply_status(&self, id: Uuid, update: &PaymentStatusUpdate) -> DbResult<Payment>;

    /// Set status DECLINED with the given reason and time, leaving other fields.
    /// Only an UNPAID row is touched; `None` means the row was not UNPAID.
    async fn mark_declined(
        &self,
        id: Uuid,
        reason: &str,
        declined_at: DateTime<Utc>,
    ) -> DbResult<Option<Payment>>;

    /// A user's payments, newest first
    async fn list_for_user(&self, user_id: Uuid, page: PageRequest) -> DbResult<Page<Payment>>;
}

/// 1-based page selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub const DEFAULT_PER_PAGE: u32 = 10;

    /// Page `page` (clamped to at least 1) with the default page size
    pub fn new(page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: Self::DEFAULT_PER_PAGE,
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            page: request.page,
            per_page: request.per_page,
            total,
        }
    }

    pub fn last_page(&self) -> u32 {
        if self.total == 0 || self.per_page == 0 {
            return 1;
        }
        let pages = self.total.div_ceil(u64::from(self.per_page));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }
}
