#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use fib_payments_backend::config::{Config, DatabaseConfig, RedisConfig, ServerConfig};
use fib_payments_backend::database::error::{DatabaseError, DbResult};
use fib_payments_backend::database::{
    NewPayment, Page, PageRequest, Payment, PaymentStatusUpdate, PaymentStore,
};
use fib_payments_backend::error::{AppError, AppErrorKind, AppResult, ExternalError, ProviderOperation};
use fib_payments_backend::payments::providers::FibConfig;
use fib_payments_backend::payments::types::{
    CreatedPayment, PaymentRequest, PaymentStatus, ProviderPaymentStatus,
};
use fib_payments_backend::payments::{PaymentProvider, PaymentService};
use fib_payments_backend::AppState;

/// Vec-backed payment store
#[derive(Default)]
pub struct InMemoryPaymentStore {
    rows: Mutex<Vec<Payment>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, payment_id: &str) -> Option<Payment> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.payment_id == payment_id)
            .cloned()
    }

    /// Insert a row directly, bypassing the provider
    pub fn seed(&self, user_id: Uuid, payment_id: &str, status: PaymentStatus) -> Payment {
        self.seed_at(user_id, payment_id, status, Utc::now())
    }

    pub fn seed_at(
        &self,
        user_id: Uuid,
        payment_id: &str,
        status: PaymentStatus,
        created_at: DateTime<Utc>,
    ) -> Payment {
        let payment = Payment {
            id: Uuid::new_v4(),
            user_id,
            payment_id: payment_id.to_string(),
            readable_code: None,
            qr_code: None,
            valid_until: None,
            personal_app_link: None,
            business_app_link: None,
            corporate_app_link: None,
            amount: "10.50".parse().unwrap(),
            currency: "IQD".to_string(),
            status,
            declining_reason: None,
            declined_at: None,
            paid_by_name: None,
            paid_by_iban: None,
            created_at,
            updated_at: created_at,
        };
        self.rows.lock().unwrap().push(payment.clone());
        payment
    }

    fn update<F: FnOnce(&mut Payment)>(&self, id: Uuid, f: F) -> DbResult<Payment> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| DatabaseError::not_found("Payment", id.to_string()))?;
        f(row);
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    /// Overwrite a row's status, as a concurrent webhook would
    pub fn set_status(&self, payment_id: &str, status: PaymentStatus) {
        if let Some(row) = self
            .rows
            .lock()
            .unwrap()
            .iter_mut()
            .find(|p| p.payment_id == payment_id)
        {
            row.status = status;
        }
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: &NewPayment) -> DbResult<Payment> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|p| p.payment_id == payment.payment_id) {
            return Err(DatabaseError::UniqueViolation {
                constraint: "payments_payment_id_key".to_string(),
            });
        }
        let now = Utc::now();
        let row = Payment {
            id: Uuid::new_v4(),
            user_id: payment.user_id,
            payment_id: payment.payment_id.clone(),
            readable_code: payment.readable_code.clone(),
            qr_code: payment.qr_code.clone(),
            valid_until: payment.valid_until,
            personal_app_link: payment.personal_app_link.clone(),
            business_app_link: payment.business_app_link.clone(),
            corporate_app_link: payment.corporate_app_link.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            status: PaymentStatus::Unpaid,
            declining_reason: None,
            declined_at: None,
            paid_by_name: None,
            paid_by_iban: None,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> DbResult<Option<Payment>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id && p.user_id == user_id)
            .cloned())
    }

    async fn find_by_payment_id_for_user(
        &self,
        payment_id: &str,
        user_id: Uuid,
    ) -> DbResult<Option<Payment>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.payment_id == payment_id && p.user_id == user_id)
            .cloned())
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> DbResult<Option<Payment>> {
        Ok(self.get(payment_id))
    }

    async fn apply_status(&self, id: Uuid, update: &PaymentStatusUpdate) -> DbResult<Payment> {
        self.update(id, |row| {
            row.status = update.status;
            row.valid_until = update.valid_until;
            row.amount = update.amount;
            row.currency = update.currency.clone();
            row.declining_reason = update.declining_reason.clone();
            row.declined_at = update.declined_at;
            row.paid_by_name = update.paid_by_name.clone();
            row.paid_by_iban = update.paid_by_iban.clone();
        })
    }

    async fn mark_declined(
        &self,
        id: Uuid,
        reason: &str,
        declined_at: DateTime<Utc>,
    ) -> DbResult<Option<Payment>> {
        let unpaid = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .any(|p| p.id == id && p.status == PaymentStatus::Unpaid);
        if !unpaid {
            return Ok(None);
        }
        self.update(id, |row| {
            row.status = PaymentStatus::Declined;
            row.declining_reason = Some(reason.to_string());
            row.declined_at = Some(declined_at);
        })
        .map(Some)
    }

    async fn list_for_user(&self, user_id: Uuid, page: PageRequest) -> DbResult<Page<Payment>> {
        let mut owned: Vec<Payment> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = owned.len() as u64;
        let items = owned
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(Page::new(items, page, total))
    }
}

/// Scripted provider that counts calls
pub struct FakeProvider {
    next_id: AtomicUsize,
    reports: Mutex<HashMap<String, ProviderPaymentStatus>>,
    fail_with: Mutex<Option<u16>>,
    on_cancel: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
    pub requests: Mutex<Vec<PaymentRequest>>,
    pub create_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    pub refund_calls: AtomicUsize,
}

impl FakeProvider {
    /// Issues ids P123, P124, ...
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(123),
            reports: Mutex::new(HashMap::new()),
            fail_with: Mutex::new(None),
            on_cancel: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            refund_calls: AtomicUsize::new(0),
        }
    }

    /// Status the provider reports for `payment_id` from now on
    pub fn report(&self, payment_id: &str, status: ProviderPaymentStatus) {
        self.reports
            .lock()
            .unwrap()
            .insert(payment_id.to_string(), status);
    }

    /// Make every call fail with this HTTP status
    pub fn fail_with(&self, status: u16) {
        *self.fail_with.lock().unwrap() = Some(status);
    }

    /// Run `hook` while the provider is handling a cancel
    pub fn on_cancel<F: Fn() + Send + Sync + 'static>(&self, hook: F) {
        *self.on_cancel.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn failure(&self, operation: ProviderOperation) -> AppResult<()> {
        match *self.fail_with.lock().unwrap() {
            Some(status) => Err(AppError::new(AppErrorKind::External(
                ExternalError::ProviderRequest {
                    provider: "FIB".to_string(),
                    operation,
                    status,
                    body: "upstream exploded".to_string(),
                },
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    fn name(&self) -> &str {
        "FIB"
    }

    fn currency(&self) -> &str {
        "IQD"
    }

    async fn create_payment(&self, request: PaymentRequest) -> AppResult<CreatedPayment> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.failure(ProviderOperation::Create)?;
        self.requests.lock().unwrap().push(request);

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(CreatedPayment {
            payment_id: format!("P{}", id),
            readable_code: Some(format!("CODE-{}", id)),
            qr_code: Some("data:image/png;base64,iVBORw0KGgo=".to_string()),
            valid_until: Some(Utc::now()),
            personal_app_link: Some(format!("https://personal.fib.iq/pay/{}", id)),
            business_app_link: None,
            corporate_app_link: None,
        })
    }

    async fn payment_status(&self, payment_id: &str) -> AppResult<ProviderPaymentStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.failure(ProviderOperation::Status)?;

        Ok(self
            .reports
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .unwrap_or_else(|| unpaid(payment_id)))
    }

    async fn cancel_payment(&self, _payment_id: &str) -> AppResult<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.on_cancel.lock().unwrap().as_ref() {
            hook();
        }
        self.failure(ProviderOperation::Cancel)
    }

    async fn refund_payment(&self, _payment_id: &str) -> AppResult<()> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        self.failure(ProviderOperation::Refund)
    }
}

pub fn unpaid(payment_id: &str) -> ProviderPaymentStatus {
    ProviderPaymentStatus {
        payment_id: Some(payment_id.to_string()),
        status: PaymentStatus::Unpaid,
        valid_until: None,
        amount: None,
        declining_reason: None,
        declined_at: None,
        paid_by: None,
    }
}

pub fn reported(payment_id: &str, status: PaymentStatus) -> ProviderPaymentStatus {
    ProviderPaymentStatus {
        status,
        ..unpaid(payment_id)
    }
}

pub struct Harness {
    pub provider: Arc<FakeProvider>,
    pub store: Arc<InMemoryPaymentStore>,
    pub service: PaymentService,
}

pub fn harness() -> Harness {
    let provider = Arc::new(FakeProvider::new());
    let store = Arc::new(InMemoryPaymentStore::new());
    let service = PaymentService::new(provider.clone(), store.clone());
    Harness {
        provider,
        store,
        service,
    }
}

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            environment: "development".to_string(),
        },
        database: DatabaseConfig {
            url: "postgres://localhost/payments_test".to_string(),
            max_connections: 5,
        },
        redis: RedisConfig::default(),
        fib: FibConfig {
            client_id: "shop-client".to_string(),
            client_secret: "shop-secret".to_string(),
            callback_url: "https://shop.example/api/webhooks/fib".to_string(),
            ..FibConfig::default()
        },
    }
}

pub fn app_state(harness: &Harness) -> AppState {
    AppState::new(test_config(), harness.service.clone())
}
