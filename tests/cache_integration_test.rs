//! Integration tests against live Redis and Postgres
//!
//! These tests require a running Redis instance and database.
//! Run with: REDIS_URL=redis://localhost:6379 DATABASE_URL=postgres://... cargo test --features cache --test cache_integration_test -- --ignored

#[cfg(feature = "cache")]
mod cache_tests {
    use std::time::Duration;

    use fib_payments_backend::cache::keys::provider::AccessTokenKey;
    use fib_payments_backend::cache::{Cache, CacheConfig, RedisCache};

    async fn setup_cache() -> RedisCache {
        let config = CacheConfig {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            ..Default::default()
        };

        let pool = fib_payments_backend::cache::init_cache_pool(config)
            .await
            .expect("Failed to init cache pool");
        RedisCache::new(pool)
    }

    #[tokio::test]
    #[ignore]
    async fn test_access_token_round_trip() {
        let cache = setup_cache().await;
        let key = AccessTokenKey::new("FIB", "integration").to_string();

        Cache::<String>::set(&cache, &key, &"token-abc".to_string(), Some(Duration::from_secs(60)))
            .await
            .unwrap();

        let token = Cache::<String>::get(&cache, &key).await.unwrap();
        assert_eq!(token.as_deref(), Some("token-abc"));

        assert!(Cache::<String>::delete(&cache, &key).await.unwrap());
        assert!(!Cache::<String>::exists(&cache, &key).await.unwrap());
    }

    #[tokio::test]
    #[ignore]
    async fn test_access_token_expires() {
        let cache = setup_cache().await;
        let key = AccessTokenKey::new("FIB", "integration-ttl").to_string();

        Cache::<String>::set(&cache, &key, &"short-lived".to_string(), Some(Duration::from_secs(1)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;

        let token = Cache::<String>::get(&cache, &key).await.unwrap();
        assert!(token.is_none());
    }
}

mod repository_tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use fib_payments_backend::database::{
        init_pool, run_migrations, NewPayment, PageRequest, PaymentRepository,
        PaymentStatusUpdate, PaymentStore, PoolConfig,
    };
    use fib_payments_backend::payments::types::PaymentStatus;

    async fn setup_repo() -> PaymentRepository {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = init_pool(&database_url, Some(PoolConfig::default()))
            .await
            .expect("Failed to init DB pool");
        run_migrations(&pool).await.expect("Failed to migrate");
        PaymentRepository::new(pool)
    }

    fn new_payment(user_id: Uuid) -> NewPayment {
        NewPayment {
            user_id,
            payment_id: format!("IT-{}", Uuid::new_v4()),
            readable_code: Some("ABCD-1234".to_string()),
            qr_code: None,
            valid_until: Some(Utc::now()),
            personal_app_link: None,
            business_app_link: None,
            corporate_app_link: None,
            amount: Decimal::new(1050, 2),
            currency: "IQD".to_string(),
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_insert_and_scoped_lookups() {
        let repo = setup_repo().await;
        let user = Uuid::new_v4();

        let payment = repo.insert(&new_payment(user)).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Unpaid);
        assert_eq!(payment.amount, Decimal::new(1050, 2));

        let found = repo
            .find_by_payment_id_for_user(&payment.payment_id, user)
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.id), Some(payment.id));

        let foreign = repo
            .find_for_user(payment.id, Uuid::new_v4())
            .await
            .unwrap();
        assert!(foreign.is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn test_duplicate_provider_id_is_rejected() {
        let repo = setup_repo().await;
        let payment = new_payment(Uuid::new_v4());

        repo.insert(&payment).await.unwrap();
        let err = repo.insert(&payment).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    #[ignore]
    async fn test_status_update_and_decline() {
        let repo = setup_repo().await;
        let payment = repo.insert(&new_payment(Uuid::new_v4())).await.unwrap();

        let updated = repo
            .apply_status(
                payment.id,
                &PaymentStatusUpdate {
                    status: PaymentStatus::Paid,
                    valid_until: None,
                    amount: Decimal::new(1100, 2),
                    currency: "IQD".to_string(),
                    declining_reason: None,
                    declined_at: None,
                    paid_by_name: Some("Ali".to_string()),
                    paid_by_iban: Some("IQ00".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, PaymentStatus::Paid);
        assert_eq!(updated.valid_until, None);
        assert_eq!(updated.paid_by_name.as_deref(), Some("Ali"));

        let other = repo.insert(&new_payment(Uuid::new_v4())).await.unwrap();
        let declined = repo
            .mark_declined(other.id, "PAYMENT_CANCELLATION", Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(declined.status, PaymentStatus::Declined);
        assert_eq!(declined.readable_code.as_deref(), Some("ABCD-1234"));

        // Already settled rows are left alone
        let settled = repo
            .mark_declined(payment.id, "PAYMENT_CANCELLATION", Utc::now())
            .await
            .unwrap();
        assert!(settled.is_none());
        let still_paid = repo.find_by_payment_id(&payment.payment_id).await.unwrap().unwrap();
        assert_eq!(still_paid.status, PaymentStatus::Paid);
    }

    #[tokio::test]
    #[ignore]
    async fn test_list_pages_newest_first() {
        let repo = setup_repo().await;
        let user = Uuid::new_v4();

        let mut ids = Vec::new();
        for _ in 0..11 {
            ids.push(repo.insert(&new_payment(user)).await.unwrap().payment_id);
        }

        let first = repo.list_for_user(user, PageRequest::new(None)).await.unwrap();
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.total, 11);
        assert_eq!(first.items[0].payment_id, ids[10]);

        let second = repo
            .list_for_user(user, PageRequest::new(Some(2)))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].payment_id, ids[0]);
    }
}
