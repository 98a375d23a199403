//! FIB payment gateway backend
//!
//! Creates payments with First Iraqi Bank's online-shop API, keeps a local
//! mirror of each payment's status in Postgres, and reconciles that mirror
//! through user polls and provider callbacks.

pub mod api;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod payments;

use std::sync::Arc;

use crate::config::Config;
use crate::payments::PaymentService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub payments: PaymentService,
}

impl AppState {
    pub fn new(config: Config, payments: PaymentService) -> Self {
        Self {
            config: Arc::new(config),
            payments,
        }
    }
}
