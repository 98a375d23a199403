//! Application error types
//!
//! `AppError` is the error every service-level operation returns. It wraps an
//! `AppErrorKind` split by origin (domain rules, the payment provider, or our
//! own infrastructure) plus an optional human-readable context that is used
//! as the user-facing message for non-domain failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::database::error::DatabaseError;

/// Result type for service operations
pub type AppResult<T> = Result<T, AppError>;

/// Business-rule failures, safe to show to the caller verbatim
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("{message}")]
    Validation { message: String },
}

/// Provider-side operation a request failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOperation {
    Create,
    Status,
    Cancel,
    Refund,
}

impl fmt::Display for ProviderOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderOperation::Create => "create payment",
            ProviderOperation::Status => "get payment status",
            ProviderOperation::Cancel => "cancel payment",
            ProviderOperation::Refund => "refund payment",
        };
        f.write_str(name)
    }
}

/// Failures talking to the payment provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExternalError {
    /// The identity endpoint rejected our client credentials
    #[error("{provider} authentication failed: HTTP {status}: {body}")]
    Authentication {
        provider: String,
        status: u16,
        body: String,
    },

    /// A payment endpoint answered with an unexpected status
    #[error("{provider} failed to {operation}: HTTP {status}: {body}")]
    ProviderRequest {
        provider: String,
        operation: ProviderOperation,
        status: u16,
        body: String,
    },

    #[error("{provider} request failed: {message}")]
    Network { provider: String, message: String },

    #[error("{provider} returned an unreadable response: {message}")]
    InvalidResponse { provider: String, message: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InfrastructureError {
    #[error("database error: {message}")]
    Database { message: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppErrorKind {
    #[error(transparent)]
    Domain(DomainError),

    #[error(transparent)]
    External(ExternalError),

    #[error(transparent)]
    Infrastructure(InfrastructureError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn not_found<S: Into<String>>(entity: S) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::NotFound {
            entity: entity.into(),
        }))
    }

    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::Conflict {
            message: message.into(),
        }))
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::Validation {
            message: message.into(),
        }))
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: message.into(),
            },
        ))
    }

    /// Attach a user-facing message for this failure
    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, AppErrorKind::Domain(DomainError::NotFound { .. }))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self.kind, AppErrorKind::Domain(DomainError::Conflict { .. }))
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.kind {
            AppErrorKind::Domain(DomainError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppErrorKind::Domain(DomainError::Conflict { .. })
            | AppErrorKind::Domain(DomainError::Validation { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppErrorKind::External(_) | AppErrorKind::Infrastructure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message returned to API callers. Provider and infrastructure details
    /// stay in the logs.
    pub fn public_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(domain) => domain.to_string(),
            _ => self
                .context
                .clone()
                .unwrap_or_else(|| "Internal server error".to_string()),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} ({})", self.kind, context),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for AppError {}

impl From<DatabaseError> for AppError {
    fn from(error: DatabaseError) -> Self {
        if error.is_not_found() {
            return AppError::not_found("Payment");
        }
        if error.is_unique_violation() {
            return AppError::conflict("Payment already exists");
        }
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
            message: error.to_string(),
        }))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "message": self.public_message(),
            "data": null,
        }));
        (status, body).into_response()
    }
}
