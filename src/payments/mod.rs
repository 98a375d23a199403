//! Payment integration module
//!
//! The provider client (`providers`), the interface it implements (`traits`),
//! the wire types it exchanges (`types`) and the orchestration that keeps
//! local payment records in sync with the provider (`service`).

pub mod providers;
pub mod service;
pub mod traits;
pub mod types;

pub use service::{CallbackOutcome, PaymentService};
pub use traits::PaymentProvider;
pub use types::PaymentStatus;
