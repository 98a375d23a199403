//! Payment provider implementations
//!
//! Concrete implementations of the PaymentProvider trait.

pub mod fib;

pub use fib::{FibConfig, FibEnvironment, FibProvider};
