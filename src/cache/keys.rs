//! Cache key builders
//!
//! Keys are versioned so a format change never reads stale entries.

use std::fmt;

const VERSION: &str = "v1";

pub mod provider {
    use super::*;

    /// Bearer token for one provider environment, e.g. `v1:fib:access_token:stage`
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct AccessTokenKey {
        provider: String,
        environment: String,
    }

    impl AccessTokenKey {
        pub fn new(provider: &str, environment: &str) -> Self {
            Self {
                provider: provider.to_lowercase(),
                environment: environment.to_string(),
            }
        }
    }

    impl fmt::Display for AccessTokenKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "{}:{}:access_token:{}",
                VERSION, self.provider, self.environment
            )
        }
    }
}
