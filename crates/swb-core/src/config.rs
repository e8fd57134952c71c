//! Server-level configuration for routing and namespace retirement.

use std::time::Duration;

use crate::pattern::NsPattern;

/// Options governing host resolution and namespace lifecycle.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host policy: a connection whose host header matches this pattern is
    /// treated as addressing the main (hostless) identity. Defaults to
    /// matching everything, i.e. single-host operation.
    pub host: NsPattern,
    /// Idle lifetime for auto-created namespaces before they become
    /// eligible for eviction.
    pub retirement: Duration,
    /// Expose the plain-text status endpoint.
    pub public_status: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: NsPattern::Any,
            retirement: Duration::from_millis(10_000),
            public_status: false,
        }
    }
}
