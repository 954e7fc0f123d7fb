// # Liveness Ping Trait
//
// Optional push-style heartbeat to an external monitor, sent once per
// completed cycle.

use async_trait::async_trait;

/// Trait for external liveness pings
#[async_trait]
pub trait LivenessPing: Send + Sync {
    /// Report one completed cycle
    async fn ping(&self) -> Result<(), crate::Error>;
}
