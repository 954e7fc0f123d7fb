// # Address Source Trait
//
// Defines the interface for discovering the router's external IPv4 address.
//
// ## Implementations
//
// - HTTP "what is my IP" services: `failover-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use failover_core::AddressSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* AddressSource implementation */;
//     let external = source.resolve().await?;
//     println!("External address: {}", external);
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for external address discovery
///
/// Called exactly once per polling cycle by the engine. Implementations
/// are observers only: they never decide what happens with the address.
///
/// # Timeouts
///
/// Implementations should bound each outbound request. The engine applies
/// its own outer timeout on top, so a hung source cannot stall the loop.
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Resolve the current external IPv4 address
    ///
    /// # Returns
    ///
    /// - `Ok(Ipv4Addr)`: The observed external address
    /// - `Err(Error)`: If no address could be determined
    async fn resolve(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Upper bound on sequential requests one `resolve()` may make
    ///
    /// The engine scales its outer timeout by this factor.
    fn max_attempts(&self) -> u32 {
        1
    }

    /// Name of the source (for logging)
    fn source_name(&self) -> &str {
        "unknown"
    }
}
