// # Record Store Trait
//
// Defines the interface for the remote DNS record store.
//
// ## Implementations
//
// - Cloudflare: `failover-provider-cloudflare` crate
//
// Records are resolved to opaque IDs once at startup via `lookup()`, then
// rewritten in place via `write()` while the daemon runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque provider-specific record identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap a provider record ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// DNS record types written by the failover system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// Address-tracking record
    A,
    /// Dynamic alias
    Cname,
}

/// Full record body sent on every write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayload {
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Fully qualified record name
    pub name: String,
    /// Record content (target name or address)
    pub content: String,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Whether the provider should proxy traffic for this record
    pub proxied: bool,
}

impl RecordPayload {
    /// Build an unproxied CNAME payload
    pub fn cname(name: impl Into<String>, target: impl Into<String>, ttl: u32) -> Self {
        Self {
            record_type: RecordType::Cname,
            name: name.into(),
            content: target.into(),
            ttl,
            proxied: false,
        }
    }

    /// Build an unproxied A payload
    pub fn a(name: impl Into<String>, addr: std::net::Ipv4Addr, ttl: u32) -> Self {
        Self {
            record_type: RecordType::A,
            name: name.into(),
            content: addr.to_string(),
            ttl,
            proxied: false,
        }
    }
}

/// Trait for DNS record store implementations
///
/// # Trust Level: Untrusted
///
/// Stores are stateless and single-shot: one API call per invocation,
/// no retries, no caching. Deciding *whether* a write is needed is owned
/// by `DnsRecordUpdater`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Resolve a record name to its ID
    ///
    /// # Returns
    ///
    /// - `Ok(RecordId)`: The ID of the record whose name matches exactly
    /// - `Err(Error::NotFound)`: No such record
    /// - `Err(Error)`: If the lookup failed
    async fn lookup(&self, name: &str) -> Result<RecordId, crate::Error>;

    /// Overwrite a record with the given payload
    async fn write(&self, id: &RecordId, payload: &RecordPayload) -> Result<(), crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wire_shape() {
        let payload = RecordPayload::cname("dyn.example.com", "wan1.example.com", 60);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json, serde_json::json!({
            "type": "CNAME",
            "name": "dyn.example.com",
            "content": "wan1.example.com",
            "ttl": 60,
            "proxied": false,
        }));

        let a = RecordPayload::a("ip.example.com", std::net::Ipv4Addr::new(88, 42, 1, 7), 60);
        assert_eq!(serde_json::to_value(&a).unwrap()["type"], "A");
        assert_eq!(a.content, "88.42.1.7");
    }
}
