// # Cloudflare Record Store
//
// This crate provides the Cloudflare implementation of `RecordStore` for the
// failover system.
//
// ## Behaviour
//
// - `lookup`: one GET listing the zone's records filtered by name; the record
//   whose name matches exactly wins
// - `write`: one PUT replacing the record with the full payload
// - HTTP status codes are mapped onto core errors (401/403, 404, 409, 429, 5xx)
// - No retries, no caching, no background tasks. The engine decides when to
//   call again.
//
// ### Trust Level: Untrusted (Record Store)
//
// The store only talks to the Cloudflare API and never sees engine state
// beyond the payload it is asked to write.
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Empty tokens and zone IDs are rejected at construction time
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...`
// - Overwrite DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use failover_core::config::CloudflareConfig;
use failover_core::traits::{RecordId, RecordPayload, RecordStore};
use failover_core::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "cloudflare";

/// Response envelope shared by all v4 endpoints
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    name: String,
}

/// Cloudflare DNS record store
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot: each trait call is exactly one HTTP request.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct CloudflareRecordStore {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone holding the managed records
    zone_id: String,

    /// API base URL (overridable for tests)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareRecordStore")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareRecordStore {
    /// Create a store talking to the public Cloudflare API
    ///
    /// # Errors
    ///
    /// `Error::Config` if the token or zone ID is empty, `Error::Http` if the
    /// HTTP client cannot be built.
    pub fn new(api_token: impl Into<String>, zone_id: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_token, zone_id, CLOUDFLARE_API_BASE)
    }

    /// Create a store from the core configuration section
    pub fn from_config(config: &CloudflareConfig) -> Result<Self> {
        Self::new(config.api_token.clone(), config.zone_id.clone())
    }

    /// Create a store against a different API base URL
    pub fn with_base_url(
        api_token: impl Into<String>,
        zone_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let api_token = api_token.into();
        let zone_id = zone_id.into();

        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }
        if zone_id.is_empty() {
            return Err(Error::config("Cloudflare zone ID cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            zone_id,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, self.zone_id)
    }

    async fn parse_envelope<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
        what: &str,
    ) -> Result<Option<T>> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(map_status(status.as_u16(), what, &error_text));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

        if !envelope.success {
            let reasons = envelope
                .errors
                .iter()
                .map(|m| format!("{} ({})", m.message, m.code))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::provider(
                PROVIDER,
                format!("{} rejected by API: {}", what, reasons),
            ));
        }

        Ok(envelope.result)
    }
}

/// Map a non-success HTTP status onto a core error
fn map_status(status: u16, what: &str, body: &str) -> Error {
    match status {
        401 | 403 => Error::provider(
            PROVIDER,
            format!(
                "Authentication failed: Invalid API token or insufficient permissions. Status: {}",
                status
            ),
        ),
        404 => Error::not_found(format!("{}: zone or record not found", what)),
        409 => Error::provider(
            PROVIDER,
            format!("Conflict: Record is being updated by another process. Status: {}", status),
        ),
        429 => Error::provider(
            PROVIDER,
            format!("Rate limit exceeded. Please retry later. Status: {}", status),
        ),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient): {} - {}", status, body),
        ),
        _ => Error::provider(PROVIDER, format!("{} failed: {} - {}", what, status, body)),
    }
}

#[async_trait]
impl RecordStore for CloudflareRecordStore {
    /// Resolve a record name to its ID
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=dyn.example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn lookup(&self, name: &str) -> Result<RecordId> {
        tracing::debug!("Looking up record ID for {}", name);

        let response = self
            .client
            .get(self.records_url())
            .query(&[("name", name)])
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let records: Vec<DnsRecord> = self
            .parse_envelope(response, "Record lookup")
            .await?
            .unwrap_or_default();

        let record = records
            .into_iter()
            .find(|r| r.name == name)
            .ok_or_else(|| Error::not_found(format!("No DNS record named {}", name)))?;

        tracing::debug!("{} is {}", name, record.id);
        Ok(RecordId::new(record.id))
    }

    /// Overwrite a record
    ///
    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// { "type": "CNAME", "name": "...", "content": "...", "ttl": 60, "proxied": false }
    /// ```
    async fn write(&self, id: &RecordId, payload: &RecordPayload) -> Result<()> {
        tracing::debug!(
            "Writing {:?} record {} -> {} (ttl {})",
            payload.record_type,
            payload.name,
            payload.content,
            payload.ttl
        );

        let url = format!("{}/{}", self.records_url(), id);
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        self.parse_envelope::<serde_json::Value>(response, "Record update")
            .await?;

        Ok(())
    }

    fn store_name(&self) -> &'static str {
        PROVIDER
    }
}
