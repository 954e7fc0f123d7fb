//! Configuration types for the failover system
//!
//! This module defines all configuration structures used throughout the crate.
//! A [`FailoverConfig`] is populated once at startup and validated before
//! the engine is built; nothing reads configuration after that.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::classifier::Ipv4Net;

/// Main failover configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// DNS record store credentials
    pub cloudflare: CloudflareConfig,

    /// The CNAME switched between the primary and secondary target
    pub dynamic_alias: String,

    /// Optional A record kept in sync with the observed address
    #[serde(default)]
    pub address_record: Option<AddressRecordConfig>,

    /// Primary uplink
    pub primary: UplinkConfig,

    /// Secondary (fallback) uplink
    pub secondary: UplinkConfig,

    /// Consecutive primary observations needed to leave failover
    pub confidence: u32,

    /// Polling and timeout settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Optional operator notifications
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,

    /// Liveness probe settings
    #[serde(default)]
    pub health: HealthConfig,
}

impl FailoverConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.cloudflare.validate()?;

        validate_domain_name(&self.dynamic_alias)?;
        if let Some(ref record) = self.address_record {
            validate_domain_name(&record.name)?;
            if record.ttl == 0 {
                return Err(crate::Error::config("Address record TTL must be > 0"));
            }
        }

        self.primary.validate("primary")?;
        self.secondary.validate("secondary")?;

        if self.primary.range.is_none() && self.secondary.range.is_none() {
            return Err(crate::Error::config(
                "At least one of the primary or secondary address ranges must be set",
            ));
        }

        if self.confidence == 0 {
            return Err(crate::Error::config("Confidence threshold must be at least 1"));
        }

        self.engine.validate()?;

        if let Some(ref telegram) = self.telegram {
            telegram.validate()?;
        }

        Ok(())
    }
}

/// Cloudflare credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct CloudflareConfig {
    /// Zone ID containing all managed records
    pub zone_id: String,

    /// API token with Zone.DNS edit permission
    /// ⚠️ NEVER log this value
    pub api_token: String,
}

impl CloudflareConfig {
    /// Create a new Cloudflare configuration
    pub fn new(zone_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            zone_id: zone_id.into(),
            api_token: api_token.into(),
        }
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if self.zone_id.is_empty() {
            return Err(crate::Error::config("Cloudflare zone ID cannot be empty"));
        }
        if self.api_token.is_empty() {
            return Err(crate::Error::config("Cloudflare API token cannot be empty"));
        }
        Ok(())
    }
}

impl fmt::Debug for CloudflareConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudflareConfig")
            .field("zone_id", &self.zone_id)
            .field("api_token", &"<REDACTED>")
            .finish()
    }
}

/// Address-tracking A record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressRecordConfig {
    /// Record name
    pub name: String,

    /// TTL applied on every write
    #[serde(default = "default_address_ttl")]
    pub ttl: u32,
}

impl AddressRecordConfig {
    /// Create a new address record configuration with the default TTL
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ttl: default_address_ttl(),
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }
}

/// One uplink: the alias target it maps to and how to recognise it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UplinkConfig {
    /// Name the dynamic alias points at while this uplink is active
    pub target: String,

    /// TTL applied to the dynamic alias while this uplink is active
    pub ttl: u32,

    /// External address range of this uplink
    #[serde(default)]
    pub range: Option<Ipv4Net>,
}

impl UplinkConfig {
    /// Create a new uplink without an address range
    pub fn new(target: impl Into<String>, ttl: u32) -> Self {
        Self {
            target: target.into(),
            ttl,
            range: None,
        }
    }

    /// Set the address range
    pub fn with_range(mut self, range: Ipv4Net) -> Self {
        self.range = Some(range);
        self
    }

    fn validate(&self, which: &str) -> Result<(), crate::Error> {
        validate_domain_name(&self.target)
            .map_err(|e| crate::Error::config(format!("Invalid {} target: {}", which, e)))?;
        if self.ttl == 0 {
            return Err(crate::Error::config(format!("{} TTL must be > 0", which)));
        }
        if let Some(net) = self.range
            && net != net.trunc()
        {
            return Err(crate::Error::config(format!(
                "{} range {} has host bits set (did you mean {}?)",
                which,
                net,
                net.trunc()
            )));
        }
        Ok(())
    }
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between polling cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Per-request budget for external address discovery (in seconds)
    #[serde(default = "default_discovery_timeout_secs")]
    pub discovery_timeout_secs: u64,

    /// Pin discovery to one resolver URL instead of the default pool
    #[serde(default)]
    pub external_resolver: Option<String>,

    /// Budget for a single record store call (in seconds)
    #[serde(default = "default_record_timeout_secs")]
    pub record_timeout_secs: u64,

    /// Budget for a single notification send (in seconds)
    #[serde(default = "default_notification_timeout_secs")]
    pub notification_timeout_secs: u64,

    /// Budget for the liveness ping sent after each cycle (in seconds)
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Interval between cycles
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Per-request discovery budget
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    /// Record store call budget
    pub fn record_timeout(&self) -> Duration {
        Duration::from_secs(self.record_timeout_secs)
    }

    /// Notification send budget
    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notification_timeout_secs)
    }

    /// Liveness ping budget
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.discovery_timeout_secs == 0 {
            return Err(crate::Error::config("Discovery timeout must be > 0"));
        }
        if self.record_timeout_secs == 0
            || self.notification_timeout_secs == 0
            || self.ping_timeout_secs == 0
        {
            return Err(crate::Error::config("Call timeouts must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        if let Some(ref url) = self.external_resolver
            && !url.starts_with("https://")
            && !url.starts_with("http://")
        {
            return Err(crate::Error::config(format!(
                "External resolver must be an HTTP or HTTPS URL. Got: {}",
                url
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            discovery_timeout_secs: default_discovery_timeout_secs(),
            external_resolver: None,
            record_timeout_secs: default_record_timeout_secs(),
            notification_timeout_secs: default_notification_timeout_secs(),
            ping_timeout_secs: default_ping_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Telegram bot credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token
    /// ⚠️ NEVER log this value
    pub bot_token: String,

    /// Chat receiving the notifications
    pub chat_id: String,
}

impl TelegramConfig {
    /// Create a new Telegram configuration
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if self.bot_token.is_empty() {
            return Err(crate::Error::config("Telegram bot token cannot be empty"));
        }
        if self.chat_id.is_empty() {
            return Err(crate::Error::config("Telegram chat ID cannot be empty"));
        }
        Ok(())
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<REDACTED>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// Liveness probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Listen address of the liveness probe
    #[serde(default = "default_health_bind")]
    pub bind: String,

    /// External URL pinged after every completed cycle
    #[serde(default)]
    pub ping_url: Option<String>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            bind: default_health_bind(),
            ping_url: None,
        }
    }
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks: total length, label length, characters, hyphens.
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    if domain.is_empty() {
        return Err(crate::Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(crate::Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

fn default_address_ttl() -> u32 {
    60
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_discovery_timeout_secs() -> u64 {
    10
}

fn default_record_timeout_secs() -> u64 {
    30
}

fn default_notification_timeout_secs() -> u64 {
    10
}

fn default_ping_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    100
}

fn default_health_bind() -> String {
    "0.0.0.0:8080".to_string()
}
