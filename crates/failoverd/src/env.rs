//! Environment configuration
//!
//! Every setting comes from a `FAILOVER_*` variable. Optional features are
//! disabled with the literal value `no`.
//!
//! | Variable | Default |
//! |---|---|
//! | `FAILOVER_CLOUDFLARE_ZONE_ID` | required |
//! | `FAILOVER_CLOUDFLARE_API_TOKEN` | required |
//! | `FAILOVER_DYNAMIC_ALIAS` | required |
//! | `FAILOVER_ADDRESS_RECORD` | `no` |
//! | `FAILOVER_ADDRESS_RECORD_TTL` | `60` |
//! | `FAILOVER_PRIMARY_TARGET` | required |
//! | `FAILOVER_PRIMARY_TTL` | `60` |
//! | `FAILOVER_PRIMARY_RANGE` | `no` |
//! | `FAILOVER_SECONDARY_TARGET` | required |
//! | `FAILOVER_SECONDARY_TTL` | `300` |
//! | `FAILOVER_SECONDARY_RANGE` | `no` |
//! | `FAILOVER_CONFIDENCE` | `4` |
//! | `FAILOVER_POLL_INTERVAL_SECS` | `30` |
//! | `FAILOVER_DISCOVERY_TIMEOUT_SECS` | `10` |
//! | `FAILOVER_EXTERNAL_RESOLVER` | `default` |
//! | `FAILOVER_RECORD_TIMEOUT_SECS` | `30` |
//! | `FAILOVER_NOTIFICATION_TIMEOUT_SECS` | `10` |
//! | `FAILOVER_PING_TIMEOUT_SECS` | `10` |
//! | `FAILOVER_TELEGRAM_BOT_TOKEN` | `no` |
//! | `FAILOVER_TELEGRAM_CHAT_ID` | required with a bot token |
//! | `FAILOVER_HEALTH_BIND` | `0.0.0.0:8080` |
//! | `FAILOVER_PING_URL` | `no` |
//! | `FAILOVER_LOG_LEVEL` | `info` |
//! | `FAILOVER_DEBUG` | `false` (forces `debug`) |

use anyhow::{Context, Result, bail};
use failover_core::config::{
    AddressRecordConfig, CloudflareConfig, EngineConfig, FailoverConfig, HealthConfig,
    TelegramConfig, UplinkConfig,
};
use failover_core::Ipv4Net;
use std::str::FromStr;
use tracing::Level;

/// Value disabling an optional setting
const DISABLED: &str = "no";

/// Daemon configuration: the core config plus process-level settings
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub failover: FailoverConfig,
    pub log_level: Level,
}

impl DaemonConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars(&lookup);

        let address_record = match vars.optional("FAILOVER_ADDRESS_RECORD") {
            Some(name) => Some(
                AddressRecordConfig::new(name)
                    .with_ttl(vars.parsed("FAILOVER_ADDRESS_RECORD_TTL", 60)?),
            ),
            None => None,
        };

        let primary = uplink(&vars, "PRIMARY", 60)?;
        let secondary = uplink(&vars, "SECONDARY", 300)?;

        let external_resolver = vars
            .optional("FAILOVER_EXTERNAL_RESOLVER")
            .filter(|value| value != "default");

        let telegram = match vars.optional("FAILOVER_TELEGRAM_BOT_TOKEN") {
            Some(token) => Some(TelegramConfig::new(
                token,
                vars.required("FAILOVER_TELEGRAM_CHAT_ID")?,
            )),
            None => None,
        };

        let defaults = EngineConfig::default();
        let failover = FailoverConfig {
            cloudflare: CloudflareConfig::new(
                vars.required("FAILOVER_CLOUDFLARE_ZONE_ID")?,
                vars.required("FAILOVER_CLOUDFLARE_API_TOKEN")?,
            ),
            dynamic_alias: vars.required("FAILOVER_DYNAMIC_ALIAS")?,
            address_record,
            primary,
            secondary,
            confidence: vars.parsed("FAILOVER_CONFIDENCE", 4)?,
            engine: EngineConfig {
                poll_interval_secs: vars
                    .parsed("FAILOVER_POLL_INTERVAL_SECS", defaults.poll_interval_secs)?,
                discovery_timeout_secs: vars
                    .parsed("FAILOVER_DISCOVERY_TIMEOUT_SECS", defaults.discovery_timeout_secs)?,
                external_resolver,
                record_timeout_secs: vars
                    .parsed("FAILOVER_RECORD_TIMEOUT_SECS", defaults.record_timeout_secs)?,
                notification_timeout_secs: vars.parsed(
                    "FAILOVER_NOTIFICATION_TIMEOUT_SECS",
                    defaults.notification_timeout_secs,
                )?,
                ping_timeout_secs: vars
                    .parsed("FAILOVER_PING_TIMEOUT_SECS", defaults.ping_timeout_secs)?,
                event_channel_capacity: defaults.event_channel_capacity,
            },
            telegram,
            health: HealthConfig {
                bind: vars
                    .get("FAILOVER_HEALTH_BIND")
                    .unwrap_or_else(|| HealthConfig::default().bind),
                ping_url: vars.optional("FAILOVER_PING_URL"),
            },
        };

        let debug = vars.parsed("FAILOVER_DEBUG", false)?;
        let log_level = if debug {
            Level::DEBUG
        } else {
            parse_level(&vars.get("FAILOVER_LOG_LEVEL").unwrap_or_else(|| "info".to_string()))?
        };

        Ok(Self {
            failover,
            log_level,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.failover.validate()?;

        if let Some(ref url) = self.failover.health.ping_url
            && !url.starts_with("https://")
            && !url.starts_with("http://")
        {
            bail!("FAILOVER_PING_URL must use HTTP or HTTPS scheme. Got: {}", url);
        }

        self.failover
            .health
            .bind
            .parse::<std::net::SocketAddr>()
            .with_context(|| {
                format!(
                    "FAILOVER_HEALTH_BIND must be host:port. Got: {}",
                    self.failover.health.bind
                )
            })?;

        Ok(())
    }
}

fn uplink(vars: &Vars<'_>, prefix: &str, default_ttl: u32) -> Result<UplinkConfig> {
    let target = vars.required(&format!("FAILOVER_{}_TARGET", prefix))?;
    let ttl = vars.parsed(&format!("FAILOVER_{}_TTL", prefix), default_ttl)?;

    let mut uplink = UplinkConfig::new(target, ttl);
    let range_key = format!("FAILOVER_{}_RANGE", prefix);
    if let Some(range) = vars.optional(&range_key) {
        let range = Ipv4Net::from_str(&range).with_context(|| format!("{} is invalid", range_key))?;
        uplink = uplink.with_range(range);
    }
    Ok(uplink)
}

fn parse_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => bail!(
            "FAILOVER_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    /// Trimmed, non-empty value
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Value unless unset or `no`
    fn optional(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| v != DISABLED)
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .with_context(|| format!("{} is required. Set it via: export {}=...", key, key))
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
            None => Ok(default),
        }
    }
}
