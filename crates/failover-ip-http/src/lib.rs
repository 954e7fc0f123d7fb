// # HTTP Address Source
//
// This crate discovers the router's external IPv4 address by asking plain-text
// "what is my IP" services.
//
// ## Resolver Selection
//
// - **Default pool**: the services in [`DEFAULT_IP_SERVICES`] are tried in
//   order until one answers with an IPv4 address.
// - **Pinned resolver**: a single configured URL replaces the pool, for
//   setups where the public services are unstable.
//
// Every request is bounded by the per-request timeout. The engine applies
// its own outer timeout of `timeout * max_attempts()` around `resolve()`.
//
// IPv6 answers, unparsable bodies and non-2xx statuses all count as a
// failure of that service.

use failover_core::config::EngineConfig;
use failover_core::traits::AddressSource;
use failover_core::{Error, Result};

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Services tried in order when no resolver is pinned
pub const DEFAULT_IP_SERVICES: &[&str] = &[
    "https://api.ipify.org",  // returns plain text IP
    "https://ifconfig.me/ip", // No rate limit documented
    "https://icanhazip.com",  // No rate limit documented
];

/// Default per-request timeout
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// External IPv4 discovery over HTTP
pub struct HttpAddressSource {
    /// Services to ask, in order
    services: Vec<String>,

    /// HTTP client (carries the per-request timeout)
    client: reqwest::Client,
}

impl HttpAddressSource {
    /// Use the default pool
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_services(DEFAULT_IP_SERVICES.iter().map(|s| s.to_string()), timeout)
    }

    /// Use only the given resolver
    pub fn pinned(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Self::with_services([url.into()], timeout)
    }

    /// Use an explicit list of services, tried in order
    pub fn with_services(
        services: impl IntoIterator<Item = String>,
        timeout: Duration,
    ) -> Result<Self> {
        let services: Vec<String> = services.into_iter().collect();
        if services.is_empty() {
            return Err(Error::config("At least one address discovery service is required"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { services, client })
    }

    /// Build from the engine section: pinned resolver if set, otherwise the pool
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let timeout = config.discovery_timeout();
        match config.external_resolver {
            Some(ref url) => Self::pinned(url.clone(), timeout),
            None => Self::new(timeout),
        }
    }

    /// The services this source asks, in order
    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Fetch the address from one service
    async fn fetch(&self, url: &str) -> Result<Ipv4Addr> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::provider("http", format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::provider(
                "http",
                format!("{} returned HTTP {}", url, response.status()),
            ));
        }

        let ip_text = response
            .text()
            .await
            .map_err(|e| Error::provider("http", format!("Failed to read response: {}", e)))?;

        parse_ipv4(ip_text.trim())
    }
}

/// Parse a service answer, accepting IPv4 only
fn parse_ipv4(text: &str) -> Result<Ipv4Addr> {
    match text.parse::<IpAddr>() {
        Ok(IpAddr::V4(addr)) => Ok(addr),
        Ok(IpAddr::V6(addr)) => Err(Error::provider(
            "http",
            format!("Expected IPv4, got: {}", addr),
        )),
        Err(_) => Err(Error::provider(
            "http",
            format!("Invalid IP address: {}", text),
        )),
    }
}

#[async_trait::async_trait]
impl AddressSource for HttpAddressSource {
    async fn resolve(&self) -> Result<Ipv4Addr> {
        let mut last_error = None;

        for url in &self.services {
            match self.fetch(url).await {
                Ok(addr) => {
                    tracing::debug!("{} reported {}", url, addr);
                    return Ok(addr);
                }
                Err(e) => {
                    tracing::debug!("Address service {} failed: {}", url, e);
                    last_error = Some(e);
                }
            }
        }

        let cause = last_error.map_or_else(|| "no services configured".to_string(), |e| e.to_string());
        Err(Error::resolution(format!(
            "all {} address service(s) failed, last error: {}",
            self.services.len(),
            cause
        )))
    }

    fn max_attempts(&self) -> u32 {
        u32::try_from(self.services.len()).unwrap_or(u32::MAX)
    }

    fn source_name(&self) -> &str {
        if self.services.len() == 1 {
            &self.services[0]
        } else {
            "default pool"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(2);

    async fn service(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_parse_ipv4() {
        assert_eq!(parse_ipv4("88.42.1.7").unwrap(), Ipv4Addr::new(88, 42, 1, 7));
        assert!(parse_ipv4("2001:db8::1").unwrap_err().to_string().contains("Expected IPv4"));
        assert!(parse_ipv4("<html>").is_err());
    }

    #[test]
    fn test_default_pool_order() {
        let source = HttpAddressSource::new(TIMEOUT).unwrap();
        assert_eq!(source.services(), DEFAULT_IP_SERVICES);
        assert_eq!(source.max_attempts(), 3);
        assert_eq!(source.source_name(), "default pool");
    }

    #[test]
    fn test_from_config_pins_resolver() {
        let config = EngineConfig {
            external_resolver: Some("http://icanhazip.com/".to_string()),
            ..EngineConfig::default()
        };
        let source = HttpAddressSource::from_config(&config).unwrap();
        assert_eq!(source.services(), ["http://icanhazip.com/".to_string()]);
        assert_eq!(source.max_attempts(), 1);
    }

    #[test]
    fn test_empty_service_list_rejected() {
        assert!(HttpAddressSource::with_services(Vec::new(), TIMEOUT).is_err());
    }

    #[tokio::test]
    async fn test_pinned_resolver_trims_body() {
        let server = service(200, "88.42.1.7\n").await;
        let source = HttpAddressSource::pinned(server.uri(), TIMEOUT).unwrap();

        assert_eq!(source.resolve().await.unwrap(), Ipv4Addr::new(88, 42, 1, 7));
    }

    #[tokio::test]
    async fn test_falls_through_to_next_service() {
        let broken = service(502, "bad gateway").await;
        let v6_only = service(200, "2001:db8::1").await;
        let healthy = service(200, "10.64.3.9").await;

        let source = HttpAddressSource::with_services(
            [broken.uri(), v6_only.uri(), healthy.uri()],
            TIMEOUT,
        )
        .unwrap();

        assert_eq!(source.resolve().await.unwrap(), Ipv4Addr::new(10, 64, 3, 9));
    }

    #[tokio::test]
    async fn test_all_services_failing() {
        let a = service(500, "").await;
        let b = service(200, "not an address").await;

        let source = HttpAddressSource::with_services([a.uri(), b.uri()], TIMEOUT).unwrap();

        let err = source.resolve().await.unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
        assert!(err.to_string().contains("Invalid IP address"));
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("88.42.1.7")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let source = HttpAddressSource::pinned(server.uri(), Duration::from_millis(200)).unwrap();
        assert!(source.resolve().await.is_err());
    }
}
