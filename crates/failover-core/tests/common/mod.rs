//! Test doubles and common utilities for contract tests
//!
//! Every collaborator gets a counting mock whose counters can be shared
//! with a clone kept by the test after the engine takes ownership.

#![allow(dead_code)]

use failover_core::config::{CloudflareConfig, EngineConfig, FailoverConfig, HealthConfig, UplinkConfig};
use failover_core::error::{Error, Result};
use failover_core::traits::{
    AddressSource, LivenessPing, NotificationTransport, RecordId, RecordPayload, RecordStore,
};
use failover_core::{
    AddressRecordConfig, DnsRecordUpdater, EngineEvent, FailoverEngine, NotificationDispatcher,
};
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// An address inside the primary range of [`minimal_config`]
pub const PRIMARY_IP: Ipv4Addr = Ipv4Addr::new(88, 42, 1, 7);

/// An address inside the secondary range of [`minimal_config`]
pub const SECONDARY_IP: Ipv4Addr = Ipv4Addr::new(10, 64, 3, 9);

/// An address in neither range
pub const STRAY_IP: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 1);

/// An AddressSource that replays a script, then repeats its last entry
#[derive(Clone)]
pub struct ScriptedAddressSource {
    script: Arc<Mutex<VecDeque<Option<Ipv4Addr>>>>,
    last: Arc<Mutex<Option<Ipv4Addr>>>,
    resolve_call_count: Arc<AtomicUsize>,
}

impl ScriptedAddressSource {
    /// `None` entries fail the corresponding resolve
    pub fn new(script: impl IntoIterator<Item = Option<Ipv4Addr>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            last: Arc::new(Mutex::new(None)),
            resolve_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always resolve to the same address
    pub fn fixed(addr: Ipv4Addr) -> Self {
        Self::new([Some(addr)])
    }

    /// Queue more entries
    pub fn push(&self, entry: Option<Ipv4Addr>) {
        self.script.lock().unwrap().push_back(entry);
    }

    /// Get the number of times resolve() was called
    pub fn resolve_call_count(&self) -> usize {
        self.resolve_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AddressSource for ScriptedAddressSource {
    async fn resolve(&self) -> Result<Ipv4Addr> {
        self.resolve_call_count.fetch_add(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        let entry = match next {
            Some(entry) => {
                *self.last.lock().unwrap() = entry;
                entry
            }
            None => *self.last.lock().unwrap(),
        };

        entry.ok_or_else(|| Error::resolution("all resolvers unreachable"))
    }

    fn source_name(&self) -> &str {
        "scripted"
    }
}

/// A mock RecordStore that records every write
#[derive(Clone, Default)]
pub struct MockRecordStore {
    write_call_count: Arc<AtomicUsize>,
    writes: Arc<Mutex<Vec<RecordPayload>>>,
    failing: Arc<AtomicBool>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of times write() was called (including failures)
    pub fn write_call_count(&self) -> usize {
        self.write_call_count.load(Ordering::SeqCst)
    }

    /// Successful writes, in order
    pub fn writes(&self) -> Vec<RecordPayload> {
        self.writes.lock().unwrap().clone()
    }

    /// Successful writes of one record name
    pub fn writes_to(&self, name: &str) -> Vec<RecordPayload> {
        self.writes().into_iter().filter(|w| w.name == name).collect()
    }

    /// Make subsequent writes fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl RecordStore for MockRecordStore {
    async fn lookup(&self, name: &str) -> Result<RecordId> {
        Ok(RecordId::new(format!("id-{}", name)))
    }

    async fn write(&self, _id: &RecordId, payload: &RecordPayload) -> Result<()> {
        self.write_call_count.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::provider("mock", "503 Service Unavailable"));
        }
        self.writes.lock().unwrap().push(payload.clone());
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "mock"
    }
}

/// A mock NotificationTransport that records delivered texts
#[derive(Clone, Default)]
pub struct MockTransport {
    send_call_count: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<(String, bool)>>>,
    down: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of times send() was called (including failures)
    pub fn send_call_count(&self) -> usize {
        self.send_call_count.load(Ordering::SeqCst)
    }

    /// Delivered texts, in order
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Delivered (text, rich) pairs, in order
    pub fn sent_with_format(&self) -> Vec<(String, bool)> {
        self.sent.lock().unwrap().clone()
    }

    /// Make subsequent sends fail
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl NotificationTransport for MockTransport {
    async fn send(&self, text: &str, rich: bool) -> Result<()> {
        self.send_call_count.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::notification("Name or service not known"));
        }
        self.sent.lock().unwrap().push((text.to_string(), rich));
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "mock"
    }
}

/// A LivenessPing that counts pings
#[derive(Clone, Default)]
pub struct CountingPing {
    ping_call_count: Arc<AtomicUsize>,
}

impl CountingPing {
    pub fn ping_call_count(&self) -> usize {
        self.ping_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LivenessPing for CountingPing {
    async fn ping(&self) -> Result<()> {
        self.ping_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Helper to create a minimal FailoverConfig for testing
///
/// Both ranges are set: primary `88.42.1.0/24`, secondary `10.64.0.0/10`.
pub fn minimal_config(confidence: u32) -> FailoverConfig {
    FailoverConfig {
        cloudflare: CloudflareConfig::new("zone123", "test-token"),
        dynamic_alias: "dyn.example.com".to_string(),
        address_record: None,
        primary: UplinkConfig::new("wan1.example.com", 60)
            .with_range("88.42.1.0/24".parse().unwrap()),
        secondary: UplinkConfig::new("wan2.example.com", 300)
            .with_range("10.64.0.0/10".parse().unwrap()),
        confidence,
        engine: EngineConfig {
            poll_interval_secs: 30,
            discovery_timeout_secs: 1,
            external_resolver: None,
            record_timeout_secs: 1,
            notification_timeout_secs: 1,
            ping_timeout_secs: 1,
            event_channel_capacity: 1000,
        },
        telegram: None,
        health: HealthConfig::default(),
    }
}

/// Same as [`minimal_config`] with the address record enabled
pub fn config_with_address_record(confidence: u32) -> FailoverConfig {
    let mut config = minimal_config(confidence);
    config.address_record = Some(AddressRecordConfig::new("ip.example.com"));
    config
}

/// Resolve records against the store and build an engine around the mocks
pub async fn build_engine(
    config: &FailoverConfig,
    source: &ScriptedAddressSource,
    store: &MockRecordStore,
    transport: &MockTransport,
) -> (FailoverEngine, mpsc::Receiver<EngineEvent>) {
    let updater = DnsRecordUpdater::resolve(Box::new(store.clone()), config)
        .await
        .expect("record lookup succeeds");
    let dispatcher = NotificationDispatcher::new(Box::new(transport.clone()))
        .with_send_timeout(config.engine.notification_timeout());

    FailoverEngine::new(Box::new(source.clone()), updater, dispatcher, config)
        .expect("engine construction succeeds")
}

/// Drain every event currently buffered in the channel
pub fn drain_events(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
