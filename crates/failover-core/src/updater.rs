//! Idempotent DNS record updater
//!
//! Owns the two managed records and decides when a remote write is
//! actually needed:
//!
//! - The **dynamic alias** is rewritten only when the state machine reports
//!   a transition. A failed write is not retried on later cycles; the next
//!   attempt happens on the next transition.
//! - The **address record** is rewritten only when the observed address
//!   differs from the last one successfully written. A failed write leaves
//!   the marker stale, so the next cycle retries it.

use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::FailoverConfig;
use crate::error::{Error, RecordRole, Result};
use crate::failover::FailoverState;
use crate::traits::{RecordId, RecordPayload, RecordStore};

/// A record resolved to its provider ID at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedRecord {
    /// Provider record ID
    pub id: RecordId,
    /// Record name
    pub name: String,
}

/// Where the alias points for one failover state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTarget {
    /// Target name
    pub target: String,
    /// TTL while this target is active
    pub ttl: u32,
}

/// Outcome of [`DnsRecordUpdater::apply_address`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressUpdate {
    /// No address record configured
    Disabled,
    /// The record already carries this address
    Unchanged,
    /// The record was rewritten
    Written {
        /// The previously written address (None on the first write)
        previous: Option<Ipv4Addr>,
    },
}

/// Rewrites the managed records through a [`RecordStore`]
pub struct DnsRecordUpdater {
    store: Box<dyn RecordStore>,
    alias: ManagedRecord,
    primary: AliasTarget,
    secondary: AliasTarget,
    address: Option<(ManagedRecord, u32)>,
    last_written: Option<Ipv4Addr>,
    write_timeout: Duration,
}

impl DnsRecordUpdater {
    /// Create an updater from already-resolved records
    pub fn new(
        store: Box<dyn RecordStore>,
        alias: ManagedRecord,
        primary: AliasTarget,
        secondary: AliasTarget,
    ) -> Self {
        Self {
            store,
            alias,
            primary,
            secondary,
            address: None,
            last_written: None,
            write_timeout: Duration::from_secs(30),
        }
    }

    /// Also track the observed address in an A record
    pub fn with_address_record(mut self, record: ManagedRecord, ttl: u32) -> Self {
        self.address = Some((record, ttl));
        self
    }

    /// Set the budget for a single store call
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Resolve the configured record names and build the updater
    ///
    /// # Errors
    ///
    /// `Error::RecordLookup` carrying the role of the record that could not
    /// be resolved. Callers treat this as fatal.
    pub async fn resolve(store: Box<dyn RecordStore>, config: &FailoverConfig) -> Result<Self> {
        let timeout = config.engine.record_timeout();

        let alias_id = lookup(store.as_ref(), RecordRole::Alias, &config.dynamic_alias, timeout).await?;
        info!("Resolved {} to record {}", config.dynamic_alias, alias_id);

        let address = match config.address_record {
            Some(ref record) => {
                let id = lookup(store.as_ref(), RecordRole::AddressRecord, &record.name, timeout).await?;
                info!("Resolved {} to record {}", record.name, id);
                Some((
                    ManagedRecord {
                        id,
                        name: record.name.clone(),
                    },
                    record.ttl,
                ))
            }
            None => None,
        };

        let mut updater = Self::new(
            store,
            ManagedRecord {
                id: alias_id,
                name: config.dynamic_alias.clone(),
            },
            AliasTarget {
                target: config.primary.target.clone(),
                ttl: config.primary.ttl,
            },
            AliasTarget {
                target: config.secondary.target.clone(),
                ttl: config.secondary.ttl,
            },
        )
        .with_write_timeout(timeout);
        updater.address = address;

        Ok(updater)
    }

    /// The dynamic alias record
    pub fn alias(&self) -> &ManagedRecord {
        &self.alias
    }

    /// Whether an address record is configured
    pub fn tracks_address(&self) -> bool {
        self.address.is_some()
    }

    /// The last address successfully written to the address record
    pub fn last_written_address(&self) -> Option<Ipv4Addr> {
        self.last_written
    }

    /// The alias target for a failover state
    pub fn target_for(&self, state: FailoverState) -> &AliasTarget {
        match state {
            FailoverState::Primary => &self.primary,
            FailoverState::Secondary => &self.secondary,
        }
    }

    /// Point the dynamic alias at the target for `state`
    ///
    /// Only called when the state machine reports a transition.
    pub async fn apply_state(&self, state: FailoverState) -> Result<&AliasTarget> {
        let target = self.target_for(state);
        let payload = RecordPayload::cname(&self.alias.name, &target.target, target.ttl);

        self.write(&self.alias, &payload).await?;
        info!(
            "Updated {} to {} (ttl {})",
            self.alias.name, target.target, target.ttl
        );

        Ok(target)
    }

    /// Bring the address record in line with `addr`
    ///
    /// No-op when no address record is configured or `addr` is already
    /// the last successfully written address.
    pub async fn apply_address(&mut self, addr: Ipv4Addr) -> Result<AddressUpdate> {
        let Some((ref record, ttl)) = self.address else {
            return Ok(AddressUpdate::Disabled);
        };

        if self.last_written == Some(addr) {
            debug!("{} already has address {}, skipping update", record.name, addr);
            return Ok(AddressUpdate::Unchanged);
        }

        let payload = RecordPayload::a(&record.name, addr, ttl);
        self.write(record, &payload).await?;
        info!("Updated {} to {}", record.name, addr);

        let previous = self.last_written.replace(addr);
        Ok(AddressUpdate::Written { previous })
    }

    async fn write(&self, record: &ManagedRecord, payload: &RecordPayload) -> Result<()> {
        match tokio::time::timeout(self.write_timeout, self.store.write(&record.id, payload)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::record_write(&record.name, e.to_string())),
            Err(_) => Err(Error::record_write(
                &record.name,
                Error::timeout("record write", self.write_timeout).to_string(),
            )),
        }
    }
}

async fn lookup(
    store: &dyn RecordStore,
    role: RecordRole,
    name: &str,
    timeout: Duration,
) -> Result<RecordId> {
    match tokio::time::timeout(timeout, store.lookup(name)).await {
        Ok(Ok(id)) => Ok(id),
        Ok(Err(e)) => Err(Error::record_lookup(role, name, e.to_string())),
        Err(_) => Err(Error::record_lookup(
            role,
            name,
            Error::timeout("record lookup", timeout).to_string(),
        )),
    }
}

impl std::fmt::Debug for DnsRecordUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsRecordUpdater")
            .field("store", &self.store.store_name())
            .field("alias", &self.alias)
            .field("primary", &self.primary)
            .field("secondary", &self.secondary)
            .field("address", &self.address)
            .field("last_written", &self.last_written)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingStore {
        writes: Arc<Mutex<Vec<RecordPayload>>>,
        fail: bool,
    }

    #[async_trait]
    impl RecordStore for RecordingStore {
        async fn lookup(&self, name: &str) -> Result<RecordId> {
            Ok(RecordId::new(format!("id-{}", name)))
        }

        async fn write(&self, _id: &RecordId, payload: &RecordPayload) -> Result<()> {
            if self.fail {
                return Err(Error::http("503 Service Unavailable"));
            }
            self.writes.lock().unwrap().push(payload.clone());
            Ok(())
        }

        fn store_name(&self) -> &'static str {
            "recording"
        }
    }

    fn updater(store: RecordingStore) -> DnsRecordUpdater {
        DnsRecordUpdater::new(
            Box::new(store),
            ManagedRecord {
                id: RecordId::new("alias-id"),
                name: "dyn.example.com".to_string(),
            },
            AliasTarget {
                target: "wan1.example.com".to_string(),
                ttl: 60,
            },
            AliasTarget {
                target: "wan2.example.com".to_string(),
                ttl: 300,
            },
        )
        .with_address_record(
            ManagedRecord {
                id: RecordId::new("a-id"),
                name: "ip.example.com".to_string(),
            },
            60,
        )
    }

    #[tokio::test]
    async fn test_apply_state_uses_state_specific_ttl() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let updater = updater(RecordingStore {
            writes: writes.clone(),
            fail: false,
        });

        updater.apply_state(FailoverState::Secondary).await.unwrap();
        updater.apply_state(FailoverState::Primary).await.unwrap();

        let writes = writes.lock().unwrap();
        assert_eq!(writes[0], RecordPayload::cname("dyn.example.com", "wan2.example.com", 300));
        assert_eq!(writes[1], RecordPayload::cname("dyn.example.com", "wan1.example.com", 60));
    }

    #[tokio::test]
    async fn test_apply_address_is_idempotent() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let mut updater = updater(RecordingStore {
            writes: writes.clone(),
            fail: false,
        });
        let addr = Ipv4Addr::new(88, 42, 1, 7);

        assert_eq!(
            updater.apply_address(addr).await.unwrap(),
            AddressUpdate::Written { previous: None }
        );
        assert_eq!(updater.apply_address(addr).await.unwrap(), AddressUpdate::Unchanged);
        assert_eq!(writes.lock().unwrap().len(), 1);
        assert_eq!(updater.last_written_address(), Some(addr));
    }

    #[tokio::test]
    async fn test_failed_address_write_keeps_stale_marker() {
        let mut updater = updater(RecordingStore {
            writes: Arc::default(),
            fail: true,
        });

        let err = updater.apply_address(Ipv4Addr::new(88, 42, 1, 7)).await.unwrap_err();
        assert!(matches!(err, Error::RecordWrite { ref name, .. } if name == "ip.example.com"));
        assert_eq!(updater.last_written_address(), None);
    }

    #[tokio::test]
    async fn test_address_disabled_without_record() {
        let mut updater = DnsRecordUpdater::new(
            Box::new(RecordingStore::default()),
            ManagedRecord {
                id: RecordId::new("alias-id"),
                name: "dyn.example.com".to_string(),
            },
            AliasTarget {
                target: "wan1.example.com".to_string(),
                ttl: 60,
            },
            AliasTarget {
                target: "wan2.example.com".to_string(),
                ttl: 300,
            },
        );

        assert!(!updater.tracks_address());
        assert_eq!(
            updater.apply_address(Ipv4Addr::new(1, 2, 3, 4)).await.unwrap(),
            AddressUpdate::Disabled
        );
    }
}
