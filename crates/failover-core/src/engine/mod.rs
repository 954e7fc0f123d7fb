//! Core failover engine
//!
//! The FailoverEngine is responsible for:
//! - Discovering the external address once per cycle
//! - Keeping the optional address record in sync
//! - Feeding the classification into the state machine
//! - Rewriting the dynamic alias on transitions
//! - Notifying the operator
//! - Recording the liveness heartbeat
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐
//! │ AddressSource │─── Ipv4Addr ───┐
//! └───────────────┘                │
//!                                  ▼
//!                     ┌──────────────────────┐
//!                     │ SubnetClassifier     │
//!                     │ FailoverStateMachine │
//!                     └──────────────────────┘
//!                                  │
//!         ┌────────────────────────┼────────────────────────┐
//!         │                        │                        │
//!         ▼                        ▼                        ▼
//! ┌────────────────┐     ┌───────────────────┐     ┌───────────────┐
//! │ DnsRecord      │     │ Notification      │     │  Heartbeat    │
//! │ Updater        │     │ Dispatcher        │     │  (+ ping)     │
//! └────────────────┘     └───────────────────┘     └───────────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. Resolve the external address (on failure: reset confidence, notify, go to 5)
//! 2. Update the address record if it changed
//! 3. Classify and feed the state machine
//! 4. On a transition, rewrite the alias and notify
//! 5. Record the heartbeat
//! 6. Sleep until the next cycle
//!
//! Every outbound call within a cycle is sequential. Ordering (address
//! record before alias, alias before notification) is part of the contract.

use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::classifier::{Classification, SubnetClassifier};
use crate::config::FailoverConfig;
use crate::error::{Error, Result};
use crate::failover::{FailoverState, FailoverStateMachine, Observation};
use crate::heartbeat::Heartbeat;
use crate::notify::NotificationDispatcher;
use crate::traits::{AddressSource, LivenessPing};
use crate::updater::{AddressUpdate, DnsRecordUpdater};

/// Events emitted by the FailoverEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        threshold: u32,
        confidence: u32,
        state: FailoverState,
    },

    /// External address discovered
    AddressResolved { address: Ipv4Addr },

    /// External address discovery failed
    ResolutionFailed { error: String },

    /// Address record rewritten
    AddressRecordWritten {
        address: Ipv4Addr,
        previous: Option<Ipv4Addr>,
    },

    /// Address record write failed (retried next cycle)
    AddressRecordFailed { address: Ipv4Addr, error: String },

    /// Address classified and fed into the state machine
    Classified {
        address: Ipv4Addr,
        classification: Classification,
        confidence: u32,
    },

    /// Failover state changed
    Transition {
        state: FailoverState,
        confidence: u32,
    },

    /// Dynamic alias rewritten
    AliasWritten {
        state: FailoverState,
        target: String,
    },

    /// Dynamic alias write failed (not retried until the next transition)
    AliasWriteFailed { state: FailoverState, error: String },

    /// Cycle finished and heartbeat recorded
    CycleCompleted {
        confidence: u32,
        state: FailoverState,
    },

    /// Engine stopped
    Stopped { reason: String },
}

/// Core failover engine
///
/// Owns the whole session: state machine, updater markers, notification
/// buffer. Nothing is shared with other tasks except the [`Heartbeat`].
///
/// ## Lifecycle
///
/// 1. Resolve records with [`DnsRecordUpdater::resolve()`]
/// 2. Create with [`FailoverEngine::new()`]
/// 3. Start with [`FailoverEngine::run()`]
/// 4. Engine runs until shutdown signal received
pub struct FailoverEngine {
    /// External address discovery
    source: Box<dyn AddressSource>,

    /// Range classifier
    classifier: SubnetClassifier,

    /// Confidence counter and failover state
    machine: FailoverStateMachine,

    /// Record writer
    updater: DnsRecordUpdater,

    /// Operator notifications
    dispatcher: NotificationDispatcher,

    /// Liveness timestamp shared with the probe
    heartbeat: Heartbeat,

    /// Optional external liveness ping
    liveness: Option<Box<dyn LivenessPing>>,

    /// Sleep between cycles
    poll_interval: Duration,

    /// Outer budget for one address discovery
    discovery_timeout: Duration,

    /// Budget for one liveness ping
    ping_timeout: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl FailoverEngine {
    /// Create a new failover engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        source: Box<dyn AddressSource>,
        updater: DnsRecordUpdater,
        dispatcher: NotificationDispatcher,
        config: &FailoverConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let classifier = SubnetClassifier::new(config.primary.range, config.secondary.range)?;
        let machine = FailoverStateMachine::new(config.confidence)?;
        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let discovery_timeout = config.engine.discovery_timeout() * source.max_attempts().max(1);

        let engine = Self {
            source,
            classifier,
            machine,
            updater,
            dispatcher,
            heartbeat: Heartbeat::new(),
            liveness: None,
            poll_interval: config.engine.poll_interval(),
            discovery_timeout,
            ping_timeout: config.engine.ping_timeout(),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Share an existing heartbeat handle (e.g. with the liveness probe)
    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Ping an external monitor after every cycle
    pub fn with_liveness_ping(mut self, ping: Box<dyn LivenessPing>) -> Self {
        self.liveness = Some(ping);
        self
    }

    /// A handle on the heartbeat written by this engine
    pub fn heartbeat(&self) -> Heartbeat {
        self.heartbeat.clone()
    }

    /// The state machine
    pub fn machine(&self) -> &FailoverStateMachine {
        &self.machine
    }

    /// The record updater
    pub fn updater(&self) -> &DnsRecordUpdater {
        &self.updater
    }

    /// The notification dispatcher
    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Run the engine until SIGINT
    pub async fn run(&mut self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine until the given signal fires (or its sender is dropped)
    ///
    /// Used by the daemon, which owns signal handling, and by tests.
    pub async fn run_with_shutdown(&mut self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.run_internal(Some(shutdown_rx)).await
    }

    async fn run_internal(&mut self, mut shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        info!(
            "Starting failover engine (threshold {}, seed {}, interval {:?})",
            self.machine.threshold(),
            self.machine.confidence(),
            self.poll_interval
        );
        self.emit_event(EngineEvent::Started {
            threshold: self.machine.threshold(),
            confidence: self.machine.confidence(),
            state: self.machine.state(),
        });

        loop {
            self.run_cycle().await;

            debug!("Sleeping...");
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown_signal(&mut shutdown_rx) => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        info!("Failover engine stopped");
        Ok(())
    }

    /// Run a single polling cycle (steps 1-5)
    pub async fn run_cycle(&mut self) -> Observation {
        let observation = match self.resolve().await {
            Ok(address) => self.handle_address(address).await,
            Err(e) => {
                warn!("External IPv4 resolve error: {}", e);
                self.emit_event(EngineEvent::ResolutionFailed {
                    error: e.to_string(),
                });
                let observation = self.machine.observe_failure();
                self.dispatcher
                    .notify(format!("External IPv4 address could not be resolved: {}", e), false)
                    .await;
                if let Some(state) = observation.transition {
                    self.apply_transition(state, observation.confidence, None).await;
                }
                observation
            }
        };

        self.heartbeat.beat();
        self.ping().await;

        debug!(
            "Confidence {}/{}, state {}",
            observation.confidence,
            self.machine.threshold(),
            observation.state
        );
        self.emit_event(EngineEvent::CycleCompleted {
            confidence: observation.confidence,
            state: observation.state,
        });

        observation
    }

    async fn resolve(&self) -> Result<Ipv4Addr> {
        debug!("Resolving external IPv4 via {}...", self.source.source_name());
        match tokio::time::timeout(self.discovery_timeout, self.source.resolve()).await {
            Ok(Ok(address)) => Ok(address),
            Ok(Err(e)) => Err(Error::resolution(e.to_string())),
            Err(_) => Err(Error::timeout("address discovery", self.discovery_timeout)),
        }
    }

    async fn handle_address(&mut self, address: Ipv4Addr) -> Observation {
        debug!("External IP is {}", address);
        self.emit_event(EngineEvent::AddressResolved { address });

        match self.updater.apply_address(address).await {
            Ok(AddressUpdate::Written { previous }) => {
                self.emit_event(EngineEvent::AddressRecordWritten { address, previous });
            }
            Ok(AddressUpdate::Unchanged | AddressUpdate::Disabled) => {}
            Err(e) => {
                warn!("Address record update error: {}", e);
                self.emit_event(EngineEvent::AddressRecordFailed {
                    address,
                    error: e.to_string(),
                });
                self.dispatcher
                    .notify(format!("Address record update failed: {}", e), false)
                    .await;
            }
        }

        let classification = self.classifier.classify(address);
        if classification == Classification::Ambiguous {
            warn!(
                "External IP ({}) is in neither the primary ({}) nor the secondary ({}) range, ignoring",
                address,
                display_range(self.classifier.primary()),
                display_range(self.classifier.secondary())
            );
        }

        let observation = self.machine.observe(classification);
        self.emit_event(EngineEvent::Classified {
            address,
            classification,
            confidence: observation.confidence,
        });

        if let Some(state) = observation.transition {
            self.apply_transition(state, observation.confidence, Some(address)).await;
        }

        observation
    }

    async fn apply_transition(
        &mut self,
        state: FailoverState,
        confidence: u32,
        address: Option<Ipv4Addr>,
    ) {
        info!(
            "Failover state {} (confidence {}/{})",
            state,
            confidence,
            self.machine.threshold()
        );
        self.emit_event(EngineEvent::Transition { state, confidence });

        match self.updater.apply_state(state).await {
            Ok(target) => {
                let target = target.target.clone();
                self.emit_event(EngineEvent::AliasWritten { state, target });
                let message = status_message(state, confidence, self.machine.threshold(), address);
                self.dispatcher.notify(message, true).await;
            }
            Err(e) => {
                // Edge-triggered: this write is not attempted again until the
                // next transition.
                warn!("Dynamic alias update error: {}", e);
                self.emit_event(EngineEvent::AliasWriteFailed {
                    state,
                    error: e.to_string(),
                });
                self.dispatcher
                    .notify(
                        format!("Dynamic alias update to the {} target failed: {}", state, e),
                        false,
                    )
                    .await;
            }
        }
    }

    async fn ping(&self) {
        let Some(ref ping) = self.liveness else {
            return;
        };

        match tokio::time::timeout(self.ping_timeout, ping.ping()).await {
            Ok(Ok(())) => debug!("Liveness ping sent"),
            Ok(Err(e)) => warn!("Liveness ping failed: {}", e),
            Err(_) => warn!("Liveness ping timed out after {:?}", self.ping_timeout),
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// Operator message for a completed transition
///
/// Uses `*bold*` markup; the transport escapes everything else. `address`
/// is `None` when the transition came from a failed discovery.
pub fn status_message(
    state: FailoverState,
    confidence: u32,
    threshold: u32,
    address: Option<Ipv4Addr>,
) -> String {
    let headline = match state {
        FailoverState::Primary => "Primary network connection *STABLE*. Failover inactive.",
        FailoverState::Secondary => "Primary network connection *FAILED*. Failover active.",
    };
    let address = address.map_or_else(|| "unknown".to_string(), |a| a.to_string());
    format!(
        "{}\nConfidence: {}/{}\nExternal IP: {}",
        headline, confidence, threshold, address
    )
}

fn display_range(range: Option<crate::classifier::Ipv4Net>) -> String {
    range.map_or_else(|| "unset".to_string(), |r| r.to_string())
}

async fn shutdown_signal(rx: &mut Option<oneshot::Receiver<()>>) {
    match rx {
        // A dropped sender counts as a shutdown request.
        Some(rx) => {
            let _ = rx.await;
        }
        None => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}
