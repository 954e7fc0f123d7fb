// # failover-core
//
// Core library for the dual-uplink DNS failover system.
//
// ## Architecture Overview
//
// This library turns periodic observations of the router's external IPv4
// address into a debounced failover decision and publishes it by switching
// a DNS alias between two targets:
// - **SubnetClassifier**: Maps an observed address onto primary/secondary
// - **FailoverStateMachine**: Hysteresis counter with edge-triggered transitions
// - **DnsRecordUpdater**: Idempotent writes of the alias and address records
// - **NotificationDispatcher**: Best-effort notifications with ordered replay
// - **FailoverEngine**: Orchestrates one polling cycle after another
// - **Heartbeat**: Liveness timestamp shared with the probe
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Decision logic is separate from I/O collaborators
// 2. **Single Owner**: All session state lives in the engine; only the heartbeat is shared
// 3. **Sequential Cycles**: One outbound call at a time, in a fixed order
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Idempotency**: Records are only rewritten when something changed

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod failover;
pub mod heartbeat;
pub mod notify;
pub mod traits;
pub mod updater;

// Re-export core types for convenience
pub use classifier::{Classification, Ipv4Net, SubnetClassifier};
pub use config::{
    AddressRecordConfig, CloudflareConfig, EngineConfig, FailoverConfig, HealthConfig,
    TelegramConfig, UplinkConfig,
};
pub use engine::{EngineEvent, FailoverEngine};
pub use error::{Error, RecordRole, Result};
pub use failover::{FailoverState, FailoverStateMachine, Observation};
pub use heartbeat::Heartbeat;
pub use notify::{Delivery, NotificationDispatcher, PendingNotification};
pub use traits::{AddressSource, LivenessPing, NotificationTransport, RecordStore};
pub use updater::{AddressUpdate, AliasTarget, DnsRecordUpdater, ManagedRecord};
