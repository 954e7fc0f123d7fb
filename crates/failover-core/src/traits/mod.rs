//! Collaborator traits for the failover system
//!
//! The core never performs network I/O itself; everything outbound goes
//! through one of these interfaces.
//!
//! - [`AddressSource`]: Discover the external IPv4 address
//! - [`RecordStore`]: Resolve and rewrite DNS records
//! - [`NotificationTransport`]: Deliver operator notifications
//! - [`LivenessPing`]: Report completed cycles to an external monitor

pub mod address_source;
pub mod liveness;
pub mod notifier;
pub mod record_store;

pub use address_source::AddressSource;
pub use liveness::LivenessPing;
pub use notifier::NotificationTransport;
pub use record_store::{RecordId, RecordPayload, RecordStore, RecordType};
