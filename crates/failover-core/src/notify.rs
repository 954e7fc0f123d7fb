//! Best-effort operator notifications
//!
//! The [`NotificationDispatcher`] sits between the engine and a
//! [`NotificationTransport`]:
//!
//! - The first message after construction is swallowed, so restarts do
//!   not page anyone.
//! - A message that fails to send is queued with its original timestamp.
//! - After the next successful send the queue is replayed in FIFO order,
//!   each replayed message annotated with when it was first queued.
//!   Entries that fail again go back to the end of the queue.
//!
//! Nothing here is ever surfaced to the caller as an error.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::traits::NotificationTransport;

/// Format of the original queue time in replayed messages
const QUEUED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// A message waiting to be replayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotification {
    /// Original message text
    pub message: String,
    /// Whether the text uses transport markup
    pub rich: bool,
    /// When the first delivery attempt failed
    pub queued_at: DateTime<Utc>,
}

impl PendingNotification {
    /// Text sent when this entry is replayed
    pub fn replay_text(&self) -> String {
        format!(
            "{}\n\n(delayed message, originally queued at {})",
            self.message,
            self.queued_at.format(QUEUED_AT_FORMAT)
        )
    }
}

/// What happened to one `notify` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// No transport configured
    Disabled,
    /// First message of the session, swallowed
    Suppressed,
    /// Sent; `replayed` queued messages were delivered afterwards
    Delivered {
        /// Queued messages delivered during the replay
        replayed: usize,
    },
    /// Send failed, message queued for replay
    Queued,
}

/// Buffers and replays notifications over an unreliable transport
pub struct NotificationDispatcher {
    transport: Option<Box<dyn NotificationTransport>>,
    suppress_next: bool,
    pending: VecDeque<PendingNotification>,
    send_timeout: Duration,
}

impl NotificationDispatcher {
    /// Create a dispatcher with the start-up suppression armed
    pub fn new(transport: Box<dyn NotificationTransport>) -> Self {
        Self {
            transport: Some(transport),
            suppress_next: true,
            pending: VecDeque::new(),
            send_timeout: Duration::from_secs(10),
        }
    }

    /// Create a dispatcher that drops everything (notifications disabled)
    pub fn disabled() -> Self {
        Self {
            transport: None,
            suppress_next: true,
            pending: VecDeque::new(),
            send_timeout: Duration::from_secs(10),
        }
    }

    /// Set the budget for a single send
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Messages waiting for replay, oldest first
    pub fn pending(&self) -> impl Iterator<Item = &PendingNotification> {
        self.pending.iter()
    }

    /// Number of messages waiting for replay
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Deliver a message, best effort
    pub async fn notify(&mut self, text: impl Into<String>, rich: bool) -> Delivery {
        self.notify_at(text, rich, Utc::now()).await
    }

    /// Deliver a message, queueing it with `now` on failure
    pub async fn notify_at(
        &mut self,
        text: impl Into<String>,
        rich: bool,
        now: DateTime<Utc>,
    ) -> Delivery {
        let text = text.into();

        if self.transport.is_none() {
            debug!("Notifications disabled, dropping: {}", text);
            return Delivery::Disabled;
        }

        if self.suppress_next {
            self.suppress_next = false;
            debug!("Suppressing first notification after startup: {}", text);
            return Delivery::Suppressed;
        }

        match self.send(&text, rich).await {
            Ok(()) => {
                let replayed = self.replay().await;
                Delivery::Delivered { replayed }
            }
            Err(e) => {
                warn!("Notification failed, queued for later: {}", e);
                self.pending.push_back(PendingNotification {
                    message: text,
                    rich,
                    queued_at: now,
                });
                Delivery::Queued
            }
        }
    }

    /// One pass over the queue as it stood when the pass began
    async fn replay(&mut self) -> usize {
        let mut delivered = 0;

        for _ in 0..self.pending.len() {
            let Some(entry) = self.pending.pop_front() else {
                break;
            };

            match self.send(&entry.replay_text(), entry.rich).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Replay of notification queued at {} failed: {}", entry.queued_at, e);
                    self.pending.push_back(entry);
                }
            }
        }

        if delivered > 0 {
            debug!(
                "Replayed {} queued notification(s), {} still pending",
                delivered,
                self.pending.len()
            );
        }

        delivered
    }

    async fn send(&self, text: &str, rich: bool) -> Result<()> {
        let Some(ref transport) = self.transport else {
            return Ok(());
        };

        match tokio::time::timeout(self.send_timeout, transport.send(text, rich)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout("notification send", self.send_timeout)),
        }
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("transport", &self.transport.as_ref().map(|t| t.transport_name()))
            .field("suppress_next", &self.suppress_next)
            .field("pending", &self.pending.len())
            .finish()
    }
}
