// # Notification Transport Trait
//
// Defines the interface for delivering operator notifications.
//
// ## Implementations
//
// - Telegram Bot API: `failover-notify-telegram` crate
//
// Transports are single-shot. Buffering, replay and start-up suppression
// are owned by `NotificationDispatcher`.

use async_trait::async_trait;

/// Trait for outbound notification transports
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Deliver one message
    ///
    /// When `rich` is set the text contains transport markup (`*bold*`)
    /// and the transport is responsible for escaping everything else.
    ///
    /// Every failure (DNS, timeout, non-2xx) is reported as an error; the
    /// dispatcher does not distinguish between them.
    async fn send(&self, text: &str, rich: bool) -> Result<(), crate::Error>;

    /// Get the transport name (for logging)
    fn transport_name(&self) -> &'static str;
}
