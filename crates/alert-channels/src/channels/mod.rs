//! Alert channels.
//!
//! A channel delivers one alert per call to a single external destination.
//! The surrounding alerting framework selects channels by name and checks
//! [`AlertChannel::is_enabled`] before dispatching.

mod telegram;

pub use telegram::{DEFAULT_API_BASE, TelegramChannel};

use async_trait::async_trait;

use crate::Result;
use crate::event::AlertRequest;

/// Trait for alert channels.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Human-readable channel name for display and selection.
    fn channel_name(&self) -> &'static str;

    /// Whether the channel is switched on and fully configured.
    fn is_enabled(&self) -> bool;

    /// Whether the destination can currently be used.
    fn is_available(&self) -> bool;

    /// Whether required credentials are still missing.
    fn requires_configuration(&self) -> bool;

    /// Deliver one alert.
    async fn send_alert(&self, alert: &AlertRequest) -> Result<()>;
}
