//! Outbound alert channels for a mobile security-alerting application.
//!
//! Given an alert (motion, sound, ...) the [`TelegramChannel`] sends either a
//! text message or a captured media file to a configured Telegram chat. Bot
//! credentials live in an injected [`SettingsStore`]; HTTP goes through an
//! [`HttpTransport`] so the request construction can be exercised without a
//! network.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use alert_channels::{AlertChannel, AlertRequest, EventType, MemorySettingsStore, TelegramChannel};
//!
//! let store = Arc::new(MemorySettingsStore::default());
//! let channel = TelegramChannel::new(store);
//!
//! if channel.is_enabled() {
//!     channel
//!         .send_alert(&AlertRequest::with_media("Motion detected", "/tmp/snap.jpg", EventType::Camera))
//!         .await?;
//! }
//! ```

pub mod channels;
pub mod error;
pub mod event;
pub mod multipart;
pub mod store;
pub mod transport;

pub use channels::{AlertChannel, DEFAULT_API_BASE, TelegramChannel};
pub use error::{Error, Result};
pub use event::{AlertRequest, ApiMethod, EventType};
pub use multipart::MultipartBody;
pub use store::{
    JsonFileSettingsStore, MemorySettingsStore, SettingsStore, TelegramSettings,
    TelegramSettingsUpdate, mask_token,
};
pub use transport::{HttpRequest, HttpTransport, RequestBody, ReqwestTransport, TransportError};
