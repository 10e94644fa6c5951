//! Command implementations backed by the JSON settings file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use alert_channels::{
    AlertChannel, AlertRequest, ApiMethod, JsonFileSettingsStore, SettingsStore, TelegramChannel,
    TelegramSettingsUpdate, mask_token,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{AppError, Result};

/// Settings file used when none is given.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("haven-alert"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("telegram.json")
}

/// Snapshot of the channel state as shown by `status`.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub channel: &'static str,
    pub enabled: bool,
    pub available: bool,
    pub requires_configuration: bool,
    pub bot_token: String,
    pub chat_id: String,
    pub settings_file: PathBuf,
}

impl StatusReport {
    pub fn render(&self) -> String {
        let yes_no = |flag: bool| if flag { "yes" } else { "no" };
        format!(
            "Channel:                {}\n\
             Enabled:                {}\n\
             Available:              {}\n\
             Requires configuration: {}\n\
             Bot token:              {}\n\
             Chat ID:                {}\n\
             Settings file:          {}",
            self.channel,
            yes_no(self.enabled),
            yes_no(self.available),
            yes_no(self.requires_configuration),
            display_or_unset(&self.bot_token),
            display_or_unset(&self.chat_id),
            self.settings_file.display(),
        )
    }
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() { "(not set)" } else { value }
}

pub struct CommandExecutor {
    store: Arc<JsonFileSettingsStore>,
    channel: TelegramChannel,
}

impl CommandExecutor {
    pub fn new(config_path: &Path, api_base: &str) -> Result<Self> {
        let store = Arc::new(JsonFileSettingsStore::open(config_path)?);
        let channel = TelegramChannel::new(store.clone()).with_api_base(api_base);
        debug!(path = %config_path.display(), api_base = %channel.api_base(), "Loaded settings");
        Ok(Self { store, channel })
    }

    pub fn configure(&self, update: TelegramSettingsUpdate) -> Result<()> {
        if update.is_empty() {
            return Err(AppError::InvalidInput(
                "nothing to configure: pass --bot-token, --chat-id or --enabled".to_string(),
            ));
        }
        self.channel.configure(update)?;
        info!(path = %self.store.path().display(), "Telegram settings updated");
        Ok(())
    }

    pub fn status(&self) -> StatusReport {
        let settings = self.store.snapshot();
        StatusReport {
            channel: self.channel.channel_name(),
            enabled: self.channel.is_enabled(),
            available: self.channel.is_available(),
            requires_configuration: self.channel.requires_configuration(),
            bot_token: mask_token(&settings.bot_token),
            chat_id: settings.chat_id,
            settings_file: self.store.path().to_path_buf(),
        }
    }

    /// Send `alert`, refusing when the channel is switched off unless `force` is set.
    pub async fn send(&self, alert: &AlertRequest, force: bool) -> Result<ApiMethod> {
        if !force && !self.channel.is_enabled() {
            return Err(AppError::InvalidInput(
                "Telegram channel is disabled or not configured (use --force to bypass the enabled flag)"
                    .to_string(),
            ));
        }

        let method = self.channel.dispatch(alert).await?;
        info!(method = %method, "Alert delivered");
        Ok(method)
    }
}
