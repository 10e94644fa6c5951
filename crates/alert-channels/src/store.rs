//! Persisted Telegram credentials.
//!
//! The channel never owns its credentials: it reads and writes them through a
//! [`SettingsStore`] supplied by the host application. Two stores ship here:
//! an in-memory one for embedding and tests, and a JSON file store used by the
//! command-line tool.

use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Source and sink of the Telegram channel's credential state.
pub trait SettingsStore: Send + Sync {
    fn telegram_bot_token(&self) -> String;
    fn set_telegram_bot_token(&self, token: &str) -> Result<()>;

    fn telegram_chat_id(&self) -> String;
    fn set_telegram_chat_id(&self, chat_id: &str) -> Result<()>;

    fn telegram_enabled(&self) -> bool;
    fn set_telegram_enabled(&self, enabled: bool) -> Result<()>;

    /// Consistent copy of all three fields.
    fn snapshot(&self) -> TelegramSettings {
        TelegramSettings {
            bot_token: self.telegram_bot_token(),
            chat_id: self.telegram_chat_id(),
            enabled: self.telegram_enabled(),
        }
    }
}

/// Telegram channel settings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    #[serde(default, rename = "telegramBotToken")]
    pub bot_token: String,
    /// Destination chat (user, group or channel).
    #[serde(default, rename = "telegramChatId")]
    pub chat_id: String,
    #[serde(default, rename = "telegramEnabled")]
    pub enabled: bool,
}

impl TelegramSettings {
    /// Both credentials are present.
    pub fn has_credentials(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }

    fn apply(&mut self, update: &TelegramSettingsUpdate) {
        if let Some(token) = &update.bot_token {
            self.bot_token = token.clone();
        }
        if let Some(chat_id) = &update.chat_id {
            self.chat_id = chat_id.clone();
        }
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
    }
}

impl fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("bot_token", &mask_token(&self.bot_token))
            .field("chat_id", &self.chat_id)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Partial settings update. `None` fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelegramSettingsUpdate {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub enabled: Option<bool>,
}

impl TelegramSettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.bot_token.is_none() && self.chat_id.is_none() && self.enabled.is_none()
    }
}

/// Show only the bot id prefix of a token (`123456:***`).
pub fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return String::new();
    }
    match token.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:***"),
        None => "***".to_string(),
    }
}

/// In-memory settings store.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: RwLock<TelegramSettings>,
}

impl MemorySettingsStore {
    pub fn new(settings: TelegramSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn telegram_bot_token(&self) -> String {
        self.settings.read().bot_token.clone()
    }

    fn set_telegram_bot_token(&self, token: &str) -> Result<()> {
        self.settings.write().bot_token = token.to_string();
        Ok(())
    }

    fn telegram_chat_id(&self) -> String {
        self.settings.read().chat_id.clone()
    }

    fn set_telegram_chat_id(&self, chat_id: &str) -> Result<()> {
        self.settings.write().chat_id = chat_id.to_string();
        Ok(())
    }

    fn telegram_enabled(&self) -> bool {
        self.settings.read().enabled
    }

    fn set_telegram_enabled(&self, enabled: bool) -> Result<()> {
        self.settings.write().enabled = enabled;
        Ok(())
    }

    fn snapshot(&self) -> TelegramSettings {
        self.settings.read().clone()
    }
}

/// JSON file backed settings store.
///
/// The document is loaded once on open and rewritten in full on every change.
#[derive(Debug)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
    settings: RwLock<TelegramSettings>,
}

impl JsonFileSettingsStore {
    /// Open the store at `path`. A missing file yields default settings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = match std::fs::read(&path) {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                Error::store(format!("invalid settings file {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Settings file not found, using defaults");
                TelegramSettings::default()
            }
            Err(e) => {
                return Err(Error::store(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        Ok(Self {
            path,
            settings: RwLock::new(settings),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `update` and persist the result.
    fn modify(&self, update: TelegramSettingsUpdate) -> Result<()> {
        let mut guard = self.settings.write();
        let mut next = guard.clone();
        next.apply(&update);
        persist(&self.path, &next)?;
        *guard = next;
        Ok(())
    }
}

fn persist(path: &Path, settings: &TelegramSettings) -> Result<()> {
    let io_err = |e: std::io::Error| Error::store(format!("failed to write {}: {}", path.display(), e));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let json = serde_json::to_vec_pretty(settings)
        .map_err(|e| Error::store(format!("failed to serialize settings: {e}")))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;

    debug!(path = %path.display(), "Settings saved");
    Ok(())
}

impl SettingsStore for JsonFileSettingsStore {
    fn telegram_bot_token(&self) -> String {
        self.settings.read().bot_token.clone()
    }

    fn set_telegram_bot_token(&self, token: &str) -> Result<()> {
        self.modify(TelegramSettingsUpdate {
            bot_token: Some(token.to_string()),
            ..Default::default()
        })
    }

    fn telegram_chat_id(&self) -> String {
        self.settings.read().chat_id.clone()
    }

    fn set_telegram_chat_id(&self, chat_id: &str) -> Result<()> {
        self.modify(TelegramSettingsUpdate {
            chat_id: Some(chat_id.to_string()),
            ..Default::default()
        })
    }

    fn telegram_enabled(&self) -> bool {
        self.settings.read().enabled
    }

    fn set_telegram_enabled(&self, enabled: bool) -> Result<()> {
        self.modify(TelegramSettingsUpdate {
            enabled: Some(enabled),
            ..Default::default()
        })
    }

    fn snapshot(&self) -> TelegramSettings {
        self.settings.read().clone()
    }
}
