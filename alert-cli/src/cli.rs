use std::path::PathBuf;

use alert_channels::{DEFAULT_API_BASE, EventType};
use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "haven-alert",
    version,
    about = "Configure and send Telegram security alerts"
)]
pub struct Args {
    /// Settings file (defaults to <config dir>/haven-alert/telegram.json)
    #[arg(short, long, global = true, env = "HAVEN_ALERT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bot API server base URL
    #[arg(long, global = true, env = "TELEGRAM_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Update stored Telegram settings; omitted options keep their value
    Configure {
        #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
        bot_token: Option<String>,

        #[arg(long, env = "TELEGRAM_CHAT_ID")]
        chat_id: Option<String>,

        #[arg(long, value_name = "BOOL", action = ArgAction::Set)]
        enabled: Option<bool>,
    },

    /// Show whether the channel is enabled and configured
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send one alert
    Send {
        /// Message text, also used as the media caption
        message: String,

        /// Media file to attach
        #[arg(short, long)]
        media: Option<PathBuf>,

        /// Event source: camera, microphone, camera_video or other
        #[arg(short, long, default_value_t = EventType::Other)]
        event: EventType,

        /// Send even if the channel is switched off
        #[arg(long)]
        force: bool,
    },
}
