mod cli;
mod commands;
mod error;

use std::process;

use alert_channels::{AlertRequest, TelegramSettingsUpdate};
use clap::Parser;
use tracing::{Level, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::{Args, Commands},
    commands::{CommandExecutor, default_config_path},
    error::Result,
};

#[tokio::main]
async fn main() {
    // Load .env before parsing so env-backed flags pick it up.
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config_path = args.config.unwrap_or_else(default_config_path);
    let executor = CommandExecutor::new(&config_path, &args.api_base)?;

    match args.command {
        Commands::Configure {
            bot_token,
            chat_id,
            enabled,
        } => {
            executor.configure(TelegramSettingsUpdate {
                bot_token,
                chat_id,
                enabled,
            })?;
            println!("✓ Telegram settings saved to {}", config_path.display());
        }

        Commands::Status { json } => {
            let report = executor.status();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.render());
            }
        }

        Commands::Send {
            message,
            media,
            event,
            force,
        } => {
            let alert = AlertRequest {
                message,
                media_path: media,
                event_type: event,
            };
            let method = executor.send(&alert, force).await?;
            println!("✓ Alert sent via {}", method);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(verbose).with_writer(std::io::stderr))
        .init();
}
