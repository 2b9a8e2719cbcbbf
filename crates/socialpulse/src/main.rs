mod bootstrap;
mod commands;

use anyhow::Result;
use clap::Parser;
use pulse_core::settings::{Command, PulseConfig, Settings};

/// Exit code when the analytics account must be reconnected.
const EXIT_NOT_CONNECTED: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(settings.effective_log_level(), settings.log_file.as_ref())?;

    tracing::info!("SocialPulse v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = settings.config_path();
    let config = PulseConfig::load_from(&config_path)?;
    tracing::debug!("Config: {}", config_path.display());

    let output = match &settings.command {
        Command::Inspect(args) => commands::inspect(args, &config)?,
        Command::Report(args) => {
            tracing::info!("Building report from {}", args.manifest.display());
            commands::report(args, &config).await?
        }
        Command::Fetch(args) => match commands::fetch(args, &config, &config_path).await {
            Ok(output) => output,
            Err(err) if commands::needs_reauth(&err) => {
                tracing::warn!("{err}");
                eprintln!(
                    "Analytics account is not connected: {err}\n\
                     Re-authenticate and pass a fresh --refresh-token \
                     (or set SOCIALPULSE_REFRESH_TOKEN)."
                );
                std::process::exit(EXIT_NOT_CONNECTED);
            }
            Err(err) => return Err(err),
        },
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
