use anyhow::{Context, Result};
use clap::Parser;
use secureaware_config::{ConfigLoader, LogLevel, SecureAwareConfig};
use secureaware_logging::init_logging_from_config;
use secureaware_rbac::SessionVerifier;

use secureaware_server::{services, AppState, Server};

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::PrintConfig = cli.command {
        print!("{}", SecureAwareConfig::generate_sample());
        return Ok(());
    }

    let mut config = ConfigLoader::new()
        .load(cli.config.as_ref())
        .context("Failed to load configuration")?;

    if let Some(level) = &cli.log_level {
        config.logging.level = level
            .parse::<LogLevel>()
            .map_err(|e| anyhow::anyhow!("Invalid --log-level: {}", e))?;
    }

    match cli.command {
        Commands::Serve { users } => {
            init_logging_from_config(&config.logging)?;

            if config.access.session.dev_mode {
                tracing::warn!("Session dev_mode is enabled; tokens may be signed with the development secret");
            }

            let users = match users {
                Some(path) => services::load_users(path)?,
                None => {
                    tracing::warn!("No --users file given, serving the built-in demo directory");
                    services::demo_users()?
                }
            };
            tracing::info!("Loaded {} users", users.len());

            let state = AppState::in_memory(&config, users)?;
            Server::new(config, state).start().await
        }
        Commands::Token { user, email, role } => {
            let verifier = SessionVerifier::new(config.access.session.clone());
            let token = verifier.issue(&user, email.as_deref(), role)?;
            println!("{}", token);
            Ok(())
        }
        Commands::PrintConfig => Ok(()),
    }
}
