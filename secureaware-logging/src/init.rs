use anyhow::{Context, Result};
use secureaware_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Build the `EnvFilter` for a logging configuration.
///
/// `RUST_LOG` wins over the configured level when it is set, so operators can
/// raise verbosity without editing the config file.
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(config.filter_expression())
        .with_context(|| format!("invalid log filter '{}'", config.filter_expression()))
}

/// Initialize logging from configuration
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(config)?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    // try_init: a subscriber installed earlier (tests, embedding binaries) is left alone
    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}
