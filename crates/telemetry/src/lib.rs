//! Tracing subscriber bootstrap driven by `LoggingSettings`.

use anyhow::Context;
use bookshelf_kernel::settings::{LogFormat, Settings};
use tracing_subscriber::{fmt, EnvFilter};

/// Resolve the output format: explicit setting first, otherwise JSON in
/// production and pretty everywhere else.
pub fn effective_format(settings: &Settings) -> LogFormat {
    settings.logging.format.unwrap_or(if settings.is_production() {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    })
}

/// Build the level filter. `RUST_LOG` wins over `logging.level`.
pub fn env_filter(settings: &Settings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.logging.level)
            .with_context(|| format!("invalid logging.level '{}'", settings.logging.level)),
    }
}

/// Install the global tracing subscriber. Calling this twice is harmless:
/// the second installation is skipped.
pub fn init(settings: &Settings) -> anyhow::Result<()> {
    let filter = env_filter(settings)?;
    let format = effective_format(settings);

    let installed = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_target(true)
            .try_init(),
        LogFormat::Pretty => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    if installed.is_ok() {
        tracing::info!(
            target: "bookshelf-telemetry",
            environment = ?settings.environment,
            format = ?format,
            "telemetry initialized"
        );
    }

    Ok(())
}
