use tracing_subscriber::{fmt, EnvFilter};

use crate::{AppError, ErrorKind};

pub(crate) fn parse_filter(directives: &str) -> Result<EnvFilter, AppError> {
    EnvFilter::try_new(directives).map_err(|e| {
        AppError::new(ErrorKind::Configuration, "invalid log filter")
            .with_internal(e.to_string())
            .with_context("filter", directives)
    })
}

/// Picks the filter `init` installs: a parsable `RUST_LOG` value wins,
/// otherwise `configured` is used.
pub fn filter(env: Option<&str>, configured: &str) -> Result<EnvFilter, AppError> {
    match env.map(parse_filter) {
        Some(Ok(filter)) => Ok(filter),
        _ => parse_filter(configured),
    }
}

/// Installs the global fmt subscriber with `default_filter` (normally
/// `CoreConfig::log_filter`). Fails, rather than panicking, if a
/// subscriber is already set.
pub fn init(default_filter: &str) -> Result<(), AppError> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = filter(env.as_deref(), default_filter)?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| {
            AppError::new(ErrorKind::InvalidState, "logging already initialised")
                .with_internal(e.to_string())
        })
}
