//! Logging setup with a reloadable filter.
//!
//! This module provides:
//! - Runtime log level changes via `tracing_subscriber::reload`
//! - Plain or JSON console output
//! - Local timezone timestamps for logs

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "fallback_messaging=info,sqlx=warn,tower_http=info";

/// Custom timer that uses the local timezone via chrono.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Type alias for the reload handle.
pub type FilterHandle = Handle<EnvFilter, tracing_subscriber::Registry>;

/// Console output format.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Handle on the installed subscriber's filter.
pub struct LoggingConfig {
    handle: FilterHandle,
}

impl LoggingConfig {
    fn new(handle: FilterHandle) -> Self {
        Self { handle }
    }

    /// Get the current filter directive string.
    pub fn get_filter(&self) -> String {
        self.handle
            .with_current(|filter| filter.to_string())
            .unwrap_or_default()
    }

    /// Set a new filter directive (e.g. `fallback_messaging=debug,sqlx=warn`).
    pub fn set_filter(&self, directive: &str) -> crate::Result<()> {
        let new_filter = EnvFilter::try_new(directive)
            .map_err(|e| crate::Error::validation(format!("Invalid filter directive: {}", e)))?;

        self.handle
            .reload(new_filter)
            .map_err(|e| crate::Error::Other(format!("Failed to reload filter: {}", e)))?;

        info!(directive = %directive, "Log filter updated");
        Ok(())
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides [`DEFAULT_LOG_FILTER`] as the initial filter.
pub fn init_logging(format: LogFormat) -> crate::Result<Arc<LoggingConfig>> {
    let initial_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let (filter_layer, filter_handle) = reload::Layer::new(initial_filter);

    let (plain_layer, json_layer) = match format {
        LogFormat::Plain => (
            Some(fmt::layer().with_ansi(true).with_timer(LocalTimer)),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_timer(LocalTimer),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(plain_layer)
        .with(json_layer)
        .try_init()
        .map_err(|e| {
            crate::Error::Other(format!("Failed to set global default subscriber: {}", e))
        })?;

    Ok(Arc::new(LoggingConfig::new(filter_handle)))
}

/// Logging targets worth tuning, for API responses.
pub fn available_modules() -> Vec<(&'static str, &'static str)> {
    vec![
        ("fallback_messaging", "Main application"),
        ("fallback_messaging::delivery", "Primary dispatch and fallback evaluation"),
        ("fallback_messaging::confirmation", "Provider delivery events"),
        ("fallback_messaging::channels", "Provider API calls"),
        ("sqlx", "Database queries"),
        ("reqwest", "HTTP requests"),
        ("tower_http", "HTTP middleware"),
    ]
}
