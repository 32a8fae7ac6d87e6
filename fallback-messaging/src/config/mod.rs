//! Process configuration.
//!
//! Every setting comes from an environment variable (optionally loaded from
//! `.env`) and has a default, so a bare `fallback-messaging` starts with a
//! local SQLite file and unconfigured providers.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::server::ApiServerConfig;
use crate::channels::{DEFAULT_META_API_VERSION, ProviderEndpoint};
use crate::delivery::FallbackWorkerConfig;
use crate::logging::LogFormat;

/// Default database location.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:fallback.db?mode=rwc";

/// Default provider request timeout in seconds.
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Provider API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub email: ProviderEndpoint,
    pub sms: ProviderEndpoint,
    pub whatsapp: ProviderEndpoint,
    pub timeout_secs: u64,
    pub meta_api_version: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            email: ProviderEndpoint::default(),
            sms: ProviderEndpoint::default(),
            whatsapp: ProviderEndpoint::default(),
            timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            meta_api_version: DEFAULT_META_API_VERSION.to_string(),
        }
    }
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub log_format: LogFormat,
    pub api: ApiServerConfig,
    pub worker: FallbackWorkerConfig,
    pub providers: ProviderConfig,
    /// Settings that were present but unparseable, as `KEY=value: reason`.
    pub ignored: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            log_format: LogFormat::default(),
            api: ApiServerConfig::default(),
            worker: FallbackWorkerConfig::default(),
            providers: ProviderConfig::default(),
            ignored: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment, falling back to defaults.
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    ///
    /// Blank values count as unset. Unparseable values keep the default and
    /// are listed in `ignored`; see [`AppConfig::log_ignored`].
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();
        let mut ignored = Vec::new();

        if let Some(url) = get("DATABASE_URL") {
            config.database_url = url;
        }
        parse_into(&get, &mut ignored, "LOG_FORMAT", &mut config.log_format);

        if let Some(bind_address) = get("API_BIND_ADDRESS") {
            config.api.bind_address = bind_address;
        }
        parse_into(&get, &mut ignored, "API_PORT", &mut config.api.port);

        let worker = &mut config.worker;
        for (key, target) in [
            ("FALLBACK_POLL_INTERVAL_MS", &mut worker.poll_interval_ms),
            (
                "FALLBACK_VISIBILITY_TIMEOUT_SECS",
                &mut worker.visibility_timeout_secs,
            ),
        ] {
            parse_into(&get, &mut ignored, key, target);
        }
        for (key, target) in [
            ("FALLBACK_MAX_RECEIVE_COUNT", &mut worker.max_receive_count),
            ("FALLBACK_BATCH_SIZE", &mut worker.batch_size),
        ] {
            parse_into(&get, &mut ignored, key, target);
        }
        parse_into(
            &get,
            &mut ignored,
            "FALLBACK_MAX_CONCURRENCY",
            &mut worker.max_concurrency,
        );

        let providers = &mut config.providers;
        let auth_token = get("PROVIDER_AUTH_TOKEN");
        for (key, endpoint) in [
            ("EMAIL_PROVIDER_URL", &mut providers.email),
            ("SMS_PROVIDER_URL", &mut providers.sms),
            ("WHATSAPP_PROVIDER_URL", &mut providers.whatsapp),
        ] {
            endpoint.url = get(key);
            endpoint.auth_token = auth_token.clone();
        }
        parse_into(
            &get,
            &mut ignored,
            "PROVIDER_TIMEOUT_SECS",
            &mut providers.timeout_secs,
        );
        if let Some(version) = get("WHATSAPP_META_API_VERSION") {
            providers.meta_api_version = version;
        }

        config.ignored = ignored;
        config
    }

    /// Warn about every setting that was ignored while loading.
    ///
    /// Loading happens before the subscriber is installed, so this is a
    /// separate step.
    pub fn log_ignored(&self) {
        for entry in &self.ignored {
            warn!("Ignoring invalid {}", entry);
        }
    }
}

fn parse_into<T, G>(get: &G, ignored: &mut Vec<String>, key: &str, target: &mut T)
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(key) {
        match raw.parse::<T>() {
            Ok(value) => *target = value,
            Err(e) => ignored.push(format!("{key}={raw:?}: {e}")),
        }
    }
}
