use std::{sync::OnceLock, time::Duration};

use tracing::{debug, warn};

/// Idle connections kept per provider host.
const POOL_MAX_IDLE_PER_HOST: usize = 8;

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the `reqwest::Client` shared by all provider channels.
///
/// A `timeout_secs` of zero disables the request timeout.
pub fn build_provider_client(timeout_secs: u64) -> reqwest::Client {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("fallback-messaging/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST);

    if timeout_secs > 0 {
        builder = builder.timeout(Duration::from_secs(timeout_secs));
    }

    builder.build().unwrap_or_else(|error| {
        warn!(
            error = %error,
            "Failed to build provider HTTP client; falling back to reqwest defaults"
        );
        reqwest::Client::new()
    })
}
