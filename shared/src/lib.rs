pub mod flightaware;
pub mod geo;
pub mod sighting;
pub mod watch;
pub mod webhook;

use crate::error::ConfigError;
use crate::geo::{Area, MinLongitudeRule};
use crate::sighting::DEFAULT_COOLDOWN;
use crate::watch::WatchOptions;
use chrono::TimeDelta;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const ENV_VAR_PREFIX: &str = "FLIGHT_WATCHER__";
pub const SETTINGS_FILE: &str = "Settings.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub flightaware: FlightAwareConfig,
    pub webhook: WebhookConfig,
    pub area: Area,
    pub fetcher: Option<FetcherConfig>,
    #[serde(default)]
    pub sightings: SightingsConfig,
    #[serde(default)]
    pub bounding_box: BoundingBoxConfig,
    pub health: Option<HealthConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FlightAwareConfig {
    pub airport_code: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    flightaware::DEFAULT_BASE_URL.to_string()
}

#[derive(Deserialize, Clone)]
pub struct WebhookConfig {
    pub url: String,
}

// The webhook URL embeds its own credentials.
impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("url", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetcherConfig {
    pub interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SightingsConfig {
    pub cooldown_seconds: i64,
    pub mark_seen_on_delivery_failure: bool,
    pub evict_expired: bool,
}

impl Default for SightingsConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: DEFAULT_COOLDOWN.num_seconds(),
            mark_seen_on_delivery_failure: true,
            evict_expired: false,
        }
    }
}

impl SightingsConfig {
    pub fn cooldown(&self) -> TimeDelta {
        TimeDelta::try_seconds(self.cooldown_seconds).unwrap_or(TimeDelta::MAX)
    }

    pub const fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            mark_seen_on_delivery_failure: self.mark_seen_on_delivery_failure,
            evict_expired: self.evict_expired,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BoundingBoxConfig {
    pub min_longitude: MinLongitudeRule,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    pub addr: String,
}

pub fn settings_figment() -> Figment {
    Figment::new()
        .merge(Toml::file(SETTINGS_FILE))
        .merge(Env::prefixed(ENV_VAR_PREFIX).split("__"))
}

impl Config {
    /// Rejects values the watcher cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(fetcher) = &self.fetcher
            && fetcher.interval_seconds == 0
        {
            return Err(ConfigError::ZeroInterval);
        }
        if self.sightings.cooldown_seconds < 0 {
            return Err(ConfigError::NegativeCooldown(
                self.sightings.cooldown_seconds,
            ));
        }
        Ok(())
    }
}

pub fn load_config() -> Result<Config, ConfigError> {
    let config = settings_figment().extract::<Config>()?;
    config.validate()?;
    Ok(config)
}

pub mod error {
    use thiserror::Error;
    use tracing::dispatcher::SetGlobalDefaultError;

    #[derive(Debug, Error)]
    pub enum ConfigError {
        #[error("failed to load configuration: {0}")]
        Figment(#[from] figment::Error),
        #[error("fetcher.interval_seconds must be greater than zero")]
        ZeroInterval,
        #[error("sightings.cooldown_seconds must not be negative, got {0}")]
        NegativeCooldown(i64),
    }

    #[derive(Debug, Error)]
    pub enum InitializationError {
        #[error(transparent)]
        Tracing(#[from] SetGlobalDefaultError),
        #[error(transparent)]
        Config(#[from] ConfigError),
        #[error(transparent)]
        HttpClient(#[from] reqwest::Error),
    }
}

pub async fn shutdown_listener(token: Option<CancellationToken>) {
    let ctrl_c = signal::ctrl_c();
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = ?e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C signal, shutting down"),
        _ = terminate => info!("received SIGTERM signal, shutting down"),
    }

    if let Some(token) = token {
        token.cancel();
    }
}
