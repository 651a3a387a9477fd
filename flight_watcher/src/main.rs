#![warn(clippy::pedantic)]
mod error;
mod health;

use crate::error::MainError;
use crate::health::{HealthStatus, run_health_server};
use chrono::Utc;
use shared::error::InitializationError;
use shared::flightaware::{AircraftSource, FlightAwareClient};
use shared::geo::BoundingBox;
use shared::sighting::SightingRecord;
use shared::watch::{WatchState, run_cycle};
use shared::webhook::{Notifier, WebhookClient};
use shared::{Config, load_config, shutdown_listener};
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_INTERVAL_SECONDS: u64 = 20;
const DEFAULT_HEALTH_ADDR: &str = "127.0.0.1:3000";

#[tokio::main]
async fn main() -> Result<(), MainError> {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(InitializationError::Tracing)?;

    let config = load_config().map_err(|e| {
        error!(error = ?e, "configuration could not be initialized");
        InitializationError::from(e)
    })?;
    info!(
        airport = %config.flightaware.airport_code,
        area = ?config.area,
        "config loaded"
    );

    let interval_seconds = config
        .fetcher
        .as_ref()
        .map_or(DEFAULT_INTERVAL_SECONDS, |c| c.interval_seconds)
        .max(1);
    let health_addr = config
        .health
        .as_ref()
        .map_or_else(|| DEFAULT_HEALTH_ADDR.to_string(), |c| c.addr.clone());

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(interval_seconds))
        .build()
        .map_err(InitializationError::from)?;
    let source =
        FlightAwareClient::new_with_client(http_client.clone(), &config.flightaware.base_url);
    let notifier = WebhookClient::new_with_client(http_client, &config.webhook.url);

    let status = HealthStatus::new(Duration::from_secs(interval_seconds.saturating_mul(3)));

    // Cancellation token shared across tasks; listener cancels on SIGINT/SIGTERM.
    let shutdown_token = CancellationToken::new();
    let signal_handle = tokio::spawn(shutdown_listener(Some(shutdown_token.clone())));

    let axum_handle = tokio::spawn(run_health_server(
        status.clone(),
        health_addr,
        shutdown_token.clone(),
    ));

    let watcher_handle = tokio::spawn(watcher_loop(
        config,
        source,
        notifier,
        status,
        Duration::from_secs(interval_seconds),
        shutdown_token.clone(),
    ));

    tokio::select! {
        res = axum_handle => {
            shutdown_token.cancel();
            res??;
        }
        res = watcher_handle => {
            shutdown_token.cancel();
            res?;
        }
        res = signal_handle => {
            shutdown_token.cancel();
            res?;
        }
    }

    Ok(())
}

async fn watcher_loop<S, N>(
    config: Config,
    source: S,
    notifier: N,
    status: HealthStatus,
    period: Duration,
    shutdown: CancellationToken,
) where
    S: AircraftSource + Sync,
    N: Notifier + Sync,
{
    let bbox: BoundingBox = config
        .area
        .bounding_box(config.bounding_box.min_longitude);
    let mut state = WatchState::new(
        config.area,
        SightingRecord::new(config.sightings.cooldown()),
        config.sightings.watch_options(),
    );

    info!(bbox = ?bbox, period = ?period, "initialized flight watcher");

    // First tick completes immediately, so the first cycle runs at startup.
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = ticker.tick() => {},
            () = shutdown.cancelled() => {
                info!("shutdown requested, exiting watcher loop");
                break;
            }
        }

        let now = Utc::now();
        status.attempted(now);
        match run_cycle(
            &source,
            &notifier,
            &mut state,
            &config.flightaware.airport_code,
            &bbox,
            now,
        )
        .await
        {
            Ok(report) => {
                if report.notified > 0 {
                    info!(
                        notified = report.notified,
                        delivered = report.delivered,
                        failed = report.failed,
                        "announced aircraft in watch area"
                    );
                }
                status.succeeded(now);
            }
            Err(e) => {
                warn!(error = ?e, "skipping watch cycle");
                status.failed(e);
            }
        }

        if shutdown.is_cancelled() {
            info!("shutdown requested, watcher loop exiting after current cycle");
            break;
        }
    }
}
