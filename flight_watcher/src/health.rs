use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use shared::watch::CycleError;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Outcome of the most recent watch cycles, shared with the health endpoint.
#[derive(Clone)]
pub struct HealthStatus {
    max_age: TimeDelta,
    last_attempted_update: Arc<RwLock<Option<DateTime<Utc>>>>,
    last_successful_update: Arc<RwLock<Option<DateTime<Utc>>>>,
    last_error: Arc<RwLock<Option<CycleError>>>,
}

impl HealthStatus {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age: TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX),
            last_attempted_update: Arc::new(RwLock::new(None)),
            last_successful_update: Arc::new(RwLock::new(None)),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn attempted(&self, at: DateTime<Utc>) {
        *self.last_attempted_update.write() = Some(at);
    }

    pub fn succeeded(&self, at: DateTime<Utc>) {
        *self.last_successful_update.write() = Some(at);
        *self.last_error.write() = None;
    }

    pub fn failed(&self, error: CycleError) {
        *self.last_error.write() = Some(error);
    }

    pub fn check(&self, now: DateTime<Utc>) -> (StatusCode, String) {
        let last_attempted_update = *self.last_attempted_update.read();
        let last_successful_update = *self.last_successful_update.read();
        let last_error = if let Some(e) = self.last_error.read().as_ref() {
            format!("{e}")
        } else {
            "unknown".to_string()
        };

        let Some(last_attempted_update) = last_attempted_update else {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "No attempted or successful watch cycles".to_string(),
            );
        };
        let Some(last_successful_update) = last_successful_update else {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!(
                    "No watch cycle has succeeded. Last attempted cycle: {last_attempted_update}. Last error: {last_error}"
                ),
            );
        };

        if (now - last_successful_update) > self.max_age {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!(
                    "No successful watch cycle in the last {} seconds. Last successful cycle: {last_successful_update}. Last attempted cycle: {last_attempted_update}. Last error: {last_error}",
                    self.max_age.num_seconds()
                ),
            )
        } else {
            (
                StatusCode::OK,
                format!("Last successful watch cycle: {last_successful_update}"),
            )
        }
    }
}

pub async fn run_health_server(
    status: HealthStatus,
    addr: String,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    info!(addr = %addr, "starting axum health server");
    let app = Router::new()
        .route("/health", get(health_check))
        .with_state(status);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await?;
    Ok(())
}

async fn health_check(State(status): State<HealthStatus>) -> impl IntoResponse {
    status.check(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::flightaware::FlightAwareError;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn unhealthy_before_first_cycle() {
        let status = HealthStatus::new(Duration::from_secs(60));
        let (code, _) = status.check(at(0));
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unhealthy_when_only_failures() {
        let status = HealthStatus::new(Duration::from_secs(60));
        status.attempted(at(0));
        status.failed(CycleError::Token(FlightAwareError::TokenNotFound(
            "KSEA".to_string(),
        )));
        let (code, body) = status.check(at(1));
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("KSEA"), "{body}");
    }

    #[test]
    fn healthy_after_recent_success() {
        let status = HealthStatus::new(Duration::from_secs(60));
        status.attempted(at(0));
        status.succeeded(at(0));
        assert_eq!(status.check(at(60)).0, StatusCode::OK);
        assert_eq!(status.check(at(61)).0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn success_clears_previous_error() {
        let status = HealthStatus::new(Duration::from_secs(60));
        status.attempted(at(0));
        status.failed(CycleError::Token(FlightAwareError::TokenNotFound(
            "KSEA".to_string(),
        )));
        status.attempted(at(20));
        status.succeeded(at(20));

        let (code, body) = status.check(at(200));
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("KSEA"), "{body}");
        assert!(body.contains("Last error: unknown"), "{body}");
    }
}
