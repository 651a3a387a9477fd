use crate::flightaware::{Aircraft, AircraftSource, FlightAwareError};
use crate::geo::{Area, BoundingBox};
use crate::sighting::SightingRecord;
use crate::webhook::{Notifier, sighting_message};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{Level, debug, event_enabled, info, trace, warn};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("failed to fetch vicinity token: {0}")]
    Token(#[source] FlightAwareError),
    #[error("failed to fetch vicinity aircraft: {0}")]
    Aircraft(#[source] FlightAwareError),
}

/// A sighting that passed every filter and is waiting to be delivered.
#[derive(Debug, Clone)]
pub struct Notification {
    pub ident: String,
    pub message: String,
    pub aircraft: Aircraft,
    /// What the record held for `ident` before this sighting was accepted.
    pub previous_sighting: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub eligible: usize,
    pub inside: usize,
    pub notified: usize,
    pub delivered: usize,
    pub failed: usize,
    pub evicted: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    pub mark_seen_on_delivery_failure: bool,
    pub evict_expired: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            mark_seen_on_delivery_failure: true,
            evict_expired: false,
        }
    }
}

/// Everything the watcher carries from one cycle to the next.
#[derive(Debug, Clone)]
pub struct WatchState {
    pub area: Area,
    pub record: SightingRecord,
    pub options: WatchOptions,
}

impl WatchState {
    pub fn new(area: Area, record: SightingRecord, options: WatchOptions) -> Self {
        Self {
            area,
            record,
            options,
        }
    }

    /// Filters `candidates` down to the sightings that should be announced and
    /// marks each of them seen at `now`.
    ///
    /// Only airline and cargo flights with a position inside the area and a
    /// non-empty ident are considered. Acceptance is recorded immediately, so an
    /// ident repeated within one batch is held back by its own cooldown.
    pub fn evaluate_cycle(
        &mut self,
        candidates: Vec<Aircraft>,
        now: DateTime<Utc>,
    ) -> (Vec<Notification>, CycleReport) {
        let mut report = CycleReport {
            fetched: candidates.len(),
            ..CycleReport::default()
        };
        let mut notifications = Vec::new();

        for aircraft in candidates {
            if !aircraft.properties.flight_type.is_eligible() {
                continue;
            }
            report.eligible += 1;

            let Some(position) = aircraft.position() else {
                trace!(flight_id = ?aircraft.properties.flight_id, "skipping aircraft without position");
                continue;
            };
            if !self.area.contains(position) {
                continue;
            }
            report.inside += 1;

            let Some(ident) = aircraft.ident().map(str::to_string) else {
                trace!(flight_id = ?aircraft.properties.flight_id, "skipping aircraft without ident");
                continue;
            };
            if !self.record.should_notify(&ident, now) {
                trace!(ident = %ident, "aircraft still in cooldown");
                continue;
            }

            let previous_sighting = self.record.record(&ident, now);
            notifications.push(Notification {
                message: sighting_message(&aircraft),
                ident,
                aircraft,
                previous_sighting,
            });
        }

        report.notified = notifications.len();
        (notifications, report)
    }
}

/// One fetch, filter and notify pass.
///
/// A fetch failure aborts the pass before the record is touched. Delivery
/// failures are logged and counted; whether the aircraft stays marked seen is
/// governed by [`WatchOptions::mark_seen_on_delivery_failure`].
pub async fn run_cycle<S, N>(
    source: &S,
    notifier: &N,
    state: &mut WatchState,
    airport_code: &str,
    bbox: &BoundingBox,
    now: DateTime<Utc>,
) -> Result<CycleReport, CycleError>
where
    S: AircraftSource + Sync,
    N: Notifier + Sync,
{
    let token = source
        .fetch_token(airport_code)
        .await
        .map_err(CycleError::Token)?;
    let candidates = source
        .fetch_aircraft(bbox, &token)
        .await
        .map_err(CycleError::Aircraft)?;

    let (notifications, mut report) = state.evaluate_cycle(candidates, now);

    for notification in notifications {
        match notifier.deliver(&notification.message).await {
            Ok(()) => {
                info!(ident = %notification.ident, "posted sighting");
                report.delivered += 1;
            }
            Err(e) => {
                warn!(ident = %notification.ident, error = ?e, "failed to post sighting");
                report.failed += 1;
                if !state.options.mark_seen_on_delivery_failure {
                    state
                        .record
                        .restore(&notification.ident, notification.previous_sighting);
                }
            }
        }
    }

    if state.options.evict_expired {
        report.evicted = state.record.evict_expired(now);
    }

    if event_enabled!(Level::DEBUG) {
        debug!(report = ?report, tracked = state.record.len(), "completed watch cycle");
    }

    Ok(report)
}
