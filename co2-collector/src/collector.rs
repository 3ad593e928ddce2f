/**
 * COLLECTOR - Boucle de collecte de l'intensité carbone
 *
 * RÔLE : Une passe = chaque zone du registre, dans l'ordre, strictement séquentiel.
 * Zone → token (round-robin) → requête API → parser → série de la zone
 * → une ligne dérivée par data center situé dans la zone.
 *
 * ERREURS : transport, erreur API, réponse invalide, écriture CSV : toutes loggées
 * au niveau de la zone, la passe continue. Pas de retry : la passe suivante fait office.
 */

use crate::api::CarbonApi;
use crate::credentials::CredentialRotator;
use crate::error::{ParseError, TransportError};
use crate::parser::{self, NormalizedReading, ParsedResponse};
use crate::registry::ZoneRegistry;
use crate::schedule::PollSchedule;
use crate::store::{encode_record, Schema, SeriesId, SeriesStore};
use serde_json::Value;
use std::future::Future;
use std::io::{self, Write};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Result of polling one zone.
#[derive(Debug)]
pub enum PollOutcome {
    /// No token is loaded; the request was not issued.
    NoCredential,
    Transport(TransportError),
    /// The service answered with an error message.
    ApiStatus(String),
    /// `ok` response missing required fields.
    Invalid(ParseError),
    Data(NormalizedReading),
}

#[derive(Debug)]
pub struct ZonePoll {
    pub zone: String,
    /// Owner of the token used, if any.
    pub owner: Option<String>,
    /// Raw body of a successful poll.
    pub body: Option<Value>,
    pub outcome: PollOutcome,
}

/// Issues one request for `zone` with the next rotated token and classifies the answer.
pub async fn poll_zone<A: CarbonApi>(api: &A, rotator: &CredentialRotator, zone: &str) -> ZonePoll {
    let Some(credential) = rotator.next() else {
        return ZonePoll {
            zone: zone.to_string(),
            owner: None,
            body: None,
            outcome: PollOutcome::NoCredential,
        };
    };

    let owner = Some(credential.owner.clone());
    let raw = match api.latest_for_zone(zone, credential).await {
        Ok(raw) => raw,
        Err(e) => {
            return ZonePoll {
                zone: zone.to_string(),
                owner,
                body: None,
                outcome: PollOutcome::Transport(e),
            }
        }
    };

    let (outcome, body) = match parser::parse(&raw) {
        Ok(ParsedResponse::Data(reading)) => (PollOutcome::Data(reading), Some(raw.body)),
        Ok(ParsedResponse::NonData { message }) => (PollOutcome::ApiStatus(message), None),
        Err(e) => (PollOutcome::Invalid(e), None),
    };

    ZonePoll {
        zone: zone.to_string(),
        owner,
        body,
        outcome,
    }
}

/// One-shot query: polls each of `zones` once and writes a zone-series CSV row to
/// `out` for every reading. Failed zones are logged and produce no output.
///
/// Returns the number of rows written.
pub async fn query_zones<A, W>(
    api: &A,
    rotator: &CredentialRotator,
    zones: &[String],
    out: &mut W,
) -> io::Result<usize>
where
    A: CarbonApi,
    W: Write,
{
    let mut rows = 0;
    for zone in zones {
        let poll = poll_zone(api, rotator, zone).await;
        let owner = poll.owner.as_deref().unwrap_or("-");
        match poll.outcome {
            PollOutcome::Data(reading) => {
                out.write_all(encode_record(&reading.zone_row()).as_bytes())?;
                rows += 1;
            }
            PollOutcome::NoCredential => error!(zone = %zone, "no API token loaded"),
            PollOutcome::Transport(e) => error!(zone = %zone, owner, error = %e, "request failed"),
            PollOutcome::ApiStatus(message) => {
                error!(zone = %zone, owner, %message, "API error, nothing to print")
            }
            PollOutcome::Invalid(e) => {
                error!(zone = %zone, owner, error = %e, "error retrieving data for zone")
            }
        }
    }
    out.flush()?;
    Ok(rows)
}

/// Counters for one pass over the registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub zones_polled: usize,
    pub readings_stored: usize,
    pub data_center_rows: usize,
    pub skipped_no_credential: usize,
    pub transport_errors: usize,
    pub api_errors: usize,
    pub parse_errors: usize,
    pub store_errors: usize,
    pub elapsed: Duration,
}

impl PassReport {
    pub fn failures(&self) -> usize {
        self.skipped_no_credential
            + self.transport_errors
            + self.api_errors
            + self.parse_errors
            + self.store_errors
    }
}

pub struct Collector<A> {
    api: A,
    rotator: CredentialRotator,
    registry: ZoneRegistry,
    store: SeriesStore,
}

impl<A: CarbonApi> Collector<A> {
    pub fn new(api: A, rotator: CredentialRotator, registry: ZoneRegistry, store: SeriesStore) -> Self {
        Self {
            api,
            rotator,
            registry,
            store,
        }
    }

    pub fn registry(&self) -> &ZoneRegistry {
        &self.registry
    }

    pub fn rotator(&self) -> &CredentialRotator {
        &self.rotator
    }

    /// One pass over every registered zone.
    pub async fn run_once(&mut self) -> PassReport {
        let started = Instant::now();
        let mut report = PassReport::default();

        for zone in self.registry.zone_codes() {
            info!(zone = %zone, "requesting carbon intensity");
            let poll = poll_zone(&self.api, &self.rotator, &zone).await;
            report.zones_polled += 1;
            let owner = poll.owner.as_deref().unwrap_or("-");

            match poll.outcome {
                PollOutcome::NoCredential => {
                    report.skipped_no_credential += 1;
                    warn!(zone = %zone, "no API token loaded, zone skipped");
                }
                PollOutcome::Transport(e) => {
                    report.transport_errors += 1;
                    warn!(zone = %zone, owner, error = %e, "request failed, zone skipped this pass");
                }
                PollOutcome::ApiStatus(message) => {
                    report.api_errors += 1;
                    warn!(zone = %zone, owner, %message, "API error");
                }
                PollOutcome::Invalid(e) => {
                    report.parse_errors += 1;
                    error!(zone = %zone, owner, error = %e, "malformed response, not storing it");
                }
                PollOutcome::Data(reading) => {
                    if let Some(body) = poll.body {
                        self.registry.record_response(&zone, body);
                    }
                    self.persist(&zone, &reading, &mut report);
                }
            }
        }

        report.elapsed = started.elapsed();
        info!(
            zones = report.zones_polled,
            stored = report.readings_stored,
            data_center_rows = report.data_center_rows,
            failures = report.failures(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "collection pass finished"
        );
        report
    }

    // Série de la zone d'abord, puis une ligne par data center de la zone
    fn persist(&self, zone: &str, reading: &NormalizedReading, report: &mut PassReport) {
        match self
            .store
            .append(&SeriesId::zone(zone), &reading.zone_row(), Schema::Zone)
        {
            Ok(()) => report.readings_stored += 1,
            Err(e) => {
                report.store_errors += 1;
                error!(zone, error = %e, "cannot store zone reading");
            }
        }

        for dc in self.registry.data_centers_in(zone) {
            let series = SeriesId::data_center(&dc.provider, &dc.code);
            match self
                .store
                .append(&series, &reading.data_center_row(dc), Schema::DataCenter)
            {
                Ok(()) => {
                    report.data_center_rows += 1;
                    debug!(zone, data_center = %series, "data center row stored");
                }
                Err(e) => {
                    report.store_errors += 1;
                    error!(zone, data_center = %series, error = %e, "cannot store data center row");
                }
            }
        }
    }

    /// Runs passes until `shutdown` resolves; returns the number of passes completed.
    ///
    /// Shutdown is only observed between passes, never in the middle of one.
    pub async fn run_forever<F>(&mut self, schedule: PollSchedule, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut passes = 0u64;

        loop {
            let started = Instant::now();
            self.run_once().await;
            passes += 1;

            let next = schedule.next_fire(started, Instant::now());
            debug!(
                wait_ms = next.saturating_duration_since(Instant::now()).as_millis() as u64,
                "sleeping until next pass"
            );

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(passes, "shutdown requested, stopping collection");
                    return passes;
                }
                _ = sleep_until(next) => {}
            }
        }
    }
}
