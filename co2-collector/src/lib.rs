//! co2-collector - carbon intensity telemetry for cloud footprints
//!
//! Polls the co2signal API for a set of zones (countries / grid regions),
//! attributes every reading to the cloud data centers located in the zone and
//! appends the results to CSV time series:
//!
//! - `{output_dir}/{zone}.csv`
//! - `{output_dir}/providers/{provider}-{code}-series.csv`
//!
//! Tokens are rotated round-robin to stay under the per-token rate limit.
//!
//! # Example
//!
//! ```rust,ignore
//! use co2_collector::{ApiClient, Collector, CredentialRotator, PollSchedule, SeriesStore, ZoneRegistry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let rotator = CredentialRotator::load("tokens.json".as_ref()).await?;
//!     let registry = ZoneRegistry::load("cloud_regions.json".as_ref()).await?;
//!     let api = ApiClient::new(co2_collector::api::DEFAULT_API_URL, co2_collector::api::DEFAULT_TIMEOUT)?;
//!
//!     let mut collector = Collector::new(api, rotator, registry, SeriesStore::new("./data"));
//!     let schedule = PollSchedule::fixed_delay(std::time::Duration::from_secs(900));
//!     collector.run_forever(schedule, std::future::pending()).await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod collector;
pub mod config;
pub mod credentials;
pub mod error;
pub mod parser;
pub mod registry;
pub mod schedule;
pub mod store;

pub use api::{ApiClient, CarbonApi, RawResponse};
pub use collector::{poll_zone, query_zones, Collector, PassReport, PollOutcome, ZonePoll};
pub use credentials::{Credential, CredentialRotator};
pub use error::{ConfigError, ParseError, StoreError, TransportError};
pub use parser::{parse, NormalizedReading, ParsedResponse, INTENSITY_UNIT};
pub use registry::{DataCenter, Zone, ZoneRegistry};
pub use schedule::{Cadence, PollSchedule};
pub use store::{Schema, SeriesId, SeriesStore};
