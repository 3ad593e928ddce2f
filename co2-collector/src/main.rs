//! co2-collector - unattended carbon intensity collection
//!
//! Two modes:
//! - regions mode: poll every zone of the regions file, append to the series
//!   under `--output-dir`, sleep `--sleep` seconds, repeat (or stop after
//!   one pass with `--once`)
//! - one-shot mode: `--country-zone FR DE ...` prints one CSV row per zone

use anyhow::{Context, Result};
use clap::Parser;
use co2_collector::config::{ensure_output_dir, Cli, Mode};
use co2_collector::{query_zones, ApiClient, Collector, CredentialRotator, SeriesStore, ZoneRegistry};
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("co2_collector=info")),
        )
        .init();

    let cli = Cli::parse();
    info!("co2-collector v{} starting", env!("CARGO_PKG_VERSION"));

    let rotator = CredentialRotator::load(&cli.auth_tokens)
        .await
        .context("Failed to load API tokens")?;
    if rotator.is_empty() {
        warn!("no API tokens loaded, every request will be skipped");
    }

    let api = ApiClient::new(&cli.api_url, cli.request_timeout())
        .context("Failed to create API client")?;

    match cli.mode()? {
        Mode::OneShot { zones } => {
            let rows = query_zones(&api, &rotator, &zones, &mut std::io::stdout())
                .await
                .context("Failed to write to stdout")?;
            info!(rows, zones = zones.len(), "one-shot query done");
            Ok(())
        }
        Mode::Collect {
            regions_file,
            output_dir,
        } => collect(&cli, api, rotator, &regions_file, &output_dir).await,
    }
}

async fn collect(
    cli: &Cli,
    api: ApiClient,
    rotator: CredentialRotator,
    regions_file: &Path,
    output_dir: &Path,
) -> Result<()> {
    let registry = ZoneRegistry::load(regions_file)
        .await
        .context("Failed to load cloud regions")?;

    let output_dir = match ensure_output_dir(output_dir) {
        Ok(dir) => dir,
        Err(e) => {
            error!("{e}, collection skipped");
            return Err(e.into());
        }
    };

    let schedule = cli.schedule()?;
    if !cli.once {
        if let Some(rate) = schedule.requests_per_token_hour(registry.len(), rotator.len()) {
            info!(zones = registry.len(), tokens = rotator.len(), rate, "expected requests per token per hour");
        }
        if schedule.exceeds_rate_limit(registry.len(), rotator.len()) {
            warn!(
                limit = co2_collector::schedule::RATE_LIMIT_PER_HOUR,
                "polling rate exceeds the per-token limit, add tokens or increase --sleep"
            );
        }
    }

    info!(output_dir = %output_dir.display(), zones = registry.len(), "starting collection");
    let mut collector = Collector::new(api, rotator, registry, SeriesStore::new(output_dir));

    if cli.once {
        let report = collector.run_once().await;
        info!(?report, "single pass done");
        return Ok(());
    }

    let passes = collector
        .run_forever(schedule, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("cannot listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await;
    info!(passes, "collector stopped");
    Ok(())
}
