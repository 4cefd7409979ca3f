use anyhow::{Context, Result};
use reqwest::Client;
use std::{env, path::PathBuf, time::Instant};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use wbdash::{
    catalog,
    config::Settings,
    countries::CountryIndex,
    fetch::{fetch_dataset, DatasetRequest, StatisticsSource, WorldBankClient},
    snapshot::write_parquet,
};

/// Fetch the full dataset once and write it to Parquet
/// (default `observations.parquet`).
#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let out = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("observations.parquet"));

    let settings = Settings::load()?;
    let source = WorldBankClient::new(Client::new(), &settings.api_base, settings.per_page)?;
    let countries = CountryIndex::from_records(
        &source.countries().await.context("loading country reference")?,
    );
    let request = DatasetRequest {
        indicators: catalog::all().to_vec(),
        region_codes: countries.region_codes(),
        years: settings.years()?,
    };

    let start = Instant::now();
    let table = fetch_dataset(&source, &countries, &request).await?;
    let rows = write_parquet(&table, &out)?;
    info!(rows, elapsed = ?start.elapsed(), out = %out.display(), "snapshot done");
    Ok(())
}
