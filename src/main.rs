use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use wbdash::{
    config::Settings,
    countries::CountryIndex,
    fetch::{StatisticsSource, WorldBankClient},
    schedule::RefreshScheduler,
    server,
    session::SessionStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) settings + logging ───────────────────────────────────────
    let settings = Settings::load()?;
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},wbdash=info", settings.log_level)));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!(?settings, "startup");

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) country reference, once ──────────────────────────────────
    let source = Arc::new(WorldBankClient::new(
        Client::new(),
        &settings.api_base,
        settings.per_page,
    )?);
    let raw = source
        .countries()
        .await
        .context("loading country reference at startup")?;
    let countries = Arc::new(CountryIndex::from_records(&raw));
    info!(raw = raw.len(), mappable = countries.len(), "country reference ready");

    // ─── 3) session + refresh loop ───────────────────────────────────
    let years = settings.years()?;
    let (store, writer) = SessionStore::new(years.start(), years.end());
    let scheduler =
        RefreshScheduler::new(source, countries, years, settings.refresh_interval());
    tokio::spawn(scheduler.run(writer));

    // ─── 4) serve ────────────────────────────────────────────────────
    server::serve(Arc::new(store), settings.addr()?).await;

    info!("shutdown");
    Ok(())
}
