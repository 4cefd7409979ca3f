use anyhow::Result;
use reqwest::Client;
use std::{env, process::exit};
use tracing_subscriber::{fmt, EnvFilter};
use wbdash::{config::Settings, fetch::WorldBankClient};

/// Print World Bank indicators whose name matches a regex, e.g.
/// `find_indicator '^Carbon dioxide \(CO2\) emissions \(total\)'`.
#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <NAME_REGEX>", args[0]);
        exit(1);
    }

    let settings = Settings::load()?;
    let client = WorldBankClient::new(Client::new(), &settings.api_base, settings.per_page)?;
    let found = client.search_indicators(&args[1]).await?;

    if found.is_empty() {
        println!("no indicators match {}", args[1]);
    }
    for ind in &found {
        println!("{:<24} {}", ind.id, ind.name);
    }
    Ok(())
}
