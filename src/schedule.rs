// src/schedule.rs

use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::{
    catalog,
    countries::CountryIndex,
    fetch::{fetch_dataset, DatasetRequest, StatisticsSource},
    session::TableWriter,
    table::YearRange,
};

/// Re-fetches the whole dataset on a fixed interval and hands it to the
/// session's table writer.
pub struct RefreshScheduler<S> {
    source: Arc<S>,
    countries: Arc<CountryIndex>,
    request: DatasetRequest,
    interval: Duration,
}

impl<S: StatisticsSource> RefreshScheduler<S> {
    /// Every tick asks for the full catalogue over `years`, whatever the user
    /// currently has selected.
    pub fn new(
        source: Arc<S>,
        countries: Arc<CountryIndex>,
        years: YearRange,
        interval: Duration,
    ) -> Self {
        let request = DatasetRequest {
            indicators: catalog::all().to_vec(),
            region_codes: countries.region_codes(),
            years,
        };
        Self {
            source,
            countries,
            request,
            interval,
        }
    }

    pub fn request(&self) -> &DatasetRequest {
        &self.request
    }

    /// One refresh. On failure the writer is left untouched, so the session
    /// keeps whatever it had.
    pub async fn tick(&self, writer: &TableWriter) -> Result<()> {
        let start = Instant::now();
        let table = fetch_dataset(self.source.as_ref(), &self.countries, &self.request).await?;
        info!(rows = table.len(), elapsed = ?start.elapsed(), "refresh complete");
        writer.replace(table);
        Ok(())
    }

    /// Tick forever. The first tick fires immediately; a slow fetch pushes
    /// the next tick back instead of stacking ticks up.
    pub async fn run(self, writer: TableWriter) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.interval, "refresh scheduler started");
        loop {
            ticker.tick().await;
            if let Err(e) = self.tick(&writer).await {
                warn!(error = %e, "refresh failed, keeping previous data");
            }
        }
    }
}
