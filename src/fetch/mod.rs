// src/fetch/mod.rs

use anyhow::Result;
use std::{collections::BTreeMap, future::Future};
use tracing::{debug, info, instrument, warn};

use crate::{
    catalog::Indicator,
    countries::{CountryIndex, CountryRecord},
    table::{Observation, ObservationTable, YearRange},
};

pub mod worldbank;

pub use worldbank::WorldBankClient;

/// One value from the statistics API, in long form.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub country: String,
    /// As delivered; coerced to an integer during the join.
    pub year: String,
    pub indicator_code: String,
    pub value: Option<f64>,
}

/// An indicator as listed by the statistics API's catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorInfo {
    pub id: String,
    pub name: String,
}

/// A single batched retrieval: every indicator, every region, one year span.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRequest {
    pub indicators: Vec<Indicator>,
    pub region_codes: Vec<String>,
    pub years: YearRange,
}

impl DatasetRequest {
    pub fn indicator_codes(&self) -> Vec<&str> {
        self.indicators.iter().map(|i| i.code).collect()
    }
}

/// The statistics collaborator. `WorldBankClient` talks to the live API;
/// tests supply canned rows.
pub trait StatisticsSource {
    /// Reference list of countries, queried once at startup.
    fn countries(&self) -> impl Future<Output = Result<Vec<CountryRecord>>> + Send;

    /// Every observation for the request, in one retrieval.
    fn observations(
        &self,
        request: &DatasetRequest,
    ) -> impl Future<Output = Result<Vec<RawObservation>>> + Send;
}

/// Fetch the request's observations and join them against `countries`.
/// Errors from the source propagate unchanged; there is no retry here.
#[instrument(
    level = "info",
    skip(source, countries, request),
    fields(
        indicators = request.indicators.len(),
        regions = request.region_codes.len(),
        start = request.years.start(),
        end = request.years.end()
    )
)]
pub async fn fetch_dataset<S: StatisticsSource>(
    source: &S,
    countries: &CountryIndex,
    request: &DatasetRequest,
) -> Result<ObservationTable> {
    let raw = source.observations(request).await?;
    debug!(raw = raw.len(), "received observations");
    let table = build_table(&raw, countries, &request.indicators)?;
    info!(rows = table.len(), "built observation table");
    Ok(table)
}

/// Pivot long-form observations to one row per (country, year) with a
/// column per indicator, then inner-join on country name.
pub fn build_table(
    raw: &[RawObservation],
    countries: &CountryIndex,
    indicators: &[Indicator],
) -> Result<ObservationTable> {
    let mut pivot: BTreeMap<(String, i32), Vec<Option<f64>>> = BTreeMap::new();
    let mut unmatched = 0usize;

    for obs in raw {
        let Some(col) = indicators.iter().position(|i| i.code == obs.indicator_code) else {
            continue;
        };
        let year: i32 = match obs.year.trim().parse() {
            Ok(y) => y,
            Err(_) => {
                warn!(country = %obs.country, year = %obs.year, "unparseable year, dropping row");
                continue;
            }
        };
        if countries.region_code(&obs.country).is_none() {
            unmatched += 1;
            continue;
        }

        let slot = pivot
            .entry((obs.country.clone(), year))
            .or_insert_with(|| vec![None; indicators.len()]);
        if obs.value.is_some() {
            slot[col] = obs.value;
        }
    }

    if unmatched > 0 {
        debug!(unmatched, "dropped observations without a country match");
    }

    let rows = pivot
        .into_iter()
        .filter_map(|((country, year), values)| {
            let region_code = countries.region_code(&country)?.to_string();
            Some(Observation {
                region_code,
                country,
                year,
                values,
            })
        })
        .collect();

    ObservationTable::new(indicators.to_vec(), rows)
}
