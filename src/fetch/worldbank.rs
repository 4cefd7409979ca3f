// src/fetch/worldbank.rs

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::{debug, instrument, trace};
use url::Url;

use super::{DatasetRequest, IndicatorInfo, RawObservation, StatisticsSource};
use crate::countries::CountryRecord;

pub const DEFAULT_API_BASE: &str = "https://api.worldbank.org/v2";
pub const DEFAULT_PER_PAGE: u32 = 1000;

/// World Development Indicators; required when asking for several
/// indicators in one query.
const WDI_SOURCE: &str = "2";

#[derive(Debug, Deserialize)]
struct WireIdValue {
    #[serde(default)]
    id: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct WireObservation {
    indicator: WireIdValue,
    country: WireIdValue,
    date: String,
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCountry {
    id: String,
    name: String,
    #[serde(default)]
    capital_city: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireIndicator {
    id: String,
    name: String,
}

/// Client for the World Bank v2 JSON API.
#[derive(Debug, Clone)]
pub struct WorldBankClient {
    client: Client,
    base: Url,
    per_page: u32,
}

impl WorldBankClient {
    pub fn new(client: Client, base: &str, per_page: u32) -> Result<Self> {
        let base = Url::parse(base).with_context(|| format!("parsing API base {}", base))?;
        if base.cannot_be_a_base() {
            bail!("API base {} cannot carry a path", base);
        }
        Ok(Self {
            client,
            base,
            per_page: per_page.max(1),
        })
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)], page: u32) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("API base {} cannot carry a path", self.base))?
            .pop_if_empty()
            .extend(segments);
        let per_page = self.per_page.to_string();
        let page = page.to_string();
        url.query_pairs_mut()
            .extend_pairs(query)
            .append_pair("format", "json")
            .append_pair("per_page", &per_page)
            .append_pair("page", &page);
        Ok(url)
    }

    async fn get_json_core(&self, url: &Url) -> Result<Value> {
        debug!("Fetching JSON from {}", url);
        self.client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Non-success status {}", url))?
            .json()
            .await
            .with_context(|| format!("Decoding JSON from {}", url))
    }

    /// Walk every page of one query and decode the records.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut out = Vec::new();
        let mut page = 1;
        loop {
            let url = self.endpoint(segments, query, page)?;
            let body = self.get_json_core(&url).await?;
            let (pages, records) =
                decode_page::<T>(body).with_context(|| format!("reading page {} of {}", page, url))?;
            trace!(page, pages, records = records.len(), "decoded page");
            out.extend(records);
            if page >= pages {
                break;
            }
            page += 1;
        }
        Ok(out)
    }

    /// List catalogue indicators whose name matches `pattern`.
    #[instrument(level = "info", skip(self))]
    pub async fn search_indicators(&self, pattern: &str) -> Result<Vec<IndicatorInfo>> {
        let re = Regex::new(pattern).with_context(|| format!("invalid pattern {}", pattern))?;
        let all: Vec<WireIndicator> = self.get_all_pages(&["indicator"], &[]).await?;
        debug!(total = all.len(), "indicator catalogue loaded");
        Ok(all
            .into_iter()
            .filter(|i| re.is_match(&i.name))
            .map(|i| IndicatorInfo {
                id: i.id,
                name: i.name,
            })
            .collect())
    }
}

impl StatisticsSource for WorldBankClient {
    #[instrument(level = "info", skip(self))]
    async fn countries(&self) -> Result<Vec<CountryRecord>> {
        let wire: Vec<WireCountry> = self
            .get_all_pages(&["country"], &[])
            .await
            .context("fetching country reference")?;
        Ok(wire
            .into_iter()
            .map(|c| CountryRecord {
                name: c.name,
                region_code: c.id,
                capital_city: c.capital_city,
            })
            .collect())
    }

    #[instrument(level = "info", skip(self, request), fields(regions = request.region_codes.len()))]
    async fn observations(&self, request: &DatasetRequest) -> Result<Vec<RawObservation>> {
        if request.indicators.is_empty() || request.region_codes.is_empty() {
            return Ok(Vec::new());
        }
        let regions = request.region_codes.join(";");
        let indicators = request.indicator_codes().join(";");
        let date = format!("{}:{}", request.years.start(), request.years.end());

        let wire: Vec<WireObservation> = self
            .get_all_pages(
                &["country", regions.as_str(), "indicator", indicators.as_str()],
                &[("source", WDI_SOURCE), ("date", date.as_str())],
            )
            .await
            .context("fetching indicator observations")?;

        Ok(wire
            .into_iter()
            .map(|w| RawObservation {
                country: w.country.value,
                year: w.date,
                indicator_code: w.indicator.id,
                value: w.value,
            })
            .collect())
    }
}

/// Split a v2 response into (page count, records). The API answers
/// `[header, records]` on success and `[{"message": [...]}]` on error;
/// `records` is `null` when a query matches nothing.
fn decode_page<T: DeserializeOwned>(body: Value) -> Result<(u32, Vec<T>)> {
    let mut parts = match body {
        Value::Array(parts) => parts.into_iter(),
        other => bail!("unexpected response shape: {}", other),
    };
    let header = parts.next().ok_or_else(|| anyhow!("empty response"))?;

    if let Some(messages) = header.get("message") {
        let text = messages
            .as_array()
            .map(|ms| {
                ms.iter()
                    .filter_map(|m| m.get("value").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or_else(|| messages.to_string());
        bail!("statistics API error: {}", text);
    }

    // `pages` arrives as a number, `per_page` sometimes as a string.
    let pages = match header.get("pages") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(1),
        Some(Value::String(s)) => s.parse().unwrap_or(1),
        _ => 1,
    } as u32;

    let records = match parts.next() {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => serde_json::from_value(v).context("decoding records")?,
    };
    Ok((pages.max(1), records))
}
