// src/render.rs

use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::{
    catalog::Indicator,
    table::{ObservationTable, YearRange},
};

pub const PROJECTION: &str = "natural earth";
pub const SCOPE: &str = "world";
pub const MARGIN_PX: u32 = 50;

/// One coloured region on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionValue {
    pub region_code: String,
    pub country: String,
    pub value: f64,
}

/// A rendered choropleth: one value per region plus display settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MapFigure {
    pub indicator_code: &'static str,
    pub legend_title: &'static str,
    pub years: YearRange,
    pub regions: Vec<RegionValue>,
}

impl MapFigure {
    pub fn value_for(&self, region_code: &str) -> Option<f64> {
        self.regions
            .iter()
            .find(|r| r.region_code == region_code)
            .map(|r| r.value)
    }

    /// Plotly figure document. Hover shows the country and value only.
    pub fn to_plotly(&self) -> Value {
        let locations: Vec<&str> = self.regions.iter().map(|r| r.region_code.as_str()).collect();
        let z: Vec<f64> = self.regions.iter().map(|r| r.value).collect();
        let text: Vec<&str> = self.regions.iter().map(|r| r.country.as_str()).collect();

        json!({
            "data": [{
                "type": "choropleth",
                "locationmode": "ISO-3",
                "locations": locations,
                "z": z,
                "text": text,
                "hovertemplate": format!(
                    "<b>%{{text}}</b><br>{}=%{{z}}<extra></extra>",
                    self.legend_title
                ),
                "colorbar": { "title": { "text": self.legend_title } },
            }],
            "layout": {
                "geo": {
                    "scope": SCOPE,
                    "projection": { "type": PROJECTION },
                },
                "margin": { "l": MARGIN_PX, "r": MARGIN_PX, "t": MARGIN_PX, "b": MARGIN_PX },
            },
        })
    }
}

/// Average `indicator` per region over `years`.
///
/// A single year is a range of length zero, so both cases share one path:
/// filter, group by (region, country), mean of present values. Groups with
/// no present values are left out rather than shown as zero.
#[instrument(level = "debug", skip(table), fields(indicator = indicator.code, rows = table.len()))]
pub fn render(table: &ObservationTable, indicator: &Indicator, years: YearRange) -> MapFigure {
    let mut groups: BTreeMap<(&str, &str), (f64, usize)> = BTreeMap::new();

    if let Some(col) = table.column(indicator) {
        for row in table.rows().iter().filter(|r| years.contains(r.year)) {
            let acc = groups
                .entry((row.region_code.as_str(), row.country.as_str()))
                .or_insert((0.0, 0));
            if let Some(v) = row.values[col].filter(|v| v.is_finite()) {
                acc.0 += v;
                acc.1 += 1;
            }
        }
    } else {
        debug!("indicator not in table, rendering empty map");
    }

    let regions: Vec<RegionValue> = groups
        .into_iter()
        .filter(|(_, (_, n))| *n > 0)
        .map(|((code, country), (sum, n))| RegionValue {
            region_code: code.to_string(),
            country: country.to_string(),
            value: sum / n as f64,
        })
        .collect();

    debug!(regions = regions.len(), "rendered figure");
    MapFigure {
        indicator_code: indicator.code,
        legend_title: indicator.legend_title(),
        years,
        regions,
    }
}
