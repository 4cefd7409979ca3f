// src/countries.rs

use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

/// Entries the map never shows, regardless of what the reference list says.
pub const DENYLIST: &[&str] = &["Kosovo", "Korea, Dem. People's Rep."];

/// A country as returned by the reference collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryRecord {
    pub name: String,
    /// ISO3 code.
    pub region_code: String,
    pub capital_city: Option<String>,
}

/// A sovereign, mappable country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryRef {
    pub name: String,
    pub region_code: String,
}

/// Reduce the raw reference list to mappable countries.
///
/// Aggregates ("World", income groups, ...) carry no capital city and are
/// dropped along with the denylisted names. The first record wins when a
/// name repeats.
#[instrument(level = "debug", skip(raw), fields(records = raw.len()))]
pub fn resolve(raw: &[CountryRecord]) -> Vec<CountryRef> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());

    for rec in raw {
        let name = rec.name.trim();
        let code = rec.region_code.trim();
        let has_capital = rec
            .capital_city
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());

        if !has_capital || name.is_empty() || code.is_empty() || DENYLIST.contains(&name) {
            continue;
        }
        if !seen.insert(name.to_string()) {
            debug!(name, "duplicate country name, keeping first");
            continue;
        }
        out.push(CountryRef {
            name: name.to_string(),
            region_code: code.to_string(),
        });
    }

    debug!(kept = out.len(), "resolved country reference");
    out
}

/// Lookup from country name to region code, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct CountryIndex {
    refs: Vec<CountryRef>,
    by_name: HashMap<String, usize>,
}

impl CountryIndex {
    pub fn from_records(raw: &[CountryRecord]) -> Self {
        Self::new(resolve(raw))
    }

    pub fn new(refs: Vec<CountryRef>) -> Self {
        let by_name = refs
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();
        Self { refs, by_name }
    }

    pub fn region_code(&self, name: &str) -> Option<&str> {
        self.by_name
            .get(name)
            .map(|&i| self.refs[i].region_code.as_str())
    }

    /// Region codes in reference order; this is the region set every fetch asks for.
    pub fn region_codes(&self) -> Vec<String> {
        self.refs.iter().map(|r| r.region_code.clone()).collect()
    }

    pub fn refs(&self) -> &[CountryRef] {
        &self.refs
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
