// src/config.rs

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{env, fs, net::SocketAddr, path::Path, time::Duration};
use tracing::info;

use crate::{
    fetch::worldbank::{DEFAULT_API_BASE, DEFAULT_PER_PAGE},
    table::YearRange,
};

pub const CONFIG_ENV: &str = "WBDASH_CONFIG";

/// Runtime settings. Defaults, then an optional YAML file named by
/// `WBDASH_CONFIG`, then individual env vars.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind: String,
    pub port: u16,
    pub log_level: String,
    pub refresh_secs: u64,
    pub api_base: String,
    pub per_page: u32,
    pub start_year: i32,
    pub end_year: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8050,
            log_level: "info".to_string(),
            refresh_secs: 60,
            api_base: DEFAULT_API_BASE.to_string(),
            per_page: DEFAULT_PER_PAGE,
            start_year: 2005,
            end_year: 2016,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let mut settings = match env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        settings.apply_env(|k| env::var(k).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let settings: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), "loaded config file");
        Ok(settings)
    }

    /// Overlay env vars read through `get`.
    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = get("WBDASH_BIND") {
            self.bind = v;
        }
        if let Some(v) = get("PORT") {
            self.port = v.parse().with_context(|| format!("PORT={}", v))?;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = get("WBDASH_REFRESH_SECS") {
            self.refresh_secs = v
                .parse()
                .with_context(|| format!("WBDASH_REFRESH_SECS={}", v))?;
        }
        if let Some(v) = get("WBDASH_API_BASE") {
            self.api_base = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_secs == 0 {
            bail!("refresh_secs must be positive");
        }
        self.years()?;
        self.addr()?;
        Ok(())
    }

    /// The full span every refresh fetches.
    pub fn years(&self) -> Result<YearRange> {
        YearRange::new(self.start_year, self.end_year).context("configured year span")
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("bind address {}:{}", self.bind, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() -> Result<()> {
        let s = Settings::default();
        s.validate()?;
        assert_eq!(s.years()?, YearRange::new(2005, 2016)?);
        assert_eq!(s.refresh_interval(), Duration::from_secs(60));
        assert_eq!(s.addr()?.port(), 8050);
        Ok(())
    }

    #[test]
    fn yaml_overrides_some_fields() -> Result<()> {
        let mut f = NamedTempFile::new()?;
        writeln!(f, "port: 9000\nrefresh_secs: 300\nend_year: 2020")?;
        let s = Settings::from_file(f.path())?;
        assert_eq!(s.port, 9000);
        assert_eq!(s.refresh_secs, 300);
        assert_eq!(s.end_year, 2020);
        assert_eq!(s.start_year, 2005);
        Ok(())
    }

    #[test]
    fn env_overrides() -> Result<()> {
        let vars: HashMap<&str, &str> =
            HashMap::from([("PORT", "8080"), ("WBDASH_BIND", "0.0.0.0"), ("LOG_LEVEL", "debug")]);
        let mut s = Settings::default();
        s.apply_env(|k| vars.get(k).map(|v| v.to_string()))?;
        assert_eq!(s.addr()?.to_string(), "0.0.0.0:8080");
        assert_eq!(s.log_level, "debug");
        Ok(())
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut s = Settings::default();
        assert!(s.apply_env(|k| (k == "PORT").then(|| "eighty".to_string())).is_err());

        let s = Settings {
            start_year: 2016,
            end_year: 2005,
            ..Settings::default()
        };
        assert!(s.validate().is_err());

        let s = Settings {
            refresh_secs: 0,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }
}
