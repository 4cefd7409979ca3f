// src/catalog.rs

/// A World Bank indicator the dashboard can map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Indicator {
    pub code: &'static str,
    pub label: &'static str,
    /// Shorter legend title; falls back to `label`.
    pub short_label: Option<&'static str>,
}

impl Indicator {
    /// Title shown on the colour bar.
    pub fn legend_title(&self) -> &'static str {
        self.short_label.unwrap_or(self.label)
    }
}

/// The fixed set of indicators. The first entry is the default selection.
pub static INDICATORS: &[Indicator] = &[
    Indicator {
        code: "IT.NET.USER.ZS",
        label: "Individuals using the Internet (% of population)",
        short_label: Some("pop % using internet"),
    },
    Indicator {
        code: "SG.GEN.PARL.ZS",
        label: "Proportion of seats held by women in national parliaments (%)",
        short_label: Some("% parliament women"),
    },
    Indicator {
        code: "EN.GHG.CO2.ZG.AR5",
        label: "Carbon dioxide (CO2) emissions (total) excluding LULUCF (% change from 1990)",
        short_label: None,
    },
];

pub fn all() -> &'static [Indicator] {
    INDICATORS
}

pub fn default_indicator() -> Indicator {
    INDICATORS[0]
}

/// Find an indicator by code or by its full label. The dropdown submits
/// labels, API callers usually send codes.
pub fn lookup(key: &str) -> Option<Indicator> {
    let key = key.trim();
    INDICATORS
        .iter()
        .find(|i| i.code.eq_ignore_ascii_case(key) || i.label == key)
        .copied()
}
