//! AQI health classification
//!
//! Maps an AQI value onto the CPCB National Air Quality Index scale. The
//! scale is a fixed, ordered table of half-open bands covering `[0, inf)`.
//! CPCB publishes integral bands (0-50, 51-100, ...), and fractional values
//! round half-up before lookup, so each band starts at `n + 0.5`.

use serde::{Deserialize, Serialize};

pub const AQI_DEFINITION: &str = "The Air Quality Index (AQI) is a tool used by government \
agencies to communicate how polluted the air currently is or how polluted it is forecast to \
become. It helps you understand the potential health effects associated with different \
levels of air quality.";

/// CPCB NAQI risk category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Good,
    Satisfactory,
    Moderate,
    Poor,
    VeryPoor,
    Severe,
}

/// One row of the breakpoint table
#[derive(Debug, Clone, Copy)]
pub struct Band {
    pub category: RiskCategory,
    /// Inclusive lower bound; the band ends where the next one starts
    pub lower_bound: f64,
    pub range: &'static str,
    pub color: &'static str,
    pub advisory: &'static str,
}

/// Breakpoint table, ordered by lower bound
pub const AQI_SCALE: [Band; 6] = [
    Band {
        category: RiskCategory::Good,
        lower_bound: 0.0,
        range: "0-50",
        color: "#228B22",
        advisory: "Minimal Impact. Air quality is considered satisfactory, and air pollution poses little or no risk.",
    },
    Band {
        category: RiskCategory::Satisfactory,
        lower_bound: 50.5,
        range: "51-100",
        color: "#90EE90",
        advisory: "Minor breathing discomfort to sensitive people. Air quality is acceptable.",
    },
    Band {
        category: RiskCategory::Moderate,
        lower_bound: 100.5,
        range: "101-200",
        color: "#FFD700",
        advisory: "Breathing discomfort to people with lung disease such as asthma, and discomfort to people with heart disease, children and older adults.",
    },
    Band {
        category: RiskCategory::Poor,
        lower_bound: 200.5,
        range: "201-300",
        color: "#FFA500",
        advisory: "Breathing discomfort to people on prolonged exposure, and discomfort to people with heart disease.",
    },
    Band {
        category: RiskCategory::VeryPoor,
        lower_bound: 300.5,
        range: "301-400",
        color: "#FF0000",
        advisory: "Respiratory illness on prolonged exposure. Effect may be more pronounced in people with lung and heart diseases.",
    },
    Band {
        category: RiskCategory::Severe,
        lower_bound: 400.5,
        range: "401-500",
        color: "#800000",
        advisory: "Affects healthy people and seriously impacts those with existing diseases. May cause respiratory impact even on light physical activity.",
    },
];

impl RiskCategory {
    pub fn label(&self) -> &'static str {
        match self {
            RiskCategory::Good => "Good",
            RiskCategory::Satisfactory => "Satisfactory",
            RiskCategory::Moderate => "Moderate",
            RiskCategory::Poor => "Poor",
            RiskCategory::VeryPoor => "Very Poor",
            RiskCategory::Severe => "Severe",
        }
    }

    pub fn band(&self) -> &'static Band {
        // AQI_SCALE is indexed in declaration order
        &AQI_SCALE[*self as usize]
    }

    pub fn color(&self) -> &'static str {
        self.band().color
    }

    pub fn advisory(&self) -> &'static str {
        self.band().advisory
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a non-negative AQI value.
///
/// Negative input is a caller error; release builds fold it (and NaN) into the
/// lowest band so the function stays total.
pub fn classify(aqi: f64) -> (RiskCategory, &'static str) {
    debug_assert!(aqi >= 0.0 || aqi.is_nan(), "AQI must be non-negative, got {aqi}");
    let band = AQI_SCALE
        .iter()
        .rev()
        .find(|band| aqi >= band.lower_bound)
        .unwrap_or(&AQI_SCALE[0]);
    (band.category, band.advisory)
}
