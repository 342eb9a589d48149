//! Pollutant sub-indices and health risk interpretation
//!
//! Computes the CPCB AQI from individual pollutant concentrations and turns
//! concentrations into per-pollutant risk advisories.

use crate::classifier::RiskCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Pollutants tracked by the CPCB index. Serialized with the station feed keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pollutant {
    Pm25,
    Pm10,
    No2,
    O3,
    Co,
    So2,
    Nh3,
}

/// Latest concentration per pollutant (µg/m³, CO in mg/m³)
pub type PollutantReadings = BTreeMap<Pollutant, f64>;

/// (concentration low, concentration high, index low, index high)
type Breakpoint = (f64, f64, f64, f64);

const PM25_BREAKPOINTS: [Breakpoint; 6] = [
    (0.0, 30.0, 0.0, 50.0),
    (31.0, 60.0, 51.0, 100.0),
    (61.0, 90.0, 101.0, 200.0),
    (91.0, 120.0, 201.0, 300.0),
    (121.0, 250.0, 301.0, 400.0),
    (251.0, f64::INFINITY, 401.0, 500.0),
];

const PM10_BREAKPOINTS: [Breakpoint; 6] = [
    (0.0, 50.0, 0.0, 50.0),
    (51.0, 100.0, 51.0, 100.0),
    (101.0, 250.0, 101.0, 200.0),
    (251.0, 350.0, 201.0, 300.0),
    (351.0, 430.0, 301.0, 400.0),
    (431.0, f64::INFINITY, 401.0, 500.0),
];

const NO2_BREAKPOINTS: [Breakpoint; 6] = [
    (0.0, 40.0, 0.0, 50.0),
    (41.0, 80.0, 51.0, 100.0),
    (81.0, 180.0, 101.0, 200.0),
    (181.0, 280.0, 201.0, 300.0),
    (281.0, 400.0, 301.0, 400.0),
    (401.0, f64::INFINITY, 401.0, 500.0),
];

const O3_BREAKPOINTS: [Breakpoint; 6] = [
    (0.0, 50.0, 0.0, 50.0),
    (51.0, 100.0, 51.0, 100.0),
    (101.0, 168.0, 101.0, 200.0),
    (169.0, 208.0, 201.0, 300.0),
    (209.0, 748.0, 301.0, 400.0),
    (749.0, f64::INFINITY, 401.0, 500.0),
];

const CO_BREAKPOINTS: [Breakpoint; 6] = [
    (0.0, 1.0, 0.0, 50.0),
    (1.1, 2.0, 51.0, 100.0),
    (2.1, 10.0, 101.0, 200.0),
    (10.1, 17.0, 201.0, 300.0),
    (17.1, 34.0, 301.0, 400.0),
    (34.1, f64::INFINITY, 401.0, 500.0),
];

const SO2_BREAKPOINTS: [Breakpoint; 6] = [
    (0.0, 40.0, 0.0, 50.0),
    (41.0, 80.0, 51.0, 100.0),
    (81.0, 380.0, 101.0, 200.0),
    (381.0, 800.0, 201.0, 300.0),
    (801.0, 1600.0, 301.0, 400.0),
    (1601.0, f64::INFINITY, 401.0, 500.0),
];

const NH3_BREAKPOINTS: [Breakpoint; 6] = [
    (0.0, 200.0, 0.0, 50.0),
    (201.0, 400.0, 51.0, 100.0),
    (401.0, 800.0, 101.0, 200.0),
    (801.0, 1200.0, 201.0, 300.0),
    (1201.0, 1800.0, 301.0, 400.0),
    (1801.0, f64::INFINITY, 401.0, 500.0),
];

const SEVERE_RISK: &str =
    "Serious respiratory impact on healthy people. Serious aggravation of heart or lung disease.";
const VERY_POOR_RISK: &str = "Respiratory illness on prolonged exposure. Effect may be pronounced in people with heart/lung diseases.";
const POOR_RISK: &str = "Breathing discomfort to people on prolonged exposure, and discomfort to people with heart disease.";
const MODERATE_RISK: &str = "Breathing discomfort to people with lung disease (e.g., asthma) and heart disease, children, older adults.";
const CO_SEVERE_RISK: &str = "Serious aggravation of heart or lung disease; may cause respiratory effects even during light activity.";

/// (threshold, severity, risk), most severe first
type RiskThreshold = (f64, RiskCategory, &'static str);

impl Pollutant {
    /// Parse a station feed key ("pm25", "no2", ...)
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "pm25" | "pm2.5" => Some(Pollutant::Pm25),
            "pm10" => Some(Pollutant::Pm10),
            "no2" => Some(Pollutant::No2),
            "o3" => Some(Pollutant::O3),
            "co" => Some(Pollutant::Co),
            "so2" => Some(Pollutant::So2),
            "nh3" => Some(Pollutant::Nh3),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::No2 => "NO2",
            Pollutant::O3 => "O3",
            Pollutant::Co => "CO",
            Pollutant::So2 => "SO2",
            Pollutant::Nh3 => "NH3",
        }
    }

    fn breakpoints(&self) -> &'static [Breakpoint; 6] {
        match self {
            Pollutant::Pm25 => &PM25_BREAKPOINTS,
            Pollutant::Pm10 => &PM10_BREAKPOINTS,
            Pollutant::No2 => &NO2_BREAKPOINTS,
            Pollutant::O3 => &O3_BREAKPOINTS,
            Pollutant::Co => &CO_BREAKPOINTS,
            Pollutant::So2 => &SO2_BREAKPOINTS,
            Pollutant::Nh3 => &NH3_BREAKPOINTS,
        }
    }

    fn risk_thresholds(&self) -> Option<[RiskThreshold; 4]> {
        let [severe, very_poor, poor, moderate] = match self {
            Pollutant::Pm25 => [251.0, 121.0, 91.0, 61.0],
            Pollutant::Pm10 => [431.0, 351.0, 251.0, 101.0],
            Pollutant::O3 => [749.0, 209.0, 169.0, 101.0],
            Pollutant::No2 => [401.0, 281.0, 181.0, 81.0],
            Pollutant::So2 => [1601.0, 801.0, 381.0, 81.0],
            Pollutant::Co => [34.1, 17.1, 10.1, 2.1],
            Pollutant::Nh3 => return None,
        };
        let severe_risk = if *self == Pollutant::Co {
            CO_SEVERE_RISK
        } else {
            SEVERE_RISK
        };
        Some([
            (severe, RiskCategory::Severe, severe_risk),
            (very_poor, RiskCategory::VeryPoor, VERY_POOR_RISK),
            (poor, RiskCategory::Poor, POOR_RISK),
            (moderate, RiskCategory::Moderate, MODERATE_RISK),
        ])
    }
}

/// CPCB sub-index for one pollutant concentration.
///
/// Each band covers `[low, next_low)` so concentrations falling between the
/// published integral breakpoints still resolve. The open-ended top band maps
/// to its lower index.
pub fn sub_index(pollutant: Pollutant, concentration: f64) -> Option<u32> {
    if !concentration.is_finite() || concentration < 0.0 {
        return None;
    }
    let breakpoints = pollutant.breakpoints();
    let position = breakpoints
        .iter()
        .rposition(|&(bp_low, ..)| concentration >= bp_low)?;
    let (bp_low, bp_high, aqi_low, aqi_high) = breakpoints[position];

    if bp_high.is_infinite() {
        return Some(aqi_low as u32);
    }
    let clamped = concentration.min(bp_high);
    let index = (aqi_high - aqi_low) / (bp_high - bp_low) * (clamped - bp_low) + aqi_low;
    // Halves go to the even neighbour, as CPCB's reference calculator does
    Some(index.round_ties_even() as u32)
}

/// Composite AQI: the maximum sub-index over the available pollutants
pub fn aqi_from_pollutants(readings: &PollutantReadings) -> Option<u32> {
    readings
        .iter()
        .filter_map(|(pollutant, value)| sub_index(*pollutant, *value))
        .max()
}

/// Health risk triggered by a single pollutant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollutantRisk {
    pub pollutant: Pollutant,
    pub value: f64,
    pub severity: RiskCategory,
    pub risk: &'static str,
}

impl std::fmt::Display for PollutantRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.pollutant.label(),
            self.severity.label(),
            self.risk
        )
    }
}

/// The most severe risk level exceeded by each pollutant, if any
pub fn interpret_pollutant_risks(readings: &PollutantReadings) -> Vec<PollutantRisk> {
    let risks: Vec<PollutantRisk> = readings
        .iter()
        .filter(|(_, value)| value.is_finite())
        .filter_map(|(&pollutant, &value)| {
            let thresholds = pollutant.risk_thresholds()?;
            thresholds
                .iter()
                .find(|(threshold, ..)| value >= *threshold)
                .map(|&(_, severity, risk)| PollutantRisk {
                    pollutant,
                    value,
                    severity,
                    risk,
                })
        })
        .collect();

    if risks.is_empty() {
        debug!(pollutants = readings.len(), "No pollutant risk thresholds exceeded");
    }
    risks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readings(pairs: &[(Pollutant, f64)]) -> PollutantReadings {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_sub_index_band_edges() {
        assert_eq!(sub_index(Pollutant::Pm10, 0.0), Some(0));
        assert_eq!(sub_index(Pollutant::Pm10, 50.0), Some(50));
        assert_eq!(sub_index(Pollutant::Pm10, 51.0), Some(51));
        assert_eq!(sub_index(Pollutant::Pm25, 30.0), Some(50));
        assert_eq!(sub_index(Pollutant::Pm25, 90.0), Some(200));
    }

    #[test]
    fn test_sub_index_interpolates() {
        // 101 + (200-101)/(250-101) * (175-101)
        let expected = (101.0 + 99.0 / 149.0 * 74.0_f64).round_ties_even() as u32;
        assert_eq!(sub_index(Pollutant::Pm10, 175.0), Some(expected));
    }

    #[test]
    fn test_sub_index_rounds_halves_to_even() {
        assert_eq!(sub_index(Pollutant::Pm10, 12.5), Some(12));
        assert_eq!(sub_index(Pollutant::Pm10, 13.5), Some(14));
    }

    #[test]
    fn test_sub_index_covers_gaps_between_bands() {
        // Falls between the published 0-50 and 51-100 PM10 bands
        assert!(sub_index(Pollutant::Pm10, 50.5).is_some());
        assert!(sub_index(Pollutant::Co, 1.05).is_some());
    }

    #[test]
    fn test_sub_index_top_band() {
        assert_eq!(sub_index(Pollutant::Pm25, 400.0), Some(401));
        assert_eq!(sub_index(Pollutant::So2, 5000.0), Some(401));
    }

    #[test]
    fn test_sub_index_rejects_invalid() {
        assert_eq!(sub_index(Pollutant::Pm25, -1.0), None);
        assert_eq!(sub_index(Pollutant::Pm25, f64::NAN), None);
    }

    #[test]
    fn test_aqi_is_max_sub_index() {
        let r = readings(&[(Pollutant::Pm25, 30.0), (Pollutant::Pm10, 100.0)]);
        assert_eq!(aqi_from_pollutants(&r), Some(100));
        assert_eq!(aqi_from_pollutants(&PollutantReadings::new()), None);
    }

    #[test]
    fn test_clean_air_has_no_risks() {
        let r = readings(&[(Pollutant::Pm25, 20.0), (Pollutant::O3, 30.0)]);
        assert!(interpret_pollutant_risks(&r).is_empty());
    }

    #[test]
    fn test_most_severe_threshold_wins() {
        let r = readings(&[(Pollutant::Pm25, 130.0), (Pollutant::No2, 300.0)]);
        let risks = interpret_pollutant_risks(&r);
        assert_eq!(risks.len(), 2);
        assert!(risks.iter().all(|r| r.severity == RiskCategory::VeryPoor));
    }

    #[test]
    fn test_severe_so2_advisory() {
        let r = readings(&[(Pollutant::So2, 1700.0)]);
        let risks = interpret_pollutant_risks(&r);
        assert_eq!(risks[0].severity, RiskCategory::Severe);
        assert!(risks[0].to_string().starts_with("SO2 (Severe):"));
    }

    #[test]
    fn test_nh3_has_no_risk_table() {
        let r = readings(&[(Pollutant::Nh3, 5000.0)]);
        assert!(interpret_pollutant_risks(&r).is_empty());
    }

    #[test]
    fn test_from_key() {
        assert_eq!(Pollutant::from_key("PM25"), Some(Pollutant::Pm25));
        assert_eq!(Pollutant::from_key("pm2.5"), Some(Pollutant::Pm25));
        assert_eq!(Pollutant::from_key("t"), None);
    }
}
