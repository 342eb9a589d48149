//! Local AQI classification

use anyhow::{bail, Result};
use breathe_lib::classifier::{classify, AQI_DEFINITION};
use breathe_lib::RiskCategory;
use colored::Colorize;
use serde::Serialize;

use crate::output::{color_category, print_json, OutputFormat};

#[derive(Debug, Serialize)]
struct Classification {
    aqi: f64,
    category: RiskCategory,
    label: &'static str,
    range: &'static str,
    color: &'static str,
    advisory: &'static str,
}

fn classification(aqi: f64) -> Result<Classification> {
    if !aqi.is_finite() || aqi < 0.0 {
        bail!("AQI must be a non-negative number, got {}", aqi);
    }
    let (category, advisory) = classify(aqi);
    Ok(Classification {
        aqi,
        category,
        label: category.label(),
        range: category.band().range,
        color: category.color(),
        advisory,
    })
}

/// Classify an AQI value on the CPCB scale
pub fn classify_aqi(aqi: f64, format: OutputFormat) -> Result<()> {
    let result = classification(aqi)?;

    if let OutputFormat::Json = format {
        return print_json(&result);
    }

    println!(
        "AQI {:.0}: {} ({})",
        result.aqi,
        color_category(result.category),
        result.range
    );
    println!();
    println!("{}", result.advisory);
    println!();
    println!("{}", AQI_DEFINITION.dimmed());
    Ok(())
}
