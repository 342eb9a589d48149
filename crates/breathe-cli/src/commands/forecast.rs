//! Forecast, risk and observation commands

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use tabled::Tabled;

use super::parse_time;
use crate::client::{ApiClient, Forecast};
use crate::output::{
    color_category, color_confidence, format_timestamp, print_info, print_json, print_success,
    print_table, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct DayRow {
    #[tabled(rename = "Day")]
    day: String,
    #[tabled(rename = "Raw")]
    raw: String,
    #[tabled(rename = "Corrected")]
    corrected: String,
    #[tabled(rename = "Blend")]
    blend: String,
    #[tabled(rename = "Category")]
    category: String,
}

fn day_label(offset: usize) -> String {
    match offset {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        n => format!("+{}d", n),
    }
}

fn day_rows(forecast: &Forecast) -> Vec<DayRow> {
    forecast
        .days
        .iter()
        .map(|day| DayRow {
            day: day_label(day.day_offset),
            raw: format!("{:.0}", day.raw_value),
            corrected: format!("{:.0}", day.corrected_value),
            blend: format!("{:.0}%", day.blend_weight * 100.0),
            category: color_category(day.category),
        })
        .collect()
}

/// Show the calibrated forecast for a city
pub async fn show_forecast(client: &ApiClient, city: &str, format: OutputFormat) -> Result<()> {
    let forecast = client.forecast(city).await?;

    if let OutputFormat::Json = format {
        return print_json(&forecast);
    }

    println!("{}", "AQI Forecast".bold());
    println!("{}", "=".repeat(60));
    println!("City:        {}", forecast.entity_id.cyan());
    println!("Generated:   {}", format_timestamp(forecast.generated_at));
    println!("Model error: {:.1} AQI", forecast.model_error);
    println!("Confidence:  {}", color_confidence(forecast.confidence));
    println!();

    match &forecast.anchor_used {
        Some(anchor) => print_info(&format!(
            "Anchored to live AQI {:.0} observed {}",
            anchor.aqi_value,
            format_timestamp(anchor.observed_at)
        )),
        None => print_warning("No live observation; showing the raw model forecast"),
    }
    if let Some(reason) = &forecast.low_confidence_reason {
        print_warning(reason);
    }
    println!();

    print_table(&day_rows(&forecast));

    if let Some(today) = forecast.days.first() {
        println!();
        println!("{} {}", "Advisory:".bold(), today.advisory);
    }

    Ok(())
}

/// Show per-pollutant risks from the latest station reading
pub async fn show_risks(client: &ApiClient, city: &str, format: OutputFormat) -> Result<()> {
    let risks = client.risks(city).await?;

    if let OutputFormat::Json = format {
        return print_json(&risks);
    }

    println!("{} {}", "Pollutant risks for".bold(), risks.city.cyan());
    println!("{}", "=".repeat(60));
    for (pollutant, value) in &risks.pollutants {
        println!("  {:<8} {:.1}", pollutant.label(), value);
    }
    println!();

    if risks.advisories.is_empty() {
        print_success("No pollutant exceeds its safe range");
    } else {
        for advisory in &risks.advisories {
            print_warning(advisory);
        }
    }

    Ok(())
}

/// Push a live reading to the agent
pub async fn push_observation(
    client: &ApiClient,
    city: &str,
    aqi: f64,
    observed_at: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let observed_at = observed_at
        .map(|t| parse_time(&t, Utc::now()))
        .transpose()?;
    let receipt = client.push_observation(city, aqi, observed_at).await?;

    if let OutputFormat::Json = format {
        return print_json(&receipt);
    }

    if receipt.accepted {
        print_success(&format!(
            "Recorded AQI {:.0} for {} at {}",
            receipt.anchor.aqi_value,
            receipt.anchor.entity_id,
            format_timestamp(receipt.anchor.observed_at)
        ));
    } else {
        print_warning("A newer observation is already held; this one was ignored");
    }

    Ok(())
}
