//! Agent health command

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_status, format_timestamp, print_error, print_json, print_success, print_table,
    OutputFormat,
};
use breathe_lib::health::{HealthResponse, ReadinessResponse};

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Checked")]
    checked: String,
}

#[derive(Serialize)]
struct StatusReport {
    health: HealthResponse,
    readiness: ReadinessResponse,
}

/// Show agent health and readiness
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, health) = client.health().await?;
    let (_, readiness) = client.readiness().await?;

    if let OutputFormat::Json = format {
        return print_json(&StatusReport { health, readiness });
    }

    println!("{}", "Agent Status".bold());
    println!("{}", "=".repeat(40));
    println!("Overall: {}", color_status(health.status));
    if readiness.ready {
        print_success("Ready to serve forecasts");
    } else {
        print_error(&format!(
            "Not ready: {}",
            readiness.reason.as_deref().unwrap_or("starting up")
        ));
    }
    println!();

    let rows: Vec<ComponentRow> = health
        .components
        .iter()
        .map(|(name, component)| ComponentRow {
            name: name.clone(),
            status: color_status(component.status),
            message: component.message.clone().unwrap_or_default(),
            checked: format_timestamp(component.last_checked),
        })
        .collect();
    print_table(&rows);
    Ok(())
}
