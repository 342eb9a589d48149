//! BreatheEasy CLI
//!
//! Queries calibrated AQI forecasts, pushes live readings and inspects the
//! agent's monitoring and health endpoints.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{classify, forecast, monitor, status};
use output::OutputFormat;

/// BreatheEasy CLI
#[derive(Parser)]
#[command(name = "breathe")]
#[command(author, version, about = "CLI for the BreatheEasy AQI forecast agent", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via BREATHE_API_URL env var)
    #[arg(long, env = "BREATHE_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the calibrated multi-day forecast for a city
    Forecast {
        /// City or station name, e.g. "Delhi"
        city: String,
    },

    /// Show per-pollutant health risks from the latest station reading
    Risks {
        /// City or station name
        city: String,
    },

    /// Push a live AQI reading to use as the forecast anchor
    Observe {
        /// City or station name
        city: String,

        /// Observed AQI
        aqi: f64,

        /// Observation time (RFC 3339); defaults to now
        #[arg(long)]
        observed_at: Option<String>,
    },

    /// Classify an AQI value on the CPCB scale (no agent needed)
    Classify {
        /// AQI value
        aqi: f64,
    },

    /// Inspect host samples collected by the agent
    #[command(subcommand)]
    Monitor(MonitorCommands),

    /// Show agent health and readiness
    Status,
}

#[derive(Subcommand)]
pub enum MonitorCommands {
    /// Show raw host samples
    Samples {
        /// Only samples newer than this (RFC 3339, or relative like 30s, 10m, 1h)
        #[arg(long)]
        since: Option<String>,
    },

    /// Show network throughput between consecutive samples
    Network {
        /// Only rates newer than this (RFC 3339, or relative like 30s, 10m, 1h)
        #[arg(long)]
        since: Option<String>,
    },

    /// Show sample store statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format;

    match cli.command {
        // Classification is local and works without an agent
        Commands::Classify { aqi } => classify::classify_aqi(aqi, format),
        command => {
            let client = client::ApiClient::new(&cli.api_url)?;
            run(&client, command, format).await
        }
    }
}

async fn run(client: &client::ApiClient, command: Commands, format: OutputFormat) -> Result<()> {
    match command {
        Commands::Forecast { city } => forecast::show_forecast(client, &city, format).await,
        Commands::Risks { city } => forecast::show_risks(client, &city, format).await,
        Commands::Observe {
            city,
            aqi,
            observed_at,
        } => forecast::push_observation(client, &city, aqi, observed_at, format).await,
        Commands::Monitor(monitor_cmd) => match monitor_cmd {
            MonitorCommands::Samples { since } => monitor::show_samples(client, since, format).await,
            MonitorCommands::Network { since } => monitor::show_network(client, since, format).await,
            MonitorCommands::Stats => monitor::show_stats(client, format).await,
        },
        Commands::Status => status::show_status(client, format).await,
        Commands::Classify { aqi } => classify::classify_aqi(aqi, format),
    }
}
