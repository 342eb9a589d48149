//! Host monitoring commands

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use tabled::Tabled;

use super::parse_time;
use crate::client::ApiClient;
use crate::output::{format_bytes, format_timestamp, print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "RSS")]
    rss: String,
    #[tabled(rename = "Sent")]
    sent: String,
    #[tabled(rename = "Received")]
    received: String,
}

#[derive(Tabled)]
struct RateRow {
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Recv KiB/s")]
    recv: String,
    #[tabled(rename = "Sent KiB/s")]
    sent: String,
}

fn since_time(since: Option<String>) -> Result<Option<DateTime<Utc>>> {
    since.map(|s| parse_time(&s, Utc::now())).transpose()
}

/// Show raw host samples
pub async fn show_samples(
    client: &ApiClient,
    since: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let samples = client.samples(since_time(since)?).await?;

    if let OutputFormat::Json = format {
        return print_json(&samples);
    }

    let rows: Vec<SampleRow> = samples
        .iter()
        .map(|s| SampleRow {
            timestamp: format_timestamp(s.timestamp),
            cpu: format!("{:.1}%", s.cpu_percent),
            memory: format!("{:.1}%", s.memory_percent),
            rss: format_bytes(s.process_rss_bytes),
            sent: format_bytes(s.net_sent_bytes),
            received: format_bytes(s.net_recv_bytes),
        })
        .collect();
    print_table(&rows);
    Ok(())
}

/// Show network throughput between consecutive samples
pub async fn show_network(
    client: &ApiClient,
    since: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let rates = client.network(since_time(since)?).await?;

    if let OutputFormat::Json = format {
        return print_json(&rates);
    }

    let rows: Vec<RateRow> = rates
        .iter()
        .map(|r| RateRow {
            timestamp: format_timestamp(r.timestamp),
            recv: format!("{:.2}", r.recv_kib_per_sec),
            sent: format!("{:.2}", r.sent_kib_per_sec),
        })
        .collect();
    print_table(&rows);
    Ok(())
}

/// Show sample store statistics
pub async fn show_stats(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let stats = client.stats().await?;

    if let OutputFormat::Json = format {
        return print_json(&stats);
    }

    let span = |ts: Option<DateTime<Utc>>| ts.map(format_timestamp).unwrap_or_else(|| "-".to_string());

    println!("{}", "Sample Store".bold());
    println!("{}", "=".repeat(40));
    println!("Entries:  {} / {}", stats.entries, stats.capacity);
    println!("Oldest:   {}", span(stats.oldest_timestamp));
    println!("Newest:   {}", span(stats.newest_timestamp));
    if stats.rejected > 0 {
        println!("Rejected: {}", stats.rejected.to_string().yellow());
    } else {
        println!("Rejected: 0");
    }
    Ok(())
}
