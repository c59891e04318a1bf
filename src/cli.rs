use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

use capsift::capture::read_capture_file;
use capsift::config::Config;
use capsift::{AnalysisResult, Analyzer, DetailedAnalysis};

#[derive(Parser)]
#[command(name = "capsift")]
#[command(author, version, about = "Packet capture triage: clustering and anomaly flags")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a pcap or pcapng capture
    Analyze {
        /// Capture file to analyze
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Print the default configuration
    Config,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

/// Response envelope for JSON output
#[derive(Serialize)]
struct Response<'a> {
    message: &'static str,
    data: &'a AnalysisResult,
}

/// Table row for cluster sizes
#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "Cluster")]
    cluster: usize,
    #[tabled(rename = "Packets")]
    packets: usize,
    #[tabled(rename = "Mean Length")]
    mean_length: String,
}

/// Table row for flagged packets
#[derive(Tabled)]
struct AnomalyRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Length")]
    length: u64,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Destination")]
    destination: String,
    #[tabled(rename = "Cluster")]
    cluster: usize,
}

/// Load the config named on the command line, or defaults
pub fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => {
            let mut config = Config::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }
}

pub fn run_command(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Analyze {
            file,
            format,
            pretty,
        } => cmd_analyze(config, file, format, pretty),
        Commands::Config => cmd_config(),
    }
}

fn cmd_analyze(config: Config, file: PathBuf, format: OutputFormat, pretty: bool) -> Result<()> {
    let frames = read_capture_file(&file)
        .with_context(|| format!("Failed to read capture {}", file.display()))?;

    let analyzer = Analyzer::from_config(&config);
    let detailed = analyzer
        .analyze_detailed(&frames)
        .context("Analysis failed")?;

    match format {
        OutputFormat::Json => {
            let response = Response {
                message: "Analysis complete",
                data: &detailed.result,
            };
            let json = if pretty {
                serde_json::to_string_pretty(&response)?
            } else {
                serde_json::to_string(&response)?
            };
            println!("{}", json);
        }
        OutputFormat::Text => print_text(&file, frames.len(), &detailed),
    }

    Ok(())
}

fn cmd_config() -> Result<()> {
    print!("{}", Config::default_with_comments());
    Ok(())
}

fn format_timestamp(ts: f64) -> String {
    let secs = ts.floor();
    let nanos = ((ts - secs) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(secs as i64, nanos)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| format!("{:.3}", ts))
}

fn print_text(file: &Path, frame_count: usize, detailed: &DetailedAnalysis) {
    let result = &detailed.result;
    let counts = &result.summary.protocol_counts;

    println!("{}", "=== capsift Analysis ===".bold());
    println!();
    println!("Capture:              {}", file.display());
    println!("Frames read:          {}", frame_count);
    println!(
        "Ethernet packets:     {}",
        result.summary.total_packets.to_string().cyan()
    );
    if let Some((first, last)) = result.time_span() {
        println!(
            "Time span:            {} .. {} ({:.3}s)",
            format_timestamp(first),
            format_timestamp(last),
            last - first
        );
    }

    println!("\n{}", "Protocols:".bold());
    println!("  IPv4: {}", counts.ipv4);
    println!("  IPv6: {}", counts.ipv6);
    println!("  ARP:  {}", counts.arp);
    println!("  TCP:  {}", counts.tcp);
    println!("  UDP:  {}", counts.udp);

    if let Some(clustering) = &detailed.clustering {
        println!("\n{}", "Clusters:".bold());
        let rows: Vec<ClusterRow> = clustering
            .cluster_sizes()
            .into_iter()
            .zip(&clustering.centroids)
            .enumerate()
            .map(|(cluster, (packets, centroid))| ClusterRow {
                cluster,
                packets,
                mean_length: format!("{:.1}", centroid[0]),
            })
            .collect();
        println!("{}", Table::new(rows));
    }

    let flagged = result.anomaly_count();
    println!(
        "\n{} {} (threshold {:.3})",
        "Anomalies:".bold(),
        if flagged > 0 {
            flagged.to_string().red()
        } else {
            flagged.to_string().green()
        },
        detailed.anomaly.threshold
    );

    if flagged > 0 {
        let rows: Vec<AnomalyRow> = result
            .flagged()
            .map(|(index, cluster, vector)| AnomalyRow {
                index,
                time: format_timestamp(vector.timestamp),
                length: vector.length,
                source: vector
                    .src_ip
                    .map(|ip| ip.to_string())
                    .unwrap_or_else(|| vector.src_mac.to_string()),
                destination: vector
                    .dst_ip
                    .map(|ip| ip.to_string())
                    .unwrap_or_else(|| vector.dst_mac.to_string()),
                cluster,
            })
            .collect();
        println!("{}", Table::new(rows));
    }
}
