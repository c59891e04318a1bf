//! Pipeline Benchmark
//!
//! Times feature extraction, clustering and anomaly scoring on synthetic
//! batches, or on a real capture when `--pcap` is given.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;

use capsift::capture::read_capture_file;
use capsift::core::{EthernetInfo, FrameRecord, IpInfo};
use capsift::ml::{numeric_matrix, AnomalyConfig, AnomalyScorer, ClusterConfig, FeatureExtractor, KMeans};
use capsift::Analyzer;

#[derive(Parser, Debug)]
#[command(name = "pipeline_benchmark")]
#[command(about = "Benchmark the capsift analysis pipeline")]
struct Args {
    /// Capture file to replay instead of synthetic frames
    #[arg(short, long)]
    pcap: Option<PathBuf>,

    /// Synthetic batch sizes
    #[arg(short, long, value_delimiter = ',', default_value = "100,1000,5000")]
    sizes: Vec<usize>,

    /// Autoencoder epochs
    #[arg(short, long, default_value = "200")]
    epochs: usize,

    /// Runs per batch size
    #[arg(short, long, default_value = "3")]
    runs: usize,
}

fn synthetic_frames(n: usize) -> Vec<FrameRecord> {
    let eth = EthernetInfo::new([2, 0, 0, 0, 0, 1], [2, 0, 0, 0, 0, 2], 0x0800);
    (0..n)
        .map(|i| {
            let ip = IpInfo::new(
                IpAddr::V4(Ipv4Addr::new(10, 0, (i / 256) as u8, (i % 256) as u8)),
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
                if i % 3 == 0 { 17 } else { 6 },
            );
            // Mostly small packets with an occasional jumbo one
            let length = if i % 97 == 0 { 9000 } else { 60 + (i * 31) % 1400 };
            let frame = FrameRecord::new(length, i as f64 * 0.001)
                .with_ethernet(eth)
                .with_ip(ip);
            if i % 3 == 0 {
                frame.with_udp(5353, 53)
            } else {
                frame.with_tcp(40000 + (i % 1000) as u16, 443)
            }
        })
        .collect()
}

fn mean(durations: &[Duration]) -> Duration {
    if durations.is_empty() {
        return Duration::ZERO;
    }
    durations.iter().sum::<Duration>() / durations.len() as u32
}

fn bench_batch(label: &str, frames: &[FrameRecord], args: &Args) -> anyhow::Result<()> {
    let anomaly = AnomalyConfig {
        autoencoder: capsift::ml::models::AutoencoderConfig {
            epochs: args.epochs,
            ..Default::default()
        },
        ..Default::default()
    };
    let extractor = FeatureExtractor::new();
    let kmeans = KMeans::new(ClusterConfig::default());
    let scorer = AnomalyScorer::new(anomaly.clone());
    let analyzer = Analyzer::new(ClusterConfig::default(), anomaly);

    let mut extract_times = Vec::new();
    let mut cluster_times = Vec::new();
    let mut score_times = Vec::new();
    let mut total_times = Vec::new();
    let mut flagged = 0;

    for _ in 0..args.runs.max(1) {
        let start = Instant::now();
        let (vectors, _) = extractor.extract(frames);
        extract_times.push(start.elapsed());

        let matrix = numeric_matrix(&vectors);
        let start = Instant::now();
        kmeans.fit(&matrix);
        cluster_times.push(start.elapsed());

        let start = Instant::now();
        scorer.score(&matrix)?;
        score_times.push(start.elapsed());

        let start = Instant::now();
        flagged = analyzer.analyze(frames)?.anomaly_count();
        total_times.push(start.elapsed());
    }

    let total = mean(&total_times);
    println!(
        "{:>12} {:>8} {:>12.2?} {:>12.2?} {:>12.2?} {:>12.2?} {:>10.0} {:>8}",
        label,
        frames.len(),
        mean(&extract_times),
        mean(&cluster_times),
        mean(&score_times),
        total,
        frames.len() as f64 / total.as_secs_f64().max(1e-9),
        flagged
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!(
        "{:>12} {:>8} {:>12} {:>12} {:>12} {:>12} {:>10} {:>8}",
        "batch", "packets", "extract", "kmeans", "autoenc", "total", "pkt/s", "flagged"
    );

    if let Some(path) = &args.pcap {
        let frames = read_capture_file(path)?;
        bench_batch("pcap", &frames, &args)?;
    } else {
        for &n in &args.sizes {
            let frames = synthetic_frames(n);
            bench_batch("synthetic", &frames, &args)?;
        }
    }

    Ok(())
}
