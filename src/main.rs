mod model;
mod normalizer;
mod output;
mod xml;

use anyhow::{Context, Result};
use clap::Parser;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about = "Normalize a TCX activity into flat JSON", long_about = None)]
struct Args {
    /// TCX activity file to normalize
    #[arg(value_name = "FILE")]
    file: String,

    /// 'stdout', 'json', or a .json file path
    #[arg(short, long, default_value = "stdout")]
    output: String,

    #[arg(long)]
    benchmark: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let start_time = Instant::now();
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file))?;
    let file_size = raw.len() as u64;

    let tree = xml::parse_document(&raw)
        .with_context(|| format!("failed to parse {}", args.file))?;
    let parse_elapsed = start_time.elapsed();

    let normalize_start = Instant::now();
    let record = normalizer::normalize(&tree)
        .with_context(|| format!("failed to normalize {}", args.file))?;
    let normalize_elapsed = normalize_start.elapsed();

    let mut writer = output::create_writer(&args.output)?;
    writer.write(&record)?;
    writer.finish()?;

    if args.benchmark {
        print_benchmark_results(file_size, &record, parse_elapsed, normalize_elapsed);
    }

    Ok(())
}

fn print_benchmark_results(
    file_size: u64,
    record: &model::NormalizedActivity,
    parse_elapsed: Duration,
    normalize_elapsed: Duration,
) {
    let total_laps = record.meta_laps.len();
    let total_trackpoints: usize = record.meta_laps.iter().map(|lap| lap.tracks.len()).sum();
    let file_size_mb = file_size as f64 / (1024.0 * 1024.0);
    let normalize_secs = normalize_elapsed.as_secs_f64();

    eprintln!("\n=== BENCHMARK RESULTS ===");
    eprintln!("File size: {:.2} MB", file_size_mb);
    eprintln!("Laps: {}", total_laps);
    eprintln!("Trackpoints: {}", total_trackpoints);
    eprintln!("Parse time: {:.3}s", parse_elapsed.as_secs_f64());
    eprintln!("Normalize time: {:.3}s", normalize_secs);
    if normalize_secs > 0.0 {
        eprintln!(
            "Throughput: {:.0} trackpoints/s",
            total_trackpoints as f64 / normalize_secs
        );
    }
}
