//! Continuous-operation soak test for searchmux.
//!
//! Runs consecutive searches against simulated engines and reports whether
//! engine rotation kept searches succeeding. Exits non-zero when fewer
//! than 80% of searches succeed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use searchmux::soak::{self, SearchRecord, SoakOptions, SoakReport};
use searchmux::Settings;
use tracing_subscriber::EnvFilter;

/// Engine rotation soak test.
#[derive(Parser)]
#[command(name = "searchmux-soak", version, about)]
struct Cli {
    /// Path to TOML settings file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of searches to perform.
    #[arg(short = 'n', long, default_value_t = 20)]
    searches: usize,

    /// Delay between searches in seconds.
    #[arg(short, long, default_value_t = 1.0)]
    delay: f64,

    /// Print the final report as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("searchmux=info,searchmux_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let delay = Duration::try_from_secs_f64(cli.delay)
        .with_context(|| format!("invalid delay: {}", cli.delay))?;

    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    let coordinator = settings
        .build_coordinator()
        .context("failed to build coordinator")?;

    let options = SoakOptions::default()
        .with_searches(cli.searches)
        .with_delay(delay);

    if !cli.json {
        println!("searchmux soak test v{}", env!("CARGO_PKG_VERSION"));
        println!(
            "{} consecutive searches, {:.1}s delay, {} engines",
            options.searches,
            cli.delay,
            coordinator.engine_ids().len()
        );
    }

    let report = if cli.json {
        soak::run(&coordinator, &options).await?
    } else {
        soak::run_with_progress(&coordinator, &options, |record| print_record(record, options.searches))
            .await?
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{json}");
    } else {
        print_summary(&report);
    }

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_record(record: &SearchRecord<'_>, total: usize) {
    println!("\n[{}/{}] query: '{}'", record.index, total, record.query);
    match record.outcome {
        Ok(response) => {
            for (engine, reason) in response.unresponsive_engines() {
                println!("  engine unresponsive: {engine} ({reason})");
            }
            let mut engines: Vec<&str> = response
                .results
                .iter()
                .flat_map(|r| r.engine_names())
                .collect();
            engines.sort_unstable();
            engines.dedup();
            println!(
                "  ok: {} results from {} engines in {:.2}s",
                response.number_of_results(),
                engines.len(),
                record.elapsed.as_secs_f64()
            );
            if !engines.is_empty() {
                println!("  engines: {}", engines.join(", "));
            }
        }
        Err(e) => println!("  failed: {e}"),
    }
}

fn print_summary(report: &SoakReport) {
    let total = report.total_searches.max(1) as f64;
    println!("\nSUMMARY");
    println!("started at: {}", report.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("total searches: {}", report.total_searches);
    println!(
        "successful: {} ({:.1}%)",
        report.successful_searches,
        report.successful_searches as f64 / total * 100.0
    );
    println!(
        "failed: {} ({:.1}%)",
        report.failed_searches,
        report.failed_searches as f64 / total * 100.0
    );
    println!("total results: {}", report.total_results);
    println!("average results per search: {:.1}", report.average_results());

    if let (Some(avg), Some(min), Some(max)) = (
        report.average_response_time(),
        report.min_response_time(),
        report.max_response_time(),
    ) {
        println!("\nresponse times:");
        println!("  average: {:.2}s", avg.as_secs_f64());
        println!("  min: {:.2}s", min.as_secs_f64());
        println!("  max: {:.2}s", max.as_secs_f64());
    }

    println!("\nengines used (top 10):");
    for (engine, count) in report.top_engines(10) {
        println!("  {engine}: {count} results");
    }

    if report.unresponsive_counts.is_empty() {
        println!("\nno engine was suspended during this run");
    } else {
        println!("\nengines unresponsive during run:");
        for (engine, count) in &report.unresponsive_counts {
            let reason = report
                .unresponsive_reasons
                .get(engine)
                .map(String::as_str)
                .unwrap_or("unknown");
            println!("  {engine}: {count} times (last: {reason})");
        }
    }

    println!("\n{}", report.verdict().message());
}
