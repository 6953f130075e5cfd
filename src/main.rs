use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod aggregate;
mod db;
mod fetcher;
mod models;
mod report;

#[derive(Parser)]
#[command(name = "cascade-trust-analytics")]
#[command(about = "Trust and feedback analytics for the tiered answer pipeline", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum Dataset {
    Feedback,
    Queries,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Fetch the latest records and print the derived dashboard views
    Snapshot {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Poll the feedback table and print each completed poll until Ctrl-C
    Watch {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 10)]
        interval_secs: u64,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Dump fetched rows to a CSV file
    Export {
        #[arg(long, value_enum)]
        dataset: Dataset,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value = "export.csv")]
        out: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "cascade_trust_analytics=info",
        1 => "cascade_trust_analytics=debug",
        _ => "cascade_trust_analytics=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to the hosted Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Snapshot { limit, format } => {
            let summary = db::fetch_usage_summary(&pool).await?;
            let mut query_cache = fetcher::QueryCache::new(Duration::from_secs(10));
            let history = fetcher::cached_query_logs(&mut query_cache, &pool, limit).await?;
            let mut feedback_cache = fetcher::QueryCache::new(Duration::from_secs(10));
            let feedback = fetcher::cached_feedback(&mut feedback_cache, &pool, limit).await?;
            let snapshot = aggregate::build_dashboard(&summary, &history, &feedback);

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                }
                OutputFormat::Text => {
                    println!(
                        "Queries: {} total, cache hit rate {:.1}%",
                        snapshot.summary.total_queries, snapshot.summary.cache_hit_rate
                    );
                    for slice in &snapshot.model_distribution {
                        println!("- {}: {}", slice.name, slice.value);
                    }
                    match snapshot.average_trust_score {
                        Some(avg) => println!("Average trust score: {avg:.1}"),
                        None => println!("Average trust score: —"),
                    }
                    for slice in &snapshot.risk_distribution {
                        println!("- {}: {}", slice.name, slice.value);
                    }
                    println!(
                        "Feedback: {} records, {} approved, {} overridden",
                        snapshot.total_feedback,
                        snapshot.feedback.approved,
                        snapshot.feedback.overridden
                    );
                    for outcome in &snapshot.feedback.by_risk {
                        println!(
                            "- {}: {} approved / {} overridden",
                            outcome.risk, outcome.approved, outcome.overridden
                        );
                    }
                }
            }
        }
        Commands::Watch {
            limit,
            interval_secs,
        } => {
            let options = fetcher::FeedOptions {
                limit,
                interval: Duration::from_secs(interval_secs),
            };
            let feed = fetcher::FeedbackFeed::start(pool.clone(), options);
            let mut rx = feed.subscribe();
            info!(limit, interval_secs, "watching human feedback");
            if rx.borrow().is_loading() {
                println!("Waiting for the first poll...");
            }
            // Shared across polls: query-log refetches hit the cache until a
            // full interval has passed.
            let mut history_cache = fetcher::QueryCache::new(options.interval);

            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snap = rx.borrow_and_update().clone();
                        let stats = aggregate::feedback_stats(snap.rows());
                        match &snap.error {
                            Some(error) => {
                                let last_good = snap
                                    .fetched_at
                                    .map(|t| t.format("%H:%M:%S").to_string())
                                    .unwrap_or_else(|| "never".to_string());
                                println!(
                                    "poll {}: FAILED ({error}); showing {} records fetched {}",
                                    snap.polls,
                                    snap.rows().len(),
                                    last_good
                                );
                            }
                            None => {
                                let history = fetcher::cached_query_logs(
                                    &mut history_cache,
                                    &pool,
                                    limit,
                                )
                                .await?;
                                let avg = aggregate::average_trust(&history)
                                    .map(|v| format!("{v:.1}"))
                                    .unwrap_or_else(|| "—".to_string());
                                println!(
                                    "poll {}: {} records, {} approved, {} overridden, avg trust {avg}",
                                    snap.polls,
                                    snap.rows().len(),
                                    stats.approved,
                                    stats.overridden
                                );
                            }
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        println!("Stopping.");
                        break;
                    }
                }
            }
        }
        Commands::Report { limit, out } => {
            let summary = db::fetch_usage_summary(&pool).await?;
            let history = db::fetch_query_logs(&pool, limit).await?;
            let feedback = db::fetch_feedback(&pool, limit).await?;
            let report =
                report::build_report(chrono::Utc::now(), &summary, &history, &feedback);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { dataset, limit, out } => {
            let written = match dataset {
                Dataset::Feedback => {
                    let records = db::fetch_feedback(&pool, limit).await?;
                    db::export_feedback_csv(&records, &out)?
                }
                Dataset::Queries => {
                    let records = db::fetch_query_logs(&pool, limit).await?;
                    db::export_query_logs_csv(&records, &out)?
                }
            };
            println!("Wrote {written} rows to {}.", out.display());
        }
    }

    Ok(())
}
