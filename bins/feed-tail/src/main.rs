use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;

use feed_api::TransactionRecord;
use feed_client::{Backoff, ClientConfig, ClientError, FeedClient, FeedUpdate, LocalFeed};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackoffKind {
    Fixed,
    Exponential,
}

#[derive(Parser)]
#[command(name = "feed-tail", about = "Follow a live transaction feed from the terminal")]
struct Cli {
    /// Base URL of the feed server
    #[arg(long, default_value = "http://127.0.0.1:3000", env = "FEED_URL")]
    url: String,

    /// Reconnect policy
    #[arg(long, value_enum, default_value = "exponential")]
    backoff: BackoffKind,

    /// Fixed delay / initial exponential delay, ms
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,

    /// Upper bound for exponential delay, ms
    #[arg(long, default_value_t = 30_000)]
    max_delay_ms: u64,

    /// Skip the initial /transactions snapshot
    #[arg(long)]
    no_snapshot: bool,
}

#[derive(Debug, thiserror::Error)]
enum TailError {
    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}

fn print_record(r: &TransactionRecord) {
    println!(
        "{:>12}  {:<12} {:>14.4}  {} -> {}  {}",
        r.timestamp, r.kind, r.amount, r.from, r.to, r.signature
    );
}

async fn run(cli: Cli) -> Result<(), TailError> {
    let backoff = match cli.backoff {
        BackoffKind::Fixed => Backoff::fixed(Duration::from_millis(cli.delay_ms)),
        BackoffKind::Exponential => Backoff::Exponential {
            initial: Duration::from_millis(cli.delay_ms),
            max: Duration::from_millis(cli.max_delay_ms),
        },
    };
    let mut config = ClientConfig::new(cli.url);
    config.backoff = backoff;
    config.fetch_snapshot = !cli.no_snapshot;

    let mut client = FeedClient::new(config)?;
    let token = CancellationToken::new();

    let stop = token.clone();
    let signal = tokio::spawn(async move {
        let res = tokio::signal::ctrl_c().await;
        stop.cancel();
        res
    });

    client
        .run(
            |update: FeedUpdate<'_>, feed: &LocalFeed| match update {
                FeedUpdate::Snapshot => {
                    tracing::info!(records = feed.len(), "snapshot");
                    // Oldest first so the newest ends at the bottom.
                    let records: Vec<_> = feed.records().collect();
                    for r in records.into_iter().rev() {
                        print_record(r);
                    }
                }
                FeedUpdate::NewTransactions(batch) => {
                    for r in batch {
                        print_record(r);
                    }
                }
            },
            token,
        )
        .await;

    if signal.is_finished() {
        if let Ok(res) = signal.await {
            res?;
        }
    } else {
        signal.abort();
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
