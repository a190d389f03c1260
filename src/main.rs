use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use wikipulse::environment::Settings;
use wikipulse::ingest::ingest_lines;
use wikipulse::logging::configure_logging;
use wikipulse::lookup::{HttpFetcher, JsonFetcher};
use wikipulse::monitor::Monitor;
use wikipulse::notify::{log_publications, Gateway, Notifier};
use wikipulse::social::SocialSearch;
use wikipulse::sweeper::sweep_loop;
use wikipulse::tuning::Tuning;

/// Detects breaking news from the recent-changes relay. Relay messages are
/// read from standard input as `sender<TAB>channel<TAB>text` lines.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Edits a cluster needs before it can be a candidate
    #[arg(long)]
    threshold: Option<u64>,

    /// Seconds without an edit before a cluster is dropped
    #[arg(long)]
    idle_seconds: Option<u64>,

    /// Longest gap in seconds allowed between recent edits
    #[arg(long)]
    burst_seconds: Option<u64>,

    /// Distinct editors needed across languages (three times as many in one language)
    #[arg(long)]
    concurrent_editors: Option<u64>,

    /// Semicolon-separated language codes to monitor (default: all known)
    #[arg(long, value_delimiter = ';')]
    languages: Vec<String>,

    /// Keep edits made by bots
    #[arg(long)]
    keep_bots: bool,
}

impl Cli {
    fn apply(self, settings: &mut Settings) {
        if let Some(threshold) = self.threshold {
            settings.breaking_news_threshold = threshold;
        }
        if let Some(seconds) = self.idle_seconds {
            settings.seconds_since_last_edit = seconds;
        }
        if let Some(seconds) = self.burst_seconds {
            settings.seconds_between_edits = seconds;
        }
        if let Some(editors) = self.concurrent_editors {
            settings.number_of_concurrent_editors = editors;
        }
        if !self.languages.is_empty() {
            settings.monitored_languages = self.languages;
        }
        if self.keep_bots {
            settings.discard_bots = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();

    let mut settings = Settings::from_env();
    Cli::parse().apply(&mut settings);
    info!(
        "Starting wikipulse: threshold {}, burst {}s, idle {}s, {} concurrent editors",
        settings.breaking_news_threshold,
        settings.seconds_between_edits,
        settings.seconds_since_last_edit,
        settings.number_of_concurrent_editors
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_err() {
            error!("Failed to listen for ctrl-c");
        }
        let _ = shutdown_tx.send(true);
    });

    let tuning = Arc::new(Tuning::from_settings(&settings));
    let fetcher: Arc<dyn JsonFetcher> = Arc::new(
        HttpFetcher::new(settings.request_timeout).context("Failed to create HTTP client")?,
    );
    let gateway = Arc::new(Gateway::new(tuning.clone(), settings.announcement_buffer));
    tokio::spawn(log_publications(gateway.subscribe_publications()));

    let notifier: Arc<dyn Notifier> = gateway.clone();
    let social = SocialSearch::from_settings(&settings, fetcher.clone());
    info!("Correlating candidates across {} social networks", social.network_count());

    let monitor = Monitor::new(&settings, tuning.clone(), fetcher, social, notifier.clone());

    let sweeper = tokio::spawn(sweep_loop(
        monitor.store().clone(),
        tuning,
        notifier,
        settings.sweep_interval,
        shutdown_rx.clone(),
    ));

    let reader = BufReader::new(tokio::io::stdin());
    let recorded = ingest_lines(reader, &monitor, shutdown_rx.clone()).await?;

    info!("Waiting for {} in-flight lookups", monitor.in_flight());
    monitor.settle().await;

    // input may end before ctrl-c; keep sweeping until then
    let mut shutdown = shutdown_rx;
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
    if let Err(e) = sweeper.await {
        error!("Sweeper task failed: {}", e);
    }

    info!("Recorded {} edits, {} clusters tracked at exit", recorded, monitor.store().len());
    Ok(())
}
