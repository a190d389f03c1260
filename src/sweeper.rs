use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use crate::clustering::{ClusterStore, StoreStats};
use crate::edit::ArticleKey;
use crate::notify::{Event, Notifier, StatsNotice};
use crate::tuning::Tuning;
use crate::TARGET_CLUSTER;

/// Evicts every cluster idle for longer than the current idle window and
/// reports how many clusters are left.
pub fn sweep_once(
    store: &ClusterStore,
    tuning: &Tuning,
    notifier: &dyn Notifier,
    now: DateTime<Utc>,
) -> Vec<ArticleKey> {
    let evicted = store.evict_idle(now, tuning.idle_window());
    let clusters_left = store.len();
    notifier.notify(Event::StatsUpdate(StatsNotice { clusters_left }));
    evicted
}

/// Runs [`sweep_once`] every `every` until `shutdown` flips to `true`.
pub async fn sweep_loop(
    store: Arc<ClusterStore>,
    tuning: Arc<Tuning>,
    notifier: Arc<dyn Notifier>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    // a zero period would make `interval` panic
    let every = every.max(Duration::from_millis(1));
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(target: TARGET_CLUSTER, "Sweeping idle clusters every {} seconds", every.as_secs());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = sweep_once(&store, &tuning, notifier.as_ref(), Utc::now());
                if !evicted.is_empty() {
                    let StoreStats { clusters, variants } = store.stats();
                    debug!(
                        target: TARGET_CLUSTER,
                        "Sweep done: {} clusters, {} variants", clusters, variants
                    );
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!(target: TARGET_CLUSTER, "Sweeper stopping");
                    break;
                }
            }
        }
    }
}
