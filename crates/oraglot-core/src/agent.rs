//! One collection run: metrics pipeline and inventory worker side by side.
//!
//! ```text
//!   thread::scope
//!   ├── aggregator   ◄── channel ◄── run_collectors (4 collectors + supervisor)
//!   └── inventory worker
//!          │
//!          ▼
//!   Integration.merge(metrics registry) ; Integration.merge(inventory registry)
//! ```

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::aggregator::populate_metrics;
use crate::collector::{
    CollectionReport, MetricCollector, OBSERVATION_CHANNEL_CAPACITY, run_collectors,
};
use crate::config::CollectionOptions;
use crate::integration::{EntityRegistry, EntityType, Integration};
use crate::inventory::{InventoryStats, collect_inventory};
use crate::source::QuerySource;

/// What one run produced, for logging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Present when metrics were collected.
    pub metrics: Option<CollectionReport>,
    /// Present when inventory was collected.
    pub inventory: Option<InventoryStats>,
    pub instances: usize,
    pub tablespaces: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    /// True if any enabled pipeline lost data to a query failure.
    pub fn degraded(&self) -> bool {
        self.metrics.as_ref().is_some_and(|r| r.failed > 0)
            || self.inventory.as_ref().is_some_and(|s| s.failed)
    }
}

/// Runs the enabled pipelines against `source` and merges their registries
/// into `integration`, metrics first.
pub fn run<S: QuerySource + ?Sized>(
    source: &S,
    options: CollectionOptions,
    integration: &mut Integration,
) -> RunSummary {
    let started = Instant::now();
    let collectors = if options.collect_metrics() {
        MetricCollector::all(options.extended_metrics)
    } else {
        Vec::new()
    };

    let (metrics, inventory) = thread::scope(|s| {
        let inventory = options
            .collect_inventory()
            .then(|| s.spawn(|| collect_inventory(source)));

        let metrics = options.collect_metrics().then(|| {
            let (tx, rx) = mpsc::sync_channel(OBSERVATION_CHANNEL_CAPACITY);
            let aggregator = s.spawn(move || populate_metrics(rx));
            let report = run_collectors(source, &collectors, tx);
            let registry = aggregator.join().unwrap_or_else(|_| {
                warn!("aggregator panicked, metrics discarded");
                EntityRegistry::new()
            });
            (registry, report)
        });

        let inventory = inventory.map(|handle| {
            handle.join().unwrap_or_else(|_| {
                warn!("inventory worker panicked, inventory discarded");
                (
                    EntityRegistry::new(),
                    InventoryStats {
                        failed: true,
                        ..InventoryStats::default()
                    },
                )
            })
        });
        (metrics, inventory)
    });

    let mut summary = RunSummary::default();
    if let Some((registry, report)) = metrics {
        integration.merge(registry);
        summary.metrics = Some(report);
    }
    if let Some((registry, stats)) = inventory {
        integration.merge(registry);
        summary.inventory = Some(stats);
    }

    summary.instances = integration.entities().count(EntityType::Instance);
    summary.tablespaces = integration.entities().count(EntityType::Tablespace);
    summary.elapsed = started.elapsed();
    debug!(
        instances = summary.instances,
        tablespaces = summary.tablespaces,
        degraded = summary.degraded(),
        duration_ms = summary.elapsed.as_millis() as u64,
        "collection run finished"
    );
    summary
}
