//! Single consumer of routed observations.
//!
//! The aggregator is the only writer of its [`EntityRegistry`]. Collectors
//! never touch entities; they send [`RoutedObservation`]s and the aggregator
//! resolves the target entity, creates it on first reference and writes the
//! value into its metric set.

use std::sync::mpsc::Receiver;

use tracing::{debug, warn};

use crate::integration::{EntityRegistry, WriteOutcome};
use crate::metric::RoutedObservation;

/// Counters for one aggregation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    /// Observations written into a metric set.
    pub applied: usize,
    /// Writes that replaced an earlier value of the same field.
    pub replaced: usize,
    /// Observations dropped for a routing defect.
    pub dropped: usize,
}

/// Builds an entity registry from routed observations.
#[derive(Debug, Default)]
pub struct Aggregator {
    registry: EntityRegistry,
    stats: AggregateStats,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes one observation into its entity's metric set.
    ///
    /// Observations without exactly one known, non-empty routing key are
    /// logged and dropped.
    pub fn apply(&mut self, routed: RoutedObservation) {
        let (entity_type, id) = match routed.route() {
            Ok(route) => route,
            Err(e) => {
                self.stats.dropped += 1;
                warn!(
                    metric = routed.observation.name(),
                    error = %e,
                    "dropping observation without a usable entity"
                );
                return;
            }
        };

        let outcome = self
            .registry
            .get_or_create(id, entity_type)
            .metric_set_mut()
            .set_metric(&routed.observation);

        self.stats.applied += 1;
        if outcome == WriteOutcome::Replaced {
            self.stats.replaced += 1;
        }
    }

    /// Drains `rx` until every sender is gone.
    pub fn drain(&mut self, rx: Receiver<RoutedObservation>) {
        for routed in rx {
            self.apply(routed);
        }
    }

    pub fn stats(&self) -> AggregateStats {
        self.stats
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> EntityRegistry {
        self.registry
    }
}

/// Consumes `rx` until it is closed and returns the populated registry.
///
/// Returning is the aggregator's completion signal; callers join on it before
/// reading the registry.
pub fn populate_metrics(rx: Receiver<RoutedObservation>) -> EntityRegistry {
    let mut aggregator = Aggregator::new();
    aggregator.drain(rx);

    let stats = aggregator.stats();
    debug!(
        entities = aggregator.registry().len(),
        applied = stats.applied,
        replaced = stats.replaced,
        dropped = stats.dropped,
        "observation channel drained"
    );
    aggregator.into_registry()
}
