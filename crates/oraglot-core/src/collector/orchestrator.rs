//! Concurrent launch of all collectors and single close of the channel.

use std::sync::mpsc::SyncSender;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::barrier::CompletionBarrier;
use super::{CollectStats, MetricCollector, MetricGroup};
use crate::metric::RoutedObservation;
use crate::source::QuerySource;

/// Capacity of the collector → aggregator channel.
pub const OBSERVATION_CHANNEL_CAPACITY: usize = 256;

/// Outcome of one orchestrated collection round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionReport {
    /// Collectors launched.
    pub collectors: usize,
    /// Collectors that ran to the end of their result set.
    pub succeeded: usize,
    /// Collectors that stopped on an error.
    pub failed: usize,
    /// Groups of the failed collectors.
    pub failed_groups: Vec<MetricGroup>,
    /// Observations sent across all collectors.
    pub observations: usize,
    /// Rows skipped by the row mapper across all collectors.
    pub skipped_rows: usize,
    /// Completions the supervisor saw before closing the channel.
    pub completed_at_close: usize,
    pub elapsed: Duration,
}

/// Runs `collectors` concurrently against `source`, sending into `tx`.
///
/// Every collector gets its own clone of the sender and a completion guard
/// for a barrier sized to `collectors.len()`. A supervisor thread owns the
/// original sender; it waits on the barrier and then drops it, which is the
/// channel's only close. A collector always releases its sender before its
/// guard, so the close cannot happen while any collector can still send.
///
/// A collector that panics is counted as failed; its siblings, the
/// supervisor and the receiver are unaffected.
///
/// The receiving side must be drained concurrently (see
/// [`crate::aggregator::Aggregator`]), otherwise collectors block once the
/// channel is full. Returns after all collectors and the supervisor finished.
pub fn run_collectors<S: QuerySource + ?Sized>(
    source: &S,
    collectors: &[MetricCollector],
    tx: SyncSender<RoutedObservation>,
) -> CollectionReport {
    let started = Instant::now();
    let barrier = CompletionBarrier::new(collectors.len());

    let (completed_at_close, outcomes) = thread::scope(|s| {
        let handles: Vec<_> = collectors
            .iter()
            .map(|collector| {
                let guard = barrier.guard();
                let tx = tx.clone();
                let handle = s.spawn(move || {
                    // Declared in this order so unwinding drops the sender
                    // before the guard signals completion.
                    let _guard = guard;
                    let tx = tx;
                    let mut stats = CollectStats::default();
                    let result = collector.collect(source, &tx, &mut stats);
                    drop(tx);
                    if let Err(e) = &result {
                        warn!(
                            collector = %collector.group(),
                            error = %e,
                            observations = stats.observations,
                            "collector stopped early"
                        );
                    }
                    (stats, result.is_ok())
                });
                (collector.group(), handle)
            })
            .collect();

        let supervisor = s.spawn(|| {
            let completed = barrier.wait();
            drop(tx);
            debug!(completed, "all collectors finished, observation channel closed");
            completed
        });
        let completed = supervisor.join().unwrap_or_else(|_| {
            warn!("collection supervisor panicked");
            0
        });

        let outcomes: Vec<(MetricGroup, CollectStats, bool)> = handles
            .into_iter()
            .map(|(group, handle)| match handle.join() {
                Ok((stats, ok)) => (group, stats, ok),
                Err(_) => {
                    warn!(collector = %group, "collector panicked");
                    (group, CollectStats::default(), false)
                }
            })
            .collect();
        (completed, outcomes)
    });

    let mut report = CollectionReport {
        collectors: collectors.len(),
        completed_at_close,
        elapsed: started.elapsed(),
        ..CollectionReport::default()
    };
    for (group, stats, ok) in outcomes {
        report.observations += stats.observations;
        report.skipped_rows += stats.skipped_rows;
        if ok {
            report.succeeded += 1;
        } else {
            report.failed += 1;
            report.failed_groups.push(group);
        }
    }
    report.failed_groups.sort_by_key(|g| g.name());

    info!(
        collectors = report.collectors,
        failed = report.failed,
        observations = report.observations,
        skipped_rows = report.skipped_rows,
        duration_ms = report.elapsed.as_millis() as u64,
        "metric collection finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MockSource, QueryError, RawRow};
    use std::sync::mpsc::{self, RecvTimeoutError};

    fn full_source() -> MockSource {
        MockSource::new()
            .with_rows(
                "PHYRDS",
                vec![
                    RawRow::new()
                        .with("INST_ID", "1")
                        .with("PhysicalReads", 12)
                        .with("PhysicalWrites", 23)
                        .with("PhysicalBlockReads", 34)
                        .with("PhysicalBlockWrites", 45)
                        .with("ReadTime", 56)
                        .with("WriteTime", 67),
                ],
            )
            .with_rows(
                "gv$pgastat",
                vec![
                    RawRow::new()
                        .with("INST_ID", "1")
                        .with("NAME", "total PGA inuse")
                        .with("VALUE", 135),
                ],
            )
            .with_rows(
                "gv$sysmetric",
                vec![
                    RawRow::new()
                        .with("INST_ID", "1")
                        .with("METRIC_NAME", "Buffer Cache Hit Ratio")
                        .with("VALUE", 0.5),
                ],
            )
            .with_rows(
                "TABLESPACE_NAME",
                vec![
                    RawRow::new()
                        .with("TABLESPACE_NAME", "testtablespace")
                        .with("USED", 11)
                        .with("OFFLINE", 0)
                        .with("SIZE", 123)
                        .with("USED_PERCENT", 12),
                ],
            )
    }

    /// Observations each group contributes with `full_source`.
    fn expected(group: MetricGroup) -> usize {
        match group {
            MetricGroup::ReadWrite => 6,
            MetricGroup::Pga => 1,
            MetricGroup::SysMetric => 1,
            MetricGroup::Tablespace => 4,
        }
    }

    fn rows_for(group: MetricGroup) -> Vec<RawRow> {
        let mut rows = Vec::new();
        full_source()
            .for_each_row(group.query(), &mut |row| rows.push(row))
            .unwrap();
        rows
    }

    /// Full data set, with `failing` groups answering a query error.
    /// Failures are registered first so they win the substring match.
    fn source_with_failures(failing: &[MetricGroup]) -> MockSource {
        let mut source = MockSource::new();
        for group in failing {
            source = source.with_failure(
                group.query(),
                QueryError::Execute(format!("{} unavailable", group)),
            );
        }
        for group in MetricGroup::ALL {
            source = source.with_rows(group.query(), rows_for(group));
        }
        source
    }

    /// Drains `rx` concurrently with collection, like the aggregator does,
    /// and checks the close happens once, after every collector.
    fn run_with_failures(failing: &[MetricGroup]) {
        let source = source_with_failures(failing);
        let collectors = MetricCollector::all(false);
        // Capacity 1 forces collectors to block on the consumer.
        let (tx, rx) = mpsc::sync_channel(1);

        let (report, received) = thread::scope(|s| {
            let consumer = s.spawn(move || {
                let mut received = 0;
                loop {
                    match rx.recv_timeout(Duration::from_secs(5)) {
                        Ok(_) => received += 1,
                        Err(RecvTimeoutError::Disconnected) => return received,
                        Err(RecvTimeoutError::Timeout) => panic!("channel never closed"),
                    }
                }
            });
            let report = run_collectors(&source, &collectors, tx);
            (report, consumer.join().unwrap())
        });

        let want: usize = MetricGroup::ALL
            .iter()
            .filter(|g| !failing.contains(g))
            .map(|&g| expected(g))
            .sum();
        assert_eq!(report.collectors, 4);
        assert_eq!(report.completed_at_close, 4);
        assert_eq!(report.failed, failing.len());
        assert_eq!(report.succeeded, 4 - failing.len());
        assert_eq!(report.observations, want);
        assert_eq!(received, want);

        let mut failed_groups = failing.to_vec();
        failed_groups.sort_by_key(|g| g.name());
        assert_eq!(report.failed_groups, failed_groups);
    }

    #[test]
    fn closes_once_after_all_collectors_with_no_failures() {
        run_with_failures(&[]);
    }

    #[test]
    fn closes_once_after_all_collectors_with_one_failure() {
        run_with_failures(&[MetricGroup::SysMetric]);
    }

    #[test]
    fn closes_once_after_all_collectors_with_all_but_one_failing() {
        run_with_failures(&[
            MetricGroup::ReadWrite,
            MetricGroup::Pga,
            MetricGroup::Tablespace,
        ]);
    }

    #[test]
    fn all_collectors_failing_still_closes() {
        run_with_failures(&MetricGroup::ALL);
    }

    #[test]
    fn no_collectors_closes_immediately() {
        let source = MockSource::new();
        let (tx, rx) = mpsc::sync_channel(1);
        let report = run_collectors(&source, &[], tx);
        assert_eq!(report.completed_at_close, 0);
        assert!(rx.recv().is_err());
    }

    /// Panics on statements containing `pattern`, answers the rest from `inner`.
    struct PanickingSource {
        pattern: &'static str,
        inner: MockSource,
    }

    impl QuerySource for PanickingSource {
        fn for_each_row(
            &self,
            sql: &str,
            on_row: &mut dyn FnMut(RawRow),
        ) -> Result<usize, QueryError> {
            if sql.contains(self.pattern) {
                panic!("driver crashed on {}", self.pattern);
            }
            self.inner.for_each_row(sql, on_row)
        }
    }

    #[test]
    fn panicking_collector_counts_as_failed() {
        let source = PanickingSource {
            pattern: "gv$pgastat",
            inner: full_source(),
        };
        let collectors = MetricCollector::all(false);
        let (tx, rx) = mpsc::sync_channel(OBSERVATION_CHANNEL_CAPACITY);

        let (report, received) = thread::scope(|s| {
            let consumer = s.spawn(move || rx.iter().count());
            let report = run_collectors(&source, &collectors, tx);
            (report, consumer.join().unwrap())
        });

        assert_eq!(report.completed_at_close, 4);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failed_groups, vec![MetricGroup::Pga]);
        assert_eq!(report.observations, 11);
        assert_eq!(received, 11);
    }
}
