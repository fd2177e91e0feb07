//! Oracle metric collectors.
//!
//! Each collector owns one query against a dynamic performance view, maps
//! the result rows into routed observations, and pushes them onto the shared
//! channel drained by the aggregator.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     run_collectors()                         │
//! │  ┌───────────┐ ┌───────────┐ ┌───────────┐ ┌──────────────┐  │
//! │  │ ReadWrite │ │    Pga    │ │ SysMetric │ │  Tablespace  │  │
//! │  └─────┬─────┘ └─────┬─────┘ └─────┬─────┘ └──────┬───────┘  │
//! │        └─────────────┴──────┬──────┴──────────────┘          │
//! │                             │ RoutedObservation              │
//! │  CompletionBarrier ──► supervisor drops last sender          │
//! └─────────────────────────────┼────────────────────────────────┘
//!                        ┌──────▼──────┐
//!                        │ Aggregator  │ (single owner of registry)
//!                        └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use std::sync::mpsc;
//! use oraglot_core::collector::{MetricCollector, MetricGroup, run_collectors};
//! use oraglot_core::source::{MockSource, RawRow};
//!
//! let source = MockSource::new().with_rows(
//!     "gv$pgastat",
//!     vec![RawRow::new().with("INST_ID", 1).with("NAME", "total PGA inuse").with("VALUE", 135)],
//! );
//! let collectors = vec![MetricCollector::new(MetricGroup::Pga, false)];
//! let (tx, rx) = mpsc::sync_channel(16);
//! let report = run_collectors(&source, &collectors, tx);
//! assert_eq!(report.observations, 1);
//! assert_eq!(rx.iter().count(), 1);
//! ```

mod barrier;
mod mapper;
mod orchestrator;
pub(crate) mod queries;

use std::sync::mpsc::SyncSender;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::metric::RoutedObservation;
use crate::source::{QueryError, QuerySource};

pub use barrier::{CompletionBarrier, CompletionGuard};
pub use mapper::{RowError, RowMapper};
pub use orchestrator::{CollectionReport, OBSERVATION_CHANNEL_CAPACITY, run_collectors};

/// The four metric query shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricGroup {
    /// Physical I/O per instance (`gv$filestat`).
    ReadWrite,
    /// PGA memory statistics (`gv$pgastat`).
    Pga,
    /// System ratios and rates (`gv$sysmetric`).
    SysMetric,
    /// Space usage per tablespace (`DBA_DATA_FILES`).
    Tablespace,
}

impl MetricGroup {
    pub const ALL: [MetricGroup; 4] = [
        MetricGroup::ReadWrite,
        MetricGroup::Pga,
        MetricGroup::SysMetric,
        MetricGroup::Tablespace,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetricGroup::ReadWrite => "readwrite",
            MetricGroup::Pga => "pga",
            MetricGroup::SysMetric => "sysmetric",
            MetricGroup::Tablespace => "tablespace",
        }
    }

    pub fn query(&self) -> &'static str {
        match self {
            MetricGroup::ReadWrite => queries::READ_WRITE_QUERY,
            MetricGroup::Pga => queries::PGA_QUERY,
            MetricGroup::SysMetric => queries::SYSMETRIC_QUERY,
            MetricGroup::Tablespace => queries::TABLESPACE_QUERY,
        }
    }
}

impl std::fmt::Display for MetricGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error that ends a collector early.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectError {
    /// Query execution or row scan failed.
    Query(QueryError),
    /// The aggregator hung up before the collector finished.
    ChannelClosed,
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Query(e) => write!(f, "{}", e),
            CollectError::ChannelClosed => write!(f, "observation channel closed"),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<QueryError> for CollectError {
    fn from(e: QueryError) -> Self {
        CollectError::Query(e)
    }
}

/// Counters for one collector run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectStats {
    /// Rows returned by the query.
    pub rows: usize,
    /// Rows dropped by the row mapper.
    pub skipped_rows: usize,
    /// Observations sent to the aggregator.
    pub observations: usize,
    pub elapsed: Duration,
}

/// Runs one metric query and forwards its observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricCollector {
    group: MetricGroup,
    mapper: RowMapper,
}

impl MetricCollector {
    pub fn new(group: MetricGroup, extended_metrics: bool) -> Self {
        Self {
            group,
            mapper: RowMapper::new(group, extended_metrics),
        }
    }

    /// One collector per metric group.
    pub fn all(extended_metrics: bool) -> Vec<Self> {
        MetricGroup::ALL
            .iter()
            .map(|&group| Self::new(group, extended_metrics))
            .collect()
    }

    pub fn group(&self) -> MetricGroup {
        self.group
    }

    /// Executes the group's query and sends every mapped observation on `tx`.
    ///
    /// Malformed rows are logged and skipped. A query or scan error ends the
    /// run; observations already sent stay sent, and `stats` holds the
    /// counters reached so far.
    pub fn collect<S: QuerySource + ?Sized>(
        &self,
        source: &S,
        tx: &SyncSender<RoutedObservation>,
        stats: &mut CollectStats,
    ) -> Result<(), CollectError> {
        let started = Instant::now();
        let mut channel_closed = false;

        let result = source.for_each_row(self.group.query(), &mut |row| {
            stats.rows += 1;
            if channel_closed {
                return;
            }
            match self.mapper.map(&row) {
                Ok(observations) => {
                    for observation in observations {
                        if tx.send(observation).is_err() {
                            channel_closed = true;
                            return;
                        }
                        stats.observations += 1;
                    }
                }
                Err(e) => {
                    stats.skipped_rows += 1;
                    warn!(collector = %self.group, error = %e, "skipping malformed row");
                }
            }
        });
        stats.elapsed = started.elapsed();

        result?;
        if channel_closed {
            return Err(CollectError::ChannelClosed);
        }
        debug!(
            collector = %self.group,
            rows = stats.rows,
            skipped = stats.skipped_rows,
            observations = stats.observations,
            duration_ms = stats.elapsed.as_millis() as u64,
            "collector finished"
        );
        Ok(())
    }
}
