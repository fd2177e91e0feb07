//! Row mapping: raw result rows to routed observations.
//!
//! Each query shape has a fixed set of curated metric names. PGA and
//! sysmetric rows are name/value pairs; rows whose name has no curated
//! metric are skipped unless extended metrics are enabled, in which case the
//! name is sanitized into a metric identifier.

use tracing::debug;

use super::MetricGroup;
use crate::metric::{Observation, ObservationError, RoutedObservation};
use crate::source::{ColumnValue, RawRow};

/// Column-to-metric mapping for the `gv$filestat` summary row.
const READ_WRITE_METRICS: &[(&str, &str)] = &[
    ("PhysicalReads", "disk.reads"),
    ("PhysicalWrites", "disk.writes"),
    ("PhysicalBlockReads", "disk.blocksRead"),
    ("PhysicalBlockWrites", "disk.blocksWritten"),
    ("ReadTime", "disk.readTime"),
    ("WriteTime", "disk.writeTime"),
];

/// `gv$pgastat` statistic names with curated metric names.
const PGA_METRICS: &[(&str, &str)] = &[
    ("total PGA inuse", "memory.pgaInUseInBytes"),
    ("total PGA allocated", "memory.pgaAllocatedInBytes"),
    ("total freeable PGA memory", "memory.pgaFreeableInBytes"),
    ("global memory bound", "memory.pgaMaxSizeInBytes"),
    ("aggregate PGA target parameter", "memory.pgaTargetInBytes"),
];

/// `gv$sysmetric` metric names with curated metric names.
const SYSMETRIC_METRICS: &[(&str, &str)] = &[
    ("Buffer Cache Hit Ratio", "memory.bufferCacheHitRatio"),
    ("Memory Sorts Ratio", "memory.sortsRatio"),
    ("Redo Allocation Hit Ratio", "memory.redoAllocationHitRatio"),
    ("Library Cache Hit Ratio", "db.libraryCacheHitRatio"),
    ("Soft Parse Ratio", "db.softParseRatio"),
    ("Database CPU Time Ratio", "db.cpuTimeRatio"),
    ("Database Wait Time Ratio", "db.waitTimeRatio"),
    ("User Transaction Per Sec", "db.userTransactionsPerSecond"),
    ("User Calls Per Sec", "db.userCallsPerSecond"),
    ("Logons Per Sec", "db.logonsPerSecond"),
    ("Redo Generated Per Sec", "db.redoGeneratedBytesPerSecond"),
    ("Physical Reads Per Sec", "disk.physicalReadsPerSecond"),
    ("Physical Writes Per Sec", "disk.physicalWritesPerSecond"),
    ("Session Count", "db.sessionCount"),
    ("Host CPU Utilization (%)", "host.cpuUtilization"),
];

/// Column-to-metric mapping for the tablespace summary row.
const TABLESPACE_METRICS: &[(&str, &str)] = &[
    ("USED", "tablespace.spaceConsumedInBytes"),
    ("OFFLINE", "tablespace.isOffline"),
    ("SIZE", "tablespace.totalSpaceInBytes"),
    ("USED_PERCENT", "tablespace.spaceUsedPercentage"),
];

/// Why a row could not be mapped. The row is skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum RowError {
    /// A required column is absent.
    MissingColumn(&'static str),
    /// A required column is `NULL`.
    NullValue(&'static str),
    /// A column holds a value of the wrong shape.
    InvalidValue { column: &'static str, value: String },
    /// The produced observation was rejected.
    Observation(ObservationError),
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowError::MissingColumn(col) => write!(f, "missing column {}", col),
            RowError::NullValue(col) => write!(f, "column {} is NULL", col),
            RowError::InvalidValue { column, value } => {
                write!(f, "column {} has invalid value {:?}", column, value)
            }
            RowError::Observation(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RowError {}

impl From<ObservationError> for RowError {
    fn from(e: ObservationError) -> Self {
        RowError::Observation(e)
    }
}

/// Maps rows of one [`MetricGroup`]'s query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowMapper {
    group: MetricGroup,
    extended: bool,
}

impl RowMapper {
    pub fn new(group: MetricGroup, extended: bool) -> Self {
        Self { group, extended }
    }

    /// Maps one row into zero or more routed observations.
    ///
    /// An empty result means the row was recognized as irrelevant (an
    /// unknown PGA or sysmetric name without extended metrics).
    pub fn map(&self, row: &RawRow) -> Result<Vec<RoutedObservation>, RowError> {
        match self.group {
            MetricGroup::ReadWrite => map_read_write(row),
            MetricGroup::Pga => {
                map_name_value(row, "NAME", PGA_METRICS, self.extended.then_some("memory.pga"))
            }
            MetricGroup::SysMetric => map_name_value(
                row,
                "METRIC_NAME",
                SYSMETRIC_METRICS,
                self.extended.then_some("db.sys"),
            ),
            MetricGroup::Tablespace => map_tablespace(row),
        }
    }
}

fn map_read_write(row: &RawRow) -> Result<Vec<RoutedObservation>, RowError> {
    let instance = text_column(row, "INST_ID")?;
    READ_WRITE_METRICS
        .iter()
        .map(|&(column, name)| -> Result<RoutedObservation, RowError> {
            let value = numeric_column(row, column)?;
            Ok(RoutedObservation::for_instance(
                Observation::gauge(name, value)?,
                instance.as_str(),
            ))
        })
        .collect()
}

fn map_name_value(
    row: &RawRow,
    name_column: &'static str,
    known: &[(&str, &str)],
    extended_prefix: Option<&str>,
) -> Result<Vec<RoutedObservation>, RowError> {
    let instance = text_column(row, "INST_ID")?;
    let stat_name = text_column(row, name_column)?;

    let metric_name = match known.iter().find(|(stat, _)| *stat == stat_name) {
        Some((_, metric)) => (*metric).to_string(),
        None => match extended_prefix.and_then(|prefix| extended_name(prefix, &stat_name)) {
            Some(name) => name,
            None => {
                debug!(statistic = %stat_name, "no metric for statistic, skipping row");
                return Ok(Vec::new());
            }
        },
    };

    let value = numeric_column(row, "VALUE")?;
    Ok(vec![RoutedObservation::for_instance(
        Observation::gauge(metric_name, value)?,
        instance,
    )])
}

fn map_tablespace(row: &RawRow) -> Result<Vec<RoutedObservation>, RowError> {
    let tablespace = text_column(row, "TABLESPACE_NAME")?;
    TABLESPACE_METRICS
        .iter()
        .map(|&(column, name)| -> Result<RoutedObservation, RowError> {
            let value = numeric_column(row, column)?;
            Ok(RoutedObservation::for_tablespace(
                Observation::gauge(name, value)?,
                tablespace.as_str(),
            ))
        })
        .collect()
}

fn required<'a>(row: &'a RawRow, column: &'static str) -> Result<&'a ColumnValue, RowError> {
    match row.get(column) {
        None => Err(RowError::MissingColumn(column)),
        Some(value) if value.is_null() => Err(RowError::NullValue(column)),
        Some(value) => Ok(value),
    }
}

fn text_column(row: &RawRow, column: &'static str) -> Result<String, RowError> {
    let text = required(row, column)?
        .as_text()
        .ok_or(RowError::NullValue(column))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RowError::InvalidValue {
            column,
            value: text.clone(),
        });
    }
    Ok(trimmed.to_string())
}

fn numeric_column(row: &RawRow, column: &'static str) -> Result<f64, RowError> {
    let value = required(row, column)?;
    value.as_f64().ok_or_else(|| RowError::InvalidValue {
        column,
        value: value.as_text().unwrap_or_default(),
    })
}

/// Joins `prefix` and the lowerCamelCase form of `name`'s alphanumeric words:
/// `"cache hit percentage"` → `"<prefix>.cacheHitPercentage"`.
fn extended_name(prefix: &str, name: &str) -> Option<String> {
    let ident = sanitize_identifier(name);
    if ident.is_empty() {
        None
    } else {
        Some(format!("{}.{}", prefix, ident))
    }
}

pub(crate) fn sanitize_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, word) in name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .enumerate()
    {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                out.push(first.to_ascii_lowercase());
            } else {
                out.push(first.to_ascii_uppercase());
            }
            // Acronyms such as "PGA" keep their case after the first letter.
            out.extend(chars);
        }
    }
    out
}
