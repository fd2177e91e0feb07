//! Database query sources.
//!
//! Collectors never talk to a driver directly: they run SQL through the
//! [`QuerySource`] trait and receive column-name-indexed [`RawRow`]s.
//!
//! ```text
//!        ┌────────────────────┐
//!        │    QuerySource     │ (trait)
//!        └─────────┬──────────┘
//!          ┌───────┴────────┐
//!   ┌──────▼──────┐  ┌──────▼──────┐
//!   │ OracleSource│  │ MockSource  │
//!   │ (sessions)  │  │ (Testing)   │
//!   └─────────────┘  └─────────────┘
//! ```

pub mod mock;
#[cfg(feature = "oracle")]
mod oracle_db;

pub use mock::MockSource;
#[cfg(feature = "oracle")]
pub use oracle_db::OracleSource;

/// Error type for query execution.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// No usable database session.
    Connection(String),
    /// The statement failed to execute.
    Execute(String),
    /// A row could not be fetched or decoded.
    Scan(String),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Connection(msg) => write!(f, "connection error: {}", msg),
            QueryError::Execute(msg) => write!(f, "query error: {}", msg),
            QueryError::Scan(msg) => write!(f, "row scan error: {}", msg),
        }
    }
}

impl std::error::Error for QueryError {}

/// A read-only SQL executor shared by all collectors of a run.
///
/// Implementations must tolerate concurrent calls from several threads.
pub trait QuerySource: Send + Sync {
    /// Executes `sql` and hands each result row to `on_row` in fetch order.
    ///
    /// Returns the number of rows delivered. A scan error stops delivery and
    /// is returned after the rows already handed over.
    fn for_each_row(&self, sql: &str, on_row: &mut dyn FnMut(RawRow)) -> Result<usize, QueryError>;
}

/// A single column value as returned by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl ColumnValue {
    /// Numeric view of the value. Text is parsed; `NULL` yields `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Null => None,
            ColumnValue::Int(v) => Some(*v as f64),
            ColumnValue::Float(v) => Some(*v),
            ColumnValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Textual view of the value. Integral floats print without a fraction,
    /// so a numeric `INST_ID` of `1.0` reads as `"1"`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            ColumnValue::Null => None,
            ColumnValue::Int(v) => Some(v.to_string()),
            ColumnValue::Float(v) => {
                if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                    Some((*v as i64).to_string())
                } else {
                    Some(v.to_string())
                }
            }
            ColumnValue::Text(s) => Some(s.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }
}

impl From<i64> for ColumnValue {
    fn from(v: i64) -> Self {
        ColumnValue::Int(v)
    }
}

impl From<i32> for ColumnValue {
    fn from(v: i32) -> Self {
        ColumnValue::Int(i64::from(v))
    }
}

impl From<f64> for ColumnValue {
    fn from(v: f64) -> Self {
        ColumnValue::Float(v)
    }
}

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        ColumnValue::Text(v.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(v: String) -> Self {
        ColumnValue::Text(v)
    }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ColumnValue::Null, Into::into)
    }
}

/// One result row, indexed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    columns: Vec<(String, ColumnValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column append, mostly for fixtures.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<ColumnValue>) {
        self.columns.push((name.into(), value.into()));
    }

    /// Looks up a column by name, ignoring ASCII case.
    ///
    /// Oracle upper-cases unquoted aliases, so callers may use either form.
    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_lookup_ignores_case() {
        let row = RawRow::new()
            .with("INST_ID", 1)
            .with("PhysicalReads", 12);
        assert_eq!(row.get("inst_id"), Some(&ColumnValue::Int(1)));
        assert_eq!(row.get("PHYSICALREADS"), Some(&ColumnValue::Int(12)));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn text_view_prints_integral_floats_without_fraction() {
        assert_eq!(ColumnValue::Float(1.0).as_text().as_deref(), Some("1"));
        assert_eq!(ColumnValue::Float(0.5).as_text().as_deref(), Some("0.5"));
        assert_eq!(ColumnValue::Int(7).as_text().as_deref(), Some("7"));
        assert_eq!(ColumnValue::Null.as_text(), None);
    }

    #[test]
    fn numeric_view_parses_text() {
        assert_eq!(ColumnValue::from("135").as_f64(), Some(135.0));
        assert_eq!(ColumnValue::from(" 0.25 ").as_f64(), Some(0.25));
        assert_eq!(ColumnValue::from("n/a").as_f64(), None);
        assert_eq!(ColumnValue::from(None::<i64>), ColumnValue::Null);
    }
}
