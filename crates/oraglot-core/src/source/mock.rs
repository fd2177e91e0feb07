//! In-memory query source for testing collectors without a database.
//!
//! Expectations are matched by substring against the executed SQL, in the
//! order they were registered. Statements with no matching expectation fail
//! with [`QueryError::Execute`].

use std::sync::Mutex;

use super::{QueryError, QuerySource, RawRow};

#[derive(Debug, Clone)]
enum MockOutcome {
    /// Deliver rows, then optionally fail with a scan error.
    Rows {
        rows: Vec<RawRow>,
        scan_error: Option<QueryError>,
    },
    /// Fail before delivering any row.
    Fail(QueryError),
}

#[derive(Debug, Clone)]
struct Expectation {
    pattern: String,
    outcome: MockOutcome,
}

/// Scripted [`QuerySource`] for tests.
#[derive(Debug, Default)]
pub struct MockSource {
    expectations: Vec<Expectation>,
    executed: Mutex<Vec<String>>,
}

impl MockSource {
    /// Creates a source with no expectations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers statements containing `pattern` with `rows`.
    pub fn with_rows(mut self, pattern: impl Into<String>, rows: Vec<RawRow>) -> Self {
        self.expectations.push(Expectation {
            pattern: pattern.into(),
            outcome: MockOutcome::Rows {
                rows,
                scan_error: None,
            },
        });
        self
    }

    /// Fails statements containing `pattern` with `error`.
    pub fn with_failure(mut self, pattern: impl Into<String>, error: QueryError) -> Self {
        self.expectations.push(Expectation {
            pattern: pattern.into(),
            outcome: MockOutcome::Fail(error),
        });
        self
    }

    /// Delivers `rows` for statements containing `pattern`, then fails with a
    /// scan error carrying `message`.
    pub fn with_scan_failure(
        mut self,
        pattern: impl Into<String>,
        rows: Vec<RawRow>,
        message: impl Into<String>,
    ) -> Self {
        self.expectations.push(Expectation {
            pattern: pattern.into(),
            outcome: MockOutcome::Rows {
                rows,
                scan_error: Some(QueryError::Scan(message.into())),
            },
        });
        self
    }

    /// Statements executed so far, in call order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Patterns that no executed statement matched.
    pub fn unmet_expectations(&self) -> Vec<String> {
        let executed = self.executed();
        self.expectations
            .iter()
            .filter(|e| !executed.iter().any(|sql| sql.contains(&e.pattern)))
            .map(|e| e.pattern.clone())
            .collect()
    }
}

impl QuerySource for MockSource {
    fn for_each_row(&self, sql: &str, on_row: &mut dyn FnMut(RawRow)) -> Result<usize, QueryError> {
        self.executed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(sql.to_string());

        let Some(expectation) = self.expectations.iter().find(|e| sql.contains(&e.pattern)) else {
            return Err(QueryError::Execute(format!(
                "unexpected statement: {}",
                sql.split_whitespace().collect::<Vec<_>>().join(" ")
            )));
        };

        match &expectation.outcome {
            MockOutcome::Fail(error) => Err(error.clone()),
            MockOutcome::Rows { rows, scan_error } => {
                for row in rows {
                    on_row(row.clone());
                }
                match scan_error {
                    Some(error) => Err(error.clone()),
                    None => Ok(rows.len()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(source: &MockSource, sql: &str) -> (Vec<RawRow>, Result<usize, QueryError>) {
        let mut rows = Vec::new();
        let result = source.for_each_row(sql, &mut |row| rows.push(row));
        (rows, result)
    }

    #[test]
    fn matches_by_substring() {
        let source = MockSource::new().with_rows("v$pgastat", vec![RawRow::new().with("NAME", "x")]);
        let (rows, result) = collect(&source, "SELECT INST_ID, NAME, VALUE FROM gv$pgastat");
        assert_eq!(result, Ok(1));
        assert_eq!(rows.len(), 1);
        assert!(source.unmet_expectations().is_empty());
    }

    #[test]
    fn unexpected_statement_fails() {
        let source = MockSource::new().with_rows("gv$pgastat", Vec::new());
        let (rows, result) = collect(&source, "SELECT 1 FROM dual");
        assert!(rows.is_empty());
        assert!(matches!(result, Err(QueryError::Execute(_))));
        assert_eq!(source.unmet_expectations(), vec!["gv$pgastat".to_string()]);
    }

    #[test]
    fn scan_failure_after_rows() {
        let source = MockSource::new().with_scan_failure(
            "dual",
            vec![RawRow::new().with("A", 1), RawRow::new().with("A", 2)],
            "ORA-01722: invalid number",
        );
        let (rows, result) = collect(&source, "SELECT A FROM dual");
        assert_eq!(rows.len(), 2);
        assert_eq!(
            result,
            Err(QueryError::Scan("ORA-01722: invalid number".to_string()))
        );
        assert_eq!(source.executed(), vec!["SELECT A FROM dual".to_string()]);
    }
}
