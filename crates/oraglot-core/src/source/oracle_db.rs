//! Oracle query source.
//!
//! Keeps a fixed number of sessions. The first one is opened (and pinged) by
//! [`OracleSource::connect`] so that connection problems are fatal before any
//! collector starts; the rest are opened on first use. Every statement checks
//! out a whole session, so concurrent collectors never share one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use oracle::sql_type::OracleType;
use oracle::{Connection, Connector, Privilege, Row, SqlValue};
use tracing::{debug, info};

use super::{ColumnValue, QueryError, QuerySource, RawRow};
use crate::config::{ConnectionParams, Role};

/// Oracle-backed [`QuerySource`] with a small session pool.
pub struct OracleSource {
    params: ConnectionParams,
    sessions: Vec<Mutex<Option<Connection>>>,
    next: AtomicUsize,
}

impl OracleSource {
    /// Opens and pings the first session.
    pub fn connect(params: ConnectionParams) -> Result<Self, QueryError> {
        let first = open_session(&params)?;
        first
            .ping()
            .map_err(|e| QueryError::Connection(format_oracle_error(&e)))?;
        info!(
            connect_string = %params.connect_string(),
            username = %params.username,
            max_sessions = params.max_sessions,
            "connected to Oracle"
        );

        let mut sessions = Vec::with_capacity(params.max_sessions.max(1));
        sessions.push(Mutex::new(Some(first)));
        while sessions.len() < params.max_sessions {
            sessions.push(Mutex::new(None));
        }

        Ok(Self {
            params,
            sessions,
            next: AtomicUsize::new(0),
        })
    }

    /// Takes a free session slot, or waits on one picked round-robin.
    fn checkout(&self) -> MutexGuard<'_, Option<Connection>> {
        for slot in &self.sessions {
            if let Ok(guard) = slot.try_lock() {
                return guard;
            }
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        self.sessions[idx]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl QuerySource for OracleSource {
    fn for_each_row(&self, sql: &str, on_row: &mut dyn FnMut(RawRow)) -> Result<usize, QueryError> {
        let mut slot = self.checkout();
        if slot.is_none() {
            debug!("opening additional Oracle session");
            *slot = Some(open_session(&self.params)?);
        }
        let Some(conn) = slot.as_ref() else {
            return Err(QueryError::Connection("no session available".to_string()));
        };

        let result = run_query(conn, sql, on_row);
        // A dead session is dropped so the next checkout reconnects.
        if matches!(result, Err(QueryError::Connection(_))) {
            *slot = None;
        }
        result
    }
}

fn run_query(
    conn: &Connection,
    sql: &str,
    on_row: &mut dyn FnMut(RawRow),
) -> Result<usize, QueryError> {
    let rows = conn.query(sql, &[]).map_err(|e| {
        let msg = format_oracle_error(&e);
        if is_lost_session(&msg) {
            QueryError::Connection(msg)
        } else {
            QueryError::Execute(msg)
        }
    })?;

    let mut count = 0;
    for row in rows {
        let row = row.map_err(|e| QueryError::Scan(format_oracle_error(&e)))?;
        on_row(convert_row(&row)?);
        count += 1;
    }
    Ok(count)
}

fn open_session(params: &ConnectionParams) -> Result<Connection, QueryError> {
    let mut connector = Connector::new(
        params.username.as_str(),
        params.password.as_str(),
        params.connect_string(),
    );
    match params.role {
        Role::SysDba => {
            connector.privilege(Privilege::Sysdba);
        }
        Role::SysOper => {
            connector.privilege(Privilege::Sysoper);
        }
        Role::Normal => {}
    }
    connector
        .connect()
        .map_err(|e| QueryError::Connection(format_oracle_error(&e)))
}

fn convert_row(row: &Row) -> Result<RawRow, QueryError> {
    let mut raw = RawRow::new();
    for (info, value) in row.column_info().iter().zip(row.sql_values()) {
        let value = convert_value(value).map_err(|e| {
            QueryError::Scan(format!("column {}: {}", info.name(), format_oracle_error(&e)))
        })?;
        raw.push(info.name(), value);
    }
    Ok(raw)
}

fn convert_value(value: &SqlValue) -> oracle::Result<ColumnValue> {
    if value.is_null()? {
        return Ok(ColumnValue::Null);
    }
    let converted = match value.oracle_type()? {
        OracleType::Int64 | OracleType::UInt64 => ColumnValue::Int(value.get::<i64>()?),
        OracleType::Number(_, _)
        | OracleType::Float(_)
        | OracleType::BinaryFloat
        | OracleType::BinaryDouble => ColumnValue::Float(value.get::<f64>()?),
        _ => ColumnValue::Text(value.get::<String>()?),
    };
    Ok(converted)
}

/// Formats an Oracle error for logs, keeping only the first line.
pub(crate) fn format_oracle_error(e: &oracle::Error) -> String {
    let msg = e.to_string();
    msg.lines().next().unwrap_or(&msg).trim().to_string()
}

/// ORA-03113/03114/03135 and DPI-1010/1080 mean the session is gone.
fn is_lost_session(msg: &str) -> bool {
    ["ORA-03113", "ORA-03114", "ORA-03135", "DPI-1010", "DPI-1080"]
        .iter()
        .any(|code| msg.contains(code))
}
