//! Embedded SQL engine.
//!
//! Each request gets a fresh in-memory SQLite database that lives only for
//! the duration of the batch. Statements are split by SQLite itself, so
//! semicolons inside literals, comments and trigger bodies are handled the
//! way the database would.

use crate::driver::EmbeddedEngine;
use crate::error::ExecError;
use crate::normalize::render_row;
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Batch, Connection};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

const INTERRUPT_RETRY: Duration = Duration::from_millis(10);

/// A single value from a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Integer(i),
            ValueRef::Real(f) => Self::Real(f),
            ValueRef::Text(bytes) => Self::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Self::Blob(bytes.to_vec()),
        }
    }
}

/// What the last statement of a batch produced.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The last statement was row-producing.
    Rows {
        /// Leading rows whose rendering fits the output cap.
        rows: Vec<Vec<SqlValue>>,
        /// Whether rows were dropped to stay under the cap.
        truncated: bool,
    },
    /// The last statement produced no result columns.
    Done,
}

impl QueryOutcome {
    /// Complete (untruncated) rows.
    pub fn rows(rows: Vec<Vec<SqlValue>>) -> Self {
        Self::Rows {
            rows,
            truncated: false,
        }
    }
}

/// Execute every statement of `sql` in order on `conn`.
///
/// Rows of intermediate queries are read and discarded; only the last
/// statement decides the outcome. Rows of that statement are kept only
/// while their rendering stays within `max_output_bytes`; the rest are
/// still stepped so statements like `INSERT ... RETURNING` finish.
///
/// `cancelled` is checked before each statement starts.
pub fn run_batch(
    conn: &Connection,
    sql: &str,
    max_output_bytes: usize,
    cancelled: &AtomicBool,
) -> Result<QueryOutcome, ExecError> {
    let mut batch = Batch::new(conn, sql);
    let mut outcome = QueryOutcome::Done;
    let mut statements = 0usize;

    loop {
        if cancelled.load(Ordering::Relaxed) {
            return Err(ExecError::Query("interrupted".into()));
        }
        let Some(mut stmt) = batch.next()? else {
            break;
        };
        statements += 1;
        let columns = stmt.column_count();
        if columns == 0 {
            stmt.execute([])?;
            outcome = QueryOutcome::Done;
            continue;
        }

        let mut rows = stmt.query([])?;
        let mut collected = Vec::new();
        let mut truncated = false;
        // "[" and "]"
        let mut rendered = 2usize;
        let mut line = String::new();
        while let Some(row) = rows.next()? {
            if truncated {
                continue;
            }
            let mut values = Vec::with_capacity(columns);
            for idx in 0..columns {
                values.push(SqlValue::from(row.get_ref(idx)?));
            }
            line.clear();
            render_row(&mut line, &values);
            let separator = if collected.is_empty() { 0 } else { 2 };
            rendered += separator + line.len();
            if rendered > max_output_bytes {
                truncated = true;
                continue;
            }
            collected.push(values);
        }
        outcome = QueryOutcome::Rows {
            rows: collected,
            truncated,
        };
    }

    tracing::trace!(statements, "SQL batch finished");
    Ok(outcome)
}

/// [`EmbeddedEngine`] backed by an in-memory SQLite database.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteEngine;

impl SqliteEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmbeddedEngine for SqliteEngine {
    async fn execute(
        &self,
        code: &str,
        budget: Duration,
        max_output_bytes: usize,
    ) -> Result<QueryOutcome, ExecError> {
        let start = Instant::now();
        let conn = Connection::open_in_memory()?;
        let interrupt = conn.get_interrupt_handle();
        let sql = code.to_owned();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let mut task = tokio::task::spawn_blocking(move || {
            run_batch(&conn, &sql, max_output_bytes, &flag)
        });
        let outcome = match timeout(budget, &mut task).await {
            Ok(joined) => joined?,
            Err(_) => {
                cancelled.store(true, Ordering::Relaxed);
                // An interrupt landing between two statements is lost, so
                // keep sending until the blocking task gives up.
                tokio::spawn(async move {
                    while !task.is_finished() {
                        interrupt.interrupt();
                        tokio::time::sleep(INTERRUPT_RETRY).await;
                    }
                });
                tracing::warn!(
                    timeout_secs = budget.as_secs_f64(),
                    "SQL batch timed out, interrupted"
                );
                return Err(ExecError::Timeout { budget });
            }
        };

        tracing::debug!(
            engine = self.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "SQL batch executed"
        );
        outcome
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
