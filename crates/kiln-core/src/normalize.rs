//! Uniform result shape for every language and failure mode.

use crate::error::ExecError;
use crate::runner::{RawOutcome, TRUNCATION_MARKER};
use crate::sql::{QueryOutcome, SqlValue};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Reported on stdout when a SQL batch ends with a statement that returns
/// no rows.
pub const SQL_SUCCESS_MARKER: &str = "Query executed successfully.";

/// Captured output of one execution request.
///
/// An empty `stderr` means success. Compile failures, timeouts and internal
/// errors all end up in `stderr` with an empty `stdout`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    /// Result with the given output and no error.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Result with no output and the given error text.
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Downgrade an error into a result.
    pub fn from_error(err: &ExecError) -> Self {
        Self::failure(err.to_string())
    }

    /// Whether nothing was written to `stderr`.
    pub fn is_success(&self) -> bool {
        self.stderr.is_empty()
    }
}

impl From<RawOutcome> for ExecutionResult {
    fn from(outcome: RawOutcome) -> Self {
        match outcome {
            RawOutcome::CompileFailed { stderr } => Self::failure(stderr),
            RawOutcome::Completed(step) => Self {
                stdout: step.stdout,
                stderr: step.stderr,
            },
        }
    }
}

impl From<QueryOutcome> for ExecutionResult {
    fn from(outcome: QueryOutcome) -> Self {
        match outcome {
            QueryOutcome::Rows { rows, truncated } => {
                let mut out = render_rows(&rows);
                if truncated {
                    out.pop();
                    out.push_str(TRUNCATION_MARKER);
                }
                Self::success(out)
            }
            QueryOutcome::Done => Self::success(SQL_SUCCESS_MARKER),
        }
    }
}

/// Render rows as a list of tuples, e.g. `[(1, 'a'), (2, None)]`.
pub fn render_rows(rows: &[Vec<SqlValue>]) -> String {
    let mut out = String::from("[");
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        render_row(&mut out, row);
    }
    out.push(']');
    out
}

/// Render one row as a tuple.
pub(crate) fn render_row(out: &mut String, row: &[SqlValue]) {
    out.push('(');
    for (j, value) in row.iter().enumerate() {
        if j > 0 {
            out.push_str(", ");
        }
        render_value(out, value);
    }
    // single-element tuples keep their trailing comma
    if row.len() == 1 {
        out.push(',');
    }
    out.push(')');
}

fn render_value(out: &mut String, value: &SqlValue) {
    match value {
        SqlValue::Null => out.push_str("None"),
        SqlValue::Integer(i) => {
            let _ = write!(out, "{}", i);
        }
        SqlValue::Real(f) => {
            let _ = write!(out, "{:?}", f);
        }
        SqlValue::Text(s) => {
            out.push('\'');
            for c in s.chars() {
                match c {
                    '\\' => out.push_str("\\\\"),
                    '\'' => out.push_str("\\'"),
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\t' => out.push_str("\\t"),
                    c => out.push(c),
                }
            }
            out.push('\'');
        }
        SqlValue::Blob(bytes) => {
            out.push_str("b'");
            for &b in bytes {
                match b {
                    b'\\' => out.push_str("\\\\"),
                    b'\'' => out.push_str("\\'"),
                    0x20..=0x7e => out.push(b as char),
                    _ => {
                        let _ = write!(out, "\\x{:02x}", b);
                    }
                }
            }
            out.push('\'');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::StepOutput;
    use std::time::Duration;

    #[test]
    fn test_single_column_row() {
        let rows = vec![vec![SqlValue::Integer(1)]];
        assert_eq!(render_rows(&rows), "[(1,)]");
    }

    #[test]
    fn test_mixed_rows() {
        let rows = vec![
            vec![SqlValue::Integer(1), SqlValue::Text("a".into())],
            vec![SqlValue::Integer(2), SqlValue::Null],
        ];
        assert_eq!(render_rows(&rows), "[(1, 'a'), (2, None)]");
    }

    #[test]
    fn test_empty_rows() {
        assert_eq!(render_rows(&[]), "[]");
    }

    #[test]
    fn test_value_escaping() {
        let rows = vec![vec![
            SqlValue::Real(1.0),
            SqlValue::Text("it's\n".into()),
            SqlValue::Blob(vec![b'a', 0x00, b'\'']),
        ]];
        assert_eq!(render_rows(&rows), r"[(1.0, 'it\'s\n', b'a\x00\'')]");
    }

    #[test]
    fn test_query_done_marker() {
        let result = ExecutionResult::from(QueryOutcome::Done);
        assert_eq!(result, ExecutionResult::success("Query executed successfully."));
    }

    #[test]
    fn test_truncated_rows_carry_marker() {
        let result = ExecutionResult::from(QueryOutcome::Rows {
            rows: vec![vec![SqlValue::Integer(1)], vec![SqlValue::Integer(2)]],
            truncated: true,
        });
        assert_eq!(result.stdout, "[(1,), (2,)\n... [output truncated]");
        assert!(result.is_success());
    }

    #[test]
    fn test_compile_failure_has_no_output() {
        let result = ExecutionResult::from(RawOutcome::CompileFailed {
            stderr: "error: expected ';'".into(),
        });
        assert_eq!(result.stdout, "");
        assert_eq!(result.stderr, "error: expected ';'");
        assert!(!result.is_success());
    }

    #[test]
    fn test_completed_passes_through_nonzero_exit() {
        let result = ExecutionResult::from(RawOutcome::Completed(StepOutput {
            exit_code: Some(1),
            stdout: "partial\n".into(),
            stderr: "Traceback".into(),
        }));
        assert_eq!(result.stdout, "partial\n");
        assert_eq!(result.stderr, "Traceback");
    }

    #[test]
    fn test_timeout_downgrade() {
        let result = ExecutionResult::from_error(&ExecError::Timeout {
            budget: Duration::from_secs(10),
        });
        assert_eq!(result, ExecutionResult::failure("Execution timed out."));
    }
}
