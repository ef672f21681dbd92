//! Child process execution for compile and run steps.
//!
//! Every step runs in its own process group. When the step ends, by exit or
//! by timeout, the whole group is killed so nothing it forked outlives it.
//! Output is read concurrently with the wait and only the first
//! `max_output_bytes` of each stream are kept.

use crate::driver::ProcessDriver;
use crate::error::ExecError;
use crate::workspace::Workspace;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::time::timeout;

/// Appended to a stream that exceeded the output cap.
pub(crate) const TRUNCATION_MARKER: &str = "\n... [output truncated]";

/// How long pipes are still read after the step's process group is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

const READ_CHUNK: usize = 8 * 1024;

/// Truncate a string to max bytes, preserving UTF-8 boundaries.
fn truncate_output(s: String, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = s[..end].to_string();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Read `reader` to EOF, keeping at most `limit` bytes.
///
/// Bytes past the limit are read and discarded so the writer never blocks
/// on a full pipe. Reading stops early once `stop` fires or its sender is
/// dropped.
async fn read_capped<R>(mut reader: R, limit: usize, mut stop: watch::Receiver<bool>) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        tokio::select! {
            biased;
            read = reader.read(&mut chunk) => match read {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let room = limit.saturating_sub(kept.len());
                    kept.extend_from_slice(&chunk[..n.min(room)]);
                }
            },
            _ = stop.changed() => break,
        }
    }
    kept
}

/// Process group led by a spawned step. Dropping it kills every member.
struct ProcessGroup {
    #[cfg_attr(not(unix), allow(dead_code))]
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn kill(&self) {
        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            if let Some(pgid) = self.pgid {
                match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
                    Ok(()) | Err(Errno::ESRCH) => {}
                    Err(e) => tracing::warn!(pgid, error = %e, "Failed to kill process group"),
                }
            }
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Captured result of one finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl StepOutput {
    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Outcome of the compile-then-run pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawOutcome {
    /// The compiler exited non-zero; nothing was run.
    CompileFailed {
        /// Compiler diagnostics.
        stderr: String,
    },
    /// The run step finished, whatever its exit code.
    Completed(StepOutput),
}

/// Runs driver commands as child processes under a per-step budget.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    step_timeout: Duration,
    max_output_bytes: usize,
}

impl ProcessRunner {
    /// Create a runner with the given per-step budget and output cap.
    pub fn new(step_timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            step_timeout,
            max_output_bytes,
        }
    }

    /// Budget applied to each step.
    pub fn step_timeout(&self) -> Duration {
        self.step_timeout
    }

    /// Compile (if the driver needs it) and run a staged workspace.
    ///
    /// The run step is skipped when compilation fails. Each step gets its
    /// own budget; exceeding either yields [`ExecError::Timeout`].
    pub async fn compile_and_run(
        &self,
        workspace: &Workspace,
        driver: &ProcessDriver,
    ) -> Result<RawOutcome, ExecError> {
        if let Some(argv) = driver.compile_command(workspace) {
            tracing::debug!(
                workspace_id = %workspace.id(),
                language = %driver.language,
                "Compiling"
            );
            let compiled = self.run_step(&argv, workspace.dir()).await?;
            if !compiled.success() {
                tracing::debug!(
                    workspace_id = %workspace.id(),
                    exit_code = ?compiled.exit_code,
                    "Compilation failed"
                );
                return Ok(RawOutcome::CompileFailed {
                    stderr: compiled.stderr,
                });
            }
        }

        let argv = driver.run_command(workspace);
        tracing::debug!(workspace_id = %workspace.id(), language = %driver.language, "Running");
        let output = self.run_step(&argv, workspace.dir()).await?;
        Ok(RawOutcome::Completed(output))
    }

    /// Run a single command in `cwd` with stdin closed.
    ///
    /// The step ends when its process exits or the budget runs out. Either
    /// way its process group is killed before returning.
    pub async fn run_step(&self, argv: &[String], cwd: &Path) -> Result<StepOutput, ExecError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ExecError::Internal("empty command line".into()))?;

        let start = Instant::now();
        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| {
            tracing::warn!(program = %program, error = %source, "Failed to spawn process");
            ExecError::Spawn {
                program: program.clone(),
                source,
            }
        })?;
        let group = ProcessGroup { pgid: child.id() };

        let (stdout_pipe, stderr_pipe) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => return Err(ExecError::Internal("child pipes not captured".into())),
        };
        // One spare byte lets truncation be detected after the read.
        let limit = self.max_output_bytes.saturating_add(1);
        let (stop_tx, stop_rx) = watch::channel(false);
        let stdout_task = tokio::spawn(read_capped(stdout_pipe, limit, stop_rx.clone()));
        let stderr_task = tokio::spawn(read_capped(stderr_pipe, limit, stop_rx));

        let status = match timeout(self.step_timeout, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                group.kill();
                let _ = child.start_kill();
                let _ = child.wait().await;
                tracing::warn!(
                    program = %program,
                    timeout_secs = self.step_timeout.as_secs_f64(),
                    "Step timed out, process group killed"
                );
                return Err(ExecError::Timeout {
                    budget: self.step_timeout,
                });
            }
        };

        // Background jobs still holding the pipes go with the group.
        group.kill();
        let status = status?;

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(DRAIN_GRACE).await;
            let _ = stop_tx.send(true);
        });
        let (stdout, stderr) = tokio::join!(stdout_task, stderr_task);
        stopper.abort();

        let step = StepOutput {
            exit_code: status.code(),
            stdout: truncate_output(
                String::from_utf8_lossy(&stdout.unwrap_or_default()).into_owned(),
                self.max_output_bytes,
            ),
            stderr: truncate_output(
                String::from_utf8_lossy(&stderr.unwrap_or_default()).into_owned(),
                self.max_output_bytes,
            ),
        };
        tracing::debug!(
            program = %program,
            exit_code = ?step.exit_code,
            stdout_len = step.stdout.len(),
            stderr_len = step.stderr.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Step completed"
        );
        tracing::trace!(stdout = %step.stdout, stderr = %step.stderr, "Step output");
        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn runner() -> ProcessRunner {
        ProcessRunner::new(Duration::from_secs(5), 1024 * 1024)
    }

    #[test]
    fn test_truncate_output_short() {
        assert_eq!(truncate_output("abc".into(), 10), "abc");
    }

    #[test]
    fn test_truncate_output_char_boundary() {
        let out = truncate_output("héllo".into(), 2);
        assert_eq!(out, "h\n... [output truncated]");
    }

    #[tokio::test]
    async fn test_run_step_captures_streams() {
        let dir = tempfile::tempdir().unwrap();
        let out = runner()
            .run_step(&sh("echo out; echo err >&2"), dir.path())
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_run_step_nonzero_exit_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = runner().run_step(&sh("exit 42"), dir.path()).await.unwrap();
        assert_eq!(out.exit_code, Some(42));
        assert!(!out.success());
    }

    #[tokio::test]
    async fn test_run_step_uses_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let out = runner().run_step(&sh("cat marker.txt"), dir.path()).await.unwrap();
        assert_eq!(out.stdout, "here");
    }

    #[tokio::test]
    async fn test_run_step_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(Duration::from_millis(200), 1024);
        let start = Instant::now();
        let err = runner.run_step(&sh("sleep 5"), dir.path()).await.unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_run_step_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let argv = vec!["kiln-no-such-program".to_string()];
        let err = runner().run_step(&argv, dir.path()).await.unwrap_err();
        assert!(matches!(err, ExecError::Spawn { ref program, .. } if program == "kiln-no-such-program"));
    }

    #[tokio::test]
    async fn test_run_step_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(Duration::from_secs(5), 4);
        let out = runner.run_step(&sh("printf abcdefgh"), dir.path()).await.unwrap();
        assert_eq!(out.stdout, "abcd\n... [output truncated]");
    }

    #[tokio::test]
    async fn test_run_step_caps_flooded_stream() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(Duration::from_secs(5), 16);
        let out = runner
            .run_step(&sh("head -c 5000000 /dev/zero | tr '\\0' x"), dir.path())
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, format!("{}{}", "x".repeat(16), TRUNCATION_MARKER));
    }

    #[tokio::test]
    async fn test_timeout_kills_background_processes() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("late.txt");
        let runner = ProcessRunner::new(Duration::from_millis(300), 1024);
        let script = format!(
            "(sleep 1; touch '{}') >/dev/null 2>&1 & sleep 10",
            marker.display()
        );
        let err = runner.run_step(&sh(&script), dir.path()).await.unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_exit_ends_step_despite_background_writer() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(Duration::from_secs(2), 1024);
        let start = Instant::now();
        let out = runner
            .run_step(&sh("sleep 3 &\necho hi"), dir.path())
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "hi\n");
        assert!(start.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_background_processes_do_not_outlive_step() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("late.txt");
        let script = format!(
            "(sleep 1; touch '{}') >/dev/null 2>&1 & echo done",
            marker.display()
        );
        let out = runner().run_step(&sh(&script), dir.path()).await.unwrap();
        assert_eq!(out.stdout, "done\n");

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_run_step_empty_argv() {
        let dir = tempfile::tempdir().unwrap();
        let err = runner().run_step(&[], dir.path()).await.unwrap_err();
        assert!(matches!(err, ExecError::Internal(_)));
    }
}
