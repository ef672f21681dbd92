//! # kiln-core
//!
//! Execution orchestration layer for Kiln.
//!
//! Given source text and a language name, kiln-core stages the code into a
//! per-request scratch workspace, compiles it when the language needs it,
//! runs it under a wall-clock budget and returns captured output in a single
//! uniform shape. SQL is the exception: it runs in an embedded in-memory
//! SQLite database and never touches the filesystem.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       kiln-core                          │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌─────────────────┐     ┌──────────────────────────┐   │
//! │  │    Executor     │────▶│  DriverRegistry          │   │
//! │  │   - execute()   │     │  HashMap<Language,Driver>│   │
//! │  └─────────────────┘     └──────────────────────────┘   │
//! │           │                                              │
//! │     ┌─────┴──────────────┐                               │
//! │     ▼                    ▼                               │
//! │  ┌─────────────────┐  ┌──────────────────────────┐      │
//! │  │   Workspace     │  │  EmbeddedEngine (SQLite) │      │
//! │  │  - stage()      │  │  - execute()             │      │
//! │  │  - release()    │  └──────────────────────────┘      │
//! │  └─────────────────┘             │                       │
//! │           │                      │                       │
//! │           ▼                      │                       │
//! │  ┌─────────────────┐             │                       │
//! │  │  ProcessRunner  │             │                       │
//! │  │ - compile_and_  │             │                       │
//! │  │   run()         │             │                       │
//! │  └─────────────────┘             │                       │
//! │           │                      ▼                       │
//! │           └──────────▶ ExecutionResult {stdout, stderr}  │
//! │                                                          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use kiln_core::{ExecutionRequest, Executor, ExecutorConfig};
//!
//! # async fn example() -> kiln_core::Result<()> {
//! let executor = Executor::new(ExecutorConfig::default());
//!
//! let result = executor
//!     .execute(&ExecutionRequest::new("print('Hello!')", "python"))
//!     .await?;
//! println!("stdout: {}", result.stdout);
//! println!("stderr: {}", result.stderr);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Driver Table**: one entry per language; adding a language never touches the pipeline
//! - **Scoped Workspaces**: every artifact is removed on every exit path
//! - **Independent Budgets**: compile and run each get their own timeout
//! - **Embedded SQL**: statement batches run in a throwaway in-memory database

mod config;
mod driver;
mod error;
mod executor;
mod language;
mod normalize;
mod registry;
mod runner;
mod sql;
mod workspace;

pub use config::{
    ExecutorConfig, ExecutorConfigBuilder, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_STEP_TIMEOUT,
};
pub use driver::{Driver, EmbeddedEngine, ProcessDriver, SourceTransform, JAVA_MAIN_CLASS};
pub use error::{ExecError, Result};
pub use executor::{ExecutionRequest, Executor};
pub use language::Language;
pub use normalize::{render_rows, ExecutionResult, SQL_SUCCESS_MARKER};
pub use registry::{on_path, DriverRegistry};
pub use runner::{ProcessRunner, RawOutcome, StepOutput};
pub use sql::{run_batch, QueryOutcome, SqlValue, SqliteEngine};
pub use workspace::{Workspace, WorkspaceId};
