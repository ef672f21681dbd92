//! Language drivers.
//!
//! A driver describes how source text for one language is materialized,
//! optionally compiled, and run. Drivers are plain data built once at
//! startup and shared read-only between requests.
//!
//! Process drivers describe their commands as argv templates. The
//! following placeholders are expanded against the staged workspace:
//!
//! - `{source}` - absolute path of the source file
//! - `{artifact}` - absolute path of the compiled artifact
//! - `{dir}` - the workspace directory

use crate::error::ExecError;
use crate::language::Language;
use crate::sql::QueryOutcome;
use crate::workspace::Workspace;
use async_trait::async_trait;
use regex::Regex;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Canonical class name Java sources are rewritten to.
pub const JAVA_MAIN_CLASS: &str = "Main";

/// Rewrite applied to source text before it is written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTransform {
    /// Write the code unchanged.
    Identity,
    /// Rename the first public class to [`JAVA_MAIN_CLASS`].
    ///
    /// The run command depends on this name, so a source without a public
    /// class is rejected instead of being written unchanged.
    ///
    /// The match is textual: a `public class X` inside a comment or string
    /// literal counts, and other references to the old name (`new X()`,
    /// `X.helper()`) are left as they are.
    JavaMainClass,
}

fn java_public_class() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\bpublic\s+((?:(?:final|abstract|strictfp)\s+)*)class\s+[A-Za-z_$][A-Za-z0-9_$]*")
            .expect("java class pattern is valid")
    })
}

impl SourceTransform {
    /// Apply the transform to `code`.
    pub fn apply<'a>(&self, language: Language, code: &'a str) -> Result<Cow<'a, str>, ExecError> {
        match self {
            Self::Identity => Ok(Cow::Borrowed(code)),
            Self::JavaMainClass => {
                let pattern = java_public_class();
                if !pattern.is_match(code) {
                    return Err(ExecError::MissingEntryPoint {
                        language,
                        expected: "a public class",
                    });
                }
                let replacement = format!("public ${{1}}class {}", JAVA_MAIN_CLASS);
                Ok(pattern.replace(code, replacement.as_str()))
            }
        }
    }
}

/// Driver for languages executed as external processes.
#[derive(Debug, Clone)]
pub struct ProcessDriver {
    /// Language this driver runs.
    pub language: Language,
    /// Source file extension, including the leading dot.
    pub extension: &'static str,
    /// Fixed source file stem. Defaults to the workspace id.
    pub source_stem: Option<&'static str>,
    /// Compile argv template, if the language is compiled.
    pub compile: Option<&'static [&'static str]>,
    /// Run argv template.
    pub run: &'static [&'static str],
    /// Transform applied before staging.
    pub transform: SourceTransform,
}

impl ProcessDriver {
    /// Whether a compile step precedes the run step.
    pub fn requires_compilation(&self) -> bool {
        self.compile.is_some()
    }

    /// Expanded compile argv for a staged workspace.
    pub fn compile_command(&self, workspace: &Workspace) -> Option<Vec<String>> {
        self.compile.map(|template| expand(template, workspace))
    }

    /// Expanded run argv for a staged workspace.
    pub fn run_command(&self, workspace: &Workspace) -> Vec<String> {
        expand(self.run, workspace)
    }

    /// Host programs this driver needs on `PATH`.
    ///
    /// Commands whose program is a placeholder (a compiled artifact) are
    /// skipped.
    pub fn programs(&self) -> Vec<&'static str> {
        self.compile
            .into_iter()
            .chain(std::iter::once(self.run))
            .filter_map(|argv| argv.first().copied())
            .filter(|program| !program.starts_with('{'))
            .collect()
    }
}

fn expand(template: &[&str], workspace: &Workspace) -> Vec<String> {
    let source = workspace.source_path().to_string_lossy();
    let artifact = workspace.artifact_path().to_string_lossy();
    let dir = workspace.dir().to_string_lossy();
    template
        .iter()
        .map(|arg| {
            arg.replace("{source}", &source)
                .replace("{artifact}", &artifact)
                .replace("{dir}", &dir)
        })
        .collect()
}

/// An in-process interpreter that runs code without a workspace.
#[async_trait]
pub trait EmbeddedEngine: Send + Sync + fmt::Debug {
    /// Execute `code`, giving up once `budget` has elapsed.
    ///
    /// Returned rows must render within `max_output_bytes`; excess rows are
    /// dropped and the outcome marked truncated.
    async fn execute(
        &self,
        code: &str,
        budget: Duration,
        max_output_bytes: usize,
    ) -> Result<QueryOutcome, ExecError>;

    /// Short engine name for logging.
    fn name(&self) -> &str;
}

/// How a language is executed.
#[derive(Debug, Clone)]
pub enum Driver {
    /// Stage to disk, optionally compile, then run a child process.
    Process(ProcessDriver),
    /// Hand the code to an in-process engine.
    Embedded(Arc<dyn EmbeddedEngine>),
}
