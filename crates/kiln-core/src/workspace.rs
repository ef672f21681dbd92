//! Per-request scratch workspaces.
//!
//! Every process-driven request gets its own directory under the scratch
//! root, named by a fresh UUID. Everything the request writes (source file,
//! compiled artifact, compiler side outputs) lands inside that directory, so
//! releasing the workspace is a single recursive removal.

use crate::driver::ProcessDriver;
use crate::error::ExecError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Extension used for compiled artifacts.
const ARTIFACT_EXTENSION: &str = ".out";

/// Unique identifier for a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkspaceId(Uuid);

impl WorkspaceId {
    /// Create a new random workspace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for WorkspaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A staged workspace owning a scratch directory.
///
/// Call [`Workspace::release`] when done. A workspace that is dropped
/// without being released removes its directory synchronously, so early
/// returns and panics never leak files.
#[derive(Debug)]
pub struct Workspace {
    id: WorkspaceId,
    dir: PathBuf,
    source_path: PathBuf,
    artifact_path: PathBuf,
    created_at: DateTime<Utc>,
    released: bool,
}

impl Workspace {
    /// Stage `code` for `driver` under `root`.
    ///
    /// The driver's source transform runs before anything touches the
    /// filesystem; a failing transform leaves no trace.
    pub async fn stage(root: &Path, code: &str, driver: &ProcessDriver) -> Result<Self, ExecError> {
        let source = driver.transform.apply(driver.language, code)?;

        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        tokio::fs::create_dir_all(&root).await?;

        let id = WorkspaceId::new();
        let dir = root.join(id.to_string());
        tokio::fs::create_dir(&dir).await.map_err(|e| {
            tracing::error!(workspace_id = %id, error = %e, "Failed to create workspace directory");
            e
        })?;

        let stem = match driver.source_stem {
            Some(stem) => stem.to_string(),
            None => id.to_string(),
        };
        let workspace = Self {
            id,
            source_path: dir.join(format!("{}{}", stem, driver.extension)),
            artifact_path: dir.join(format!("{}{}", id, ARTIFACT_EXTENSION)),
            dir,
            created_at: Utc::now(),
            released: false,
        };

        // On failure `workspace` drops here and removes the directory.
        tokio::fs::write(&workspace.source_path, source.as_bytes()).await?;

        tracing::debug!(
            workspace_id = %workspace.id,
            language = %driver.language,
            path = %workspace.source_path.display(),
            bytes = source.len(),
            "Workspace staged"
        );
        Ok(workspace)
    }

    /// Get the workspace ID.
    pub fn id(&self) -> WorkspaceId {
        self.id
    }

    /// Directory holding every file of this workspace.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the staged source file.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Path a compile step writes its artifact to.
    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// Get the staging timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Remove the workspace directory and everything in it.
    pub async fn release(mut self) -> Result<(), ExecError> {
        self.released = true;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                tracing::debug!(workspace_id = %self.id, "Workspace released");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::warn!(workspace_id = %self.id, error = %e, "Failed to release workspace");
                Err(e.into())
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => tracing::debug!(workspace_id = %self.id, "Workspace removed on drop"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(workspace_id = %self.id, error = %e, "Failed to remove workspace on drop")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SourceTransform;
    use crate::language::Language;

    fn python_driver() -> ProcessDriver {
        ProcessDriver {
            language: Language::Python,
            extension: ".py",
            source_stem: None,
            compile: None,
            run: &["python3", "{source}"],
            transform: SourceTransform::Identity,
        }
    }

    fn java_driver() -> ProcessDriver {
        ProcessDriver {
            language: Language::Java,
            extension: ".java",
            source_stem: Some("Main"),
            compile: Some(&["javac", "{source}"]),
            run: &["java", "-cp", "{dir}", "Main"],
            transform: SourceTransform::JavaMainClass,
        }
    }

    fn entries(path: &Path) -> usize {
        std::fs::read_dir(path).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_stage_writes_source() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::stage(root.path(), "print('hi')", &python_driver())
            .await
            .unwrap();

        let id = ws.id().to_string();
        assert_eq!(ws.dir(), root.path().join(&id));
        assert_eq!(ws.source_path(), ws.dir().join(format!("{}.py", id)));
        assert_eq!(ws.artifact_path(), ws.dir().join(format!("{}.out", id)));
        let written = std::fs::read_to_string(ws.source_path()).unwrap();
        assert_eq!(written, "print('hi')");

        ws.release().await.unwrap();
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_stage_applies_transform_and_stem() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::stage(root.path(), "public class Demo {}", &java_driver())
            .await
            .unwrap();

        assert!(ws.source_path().ends_with("Main.java"));
        let written = std::fs::read_to_string(ws.source_path()).unwrap();
        assert_eq!(written, "public class Main {}");
        ws.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_transform_creates_nothing() {
        let root = tempfile::tempdir().unwrap();
        let scratch = root.path().join("scratch");
        let err = Workspace::stage(&scratch, "class Hidden {}", &java_driver())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::MissingEntryPoint { .. }));
        assert!(!scratch.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::stage(root.path(), "print(1)", &python_driver())
            .await
            .unwrap();
        std::fs::write(ws.artifact_path(), b"binary").unwrap();
        let dir = ws.dir().to_path_buf();
        assert!(dir.exists());

        drop(ws);
        assert!(!dir.exists());
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_workspaces_are_disjoint() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::stage(root.path(), "print(1)", &python_driver())
            .await
            .unwrap();
        let b = Workspace::stage(root.path(), "print(2)", &python_driver())
            .await
            .unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.dir(), b.dir());
        assert_eq!(entries(root.path()), 2);

        a.release().await.unwrap();
        b.release().await.unwrap();
        assert_eq!(entries(root.path()), 0);
    }
}
