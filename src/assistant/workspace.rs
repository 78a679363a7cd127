use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use tokio::fs;
use tracing::info;

use super::error::{AssistantError, Result};
use crate::shared::models::FileEntry;

/// File access confined to a single root directory. Every path is resolved
/// against the root and rejected if it would land outside of it.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Creates the directory if needed and pins the canonical root.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let root = std::fs::canonicalize(dir)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let requested = path.trim();
        let requested_path = Path::new(requested);

        let relative = if requested_path.is_absolute() {
            requested_path
                .strip_prefix(&self.root)
                .map(Path::to_path_buf)
                .map_err(|_| AssistantError::PathEscape(requested.to_string()))?
        } else {
            requested_path.to_path_buf()
        };

        let mut full = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => full.push(segment),
                Component::CurDir => {}
                Component::ParentDir => {
                    if full == self.root {
                        return Err(AssistantError::PathEscape(requested.to_string()));
                    }
                    full.pop();
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(AssistantError::PathEscape(requested.to_string()));
                }
            }
        }

        self.ensure_contained(&full, requested)?;
        Ok(full)
    }

    // Lexical resolution cannot see symlinks; the deepest existing ancestor
    // has to canonicalize to somewhere under the root as well.
    fn ensure_contained(&self, full: &Path, requested: &str) -> Result<()> {
        let mut probe = Some(full);
        while let Some(candidate) = probe {
            if std::fs::symlink_metadata(candidate).is_ok() {
                let real = std::fs::canonicalize(candidate)
                    .map_err(|_| AssistantError::PathEscape(requested.to_string()))?;
                if !real.starts_with(&self.root) {
                    return Err(AssistantError::PathEscape(requested.to_string()));
                }
                return Ok(());
            }
            probe = candidate.parent();
        }
        Ok(())
    }

    /// Writes `content`, creating intermediate directories. Returns the resolved path.
    pub async fn write(&self, path: &str, content: &str) -> Result<PathBuf> {
        let start = Instant::now();
        info!(tool = "write_file", %path, len = content.len(), "tool start");
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, content).await?;
        info!(
            tool = "write_file",
            path = %full.display(),
            bytes = content.len(),
            took_ms = start.elapsed().as_millis() as u64,
            "tool end"
        );
        Ok(full)
    }

    pub async fn read(&self, path: &str) -> Result<String> {
        info!(tool = "read_file", %path, "tool start");
        let full = self.resolve(path)?;
        let content = fs::read_to_string(&full).await?;
        info!(tool = "read_file", path = %full.display(), bytes = content.len(), "tool end");
        Ok(content)
    }

    pub async fn list(&self, dir: &str) -> Result<Vec<FileEntry>> {
        info!(tool = "list_files", %dir, "tool start");
        let full = self.resolve(dir)?;
        let mut entries = fs::read_dir(&full).await?;
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let is_directory = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            out.push(FileEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                is_directory,
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        info!(tool = "list_files", path = %full.display(), entries = out.len(), "tool end");
        Ok(out)
    }
}
