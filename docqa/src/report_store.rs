use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::file_format::is_allowed_format;

/// One file from an upload batch. The bytes are shared so image references
/// can point at them without copying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub content: Arc<[u8]>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Reads a file from disk, keeping only its final path component as the name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Ok(Self::new(name, content))
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PersistOutcome {
    Written(PathBuf),
    /// Not a document type; kept in memory only.
    NotDocument,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileReport {
    pub name: String,
    pub outcome: PersistOutcome,
}

/// What happened to the working directory during one upload batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub removed: Vec<PathBuf>,
    pub remove_failures: Vec<(PathBuf, String)>,
    pub files: Vec<FileReport>,
}

impl PersistReport {
    pub fn written(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().filter_map(|f| match &f.outcome {
            PersistOutcome::Written(path) => Some(path.as_path()),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, PersistOutcome::Failed(_)))
    }

    pub fn is_clean(&self) -> bool {
        self.remove_failures.is_empty() && self.failures().next().is_none()
    }
}

/// Empties `working_dir` (creating it when missing) and writes every document
/// in `files` into it. Individual delete or write failures are recorded in the
/// report and do not stop the batch.
pub fn reset_and_persist<S: AsRef<str>>(
    working_dir: &Path,
    files: &[UploadedFile],
    document_exts: &[S],
) -> Result<PersistReport> {
    let mut report = PersistReport::default();

    if working_dir.exists() {
        for entry in fs::read_dir(working_dir)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(err) => {
                    warn!(dir = %working_dir.display(), error = %err, "unreadable directory entry");
                    continue;
                }
            };
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match removed {
                Ok(()) => report.removed.push(path),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to remove old report");
                    report.remove_failures.push((path, err.to_string()));
                }
            }
        }
    } else {
        fs::create_dir_all(working_dir)?;
    }

    for file in files {
        let outcome = if is_allowed_format(Some(file.name.as_str()), document_exts) {
            write_document(working_dir, file)
        } else {
            PersistOutcome::NotDocument
        };
        match &outcome {
            PersistOutcome::Written(path) => info!(path = %path.display(), bytes = file.len(), "stored report"),
            PersistOutcome::Failed(err) => warn!(name = %file.name, error = %err, "failed to store report"),
            PersistOutcome::NotDocument => {}
        }
        report.files.push(FileReport {
            name: file.name.clone(),
            outcome,
        });
    }

    Ok(report)
}

fn write_document(working_dir: &Path, file: &UploadedFile) -> PersistOutcome {
    // Never let an upload name escape the working directory.
    let Some(base) = Path::new(&file.name).file_name() else {
        return PersistOutcome::Failed(format!("invalid file name: {:?}", file.name));
    };
    let target = working_dir.join(base);
    match fs::write(&target, &file.content) {
        Ok(()) => PersistOutcome::Written(target),
        Err(err) => PersistOutcome::Failed(err.to_string()),
    }
}
