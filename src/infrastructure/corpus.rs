use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::domain::{Document, DomainError};

/// Reads every file under `root` whose extension is in `extensions` and
/// returns one trimmed document per file, ordered by path. A document's id is
/// its path relative to `root` with `/` separators.
#[instrument(skip_all, fields(root = %root.as_ref().display()))]
pub async fn load_corpus(
    root: impl AsRef<Path>,
    extensions: &[String],
) -> Result<Vec<Document>, DomainError> {
    let root = root.as_ref();
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
            DomainError::invalid_config(format!("cannot read corpus dir {}: {e}", dir.display()))
        })?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DomainError::internal(e.to_string()))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| DomainError::internal(e.to_string()))?;

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && has_extension(&path, extensions) {
                files.push(path);
            }
        }
    }

    files.sort();

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            DomainError::internal(format!("cannot read {}: {e}", path.display()))
        })?;
        let id = source_id(root, &path);
        debug!(source_id = %id, chars = content.chars().count(), "loaded document");
        documents.push(Document::new(id, content.trim()));
    }

    info!(document_count = documents.len(), "corpus loaded");
    Ok(documents)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}

fn source_id(root: &Path, path: &Path) -> String {
    let relative: PathBuf = path.strip_prefix(root).unwrap_or(path).to_path_buf();
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
