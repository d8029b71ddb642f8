//! The document set: one file per uploaded document in a single directory.
//!
//! This directory is the source of truth for what the index should contain.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{RagError, Result};

/// Check that `name` is a plain file name.
///
/// Rejects empty names, path separators, `.`/`..`, NUL bytes and names with
/// a leading dot (reserved for in-progress writes).
pub fn validate_file_name(name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name.contains(['/', '\\', '\0'])
        || name.starts_with('.')
        || name == "..";
    if invalid {
        return Err(RagError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

/// Documents stored under one directory, addressed by file name.
#[derive(Debug, Clone)]
pub struct DocumentSet {
    dir: PathBuf,
}

impl DocumentSet {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document called `name`.
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        validate_file_name(name)?;
        Ok(self.dir.join(name))
    }

    /// File names in the set, sorted. A missing directory is an empty set.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(RagError::storage(&self.dir, err)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|err| RagError::storage(&self.dir, err))? {
            let is_file = entry.file_type().await.map(|kind| kind.is_file()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_file && validate_file_name(&name).is_ok() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Paths of every document, in [`list`](Self::list) order.
    pub async fn paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self.list().await?.into_iter().map(|name| self.dir.join(name)).collect())
    }

    pub async fn contains(&self, name: &str) -> bool {
        match self.path_of(name) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Store `bytes` as `name`, replacing any existing document of that name.
    ///
    /// The write goes through a temporary file and a rename. Returns whether
    /// a document was replaced.
    pub async fn write(&self, name: &str, bytes: &[u8]) -> Result<bool> {
        let path = self.path_of(name)?;
        let replaced = tokio::fs::try_exists(&path).await.unwrap_or(false);

        tokio::fs::create_dir_all(&self.dir).await.map_err(|err| RagError::storage(&self.dir, err))?;
        let tmp = self.dir.join(format!(".{name}.tmp"));
        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp, &path).await
        }
        .await;
        if let Err(err) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(RagError::storage(&path, err));
        }

        debug!(name, bytes = bytes.len(), replaced, "stored document");
        Ok(replaced)
    }

    /// Copy the file at `source` into the set under its own file name.
    ///
    /// Returns the stored name and whether a document was replaced.
    pub async fn add_file(&self, source: &Path) -> Result<(String, bool)> {
        let name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| RagError::InvalidFileName(source.display().to_string()))?;
        validate_file_name(&name)?;
        let bytes = tokio::fs::read(source).await.map_err(|err| RagError::storage(source, err))?;
        let replaced = self.write(&name, &bytes).await?;
        Ok((name, replaced))
    }

    /// Delete the document called `name`. Returns whether it existed.
    pub async fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path_of(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(name, "removed document");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(RagError::storage(&path, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_paths_and_dot_names() {
        for name in ["", " ", "..", ".", "a/b", "a\\b", ".hidden"] {
            assert!(validate_file_name(name).is_err(), "{name:?} should be rejected");
        }
        assert!(validate_file_name("report v2.pdf").is_ok());
    }

    #[tokio::test]
    async fn write_list_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let set = DocumentSet::open(dir.path().join("documents"));
        assert!(set.list().await.unwrap().is_empty());

        assert!(!set.write("b.txt", b"b").await.unwrap());
        assert!(!set.write("a.txt", b"a").await.unwrap());
        assert!(set.write("b.txt", b"bb").await.unwrap());
        assert_eq!(set.list().await.unwrap(), vec!["a.txt", "b.txt"]);
        assert_eq!(std::fs::read(set.dir().join("b.txt")).unwrap(), b"bb");

        assert!(set.remove("a.txt").await.unwrap());
        assert!(!set.remove("a.txt").await.unwrap());
        assert_eq!(set.list().await.unwrap(), vec!["b.txt"]);
    }

    #[tokio::test]
    async fn add_file_copies_under_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let upload = dir.path().join("notes.txt");
        std::fs::write(&upload, "hello").unwrap();

        let set = DocumentSet::open(dir.path().join("documents"));
        let (name, replaced) = set.add_file(&upload).await.unwrap();
        assert_eq!(name, "notes.txt");
        assert!(!replaced);
        assert!(set.contains("notes.txt").await);
    }
}
