//! Filesystem consent store
//!
//! One JSON document per storage key: `<data_dir>/<key>.json`.

use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::domain::result::{Error, Result};
use crate::domain::Requisition;
use crate::ports::{ConsentStore, LoadOutcome};

/// Requisition files under a data directory
#[derive(Debug, Clone)]
pub struct FileConsentStore {
    data_dir: PathBuf,
    override_name: Option<String>,
}

impl FileConsentStore {
    /// `override_name`, when set and non-empty, names the file for every bank id.
    pub fn new(data_dir: impl Into<PathBuf>, override_name: Option<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            override_name: override_name.filter(|name| !name.is_empty()),
        }
    }

    /// Clean path of the requisition file for `bank_id`
    ///
    /// Keys that are not a plain file-name component are rejected rather than
    /// rewritten, so two bank ids can never share one file.
    pub fn path_for(&self, bank_id: &str) -> Result<PathBuf> {
        let key = self.key_for(bank_id);
        check_key(&key)?;
        Ok(clean_path(&self.data_dir.join(format!("{}.json", key))))
    }
}

#[async_trait]
impl ConsentStore for FileConsentStore {
    fn key_for(&self, bank_id: &str) -> String {
        self.override_name.as_deref().unwrap_or(bank_id).to_string()
    }

    async fn load(&self, bank_id: &str) -> Result<LoadOutcome> {
        let path = self.path_for(bank_id)?;
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LoadOutcome::Absent),
            Err(e) => return Err(Error::Io(e)),
        };

        Ok(match serde_json::from_slice::<Requisition>(&content) {
            Ok(requisition) => LoadOutcome::Found(requisition),
            Err(e) => LoadOutcome::Corrupt(format!("{}: {}", path.display(), e)),
        })
    }

    async fn save(&self, bank_id: &str, requisition: &Requisition) -> Result<()> {
        let path = self.path_for(bank_id)?;
        let data = serde_json::to_vec_pretty(requisition)?;
        tokio::task::spawn_blocking(move || atomic_write(&path, &data))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }
}

/// Atomically write `data` to `path` using a tempfile in the same directory.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// A storage key must be a single safe file-name component.
///
/// Allowed: ASCII alphanumerics, `-`, `_` and `.`, not starting with a dot
/// (so no `..` and no hidden files).
fn check_key(key: &str) -> Result<()> {
    let allowed = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if key.is_empty() || key.starts_with('.') || !allowed {
        return Err(Error::config(format!(
            "invalid requisition key {:?}: use letters, digits, '-', '_' or '.'",
            key
        )));
    }
    Ok(())
}

/// Lexical path cleanup: drops `.` segments and folds `..` where possible.
fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}
