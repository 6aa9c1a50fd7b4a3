//! Content fingerprints of uploaded static files
//!
//! The store is a JSON list of `{name, hash}` pairs kept next to the state
//! file. Its absence means no upload has completed yet.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Content hash of one static file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Path relative to the static directory, `/`-separated
    pub name: String,

    /// Lowercase hex SHA-256 of the file content
    pub hash: String,
}

impl Fingerprint {
    pub fn new(name: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hash: hash.into(),
        }
    }
}

/// SHA-256 of a file's content
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Persisted fingerprints of the previous upload
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    path: PathBuf,
}

impl FingerprintStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Previous fingerprints, or `None` before the first completed upload
    pub async fn load(&self) -> Result<Option<Vec<Fingerprint>>> {
        if !self.path.exists() {
            tracing::debug!("No fingerprint store at {}", self.path.display());
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).await?;
        let fingerprints: Vec<Fingerprint> = serde_json::from_str(&content)?;
        tracing::debug!("Loaded {} fingerprints", fingerprints.len());
        Ok(Some(fingerprints))
    }

    /// Replace the stored fingerprints
    pub async fn save(&self, fingerprints: &[Fingerprint]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, serde_json::to_string_pretty(fingerprints)?).await?;
        fs::rename(&temp, &self.path).await?;
        tracing::debug!("Saved {} fingerprints", fingerprints.len());
        Ok(())
    }
}

/// Difference between two fingerprint sets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintDiff {
    /// Present in both with a different hash
    pub changed: Vec<String>,
    /// Only in the new set
    pub added: Vec<String>,
    /// Only in the old set
    pub removed: Vec<String>,
}

impl FingerprintDiff {
    /// Compare `new` against `old`, keeping the order of `new` (then `old`
    /// for removed paths)
    pub fn compute(old: &[Fingerprint], new: &[Fingerprint]) -> Self {
        let previous: HashMap<&str, &str> = old
            .iter()
            .map(|f| (f.name.as_str(), f.hash.as_str()))
            .collect();
        let current: HashMap<&str, &str> = new
            .iter()
            .map(|f| (f.name.as_str(), f.hash.as_str()))
            .collect();

        let mut diff = FingerprintDiff::default();
        for f in new {
            match previous.get(f.name.as_str()) {
                Some(hash) if *hash != f.hash => diff.changed.push(f.name.clone()),
                Some(_) => {}
                None => diff.added.push(f.name.clone()),
            }
        }
        diff.removed = old
            .iter()
            .filter(|f| !current.contains_key(f.name.as_str()))
            .map(|f| f.name.clone())
            .collect();
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_diff_only_changed_paths() {
        let old = vec![Fingerprint::new("a", "H1"), Fingerprint::new("b", "H2")];
        let new = vec![
            Fingerprint::new("a", "H1"),
            Fingerprint::new("b", "H3"),
            Fingerprint::new("c", "H4"),
        ];

        let diff = FingerprintDiff::compute(&old, &new);
        assert_eq!(diff.changed, vec!["b"]);
        assert_eq!(diff.added, vec!["c"]);
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn test_diff_removed() {
        let old = vec![Fingerprint::new("a", "H1"), Fingerprint::new("gone", "H2")];
        let new = vec![Fingerprint::new("a", "H1")];

        let diff = FingerprintDiff::compute(&old, &new);
        assert_eq!(diff.removed, vec!["gone"]);
        assert!(diff.changed.is_empty());
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_hash_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.html");
        std::fs::write(&path, "hello").unwrap();

        assert_eq!(
            hash_file(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn test_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FingerprintStore::new(dir.path().join(".edge/fingerprints.json"));

        assert_eq!(store.load().await.unwrap(), None);

        let fingerprints = vec![Fingerprint::new("index.html", "abc")];
        store.save(&fingerprints).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(fingerprints));
    }
}
