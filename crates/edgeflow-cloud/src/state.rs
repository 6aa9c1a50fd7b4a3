//! Local deploy state
//!
//! Manages the `.edge/state.json` file which maps manifest resource names to
//! the remote identifiers created by previous deploys.

use crate::error::{CloudError, Result};
use crate::manifest::RulePhase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".edge";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_TEMP: &str = "state.json.tmp";
const FINGERPRINT_FILE: &str = "fingerprints.json";

/// An entry that is joined to the manifest by name
pub trait Named {
    fn name(&self) -> &str;
}

/// Name-keyed set preserving insertion order
///
/// Names are unique: inserting an entry whose name is already present
/// replaces it in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamedSet<T> {
    entries: Vec<T>,
}

impl<T> Default for NamedSet<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Named> NamedSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|e| e.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Add or replace the entry with the same name
    pub fn upsert(&mut self, entry: T) {
        match self.entries.iter_mut().find(|e| e.name() == entry.name()) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<T> {
        let index = self.entries.iter().position(|e| e.name() == name)?;
        Some(self.entries.remove(index))
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn first_duplicate(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|e| e.name())
            .find(|name| !seen.insert(*name))
    }
}

impl<T: Named> FromIterator<T> for NamedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = NamedSet::new();
        for entry in iter {
            set.upsert(entry);
        }
        set
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationState {
    /// 0 until the first successful create
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadState {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub url: String,
}

impl WorkloadState {
    /// Generated domain followed by the alternate domains
    pub fn all_domains(&self) -> Vec<String> {
        let mut domains = Vec::with_capacity(self.domains.len() + 1);
        if !self.url.is_empty() {
            domains.push(self.url.clone());
        }
        for domain in &self.domains {
            if !domains.contains(domain) {
                domains.push(domain.clone());
            }
        }
        domains
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionState {
    pub id: u64,
    pub name: String,
    /// Function instance on the edge application
    #[serde(default)]
    pub instance_id: u64,
    /// Implicit cache policy created for `run_function` rules
    #[serde(default)]
    pub cache_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginEntry {
    pub name: String,
    pub remote_id: u64,
    pub remote_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSettingEntry {
    pub name: String,
    pub remote_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEntry {
    pub name: String,
    pub remote_id: u64,
    pub phase: RulePhase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorEntry {
    pub name: String,
    pub remote_id: u64,
}

macro_rules! impl_named {
    ($($ty:ty),*) => {
        $(impl Named for $ty {
            fn name(&self) -> &str {
                &self.name
            }
        })*
    };
}

impl_named!(OriginEntry, CacheSettingEntry, RuleEntry, ConnectorEntry);

/// Everything previous deploys created on the remote side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub application: ApplicationState,

    #[serde(default)]
    pub workload: WorkloadState,

    #[serde(default)]
    pub bucket: String,

    /// Version tag of the current deploy, used as object-key namespace
    #[serde(default)]
    pub prefix: String,

    #[serde(default)]
    pub origins: NamedSet<OriginEntry>,

    #[serde(default)]
    pub cache_settings: NamedSet<CacheSettingEntry>,

    #[serde(default)]
    pub rules: NamedSet<RuleEntry>,

    #[serde(default)]
    pub connectors: NamedSet<ConnectorEntry>,

    #[serde(default)]
    pub function: FunctionState,

    #[serde(default)]
    pub not_first_run: bool,

    #[serde(default)]
    pub skip_deletion: bool,
}

impl Default for LocalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            application: ApplicationState::default(),
            workload: WorkloadState::default(),
            bucket: String::new(),
            prefix: String::new(),
            origins: NamedSet::new(),
            cache_settings: NamedSet::new(),
            rules: NamedSet::new(),
            connectors: NamedSet::new(),
            function: FunctionState::default(),
            not_first_run: false,
            skip_deletion: false,
        }
    }
}

impl LocalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Start a new deploy version and return its tag
    pub fn next_prefix(&mut self, now: DateTime<Utc>) -> &str {
        self.prefix = now.format("%Y%m%d%H%M%S").to_string();
        &self.prefix
    }

    /// Check the name-join invariant
    pub fn validate(&self) -> Result<()> {
        let duplicate = [
            ("origin", self.origins.first_duplicate()),
            ("cache setting", self.cache_settings.first_duplicate()),
            ("rule", self.rules.first_duplicate()),
            ("connector", self.connectors.first_duplicate()),
        ]
        .into_iter()
        .find_map(|(kind, dup)| dup.map(|name| (kind, name.to_string())));

        if let Some((kind, name)) = duplicate {
            return Err(CloudError::StateError(format!(
                "duplicate {} entry in state: {}",
                kind, name
            )));
        }
        Ok(())
    }
}

/// State manager for reading/writing the state file
#[derive(Debug, Clone)]
pub struct StateManager {
    /// Directory holding the state file
    state_dir: PathBuf,
}

impl StateManager {
    /// Manager for `<project_root>/.edge`
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self::with_state_dir(project_root.as_ref().join(STATE_DIR))
    }

    pub fn with_state_dir(state_dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
        }
    }

    /// Get the state file path
    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    /// Sibling file holding the fingerprint store
    pub fn fingerprint_path(&self) -> PathBuf {
        self.state_dir.join(FINGERPRINT_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir.join(STATE_BACKUP)
    }

    fn temp_path(&self) -> PathBuf {
        self.state_dir.join(STATE_TEMP)
    }

    /// Ensure the state directory exists
    async fn ensure_state_dir(&self) -> Result<()> {
        if !self.state_dir.exists() {
            fs::create_dir_all(&self.state_dir).await?;
            tracing::debug!("Created state directory: {}", self.state_dir.display());
        }
        Ok(())
    }

    /// Load the state, failing with `StateNotFound` when there is none
    pub async fn load(&self) -> Result<LocalState> {
        let path = self.state_path();
        if !path.exists() {
            return Err(CloudError::StateNotFound(path));
        }

        let content = fs::read_to_string(&path).await?;
        let state: LocalState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }
        state.validate()?;

        tracing::debug!(
            "Loaded state (application {}, {} origins, {} cache settings, {} rules)",
            state.application.id,
            state.origins.len(),
            state.cache_settings.len(),
            state.rules.len()
        );
        Ok(state)
    }

    /// Load the state, starting empty on a first deploy
    pub async fn load_or_default(&self) -> Result<LocalState> {
        match self.load().await {
            Ok(state) => Ok(state),
            Err(CloudError::StateNotFound(_)) => {
                tracing::debug!("State file not found, returning empty state");
                Ok(LocalState::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Save the state
    ///
    /// The new content is written to a temporary file first and renamed over
    /// the state file, so a crash leaves either the old or the new state.
    pub async fn save(&self, state: &LocalState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let temp = self.temp_path();

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&temp, content).await?;

        if path.exists() {
            fs::copy(&path, self.backup_path()).await?;
        }
        fs::rename(&temp, &path).await?;

        tracing::debug!("Saved state to {}", path.display());
        Ok(())
    }
}
