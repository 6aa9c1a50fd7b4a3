//! Cache purge of changed static files
//!
//! The first upload has nothing to compare against, so every domain is purged
//! with a wildcard. Afterwards only paths whose content hash changed are
//! purged. Purge failures never fail a deploy.

use crate::client::PurgeClient;
use crate::error::Result;
use crate::fingerprint::{Fingerprint, FingerprintDiff, FingerprintStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeMode {
    /// Everything under each domain
    Wildcard,
    /// Only changed paths
    Selective,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub mode: PurgeMode,

    /// Domains (wildcard) or paths (selective) purged successfully
    pub purged: Vec<String>,

    /// Purge calls that failed and were only logged
    pub failed: Vec<String>,
}

impl PurgeReport {
    fn new(mode: PurgeMode) -> Self {
        Self {
            mode,
            purged: Vec::new(),
            failed: Vec::new(),
        }
    }
}

pub struct ChangePurge {
    client: Arc<dyn PurgeClient>,
    store: FingerprintStore,
}

impl ChangePurge {
    pub fn new(client: Arc<dyn PurgeClient>, store: FingerprintStore) -> Self {
        Self { client, store }
    }

    /// Purge what changed since the stored fingerprints, then store `current`
    ///
    /// Only reading or writing the fingerprint store can fail.
    pub async fn purge(&self, domains: &[String], current: &[Fingerprint]) -> Result<PurgeReport> {
        let report = match self.store.load().await? {
            None => self.purge_all(domains).await,
            Some(previous) => {
                let diff = FingerprintDiff::compute(&previous, current);
                self.purge_changed(domains, &diff).await
            }
        };

        self.store.save(current).await?;
        Ok(report)
    }

    async fn purge_all(&self, domains: &[String]) -> PurgeReport {
        let mut report = PurgeReport::new(PurgeMode::Wildcard);
        for domain in domains {
            match self.client.purge_wildcard(std::slice::from_ref(domain)).await {
                Ok(()) => {
                    tracing::info!("Purged cache of {}", domain);
                    report.purged.push(domain.clone());
                }
                Err(e) => {
                    tracing::warn!("Failed to purge cache of {}: {}", domain, e);
                    report.failed.push(domain.clone());
                }
            }
        }
        report
    }

    async fn purge_changed(&self, domains: &[String], diff: &FingerprintDiff) -> PurgeReport {
        let mut report = PurgeReport::new(PurgeMode::Selective);
        if diff.changed.is_empty() {
            tracing::info!("No changed files to purge");
            return report;
        }
        if domains.is_empty() {
            tracing::warn!("No domains known yet, skipping purge of {} files", diff.changed.len());
            return report;
        }

        for path in &diff.changed {
            match self.client.purge_urls(domains, path).await {
                Ok(()) => {
                    tracing::debug!("Purged {}", path);
                    report.purged.push(path.clone());
                }
                Err(e) => {
                    tracing::warn!("Failed to purge {}: {}", path, e);
                    report.failed.push(path.clone());
                }
            }
        }
        tracing::info!("Purged {} changed files", report.purged.len());
        report
    }
}
