//! End-to-end deploy of one manifest

use crate::action::ReconcileReport;
use crate::client::Clients;
use crate::error::Result;
use crate::fingerprint::FingerprintStore;
use crate::manifest::Manifest;
use crate::purge::{ChangePurge, PurgeReport};
use crate::reconcile::Reconciler;
use crate::state::StateManager;
use crate::upload::{UploadOptions, UploadPipeline, UploadSummary};
use chrono::Utc;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    pub upload: UploadOptions,

    /// Override the `skip_deletion` flag stored in the state
    pub skip_deletion: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct DeployReport {
    pub reconcile: ReconcileReport,

    /// `None` when there was nothing to upload
    pub upload: Option<UploadSummary>,

    /// `None` when nothing was uploaded
    pub purge: Option<PurgeReport>,

    /// Version prefix the assets were uploaded under
    pub prefix: String,
}

pub struct Deployer {
    clients: Clients,
    store: StateManager,
    options: DeployOptions,
}

impl Deployer {
    pub fn new(clients: Clients, store: StateManager, options: DeployOptions) -> Self {
        Self {
            clients,
            store,
            options,
        }
    }

    /// Reconcile the manifest, upload `static_dir` and purge what changed
    ///
    /// The state is persisted as the pass goes. A deploy that returns an
    /// error can simply be run again.
    pub async fn run(&self, manifest: &Manifest, static_dir: Option<&Path>) -> Result<DeployReport> {
        manifest.validate()?;

        let mut state = self.store.load_or_default().await?;
        if let Some(skip) = self.options.skip_deletion {
            state.skip_deletion = skip;
        }
        let prefix = state.next_prefix(Utc::now()).to_string();
        tracing::info!("Deploying version {}", prefix);

        let reconciler = Reconciler::new(self.clients.clone(), self.store.clone());
        let reconcile = reconciler.reconcile(manifest, &mut state).await?;

        let upload = match static_dir {
            Some(dir) if dir.is_dir() && !state.bucket.is_empty() => {
                let pipeline =
                    UploadPipeline::new(self.clients.storage.clone(), self.options.upload.clone());
                Some(pipeline.upload(dir, &state.bucket, &prefix).await?)
            }
            Some(dir) if dir.is_dir() => {
                tracing::warn!(
                    "No storage bucket in this manifest, skipping upload of {}",
                    dir.display()
                );
                None
            }
            Some(dir) => {
                tracing::debug!("Static directory {} not found, nothing to upload", dir.display());
                None
            }
            None => None,
        };

        let purge = match &upload {
            Some(summary) => {
                let purger = ChangePurge::new(
                    self.clients.purge.clone(),
                    FingerprintStore::new(self.store.fingerprint_path()),
                );
                Some(
                    purger
                        .purge(&state.workload.all_domains(), &summary.fingerprints)
                        .await?,
                )
            }
            None => None,
        };

        state.not_first_run = true;
        state.touch();
        self.store.save(&state).await?;

        Ok(DeployReport {
            reconcile,
            upload,
            purge,
            prefix,
        })
    }
}
