//! Manifest reconciliation
//!
//! Walks the manifest one resource type at a time, in dependency order, and
//! creates or updates the matching remote resources. Manifest entries are
//! joined to the local state by name only. After every phase the state is
//! committed to disk, so an aborted pass can be resumed by the next deploy.
//!
//! ```text
//! application → bucket → origins → cache settings → connectors
//!             → function → rules → workload → prune
//! ```

mod application;
mod function;
mod named;
mod prune;
mod rule;
mod workload;

use crate::action::{ActionType, ReconcileReport};
use crate::client::{Clients, RemoteResource, ResourceClient, ResourceKind, Scope};
use crate::error::Result;
use crate::manifest::{Manifest, OriginType, RulePhase};
use crate::state::{LocalState, StateManager};
use std::collections::HashSet;
use std::time::Instant;

/// Bucket holding the static assets of this manifest
pub fn bucket_name(manifest: &Manifest) -> String {
    match manifest.storage_bucket() {
        Some(bucket) => bucket.name.clone(),
        None => {
            let application = manifest
                .application()
                .map(|a| a.name.as_str())
                .unwrap_or("edge");
            format!("{}-assets", application.to_lowercase())
        }
    }
}

/// Whether the manifest serves anything from object storage
pub fn needs_bucket(manifest: &Manifest) -> bool {
    !manifest.storage_buckets.is_empty()
        || manifest
            .origins
            .iter()
            .any(|o| o.origin_type == OriginType::ObjectStorage && o.bucket.is_none())
}

/// Applies a manifest to the remote platform
pub struct Reconciler {
    clients: Clients,
    store: StateManager,
}

impl Reconciler {
    pub fn new(clients: Clients, store: StateManager) -> Self {
        Self { clients, store }
    }

    /// Run one reconciliation pass
    ///
    /// The first failing create or update aborts the pass. Resources created
    /// before the failure stay recorded in `state` (and on disk up to the
    /// last completed phase) and are matched by name on the next run.
    pub async fn reconcile(
        &self,
        manifest: &Manifest,
        state: &mut LocalState,
    ) -> Result<ReconcileReport> {
        let started = Instant::now();
        let mut pass = Pass {
            clients: &self.clients,
            store: &self.store,
            manifest,
            state,
            report: ReconcileReport::new(),
            visited: Visited::default(),
        };

        pass.application().await?;
        pass.commit().await?;

        pass.bucket().await?;
        pass.origins().await?;
        pass.commit().await?;

        pass.cache_settings().await?;
        pass.commit().await?;

        pass.connectors().await?;
        pass.commit().await?;

        pass.function().await?;
        pass.commit().await?;

        pass.rules().await?;
        pass.commit().await?;

        pass.workload().await?;
        pass.commit().await?;

        pass.prune().await?;
        pass.commit().await?;

        let mut report = pass.report;
        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!("Reconciliation finished: {}", report.summary());
        Ok(report)
    }
}

/// Names declared by the manifest during the current pass
#[derive(Debug, Default)]
struct Visited {
    origins: HashSet<String>,
    cache_settings: HashSet<String>,
    rules: HashSet<String>,
    connectors: HashSet<String>,
}

/// State of one reconciliation pass
struct Pass<'a> {
    clients: &'a Clients,
    store: &'a StateManager,
    manifest: &'a Manifest,
    state: &'a mut LocalState,
    report: ReconcileReport,
    visited: Visited,
}

impl Pass<'_> {
    /// Persist the state after a completed phase
    async fn commit(&mut self) -> Result<()> {
        self.state.touch();
        self.store.save(&*self.state).await
    }

    fn application_scope(&self) -> Scope {
        Scope::Application(self.state.application.id)
    }

    fn rules_scope(&self, phase: RulePhase) -> Scope {
        Scope::Rules(self.state.application.id, phase)
    }
}

/// Create the resource when `existing` is `None`, update it otherwise
async fn apply<R>(
    client: &dyn ResourceClient<R>,
    report: &mut ReconcileReport,
    kind: ResourceKind,
    scope: Scope,
    name: &str,
    existing: Option<u64>,
    request: &R,
) -> Result<RemoteResource>
where
    R: Send + Sync,
{
    match existing {
        None => {
            let created = client.create(scope, request).await?;
            report.record(kind, name, ActionType::Create, created.id);
            Ok(created)
        }
        Some(id) => {
            let updated = client.update(scope, id, request).await?;
            report.record(kind, name, ActionType::Update, id);
            Ok(updated)
        }
    }
}

/// Existing remote id of a singleton resource
fn singleton_id(id: u64) -> Option<u64> {
    (id != 0).then_some(id)
}
