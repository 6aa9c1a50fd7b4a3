use super::Pass;
use crate::action::{ActionType, orphans};
use crate::client::{ResourceClient, ResourceKind, Scope};
use crate::error::Result;

impl Pass<'_> {
    /// Delete resources recorded in the state that the manifest no longer
    /// declares
    ///
    /// Runs only after every create and update succeeded. Rules go first so
    /// nothing still references the origins and cache settings removed after
    /// them.
    pub(super) async fn prune(&mut self) -> Result<()> {
        let scope = self.application_scope();
        let skip = self.state.skip_deletion;
        let clients = self.clients;

        for name in orphans(&self.state.rules, &self.visited.rules) {
            let Some((id, phase)) = self.state.rules.get(&name).map(|r| (r.remote_id, r.phase))
            else {
                continue;
            };
            let client = clients.rules.as_ref();
            let rules_scope = self.rules_scope(phase);
            if self.delete(client, ResourceKind::Rule, rules_scope, &name, id, skip).await? {
                self.state.rules.remove(&name);
            }
        }

        for name in orphans(&self.state.cache_settings, &self.visited.cache_settings) {
            let id = self
                .state
                .cache_settings
                .get(&name)
                .map(|c| c.remote_id)
                .unwrap_or_default();
            let client = clients.cache_settings.as_ref();
            if self.delete(client, ResourceKind::CacheSetting, scope, &name, id, skip).await? {
                self.state.cache_settings.remove(&name);
            }
        }

        for name in orphans(&self.state.origins, &self.visited.origins) {
            let id = self.state.origins.get(&name).map(|o| o.remote_id).unwrap_or_default();
            let client = clients.origins.as_ref();
            if self.delete(client, ResourceKind::Origin, scope, &name, id, skip).await? {
                self.state.origins.remove(&name);
            }
        }

        for name in orphans(&self.state.connectors, &self.visited.connectors) {
            let id = self
                .state
                .connectors
                .get(&name)
                .map(|c| c.remote_id)
                .unwrap_or_default();
            let client = clients.connectors.as_ref();
            if self.delete(client, ResourceKind::Connector, Scope::Global, &name, id, skip).await? {
                self.state.connectors.remove(&name);
            }
        }

        Ok(())
    }

    /// Delete one orphan; returns whether it is gone from the remote side
    pub(super) async fn delete<R: Send + Sync>(
        &mut self,
        client: &dyn ResourceClient<R>,
        kind: ResourceKind,
        scope: Scope,
        name: &str,
        id: u64,
        skip: bool,
    ) -> Result<bool> {
        if skip {
            self.report.record(kind, name, ActionType::Skip, id);
            return Ok(false);
        }

        match client.delete(scope, id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} '{}' was already deleted remotely", kind, name);
            }
            Err(e) => return Err(e),
        }
        self.report.record(kind, name, ActionType::Delete, id);
        Ok(true)
    }
}
