use super::{Pass, apply};
use crate::client::{ATTR_ORIGIN_KEY, ResourceKind, Scope};
use crate::error::{CloudError, Result};
use crate::request::{CacheSettingRequest, ConnectorRequest, OriginRequest};
use crate::state::{CacheSettingEntry, ConnectorEntry, OriginEntry};

impl Pass<'_> {
    pub(super) async fn origins(&mut self) -> Result<()> {
        let scope = self.application_scope();

        for origin in &self.manifest.origins {
            let request = OriginRequest::build(origin, &self.state.bucket, &self.state.prefix);
            let existing = self.state.origins.get(&origin.name);
            let previous_key = existing.map(|o| o.remote_key.clone());

            let remote = apply(
                self.clients.origins.as_ref(),
                &mut self.report,
                ResourceKind::Origin,
                scope,
                &origin.name,
                existing.map(|o| o.remote_id),
                &request,
            )
            .await?;

            let remote_key = remote
                .get_attribute::<String>(ATTR_ORIGIN_KEY)
                .or(previous_key)
                .ok_or_else(|| {
                    CloudError::api(
                        ResourceKind::Origin,
                        format!("response for '{}' carries no origin key", origin.name),
                    )
                })?;

            self.state.origins.upsert(OriginEntry {
                name: origin.name.clone(),
                remote_id: remote.id,
                remote_key,
            });
            self.visited.origins.insert(origin.name.clone());
        }
        Ok(())
    }

    pub(super) async fn cache_settings(&mut self) -> Result<()> {
        let scope = self.application_scope();

        for cache in &self.manifest.cache_settings {
            let request = CacheSettingRequest::build(cache);
            let existing = self.state.cache_settings.get(&cache.name).map(|c| c.remote_id);

            let remote = apply(
                self.clients.cache_settings.as_ref(),
                &mut self.report,
                ResourceKind::CacheSetting,
                scope,
                &cache.name,
                existing,
                &request,
            )
            .await?;

            self.state.cache_settings.upsert(CacheSettingEntry {
                name: cache.name.clone(),
                remote_id: remote.id,
            });
            self.visited.cache_settings.insert(cache.name.clone());
        }
        Ok(())
    }

    pub(super) async fn connectors(&mut self) -> Result<()> {
        for connector in &self.manifest.connectors {
            let request = ConnectorRequest::build(connector);
            let existing = self.state.connectors.get(&connector.name).map(|c| c.remote_id);

            let remote = apply(
                self.clients.connectors.as_ref(),
                &mut self.report,
                ResourceKind::Connector,
                Scope::Global,
                &connector.name,
                existing,
                &request,
            )
            .await?;

            self.state.connectors.upsert(ConnectorEntry {
                name: connector.name.clone(),
                remote_id: remote.id,
            });
            self.visited.connectors.insert(connector.name.clone());
        }
        Ok(())
    }
}
