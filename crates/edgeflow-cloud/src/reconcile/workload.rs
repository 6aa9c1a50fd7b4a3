use super::{Pass, apply, singleton_id};
use crate::client::{ATTR_DOMAIN, ATTR_DOMAINS, ResourceKind, Scope};
use crate::error::Result;
use crate::request::WorkloadRequest;

impl Pass<'_> {
    /// The workload serving the application on its domains
    pub(super) async fn workload(&mut self) -> Result<()> {
        let Some(workload) = self.manifest.workload() else {
            return Ok(());
        };

        let request = WorkloadRequest::build(workload, self.state.application.id);
        let remote = apply(
            self.clients.workloads.as_ref(),
            &mut self.report,
            ResourceKind::Workload,
            Scope::Global,
            &workload.name,
            singleton_id(self.state.workload.id),
            &request,
        )
        .await?;

        let state = &mut self.state.workload;
        state.id = remote.id;
        state.name = workload.name.clone();
        state.domains = remote
            .get_attribute::<Vec<String>>(ATTR_DOMAINS)
            .unwrap_or_else(|| workload.domains.clone());
        if let Some(url) = remote.get_attribute::<String>(ATTR_DOMAIN) {
            state.url = url;
        }

        tracing::info!("Workload '{}' is served at {}", workload.name, state.url);
        Ok(())
    }
}
