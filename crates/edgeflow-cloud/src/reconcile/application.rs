use super::{Pass, apply, bucket_name, needs_bucket, singleton_id};
use crate::action::ActionType;
use crate::client::{ResourceKind, Scope};
use crate::error::{CloudError, Result};
use crate::request::ApplicationRequest;

impl Pass<'_> {
    /// The edge application every other resource hangs off
    pub(super) async fn application(&mut self) -> Result<()> {
        let Some(app) = self.manifest.application() else {
            return Ok(());
        };

        let request = ApplicationRequest::build(app, self.manifest.function().is_some());
        let remote = apply(
            self.clients.applications.as_ref(),
            &mut self.report,
            ResourceKind::Application,
            Scope::Global,
            &app.name,
            singleton_id(self.state.application.id),
            &request,
        )
        .await?;

        // Matched by presence, so a rename in the manifest refreshes the name
        self.state.application.id = remote.id;
        self.state.application.name = app.name.clone();
        Ok(())
    }

    /// Storage bucket for static assets, created once and then reused
    pub(super) async fn bucket(&mut self) -> Result<()> {
        if !self.state.bucket.is_empty() || !needs_bucket(self.manifest) {
            return Ok(());
        }

        let name = bucket_name(self.manifest);
        match self.clients.storage.create_bucket(&name).await {
            Ok(()) => self.report.record(ResourceKind::Bucket, &name, ActionType::Create, 0),
            Err(CloudError::ResourceAlreadyExists(_)) => {
                tracing::debug!("Bucket {} already exists, adopting it", name);
            }
            Err(e) => return Err(e),
        }

        self.state.bucket = name;
        Ok(())
    }
}
