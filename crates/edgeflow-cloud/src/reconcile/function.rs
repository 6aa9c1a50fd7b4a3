use super::{Pass, apply, singleton_id};
use crate::client::{ResourceKind, Scope};
use crate::error::Result;
use crate::request::{FunctionInstanceRequest, FunctionRequest};

impl Pass<'_> {
    /// The edge function and its instance on the application
    pub(super) async fn function(&mut self) -> Result<()> {
        let Some(function) = self.manifest.function() else {
            return Ok(());
        };

        let request = FunctionRequest::build(function);
        let remote = apply(
            self.clients.functions.as_ref(),
            &mut self.report,
            ResourceKind::Function,
            Scope::Global,
            &function.name,
            singleton_id(self.state.function.id),
            &request,
        )
        .await?;
        self.state.function.id = remote.id;
        self.state.function.name = function.name.clone();

        let instance_request = FunctionInstanceRequest::build(function, remote.id);
        let scope = self.application_scope();
        let instance = apply(
            self.clients.function_instances.as_ref(),
            &mut self.report,
            ResourceKind::FunctionInstance,
            scope,
            &function.name,
            singleton_id(self.state.function.instance_id),
            &instance_request,
        )
        .await?;
        self.state.function.instance_id = instance.id;

        Ok(())
    }
}
