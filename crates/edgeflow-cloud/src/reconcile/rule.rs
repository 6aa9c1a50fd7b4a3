use super::{Pass, apply};
use crate::client::ResourceKind;
use crate::error::Result;
use crate::manifest::RulePhase;
use crate::request::RuleRequest;
use crate::resolver::CrossReferenceResolver;
use crate::state::RuleEntry;

impl Pass<'_> {
    /// Rules, resolved against the origins, cache settings and function
    /// reconciled earlier in this pass
    pub(super) async fn rules(&mut self) -> Result<()> {
        let clients = self.clients;
        let manifest = self.manifest;
        let mut request_order = 0;
        let mut response_order = 0;

        for rule in &manifest.rules {
            let behaviors = {
                let mut resolver = CrossReferenceResolver::new(
                    &self.state.cache_settings,
                    &self.state.origins,
                    &mut self.state.function,
                    clients.cache_settings.as_ref(),
                    self.state.application.id,
                );
                resolver.resolve(rule).await?
            };

            let order = match rule.phase {
                RulePhase::Request => {
                    request_order += 1;
                    request_order
                }
                RulePhase::Response => {
                    response_order += 1;
                    response_order
                }
            };

            let request = RuleRequest {
                name: rule.name.clone(),
                phase: rule.phase,
                description: rule.description.clone(),
                active: rule.active,
                order,
                criteria: rule.criteria.clone(),
                behaviors,
            };
            let recorded = self.state.rules.get(&rule.name).map(|r| (r.remote_id, r.phase));
            let existing = match recorded {
                Some((id, phase)) if phase == rule.phase => Some(id),
                _ => None,
            };

            let scope = self.rules_scope(rule.phase);
            let remote = apply(
                clients.rules.as_ref(),
                &mut self.report,
                ResourceKind::Rule,
                scope,
                &rule.name,
                existing,
                &request,
            )
            .await?;

            // Rules cannot change phase remotely: the old one goes once its
            // replacement exists
            if let Some((old_id, old_phase)) = recorded
                && old_phase != rule.phase
            {
                let scope = self.rules_scope(old_phase);
                let client = clients.rules.as_ref();
                self.delete(client, ResourceKind::Rule, scope, &rule.name, old_id, false)
                    .await?;
            }

            self.state.rules.upsert(RuleEntry {
                name: rule.name.clone(),
                remote_id: remote.id,
                phase: rule.phase,
            });
            self.visited.rules.insert(rule.name.clone());
        }
        Ok(())
    }
}
