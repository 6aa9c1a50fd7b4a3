//! Action types for remote resource reconciliation

use crate::client::ResourceKind;
use crate::manifest::Manifest;
use crate::state::{LocalState, NamedSet, Named};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Type of action taken on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource
    Update,
    /// Delete an orphaned resource
    Delete,
    /// Orphaned resource kept because deletion is disabled
    Skip,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::Skip => write!(f, "skip"),
        }
    }
}

/// A planned action for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ResourceKind,
    pub name: String,
    pub action_type: ActionType,
    /// Remote id recorded in the state, if any
    pub remote_id: Option<u64>,
}

impl Action {
    fn new(kind: ResourceKind, name: &str, action_type: ActionType, remote_id: Option<u64>) -> Self {
        Self {
            kind,
            name: name.to_string(),
            action_type,
            remote_id,
        }
    }
}

/// Create when the name is unknown, update otherwise
pub(crate) fn classify<T: Named>(set: &NamedSet<T>, name: &str) -> ActionType {
    if set.contains(name) {
        ActionType::Update
    } else {
        ActionType::Create
    }
}

/// Names recorded in the state that the current pass did not visit
pub(crate) fn orphans<T: Named>(set: &NamedSet<T>, visited: &HashSet<String>) -> Vec<String> {
    set.names()
        .into_iter()
        .filter(|name| !visited.contains(name))
        .collect()
}

fn name_set<'a>(names: impl Iterator<Item = &'a str>) -> HashSet<String> {
    names.map(str::to_string).collect()
}

fn singleton(id: u64) -> (ActionType, Option<u64>) {
    if id == 0 {
        (ActionType::Create, None)
    } else {
        (ActionType::Update, Some(id))
    }
}

/// What a deploy would do, computed offline from the manifest and the state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Actions in reconciliation order
    pub actions: Vec<Action>,

    /// Whether the plan creates or deletes anything
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions
            .iter()
            .any(|a| matches!(a.action_type, ActionType::Create | ActionType::Delete));
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
            has_changes: false,
        }
    }

    /// Classify every manifest entry against the state
    pub fn compute(manifest: &Manifest, state: &LocalState) -> Self {
        let mut actions = Vec::new();

        if let Some(app) = manifest.application() {
            let (action_type, id) = singleton(state.application.id);
            actions.push(Action::new(ResourceKind::Application, &app.name, action_type, id));
        }

        if state.bucket.is_empty() && crate::reconcile::needs_bucket(manifest) {
            let bucket = crate::reconcile::bucket_name(manifest);
            actions.push(Action::new(ResourceKind::Bucket, &bucket, ActionType::Create, None));
        }

        for origin in &manifest.origins {
            let id = state.origins.get(&origin.name).map(|o| o.remote_id);
            let action_type = classify(&state.origins, &origin.name);
            actions.push(Action::new(ResourceKind::Origin, &origin.name, action_type, id));
        }

        for cache in &manifest.cache_settings {
            let id = state.cache_settings.get(&cache.name).map(|c| c.remote_id);
            let action_type = classify(&state.cache_settings, &cache.name);
            actions.push(Action::new(ResourceKind::CacheSetting, &cache.name, action_type, id));
        }

        for connector in &manifest.connectors {
            let id = state.connectors.get(&connector.name).map(|c| c.remote_id);
            let action_type = classify(&state.connectors, &connector.name);
            actions.push(Action::new(ResourceKind::Connector, &connector.name, action_type, id));
        }

        if let Some(function) = manifest.function() {
            let (action_type, id) = singleton(state.function.id);
            actions.push(Action::new(ResourceKind::Function, &function.name, action_type, id));
        }

        for rule in &manifest.rules {
            let id = state.rules.get(&rule.name).map(|r| r.remote_id);
            let action_type = classify(&state.rules, &rule.name);
            actions.push(Action::new(ResourceKind::Rule, &rule.name, action_type, id));
        }

        if let Some(workload) = manifest.workload() {
            let (action_type, id) = singleton(state.workload.id);
            actions.push(Action::new(ResourceKind::Workload, &workload.name, action_type, id));
        }

        let prune = if state.skip_deletion {
            ActionType::Skip
        } else {
            ActionType::Delete
        };
        let rules = name_set(manifest.rules.iter().map(|r| r.name.as_str()));
        for name in orphans(&state.rules, &rules) {
            let id = state.rules.get(&name).map(|r| r.remote_id);
            actions.push(Action::new(ResourceKind::Rule, &name, prune, id));
        }

        let caches = name_set(manifest.cache_settings.iter().map(|c| c.name.as_str()));
        for name in orphans(&state.cache_settings, &caches) {
            let id = state.cache_settings.get(&name).map(|c| c.remote_id);
            actions.push(Action::new(ResourceKind::CacheSetting, &name, prune, id));
        }

        let origins = name_set(manifest.origins.iter().map(|o| o.name.as_str()));
        for name in orphans(&state.origins, &origins) {
            let id = state.origins.get(&name).map(|o| o.remote_id);
            actions.push(Action::new(ResourceKind::Origin, &name, prune, id));
        }

        let connectors = name_set(manifest.connectors.iter().map(|c| c.name.as_str()));
        for name in orphans(&state.connectors, &connectors) {
            let id = state.connectors.get(&name).map(|c| c.remote_id);
            actions.push(Action::new(ResourceKind::Connector, &name, prune, id));
        }

        Plan::new(actions)
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary::from_types(self.actions.iter().map(|a| a.action_type))
    }
}

/// Counts per action type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub skip: usize,
}

impl PlanSummary {
    fn from_types(types: impl Iterator<Item = ActionType>) -> Self {
        let mut summary = PlanSummary::default();
        for action_type in types {
            match action_type {
                ActionType::Create => summary.create += 1,
                ActionType::Update => summary.update += 1,
                ActionType::Delete => summary.delete += 1,
                ActionType::Skip => summary.skip += 1,
            }
        }
        summary
    }
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} skipped",
            self.create, self.update, self.delete, self.skip
        )
    }
}

/// Terminal state reached by one resource during a pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileEvent {
    pub kind: ResourceKind,
    pub name: String,
    pub outcome: ActionType,
    pub remote_id: u64,
}

impl std::fmt::Display for ReconcileEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self.outcome {
            ActionType::Create => "Created",
            ActionType::Update => "Updated",
            ActionType::Delete => "Deleted",
            ActionType::Skip => "Skipped deletion of",
        };
        write!(f, "{} {} '{}' (id {})", verb, self.kind, self.name, self.remote_id)
    }
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Events in the order they happened
    pub events: Vec<ReconcileEvent>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ReconcileReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event and emit its status line
    pub fn record(&mut self, kind: ResourceKind, name: &str, outcome: ActionType, remote_id: u64) {
        let event = ReconcileEvent {
            kind,
            name: name.to_string(),
            outcome,
            remote_id,
        };
        tracing::info!("{}", event);
        self.events.push(event);
    }

    /// Number of events of the given kind and outcome
    pub fn count(&self, kind: ResourceKind, outcome: ActionType) -> usize {
        self.events
            .iter()
            .filter(|e| e.kind == kind && e.outcome == outcome)
            .count()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary::from_types(self.events.iter().map(|e| e.outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CacheSettingEntry, OriginEntry};

    fn manifest() -> Manifest {
        Manifest::parse(
            r#"{"applications": [{"name": "site"}],
                "origins": [{"name": "static", "originType": "object_storage"}],
                "cacheSettings": [{"name": "default"}],
                "rules": [{"name": "Deliver", "behaviors": [{"name": "set_cache_policy", "target": "default"}]}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_plan_first_deploy_creates_everything() {
        let plan = Plan::compute(&manifest(), &LocalState::new());
        let summary = plan.summary();

        assert!(plan.has_changes);
        assert_eq!(summary.create, 5);
        assert_eq!(summary.update, 0);
        assert_eq!(summary.delete, 0);
        assert_eq!(plan.actions[0].kind, ResourceKind::Application);
        assert_eq!(plan.actions[1].kind, ResourceKind::Bucket);
    }

    #[test]
    fn test_plan_updates_known_names_and_prunes_orphans() {
        let mut state = LocalState::new();
        state.application.id = 1;
        state.bucket = "site-assets".to_string();
        state.origins.upsert(OriginEntry {
            name: "static".to_string(),
            remote_id: 2,
            remote_key: "k".to_string(),
        });
        state.cache_settings.upsert(CacheSettingEntry {
            name: "default".to_string(),
            remote_id: 3,
        });
        state.cache_settings.upsert(CacheSettingEntry {
            name: "legacy".to_string(),
            remote_id: 4,
        });

        let plan = Plan::compute(&manifest(), &state);
        let deletes = plan.actions_by_type(ActionType::Delete);
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].name, "legacy");
        assert_eq!(deletes[0].remote_id, Some(4));
        assert_eq!(plan.summary().create, 1);
        assert_eq!(plan.summary().update, 3);

        state.skip_deletion = true;
        let plan = Plan::compute(&manifest(), &state);
        assert!(plan.actions_by_type(ActionType::Delete).is_empty());
        assert_eq!(plan.summary().skip, 1);
    }

    #[test]
    fn test_summary_display() {
        let summary = PlanSummary {
            create: 1,
            update: 2,
            delete: 0,
            skip: 3,
        };
        assert_eq!(
            summary.to_string(),
            "1 to create, 2 to update, 0 to delete, 3 skipped"
        );
    }
}
