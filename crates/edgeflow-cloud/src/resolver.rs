//! Cross-reference resolution for rule behaviors
//!
//! Rule behaviors name other manifest resources. Before a rule is sent to
//! the rules engine every such name is replaced by the identifier the remote
//! API expects, using what the current pass has recorded so far.

use crate::client::{ResourceClient, ResourceKind, Scope};
use crate::error::{CloudError, Result};
use crate::manifest::{Behavior, ManifestRule, RawBehavior, SET_CACHE_POLICY, SET_ORIGIN, RUN_FUNCTION};
use crate::request::CacheSettingRequest;
use crate::state::{CacheSettingEntry, FunctionState, NamedSet, OriginEntry};
use serde_json::json;

/// Resolves behavior targets for the rules of one application
pub struct CrossReferenceResolver<'a> {
    cache_settings: &'a NamedSet<CacheSettingEntry>,
    origins: &'a NamedSet<OriginEntry>,
    function: &'a mut FunctionState,
    cache_client: &'a dyn ResourceClient<CacheSettingRequest>,
    application_id: u64,
}

impl<'a> CrossReferenceResolver<'a> {
    pub fn new(
        cache_settings: &'a NamedSet<CacheSettingEntry>,
        origins: &'a NamedSet<OriginEntry>,
        function: &'a mut FunctionState,
        cache_client: &'a dyn ResourceClient<CacheSettingRequest>,
        application_id: u64,
    ) -> Self {
        Self {
            cache_settings,
            origins,
            function,
            cache_client,
            application_id,
        }
    }

    /// Behaviors of `rule` with every reference replaced by a remote id
    ///
    /// All names are checked before anything is created remotely, so a
    /// dangling reference never leaves side effects behind.
    pub async fn resolve(&mut self, rule: &ManifestRule) -> Result<Vec<RawBehavior>> {
        let mut behaviors = Vec::with_capacity(rule.behaviors.len() + 1);
        let mut first_function = None;

        for behavior in &rule.behaviors {
            let resolved = match behavior {
                Behavior::SetCachePolicy(name) => RawBehavior {
                    name: SET_CACHE_POLICY.to_string(),
                    target: Some(json!(self.cache_setting_id(name)?)),
                },
                Behavior::SetOrigin(name) => RawBehavior {
                    name: SET_ORIGIN.to_string(),
                    target: Some(json!(self.origin_key(name)?)),
                },
                Behavior::RunFunction(name) => {
                    first_function.get_or_insert(behaviors.len());
                    RawBehavior {
                        name: RUN_FUNCTION.to_string(),
                        target: Some(json!(self.function_instance_id(name)?)),
                    }
                }
                Behavior::Plain { name, target } => RawBehavior {
                    name: name.clone(),
                    target: target.clone(),
                },
            };
            behaviors.push(resolved);
        }

        if let Some(index) = first_function
            && !rule.has_explicit_cache_policy()
        {
            let cache_id = self.implicit_cache_policy().await?;
            behaviors.insert(
                index,
                RawBehavior {
                    name: SET_CACHE_POLICY.to_string(),
                    target: Some(json!(cache_id)),
                },
            );
        }

        Ok(behaviors)
    }

    fn cache_setting_id(&self, name: &str) -> Result<u64> {
        self.cache_settings
            .get(name)
            .map(|c| c.remote_id)
            .ok_or_else(|| CloudError::CacheSettingNotFound(name.to_string()))
    }

    fn origin_key(&self, name: &str) -> Result<String> {
        self.origins
            .get(name)
            .map(|o| o.remote_key.clone())
            .ok_or_else(|| CloudError::OriginNotFound(name.to_string()))
    }

    fn function_instance_id(&self, name: &str) -> Result<u64> {
        if self.function.name == name && self.function.instance_id != 0 {
            Ok(self.function.instance_id)
        } else {
            Err(CloudError::FunctionNotFound(name.to_string()))
        }
    }

    /// Cache policy shared by every `run_function` rule without its own
    async fn implicit_cache_policy(&mut self) -> Result<u64> {
        if self.function.cache_id != 0 {
            return Ok(self.function.cache_id);
        }

        let request = CacheSettingRequest::honor(format!("{}-cache-policy", self.function.name));
        let created = self
            .cache_client
            .create(Scope::Application(self.application_id), &request)
            .await?;
        tracing::info!(
            "Created {} '{}' for function {} (id {})",
            ResourceKind::CacheSetting,
            request.name,
            self.function.name,
            created.id
        );

        self.function.cache_id = created.id;
        Ok(created.id)
    }
}
