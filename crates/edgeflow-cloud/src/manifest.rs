//! Deploy manifest
//!
//! The manifest is produced by the project's build step and describes the
//! desired remote resources. It is read-only input to the reconciler.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Desired state for one deploy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub applications: Vec<ManifestApplication>,

    #[serde(default)]
    pub origins: Vec<ManifestOrigin>,

    #[serde(default)]
    pub cache_settings: Vec<ManifestCacheSetting>,

    #[serde(default)]
    pub rules: Vec<ManifestRule>,

    #[serde(default)]
    pub connectors: Vec<ManifestConnector>,

    #[serde(default)]
    pub functions: Vec<ManifestFunction>,

    #[serde(default)]
    pub workloads: Vec<ManifestWorkload>,

    #[serde(default)]
    pub storage_buckets: Vec<ManifestStorageBucket>,
}

impl Manifest {
    /// Read and validate a manifest file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let manifest = Self::parse(&content)?;
        tracing::debug!(
            "Loaded manifest {} ({} origins, {} cache settings, {} rules)",
            path.display(),
            manifest.origins.len(),
            manifest.cache_settings.len(),
            manifest.rules.len()
        );
        Ok(manifest)
    }

    /// Parse and validate manifest JSON
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check the structural constraints the reconciler relies on
    pub fn validate(&self) -> Result<()> {
        if self.applications.len() > 1 {
            return Err(CloudError::InvalidManifest(format!(
                "expected at most one application, found {}",
                self.applications.len()
            )));
        }
        if self.workloads.len() > 1 {
            return Err(CloudError::InvalidManifest(format!(
                "expected at most one workload, found {}",
                self.workloads.len()
            )));
        }
        if self.functions.len() > 1 {
            return Err(CloudError::InvalidManifest(format!(
                "expected at most one function, found {}",
                self.functions.len()
            )));
        }

        unique_names("origin", self.origins.iter().map(|o| o.name.as_str()))?;
        unique_names(
            "cache setting",
            self.cache_settings.iter().map(|c| c.name.as_str()),
        )?;
        unique_names("rule", self.rules.iter().map(|r| r.name.as_str()))?;
        unique_names("connector", self.connectors.iter().map(|c| c.name.as_str()))?;

        let needs_application = !self.origins.is_empty()
            || !self.cache_settings.is_empty()
            || !self.rules.is_empty()
            || !self.functions.is_empty()
            || !self.workloads.is_empty();
        if needs_application && self.applications.is_empty() {
            return Err(CloudError::InvalidManifest(
                "origins, cache settings, rules, functions and workloads require an application"
                    .to_string(),
            ));
        }

        Ok(())
    }

    pub fn application(&self) -> Option<&ManifestApplication> {
        self.applications.first()
    }

    pub fn workload(&self) -> Option<&ManifestWorkload> {
        self.workloads.first()
    }

    pub fn function(&self) -> Option<&ManifestFunction> {
        self.functions.first()
    }

    pub fn storage_bucket(&self) -> Option<&ManifestStorageBucket> {
        self.storage_buckets.first()
    }
}

fn unique_names<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(CloudError::InvalidManifest(format!("{} with empty name", kind)));
        }
        if !seen.insert(name) {
            return Err(CloudError::InvalidManifest(format!(
                "duplicate {} name: {}",
                kind, name
            )));
        }
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

/// Edge application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestApplication {
    pub name: String,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub http3: bool,

    #[serde(default = "default_http_ports")]
    pub http_port: Vec<u16>,

    #[serde(default = "default_https_ports")]
    pub https_port: Vec<u16>,

    #[serde(default)]
    pub minimum_tls_version: Option<String>,

    #[serde(default)]
    pub modules: ApplicationModules,
}

fn default_http_ports() -> Vec<u16> {
    vec![80]
}

fn default_https_ports() -> Vec<u16> {
    vec![443]
}

/// Modules enabled on the edge application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationModules {
    #[serde(default = "default_true")]
    pub caching: bool,

    #[serde(default)]
    pub edge_functions: bool,

    #[serde(default)]
    pub application_accelerator: bool,

    #[serde(default)]
    pub image_processor: bool,
}

impl Default for ApplicationModules {
    fn default() -> Self {
        Self {
            caching: true,
            edge_functions: false,
            application_accelerator: false,
            image_processor: false,
        }
    }
}

/// Origin kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginType {
    #[default]
    SingleOrigin,
    ObjectStorage,
    LoadBalancer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestOrigin {
    pub name: String,

    #[serde(default)]
    pub origin_type: OriginType,

    #[serde(default)]
    pub addresses: Vec<OriginAddress>,

    #[serde(default = "default_protocol_policy")]
    pub origin_protocol_policy: String,

    #[serde(default = "default_host_header")]
    pub host_header: String,

    #[serde(default)]
    pub origin_path: String,

    #[serde(default)]
    pub hmac_authentication: bool,

    /// Object-storage origins default to the deploy bucket when unset
    #[serde(default)]
    pub bucket: Option<String>,

    #[serde(default)]
    pub prefix: Option<String>,
}

fn default_protocol_policy() -> String {
    "preserve".to_string()
}

fn default_host_header() -> String {
    "${host}".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginAddress {
    pub address: String,

    #[serde(default)]
    pub weight: Option<u32>,

    #[serde(default)]
    pub server_role: Option<String>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Whether the edge honors the origin's cache headers or overrides them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    #[default]
    Honor,
    Override,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestCacheSetting {
    pub name: String,

    #[serde(default)]
    pub browser_cache_settings: CacheMode,

    #[serde(default)]
    pub browser_cache_settings_maximum_ttl: u32,

    #[serde(default)]
    pub cdn_cache_settings: CacheMode,

    #[serde(default = "default_cdn_ttl")]
    pub cdn_cache_settings_maximum_ttl: u32,

    #[serde(default = "default_ignore")]
    pub cache_by_query_string: String,

    #[serde(default)]
    pub query_string_fields: Vec<String>,

    #[serde(default)]
    pub enable_query_string_sort: bool,

    #[serde(default = "default_ignore")]
    pub cache_by_cookies: String,

    #[serde(default)]
    pub cookie_names: Vec<String>,

    #[serde(default)]
    pub enable_caching_for_post: bool,

    #[serde(default)]
    pub enable_caching_for_options: bool,
}

pub(crate) fn default_cdn_ttl() -> u32 {
    60
}

pub(crate) fn default_ignore() -> String {
    "ignore".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestConnector {
    pub name: String,

    pub connector_type: String,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default)]
    pub attributes: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFunction {
    pub name: String,

    /// Built function artifact, relative to the project root
    pub path: PathBuf,

    #[serde(default)]
    pub args: serde_json::Value,

    #[serde(default = "default_true")]
    pub active: bool,
}

/// Phase of the rules engine a rule runs in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulePhase {
    #[default]
    Request,
    Response,
}

impl std::fmt::Display for RulePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RulePhase::Request => write!(f, "request"),
            RulePhase::Response => write!(f, "response"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRule {
    pub name: String,

    #[serde(default)]
    pub phase: RulePhase,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_true")]
    pub active: bool,

    /// Groups are OR-ed together, criteria within a group are AND-ed
    #[serde(default)]
    pub criteria: Vec<Vec<Criterion>>,

    #[serde(default)]
    pub behaviors: Vec<Behavior>,
}

impl ManifestRule {
    pub fn has_explicit_cache_policy(&self) -> bool {
        self.behaviors
            .iter()
            .any(|b| matches!(b, Behavior::SetCachePolicy(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criterion {
    pub variable: String,

    pub operator: String,

    pub conditional: String,

    #[serde(default)]
    pub input_value: Option<String>,
}

pub const SET_CACHE_POLICY: &str = "set_cache_policy";
pub const SET_ORIGIN: &str = "set_origin";
pub const RUN_FUNCTION: &str = "run_function";

/// Rule behavior
///
/// Behaviors that point at another manifest resource carry that resource's
/// name and are resolved to a remote identifier when the rule is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBehavior", into = "RawBehavior")]
pub enum Behavior {
    /// `set_cache_policy` with a cache-setting name
    SetCachePolicy(String),
    /// `set_origin` with an origin name
    SetOrigin(String),
    /// `run_function` with a function name
    RunFunction(String),
    /// Any other behavior, forwarded verbatim
    Plain {
        name: String,
        target: Option<serde_json::Value>,
    },
}

impl Behavior {
    pub fn name(&self) -> &str {
        match self {
            Behavior::SetCachePolicy(_) => SET_CACHE_POLICY,
            Behavior::SetOrigin(_) => SET_ORIGIN,
            Behavior::RunFunction(_) => RUN_FUNCTION,
            Behavior::Plain { name, .. } => name,
        }
    }
}

/// Wire form of a behavior: `{"name": ..., "target": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBehavior {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<serde_json::Value>,
}

impl TryFrom<RawBehavior> for Behavior {
    type Error = String;

    fn try_from(raw: RawBehavior) -> std::result::Result<Self, Self::Error> {
        let reference = |raw: &RawBehavior| match &raw.target {
            Some(serde_json::Value::String(target)) if !target.is_empty() => Ok(target.clone()),
            _ => Err(format!("behavior '{}' requires a target name", raw.name)),
        };

        match raw.name.as_str() {
            SET_CACHE_POLICY => Ok(Behavior::SetCachePolicy(reference(&raw)?)),
            SET_ORIGIN => Ok(Behavior::SetOrigin(reference(&raw)?)),
            RUN_FUNCTION => Ok(Behavior::RunFunction(reference(&raw)?)),
            _ => Ok(Behavior::Plain {
                name: raw.name,
                target: raw.target,
            }),
        }
    }
}

impl From<Behavior> for RawBehavior {
    fn from(behavior: Behavior) -> Self {
        match behavior {
            Behavior::SetCachePolicy(target) => RawBehavior {
                name: SET_CACHE_POLICY.to_string(),
                target: Some(serde_json::Value::String(target)),
            },
            Behavior::SetOrigin(target) => RawBehavior {
                name: SET_ORIGIN.to_string(),
                target: Some(serde_json::Value::String(target)),
            },
            Behavior::RunFunction(target) => RawBehavior {
                name: RUN_FUNCTION.to_string(),
                target: Some(serde_json::Value::String(target)),
            },
            Behavior::Plain { name, target } => RawBehavior { name, target },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestWorkload {
    pub name: String,

    /// Alternate domains (CNAMEs) served by the workload
    #[serde(default)]
    pub domains: Vec<String>,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default)]
    pub http3: bool,

    #[serde(default)]
    pub certificate_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestStorageBucket {
    pub name: String,

    #[serde(default = "default_edge_access")]
    pub edge_access: String,

    /// Directory of static assets, relative to the project root
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_edge_access() -> String {
    "read_only".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rule_behaviors() {
        let manifest = Manifest::parse(
            r#"{
                "applications": [{"name": "site"}],
                "rules": [{
                    "name": "Deliver",
                    "criteria": [[{"variable": "${uri}", "operator": "starts_with", "conditional": "if", "inputValue": "/"}]],
                    "behaviors": [
                        {"name": "set_cache_policy", "target": "default"},
                        {"name": "deliver"},
                        {"name": "rewrite_request", "target": "/index.html"}
                    ]
                }]
            }"#,
        )
        .unwrap();

        let rule = &manifest.rules[0];
        assert_eq!(rule.phase, RulePhase::Request);
        assert!(rule.active);
        assert_eq!(
            rule.behaviors,
            vec![
                Behavior::SetCachePolicy("default".to_string()),
                Behavior::Plain {
                    name: "deliver".to_string(),
                    target: None
                },
                Behavior::Plain {
                    name: "rewrite_request".to_string(),
                    target: Some(json!("/index.html"))
                },
            ]
        );
        assert!(rule.has_explicit_cache_policy());
    }

    #[test]
    fn test_reference_behavior_requires_target() {
        let err = Manifest::parse(
            r#"{"applications": [{"name": "site"}],
                "rules": [{"name": "r", "behaviors": [{"name": "set_origin"}]}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("requires a target name"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Manifest::parse(
            r#"{"applications": [{"name": "site"}],
                "cacheSettings": [{"name": "default"}, {"name": "default"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CloudError::InvalidManifest(_)));
    }

    #[test]
    fn test_resources_require_application() {
        let err = Manifest::parse(r#"{"origins": [{"name": "static"}]}"#).unwrap_err();
        assert!(matches!(err, CloudError::InvalidManifest(_)));
    }

    #[test]
    fn test_defaults() {
        let manifest = Manifest::parse(
            r#"{"applications": [{"name": "site"}],
                "cacheSettings": [{"name": "default"}],
                "origins": [{"name": "static", "originType": "object_storage"}]}"#,
        )
        .unwrap();

        let app = manifest.application().unwrap();
        assert_eq!(app.http_port, vec![80]);
        assert!(app.modules.caching);

        let cache = &manifest.cache_settings[0];
        assert_eq!(cache.browser_cache_settings, CacheMode::Honor);
        assert_eq!(cache.cdn_cache_settings_maximum_ttl, 60);
        assert_eq!(cache.cache_by_query_string, "ignore");

        assert_eq!(manifest.origins[0].origin_type, OriginType::ObjectStorage);
        assert_eq!(manifest.origins[0].host_header, "${host}");
    }

    #[test]
    fn test_behavior_serializes_to_wire_form() {
        let value = serde_json::to_value(Behavior::RunFunction("handler".to_string())).unwrap();
        assert_eq!(value, json!({"name": "run_function", "target": "handler"}));
    }
}
