//! Remote client interfaces
//!
//! The reconciler, upload pipeline and change purge talk to the edge platform
//! only through these traits. Transport and authentication live in the
//! implementations, which are provided by the caller.

use crate::error::Result;
use crate::manifest::RulePhase;
use crate::request::{
    ApplicationRequest, CacheSettingRequest, ConnectorRequest, FunctionInstanceRequest,
    FunctionRequest, OriginRequest, RuleRequest, WorkloadRequest,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;

/// Kind of remote resource managed by a deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Application,
    Bucket,
    Origin,
    CacheSetting,
    Connector,
    Function,
    FunctionInstance,
    Rule,
    Workload,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Application => write!(f, "application"),
            ResourceKind::Bucket => write!(f, "bucket"),
            ResourceKind::Origin => write!(f, "origin"),
            ResourceKind::CacheSetting => write!(f, "cache setting"),
            ResourceKind::Connector => write!(f, "connector"),
            ResourceKind::Function => write!(f, "function"),
            ResourceKind::FunctionInstance => write!(f, "function instance"),
            ResourceKind::Rule => write!(f, "rule"),
            ResourceKind::Workload => write!(f, "workload"),
        }
    }
}

/// Where a resource lives on the remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Account-level resource (applications, functions, workloads, connectors)
    Global,
    /// Resource nested under an edge application
    Application(u64),
    /// Rules engine of an application, one endpoint per phase
    Rules(u64, RulePhase),
}

/// Resource as returned by the remote API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResource {
    /// Remote numeric identifier
    pub id: u64,

    /// Name as stored remotely
    pub name: String,

    /// Resource attributes (origin key, domain, ...)
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Attribute carrying an origin's key
pub const ATTR_ORIGIN_KEY: &str = "origin_key";
/// Attribute carrying a workload's generated domain
pub const ATTR_DOMAIN: &str = "domain";
/// Attribute carrying a workload's alternate domains
pub const ATTR_DOMAINS: &str = "domains";

impl RemoteResource {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Create/update/delete/get operations for one resource type
///
/// `R` is the request payload the type is created and updated with. A
/// missing resource must be reported as [`CloudError::ResourceNotFound`]
/// so that deletes stay idempotent.
///
/// [`CloudError::ResourceNotFound`]: crate::error::CloudError::ResourceNotFound
#[async_trait]
pub trait ResourceClient<R>: Send + Sync
where
    R: Send + Sync,
{
    async fn create(&self, scope: Scope, request: &R) -> Result<RemoteResource>;

    async fn update(&self, scope: Scope, id: u64, request: &R) -> Result<RemoteResource>;

    async fn delete(&self, scope: Scope, id: u64) -> Result<()>;

    async fn get(&self, scope: Scope, id: u64) -> Result<RemoteResource>;
}

/// Object storage operations used for static assets
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Create a bucket. An existing bucket is reported as
    /// `ResourceAlreadyExists`.
    async fn create_bucket(&self, name: &str) -> Result<()>;

    /// Upload one object. `content` is positioned at the start of the file.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content: &mut File,
        content_type: &str,
    ) -> Result<()>;
}

/// CDN cache invalidation
#[async_trait]
pub trait PurgeClient: Send + Sync {
    async fn purge_wildcard(&self, domains: &[String]) -> Result<()>;

    async fn purge_urls(&self, domains: &[String], path: &str) -> Result<()>;
}

/// Every collaborator a deploy needs
#[derive(Clone)]
pub struct Clients {
    pub applications: Arc<dyn ResourceClient<ApplicationRequest>>,
    pub origins: Arc<dyn ResourceClient<OriginRequest>>,
    pub cache_settings: Arc<dyn ResourceClient<CacheSettingRequest>>,
    pub connectors: Arc<dyn ResourceClient<ConnectorRequest>>,
    pub functions: Arc<dyn ResourceClient<FunctionRequest>>,
    pub function_instances: Arc<dyn ResourceClient<FunctionInstanceRequest>>,
    pub rules: Arc<dyn ResourceClient<RuleRequest>>,
    pub workloads: Arc<dyn ResourceClient<WorkloadRequest>>,
    pub storage: Arc<dyn StorageClient>,
    pub purge: Arc<dyn PurgeClient>,
}

/// Retry configuration for remote operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Retry without waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()).max(0.0))
    }
}
