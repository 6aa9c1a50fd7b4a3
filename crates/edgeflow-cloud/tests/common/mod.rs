#![allow(dead_code)]

use async_trait::async_trait;
use edgeflow_cloud::client::{ATTR_DOMAIN, ATTR_ORIGIN_KEY};
use edgeflow_cloud::request::{
    ApplicationRequest, CacheSettingRequest, ConnectorRequest, FunctionInstanceRequest,
    FunctionRequest, OriginRequest, RuleRequest, WorkloadRequest,
};
use edgeflow_cloud::{
    Clients, CloudError, PurgeClient, RemoteResource, ResourceClient, ResourceKind, Result, Scope,
    StorageClient,
};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Request payloads that carry a resource name
pub trait RequestName {
    fn request_name(&self) -> &str;
}

macro_rules! request_name {
    ($($ty:ty),*) => {
        $(impl RequestName for $ty {
            fn request_name(&self) -> &str {
                &self.name
            }
        })*
    };
}

request_name!(
    ApplicationRequest,
    CacheSettingRequest,
    ConnectorRequest,
    FunctionInstanceRequest,
    FunctionRequest,
    OriginRequest,
    RuleRequest,
    WorkloadRequest
);

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { scope: Scope, name: String },
    Update { scope: Scope, id: u64, name: String },
    Delete { scope: Scope, id: u64 },
}

/// In-memory resource API recording every call
pub struct FakeResources<R> {
    kind: ResourceKind,
    ids: Arc<AtomicU64>,
    calls: Mutex<Vec<(Call, Option<R>)>>,
    remote: Mutex<HashMap<u64, String>>,
    fail_on: Mutex<HashSet<String>>,
    decorate: fn(RemoteResource) -> RemoteResource,
}

impl<R: Clone + RequestName> FakeResources<R> {
    pub fn new(kind: ResourceKind, ids: Arc<AtomicU64>) -> Self {
        Self {
            kind,
            ids,
            calls: Mutex::new(Vec::new()),
            remote: Mutex::new(HashMap::new()),
            fail_on: Mutex::new(HashSet::new()),
            decorate: |resource| resource,
        }
    }

    fn decorated(mut self, decorate: fn(RemoteResource) -> RemoteResource) -> Self {
        self.decorate = decorate;
        self
    }

    /// Make create and update fail for `name`
    pub fn fail_on(&self, name: &str) {
        self.fail_on.lock().unwrap().insert(name.to_string());
    }

    /// Drop a resource behind the deployer's back
    pub fn forget(&self, id: u64) {
        self.remote.lock().unwrap().remove(&id);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn requests(&self) -> Vec<R> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, r)| r.clone())
            .collect()
    }

    pub fn creates(&self) -> usize {
        self.count(|c| matches!(c, Call::Create { .. }))
    }

    pub fn updates(&self) -> usize {
        self.count(|c| matches!(c, Call::Update { .. }))
    }

    pub fn deletes(&self) -> usize {
        self.count(|c| matches!(c, Call::Delete { .. }))
    }

    pub fn live(&self) -> usize {
        self.remote.lock().unwrap().len()
    }

    fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|(c, _)| f(c)).count()
    }

    fn check(&self, name: &str) -> Result<()> {
        if self.fail_on.lock().unwrap().contains(name) {
            return Err(CloudError::api(self.kind, format!("injected failure for {}", name)));
        }
        Ok(())
    }
}

#[async_trait]
impl<R> ResourceClient<R> for FakeResources<R>
where
    R: Clone + RequestName + Send + Sync,
{
    async fn create(&self, scope: Scope, request: &R) -> Result<RemoteResource> {
        let name = request.request_name().to_string();
        self.calls.lock().unwrap().push((
            Call::Create {
                scope,
                name: name.clone(),
            },
            Some(request.clone()),
        ));
        self.check(&name)?;

        let id = self.ids.fetch_add(1, Ordering::SeqCst);
        self.remote.lock().unwrap().insert(id, name.clone());
        Ok((self.decorate)(RemoteResource::new(id, name)))
    }

    async fn update(&self, scope: Scope, id: u64, request: &R) -> Result<RemoteResource> {
        let name = request.request_name().to_string();
        self.calls.lock().unwrap().push((
            Call::Update {
                scope,
                id,
                name: name.clone(),
            },
            Some(request.clone()),
        ));
        self.check(&name)?;

        let mut remote = self.remote.lock().unwrap();
        if !remote.contains_key(&id) {
            return Err(CloudError::ResourceNotFound(format!("{} {}", self.kind, id)));
        }
        remote.insert(id, name.clone());
        Ok((self.decorate)(RemoteResource::new(id, name)))
    }

    async fn delete(&self, scope: Scope, id: u64) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((Call::Delete { scope, id }, None));
        match self.remote.lock().unwrap().remove(&id) {
            Some(_) => Ok(()),
            None => Err(CloudError::ResourceNotFound(format!("{} {}", self.kind, id))),
        }
    }

    async fn get(&self, _scope: Scope, id: u64) -> Result<RemoteResource> {
        match self.remote.lock().unwrap().get(&id) {
            Some(name) => Ok((self.decorate)(RemoteResource::new(id, name.clone()))),
            None => Err(CloudError::ResourceNotFound(format!("{} {}", self.kind, id))),
        }
    }
}

/// Object storage keeping uploaded content in memory
#[derive(Default)]
pub struct FakeStorage {
    pub buckets: Mutex<Vec<String>>,
    pub objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    pub puts: AtomicUsize,
    /// Remaining injected failures per object key
    failures: Mutex<HashMap<String, usize>>,
    existing_bucket: AtomicBool,
}

impl FakeStorage {
    pub fn fail_times(&self, key_suffix: &str, times: usize) {
        self.failures
            .lock()
            .unwrap()
            .insert(key_suffix.to_string(), times);
    }

    pub fn bucket_already_exists(&self) {
        self.existing_bucket.store(true, Ordering::SeqCst);
    }

    /// Object content by key without the version prefix
    pub fn object(&self, relative: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(key, _)| key.ends_with(&format!("/{}", relative)) || key.as_str() == relative)
            .map(|(_, (content, _))| content.clone())
    }

    fn take_failure(&self, key: &str) -> bool {
        let mut failures = self.failures.lock().unwrap();
        for (suffix, remaining) in failures.iter_mut() {
            if key.ends_with(suffix.as_str()) && *remaining > 0 {
                *remaining -= 1;
                return true;
            }
        }
        false
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn create_bucket(&self, name: &str) -> Result<()> {
        if self.existing_bucket.load(Ordering::SeqCst) {
            return Err(CloudError::ResourceAlreadyExists(name.to_string()));
        }
        self.buckets.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content: &mut File,
        content_type: &str,
    ) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let mut body = Vec::new();
        content.read_to_end(&mut body).await?;

        if self.take_failure(key) {
            return Err(CloudError::api(
                ResourceKind::Bucket,
                format!("connection reset uploading {}/{}", bucket, key),
            ));
        }

        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (body, content_type.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakePurge {
    pub wildcards: Mutex<Vec<Vec<String>>>,
    pub urls: Mutex<Vec<(Vec<String>, String)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl PurgeClient for FakePurge {
    async fn purge_wildcard(&self, domains: &[String]) -> Result<()> {
        self.wildcards.lock().unwrap().push(domains.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            return Err(CloudError::Purge("purge endpoint unavailable".to_string()));
        }
        Ok(())
    }

    async fn purge_urls(&self, domains: &[String], path: &str) -> Result<()> {
        self.urls
            .lock()
            .unwrap()
            .push((domains.to_vec(), path.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(CloudError::Purge("purge endpoint unavailable".to_string()));
        }
        Ok(())
    }
}

/// Every fake collaborator of one test
pub struct Harness {
    pub applications: Arc<FakeResources<ApplicationRequest>>,
    pub origins: Arc<FakeResources<OriginRequest>>,
    pub cache_settings: Arc<FakeResources<CacheSettingRequest>>,
    pub connectors: Arc<FakeResources<ConnectorRequest>>,
    pub functions: Arc<FakeResources<FunctionRequest>>,
    pub function_instances: Arc<FakeResources<FunctionInstanceRequest>>,
    pub rules: Arc<FakeResources<RuleRequest>>,
    pub workloads: Arc<FakeResources<WorkloadRequest>>,
    pub storage: Arc<FakeStorage>,
    pub purge: Arc<FakePurge>,
}

impl Harness {
    pub fn new() -> Self {
        let ids = Arc::new(AtomicU64::new(1));
        Self {
            applications: Arc::new(FakeResources::new(ResourceKind::Application, ids.clone())),
            origins: Arc::new(
                FakeResources::new(ResourceKind::Origin, ids.clone()).decorated(|r| {
                    let key = format!("origin-key-{}", r.id);
                    r.with_attribute(ATTR_ORIGIN_KEY, json!(key))
                }),
            ),
            cache_settings: Arc::new(FakeResources::new(ResourceKind::CacheSetting, ids.clone())),
            connectors: Arc::new(FakeResources::new(ResourceKind::Connector, ids.clone())),
            functions: Arc::new(FakeResources::new(ResourceKind::Function, ids.clone())),
            function_instances: Arc::new(FakeResources::new(
                ResourceKind::FunctionInstance,
                ids.clone(),
            )),
            rules: Arc::new(FakeResources::new(ResourceKind::Rule, ids.clone())),
            workloads: Arc::new(
                FakeResources::new(ResourceKind::Workload, ids).decorated(|r| {
                    let domain = format!("w{}.edge.example.net", r.id);
                    r.with_attribute(ATTR_DOMAIN, json!(domain))
                }),
            ),
            storage: Arc::new(FakeStorage::default()),
            purge: Arc::new(FakePurge::default()),
        }
    }

    pub fn clients(&self) -> Clients {
        Clients {
            applications: self.applications.clone(),
            origins: self.origins.clone(),
            cache_settings: self.cache_settings.clone(),
            connectors: self.connectors.clone(),
            functions: self.functions.clone(),
            function_instances: self.function_instances.clone(),
            rules: self.rules.clone(),
            workloads: self.workloads.clone(),
            storage: self.storage.clone(),
            purge: self.purge.clone(),
        }
    }

    pub fn creates(&self) -> usize {
        self.applications.creates()
            + self.origins.creates()
            + self.cache_settings.creates()
            + self.connectors.creates()
            + self.functions.creates()
            + self.function_instances.creates()
            + self.rules.creates()
            + self.workloads.creates()
    }

    pub fn deletes(&self) -> usize {
        self.origins.deletes()
            + self.cache_settings.deletes()
            + self.connectors.deletes()
            + self.rules.deletes()
    }
}

/// Manifest with one application, object storage origin, cache setting and
/// a rule tying them together
pub const SITE_MANIFEST: &str = r#"{
    "applications": [{"name": "Site"}],
    "origins": [{"name": "static", "originType": "object_storage"}],
    "cacheSettings": [{"name": "default", "cdnCacheSettingsMaximumTtl": 3600}],
    "rules": [{
        "name": "Deliver",
        "behaviors": [
            {"name": "set_origin", "target": "static"},
            {"name": "set_cache_policy", "target": "default"}
        ]
    }],
    "workloads": [{"name": "site", "domains": ["www.example.com"]}]
}"#;
