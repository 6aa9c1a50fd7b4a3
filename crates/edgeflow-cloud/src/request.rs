//! Request payloads sent to the resource clients
//!
//! Each builder merges a manifest entry with what the local state already
//! knows. Builders are pure: the same manifest and state always produce the
//! same payload, which keeps repeated deploys idempotent.

use crate::manifest::{
    CacheMode, Criterion, ManifestApplication, ManifestCacheSetting, ManifestConnector,
    ManifestFunction, ManifestOrigin, ManifestWorkload, OriginAddress, OriginType, RawBehavior,
    RulePhase,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRequest {
    pub name: String,
    pub active: bool,
    pub debug: bool,
    pub http3: bool,
    pub delivery_protocol: String,
    pub http_port: Vec<u16>,
    pub https_port: Vec<u16>,
    pub minimum_tls_version: Option<String>,
    pub caching: bool,
    pub edge_functions: bool,
    pub application_accelerator: bool,
    pub image_processor: bool,
}

impl ApplicationRequest {
    /// `has_function` forces the edge functions module on
    pub fn build(app: &ManifestApplication, has_function: bool) -> Self {
        let delivery_protocol = if app.https_port.is_empty() {
            "http"
        } else {
            "http,https"
        };
        Self {
            name: app.name.clone(),
            active: app.active,
            debug: app.debug,
            http3: app.http3,
            delivery_protocol: delivery_protocol.to_string(),
            http_port: app.http_port.clone(),
            https_port: app.https_port.clone(),
            minimum_tls_version: app.minimum_tls_version.clone(),
            caching: app.modules.caching,
            edge_functions: app.modules.edge_functions || has_function,
            application_accelerator: app.modules.application_accelerator,
            image_processor: app.modules.image_processor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginRequest {
    pub name: String,
    pub origin_type: OriginType,
    pub addresses: Vec<OriginAddress>,
    pub origin_protocol_policy: String,
    pub host_header: String,
    pub origin_path: String,
    pub hmac_authentication: bool,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
}

impl OriginRequest {
    /// Object-storage origins without their own bucket point at the deploy
    /// bucket and the current version prefix
    pub fn build(origin: &ManifestOrigin, bucket: &str, prefix: &str) -> Self {
        let (bucket, prefix) = match origin.origin_type {
            OriginType::ObjectStorage => (
                Some(origin.bucket.clone().unwrap_or_else(|| bucket.to_string())),
                Some(origin.prefix.clone().unwrap_or_else(|| prefix.to_string())),
            ),
            _ => (origin.bucket.clone(), origin.prefix.clone()),
        };
        Self {
            name: origin.name.clone(),
            origin_type: origin.origin_type,
            addresses: origin.addresses.clone(),
            origin_protocol_policy: origin.origin_protocol_policy.clone(),
            host_header: origin.host_header.clone(),
            origin_path: origin.origin_path.clone(),
            hmac_authentication: origin.hmac_authentication,
            bucket,
            prefix,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettingRequest {
    pub name: String,
    pub browser_cache_settings: CacheMode,
    pub browser_cache_settings_maximum_ttl: u32,
    pub cdn_cache_settings: CacheMode,
    pub cdn_cache_settings_maximum_ttl: u32,
    pub cache_by_query_string: String,
    pub query_string_fields: Vec<String>,
    pub enable_query_string_sort: bool,
    pub cache_by_cookies: String,
    pub cookie_names: Vec<String>,
    pub enable_caching_for_post: bool,
    pub enable_caching_for_options: bool,
}

impl CacheSettingRequest {
    pub fn build(cache: &ManifestCacheSetting) -> Self {
        Self {
            name: cache.name.clone(),
            browser_cache_settings: cache.browser_cache_settings,
            browser_cache_settings_maximum_ttl: cache.browser_cache_settings_maximum_ttl,
            cdn_cache_settings: cache.cdn_cache_settings,
            cdn_cache_settings_maximum_ttl: cache.cdn_cache_settings_maximum_ttl,
            cache_by_query_string: cache.cache_by_query_string.clone(),
            query_string_fields: cache.query_string_fields.clone(),
            enable_query_string_sort: cache.enable_query_string_sort,
            cache_by_cookies: cache.cache_by_cookies.clone(),
            cookie_names: cache.cookie_names.clone(),
            enable_caching_for_post: cache.enable_caching_for_post,
            enable_caching_for_options: cache.enable_caching_for_options,
        }
    }

    /// Policy that honors origin headers on both browser and CDN side
    pub fn honor(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            browser_cache_settings: CacheMode::Honor,
            browser_cache_settings_maximum_ttl: 0,
            cdn_cache_settings: CacheMode::Honor,
            cdn_cache_settings_maximum_ttl: crate::manifest::default_cdn_ttl(),
            cache_by_query_string: crate::manifest::default_ignore(),
            query_string_fields: Vec::new(),
            enable_query_string_sort: false,
            cache_by_cookies: crate::manifest::default_ignore(),
            cookie_names: Vec::new(),
            enable_caching_for_post: false,
            enable_caching_for_options: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorRequest {
    pub name: String,
    pub connector_type: String,
    pub active: bool,
    pub attributes: serde_json::Value,
}

impl ConnectorRequest {
    pub fn build(connector: &ManifestConnector) -> Self {
        Self {
            name: connector.name.clone(),
            connector_type: connector.connector_type.clone(),
            active: connector.active,
            attributes: connector.attributes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRequest {
    pub name: String,
    pub code_path: PathBuf,
    pub active: bool,
}

impl FunctionRequest {
    pub fn build(function: &ManifestFunction) -> Self {
        Self {
            name: function.name.clone(),
            code_path: function.path.clone(),
            active: function.active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInstanceRequest {
    pub name: String,
    pub function_id: u64,
    pub args: serde_json::Value,
}

impl FunctionInstanceRequest {
    pub fn build(function: &ManifestFunction, function_id: u64) -> Self {
        Self {
            name: function.name.clone(),
            function_id,
            args: function.args.clone(),
        }
    }
}

/// Rule with every behavior already resolved to remote identifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRequest {
    pub name: String,
    pub phase: RulePhase,
    pub description: String,
    pub active: bool,
    /// Position among the rules of the same phase, starting at 1
    pub order: usize,
    pub criteria: Vec<Vec<Criterion>>,
    pub behaviors: Vec<RawBehavior>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadRequest {
    pub name: String,
    pub edge_application_id: u64,
    pub domains: Vec<String>,
    pub active: bool,
    pub http3: bool,
    pub certificate_id: Option<u64>,
}

impl WorkloadRequest {
    pub fn build(workload: &ManifestWorkload, application_id: u64) -> Self {
        Self {
            name: workload.name.clone(),
            edge_application_id: application_id,
            domains: workload.domains.clone(),
            active: workload.active,
            http3: workload.http3,
            certificate_id: workload.certificate_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;

    #[test]
    fn test_object_storage_origin_defaults_to_deploy_bucket() {
        let manifest = Manifest::parse(
            r#"{"applications": [{"name": "site"}],
                "origins": [
                    {"name": "static", "originType": "object_storage"},
                    {"name": "api", "addresses": [{"address": "api.example.com"}]}
                ]}"#,
        )
        .unwrap();

        let storage = OriginRequest::build(&manifest.origins[0], "site-assets", "20260101000000");
        assert_eq!(storage.bucket.as_deref(), Some("site-assets"));
        assert_eq!(storage.prefix.as_deref(), Some("20260101000000"));

        let api = OriginRequest::build(&manifest.origins[1], "site-assets", "20260101000000");
        assert_eq!(api.bucket, None);
        assert_eq!(api.addresses[0].address, "api.example.com");
    }

    #[test]
    fn test_application_enables_functions_module() {
        let manifest = Manifest::parse(r#"{"applications": [{"name": "site"}]}"#).unwrap();
        let app = manifest.application().unwrap();

        assert!(!ApplicationRequest::build(app, false).edge_functions);
        assert!(ApplicationRequest::build(app, true).edge_functions);
        assert_eq!(ApplicationRequest::build(app, false).delivery_protocol, "http,https");
    }

    #[test]
    fn test_honor_policy() {
        let policy = CacheSettingRequest::honor("site-function-cache");
        assert_eq!(policy.browser_cache_settings, CacheMode::Honor);
        assert_eq!(policy.cdn_cache_settings, CacheMode::Honor);
        assert_eq!(policy.cdn_cache_settings_maximum_ttl, 60);
    }
}
