//! EdgeFlow Cloud
//!
//! Deploys a declarative edge manifest to an edge-computing platform.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  EdgeFlow CLI                    │
//! │            (edge plan/status/changes)            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                edgeflow-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   Deployer: reconcile → upload → purge    │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │   Manifest   │  │  State Mgmt  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │   resource    │ │ storage/purge │
//! │   clients     │ │    clients    │
//! └───────────────┘ └───────────────┘
//! ```
//!
//! The transport behind the client traits in [`client`] is supplied by the
//! caller.

pub mod action;
pub mod client;
pub mod deploy;
pub mod error;
pub mod fingerprint;
pub mod manifest;
pub mod progress;
pub mod purge;
pub mod reconcile;
pub mod request;
pub mod resolver;
pub mod state;
pub mod upload;

// Re-exports
pub use action::{Action, ActionType, Plan, PlanSummary, ReconcileEvent, ReconcileReport};
pub use client::{
    Clients, PurgeClient, RemoteResource, ResourceClient, ResourceKind, RetryConfig, Scope,
    StorageClient,
};
pub use deploy::{DeployOptions, DeployReport, Deployer};
pub use error::{CloudError, Result};
pub use fingerprint::{Fingerprint, FingerprintDiff, FingerprintStore};
pub use manifest::{Manifest, RulePhase};
pub use purge::{ChangePurge, PurgeMode, PurgeReport};
pub use reconcile::Reconciler;
pub use resolver::CrossReferenceResolver;
pub use state::{LocalState, StateManager};
pub use upload::{UploadOptions, UploadPipeline, UploadSummary};
