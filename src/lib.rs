//! Model Registry - catalog and discovery of machine-learning model artifacts
//!
//! Tracks model records from a remote hub, the local filesystem and custom
//! HTTP manifests, persists them to a JSON manifest, and supports search and
//! usage analytics.

pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod progress;
pub mod registry;
pub mod search;
pub mod sources;
pub mod state;
pub mod usage;

pub use config::RegistryConfig;
pub use discovery::{DiscoveryCache, DiscoveryEngine, SourceOutcome};
pub use error::{RegistryError, RegistryResult, SourceError};
pub use models::{ModelFormat, ModelRecord, ModelSource, ModelType};
pub use progress::{OperationEvent, OperationState, OperationStatus, OperationTracker};
pub use registry::{Registry, RegistryEvent};
pub use search::SearchQuery;
pub use sources::{KnownModels, SourceAdapter};
pub use state::{ManifestStore, RegistrySnapshot, StorageBackend};
pub use usage::{UsageEvent, UsageStats, UsageTracker};
