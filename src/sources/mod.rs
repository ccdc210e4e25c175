//! Discovery source adapters
//!
//! Each origin of model records implements [`SourceAdapter`]. The discovery
//! engine looks adapters up by [`ModelSource`], so a new origin only needs a
//! new implementation here.

use crate::error::SourceError;
use crate::models::{ModelRecord, ModelSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub mod custom;
pub mod hub;
pub mod local;

pub use custom::{CustomHttpAdapter, CustomSource, CustomSourcesFile};
pub use hub::{HubClient, HubModelInfo, HubModelSummary, RemoteHubAdapter};
pub use local::LocalFilesystemAdapter;

/// Registered state adapters consult to skip unchanged entries
#[derive(Debug, Clone)]
pub struct KnownVersion {
    pub version: String,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Read-only view of the registry taken at the start of a discovery pass
#[derive(Debug, Clone, Default)]
pub struct KnownModels {
    entries: HashMap<String, KnownVersion>,
}

impl KnownModels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ModelRecord>,
    {
        let entries = records
            .into_iter()
            .map(|r| {
                (
                    r.id.clone(),
                    KnownVersion {
                        version: r.version.clone(),
                        last_updated: r.last_updated,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&KnownVersion> {
        self.entries.get(id)
    }

    /// Whether `id` is registered with exactly this version token
    pub fn has_version(&self, id: &str, version: &str) -> bool {
        self.entries.get(id).is_some_and(|k| k.version == version)
    }
}

/// A single origin of model records
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source this adapter produces records for
    fn source(&self) -> ModelSource;

    /// Fetch records from the origin
    ///
    /// An `Err` is scoped to this adapter; the engine logs it and carries on
    /// with the remaining sources.
    async fn discover(&self, known: &KnownModels) -> Result<Vec<ModelRecord>, SourceError>;
}
