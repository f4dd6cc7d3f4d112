//! Lookup prefetch and the static inventory

use crate::error::{CloudError, Result};
use crate::provider::{AuthStatus, InventoryProvider};
use async_trait::async_trait;
use proxyflow_core::{
    Attributes, LookupCache, LookupError, LookupRequest, PlanError, Stack, StackContext,
    pending_requests,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Ask a provider for every `default` lookup of a stack
///
/// Each distinct lookup key is queried exactly once. Provider failures are
/// reported as [`LookupError::Unavailable`] so the caller can tell them apart
/// from stack errors and retry the whole plan. Missing configuration is
/// reported first, all keys at once.
#[instrument(skip_all, fields(stack = %stack.name(), provider = provider.name()))]
pub async fn prefetch(
    stack: &Stack,
    config: &StackContext,
    provider: &dyn InventoryProvider,
) -> proxyflow_core::Result<LookupCache> {
    // report every missing key before any lookup criteria are built
    config.require_all(stack)?;
    let requests = pending_requests(stack.iter(), config)?;
    let mut cache = LookupCache::new();

    for request in &requests {
        let key = request.key();
        debug!(key = %key, "Looking up existing object");
        let matches = provider.find(request).await.map_err(|e| {
            warn!(key = %key, error = %e, "Lookup failed");
            PlanError::ExternalLookup(LookupError::Unavailable {
                key: key.clone(),
                message: e.to_string(),
            })
        })?;
        debug!(key = %key, matches = matches.len(), "Lookup answered");
        cache.insert(request, matches);
    }

    info!(lookups = cache.len(), "Prefetched lookups");
    Ok(cache)
}

/// Inventory backed by a JSON file
///
/// The file maps lookup keys to every matching object:
///
/// ```json
/// {
///   "Network?isDefault=true": [
///     { "vpcId": "vpc-0abc", "subnetIds": ["subnet-a"], "availabilityZones": ["eu-west-1a"] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    source: Option<PathBuf>,
    entries: BTreeMap<String, Vec<Attributes>>,
}

impl StaticInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an inventory file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let entries: BTreeMap<String, Vec<Attributes>> =
            serde_json::from_str(&content).map_err(|e| CloudError::InventoryFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        debug!(path = %path.display(), keys = entries.len(), "Loaded static inventory");
        Ok(Self {
            source: Some(path.to_path_buf()),
            entries,
        })
    }

    pub fn insert(&mut self, request: &LookupRequest, matches: Vec<Attributes>) {
        self.entries.insert(request.key(), matches);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl InventoryProvider for StaticInventory {
    fn name(&self) -> &str {
        "static"
    }

    fn display_name(&self) -> &str {
        "Static inventory file"
    }

    async fn check_auth(&self) -> Result<AuthStatus> {
        Ok(match &self.source {
            Some(path) => AuthStatus::ok(path.display().to_string()),
            None => AuthStatus::ok("in-memory"),
        })
    }

    async fn find(&self, request: &LookupRequest) -> Result<Vec<Attributes>> {
        Ok(self
            .entries
            .get(&request.key())
            .cloned()
            .unwrap_or_default())
    }
}
