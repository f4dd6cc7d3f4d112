//! External lookup collaborator
//!
//! The core never talks to an inventory service directly. Live queries are
//! prefetched by an async provider (see `proxyflow-cloud`) into a
//! [`LookupCache`], which the synchronous resolver consults through
//! [`ExternalLookup`].

use crate::context::StackContext;
use crate::error::{PlanError, Result};
use crate::model::{Descriptor, LookupMode, PropertyValue, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Concrete attribute values of a realized descriptor
pub type Attributes = BTreeMap<String, Value>;

/// Lookup failures, kept apart from stack errors so callers can retry a plan
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("no existing object matches {key}")]
    NotFound { key: String },

    #[error("{count} existing objects match {key}, expected exactly one")]
    Ambiguous { key: String, count: usize },

    #[error("inventory unavailable for {key}: {message}")]
    Unavailable { key: String, message: String },

    #[error("explicit attribute set of '{id}' is missing {}", .missing.join(", "))]
    IncompleteAttributes { id: String, missing: Vec<String> },

    #[error("no inventory provider configured to look up {key}")]
    NoProvider { key: String },
}

/// Query for an existing object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LookupRequest {
    pub kind: ResourceKind,
    pub criteria: BTreeMap<String, String>,
}

impl LookupRequest {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            criteria: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.criteria.insert(key.into(), value.into());
        self
    }

    /// Stable cache key, e.g. `Network?isDefault=true`
    pub fn key(&self) -> String {
        let criteria: Vec<String> = self
            .criteria
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}?{}", self.kind, criteria.join("&"))
    }

    /// Build the request a `default` lookup descriptor stands for
    ///
    /// Every property becomes a criterion; nested blocks flatten to dotted
    /// keys (`tags { Name "prod" }` → `tags.Name=prod`) and lists join with
    /// commas.
    pub fn from_descriptor(descriptor: &Descriptor, config: &StackContext) -> Result<Self> {
        if descriptor.lookup_mode() != Some(LookupMode::Default) {
            return Err(PlanError::InvalidConfig(format!(
                "'{}' does not use default lookup",
                descriptor.id()
            )));
        }

        let mut request = LookupRequest::new(descriptor.kind());
        for (name, value) in descriptor.properties() {
            flatten_criterion(&mut request.criteria, name, value, config)?;
        }
        Ok(request)
    }
}

fn flatten_criterion(
    criteria: &mut BTreeMap<String, String>,
    name: &str,
    value: &PropertyValue,
    config: &StackContext,
) -> Result<()> {
    match value {
        PropertyValue::Object(map) => {
            for (child, v) in map {
                flatten_criterion(criteria, &format!("{}.{}", name, child), v, config)?;
            }
        }
        other => {
            let resolved = config.resolve_value(other)?;
            criteria.insert(name.to_string(), criterion_string(&resolved));
        }
    }
    Ok(())
}

fn criterion_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(criterion_string)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

/// Synchronous view of the inventory
pub trait ExternalLookup {
    /// Return the single object matching the request
    fn lookup(&self, request: &LookupRequest) -> std::result::Result<Attributes, LookupError>;
}

/// Lookup used when no provider is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl ExternalLookup for NoLookup {
    fn lookup(&self, request: &LookupRequest) -> std::result::Result<Attributes, LookupError> {
        Err(LookupError::NoProvider { key: request.key() })
    }
}

/// Results of one prefetch, valid for a single plan computation
#[derive(Debug, Clone, Default)]
pub struct LookupCache {
    entries: BTreeMap<String, Vec<Attributes>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every match the inventory returned for a request
    pub fn insert(&mut self, request: &LookupRequest, matches: Vec<Attributes>) {
        debug!(key = %request.key(), matches = matches.len(), "Caching lookup result");
        self.entries.insert(request.key(), matches);
    }

    pub fn contains(&self, request: &LookupRequest) -> bool {
        self.entries.contains_key(&request.key())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ExternalLookup for LookupCache {
    fn lookup(&self, request: &LookupRequest) -> std::result::Result<Attributes, LookupError> {
        let key = request.key();
        let matches = self
            .entries
            .get(&key)
            .ok_or_else(|| LookupError::NoProvider { key: key.clone() })?;

        match matches.as_slice() {
            [single] => Ok(single.clone()),
            [] => Err(LookupError::NotFound { key }),
            many => Err(LookupError::Ambiguous {
                key,
                count: many.len(),
            }),
        }
    }
}

/// Collect the distinct requests of every `default` lookup descriptor in a stack
pub fn pending_requests<'a>(
    descriptors: impl IntoIterator<Item = &'a Descriptor>,
    config: &StackContext,
) -> Result<Vec<LookupRequest>> {
    let mut requests = BTreeMap::new();
    for descriptor in descriptors {
        if descriptor.lookup_mode() == Some(LookupMode::Default) {
            let request = LookupRequest::from_descriptor(descriptor, config)?;
            requests.entry(request.key()).or_insert(request);
        }
    }
    Ok(requests.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Properties, Stack};
    use serde_json::json;

    fn attrs(pairs: &[(&str, Value)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_request_key_is_stable() {
        let a = LookupRequest::new(ResourceKind::Network)
            .with("isDefault", "true")
            .with("subnetType", "private");
        let b = LookupRequest::new(ResourceKind::Network)
            .with("subnetType", "private")
            .with("isDefault", "true");
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), "Network?isDefault=true&subnetType=private");
    }

    #[test]
    fn test_cache_requires_exactly_one_match() {
        let request = LookupRequest::new(ResourceKind::CredentialSecret).with("name", "db");
        let mut cache = LookupCache::new();

        cache.insert(&request, vec![]);
        assert!(matches!(
            cache.lookup(&request),
            Err(LookupError::NotFound { .. })
        ));

        cache.insert(
            &request,
            vec![
                attrs(&[("arn", json!("arn:1"))]),
                attrs(&[("arn", json!("arn:2"))]),
            ],
        );
        assert!(matches!(
            cache.lookup(&request),
            Err(LookupError::Ambiguous { count: 2, .. })
        ));

        cache.insert(&request, vec![attrs(&[("arn", json!("arn:1"))])]);
        assert_eq!(cache.lookup(&request).unwrap()["arn"], json!("arn:1"));
    }

    #[test]
    fn test_cache_miss_is_reported() {
        let request = LookupRequest::new(ResourceKind::Network).with("isDefault", "true");
        let err = LookupCache::new().lookup(&request).unwrap_err();
        assert!(matches!(err, LookupError::NoProvider { .. }));
    }

    #[test]
    fn test_pending_requests_deduplicated() {
        let mut stack = Stack::new("test");
        for id in ["VpcA", "VpcB"] {
            let mut props = Properties::new();
            props.insert("isDefault".to_string(), PropertyValue::literal(true));
            stack
                .define_resource(
                    ResourceKind::Network,
                    id,
                    props,
                    Some(LookupMode::Default),
                )
                .unwrap();
        }

        let requests = pending_requests(stack.iter(), &StackContext::new()).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].key(), "Network?isDefault=true");
    }

    #[test]
    fn test_request_flattens_nested_criteria() {
        let mut stack = Stack::new("test");
        let mut tags = BTreeMap::new();
        tags.insert("Name".to_string(), PropertyValue::env("PROXYFLOW_VPC_NAME"));
        let mut props = Properties::new();
        props.insert("tags".to_string(), PropertyValue::Object(tags));
        let descriptor = stack
            .define_resource(ResourceKind::Network, "Vpc", props, Some(LookupMode::Default))
            .unwrap();

        let config = StackContext::from_pairs([("PROXYFLOW_VPC_NAME", "payments")]);
        let request = LookupRequest::from_descriptor(descriptor, &config).unwrap();
        assert_eq!(request.criteria["tags.Name"], "payments");
    }
}
