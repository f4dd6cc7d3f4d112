//! Resource descriptors

use super::{LookupMode, PropertyValue, Reference, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type Properties = BTreeMap<String, PropertyValue>;

/// Declarative record of one infrastructure object
///
/// Descriptors are immutable once defined; references inside `properties`
/// stay unevaluated until planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    id: String,
    kind: ResourceKind,
    properties: Properties,
    lookup_mode: Option<LookupMode>,
}

impl Descriptor {
    pub(crate) fn new(
        id: String,
        kind: ResourceKind,
        properties: Properties,
        lookup_mode: Option<LookupMode>,
    ) -> Self {
        Self {
            id,
            kind,
            properties,
            lookup_mode,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn lookup_mode(&self) -> Option<LookupMode> {
        self.lookup_mode
    }

    /// Whether the descriptor stands for an object this stack does not create
    pub fn is_external(&self) -> bool {
        self.lookup_mode.is_some()
    }

    /// References grouped by the property holding them
    pub fn references(&self) -> Vec<(&str, &Reference)> {
        self.properties
            .iter()
            .flat_map(|(name, value)| {
                value
                    .references()
                    .into_iter()
                    .map(move |r| (name.as_str(), r))
            })
            .collect()
    }

    /// References held by a single property
    pub fn references_in(&self, property: &str) -> Vec<&Reference> {
        self.property(property)
            .map(|v| v.references())
            .unwrap_or_default()
    }

    /// Ids of the descriptors this one depends on
    pub fn dependencies(&self) -> BTreeSet<&str> {
        self.references()
            .into_iter()
            .map(|(_, r)| r.target_id.as_str())
            .collect()
    }

    /// Context keys read by this descriptor
    pub fn env_keys(&self) -> BTreeSet<&str> {
        self.properties.values().flat_map(|v| v.env_keys()).collect()
    }
}
