//! Stack: the set of descriptors one plan is computed from

use super::{Descriptor, LookupMode, Properties, PropertyValue, ResourceKind};
use crate::error::{PlanError, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::debug;

static ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*$").unwrap());

/// Named set of descriptors
#[derive(Debug, Clone, Default)]
pub struct Stack {
    name: String,
    descriptors: BTreeMap<String, Descriptor>,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptors: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Register a descriptor
    ///
    /// Only checks what can be checked without looking at other descriptors:
    /// the id, uniqueness, and whether the kind may represent an existing
    /// object. References are stored as written.
    pub fn define_resource(
        &mut self,
        kind: ResourceKind,
        id: impl Into<String>,
        properties: Properties,
        lookup_mode: Option<LookupMode>,
    ) -> Result<&Descriptor> {
        let id = id.into();
        validate_id(&id)?;

        if self.descriptors.contains_key(&id) {
            return Err(PlanError::DuplicateId(id));
        }

        match lookup_mode {
            Some(mode) if !kind.can_be_external() => {
                return Err(PlanError::InvalidConfig(format!(
                    "{} '{}' is always created by the stack and cannot use lookup mode '{}'",
                    kind, id, mode
                )));
            }
            None if kind.must_be_external() => {
                return Err(PlanError::InvalidConfig(format!(
                    "{} '{}' refers to an existing instance and needs a lookup mode",
                    kind, id
                )));
            }
            Some(_) => {
                // existing objects are resolved outside the graph
                if let Some((property, reference)) = properties
                    .iter()
                    .find_map(|(name, v)| v.references().first().map(|r| (name, (*r).clone())))
                {
                    return Err(PlanError::InvalidConfig(format!(
                        "external {} '{}' cannot reference '{}' (property '{}')",
                        kind, id, reference, property
                    )));
                }
            }
            None => {}
        }

        debug!(id = %id, kind = %kind, lookup = ?lookup_mode, "Defined resource");
        let descriptor = Descriptor::new(id.clone(), kind, properties, lookup_mode);
        Ok(self.descriptors.entry(id).or_insert(descriptor))
    }

    pub fn get(&self, id: &str) -> Option<&Descriptor> {
        self.descriptors.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.descriptors.contains_key(id)
    }

    /// Descriptors in id order
    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.values()
    }

    pub fn by_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.values().filter(move |d| d.kind() == kind)
    }

    /// Copy of the stack where every proxy target belongs to a target group
    ///
    /// Targets no `ProxyTargetAssociation` covers go into a new
    /// `<Proxy>TargetGroup`. The KDL `target` shorthand already creates one,
    /// so parsed stacks usually come back unchanged.
    pub fn with_target_associations(&self) -> Result<Stack> {
        let mut missing: Vec<(String, Vec<PropertyValue>)> = Vec::new();

        for proxy in self.by_kind(ResourceKind::Proxy) {
            let covered: BTreeSet<&str> = self
                .by_kind(ResourceKind::ProxyTargetAssociation)
                .filter(|a| {
                    a.references_in("proxy")
                        .iter()
                        .any(|r| r.target_id == proxy.id())
                })
                .flat_map(|a| a.references_in("databases"))
                .map(|r| r.target_id.as_str())
                .collect();

            let uncovered: Vec<PropertyValue> = proxy
                .references_in("targets")
                .into_iter()
                .filter(|r| !covered.contains(r.target_id.as_str()))
                .filter(|r| {
                    self.get(&r.target_id)
                        .is_some_and(|d| d.kind() == ResourceKind::DatabaseInstanceRef)
                })
                .map(|r| PropertyValue::Reference(r.clone()))
                .collect();
            if !uncovered.is_empty() {
                missing.push((proxy.id().to_string(), uncovered));
            }
        }

        let mut stack = self.clone();
        for (proxy, databases) in missing {
            let mut association = Properties::new();
            association.insert(
                "proxy".to_string(),
                PropertyValue::reference(proxy.as_str(), "name"),
            );
            association.insert("databases".to_string(), PropertyValue::List(databases));
            let association_id = format!("{}TargetGroup", proxy);
            if stack.contains(&association_id) {
                return Err(PlanError::InvalidConfig(format!(
                    "proxy '{}' has targets outside '{}'; list them there",
                    proxy, association_id
                )));
            }
            debug!(proxy = %proxy, association = %association_id, "Added target association");
            stack.define_resource(
                ResourceKind::ProxyTargetAssociation,
                association_id,
                association,
                None,
            )?;
        }
        Ok(stack)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

fn validate_id(id: &str) -> Result<()> {
    if ID_RE.is_match(id) {
        Ok(())
    } else {
        Err(PlanError::InvalidId(id.to_string()))
    }
}
