//! Reference resolution
//!
//! A [`ResolutionContext`] holds the attributes of every descriptor realized
//! so far. Resolving a reference against it yields either the concrete value
//! or a [`DeferredBinding`] the emitter fills once the producer is realized.

use crate::context::StackContext;
use crate::error::{PlanError, Result};
use crate::lookup::{Attributes, ExternalLookup, LookupError, LookupRequest};
use crate::model::{Descriptor, LookupMode, PropertyValue, Reference, ResourceKind, Stack};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Slot waiting for an attribute of a descriptor not realized yet
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeferredBinding {
    pub target_id: String,
    pub attribute: String,
}

impl From<&Reference> for DeferredBinding {
    fn from(reference: &Reference) -> Self {
        Self {
            target_id: reference.target_id.clone(),
            attribute: reference.attribute.clone(),
        }
    }
}

impl std::fmt::Display for DeferredBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.target_id, self.attribute)
    }
}

/// Outcome of resolving one reference
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Value(Value),
    Deferred(DeferredBinding),
}

/// Property value with every reference resolved or deferred
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Value(Value),
    Deferred(DeferredBinding),
    List(Vec<ResolvedValue>),
    Object(BTreeMap<String, ResolvedValue>),
}

impl ResolvedValue {
    /// Fill every slot waiting on `producer` from its realized attributes
    pub fn fill(&mut self, producer: &str, attributes: &Attributes) {
        match self {
            ResolvedValue::Deferred(binding) if binding.target_id == producer => {
                if let Some(value) = attributes.get(&binding.attribute) {
                    *self = ResolvedValue::Value(value.clone());
                }
            }
            ResolvedValue::List(items) => {
                items.iter_mut().for_each(|i| i.fill(producer, attributes))
            }
            ResolvedValue::Object(map) => {
                map.values_mut().for_each(|v| v.fill(producer, attributes))
            }
            ResolvedValue::Value(_) | ResolvedValue::Deferred(_) => {}
        }
    }

    /// First slot still waiting, if any
    pub fn first_deferred(&self) -> Option<&DeferredBinding> {
        match self {
            ResolvedValue::Deferred(binding) => Some(binding),
            ResolvedValue::List(items) => items.iter().find_map(|i| i.first_deferred()),
            ResolvedValue::Object(map) => map.values().find_map(|v| v.first_deferred()),
            ResolvedValue::Value(_) => None,
        }
    }

    /// Concrete JSON, or `None` while a slot is still waiting
    pub fn to_value(&self) -> Option<Value> {
        match self {
            ResolvedValue::Value(v) => Some(v.clone()),
            ResolvedValue::Deferred(_) => None,
            ResolvedValue::List(items) => items
                .iter()
                .map(|i| i.to_value())
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            ResolvedValue::Object(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), v.to_value()?);
                }
                Some(Value::Object(out))
            }
        }
    }
}

/// Attributes a managed descriptor exposes to the backend
///
/// Most are intrinsic references; a secret's name is known up front when the
/// stack names it.
pub fn managed_attributes(descriptor: &Descriptor) -> Attributes {
    let kind = descriptor.kind();
    kind.attributes()
        .iter()
        .filter_map(|attribute| {
            managed_attribute(descriptor, attribute).map(|v| (attribute.to_string(), v))
        })
        .collect()
}

fn managed_attribute(descriptor: &Descriptor, attribute: &str) -> Option<Value> {
    match (descriptor.kind(), attribute) {
        (ResourceKind::CredentialSecret, "name") => descriptor
            .property("secretName")
            .and_then(|v| v.as_str())
            .map(|s| Value::String(s.to_string())),
        (kind, attribute) => kind.intrinsic(descriptor.id(), attribute),
    }
}

/// Attributes of descriptors realized during one plan computation
pub struct ResolutionContext<'a> {
    stack: &'a Stack,
    config: &'a StackContext,
    lookups: &'a dyn ExternalLookup,
    realized: BTreeMap<String, Attributes>,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(stack: &'a Stack, config: &'a StackContext, lookups: &'a dyn ExternalLookup) -> Self {
        Self {
            stack,
            config,
            lookups,
            realized: BTreeMap::new(),
        }
    }

    pub fn stack(&self) -> &'a Stack {
        self.stack
    }

    pub fn config(&self) -> &'a StackContext {
        self.config
    }

    pub fn is_realized(&self, id: &str) -> bool {
        self.realized.contains_key(id)
    }

    pub fn attributes(&self, id: &str) -> Option<&Attributes> {
        self.realized.get(id)
    }

    /// Realize every external descriptor
    ///
    /// Externals have no incoming edges from the graph's point of view, so
    /// they can be realized before any managed descriptor.
    #[instrument(skip(self), fields(stack = %self.stack.name()))]
    pub fn realize_external(&mut self) -> Result<()> {
        let stack = self.stack;
        for descriptor in stack.iter().filter(|d| d.is_external()) {
            if !self.realized.contains_key(descriptor.id()) {
                let attributes = self.external_attributes(descriptor)?;
                self.realized.insert(descriptor.id().to_string(), attributes);
            }
        }
        Ok(())
    }

    /// Realize one descriptor and return its attributes
    pub fn realize(&mut self, id: &str) -> Result<&Attributes> {
        if !self.realized.contains_key(id) {
            let descriptor = self.stack.get(id).ok_or_else(|| {
                PlanError::InvalidConfig(format!("cannot realize unknown resource '{}'", id))
            })?;
            let attributes = if descriptor.is_external() {
                self.external_attributes(descriptor)?
            } else {
                managed_attributes(descriptor)
            };
            debug!(id = %id, attributes = attributes.len(), "Realized resource");
            self.realized.insert(id.to_string(), attributes);
        }
        self.realized
            .get(id)
            .ok_or_else(|| PlanError::InvalidConfig(format!("resource '{}' not realized", id)))
    }

    fn external_attributes(&self, descriptor: &Descriptor) -> Result<Attributes> {
        let attributes = match descriptor.lookup_mode() {
            Some(LookupMode::Inline) => {
                let mut attributes = Attributes::new();
                for (name, value) in descriptor.properties() {
                    if !value.is_literal() {
                        return Err(PlanError::InvalidConfig(format!(
                            "'{}' uses inline lookup, so '{}' must be a literal",
                            descriptor.id(),
                            name
                        )));
                    }
                    attributes.insert(name.clone(), self.config.resolve_value(value)?);
                }
                attributes
            }
            Some(LookupMode::Default) => {
                let request = LookupRequest::from_descriptor(descriptor, self.config)?;
                debug!(id = %descriptor.id(), key = %request.key(), "Looking up existing resource");
                self.lookups.lookup(&request)?
            }
            Some(LookupMode::Explicit) => {
                let mut attributes = Attributes::new();
                for (name, value) in descriptor.properties() {
                    attributes.insert(name.clone(), self.config.resolve_value(value)?);
                }
                let missing: Vec<String> = descriptor
                    .kind()
                    .identifying_attributes()
                    .iter()
                    .filter(|a| attributes.get(**a).is_none_or(is_unset))
                    .map(|a| a.to_string())
                    .collect();
                if !missing.is_empty() {
                    return Err(LookupError::IncompleteAttributes {
                        id: descriptor.id().to_string(),
                        missing,
                    }
                    .into());
                }
                attributes
            }
            None => {
                return Err(PlanError::InvalidConfig(format!(
                    "'{}' is managed by the stack, not looked up",
                    descriptor.id()
                )));
            }
        };

        Ok(coerce_port(attributes))
    }

    /// Resolve one reference held by `consumer`
    pub fn resolve(&self, consumer: &str, reference: &Reference) -> Result<Resolved> {
        let target = self
            .stack
            .get(&reference.target_id)
            .ok_or_else(|| PlanError::UnknownReference {
                consumer: consumer.to_string(),
                target: reference.target_id.clone(),
            })?;

        let unknown_attribute = || PlanError::UnknownAttribute {
            target: target.id().to_string(),
            kind: target.kind(),
            attribute: reference.attribute.clone(),
        };

        if !target.kind().has_attribute(&reference.attribute) {
            return Err(unknown_attribute());
        }

        match self.realized.get(target.id()) {
            Some(attributes) => attributes
                .get(&reference.attribute)
                .cloned()
                .map(Resolved::Value)
                .ok_or_else(unknown_attribute),
            None => {
                if !target.is_external() && managed_attribute(target, &reference.attribute).is_none()
                {
                    return Err(unknown_attribute());
                }
                Ok(Resolved::Deferred(DeferredBinding::from(reference)))
            }
        }
    }

    /// Resolve every reference and env value inside a property
    pub fn resolve_value(&self, consumer: &str, value: &PropertyValue) -> Result<ResolvedValue> {
        match value {
            PropertyValue::Literal(_) | PropertyValue::Env { .. } => {
                self.config.resolve_value(value).map(ResolvedValue::Value)
            }
            PropertyValue::Reference(reference) => {
                Ok(match self.resolve(consumer, reference)? {
                    Resolved::Value(v) => ResolvedValue::Value(v),
                    Resolved::Deferred(binding) => ResolvedValue::Deferred(binding),
                })
            }
            PropertyValue::List(items) => items
                .iter()
                .map(|i| self.resolve_value(consumer, i))
                .collect::<Result<Vec<_>>>()
                .map(ResolvedValue::List),
            PropertyValue::Object(map) => {
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.resolve_value(consumer, v)?);
                }
                Ok(ResolvedValue::Object(out))
            }
        }
    }
}

/// An empty list is still a value; placement checks decide if it is usable
fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Ports arrive as strings from env files and CLI output
fn coerce_port(mut attributes: Attributes) -> Attributes {
    if let Some(Value::String(s)) = attributes.get("port")
        && let Ok(port) = s.trim().parse::<u16>()
    {
        attributes.insert("port".to_string(), Value::from(port));
    }
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{LookupCache, NoLookup};
    use crate::model::Properties;
    use serde_json::json;

    fn props(pairs: Vec<(&str, PropertyValue)>) -> Properties {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn explicit_database(stack: &mut Stack) {
        stack
            .define_resource(
                ResourceKind::DatabaseInstanceRef,
                "Database",
                props(vec![
                    ("instanceIdentifier", PropertyValue::env("DB_IDENTIFIER")),
                    ("endpointAddress", PropertyValue::env("DB_ENDPOINT")),
                    ("port", PropertyValue::env("DB_PORT")),
                    ("engine", PropertyValue::literal("postgres")),
                ]),
                Some(LookupMode::Explicit),
            )
            .unwrap();
    }

    fn db_config() -> StackContext {
        StackContext::from_pairs([
            ("DB_IDENTIFIER", "payments-db"),
            ("DB_ENDPOINT", "payments-db.abc.eu-west-1.rds.amazonaws.com"),
            ("DB_PORT", "5432"),
        ])
    }

    #[test]
    fn test_explicit_attributes_are_concrete() {
        let mut stack = Stack::new("test");
        explicit_database(&mut stack);
        let config = db_config();
        let mut ctx = ResolutionContext::new(&stack, &config, &NoLookup);
        ctx.realize_external().unwrap();

        let resolved = ctx
            .resolve("Proxy", &Reference::new("Database", "port"))
            .unwrap();
        assert_eq!(resolved, Resolved::Value(json!(5432)));
    }

    #[test]
    fn test_explicit_incomplete_set_names_missing_attributes() {
        let mut stack = Stack::new("test");
        stack
            .define_resource(
                ResourceKind::Network,
                "Vpc",
                props(vec![("vpcId", PropertyValue::literal("vpc-1"))]),
                Some(LookupMode::Explicit),
            )
            .unwrap();
        let config = StackContext::new();
        let mut ctx = ResolutionContext::new(&stack, &config, &NoLookup);

        let err = ctx.realize_external().unwrap_err();
        assert!(err.is_lookup_failure());
        match err {
            PlanError::ExternalLookup(LookupError::IncompleteAttributes { id, missing }) => {
                assert_eq!(id, "Vpc");
                assert_eq!(missing, vec!["availabilityZones", "subnetIds"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_inline_rejects_env_values() {
        let mut stack = Stack::new("test");
        stack
            .define_resource(
                ResourceKind::Role,
                "ImportedRole",
                props(vec![("arn", PropertyValue::env("PROXYFLOW_ROLE_ARN"))]),
                Some(LookupMode::Inline),
            )
            .unwrap();
        let config = StackContext::from_pairs([("PROXYFLOW_ROLE_ARN", "arn:aws:iam::1:role/x")]);
        let mut ctx = ResolutionContext::new(&stack, &config, &NoLookup);
        assert!(matches!(
            ctx.realize_external(),
            Err(PlanError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_default_lookup_goes_through_collaborator() {
        let mut stack = Stack::new("test");
        stack
            .define_resource(
                ResourceKind::Network,
                "Vpc",
                props(vec![("isDefault", PropertyValue::literal(true))]),
                Some(LookupMode::Default),
            )
            .unwrap();
        let config = StackContext::new();

        let mut ctx = ResolutionContext::new(&stack, &config, &NoLookup);
        assert!(matches!(
            ctx.realize_external(),
            Err(PlanError::ExternalLookup(LookupError::NoProvider { .. }))
        ));

        let mut cache = LookupCache::new();
        let mut found = Attributes::new();
        found.insert("vpcId".to_string(), json!("vpc-default"));
        found.insert("subnetIds".to_string(), json!(["subnet-1"]));
        cache.insert(
            &LookupRequest::new(ResourceKind::Network).with("isDefault", "true"),
            vec![found],
        );
        let mut ctx = ResolutionContext::new(&stack, &config, &cache);
        ctx.realize_external().unwrap();
        assert_eq!(
            ctx.resolve("Proxy", &Reference::new("Vpc", "subnetIds"))
                .unwrap(),
            Resolved::Value(json!(["subnet-1"]))
        );
    }

    #[test]
    fn test_managed_target_defers_until_realized() {
        let mut stack = Stack::new("test");
        stack
            .define_resource(ResourceKind::Role, "ProxyRole", Properties::new(), None)
            .unwrap();
        let config = StackContext::new();
        let mut ctx = ResolutionContext::new(&stack, &config, &NoLookup);

        let reference = Reference::new("ProxyRole", "arn");
        assert_eq!(
            ctx.resolve("Proxy", &reference).unwrap(),
            Resolved::Deferred(DeferredBinding {
                target_id: "ProxyRole".to_string(),
                attribute: "arn".to_string(),
            })
        );

        ctx.realize("ProxyRole").unwrap();
        assert_eq!(
            ctx.resolve("Proxy", &reference).unwrap(),
            Resolved::Value(json!({ "Fn::GetAtt": ["ProxyRole", "Arn"] }))
        );
    }

    #[test]
    fn test_unknown_attribute_and_reference() {
        let mut stack = Stack::new("test");
        stack
            .define_resource(ResourceKind::Network, "Vpc", Properties::new(), None)
            .unwrap();
        let config = StackContext::new();
        let ctx = ResolutionContext::new(&stack, &config, &NoLookup);

        assert!(matches!(
            ctx.resolve("Proxy", &Reference::new("Vpc", "color")),
            Err(PlanError::UnknownAttribute { .. })
        ));
        // a VPC created here has no subnets to reference
        assert!(matches!(
            ctx.resolve("Proxy", &Reference::new("Vpc", "subnetIds")),
            Err(PlanError::UnknownAttribute { .. })
        ));
        assert!(matches!(
            ctx.resolve("Proxy", &Reference::new("Missing", "arn")),
            Err(PlanError::UnknownReference { .. })
        ));
    }

    #[test]
    fn test_fill_deferred_slots() {
        let mut value = ResolvedValue::List(vec![
            ResolvedValue::Deferred(DeferredBinding {
                target_id: "DbSecret".to_string(),
                attribute: "arn".to_string(),
            }),
            ResolvedValue::Value(json!("literal")),
        ]);
        assert!(value.to_value().is_none());

        let mut attrs = Attributes::new();
        attrs.insert("arn".to_string(), json!({ "Ref": "DbSecret" }));
        value.fill("OtherSecret", &attrs);
        assert!(value.first_deferred().is_some());

        value.fill("DbSecret", &attrs);
        assert_eq!(
            value.to_value(),
            Some(json!([{ "Ref": "DbSecret" }, "literal"]))
        );
    }
}
