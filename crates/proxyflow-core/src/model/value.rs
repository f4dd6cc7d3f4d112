//! Property values and references

use crate::error::{PlanError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Pointer to an attribute of another descriptor
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub target_id: String,
    pub attribute: String,
}

impl Reference {
    pub fn new(target_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            attribute: attribute.into(),
        }
    }

    /// Parse the `Target.attribute` notation used in stack files
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some((target, attribute)) if !target.is_empty() && !attribute.is_empty() => {
                Ok(Self::new(target, normalize_name(attribute)))
            }
            _ => Err(PlanError::InvalidConfig(format!(
                "invalid reference '{}' (expected Target.attribute)",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.target_id, self.attribute)
    }
}

/// Unevaluated property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    /// Value written directly in the stack
    Literal(Value),
    /// Value taken from the stack context; `list` values are comma separated
    Env { key: String, list: bool },
    /// Attribute of another descriptor
    Reference(Reference),
    List(Vec<PropertyValue>),
    Object(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        PropertyValue::Literal(value.into())
    }

    pub fn env(key: impl Into<String>) -> Self {
        PropertyValue::Env {
            key: key.into(),
            list: false,
        }
    }

    pub fn env_list(key: impl Into<String>) -> Self {
        PropertyValue::Env {
            key: key.into(),
            list: true,
        }
    }

    pub fn reference(target_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        PropertyValue::Reference(Reference::new(target_id, attribute))
    }

    /// Every reference inside this value, depth first
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            PropertyValue::Reference(r) => out.push(r),
            PropertyValue::List(items) => items.iter().for_each(|i| i.collect_references(out)),
            PropertyValue::Object(map) => map.values().for_each(|v| v.collect_references(out)),
            PropertyValue::Literal(_) | PropertyValue::Env { .. } => {}
        }
    }

    /// Every context key this value reads
    pub fn env_keys(&self) -> Vec<&str> {
        match self {
            PropertyValue::Env { key, .. } => vec![key.as_str()],
            PropertyValue::List(items) => items.iter().flat_map(|i| i.env_keys()).collect(),
            PropertyValue::Object(map) => map.values().flat_map(|v| v.env_keys()).collect(),
            PropertyValue::Literal(_) | PropertyValue::Reference(_) => Vec::new(),
        }
    }

    /// Whether the value is made of literals only
    pub fn is_literal(&self) -> bool {
        match self {
            PropertyValue::Literal(_) => true,
            PropertyValue::List(items) => items.iter().all(|i| i.is_literal()),
            PropertyValue::Object(map) => map.values().all(|v| v.is_literal()),
            PropertyValue::Env { .. } | PropertyValue::Reference(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Literal(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Literal(Value::Bool(b)) => Some(*b),
            PropertyValue::Literal(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Normalize a property or attribute name to camelCase
///
/// `vpc-id`, `vpc_id` and `vpcId` all become `vpcId`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '-' || c == '_' {
            upper_next = !out.is_empty();
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("vpc-id"), "vpcId");
        assert_eq!(normalize_name("vpc_id"), "vpcId");
        assert_eq!(normalize_name("vpcId"), "vpcId");
        assert_eq!(normalize_name("idle-client-timeout"), "idleClientTimeout");
        assert_eq!(normalize_name("-leading"), "leading");
    }

    #[test]
    fn test_reference_parse() {
        let r = Reference::parse("Vpc.subnet-ids").unwrap();
        assert_eq!(r.target_id, "Vpc");
        assert_eq!(r.attribute, "subnetIds");
        assert_eq!(r.to_string(), "Vpc.subnetIds");

        assert!(Reference::parse("Vpc").is_err());
        assert!(Reference::parse(".arn").is_err());
        assert!(Reference::parse("Vpc.").is_err());
    }

    #[test]
    fn test_nested_references_and_env_keys() {
        let mut object = BTreeMap::new();
        object.insert("username".to_string(), PropertyValue::env("DB_USERNAME"));
        object.insert("owner".to_string(), PropertyValue::reference("ProxyRole", "arn"));

        let value = PropertyValue::List(vec![
            PropertyValue::reference("DbSecret", "arn"),
            PropertyValue::Object(object),
            PropertyValue::literal("x"),
        ]);

        let refs: Vec<String> = value.references().iter().map(|r| r.to_string()).collect();
        assert_eq!(refs, vec!["DbSecret.arn", "ProxyRole.arn"]);
        assert_eq!(value.env_keys(), vec!["DB_USERNAME"]);
        assert!(!value.is_literal());
    }
}
