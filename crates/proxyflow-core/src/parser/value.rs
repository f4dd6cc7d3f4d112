//! Property value grammar
//!
//! ```kdl
//! subnet-ids "subnet-a" "subnet-b"       // literal list
//! vpc-id env="VPC_ID"                    // context value
//! role ref="ProxyRole.arn"               // reference
//! secrets { ref "DbSecret.arn"; }        // list of references
//! tags { Name "payments"; }              // nested object
//! debug-logging                          // bare flag
//! ```

use crate::error::{PlanError, Result};
use crate::model::{Properties, PropertyValue, Reference, normalize_name};
use kdl::{KdlDocument, KdlNode, KdlValue};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*([smh]?)\s*$").unwrap());

/// Child node names that make a block a list rather than an object
const LIST_ITEMS: &[&str] = &["ref", "env", "env-list", "-"];

pub fn kdl_to_json(value: &KdlValue) -> Value {
    if let Some(s) = value.as_string() {
        Value::String(s.to_string())
    } else if let Some(i) = value.as_integer() {
        i64::try_from(i)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(i.to_string()))
    } else if let Some(f) = value.as_float() {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    } else if let Some(b) = value.as_bool() {
        Value::Bool(b)
    } else {
        Value::Null
    }
}

/// Parse every child of a block into camelCase properties
pub fn parse_properties(children: &KdlDocument) -> Result<Properties> {
    let mut properties = Properties::new();
    for node in children.nodes() {
        let name = normalize_name(node.name().value());
        if properties.contains_key(&name) {
            return Err(PlanError::InvalidConfig(format!(
                "property '{}' is set more than once",
                node.name().value()
            )));
        }
        properties.insert(name, parse_value(node)?);
    }
    Ok(properties)
}

/// Value of a property node
pub fn parse_value(node: &KdlNode) -> Result<PropertyValue> {
    let mut named = None;
    let mut positional = Vec::new();

    for entry in node.entries() {
        match entry.name().map(|n| n.value()) {
            Some(key @ ("ref" | "env" | "env-list")) => {
                if named.is_some() {
                    return Err(PlanError::InvalidConfig(format!(
                        "'{}' mixes several of ref=, env= and env-list=",
                        node.name().value()
                    )));
                }
                let raw = entry.value().as_string().ok_or_else(|| {
                    PlanError::InvalidConfig(format!(
                        "'{}' expects a string for {}=",
                        node.name().value(),
                        key
                    ))
                })?;
                named = Some(tagged(key, raw)?);
            }
            Some(other) => {
                return Err(PlanError::InvalidConfig(format!(
                    "unknown attribute '{}=' on '{}'",
                    other,
                    node.name().value()
                )));
            }
            None => positional.push(kdl_to_json(entry.value())),
        }
    }

    // `subnet-ids {}` is an empty list, not a flag
    let children = node.children();

    match (named, positional.len(), children) {
        (Some(value), 0, None) => Ok(value),
        (None, 0, Some(children)) => parse_block(children),
        (None, 0, None) => Ok(PropertyValue::literal(true)),
        (None, 1, None) => Ok(PropertyValue::Literal(positional.remove(0))),
        (None, _, None) => Ok(PropertyValue::Literal(Value::Array(positional))),
        _ => Err(PlanError::InvalidConfig(format!(
            "'{}' mixes values, ref/env attributes and a child block",
            node.name().value()
        ))),
    }
}

fn tagged(key: &str, raw: &str) -> Result<PropertyValue> {
    match key {
        "ref" => Reference::parse(raw).map(PropertyValue::Reference),
        "env" => Ok(PropertyValue::env(raw)),
        _ => Ok(PropertyValue::env_list(raw)),
    }
}

fn parse_block(children: &KdlDocument) -> Result<PropertyValue> {
    let is_list = children
        .nodes()
        .iter()
        .all(|n| LIST_ITEMS.contains(&n.name().value()));

    if !is_list {
        return parse_properties(children).map(PropertyValue::Object);
    }

    let mut items = Vec::new();
    for node in children.nodes() {
        let name = node.name().value();
        if name == "-" {
            items.push(parse_value(node)?);
            continue;
        }
        for entry in node.entries() {
            let raw = entry.value().as_string().ok_or_else(|| {
                PlanError::InvalidConfig(format!("'{}' list items must be strings", name))
            })?;
            items.push(tagged(name, raw)?);
        }
    }
    Ok(PropertyValue::List(items))
}

/// Seconds in a duration written as `1800`, `1800s`, `30m` or `1h`
pub fn parse_duration_secs(raw: &str) -> Result<u64> {
    let invalid = || {
        PlanError::InvalidConfig(format!(
            "invalid duration '{}' (expected e.g. 1800, 1800s, 30m or 1h)",
            raw
        ))
    };

    let captures = DURATION_RE.captures(raw).ok_or_else(invalid)?;
    let amount: u64 = captures[1].parse().map_err(|_| invalid())?;
    let factor = match &captures[2] {
        "m" => 60,
        "h" => 3600,
        _ => 1,
    };
    amount.checked_mul(factor).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_secs() {
        assert_eq!(parse_duration_secs("1800").unwrap(), 1800);
        assert_eq!(parse_duration_secs("1800s").unwrap(), 1800);
        assert_eq!(parse_duration_secs("30m").unwrap(), 1800);
        assert_eq!(parse_duration_secs("1h").unwrap(), 3600);
        assert!(parse_duration_secs("half an hour").is_err());
        assert!(parse_duration_secs("-5m").is_err());
        assert!(parse_duration_secs("9999999999999999h").is_err());
        assert!(parse_duration_secs("99999999999999999999").is_err());
    }

    #[test]
    fn test_empty_block_is_empty_list() {
        let doc: KdlDocument = "subnet-ids {}\ndebug-logging".parse().unwrap();
        let properties = parse_properties(&doc).unwrap();
        assert_eq!(properties["subnetIds"], PropertyValue::List(Vec::new()));
        assert_eq!(properties["debugLogging"], PropertyValue::literal(true));
    }
}
