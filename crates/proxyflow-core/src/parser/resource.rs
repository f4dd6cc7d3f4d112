//! Resource node parsing

use super::value::{parse_duration_secs, parse_properties};
use crate::error::{PlanError, Result};
use crate::model::{LookupMode, Properties, PropertyValue, ResourceKind, Stack};
use kdl::KdlNode;
use serde_json::Value;
use tracing::debug;

/// Attribute proxies use to point at their databases
const TARGET_ATTRIBUTE: &str = "instanceIdentifier";

/// Parse a resource node such as `proxy "Proxy" { ... }` into the stack
pub fn parse_resource(node: &KdlNode, kind: ResourceKind, stack: &mut Stack) -> Result<()> {
    let node_name = node.name().value();
    let mut id = None;
    let mut lookup_mode = None;

    for entry in node.entries() {
        match entry.name().map(|n| n.value()) {
            None if id.is_none() => {
                id = entry.value().as_string().map(String::from);
            }
            Some("lookup") => {
                let mode = entry.value().as_string().ok_or_else(|| {
                    PlanError::InvalidConfig(format!("{} lookup= expects a string", node_name))
                })?;
                lookup_mode = Some(mode.parse::<LookupMode>()?);
            }
            Some(other) => {
                return Err(PlanError::InvalidConfig(format!(
                    "unknown attribute '{}=' on {}",
                    other, node_name
                )));
            }
            None => {
                return Err(PlanError::InvalidConfig(format!(
                    "{} takes a single id",
                    node_name
                )));
            }
        }
    }

    let id = id.ok_or_else(|| PlanError::InvalidConfig(format!("{} requires an id", node_name)))?;

    if kind == ResourceKind::Proxy {
        return parse_proxy(node, id, lookup_mode, stack);
    }

    let properties = match node.children() {
        Some(children) => parse_properties(children)?,
        None => Properties::new(),
    };
    stack.define_resource(kind, id, properties, lookup_mode)?;
    Ok(())
}

/// Proxies accept `target "<Database>"` and a `connection-pool { ... }` block,
/// which become a `<Proxy>TargetGroup` association
fn parse_proxy(
    node: &KdlNode,
    id: String,
    lookup_mode: Option<LookupMode>,
    stack: &mut Stack,
) -> Result<()> {
    let mut properties = Properties::new();
    let mut databases: Vec<String> = Vec::new();
    let mut pool = None;

    if let Some(children) = node.children() {
        let mut rest = kdl::KdlDocument::new();
        for child in children.nodes() {
            match child.name().value() {
                "target" => {
                    for entry in child.entries() {
                        let database = entry.value().as_string().ok_or_else(|| {
                            PlanError::InvalidConfig(format!(
                                "proxy '{}': target expects database ids",
                                id
                            ))
                        })?;
                        databases.push(database.to_string());
                    }
                }
                "connection-pool" => {
                    let settings = match child.children() {
                        Some(block) => parse_properties(block)?,
                        None => Properties::new(),
                    };
                    pool = Some(PropertyValue::Object(settings));
                }
                _ => rest.nodes_mut().push(child.clone()),
            }
        }
        properties = parse_properties(&rest)?;
    }

    if let Some(timeout) = properties.get_mut("idleClientTimeout")
        && let PropertyValue::Literal(Value::String(raw)) = timeout
    {
        let secs = parse_duration_secs(raw)?;
        *timeout = PropertyValue::literal(secs);
    }

    let target_refs: Vec<PropertyValue> = databases
        .iter()
        .map(|db| PropertyValue::reference(db.as_str(), TARGET_ATTRIBUTE))
        .collect();

    if !target_refs.is_empty() {
        match properties.get_mut("targets") {
            Some(PropertyValue::List(items)) => items.extend(target_refs.iter().cloned()),
            Some(_) => {
                return Err(PlanError::InvalidConfig(format!(
                    "proxy '{}': `targets` must be a list when `target` is also used",
                    id
                )));
            }
            None => {
                properties.insert(
                    "targets".to_string(),
                    PropertyValue::List(target_refs.clone()),
                );
            }
        }
    }

    stack.define_resource(ResourceKind::Proxy, id.clone(), properties, lookup_mode)?;

    if target_refs.is_empty() {
        if pool.is_some() {
            return Err(PlanError::InvalidConfig(format!(
                "proxy '{}': connection-pool needs at least one target",
                id
            )));
        }
        return Ok(());
    }

    let association_id = format!("{}TargetGroup", id);
    let mut association = Properties::new();
    association.insert(
        "proxy".to_string(),
        PropertyValue::reference(id.as_str(), "name"),
    );
    association.insert("databases".to_string(), PropertyValue::List(target_refs));
    if let Some(pool) = pool {
        association.insert("connectionPool".to_string(), pool);
    }

    debug!(proxy = %id, association = %association_id, targets = databases.len(), "Synthesized target association");
    stack.define_resource(
        ResourceKind::ProxyTargetAssociation,
        association_id,
        association,
        None,
    )?;
    Ok(())
}
