//! Plan emitter
//!
//! Walks an ordered plan, realizes each descriptor, and writes the
//! provisioning document. Deferred bindings are filled as their producers are
//! realized; anything still waiting at the end fails the emission.

mod render;

pub use render::{Rendered, flatten, render};

use crate::error::{PlanError, Result};
use crate::graph::Plan;
use crate::lookup::Attributes;
use crate::model::{LookupMode, ResourceKind};
use crate::resolver::{ResolutionContext, ResolvedValue};
use crate::validator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Template format the backend expects
pub const FORMAT_VERSION: &str = "2010-09-09";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Managed,
    External,
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lifecycle::Managed => write!(f, "managed"),
            Lifecycle::External => write!(f, "external"),
        }
    }
}

/// One resource of the emitted document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEntry {
    pub logical_id: String,
    pub kind: ResourceKind,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub lifecycle: Lifecycle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_mode: Option<LookupMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
}

/// Provisioning document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub stack: String,
    pub format_version: String,
    pub resources: Vec<DocumentEntry>,
}

impl Document {
    pub fn get(&self, logical_id: &str) -> Option<&DocumentEntry> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Output encoding of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(PlanError::InvalidConfig(format!(
                "unknown output format '{}' (expected json or yaml)",
                other
            ))),
        }
    }
}

impl Document {
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => self.to_json(),
            OutputFormat::Yaml => self.to_yaml(),
        }
    }
}

struct Pending {
    index: usize,
    properties: BTreeMap<String, ResolvedValue>,
}

/// Emit the document for an ordered plan
///
/// Externals must already be realized in `ctx`.
#[instrument(skip_all, fields(stack = %ctx.stack().name(), resources = plan.len()))]
pub fn emit(plan: &Plan, ctx: &mut ResolutionContext<'_>) -> Result<Document> {
    let stack = ctx.stack();
    let mut entries: Vec<DocumentEntry> = Vec::with_capacity(plan.len());
    let mut pending: Vec<Pending> = Vec::new();

    for id in &plan.order {
        let descriptor = stack.get(id).ok_or_else(|| {
            PlanError::InvalidConfig(format!("plan names unknown resource '{}'", id))
        })?;

        let attributes: Attributes = ctx.realize(id)?.clone();
        for slot in pending.iter_mut() {
            for value in slot.properties.values_mut() {
                value.fill(id, &attributes);
            }
        }

        let mut entry = DocumentEntry {
            logical_id: id.clone(),
            kind: descriptor.kind(),
            resource_type: descriptor.kind().backend_type().to_string(),
            lifecycle: Lifecycle::Managed,
            lookup_mode: descriptor.lookup_mode(),
            depends_on: Vec::new(),
            properties: BTreeMap::new(),
            attributes: BTreeMap::new(),
        };

        if descriptor.is_external() {
            entry.lifecycle = Lifecycle::External;
            entry.attributes = attributes;
        } else {
            // externals are not deployed, so nothing waits on them
            entry.depends_on = descriptor
                .dependencies()
                .into_iter()
                .filter(|dep| stack.get(dep).is_some_and(|d| !d.is_external()))
                .map(String::from)
                .collect();

            let mut properties = BTreeMap::new();
            for (name, value) in descriptor.properties() {
                properties.insert(name.clone(), ctx.resolve_value(id, value)?);
            }
            pending.push(Pending {
                index: entries.len(),
                properties,
            });
        }

        debug!(id = %id, lifecycle = %entry.lifecycle, "Emitted resource");
        entries.push(entry);
    }

    for slot in pending {
        let entry = &mut entries[slot.index];
        let mut values = BTreeMap::new();
        for (name, value) in &slot.properties {
            match value.to_value() {
                Some(v) => {
                    values.insert(name.clone(), v);
                }
                None => {
                    let binding = value.first_deferred().cloned().unwrap_or_default();
                    return Err(PlanError::UnresolvedBinding {
                        consumer: entry.logical_id.clone(),
                        target: binding.target_id,
                        attribute: binding.attribute,
                    });
                }
            }
        }

        // declared families are written the way the backend spells them
        if entry.kind == ResourceKind::Proxy
            && let Some(family) = stack
                .get(&entry.logical_id)
                .and_then(|proxy| validator::engine_family(ctx, proxy))
        {
            values.insert(
                "engineFamily".to_string(),
                Value::String(family.as_str().to_string()),
            );
        }

        entry.properties = render(entry.kind, &entry.logical_id, &values)?;
    }

    info!(resources = entries.len(), "Document emitted");
    Ok(Document {
        stack: stack.name().to_string(),
        format_version: FORMAT_VERSION.to_string(),
        resources: entries,
    })
}
