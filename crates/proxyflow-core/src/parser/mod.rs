//! KDL parser
//!
//! Parses proxyflow stack files. Property grammar lives in `value`, resource
//! nodes in `resource`.

mod resource;
mod value;

pub use value::{kdl_to_json, parse_duration_secs};

use crate::error::{PlanError, Result};
use crate::model::{ResourceKind, Stack};
use kdl::KdlDocument;
use resource::parse_resource;
use std::fs;
use std::path::Path;
use tracing::{debug, instrument};

/// Parse a stack file
///
/// Without a `stack "name"` node the stack is named after the file's directory.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn parse_stack_file<P: AsRef<Path>>(path: P) -> Result<Stack> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| PlanError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let name = path
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::parent)
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    parse_stack_str(&content, name)
}

/// Parse stack file content
pub fn parse_stack_str(content: &str, default_name: impl Into<String>) -> Result<Stack> {
    let doc: KdlDocument = content.parse()?;
    let mut stack = Stack::new(default_name);
    let mut named = false;

    for node in doc.nodes() {
        let node_name = node.name().value();
        if node_name == "stack" {
            if named {
                return Err(PlanError::InvalidConfig(
                    "a stack file may contain only one `stack` node".to_string(),
                ));
            }
            let name = node
                .entries()
                .first()
                .and_then(|e| e.value().as_string())
                .ok_or_else(|| PlanError::InvalidConfig("stack requires a name".to_string()))?;
            stack.set_name(name);
            named = true;
            continue;
        }

        let kind = ResourceKind::from_node_name(node_name).ok_or_else(|| {
            PlanError::InvalidConfig(format!(
                "unknown node '{}' (expected stack, {})",
                node_name,
                ResourceKind::ALL
                    .iter()
                    .map(|k| k.node_name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;
        parse_resource(node, kind, &mut stack)?;
    }

    debug!(stack = %stack.name(), resources = stack.len(), "Parsed stack");
    Ok(stack)
}
