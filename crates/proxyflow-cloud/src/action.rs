//! Change sets for emitted documents
//!
//! A change set lists what applying a document would do, either from scratch
//! or relative to a previously emitted document. It never talks to a cloud
//! API.

use proxyflow_core::{Document, DocumentEntry, Lifecycle};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Represents a planned action for one resource of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Logical id of the resource
    pub logical_id: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Backend resource type (e.g., "AWS::RDS::DBProxy")
    pub resource_type: String,

    /// Description of the action
    pub description: String,

    /// Properties or attributes that differ from the previous document
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed: Vec<String>,
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Adopt an existing object without managing it
    Import,
    /// Update an existing resource
    Update,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl ActionType {
    /// Marker printed in front of an action
    pub fn symbol(&self) -> &'static str {
        match self {
            ActionType::Create => "+",
            ActionType::Import => "<=",
            ActionType::Update => "~",
            ActionType::Delete => "-",
            ActionType::NoOp => " ",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Import => write!(f, "import"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Ordered actions for one stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub stack: String,

    /// Actions in application order; deletions come last, dependents first
    pub actions: Vec<Action>,
}

impl ChangeSet {
    /// Actions for applying a document to an empty account
    pub fn from_document(document: &Document) -> Self {
        let actions = document
            .resources
            .iter()
            .map(fresh_action)
            .collect();
        Self {
            stack: document.stack.clone(),
            actions,
        }
    }

    /// Actions turning `previous` into `current`
    pub fn diff(previous: &Document, current: &Document) -> Self {
        let before: HashMap<&str, &DocumentEntry> = previous
            .resources
            .iter()
            .map(|e| (e.logical_id.as_str(), e))
            .collect();

        let mut actions: Vec<Action> = current
            .resources
            .iter()
            .map(|entry| match before.get(entry.logical_id.as_str()) {
                None => fresh_action(entry),
                Some(old) => compare(old, entry),
            })
            .collect();

        let remaining: BTreeSet<&str> = current
            .resources
            .iter()
            .map(|e| e.logical_id.as_str())
            .collect();
        actions.extend(
            previous
                .resources
                .iter()
                .rev()
                .filter(|e| !remaining.contains(e.logical_id.as_str()))
                .map(|old| Action {
                    logical_id: old.logical_id.clone(),
                    action_type: ActionType::Delete,
                    resource_type: old.resource_type.clone(),
                    description: format!("Delete {} {}", old.kind, old.logical_id),
                    changed: Vec::new(),
                }),
        );

        Self {
            stack: current.stack.clone(),
            actions,
        }
    }

    pub fn has_changes(&self) -> bool {
        self.actions
            .iter()
            .any(|a| a.action_type != ActionType::NoOp)
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the change set
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            import: self.actions_by_type(ActionType::Import).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

fn fresh_action(entry: &DocumentEntry) -> Action {
    let (action_type, verb) = match entry.lifecycle {
        Lifecycle::Managed => (ActionType::Create, "Create"),
        Lifecycle::External => (ActionType::Import, "Use existing"),
    };
    Action {
        logical_id: entry.logical_id.clone(),
        action_type,
        resource_type: entry.resource_type.clone(),
        description: format!("{} {} {}", verb, entry.kind, entry.logical_id),
        changed: Vec::new(),
    }
}

fn compare(old: &DocumentEntry, new: &DocumentEntry) -> Action {
    let mut changed = BTreeSet::new();
    if old.resource_type != new.resource_type {
        changed.insert("type".to_string());
    }
    if old.lifecycle != new.lifecycle {
        changed.insert("lifecycle".to_string());
    }
    for (name, value) in &new.properties {
        if old.properties.get(name) != Some(value) {
            changed.insert(name.clone());
        }
    }
    for name in old.properties.keys() {
        if !new.properties.contains_key(name) {
            changed.insert(name.clone());
        }
    }
    // an external object only changes when its looked-up attributes do
    if new.lifecycle == Lifecycle::External && old.attributes != new.attributes {
        changed.insert("attributes".to_string());
    }

    let changed: Vec<String> = changed.into_iter().collect();
    let (action_type, description) = if changed.is_empty() {
        (
            ActionType::NoOp,
            format!("{} {} unchanged", new.kind, new.logical_id),
        )
    } else {
        (
            ActionType::Update,
            format!(
                "Update {} {} ({})",
                new.kind,
                new.logical_id,
                changed.join(", ")
            ),
        )
    };

    Action {
        logical_id: new.logical_id.clone(),
        action_type,
        resource_type: new.resource_type.clone(),
        description,
        changed,
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlanSummary {
    pub create: usize,
    pub import: usize,
    pub update: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to import, {} to update, {} to delete, {} unchanged",
            self.create, self.import, self.update, self.delete, self.no_change
        )
    }
}
