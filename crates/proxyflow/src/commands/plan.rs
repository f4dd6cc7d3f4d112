use crate::utils::{self, StackArgs};
use anyhow::Context;
use colored::{ColoredString, Colorize};
use proxyflow_cloud::{ActionType, ChangeSet};
use proxyflow_core::{Document, plan_stack};
use std::path::Path;

pub async fn handle(args: &StackArgs, against: Option<&Path>) -> anyhow::Result<()> {
    let prepared = utils::prepare(args).await?;
    let outcome = plan_stack(
        &prepared.loaded.stack,
        &prepared.loaded.context,
        &prepared.lookups,
    )?;

    let changes = match against {
        Some(path) => ChangeSet::diff(&read_document(path)?, &outcome.document),
        None => ChangeSet::from_document(&outcome.document),
    };

    println!("Plan for stack {}:", changes.stack.cyan());
    println!();
    for action in &changes.actions {
        println!(
            "  {} {:<8} {:<30} {}",
            paint(action.action_type, action.action_type.symbol()),
            paint(action.action_type, &action.action_type.to_string()),
            action.resource_type,
            action.logical_id.bold()
        );
        if !action.changed.is_empty() {
            println!("             changed: {}", action.changed.join(", ").dimmed());
        }
    }
    println!();
    println!("{}", changes.summary());
    if !changes.has_changes() {
        println!("{}", "✓ no changes".green());
    }
    utils::print_warnings(&outcome.report);

    Ok(())
}

fn paint(action: ActionType, text: &str) -> ColoredString {
    match action {
        ActionType::Create => text.green(),
        ActionType::Import => text.cyan(),
        ActionType::Update => text.yellow(),
        ActionType::Delete => text.red(),
        ActionType::NoOp => text.dimmed(),
    }
}

/// Read a document emitted earlier, as JSON or YAML
fn read_document(path: &Path) -> anyhow::Result<Document> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "yaml" || e == "yml");
    let document = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        Document::from_json(&content)?
    };
    Ok(document)
}
