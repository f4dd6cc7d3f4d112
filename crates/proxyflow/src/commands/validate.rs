use crate::utils::{self, StackArgs};
use colored::Colorize;
use proxyflow_core::check_stack;

pub async fn handle(args: &StackArgs) -> anyhow::Result<()> {
    let prepared = utils::prepare(args).await?;
    let stack = &prepared.loaded.stack;
    println!("{}", "Validating stack...".blue());

    let outcome = check_stack(stack, &prepared.loaded.context, &prepared.lookups)?;

    println!("{}", "✓ stack is valid".green().bold());
    println!();
    println!("Stack: {}", stack.name().cyan());
    println!("Resources ({}), in provisioning order:", outcome.plan.len());
    for id in &outcome.plan.order {
        if let Some(descriptor) = stack.get(id) {
            let lookup = descriptor
                .lookup_mode()
                .map(|mode| format!(" [lookup={}]", mode))
                .unwrap_or_default();
            println!("  - {} ({}){}", id.cyan(), descriptor.kind(), lookup.dimmed());
        }
    }
    utils::print_warnings(&outcome.report);

    Ok(())
}
