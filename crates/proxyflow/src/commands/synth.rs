use crate::utils::{self, StackArgs};
use colored::Colorize;
use proxyflow_core::{OutputFormat, plan_stack};
use std::path::Path;

pub async fn handle(args: &StackArgs, output: Option<&Path>, format: &str) -> anyhow::Result<()> {
    let format: OutputFormat = format.parse()?;
    let prepared = utils::prepare(args).await?;
    let outcome = plan_stack(
        &prepared.loaded.stack,
        &prepared.loaded.context,
        &prepared.lookups,
    )?;

    utils::print_warnings(&outcome.report);
    let rendered = outcome.document.render(format)?;
    utils::write_output(output, &rendered)?;
    eprintln!(
        "{} {} resources",
        "✓ synthesized".green().bold(),
        outcome.document.resources.len()
    );
    Ok(())
}
