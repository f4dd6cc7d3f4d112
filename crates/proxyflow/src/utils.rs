use anyhow::{Context, bail};
use clap::Args;
use colored::Colorize;
use proxyflow_cloud::{InventoryProvider, StaticInventory, prefetch};
use proxyflow_cloud_aws::AwsInventory;
use proxyflow_core::{LoadedStack, LookupCache, PlanError, ValidationReport, load_stack};
use std::path::{Path, PathBuf};
use tracing::info;

/// Options shared by every command that reads a stack
#[derive(Args, Debug, Clone)]
pub struct StackArgs {
    /// Stack file (default: discovered from the current directory)
    #[arg(long, env = "PROXYFLOW_STACK_PATH")]
    pub stack: Option<PathBuf>,

    /// .env file to read instead of the one next to the stack file
    #[arg(long, env = "PROXYFLOW_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    /// JSON inventory answering lookup="default" resources
    #[arg(long, conflicts_with = "live")]
    pub inventory: Option<PathBuf>,

    /// Query AWS for lookup="default" resources
    #[arg(long)]
    pub live: bool,

    /// AWS region for --live
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// AWS profile for --live
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,
}

/// Loaded stack plus the answers to its lookups
pub struct Prepared {
    pub loaded: LoadedStack,
    pub lookups: LookupCache,
}

pub fn resolve_stack_path(args: &StackArgs) -> anyhow::Result<PathBuf> {
    match &args.stack {
        Some(path) => Ok(path.clone()),
        None => Ok(proxyflow_config::find_stack_file()?),
    }
}

/// Load the stack and prefetch every `default` lookup it needs
pub async fn prepare(args: &StackArgs) -> anyhow::Result<Prepared> {
    let path = resolve_stack_path(args)?;
    eprintln!("Stack: {}", path.display().to_string().cyan());

    let loaded = load_stack(&path, args.env_file.as_deref())?;

    let lookups = if let Some(inventory) = &args.inventory {
        let provider = StaticInventory::load(inventory)
            .await
            .with_context(|| format!("failed to load inventory {}", inventory.display()))?;
        prefetch(&loaded.stack, &loaded.context, &provider).await?
    } else if args.live {
        let provider = AwsInventory::connect(args.region.clone(), args.profile.clone()).await;
        let auth = provider.check_auth().await?;
        if !auth.authenticated {
            bail!("{}: {}", provider.display_name(), auth);
        }
        info!(account = ?auth.account_info, region = ?provider.region(), "Using live inventory");
        prefetch(&loaded.stack, &loaded.context, &provider).await?
    } else {
        LookupCache::new()
    };

    Ok(Prepared { loaded, lookups })
}

/// Print warnings that did not stop the plan
pub fn print_warnings(report: &ValidationReport) {
    for warning in &report.warnings {
        eprintln!("{} {}", "⚠".yellow(), warning.to_string().yellow());
    }
}

/// Print a failed run to stderr
pub fn print_error(err: &anyhow::Error) {
    eprintln!();
    eprintln!("{}", "✗ planning failed".red().bold());

    match err.downcast_ref::<PlanError>() {
        Some(PlanError::Validation(report)) => {
            eprintln!("  {}", report.to_string().red());
            print_warnings(report);
        }
        Some(plan_error) if plan_error.is_lookup_failure() => {
            eprintln!("  {}", plan_error);
            eprintln!();
            eprintln!(
                "{}",
                "Lookups may fail transiently; running the command again is safe.".dimmed()
            );
        }
        _ => {
            eprintln!("  {}", err);
            for cause in err.chain().skip(1) {
                eprintln!("  caused by: {}", cause);
            }
        }
    }
}

/// Write to a file, or stdout when no path is given
pub fn write_output(output: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "{} {}",
                "✓ wrote".green(),
                path.display().to_string().cyan()
            );
        }
        None => {
            print!("{}", content);
            if !content.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}
