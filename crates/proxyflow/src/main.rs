mod commands;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use utils::StackArgs;

#[derive(Parser)]
#[command(name = "proxyflow")]
#[command(about = "Plan RDS proxies from a declarative stack", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a stack without emitting anything
    Validate {
        #[command(flatten)]
        stack: StackArgs,
    },
    /// Show the ordered change set for a stack
    Plan {
        #[command(flatten)]
        stack: StackArgs,
        /// Previously emitted document to diff against
        #[arg(long)]
        against: Option<PathBuf>,
    },
    /// Emit the provisioning document
    Synth {
        #[command(flatten)]
        stack: StackArgs,
        /// Write the document to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output format (json, yaml)
        #[arg(short, long, default_value = "json")]
        format: String,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries documents only
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let result = match cli.command {
        Commands::Version => {
            println!("proxyflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Validate { stack } => commands::validate::handle(&stack).await,
        Commands::Plan { stack, against } => {
            commands::plan::handle(&stack, against.as_deref()).await
        }
        Commands::Synth {
            stack,
            output,
            format,
        } => commands::synth::handle(&stack, output.as_deref(), &format).await,
    };

    if let Err(e) = result {
        utils::print_error(&e);
        std::process::exit(1);
    }
}
