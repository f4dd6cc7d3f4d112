//! Stack loader
//!
//! Reads a stack file together with its context (`.env` sibling or an
//! explicit env file, then the process environment).

use crate::context::StackContext;
use crate::error::{PlanError, Result};
use crate::model::Stack;
use crate::parser::parse_stack_file;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Stack file with the context it is planned against
#[derive(Debug, Clone)]
pub struct LoadedStack {
    pub path: PathBuf,
    pub stack: Stack,
    pub context: StackContext,
}

/// Load a stack file and build its context
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_stack(path: &Path, env_file: Option<&Path>) -> Result<LoadedStack> {
    if !path.is_file() {
        return Err(PlanError::IoError {
            path: path.to_path_buf(),
            message: "stack file not found".to_string(),
        });
    }

    debug!("Step 1: Parsing stack file");
    let stack = parse_stack_file(path)?;

    debug!("Step 2: Building stack context");
    let context = StackContext::load(Some(path), env_file)?;

    info!(
        stack = %stack.name(),
        resources = stack.len(),
        context_keys = context.len(),
        "Stack loaded"
    );

    Ok(LoadedStack {
        path: path.to_path_buf(),
        stack,
        context,
    })
}
