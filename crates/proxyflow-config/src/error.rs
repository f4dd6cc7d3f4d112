use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "stack file not found. Looked in:\n\
        - current directory: stack.local.kdl, .stack.local.kdl, stack.kdl, .stack.kdl\n\
        - ./.proxyflow/\n\
        - ~/.config/proxyflow/stack.kdl\n\
        Set PROXYFLOW_STACK_PATH or pass --stack to point at a file directly"
    )]
    StackFileNotFound,

    #[error("PROXYFLOW_STACK_PATH points at a missing file: {0}")]
    StackPathMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
