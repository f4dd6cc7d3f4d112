use crate::lookup::LookupError;
use crate::model::ResourceKind;
use crate::validator::ValidationReport;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {path}\nreason: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("duplicate resource id '{0}' in stack")]
    DuplicateId(String),

    #[error(
        "invalid resource id '{0}'\nhint: ids become logical ids, use letters and digits only and start with a letter"
    )]
    InvalidId(String),

    #[error("{kind} '{target}' has no attribute '{attribute}'")]
    UnknownAttribute {
        target: String,
        kind: ResourceKind,
        attribute: String,
    },

    #[error("'{consumer}' references unknown resource '{target}'")]
    UnknownReference { consumer: String, target: String },

    #[error("dependency cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("{0}")]
    Validation(ValidationReport),

    #[error(
        "missing configuration: {}\nhint: set them in the .env file next to the stack or export them",
        .keys.join(", ")
    )]
    MissingConfiguration { keys: Vec<String> },

    #[error("external lookup failed: {0}")]
    ExternalLookup(#[from] LookupError),

    #[error("'{consumer}' still waits on {target}.{attribute} after emission")]
    UnresolvedBinding {
        consumer: String,
        target: String,
        attribute: String,
    },

    #[error("1Password error: {0}")]
    OnePasswordError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PlanError {
    /// Lookup failures may be transient; everything else is a problem in the stack itself.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, PlanError::ExternalLookup(_))
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;
