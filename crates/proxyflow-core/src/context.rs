//! Stack context
//!
//! Key/value configuration a stack reads through `env="KEY"` values. Values
//! come from the `.env` file next to the stack file, then from the process
//! environment (which wins), and `op://` values are read from 1Password.

use crate::error::{PlanError, Result};
use crate::model::{PropertyValue, Stack};
use crate::onepassword;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// Process environment keys a stack may read besides `PROXYFLOW_*`
pub const RECOGNIZED_KEYS: &[&str] = &[
    "VPC_ID",
    "AVAILABILITY_ZONES",
    "PRIVATE_SUBNET_IDS",
    "DB_IDENTIFIER",
    "DB_ENDPOINT",
    "DB_PORT",
    "DB_USERNAME",
    "DB_PASSWORD",
    "AWS_ACCOUNT_ID",
    "AWS_REGION",
];

const ALLOWED_PREFIX: &str = "PROXYFLOW_";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackContext {
    values: BTreeMap<String, String>,
}

impl StackContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Build the context for a stack file
    ///
    /// `env_file` overrides the `.env` sibling of `stack_file`; an explicit
    /// file that does not exist is an error, a missing sibling is not.
    pub fn load(stack_file: Option<&Path>, env_file: Option<&Path>) -> Result<Self> {
        let mut context = StackContext::new();

        match env_file {
            Some(path) => {
                context.add_env_file(path)?;
            }
            None => {
                let sibling = stack_file
                    .and_then(|p| p.parent())
                    .map(|dir| dir.join(".env"));
                if let Some(path) = sibling
                    && path.exists()
                {
                    context.add_env_file(&path)?;
                }
            }
        }

        context.add_process_env();
        context.resolve_secrets()?;
        Ok(context)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Value of a key; empty values count as absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Read `KEY=VALUE` lines; blank lines and `#` comments are skipped and
    /// surrounding quotes stripped
    pub fn add_env_file(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path).map_err(|e| PlanError::IoError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut count = 0;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                debug!(key = %key, "Adding variable from .env file");
                self.values
                    .insert(key.to_string(), strip_quotes(value.trim()).to_string());
                count += 1;
            }
        }

        info!(
            env_file = %path.display(),
            variable_count = count,
            "Loaded variables from .env file"
        );
        Ok(count)
    }

    /// Copy recognized keys from the process environment
    pub fn add_process_env(&mut self) {
        let mut count = 0;
        for (key, value) in std::env::vars() {
            if RECOGNIZED_KEYS.contains(&key.as_str()) || key.starts_with(ALLOWED_PREFIX) {
                self.values.insert(key, value);
                count += 1;
            }
        }
        debug!(count, "Added process environment variables");
    }

    /// Swap `op://` values for the secrets they point at
    pub fn resolve_secrets(&mut self) -> Result<usize> {
        onepassword::resolve_values(&mut self.values)
    }

    /// Fail with every key the stack reads but the context lacks
    pub fn require_all(&self, stack: &Stack) -> Result<()> {
        let missing: BTreeSet<&str> = stack
            .iter()
            .flat_map(|d| d.env_keys())
            .filter(|key| self.get(key).is_none())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PlanError::MissingConfiguration {
                keys: missing.into_iter().map(String::from).collect(),
            })
        }
    }

    /// Evaluate a property value that contains no references
    pub fn resolve_value(&self, value: &PropertyValue) -> Result<Value> {
        match value {
            PropertyValue::Literal(v) => Ok(v.clone()),
            PropertyValue::Env { key, list } => {
                let raw = self
                    .get(key)
                    .ok_or_else(|| PlanError::MissingConfiguration {
                        keys: vec![key.clone()],
                    })?;
                if *list {
                    Ok(Value::Array(
                        split_list(raw).into_iter().map(Value::String).collect(),
                    ))
                } else {
                    Ok(Value::String(raw.to_string()))
                }
            }
            PropertyValue::List(items) => items
                .iter()
                .map(|i| self.resolve_value(i))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            PropertyValue::Object(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.resolve_value(v)?);
                }
                Ok(Value::Object(out))
            }
            PropertyValue::Reference(r) => Err(PlanError::InvalidConfig(format!(
                "reference '{}' cannot be read from the stack context",
                r
            ))),
        }
    }
}

/// Split a comma separated value, trimming entries and dropping empty ones
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LookupMode, Properties, ResourceKind};
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_add_env_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "# network").unwrap();
        writeln!(file, "VPC_ID=vpc-123").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "DB_USERNAME=\"admin\"").unwrap();
        writeln!(file, "export DB_PORT='5432'").unwrap();

        let mut context = StackContext::new();
        assert_eq!(context.add_env_file(&path).unwrap(), 3);
        assert_eq!(context.get("VPC_ID"), Some("vpc-123"));
        assert_eq!(context.get("DB_USERNAME"), Some("admin"));
        assert_eq!(context.get("DB_PORT"), Some("5432"));
    }

    #[test]
    fn test_missing_env_file_is_error() {
        let mut context = StackContext::new();
        let err = context
            .add_env_file(Path::new("/nonexistent/.env"))
            .unwrap_err();
        assert!(matches!(err, PlanError::IoError { .. }));
    }

    #[test]
    fn test_process_env_wins_over_env_file() {
        let dir = TempDir::new().unwrap();
        let stack_file = dir.path().join("stack.kdl");
        std::fs::write(&stack_file, "").unwrap();
        std::fs::write(dir.path().join(".env"), "VPC_ID=vpc-from-file\nDB_PORT=3306\n").unwrap();

        temp_env::with_vars(
            [
                ("VPC_ID", Some("vpc-from-env")),
                ("PROXYFLOW_TEAM", Some("payments")),
                ("HOME_GROWN", Some("ignored")),
            ],
            || {
                let context = StackContext::load(Some(&stack_file), None).unwrap();
                assert_eq!(context.get("VPC_ID"), Some("vpc-from-env"));
                assert_eq!(context.get("DB_PORT"), Some("3306"));
                assert_eq!(context.get("PROXYFLOW_TEAM"), Some("payments"));
                assert_eq!(context.get("HOME_GROWN"), None);
            },
        );
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let context = StackContext::from_pairs([("VPC_ID", "")]);
        assert_eq!(context.get("VPC_ID"), None);
    }

    #[test]
    fn test_require_all_reports_every_missing_key() {
        let mut stack = Stack::new("test");
        let mut props = Properties::new();
        props.insert("vpcId".to_string(), PropertyValue::env("VPC_ID"));
        props.insert(
            "availabilityZones".to_string(),
            PropertyValue::env_list("AVAILABILITY_ZONES"),
        );
        props.insert(
            "subnetIds".to_string(),
            PropertyValue::env_list("PRIVATE_SUBNET_IDS"),
        );
        stack
            .define_resource(
                ResourceKind::Network,
                "Vpc",
                props,
                Some(LookupMode::Explicit),
            )
            .unwrap();

        let context = StackContext::from_pairs([("VPC_ID", "vpc-1"), ("PRIVATE_SUBNET_IDS", "")]);
        let err = context.require_all(&stack).unwrap_err();
        match err {
            PlanError::MissingConfiguration { keys } => {
                assert_eq!(keys, vec!["AVAILABILITY_ZONES", "PRIVATE_SUBNET_IDS"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolve_env_list() {
        let context = StackContext::from_pairs([("PRIVATE_SUBNET_IDS", " subnet-a, ,subnet-b,")]);
        let value = context
            .resolve_value(&PropertyValue::env_list("PRIVATE_SUBNET_IDS"))
            .unwrap();
        assert_eq!(value, json!(["subnet-a", "subnet-b"]));
    }

    #[test]
    fn test_resolve_value_rejects_references() {
        let context = StackContext::new();
        assert!(
            context
                .resolve_value(&PropertyValue::reference("Vpc", "vpcId"))
                .is_err()
        );
    }
}
