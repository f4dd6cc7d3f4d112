//! 1Password integration
//!
//! Context values of the form `op://Vault/Item/Field` (or
//! `op://Vault/Item/Section/Field`) are read through the 1Password CLI.
//! A signed-in `op` or `OP_SERVICE_ACCOUNT_TOKEN` is required.
//!
//! Resolved secrets are never logged, and error messages only carry the
//! reference, not the value.

use crate::error::{PlanError, Result};
use std::collections::BTreeMap;
use std::process::Command;
use tracing::{debug, info};

const OP_PREFIX: &str = "op://";

/// Whether the `op` binary is on PATH
pub fn is_available() -> bool {
    Command::new("op")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub fn is_op_reference(value: &str) -> bool {
    value.starts_with(OP_PREFIX)
}

/// Read a single `op://` reference
pub fn resolve_reference(reference: &str) -> Result<String> {
    if !is_op_reference(reference) {
        return Err(PlanError::OnePasswordError(format!(
            "invalid 1Password reference '{}' (must start with op://)",
            reference
        )));
    }

    debug!(reference = %reference, "Resolving 1Password reference");

    let mut cmd = Command::new("op");
    cmd.arg("read").arg(reference);

    if let Ok(account) = std::env::var("OP_ACCOUNT") {
        debug!(account = %account, "Using OP_ACCOUNT");
        cmd.arg("--account").arg(account);
    }

    let output = cmd
        .output()
        .map_err(|e| PlanError::OnePasswordError(format!("failed to run op: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let hint = if stderr.contains("not signed in") || stderr.contains("session expired") {
            "\nhint: run `op signin` or set OP_SERVICE_ACCOUNT_TOKEN"
        } else if stderr.contains("not found") {
            "\nhint: check the vault, item and field names"
        } else if stderr.contains("multiple accounts") {
            "\nhint: pick an account with OP_ACCOUNT"
        } else {
            ""
        };

        return Err(PlanError::OnePasswordError(format!(
            "could not read {}: {}{}",
            reference,
            stderr.trim(),
            hint
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Replace every `op://` value in the map with the secret it points at
///
/// All failures are collected; a single unresolved reference fails the whole
/// context so a plan never carries an `op://` string into the document.
pub fn resolve_values(values: &mut BTreeMap<String, String>) -> Result<usize> {
    let pending: Vec<(String, String)> = values
        .iter()
        .filter(|(_, v)| is_op_reference(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    if pending.is_empty() {
        return Ok(0);
    }

    if !is_available() {
        return Err(PlanError::OnePasswordError(format!(
            "1Password CLI (op) not found on PATH, needed for {}",
            pending
                .iter()
                .map(|(k, _)| k.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    let mut errors = Vec::new();
    let mut resolved = 0;
    for (key, reference) in pending {
        match resolve_reference(&reference) {
            Ok(secret) => {
                values.insert(key.clone(), secret);
                resolved += 1;
                debug!(key = %key, "Resolved 1Password reference");
            }
            Err(e) => errors.push(format!("{}: {}", key, e)),
        }
    }

    if !errors.is_empty() {
        return Err(PlanError::OnePasswordError(errors.join("\n")));
    }

    info!(resolved, "Resolved 1Password references");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_op_reference() {
        assert!(is_op_reference("op://Vault/Item/Field"));
        assert!(is_op_reference("op://Payments/rds-proxy/password"));
        assert!(!is_op_reference("https://example.com"));
        assert!(!is_op_reference("password123"));
        assert!(!is_op_reference(""));
    }

    #[test]
    fn test_resolve_values_without_references_is_noop() {
        let mut values = BTreeMap::new();
        values.insert("VPC_ID".to_string(), "vpc-123".to_string());
        assert_eq!(resolve_values(&mut values).unwrap(), 0);
        assert_eq!(values["VPC_ID"], "vpc-123");
    }

    #[test]
    #[ignore = "requires 1Password CLI and authentication"]
    fn test_resolve_reference() {
        let result = resolve_reference("op://Payments/rds-proxy/password");
        assert!(result.is_ok());
    }

    #[test]
    fn test_resolve_reference_invalid() {
        let result = resolve_reference("not-an-op-reference");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("op://"));
    }
}
