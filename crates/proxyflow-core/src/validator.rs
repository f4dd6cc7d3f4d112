//! Cross-resource validation
//!
//! Checks the graph cannot express: a proxy's credentials, targets, engine
//! family, role trust and network placement. Every issue is collected so
//! one run reports all of them.

use crate::emitter::flatten;
use crate::model::{Descriptor, EngineFamily, PropertyValue, ResourceKind, Stack};
use crate::resolver::ResolutionContext;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Service principal a proxy role must trust
pub const RDS_PRINCIPAL: &str = "rds.amazonaws.com";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    #[error("proxy '{proxy}' has no credential secret in `secrets`")]
    MissingCredentialSecret { proxy: String },

    #[error("proxy '{proxy}' has no database target")]
    MissingProxyTarget { proxy: String },

    #[error(
        "proxy '{proxy}' speaks {family} but target '{target}' runs engine '{engine}'"
    )]
    EngineMismatch {
        proxy: String,
        family: EngineFamily,
        target: String,
        engine: String,
    },

    #[error("target '{target}' runs engine '{engine}' which no proxy engine family supports")]
    UnknownEngine { target: String, engine: String },

    #[error("proxy '{proxy}' has invalid engine family '{value}'")]
    InvalidEngineFamily { proxy: String, value: String },

    #[error("role '{role}' used by proxy '{proxy}' does not trust rds.amazonaws.com")]
    MissingTrustPolicy { proxy: String, role: String },

    #[error("proxy '{proxy}' has no role")]
    MissingRole { proxy: String },

    #[error("proxy '{proxy}' has no subnets to run in")]
    EmptyNetworkPlacement { proxy: String },

    #[error(
        "'{consumer}.{property}' must reference {expected}, but '{target}' is a {found}"
    )]
    ReferenceKindMismatch {
        consumer: String,
        property: String,
        target: String,
        expected: String,
        found: ResourceKind,
    },

    #[error("{0}")]
    Resolution(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    #[error("policy '{policy}' grants wildcard {field} '{value}'")]
    WildcardGrant {
        policy: String,
        field: String,
        value: String,
    },

    #[error("proxy '{proxy}' accepts connections without TLS")]
    TlsDisabled { proxy: String },
}

/// Everything one validation run found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    fn issue(&mut self, issue: ValidationIssue) {
        debug!(issue = %issue, "Validation issue");
        self.issues.push(issue);
    }

    fn warning(&mut self, warning: ValidationWarning) {
        warn!(warning = %warning, "Validation warning");
        self.warnings.push(warning);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed with {} issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        for warning in &self.warnings {
            write!(f, "\n  warning: {}", warning)?;
        }
        Ok(())
    }
}

/// Kinds a property may reference
fn expected_kinds(kind: ResourceKind, property: &str) -> &'static [ResourceKind] {
    use ResourceKind::*;
    match (kind, property) {
        (Proxy, "secrets") => &[CredentialSecret],
        (Proxy, "role") => &[Role],
        (Proxy, "targets") => &[DatabaseInstanceRef],
        (Proxy, "vpcSubnets") => &[Network],
        (Proxy, "securityGroups") => &[SecurityGroup, DatabaseInstanceRef],
        (ProxyTargetAssociation, "proxy") => &[Proxy],
        (ProxyTargetAssociation, "databases") => &[DatabaseInstanceRef],
        (PolicyGrant, "roles") => &[Role],
        (SecurityGroup, "vpc") => &[Network],
        _ => &[],
    }
}

/// Validate the stack against the externals realized in `ctx`
#[instrument(skip(ctx), fields(stack = %ctx.stack().name()))]
pub fn validate(ctx: &ResolutionContext<'_>) -> ValidationReport {
    let stack = ctx.stack();
    let mut report = ValidationReport::default();

    for descriptor in stack.iter() {
        check_references(ctx, descriptor, &mut report);
    }

    for proxy in stack.by_kind(ResourceKind::Proxy) {
        check_secrets(stack, proxy, &mut report);
        check_targets_and_engine(ctx, proxy, &mut report);
        check_role(ctx, proxy, &mut report);
        check_placement(ctx, proxy, &mut report);

        if proxy.property("requireTls").and_then(|v| v.as_bool()) == Some(false) {
            report.warning(ValidationWarning::TlsDisabled {
                proxy: proxy.id().to_string(),
            });
        }
    }

    for policy in stack.by_kind(ResourceKind::PolicyGrant) {
        check_wildcards(ctx, policy, &mut report);
    }

    debug!(
        issues = report.issues.len(),
        warnings = report.warnings.len(),
        "Validation finished"
    );
    report
}

/// Every reference must resolve and point at a kind the property accepts
fn check_references(ctx: &ResolutionContext<'_>, descriptor: &Descriptor, report: &mut ValidationReport) {
    for (property, reference) in descriptor.references() {
        if let Err(e) = ctx.resolve(descriptor.id(), reference) {
            report.issue(ValidationIssue::Resolution(e.to_string()));
            continue;
        }

        let expected = expected_kinds(descriptor.kind(), property);
        if let Some(target) = ctx.stack().get(&reference.target_id)
            && !expected.is_empty()
            && !expected.contains(&target.kind())
        {
            report.issue(ValidationIssue::ReferenceKindMismatch {
                consumer: descriptor.id().to_string(),
                property: property.to_string(),
                target: target.id().to_string(),
                expected: expected
                    .iter()
                    .map(|k| k.to_string())
                    .collect::<Vec<_>>()
                    .join(" or "),
                found: target.kind(),
            });
        }
    }
}

fn referenced_of_kind<'s>(
    stack: &'s Stack,
    descriptor: &Descriptor,
    property: &str,
    kind: ResourceKind,
) -> Vec<&'s Descriptor> {
    descriptor
        .references_in(property)
        .into_iter()
        .filter_map(|r| stack.get(&r.target_id))
        .filter(|d| d.kind() == kind)
        .collect()
}

fn check_secrets(stack: &Stack, proxy: &Descriptor, report: &mut ValidationReport) {
    if referenced_of_kind(stack, proxy, "secrets", ResourceKind::CredentialSecret).is_empty() {
        report.issue(ValidationIssue::MissingCredentialSecret {
            proxy: proxy.id().to_string(),
        });
    }
}

/// Databases a proxy fronts: its own `targets` plus associations pointing at it
pub fn proxy_targets<'s>(stack: &'s Stack, proxy: &Descriptor) -> Vec<&'s Descriptor> {
    let mut targets = referenced_of_kind(stack, proxy, "targets", ResourceKind::DatabaseInstanceRef);

    for association in stack.by_kind(ResourceKind::ProxyTargetAssociation) {
        let points_here = association
            .references_in("proxy")
            .iter()
            .any(|r| r.target_id == proxy.id());
        if points_here {
            targets.extend(referenced_of_kind(
                stack,
                association,
                "databases",
                ResourceKind::DatabaseInstanceRef,
            ));
        }
    }

    targets.sort_by(|a, b| a.id().cmp(b.id()));
    targets.dedup_by(|a, b| a.id() == b.id());
    targets
}

/// Engine of a realized database target
fn target_engine(ctx: &ResolutionContext<'_>, target: &Descriptor) -> Option<String> {
    ctx.attributes(target.id())
        .and_then(|attrs| attrs.get("engine"))
        .and_then(Value::as_str)
        .map(String::from)
}

/// Declared engine family of a proxy, or `None` when omitted
pub fn declared_engine_family(
    ctx: &ResolutionContext<'_>,
    proxy: &Descriptor,
) -> Option<std::result::Result<EngineFamily, String>> {
    let value = proxy.property("engineFamily")?;
    let raw = match ctx.config().resolve_value(value) {
        Ok(Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(e) => return Some(Err(e.to_string())),
    };
    Some(raw.parse::<EngineFamily>().map_err(|_| raw))
}

/// Engine family of a proxy: declared, or inferred from its first target
pub fn engine_family(ctx: &ResolutionContext<'_>, proxy: &Descriptor) -> Option<EngineFamily> {
    match declared_engine_family(ctx, proxy) {
        Some(declared) => declared.ok(),
        None => proxy_targets(ctx.stack(), proxy)
            .into_iter()
            .filter_map(|t| target_engine(ctx, t))
            .find_map(|engine| EngineFamily::from_engine(&engine)),
    }
}

fn check_targets_and_engine(
    ctx: &ResolutionContext<'_>,
    proxy: &Descriptor,
    report: &mut ValidationReport,
) {
    let targets = proxy_targets(ctx.stack(), proxy);
    if targets.is_empty() {
        report.issue(ValidationIssue::MissingProxyTarget {
            proxy: proxy.id().to_string(),
        });
    }

    let mut expected = match declared_engine_family(ctx, proxy) {
        Some(Ok(family)) => Some(family),
        Some(Err(value)) => {
            report.issue(ValidationIssue::InvalidEngineFamily {
                proxy: proxy.id().to_string(),
                value,
            });
            return;
        }
        None => None,
    };

    for target in targets {
        let Some(engine) = target_engine(ctx, target) else {
            continue;
        };
        let Some(family) = EngineFamily::from_engine(&engine) else {
            report.issue(ValidationIssue::UnknownEngine {
                target: target.id().to_string(),
                engine,
            });
            continue;
        };

        match expected {
            Some(want) if want != family => {
                report.issue(ValidationIssue::EngineMismatch {
                    proxy: proxy.id().to_string(),
                    family: want,
                    target: target.id().to_string(),
                    engine,
                });
            }
            Some(_) => {}
            // the first target decides when no family is declared
            None => expected = Some(family),
        }
    }
}

fn check_role(ctx: &ResolutionContext<'_>, proxy: &Descriptor, report: &mut ValidationReport) {
    let Some(value) = proxy.property("role") else {
        report.issue(ValidationIssue::MissingRole {
            proxy: proxy.id().to_string(),
        });
        return;
    };

    // a role given as a literal arn is imported and trusted as-is
    for role in value
        .references()
        .into_iter()
        .filter_map(|r| ctx.stack().get(&r.target_id))
        .filter(|d| d.kind() == ResourceKind::Role && !d.is_external())
    {
        let trusted = role
            .property("assumedBy")
            .map(|v| literal_strings(ctx, v))
            .unwrap_or_default()
            .iter()
            .any(|p| p == RDS_PRINCIPAL);

        if !trusted {
            report.issue(ValidationIssue::MissingTrustPolicy {
                proxy: proxy.id().to_string(),
                role: role.id().to_string(),
            });
        }
    }
}

fn check_placement(ctx: &ResolutionContext<'_>, proxy: &Descriptor, report: &mut ValidationReport) {
    let empty = || ValidationIssue::EmptyNetworkPlacement {
        proxy: proxy.id().to_string(),
    };

    let Some(value) = proxy.property("vpcSubnets") else {
        report.issue(empty());
        return;
    };

    let resolved = match ctx.resolve_value(proxy.id(), value) {
        Ok(resolved) => resolved,
        // already reported by check_references
        Err(_) => return,
    };

    // intrinsic or deferred placement is decided by the backend
    if let Some(value) = resolved.to_value()
        && is_empty_placement(&value)
    {
        report.issue(empty());
    }
}

/// Placement needs at least one subnet, and every entry must be a subnet id
/// or an intrinsic
fn is_empty_placement(value: &Value) -> bool {
    if value.is_object() {
        return false;
    }
    let subnets = flatten(value);
    subnets.is_empty()
        || subnets.iter().any(|subnet| match subnet {
            Value::String(s) => s.trim().is_empty(),
            Value::Object(_) => false,
            _ => true,
        })
}

fn check_wildcards(ctx: &ResolutionContext<'_>, policy: &Descriptor, report: &mut ValidationReport) {
    for field in ["actions", "resources"] {
        let Some(value) = policy.property(field) else {
            continue;
        };
        for item in literal_strings(ctx, value) {
            let wildcard = item == "*" || (field == "actions" && item.ends_with(":*"));
            if wildcard {
                report.warning(ValidationWarning::WildcardGrant {
                    policy: policy.id().to_string(),
                    field: field.to_string(),
                    value: item,
                });
            }
        }
    }
}

/// String values of a property, skipping references
fn literal_strings(ctx: &ResolutionContext<'_>, value: &PropertyValue) -> Vec<String> {
    match value {
        PropertyValue::List(items) => items
            .iter()
            .flat_map(|i| literal_strings(ctx, i))
            .collect(),
        PropertyValue::Reference(_) | PropertyValue::Object(_) => Vec::new(),
        other => match ctx.config().resolve_value(other) {
            Ok(Value::String(s)) => vec![s],
            Ok(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        },
    }
}
