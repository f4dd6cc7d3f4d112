//! Backend renderings of managed descriptors
//!
//! Each function turns resolved camelCase properties into the CloudFormation
//! property map of one resource type.

use crate::error::{PlanError, Result};
use crate::model::ResourceKind;
use crate::validator::RDS_PRINCIPAL;
use serde_json::{Value, json};
use std::collections::BTreeMap;

pub type Rendered = BTreeMap<String, Value>;
type Values = BTreeMap<String, Value>;

const POLICY_VERSION: &str = "2012-10-17";
const DEFAULT_PASSWORD_LENGTH: u64 = 30;
const DEFAULT_TARGET_GROUP: &str = "default";

/// Render a managed descriptor
pub fn render(kind: ResourceKind, id: &str, values: &Values) -> Result<Rendered> {
    match kind {
        ResourceKind::Network => network(id, values),
        ResourceKind::SecurityGroup => security_group(id, values),
        ResourceKind::CredentialSecret => secret(values),
        ResourceKind::Role => role(values),
        ResourceKind::PolicyGrant => policy(id, values),
        ResourceKind::Proxy => proxy(id, values),
        ResourceKind::ProxyTargetAssociation => target_group(id, values),
        ResourceKind::DatabaseInstanceRef => Err(PlanError::InvalidConfig(format!(
            "database '{}' is never created by a stack",
            id
        ))),
    }
}

fn required<'v>(id: &str, values: &'v Values, name: &str) -> Result<&'v Value> {
    values.get(name).ok_or_else(|| {
        PlanError::InvalidConfig(format!("'{}' needs a '{}' property", id, name))
    })
}

/// Flatten nested lists, e.g. several subnet references each yielding a list
pub fn flatten(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.iter().flat_map(flatten).collect(),
        other => vec![other.clone()],
    }
}

fn string_list(value: Option<&Value>) -> Vec<Value> {
    value.map(flatten).unwrap_or_default()
}

fn bool_or(values: &Values, name: &str, default: bool) -> Value {
    match values.get(name) {
        Some(Value::Bool(b)) => Value::Bool(*b),
        Some(Value::String(s)) => Value::Bool(s.parse().unwrap_or(default)),
        _ => Value::Bool(default),
    }
}

/// `maxConnectionsPercent` → `MaxConnectionsPercent`
fn pascal_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn network(id: &str, values: &Values) -> Result<Rendered> {
    let mut out = Rendered::new();
    out.insert("CidrBlock".into(), required(id, values, "cidrBlock")?.clone());
    out.insert("EnableDnsHostnames".into(), bool_or(values, "enableDnsHostnames", true));
    out.insert("EnableDnsSupport".into(), bool_or(values, "enableDnsSupport", true));
    Ok(out)
}

fn security_group(id: &str, values: &Values) -> Result<Rendered> {
    let mut out = Rendered::new();
    let description = values
        .get("description")
        .cloned()
        .unwrap_or_else(|| Value::String(format!("{} security group", id)));
    out.insert("GroupDescription".into(), description);
    out.insert("VpcId".into(), required(id, values, "vpc")?.clone());

    if bool_or(values, "allowAllOutbound", true) == Value::Bool(true) {
        out.insert(
            "SecurityGroupEgress".into(),
            json!([{
                "CidrIp": "0.0.0.0/0",
                "Description": "Allow all outbound traffic by default",
                "IpProtocol": "-1"
            }]),
        );
    }

    if let Some(ports) = values.get("ingressPorts") {
        let cidr = values
            .get("ingressCidr")
            .cloned()
            .unwrap_or_else(|| Value::String("0.0.0.0/0".into()));
        let rules: Vec<Value> = flatten(ports)
            .into_iter()
            .map(|port| {
                json!({
                    "CidrIp": cidr,
                    "FromPort": port,
                    "IpProtocol": "tcp",
                    "ToPort": port
                })
            })
            .collect();
        out.insert("SecurityGroupIngress".into(), Value::Array(rules));
    }
    Ok(out)
}

fn secret(values: &Values) -> Result<Rendered> {
    let mut out = Rendered::new();
    if let Some(name) = values.get("secretName") {
        out.insert("Name".into(), name.clone());
    }
    if let Some(description) = values.get("description") {
        out.insert("Description".into(), description.clone());
    }

    let generate = match values.get("generate") {
        Some(Value::Object(map)) => map.clone().into_iter().collect::<Values>(),
        _ => Values::new(),
    };
    let username = generate
        .get("username")
        .or_else(|| values.get("username"))
        .cloned();

    match values.get("password") {
        Some(password) => {
            let mut secret = serde_json::Map::new();
            if let Some(username) = username {
                secret.insert("username".into(), username);
            }
            secret.insert("password".into(), password.clone());
            out.insert(
                "SecretString".into(),
                Value::String(Value::Object(secret).to_string()),
            );
        }
        None => {
            let mut generator = serde_json::Map::new();
            let template = match username {
                Some(username) => json!({ "username": username }),
                None => json!({}),
            };
            generator.insert("SecretStringTemplate".into(), Value::String(template.to_string()));
            generator.insert(
                "GenerateStringKey".into(),
                generate
                    .get("key")
                    .cloned()
                    .unwrap_or_else(|| Value::String("password".into())),
            );
            generator.insert(
                "PasswordLength".into(),
                generate
                    .get("passwordLength")
                    .cloned()
                    .unwrap_or_else(|| Value::from(DEFAULT_PASSWORD_LENGTH)),
            );
            generator.insert(
                "ExcludePunctuation".into(),
                bool_or(&generate, "excludePunctuation", true),
            );
            if let Some(excluded) = generate.get("excludeCharacters") {
                generator.insert("ExcludeCharacters".into(), excluded.clone());
            }
            out.insert("GenerateSecretString".into(), Value::Object(generator));
        }
    }
    Ok(out)
}

fn role(values: &Values) -> Result<Rendered> {
    let mut out = Rendered::new();
    let principals = match values.get("assumedBy") {
        Some(value) => flatten(value),
        None => vec![Value::String(RDS_PRINCIPAL.into())],
    };
    out.insert(
        "AssumeRolePolicyDocument".into(),
        json!({
            "Version": POLICY_VERSION,
            "Statement": [{
                "Action": "sts:AssumeRole",
                "Effect": "Allow",
                "Principal": { "Service": principals }
            }]
        }),
    );
    if let Some(name) = values.get("roleName") {
        out.insert("RoleName".into(), name.clone());
    }
    if let Some(description) = values.get("description") {
        out.insert("Description".into(), description.clone());
    }
    Ok(out)
}

fn policy(id: &str, values: &Values) -> Result<Rendered> {
    let mut out = Rendered::new();
    let name = values
        .get("policyName")
        .cloned()
        .unwrap_or_else(|| Value::String(id.to_string()));
    out.insert("PolicyName".into(), name);

    let roles = string_list(values.get("roles"));
    if roles.is_empty() {
        return Err(PlanError::InvalidConfig(format!(
            "policy '{}' is not attached to any role",
            id
        )));
    }
    out.insert("Roles".into(), Value::Array(roles));

    let actions = string_list(values.get("actions"));
    let resources = string_list(values.get("resources"));
    out.insert(
        "PolicyDocument".into(),
        json!({
            "Version": POLICY_VERSION,
            "Statement": [{
                "Action": actions,
                "Effect": "Allow",
                "Resource": resources
            }]
        }),
    );
    Ok(out)
}

fn proxy(id: &str, values: &Values) -> Result<Rendered> {
    let mut out = Rendered::new();
    let name = values
        .get("name")
        .cloned()
        .unwrap_or_else(|| Value::String(id.to_string()));
    out.insert("DBProxyName".into(), name);
    out.insert("EngineFamily".into(), required(id, values, "engineFamily")?.clone());
    out.insert("RoleArn".into(), required(id, values, "role")?.clone());

    let iam_auth = match values.get("iamAuth") {
        Some(Value::Bool(true)) => "REQUIRED",
        Some(Value::String(s)) if s.eq_ignore_ascii_case("required") => "REQUIRED",
        _ => "DISABLED",
    };
    let auth: Vec<Value> = string_list(values.get("secrets"))
        .into_iter()
        .map(|arn| {
            json!({
                "AuthScheme": "SECRETS",
                "IAMAuth": iam_auth,
                "SecretArn": arn
            })
        })
        .collect();
    out.insert("Auth".into(), Value::Array(auth));
    out.insert(
        "VpcSubnetIds".into(),
        Value::Array(string_list(values.get("vpcSubnets"))),
    );

    let groups = string_list(values.get("securityGroups"));
    if !groups.is_empty() {
        out.insert("VpcSecurityGroupIds".into(), Value::Array(groups));
    }
    out.insert("RequireTLS".into(), bool_or(values, "requireTls", true));
    if let Some(timeout) = values.get("idleClientTimeout") {
        out.insert("IdleClientTimeout".into(), timeout.clone());
    }
    out.insert("DebugLogging".into(), bool_or(values, "debugLogging", false));
    Ok(out)
}

fn target_group(id: &str, values: &Values) -> Result<Rendered> {
    let mut out = Rendered::new();
    out.insert("DBProxyName".into(), required(id, values, "proxy")?.clone());
    out.insert(
        "TargetGroupName".into(),
        values
            .get("targetGroupName")
            .cloned()
            .unwrap_or_else(|| Value::String(DEFAULT_TARGET_GROUP.into())),
    );
    out.insert(
        "DBInstanceIdentifiers".into(),
        Value::Array(string_list(values.get("databases"))),
    );

    if let Some(Value::Object(pool)) = values.get("connectionPool") {
        let info: serde_json::Map<String, Value> = pool
            .iter()
            .map(|(k, v)| (pascal_case(k), v.clone()))
            .collect();
        out.insert("ConnectionPoolConfigurationInfo".into(), Value::Object(info));
    }
    Ok(out)
}
