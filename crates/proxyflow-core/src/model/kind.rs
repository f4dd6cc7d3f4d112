//! Resource kinds and their attribute catalogue

use crate::error::{PlanError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;

/// Kind of infrastructure object a descriptor stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Network,
    SecurityGroup,
    CredentialSecret,
    Role,
    PolicyGrant,
    DatabaseInstanceRef,
    Proxy,
    ProxyTargetAssociation,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Network,
        ResourceKind::SecurityGroup,
        ResourceKind::CredentialSecret,
        ResourceKind::Role,
        ResourceKind::PolicyGrant,
        ResourceKind::DatabaseInstanceRef,
        ResourceKind::Proxy,
        ResourceKind::ProxyTargetAssociation,
    ];

    /// Attributes other descriptors may reference
    pub fn attributes(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Network => &["vpcId", "availabilityZones", "subnetIds", "cidrBlock"],
            ResourceKind::SecurityGroup => &["groupId", "vpcId"],
            ResourceKind::CredentialSecret => &["arn", "name"],
            ResourceKind::Role => &["arn", "roleName"],
            ResourceKind::PolicyGrant => &["policyName"],
            ResourceKind::DatabaseInstanceRef => &[
                "instanceIdentifier",
                "endpointAddress",
                "port",
                "engine",
                "securityGroupIds",
            ],
            ResourceKind::Proxy => &["arn", "endpoint", "name"],
            ResourceKind::ProxyTargetAssociation => &["targetGroupArn"],
        }
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes().contains(&attribute)
    }

    /// Attributes an operator must supply when importing with an explicit attribute set
    pub fn identifying_attributes(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Network => &["vpcId", "availabilityZones", "subnetIds"],
            ResourceKind::SecurityGroup => &["groupId"],
            ResourceKind::CredentialSecret => &["arn"],
            ResourceKind::Role => &["arn"],
            ResourceKind::DatabaseInstanceRef => {
                &["instanceIdentifier", "endpointAddress", "port", "engine"]
            }
            _ => &[],
        }
    }

    pub fn can_be_external(&self) -> bool {
        !self.identifying_attributes().is_empty()
    }

    /// An existing database is never created by a stack
    pub fn must_be_external(&self) -> bool {
        matches!(self, ResourceKind::DatabaseInstanceRef)
    }

    /// Resource type in the provisioning backend
    pub fn backend_type(&self) -> &'static str {
        match self {
            ResourceKind::Network => "AWS::EC2::VPC",
            ResourceKind::SecurityGroup => "AWS::EC2::SecurityGroup",
            ResourceKind::CredentialSecret => "AWS::SecretsManager::Secret",
            ResourceKind::Role => "AWS::IAM::Role",
            ResourceKind::PolicyGrant => "AWS::IAM::Policy",
            ResourceKind::DatabaseInstanceRef => "AWS::RDS::DBInstance",
            ResourceKind::Proxy => "AWS::RDS::DBProxy",
            ResourceKind::ProxyTargetAssociation => "AWS::RDS::DBProxyTargetGroup",
        }
    }

    /// Intrinsic reference the backend uses for an attribute of a resource this stack creates
    ///
    /// Returns `None` when the backend cannot produce the attribute (e.g. the
    /// subnets of a freshly created VPC).
    pub fn intrinsic(&self, logical_id: &str, attribute: &str) -> Option<Value> {
        let reference = || json!({ "Ref": logical_id });
        let get_att = |name: &str| json!({ "Fn::GetAtt": [logical_id, name] });

        match (self, attribute) {
            (ResourceKind::Network, "vpcId") => Some(reference()),
            (ResourceKind::Network, "cidrBlock") => Some(get_att("CidrBlock")),
            (ResourceKind::SecurityGroup, "groupId") => Some(get_att("GroupId")),
            (ResourceKind::SecurityGroup, "vpcId") => Some(get_att("VpcId")),
            (ResourceKind::CredentialSecret, "arn") => Some(reference()),
            (ResourceKind::Role, "arn") => Some(get_att("Arn")),
            (ResourceKind::Role, "roleName") => Some(reference()),
            (ResourceKind::PolicyGrant, "policyName") => Some(reference()),
            (ResourceKind::Proxy, "arn") => Some(get_att("DBProxyArn")),
            (ResourceKind::Proxy, "endpoint") => Some(get_att("Endpoint")),
            (ResourceKind::Proxy, "name") => Some(reference()),
            (ResourceKind::ProxyTargetAssociation, "targetGroupArn") => {
                Some(get_att("TargetGroupArn"))
            }
            _ => None,
        }
    }

    /// Name used for the kind in stack files
    pub fn node_name(&self) -> &'static str {
        match self {
            ResourceKind::Network => "network",
            ResourceKind::SecurityGroup => "security-group",
            ResourceKind::CredentialSecret => "secret",
            ResourceKind::Role => "role",
            ResourceKind::PolicyGrant => "policy",
            ResourceKind::DatabaseInstanceRef => "database",
            ResourceKind::Proxy => "proxy",
            ResourceKind::ProxyTargetAssociation => "proxy-target",
        }
    }

    pub fn from_node_name(name: &str) -> Option<Self> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.node_name() == name)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceKind::Network => "Network",
            ResourceKind::SecurityGroup => "SecurityGroup",
            ResourceKind::CredentialSecret => "CredentialSecret",
            ResourceKind::Role => "Role",
            ResourceKind::PolicyGrant => "PolicyGrant",
            ResourceKind::DatabaseInstanceRef => "DatabaseInstanceRef",
            ResourceKind::Proxy => "Proxy",
            ResourceKind::ProxyTargetAssociation => "ProxyTargetAssociation",
        };
        write!(f, "{}", name)
    }
}

/// How an existing object is located
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMode {
    /// Attribute values are literals written in the stack file
    Inline,
    /// Query the live inventory with coarse criteria
    Default,
    /// Operator supplies the complete identifying attribute set
    Explicit,
}

impl std::fmt::Display for LookupMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupMode::Inline => write!(f, "inline"),
            LookupMode::Default => write!(f, "default"),
            LookupMode::Explicit => write!(f, "explicit"),
        }
    }
}

impl FromStr for LookupMode {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "inline" => Ok(LookupMode::Inline),
            "default" => Ok(LookupMode::Default),
            "explicit" => Ok(LookupMode::Explicit),
            other => Err(PlanError::InvalidConfig(format!(
                "unknown lookup mode '{}' (expected inline, default or explicit)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_name_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_node_name(kind.node_name()), Some(kind));
        }
        assert_eq!(ResourceKind::from_node_name("bucket"), None);
    }

    #[test]
    fn test_only_existing_objects_can_be_external() {
        assert!(ResourceKind::Network.can_be_external());
        assert!(ResourceKind::DatabaseInstanceRef.must_be_external());
        assert!(!ResourceKind::Proxy.can_be_external());
        assert!(!ResourceKind::PolicyGrant.can_be_external());
    }

    #[test]
    fn test_intrinsic_for_managed_attributes() {
        assert_eq!(
            ResourceKind::Role.intrinsic("ProxyRole", "arn"),
            Some(json!({ "Fn::GetAtt": ["ProxyRole", "Arn"] }))
        );
        assert_eq!(
            ResourceKind::CredentialSecret.intrinsic("DbSecret", "arn"),
            Some(json!({ "Ref": "DbSecret" }))
        );
        // a VPC created by the stack has no subnet list to hand out
        assert_eq!(ResourceKind::Network.intrinsic("Vpc", "subnetIds"), None);
    }

    #[test]
    fn test_lookup_mode_parse() {
        assert_eq!("explicit".parse::<LookupMode>().unwrap(), LookupMode::Explicit);
        assert!("guess".parse::<LookupMode>().is_err());
    }
}
