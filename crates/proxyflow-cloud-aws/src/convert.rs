//! SDK shapes → lookup attributes

use crate::error::AwsError;
use aws_sdk_ec2::types::{SecurityGroup, Subnet, Vpc};
use aws_sdk_rds::types::DbInstance;
use proxyflow_core::Attributes;
use serde_json::json;
use std::str::FromStr;

/// Which subnets of a network a proxy is placed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubnetType {
    #[default]
    Private,
    Public,
}

impl SubnetType {
    fn matches(&self, subnet: &Subnet) -> bool {
        let public = subnet.map_public_ip_on_launch().unwrap_or(false);
        match self {
            SubnetType::Private => !public,
            SubnetType::Public => public,
        }
    }
}

impl FromStr for SubnetType {
    type Err = AwsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(SubnetType::Private),
            "public" => Ok(SubnetType::Public),
            other => Err(AwsError::InvalidCriterion {
                criterion: "subnetType".to_string(),
                value: other.to_string(),
                message: "expected private or public".to_string(),
            }),
        }
    }
}

/// Attributes of a VPC and its subnets of one type
///
/// Subnets are ordered by availability zone, then id.
pub fn network_attributes(
    vpc: &Vpc,
    subnets: &[Subnet],
    subnet_type: SubnetType,
) -> Option<Attributes> {
    let vpc_id = vpc.vpc_id()?;

    let mut selected: Vec<(&str, &str)> = subnets
        .iter()
        .filter(|s| s.vpc_id() == Some(vpc_id) && subnet_type.matches(s))
        .filter_map(|s| Some((s.availability_zone()?, s.subnet_id()?)))
        .collect();
    selected.sort_unstable();

    let mut zones: Vec<&str> = selected.iter().map(|(zone, _)| *zone).collect();
    zones.dedup();
    let subnet_ids: Vec<&str> = selected.iter().map(|(_, id)| *id).collect();

    let mut attrs = Attributes::new();
    attrs.insert("vpcId".to_string(), json!(vpc_id));
    attrs.insert("availabilityZones".to_string(), json!(zones));
    attrs.insert("subnetIds".to_string(), json!(subnet_ids));
    if let Some(cidr) = vpc.cidr_block() {
        attrs.insert("cidrBlock".to_string(), json!(cidr));
    }
    Some(attrs)
}

pub fn security_group_attributes(group: &SecurityGroup) -> Option<Attributes> {
    let mut attrs = Attributes::new();
    attrs.insert("groupId".to_string(), json!(group.group_id()?));
    if let Some(vpc_id) = group.vpc_id() {
        attrs.insert("vpcId".to_string(), json!(vpc_id));
    }
    Some(attrs)
}

/// Attributes of a database instance
///
/// Instances without an endpoint yet (still creating) have no address or port.
pub fn db_attributes(instance: &DbInstance) -> Option<Attributes> {
    let mut attrs = Attributes::new();
    attrs.insert(
        "instanceIdentifier".to_string(),
        json!(instance.db_instance_identifier()?),
    );
    if let Some(endpoint) = instance.endpoint() {
        if let Some(address) = endpoint.address() {
            attrs.insert("endpointAddress".to_string(), json!(address));
        }
        if let Some(port) = endpoint.port() {
            attrs.insert("port".to_string(), json!(port));
        }
    }
    if let Some(engine) = instance.engine() {
        attrs.insert("engine".to_string(), json!(engine));
    }

    let mut groups: Vec<&str> = instance
        .vpc_security_groups()
        .iter()
        .filter_map(|m| m.vpc_security_group_id())
        .collect();
    groups.sort_unstable();
    attrs.insert("securityGroupIds".to_string(), json!(groups));
    Some(attrs)
}

pub fn secret_attributes(arn: Option<&str>, name: Option<&str>) -> Option<Attributes> {
    let mut attrs = Attributes::new();
    attrs.insert("arn".to_string(), json!(arn?));
    if let Some(name) = name {
        attrs.insert("name".to_string(), json!(name));
    }
    Some(attrs)
}
