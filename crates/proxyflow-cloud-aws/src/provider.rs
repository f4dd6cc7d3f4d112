//! AWS inventory provider implementation

use crate::convert::{
    SubnetType, db_attributes, network_attributes, secret_attributes, security_group_attributes,
};
use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ec2::types::Filter;
use proxyflow_cloud::{AuthStatus, InventoryProvider};
use proxyflow_core::{Attributes, LookupRequest, ResourceKind};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

type Criteria = BTreeMap<String, String>;

const NETWORK_FILTERS: &[(&str, &str)] = &[
    ("isDefault", "is-default"),
    ("vpcId", "vpc-id"),
    ("cidrBlock", "cidr-block"),
];

const SECURITY_GROUP_FILTERS: &[(&str, &str)] = &[
    ("groupId", "group-id"),
    ("groupName", "group-name"),
    ("vpcId", "vpc-id"),
];

/// AWS inventory provider
pub struct AwsInventory {
    ec2: aws_sdk_ec2::Client,
    rds: aws_sdk_rds::Client,
    secrets: aws_sdk_secretsmanager::Client,
    sts: aws_sdk_sts::Client,
    region: Option<String>,
}

impl AwsInventory {
    /// Build clients from the ambient AWS configuration
    ///
    /// `region` and `profile` override what the environment and shared
    /// config files say.
    #[instrument(skip_all, fields(region = ?region, profile = ?profile))]
    pub async fn connect(region: Option<String>, profile: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;
        let region = config.region().map(|r| r.to_string());
        debug!(region = ?region, "AWS configuration loaded");

        Self {
            ec2: aws_sdk_ec2::Client::new(&config),
            rds: aws_sdk_rds::Client::new(&config),
            secrets: aws_sdk_secretsmanager::Client::new(&config),
            sts: aws_sdk_sts::Client::new(&config),
            region,
        }
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    async fn find_networks(&self, criteria: &Criteria) -> Result<Vec<Attributes>> {
        let mut subnet_type = SubnetType::default();
        let mut filters = Vec::new();
        for (key, value) in criteria {
            if key == "subnetType" {
                subnet_type = value.parse()?;
            } else {
                filters.push(ec2_filter(ResourceKind::Network, NETWORK_FILTERS, key, value)?);
            }
        }

        let vpcs = self
            .ec2
            .describe_vpcs()
            .set_filters(Some(filters))
            .send()
            .await
            .map_err(|e| AwsError::api("DescribeVpcs", e))?;

        let mut found = Vec::new();
        for vpc in vpcs.vpcs() {
            let Some(vpc_id) = vpc.vpc_id() else {
                continue;
            };
            let subnets = self
                .ec2
                .describe_subnets()
                .filters(Filter::builder().name("vpc-id").values(vpc_id).build())
                .send()
                .await
                .map_err(|e| AwsError::api("DescribeSubnets", e))?;
            found.extend(network_attributes(vpc, subnets.subnets(), subnet_type));
        }
        Ok(found)
    }

    async fn find_security_groups(&self, criteria: &Criteria) -> Result<Vec<Attributes>> {
        let filters = criteria
            .iter()
            .map(|(key, value)| {
                ec2_filter(
                    ResourceKind::SecurityGroup,
                    SECURITY_GROUP_FILTERS,
                    key,
                    value,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let output = self
            .ec2
            .describe_security_groups()
            .set_filters(Some(filters))
            .send()
            .await
            .map_err(|e| AwsError::api("DescribeSecurityGroups", e))?;
        Ok(output
            .security_groups()
            .iter()
            .filter_map(security_group_attributes)
            .collect())
    }

    async fn find_databases(&self, criteria: &Criteria) -> Result<Vec<Attributes>> {
        check_criteria(
            ResourceKind::DatabaseInstanceRef,
            criteria,
            &["instanceIdentifier", "engine"],
        )?;

        let mut request = self.rds.describe_db_instances();
        if let Some(id) = criteria.get("instanceIdentifier") {
            request = request.db_instance_identifier(id);
        }
        let output = match request.send().await {
            Ok(output) => output,
            Err(e) => {
                let e = e.into_service_error();
                if e.is_db_instance_not_found_fault() {
                    return Ok(Vec::new());
                }
                return Err(AwsError::api("DescribeDBInstances", e));
            }
        };

        let engine = criteria.get("engine");
        Ok(output
            .db_instances()
            .iter()
            .filter(|db| engine.is_none_or(|e| db.engine() == Some(e.as_str())))
            .filter_map(db_attributes)
            .collect())
    }

    async fn find_secrets(&self, criteria: &Criteria) -> Result<Vec<Attributes>> {
        check_criteria(
            ResourceKind::CredentialSecret,
            criteria,
            &["arn", "name", "secretName"],
        )?;
        let Some(secret_id) = ["arn", "secretName", "name"]
            .iter()
            .find_map(|key| criteria.get(*key))
        else {
            return Err(AwsError::UnsupportedCriterion {
                kind: ResourceKind::CredentialSecret.to_string(),
                criterion: "(none)".to_string(),
            });
        };

        match self.secrets.describe_secret().secret_id(secret_id).send().await {
            Ok(output) => Ok(secret_attributes(output.arn(), output.name())
                .into_iter()
                .collect()),
            Err(e) => {
                let e = e.into_service_error();
                if e.is_resource_not_found_exception() {
                    Ok(Vec::new())
                } else {
                    Err(AwsError::api("DescribeSecret", e))
                }
            }
        }
    }
}

fn check_criteria(kind: ResourceKind, criteria: &Criteria, allowed: &[&str]) -> Result<()> {
    match criteria.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(AwsError::UnsupportedCriterion {
            kind: kind.to_string(),
            criterion: key.clone(),
        }),
        None => Ok(()),
    }
}

/// Translate one criterion into an EC2 filter
///
/// `tags.Name=prod` becomes `tag:Name=prod`; comma-joined values match any.
fn ec2_filter(
    kind: ResourceKind,
    known: &[(&str, &str)],
    key: &str,
    value: &str,
) -> Result<Filter> {
    let name = match key.strip_prefix("tags.") {
        Some(tag) => format!("tag:{}", tag),
        None => known
            .iter()
            .find(|(criterion, _)| *criterion == key)
            .map(|(_, filter)| filter.to_string())
            .ok_or_else(|| AwsError::UnsupportedCriterion {
                kind: kind.to_string(),
                criterion: key.to_string(),
            })?,
    };
    let values: Vec<String> = value.split(',').map(|v| v.trim().to_string()).collect();
    Ok(Filter::builder().name(name).set_values(Some(values)).build())
}

#[async_trait]
impl InventoryProvider for AwsInventory {
    fn name(&self) -> &str {
        "aws"
    }

    fn display_name(&self) -> &str {
        "Amazon Web Services"
    }

    async fn check_auth(&self) -> proxyflow_cloud::Result<AuthStatus> {
        match self.sts.get_caller_identity().send().await {
            Ok(identity) => Ok(AuthStatus::ok(format!(
                "{} ({})",
                identity.arn().unwrap_or("unknown"),
                identity.account().unwrap_or("unknown account")
            ))),
            Err(e) => Ok(AuthStatus::failed(
                aws_sdk_sts::error::DisplayErrorContext(e).to_string(),
            )),
        }
    }

    #[instrument(skip_all, fields(key = %request.key()))]
    async fn find(&self, request: &LookupRequest) -> proxyflow_cloud::Result<Vec<Attributes>> {
        let criteria = &request.criteria;
        let found = match request.kind {
            ResourceKind::Network => self.find_networks(criteria).await?,
            ResourceKind::SecurityGroup => self.find_security_groups(criteria).await?,
            ResourceKind::DatabaseInstanceRef => self.find_databases(criteria).await?,
            ResourceKind::CredentialSecret => self.find_secrets(criteria).await?,
            other => return Err(AwsError::UnsupportedKind(other.to_string()).into()),
        };
        debug!(matches = found.len(), "AWS lookup answered");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ec2_filter_names() {
        let filter = ec2_filter(ResourceKind::Network, NETWORK_FILTERS, "isDefault", "true").unwrap();
        assert_eq!(filter.name(), Some("is-default"));
        assert_eq!(filter.values(), ["true".to_string()]);

        let filter =
            ec2_filter(ResourceKind::Network, NETWORK_FILTERS, "tags.Name", "prod, shared").unwrap();
        assert_eq!(filter.name(), Some("tag:Name"));
        assert_eq!(filter.values(), ["prod".to_string(), "shared".to_string()]);
    }

    #[test]
    fn test_unknown_criterion_rejected() {
        let err = ec2_filter(
            ResourceKind::SecurityGroup,
            SECURITY_GROUP_FILTERS,
            "ownerId",
            "123",
        )
        .unwrap_err();
        assert!(matches!(err, AwsError::UnsupportedCriterion { .. }));

        let mut criteria = Criteria::new();
        criteria.insert("port".to_string(), "5432".to_string());
        assert!(
            check_criteria(
                ResourceKind::DatabaseInstanceRef,
                &criteria,
                &["instanceIdentifier"]
            )
            .is_err()
        );
    }

    #[test]
    fn test_errors_convert_to_cloud_errors() {
        let err: proxyflow_cloud::CloudError =
            AwsError::UnsupportedKind(ResourceKind::Role.to_string()).into();
        assert!(matches!(
            err,
            proxyflow_cloud::CloudError::UnsupportedLookup(_)
        ));
    }
}
