//! AWS inventory provider for proxyflow
//!
//! Answers `lookup="default"` descriptors by querying the account the
//! ambient AWS configuration points at. Only read-only calls are made:
//!
//! | Kind                  | Call                                   |
//! |-----------------------|----------------------------------------|
//! | `Network`             | EC2 `DescribeVpcs` + `DescribeSubnets` |
//! | `SecurityGroup`       | EC2 `DescribeSecurityGroups`           |
//! | `DatabaseInstanceRef` | RDS `DescribeDBInstances`              |
//! | `CredentialSecret`    | Secrets Manager `DescribeSecret`       |
//!
//! # Example
//!
//! ```ignore
//! use proxyflow_cloud::{InventoryProvider, prefetch};
//! use proxyflow_cloud_aws::AwsInventory;
//!
//! let provider = AwsInventory::connect(Some("eu-west-1".into()), None).await;
//! let auth = provider.check_auth().await?;
//! if !auth.authenticated {
//!     anyhow::bail!("{}", auth);
//! }
//! let cache = prefetch(&stack, &context, &provider).await?;
//! ```

pub mod convert;
pub mod error;
pub mod provider;

pub use error::{AwsError, Result};
pub use provider::AwsInventory;
