//! AWS inventory error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("AWS credentials not available: {0}")]
    AuthenticationFailed(String),

    #[error("{operation} failed: {message}")]
    Api { operation: String, message: String },

    #[error("cannot look up {kind} by '{criterion}'")]
    UnsupportedCriterion { kind: String, criterion: String },

    #[error("{0} objects cannot be looked up in AWS; use lookup=\"explicit\"")]
    UnsupportedKind(String),

    #[error("invalid criterion {criterion}={value}: {message}")]
    InvalidCriterion {
        criterion: String,
        value: String,
        message: String,
    },
}

impl AwsError {
    pub(crate) fn api(operation: &str, err: impl std::error::Error) -> Self {
        AwsError::Api {
            operation: operation.to_string(),
            message: aws_sdk_ec2::error::DisplayErrorContext(err).to_string(),
        }
    }
}

impl From<AwsError> for proxyflow_cloud::CloudError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::AuthenticationFailed(message) => {
                proxyflow_cloud::CloudError::AuthenticationFailed(message)
            }
            AwsError::UnsupportedCriterion { .. }
            | AwsError::UnsupportedKind(_)
            | AwsError::InvalidCriterion { .. } => {
                proxyflow_cloud::CloudError::UnsupportedLookup(err.to_string())
            }
            AwsError::Api { .. } => proxyflow_cloud::CloudError::ApiError(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;
