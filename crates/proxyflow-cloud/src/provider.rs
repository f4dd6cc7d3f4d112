//! Inventory provider trait definition

use crate::error::Result;
use async_trait::async_trait;
use proxyflow_core::{Attributes, LookupRequest};
use serde::{Deserialize, Serialize};

/// Read-only source of existing infrastructure objects
///
/// Providers never create or mutate anything. A lookup returns every match;
/// deciding whether zero or several matches are acceptable is left to the
/// core.
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// Returns the provider name (e.g., "aws", "static")
    fn name(&self) -> &str;

    /// Returns the provider display name for UI
    fn display_name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Find all existing objects matching a request
    async fn find(&self, request: &LookupRequest) -> Result<Vec<Attributes>>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.authenticated, &self.account_info, &self.error) {
            (true, Some(account), _) => write!(f, "authenticated as {}", account),
            (true, None, _) => write!(f, "authenticated"),
            (false, _, Some(error)) => write!(f, "not authenticated: {}", error),
            (false, _, None) => write!(f, "not authenticated"),
        }
    }
}
