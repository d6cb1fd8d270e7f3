use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

use super::AuthError;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

/// Authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
        }
    }
}

/// How much of the catalog a caller may see.
///
/// This is the `has_access` capability: the pipeline never enforces it,
/// only the presentation layer truncates pages for preview callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Full,
    Preview,
}

impl AccessLevel {
    pub fn has_access(&self) -> bool {
        matches!(self, AccessLevel::Full)
    }

    /// Map an authentication outcome to an access level.
    ///
    /// Missing or wrong credentials downgrade to preview; infrastructure
    /// failures are passed back to the caller.
    pub fn from_auth_result(result: Result<Identity, AuthError>) -> Result<Self, AuthError> {
        match result {
            Ok(_) => Ok(AccessLevel::Full),
            Err(AuthError::NotAuthenticated) | Err(AuthError::InvalidCredentials(_)) => {
                Ok(AccessLevel::Preview)
            }
            Err(e) => Err(e),
        }
    }
}
