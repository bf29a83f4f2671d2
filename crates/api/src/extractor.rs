//! Request principal extraction.
//!
//! Authentication happens upstream: the identity proxy in front of this
//! service resolves credentials and injects `X-Account-Id` and `X-Role`
//! headers. The extractor turns those into a [`Principal`] and the matching
//! capability profile; a request without a usable account id is rejected
//! before any handler runs.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use common::AccountId;
use domain::{Role, StaticCapabilities};

use crate::error::ApiError;

/// The authenticated account acting on a request.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub account_id: AccountId,
    pub role: Role,
}

impl Principal {
    /// Capability profile for the principal's role.
    pub fn capabilities(&self) -> StaticCapabilities {
        StaticCapabilities::for_role(self.role)
    }

    /// Returns true for librarian principals.
    pub fn is_librarian(&self) -> bool {
        self.role == Role::Librarian
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let account_id = parts
            .headers
            .get("x-account-id")
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("missing X-Account-Id header"))?;
        let account_id = Uuid::parse_str(account_id)
            .map(AccountId::from_uuid)
            .map_err(|e| ApiError::BadRequest(format!("Invalid X-Account-Id: {e}")))?;

        // Absent role header means an ordinary patron.
        let role = match parts.headers.get("x-role") {
            Some(value) => {
                let raw = value
                    .to_str()
                    .map_err(|_| ApiError::BadRequest("Invalid X-Role header".to_string()))?;
                Role::parse(raw)
                    .ok_or_else(|| ApiError::BadRequest(format!("Unknown role {raw:?}")))?
            }
            None => Role::Patron,
        };

        Ok(Principal { account_id, role })
    }
}
