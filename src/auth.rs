use serde::Deserialize;
use thiserror::Error;

/// Token verification lives upstream (the transport's auth collaborator).
/// Requests arrive with an already-verified principal in params; this module
/// only extracts it and enforces role capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing or invalid principal")]
    Unauthenticated,
    #[error("role not permitted for this operation")]
    Forbidden,
}

pub fn principal_from(params: &serde_json::Value) -> Result<Principal, AuthError> {
    let value = params.get("principal").ok_or(AuthError::Unauthenticated)?;
    let principal: Principal =
        serde_json::from_value(value.clone()).map_err(|_| AuthError::Unauthenticated)?;
    if principal.user_id.trim().is_empty() {
        return Err(AuthError::Unauthenticated);
    }
    Ok(principal)
}

pub fn require_role(principal: &Principal, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&principal.role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}
