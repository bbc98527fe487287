//! Authenticated principal forwarded by the upstream auth layer

use crate::error::{ApiError, OrchestratorError};
use axum::{extract::FromRequestParts, http::request::Parts, http::StatusCode};

/// Header carrying the authenticated user's email
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Header carrying the authenticated user's role
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub email: String,
    pub role: String,
}

impl Principal {
    pub fn new(email: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            role: role.into(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.trim().eq_ignore_ascii_case("admin")
    }
}

pub fn require_admin(principal: &Principal) -> Result<(), OrchestratorError> {
    if !principal.is_admin() {
        return Err(OrchestratorError::Forbidden);
    }
    Ok(())
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let email = header(USER_EMAIL_HEADER).ok_or_else(|| {
            ApiError::new(StatusCode::UNAUTHORIZED, "missing authenticated principal")
        })?;
        let role = header(USER_ROLE_HEADER).unwrap_or_else(|| "user".to_string());

        Ok(Principal { email, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&Principal::new("a@example.com", "Admin")).is_ok());
        assert!(matches!(
            require_admin(&Principal::new("a@example.com", "user")),
            Err(OrchestratorError::Forbidden)
        ));
    }
}
