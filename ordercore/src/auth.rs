//! Principals and the identity collaborator boundary.
//!
//! Registration, email confirmation and token issuance live in an external
//! account service. The engine only ever sees an authenticated
//! [`Principal`]; the [`Authenticator`] trait is the seam that service
//! plugs into.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::UserId;

/// An authenticated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// The actor's user id.
    pub user: UserId,
    /// Whether the actor holds staff privilege. Staff is the only role
    /// allowed to move orders between post-confirmation states.
    pub staff: bool,
}

impl Principal {
    /// A regular buyer.
    pub const fn buyer(user: UserId) -> Self {
        Self { user, staff: false }
    }

    /// A staff actor.
    pub const fn staff(user: UserId) -> Self {
        Self { user, staff: true }
    }
}

/// Login credentials handed to the external account service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

/// Failure to authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The credentials did not match an active account.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The account exists but its email is not confirmed yet.
    #[error("account is not active")]
    Inactive,
    /// The account backend failed.
    #[error("identity backend error: {0}")]
    Backend(String),
}

/// External identity collaborator: exchanges credentials for a principal.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticates credentials, returning the actor on success.
    async fn authenticate(&self, credentials: &Credentials) -> Result<Principal, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_the_staff_flag() {
        let user = UserId::generate();
        assert!(!Principal::buyer(user).staff);
        assert!(Principal::staff(user).staff);
    }
}
