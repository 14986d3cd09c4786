//! Authentication boundary for Helvenda
//!
//! Sessions live in the account service. Requests reach this crate carrying a
//! signed bearer token; [`AuthService`] turns it into an [`Actor`], and every
//! authorization decision downstream is made against that actor.

mod jwt;

pub use jwt::{issue_token, verify_token, Claims, JwtError};

use uuid::Uuid;

use crate::models::UserRole;

/// The caller of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl Actor {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: UserRole::User,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: UserRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// True when the actor is `owner` or an admin
    pub fn owns_or_admin(&self, owner: Uuid) -> bool {
        self.user_id == owner || self.is_admin()
    }
}

/// Token verification service
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    /// Resolve a bearer token into the calling actor
    pub fn authenticate(&self, token: &str) -> Result<Actor, JwtError> {
        let claims = verify_token(token, &self.jwt_secret)?;
        Ok(Actor {
            user_id: claims.user_id()?,
            role: claims.role()?,
        })
    }
}
