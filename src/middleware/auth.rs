//! Authentication extractors
//!
//! Role checks happen here, once per request, before a handler runs.
//! Handlers that need a signed-in caller take [`AuthenticatedUser`]; admin
//! surfaces take [`AdminUser`].

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;

use crate::auth::{Actor, AuthService, JwtError};
use crate::error::ApiError;

/// A request made by a signed-in user
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    ApiError::Unauthorized("Not logged in".to_string()).into_response()
                })?;

        let auth_service = Arc::<AuthService>::from_ref(state);

        let actor = auth_service.authenticate(bearer.token()).map_err(|e| {
            let message = match e {
                JwtError::TokenExpired => "Session has expired",
                _ => "Invalid session token",
            };
            ApiError::Unauthorized(message.to_string()).into_response()
        })?;

        Ok(AuthenticatedUser(actor))
    }
}

/// A request made by an administrator
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(actor) = AuthenticatedUser::from_request_parts(parts, state).await?;

        if !actor.is_admin() {
            tracing::warn!(user_id = %actor.user_id, "Admin route requested by non-admin");
            return Err(ApiError::Forbidden("Admin access required".to_string()).into_response());
        }

        Ok(AdminUser(actor))
    }
}
