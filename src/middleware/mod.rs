//! Middleware for the Helvenda API
//!
//! Request tracing, rate limiting, security headers, and the authentication
//! extractors.

pub mod auth;
mod rate_limiter;
mod security;
mod tracing;

pub use auth::{AdminUser, AuthenticatedUser};
pub use rate_limiter::{client_ip, rate_limit, RateLimiter};
pub use security::security_headers;
pub use self::tracing::request_tracing;
